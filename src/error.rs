use std::time::Duration;

use crate::executor::Output;
use crate::framing::StreamKind;

/// Errors that can occur when using libpwsh.
///
/// Errors are organized by category:
/// - Configuration errors: detected at `build()` or session start
/// - Write errors: the command could not be sent to the interpreter
/// - Stream errors: a pipe ended or failed before the sentinel arrived
/// - Fatal errors: the interpreter reported a parse failure
/// - Closed errors: the session no longer owns a process
#[derive(thiserror::Error, Debug)]
#[non_exhaustive]
pub enum Error {
    // -------------------------------------------------------------------------
    // Configuration and startup errors
    // -------------------------------------------------------------------------
    /// Invalid configuration provided to builder.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// No PowerShell binary could be located.
    #[error("failed to locate a PowerShell binary (searched: {searched})")]
    InterpreterNotFound { searched: String },

    /// Elevation was requested but no `sudo` binary could be located.
    #[error("failed to locate an elevation binary (searched: {searched})")]
    ElevationNotFound { searched: String },

    /// Failed to spawn the interpreter process.
    #[error("failed to start process {program}: {source}")]
    ProcessSpawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// The backend was asked for its pipes before a process was started.
    #[error("no process has been started on this backend")]
    NotStarted,

    // -------------------------------------------------------------------------
    // IO errors
    // -------------------------------------------------------------------------
    /// The framed command could not be written to stdin.
    #[error("could not send command to PowerShell: {0}")]
    Write(#[source] std::io::Error),

    /// IO error reading from the interpreter.
    #[error("IO error: {0}")]
    Io(#[source] std::io::Error),

    /// A stream reached end of file before its sentinel was seen.
    ///
    /// `output` holds what the stream delivered before it ended.
    #[error("{stream} closed before the end of command output")]
    StreamClosed { stream: StreamKind, output: String },

    /// Reading a stream failed before its sentinel was seen.
    #[error("failed to read {stream}: {source}")]
    Read {
        stream: StreamKind,
        output: String,
        #[source]
        source: std::io::Error,
    },

    // -------------------------------------------------------------------------
    // Runtime errors
    // -------------------------------------------------------------------------
    /// The interpreter emitted a parse failure; the session is no longer usable.
    #[error("PowerShell reported a fatal parse error on {stream}: {output}")]
    Fatal { stream: StreamKind, output: String },

    /// The session has been closed.
    #[error("cannot execute commands on a closed shell")]
    Closed,

    /// A command exceeded the configured deadline.
    #[error("command timed out after {0:?}")]
    Timeout(Duration),

    /// A command in an `execute` batch failed.
    ///
    /// `partial` holds everything captured by the batch up to and including
    /// the failing command.
    #[error("failed to execute `{command}`: {source}")]
    Command {
        command: String,
        partial: Output,
        #[source]
        source: Box<Error>,
    },
}

/// A specialized Result type for libpwsh operations.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Create an IO error.
    pub fn io(source: std::io::Error) -> Self {
        Self::Io(source)
    }

    /// Check if this error means the interpreter hit a parse failure.
    pub fn is_fatal(&self) -> bool {
        match self {
            Error::Fatal { .. } => true,
            Error::Command { source, .. } => source.is_fatal(),
            _ => false,
        }
    }

    /// Check if this error was caused by using a closed session.
    pub fn is_closed(&self) -> bool {
        match self {
            Error::Closed => true,
            Error::Command { source, .. } => source.is_closed(),
            _ => false,
        }
    }

    /// Text a single stream delivered before this error cut it short.
    pub fn stream_output(&self) -> Option<(StreamKind, &str)> {
        match self {
            Error::Fatal { stream, output }
            | Error::StreamClosed { stream, output }
            | Error::Read { stream, output, .. } => Some((*stream, output.as_str())),
            _ => None,
        }
    }

    /// Output captured before a batch failed, if this is a per-command error.
    pub fn partial_output(&self) -> Option<&Output> {
        match self {
            Error::Command { partial, .. } => Some(partial),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err)
    }
}
