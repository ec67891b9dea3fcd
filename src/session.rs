//! PowerShell session lifecycle.
//!
//! This module provides [`Session`], a handle to one long-lived PowerShell
//! process. Commands are written to its stdin and their output is read back
//! from stdout and stderr; the process is never restarted between calls.
//!
//! # Example
//!
//! ```ignore
//! use libpwsh::{Session, Result};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let session = Session::start().await?;
//!
//!     let output = session.execute(["$x = 40", "$x + 2"]).await?;
//!     println!("{}", output.stdout); // "42"
//!
//!     session.close().await;
//!     Ok(())
//! }
//! ```

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use crate::config::{
    Elevation, LineEnding, SessionConfig, SessionConfigBuilder, INTERPRETER_ARGS,
    LEGACY_POWERSHELL, PWSH, SUDO,
};
use crate::executor::{run_command, with_timeout, Output};
use crate::process::{LocalBackend, ProcessBackend};
use crate::{Error, Result};

type BackendSlot = Option<Box<dyn ProcessBackend>>;

/// A running PowerShell process.
///
/// # Thread Safety
///
/// `Session` is `Send + Sync` and can be shared across tasks. The interpreter
/// reads one command stream, so concurrent calls to [`execute`](Self::execute)
/// are serialized internally; callers that need a particular ordering must
/// still sequence their own calls.
///
/// # Closing
///
/// A session closes when [`close`](Self::close) is called, or on its own when
/// PowerShell reports a parse error or a command exceeds the configured
/// timeout. A closed session rejects every further call with
/// [`Error::Closed`]. Dropping a session with the default backend kills the
/// process.
pub struct Session {
    /// `None` once the session is closed.
    backend: Mutex<BackendSlot>,
    config: SessionConfig,
    pid: Option<u32>,
}

impl Session {
    /// Start PowerShell with the default configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InterpreterNotFound`] if neither `pwsh` nor
    /// `powershell` is on the PATH.
    pub async fn start() -> Result<Self> {
        Self::with_config(SessionConfig::default()).await
    }

    /// Start PowerShell as a local child process with the given configuration.
    pub async fn with_config(config: SessionConfig) -> Result<Self> {
        Self::with_backend(config, LocalBackend::new()).await
    }

    /// Start PowerShell through a custom backend.
    pub async fn with_backend(
        config: SessionConfig,
        backend: impl ProcessBackend + 'static,
    ) -> Result<Self> {
        Self::launch(config, Box::new(backend)).await
    }

    /// Create a builder for configuring a new session.
    pub fn builder() -> SessionBuilder {
        SessionBuilder::new()
    }

    async fn launch(config: SessionConfig, mut backend: Box<dyn ProcessBackend>) -> Result<Self> {
        config.validate()?;

        backend.set_env(config.env.clone(), config.inherit_env);
        backend.set_working_dir(config.working_directory());

        let interpreter = resolve_interpreter(&config, backend.as_ref())?;

        match config.elevation {
            Some(ref elevation) => {
                let sudo = resolve_elevation(elevation, backend.as_ref())?;
                let interpreter = interpreter.to_string_lossy();
                let mut args = vec![&*interpreter];
                args.extend(INTERPRETER_ARGS);
                tracing::debug!("starting {} via {}", interpreter, sudo.display());
                backend.start_process(&sudo, &args).await?;
            }
            None => {
                tracing::debug!("starting {}", interpreter.display());
                backend.start_process(&interpreter, &INTERPRETER_ARGS).await?;
            }
        }

        Ok(Self {
            pid: backend.pid(),
            backend: Mutex::new(Some(backend)),
            config,
        })
    }

    /// Run commands in order and return their combined output.
    ///
    /// Stdout and stderr of each command are concatenated across the batch.
    /// Text on stderr does not make a command fail; only plumbing failures
    /// and PowerShell parse errors do.
    ///
    /// # Errors
    ///
    /// - [`Error::Closed`] without any I/O if the session is closed
    /// - [`Error::Command`] for the first command that fails; it carries the
    ///   command text, the output captured so far and the underlying cause.
    ///   A fatal parse error or a timeout closes the session first.
    pub async fn execute<I, S>(&self, commands: I) -> Result<Output>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut slot = self.backend.lock().await;
        if slot.is_none() {
            return Err(Error::Closed);
        }

        let mut output = Output::default();
        for command in commands {
            let command = command.as_ref();
            match self.execute_one(&mut slot, command).await {
                Ok(o) => output.append(o),
                Err(source) => {
                    if let Some((stream, text)) = source.stream_output() {
                        output.push(stream, text);
                    }
                    return Err(Error::Command {
                        command: command.to_string(),
                        partial: output,
                        source: Box::new(source),
                    });
                }
            }
        }

        Ok(output)
    }

    async fn execute_one(&self, slot: &mut BackendSlot, command: &str) -> Result<Output> {
        let backend = slot.as_mut().ok_or(Error::Closed)?;
        let run = run_command(backend.pipes()?, command, self.config.line_ending);

        let result = match self.config.timeout {
            Some(duration) => with_timeout(duration, run).await,
            None => run.await,
        };

        match result {
            Err(ref e) if e.is_fatal() => {
                tracing::debug!("closing session after fatal error: {}", e);
                shutdown(slot, self.config.line_ending).await;
            }
            Err(Error::Timeout(duration)) => {
                tracing::debug!("killing session after {:?} timeout", duration);
                // The command may still be running; its output would be
                // attributed to the next call.
                if let Some(mut backend) = slot.take() {
                    if let Err(e) = backend.kill().await {
                        tracing::debug!("failed to kill interpreter: {}", e);
                    }
                }
            }
            _ => {}
        }

        result
    }

    /// Exit PowerShell and release the backend.
    ///
    /// Sends `exit`, closes stdin and waits for the process, ignoring
    /// failures at each step since the process may already be gone.
    /// Safe to call more than once.
    pub async fn close(&self) {
        let mut slot = self.backend.lock().await;
        if slot.is_some() {
            shutdown(&mut slot, self.config.line_ending).await;
            tracing::debug!("session closed");
        }
    }

    /// Whether the session has been closed.
    pub async fn is_closed(&self) -> bool {
        self.backend.lock().await.is_none()
    }

    /// OS process id of the interpreter (or the elevation wrapper), if known.
    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    /// Get a reference to the session configuration.
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("config", &self.config)
            .field("pid", &self.pid)
            .finish_non_exhaustive()
    }
}

/// Take the backend out of `slot` and let the process exit.
async fn shutdown(slot: &mut BackendSlot, line_ending: LineEnding) {
    let Some(mut backend) = slot.take() else {
        return;
    };

    match backend.pipes() {
        Ok(pipes) => {
            let exit = format!("exit{line_ending}");
            if let Err(e) = pipes.stdin.write_all(exit.as_bytes()).await {
                tracing::debug!("failed to send exit: {}", e);
            } else if let Err(e) = pipes.stdin.flush().await {
                tracing::debug!("failed to flush exit: {}", e);
            }
        }
        Err(e) => tracing::debug!("no pipes to send exit: {}", e),
    }

    if let Err(e) = backend.close_stdin().await {
        tracing::debug!("failed to close stdin: {}", e);
    }

    if let Err(e) = backend.wait().await {
        tracing::debug!("failed to wait for interpreter: {}", e);
    }
}

/// Use the configured interpreter, or look up `pwsh` then `powershell`.
fn resolve_interpreter(config: &SessionConfig, backend: &dyn ProcessBackend) -> Result<PathBuf> {
    if let Some(ref path) = config.interpreter {
        return Ok(path.clone());
    }

    backend
        .look_path(PWSH)
        .or_else(|| backend.look_path(LEGACY_POWERSHELL))
        .ok_or_else(|| Error::InterpreterNotFound {
            searched: format!("{PWSH}, {LEGACY_POWERSHELL}"),
        })
}

fn resolve_elevation(elevation: &Elevation, backend: &dyn ProcessBackend) -> Result<PathBuf> {
    match elevation {
        Elevation::Path(path) => Ok(path.clone()),
        Elevation::Auto => backend
            .look_path(SUDO)
            .ok_or_else(|| Error::ElevationNotFound {
                searched: SUDO.to_string(),
            }),
    }
}

/// Builder for starting a [`Session`].
///
/// Wraps [`SessionConfigBuilder`] and adds the choice of backend.
///
/// # Example
///
/// ```ignore
/// let session = Session::builder()
///     .working_directory("/srv/app")
///     .env("APP_ENV", "staging")
///     .timeout(Duration::from_secs(60))
///     .start()
///     .await?;
/// ```
pub struct SessionBuilder {
    inner: SessionConfigBuilder,
    backend: Option<Box<dyn ProcessBackend>>,
}

impl SessionBuilder {
    pub fn new() -> Self {
        Self {
            inner: SessionConfig::builder(),
            backend: None,
        }
    }

    /// Use a custom backend instead of a local child process.
    pub fn backend(mut self, backend: impl ProcessBackend + 'static) -> Self {
        self.backend = Some(Box::new(backend));
        self
    }

    /// Path to the PowerShell binary.
    pub fn interpreter(mut self, path: impl Into<PathBuf>) -> Self {
        self.inner = self.inner.interpreter(path);
        self
    }

    /// Start the interpreter through an elevation binary.
    pub fn elevation(mut self, elevation: Elevation) -> Self {
        self.inner = self.inner.elevation(elevation);
        self
    }

    /// Start the interpreter through `sudo`, looked up on the backend.
    pub fn elevated(mut self) -> Self {
        self.inner = self.inner.elevated();
        self
    }

    /// Working directory for the interpreter process.
    pub fn working_directory(mut self, path: impl Into<PathBuf>) -> Self {
        self.inner = self.inner.working_directory(path);
        self
    }

    /// Add/override an environment variable.
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.inner = self.inner.env(key, value);
        self
    }

    /// Don't inherit parent environment (default: inherit).
    pub fn inherit_env(mut self, inherit: bool) -> Self {
        self.inner = self.inner.inherit_env(inherit);
        self
    }

    /// Override the platform line terminator.
    pub fn line_ending(mut self, line_ending: LineEnding) -> Self {
        self.inner = self.inner.line_ending(line_ending);
        self
    }

    /// Per-command deadline.
    pub fn timeout(mut self, duration: Duration) -> Self {
        self.inner = self.inner.timeout(duration);
        self
    }

    /// Validate the configuration and start the interpreter.
    pub async fn start(self) -> Result<Session> {
        let config = self.inner.build()?;
        let backend = self
            .backend
            .unwrap_or_else(|| Box::new(LocalBackend::new()));
        Session::launch(config, backend).await
    }
}

impl Default for SessionBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for SessionBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionBuilder")
            .field("inner", &self.inner)
            .field("custom_backend", &self.backend.is_some())
            .finish()
    }
}
