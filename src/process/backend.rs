//! The contract a session needs from whatever runs the interpreter.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncWrite};

use crate::Result;

/// Writable end of the interpreter's stdin.
pub type StdinHandle = dyn AsyncWrite + Send + Unpin;

/// Readable end of the interpreter's stdout or stderr.
pub type OutputHandle = dyn AsyncRead + Send + Unpin;

/// Simultaneous mutable access to the three standard streams.
///
/// Returned by [`ProcessBackend::pipes`] so stdout and stderr can be drained
/// concurrently while stdin stays reachable.
pub struct Pipes<'a> {
    pub stdin: &'a mut StdinHandle,
    pub stdout: &'a mut OutputHandle,
    pub stderr: &'a mut OutputHandle,
}

/// Starts and owns the interpreter process.
///
/// A session calls `set_env` and `set_working_dir` before `start_process`,
/// and `pipes` only afterwards. The bundled [`LocalBackend`](super::LocalBackend)
/// spawns a local child process; other implementations (for example over SSH)
/// only need to provide byte streams with the same semantics.
#[async_trait]
pub trait ProcessBackend: Send + Sync {
    /// Resolve an executable name to a path, or `None` if it can't be found.
    fn look_path(&self, name: &str) -> Option<PathBuf>;

    /// Set the process environment. With `combined` the values are merged
    /// into the inherited environment, otherwise they replace it.
    fn set_env(&mut self, values: HashMap<String, String>, combined: bool);

    /// Set the initial working directory. `None` keeps the backend default.
    fn set_working_dir(&mut self, dir: Option<&Path>);

    /// Spawn `program` with `args`. The pipes must be usable on return.
    async fn start_process(&mut self, program: &Path, args: &[&str]) -> Result<()>;

    /// Borrow the standard streams of the running process.
    fn pipes(&mut self) -> Result<Pipes<'_>>;

    /// Close stdin, if the backend supports it.
    async fn close_stdin(&mut self) -> Result<()> {
        Ok(())
    }

    /// Forcibly stop the process and reap it.
    ///
    /// Called when a command overruns its deadline and the interpreter can't
    /// be trusted to read `exit`. The default does nothing, leaving cleanup to
    /// the backend's `Drop`.
    async fn kill(&mut self) -> Result<()> {
        Ok(())
    }

    /// Wait for the process to exit.
    async fn wait(&mut self) -> Result<()>;

    /// OS process id, when the backend has one.
    fn pid(&self) -> Option<u32> {
        None
    }
}
