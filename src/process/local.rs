//! Local child-process backend.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::process::{Child, ChildStderr, ChildStdin, ChildStdout, Command};

use super::backend::{Pipes, ProcessBackend};
use crate::{Error, Result};

/// Runs the interpreter as a child of the current process.
///
/// # Cancellation
///
/// Dropping a `LocalBackend` kills the child if it's still running.
#[derive(Debug)]
pub struct LocalBackend {
    env: HashMap<String, String>,
    inherit_env: bool,
    working_dir: Option<PathBuf>,
    child: Option<Child>,
    stdin: Option<ChildStdin>,
    stdout: Option<ChildStdout>,
    stderr: Option<ChildStderr>,
}

impl Default for LocalBackend {
    fn default() -> Self {
        Self {
            env: HashMap::new(),
            inherit_env: true,
            working_dir: None,
            child: None,
            stdin: None,
            stdout: None,
            stderr: None,
        }
    }
}

impl LocalBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a tokio Command from the configured environment and directory.
    fn build_command(&self, program: &Path, args: &[&str]) -> Command {
        let mut cmd = Command::new(program);
        cmd.args(args);

        if let Some(ref dir) = self.working_dir {
            cmd.current_dir(dir);
        }

        if !self.inherit_env {
            cmd.env_clear();
        }
        cmd.envs(&self.env);

        cmd.stdin(Stdio::piped());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());
        cmd.kill_on_drop(true);
        cmd
    }
}

#[async_trait]
impl ProcessBackend for LocalBackend {
    fn look_path(&self, name: &str) -> Option<PathBuf> {
        which::which(name).ok()
    }

    fn set_env(&mut self, values: HashMap<String, String>, combined: bool) {
        self.env = values;
        self.inherit_env = combined;
    }

    fn set_working_dir(&mut self, dir: Option<&Path>) {
        self.working_dir = dir.map(Path::to_path_buf);
    }

    async fn start_process(&mut self, program: &Path, args: &[&str]) -> Result<()> {
        let spawn_error = |source| Error::ProcessSpawn {
            program: program.display().to_string(),
            source,
        };

        let mut child = self
            .build_command(program, args)
            .spawn()
            .map_err(spawn_error)?;

        let missing = |stream: &str| {
            spawn_error(std::io::Error::other(format!("{stream} was not captured")))
        };
        self.stdin = Some(child.stdin.take().ok_or_else(|| missing("stdin"))?);
        self.stdout = Some(child.stdout.take().ok_or_else(|| missing("stdout"))?);
        self.stderr = Some(child.stderr.take().ok_or_else(|| missing("stderr"))?);

        tracing::debug!("started {} (pid {:?})", program.display(), child.id());
        self.child = Some(child);
        Ok(())
    }

    fn pipes(&mut self) -> Result<Pipes<'_>> {
        match (&mut self.stdin, &mut self.stdout, &mut self.stderr) {
            (Some(stdin), Some(stdout), Some(stderr)) => Ok(Pipes {
                stdin,
                stdout,
                stderr,
            }),
            _ => Err(Error::NotStarted),
        }
    }

    async fn close_stdin(&mut self) -> Result<()> {
        if let Some(mut stdin) = self.stdin.take() {
            stdin.shutdown().await.map_err(Error::io)?;
        }
        Ok(())
    }

    async fn kill(&mut self) -> Result<()> {
        let child = self.child.as_mut().ok_or(Error::NotStarted)?;
        child.kill().await.map_err(Error::io)?;
        tracing::debug!("interpreter killed");
        Ok(())
    }

    async fn wait(&mut self) -> Result<()> {
        let child = self.child.as_mut().ok_or(Error::NotStarted)?;
        let status = child.wait().await.map_err(Error::io)?;
        tracing::debug!("interpreter exited with {}", status);
        Ok(())
    }

    fn pid(&self) -> Option<u32> {
        self.child.as_ref().and_then(Child::id)
    }
}
