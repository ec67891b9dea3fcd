//! The single-command request/response cycle.

use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tokio::time::timeout as tokio_timeout;

use crate::config::LineEnding;
use crate::framing::{FramedCommand, Sentinel, StreamFramer, StreamKind, StreamOutcome};
use crate::process::Pipes;
use crate::{Error, Result};

/// Text a command (or batch of commands) wrote to each stream.
///
/// Stderr output alone is not a failure: many commands report progress or
/// warnings there and still succeed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Output {
    pub stdout: String,
    pub stderr: String,
}

impl Output {
    /// Append another command's output.
    pub fn append(&mut self, other: Output) {
        self.stdout.push_str(&other.stdout);
        self.stderr.push_str(&other.stderr);
    }

    /// Append text to one stream.
    pub fn push(&mut self, stream: StreamKind, text: &str) {
        match stream {
            StreamKind::Stdout => self.stdout.push_str(text),
            StreamKind::Stderr => self.stderr.push_str(text),
        }
    }
}

/// Run one command to completion against the interpreter's pipes.
///
/// Writes the framed command in a single write, then drains stdout and
/// stderr concurrently. The join completes when both streams reach their
/// sentinels, or on the first failure from either, in which case the other
/// stream's framer is dropped.
///
/// # Errors
///
/// - [`Error::Write`] if stdin rejects the command
/// - [`Error::Fatal`] if either stream shows the fatal marker
/// - [`Error::StreamClosed`] / [`Error::Read`] if a stream ends or fails,
///   carrying what that stream delivered
pub async fn run_command(
    pipes: Pipes<'_>,
    command: &str,
    line_ending: LineEnding,
) -> Result<Output> {
    let Pipes {
        stdin,
        stdout,
        stderr,
    } = pipes;

    let out_sentinel = Sentinel::generate();
    let err_sentinel = Sentinel::generate();
    let framed = FramedCommand {
        command,
        stdout: &out_sentinel,
        stderr: &err_sentinel,
        line_ending,
    }
    .to_string();

    tracing::trace!("sending {:?}", framed);
    stdin
        .write_all(framed.as_bytes())
        .await
        .map_err(Error::Write)?;
    stdin.flush().await.map_err(Error::Write)?;

    let (stdout, stderr) = futures::future::try_join(
        capture(StreamFramer::new(stdout, StreamKind::Stdout, &out_sentinel, line_ending)),
        capture(StreamFramer::new(stderr, StreamKind::Stderr, &err_sentinel, line_ending)),
    )
    .await?;

    Ok(Output { stdout, stderr })
}

/// Turn a framer's outcome into text, or an error that ends the join.
async fn capture(framer: StreamFramer<'_>) -> Result<String> {
    let stream = framer.kind();
    match framer.run().await? {
        StreamOutcome::Captured(text) => Ok(text),
        StreamOutcome::Fatal(output) => Err(Error::Fatal { stream, output }),
    }
}

/// Wrap a future with a timeout.
pub async fn with_timeout<F, T>(duration: Duration, future: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio_timeout(duration, future).await {
        Ok(result) => result,
        Err(_) => Err(Error::Timeout(duration)),
    }
}
