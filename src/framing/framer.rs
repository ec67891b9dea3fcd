//! Per-stream output capture.
//!
//! A [`StreamFramer`] drains one pipe until it ends with the call's
//! sentinel, racing a watcher that looks for [`FATAL_MARKER`] in the same
//! accumulated output. A parse failure means the rest of the framed command
//! never runs, so the sentinel would never arrive; the watcher is what keeps
//! that case from blocking forever.

use tokio::io::AsyncReadExt;
use tokio::sync::watch;

use super::sentinel::Sentinel;
use super::{StreamKind, FATAL_MARKER};
use crate::config::LineEnding;
use crate::process::OutputHandle;
use crate::{Error, Result};

/// Bytes requested per read.
const READ_BUFFER_SIZE: usize = 1024;

/// How a stream finished.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamOutcome {
    /// Everything before the sentinel line.
    Captured(String),
    /// The fatal marker was seen first; carries everything read so far.
    Fatal(String),
}

/// Captures one stream's output for a single command.
pub struct StreamFramer<'a> {
    stream: &'a mut OutputHandle,
    kind: StreamKind,
    terminator: Vec<u8>,
}

impl<'a> StreamFramer<'a> {
    pub fn new(
        stream: &'a mut OutputHandle,
        kind: StreamKind,
        sentinel: &Sentinel,
        line_ending: LineEnding,
    ) -> Self {
        Self {
            stream,
            kind,
            terminator: sentinel.terminator(line_ending),
        }
    }

    pub fn kind(&self) -> StreamKind {
        self.kind
    }

    /// Read until the sentinel line or the fatal marker, whichever comes first.
    ///
    /// Dropping the returned future cancels both watchers. Reads are
    /// cancel-safe, so no consumed bytes are lost to a partial read.
    ///
    /// # Errors
    ///
    /// [`Error::StreamClosed`] on end of file and [`Error::Read`] on read
    /// failure, both carrying the output read so far. If that output already
    /// holds the fatal marker the outcome is [`StreamOutcome::Fatal`] instead.
    pub async fn run(self) -> Result<StreamOutcome> {
        let Self {
            stream,
            kind,
            terminator,
        } = self;
        let (output, watcher) = watch::channel(Vec::new());

        let result = tokio::select! {
            biased;
            partial = watch_for_fatal_marker(watcher) => {
                tracing::debug!("fatal marker on {}", kind);
                return Ok(StreamOutcome::Fatal(lossy(&partial)));
            }
            result = read_until_terminator(stream, &output, &terminator, kind) => result,
        };

        let mut buf = output.send_replace(Vec::new());
        match result {
            Ok(true) => {
                buf.truncate(buf.len() - terminator.len());
                Ok(StreamOutcome::Captured(lossy(&buf)))
            }
            _ if contains_marker(&buf, 0) => {
                tracing::debug!("{} ended after fatal marker", kind);
                Ok(StreamOutcome::Fatal(lossy(&buf)))
            }
            Ok(false) => Err(Error::StreamClosed {
                stream: kind,
                output: lossy(&buf),
            }),
            Err(source) => Err(Error::Read {
                stream: kind,
                output: lossy(&buf),
                source,
            }),
        }
    }
}

/// Append reads to `output` until it ends with `terminator`.
///
/// Returns `false` if the stream ends first.
async fn read_until_terminator(
    stream: &mut OutputHandle,
    output: &watch::Sender<Vec<u8>>,
    terminator: &[u8],
    kind: StreamKind,
) -> std::io::Result<bool> {
    let mut chunk = [0u8; READ_BUFFER_SIZE];
    loop {
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            return Ok(false);
        }

        let mut done = false;
        output.send_modify(|buf| {
            buf.extend_from_slice(&chunk[..n]);
            done = buf.ends_with(terminator);
        });

        if done {
            tracing::trace!("sentinel reached on {}", kind);
            return Ok(true);
        }
    }
}

/// Resolve with the accumulated output once it contains the fatal marker.
///
/// Never resolves otherwise. Each wake-up only rescans bytes appended since
/// the previous check, plus enough overlap to catch a marker split across
/// reads.
async fn watch_for_fatal_marker(mut output: watch::Receiver<Vec<u8>>) -> Vec<u8> {
    let mut scanned = 0;
    loop {
        {
            let buf = output.borrow_and_update();
            if contains_marker(&buf, scanned) {
                return buf.clone();
            }
            scanned = buf.len();
        }

        if output.changed().await.is_err() {
            // The reader is gone and decides the outcome on its own.
            std::future::pending::<()>().await;
        }
    }
}

/// Whether `buf` holds the fatal marker in a match that ends after `from`.
fn contains_marker(buf: &[u8], from: usize) -> bool {
    let marker = FATAL_MARKER.as_bytes();
    let start = from.saturating_sub(marker.len() - 1);
    buf.get(start..)
        .is_some_and(|tail| tail.windows(marker.len()).any(|w| w == marker))
}

fn lossy(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}
