//! End-of-output sentinels and the framed command text that emits them.

use std::fmt;

use rand::RngCore;

use crate::config::LineEnding;

/// Namespace prefix of every sentinel.
pub const SENTINEL_PREFIX: &str = "$libpwsh";

/// Random bytes per sentinel; rendered as twice as many hex characters.
const SENTINEL_RANDOM_BYTES: usize = 6;

/// A per-call token marking where one stream's output ends.
///
/// Rendered as `$libpwsh<12 hex chars>$`. The `$` delimiters are literal
/// inside the single-quoted string the framed command echoes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Sentinel(String);

impl Sentinel {
    /// Mint a fresh random sentinel.
    pub fn generate() -> Self {
        let mut bytes = [0u8; SENTINEL_RANDOM_BYTES];
        rand::rng().fill_bytes(&mut bytes);
        let suffix: String = bytes.iter().map(|b| format!("{b:02x}")).collect();
        Self(format!("{SENTINEL_PREFIX}{suffix}$"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The bytes a stream ends with once the sentinel line has been written.
    pub fn terminator(&self, line_ending: LineEnding) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(self.0.len() + 2);
        bytes.extend_from_slice(self.0.as_bytes());
        bytes.extend_from_slice(line_ending.as_str().as_bytes());
        bytes
    }
}

impl fmt::Display for Sentinel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The literal text written to stdin for one command.
///
/// `<command>; echo '<stdout sentinel>'; [Console]::Error.WriteLine('<stderr sentinel>')<newline>`
///
/// `[Console]::Error` writes straight to the process's stderr handle, so the
/// stderr sentinel is never merged into the success stream.
#[derive(Debug, Clone, Copy)]
pub struct FramedCommand<'a> {
    pub command: &'a str,
    pub stdout: &'a Sentinel,
    pub stderr: &'a Sentinel,
    pub line_ending: LineEnding,
}

impl fmt::Display for FramedCommand<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}; echo '{}'; [Console]::Error.WriteLine('{}'){}",
            self.command, self.stdout, self.stderr, self.line_ending
        )
    }
}
