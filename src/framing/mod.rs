//! Framing of commands and their output.
//!
//! The interpreter's stdout and stderr are two unrelated pipes with no
//! end-of-command signal. Every command is therefore sent with two
//! trailing statements that print a fresh [`Sentinel`] on each stream; a
//! [`StreamFramer`] per stream reads up to its sentinel.
//!
//! # Wire format
//!
//! ```text
//! stdin:  Get-Date; echo '$libpwsh1f2e3d4c5b6a$'; [Console]::Error.WriteLine('$libpwsh0a9b8c7d6e5f$')\n
//! stdout: Friday, 16 October 2026 09:12:44\n$libpwsh1f2e3d4c5b6a$\n
//! stderr: $libpwsh0a9b8c7d6e5f$\n
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};

mod framer;
mod sentinel;

pub use framer::{StreamFramer, StreamOutcome};
pub use sentinel::{FramedCommand, Sentinel, SENTINEL_PREFIX};

/// Text PowerShell prints for parse failures.
///
/// A parse failure aborts the whole framed line, sentinels included.
pub const FATAL_MARKER: &str = "ParserError";

/// Which output pipe a value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamKind {
    Stdout,
    Stderr,
}

impl fmt::Display for StreamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StreamKind::Stdout => write!(f, "stdout"),
            StreamKind::Stderr => write!(f, "stderr"),
        }
    }
}

/// Quote a string as a PowerShell single-quoted literal.
///
/// Embedded single quotes are doubled, so the value reaches PowerShell
/// verbatim with no variable expansion.
///
/// ```
/// assert_eq!(libpwsh::quote_arg("it's"), "'it''s'");
/// ```
pub fn quote_arg(arg: &str) -> String {
    format!("'{}'", arg.replace('\'', "''"))
}
