//! Type-safe configuration options for the PowerShell session.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Executable name of PowerShell 7+.
pub const PWSH: &str = "pwsh";

/// Executable name of Windows PowerShell 5.x, tried when `pwsh` is missing.
pub const LEGACY_POWERSHELL: &str = "powershell";

/// Default elevation binary.
pub const SUDO: &str = "sudo";

/// Arguments that keep the interpreter resident, reading commands from stdin.
pub const INTERPRETER_ARGS: [&str; 3] = ["-NoExit", "-Command", "-"];

/// Line terminator used to frame every command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LineEnding {
    /// `\n`
    Lf,
    /// `\r\n`
    CrLf,
}

impl LineEnding {
    /// The terminator the interpreter uses on the current platform.
    pub const fn native() -> Self {
        if cfg!(windows) {
            LineEnding::CrLf
        } else {
            LineEnding::Lf
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            LineEnding::Lf => "\n",
            LineEnding::CrLf => "\r\n",
        }
    }
}

impl Default for LineEnding {
    fn default() -> Self {
        Self::native()
    }
}

impl fmt::Display for LineEnding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How to elevate the interpreter.
///
/// Elevation assumes a `sudo`-style binary that takes the program to run as
/// its arguments. On Windows a package such as `gsudo` provides one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Elevation {
    /// Look up a binary named `sudo` through the backend.
    Auto,
    /// Use the given elevation binary.
    Path(PathBuf),
}
