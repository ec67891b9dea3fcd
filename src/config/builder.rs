//! Session configuration and builder.
//!
//! # Example
//!
//! ```ignore
//! use libpwsh::config::{Elevation, SessionConfig};
//!
//! let config = SessionConfig::builder()
//!     .working_directory("/srv/app")
//!     .env("PSModulePath", "/opt/modules")
//!     .elevation(Elevation::Auto)
//!     .build()?;
//! ```

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::options::{Elevation, LineEnding};
use crate::{Error, Result};

/// Configuration for a PowerShell session.
///
/// Immutable once a [`Session`](crate::Session) has been started with it.
/// Use [`SessionConfig::builder()`] for validated construction, or deserialize
/// it from a config file; every field has a default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Explicit interpreter path. When unset, `pwsh` then `powershell` are looked up.
    pub interpreter: Option<PathBuf>,
    /// Run the interpreter through an elevation binary.
    pub elevation: Option<Elevation>,
    /// Initial working directory of the interpreter. An empty path is the
    /// same as `None`. The backend resolves it, so it may name a directory
    /// that only exists where the interpreter runs.
    pub working_directory: Option<PathBuf>,
    /// Environment variables for the interpreter.
    pub env: HashMap<String, String>,
    /// Merge `env` into the inherited environment instead of replacing it.
    pub inherit_env: bool,
    /// Terminator appended to framed commands and expected after sentinels.
    pub line_ending: LineEnding,
    /// Per-command deadline. `None` waits indefinitely. When it expires the
    /// session is closed and the interpreter stopped through
    /// [`ProcessBackend::kill`](crate::ProcessBackend::kill).
    #[serde(with = "opt_millis")]
    pub timeout: Option<Duration>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            interpreter: None,
            elevation: None,
            working_directory: None,
            env: HashMap::new(),
            inherit_env: true,
            line_ending: LineEnding::native(),
            timeout: None,
        }
    }
}

impl SessionConfig {
    /// Create a new builder for SessionConfig.
    pub fn builder() -> SessionConfigBuilder {
        SessionConfigBuilder::default()
    }

    /// Get the timeout if set.
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Get the working directory if set and non-empty.
    pub fn working_directory(&self) -> Option<&Path> {
        self.working_directory
            .as_deref()
            .filter(|dir| !dir.as_os_str().is_empty())
    }

    /// Check the invariants the builder enforces.
    ///
    /// Configs loaded through serde bypass the builder, so sessions call this
    /// before starting a process.
    pub fn validate(&self) -> Result<()> {
        if self.timeout == Some(Duration::ZERO) {
            return Err(Error::InvalidConfig("timeout must be non-zero".into()));
        }

        Ok(())
    }
}

/// Builder for [`SessionConfig`].
#[derive(Debug, Clone, Default)]
pub struct SessionConfigBuilder {
    config: SessionConfig,
}

impl SessionConfigBuilder {
    /// Path to the PowerShell binary (default: search for `pwsh`, then `powershell`).
    pub fn interpreter(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.interpreter = Some(path.into());
        self
    }

    /// Start the interpreter through an elevation binary.
    pub fn elevation(mut self, elevation: Elevation) -> Self {
        self.config.elevation = Some(elevation);
        self
    }

    /// Shorthand for `elevation(Elevation::Auto)`.
    pub fn elevated(self) -> Self {
        self.elevation(Elevation::Auto)
    }

    /// Working directory for the interpreter process.
    pub fn working_directory(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.working_directory = Some(path.into());
        self
    }

    /// Add/override an environment variable for the interpreter.
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.config.env.insert(key.into(), value.into());
        self
    }

    /// Replace all configured environment variables.
    pub fn envs(mut self, vars: HashMap<String, String>) -> Self {
        self.config.env = vars;
        self
    }

    /// Don't inherit parent environment (default: inherit).
    pub fn inherit_env(mut self, inherit: bool) -> Self {
        self.config.inherit_env = inherit;
        self
    }

    /// Override the platform line terminator.
    pub fn line_ending(mut self, line_ending: LineEnding) -> Self {
        self.config.line_ending = line_ending;
        self
    }

    /// Fail commands that produce no sentinel within `duration`.
    pub fn timeout(mut self, duration: Duration) -> Self {
        self.config.timeout = Some(duration);
        self
    }

    /// Build the configuration.
    ///
    /// This validates that the timeout is non-zero if specified.
    ///
    /// Note: binaries and the working directory are resolved by the backend
    /// when the session starts.
    pub fn build(self) -> Result<SessionConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

mod opt_millis {
    use std::time::Duration;

    use serde::ser::Error as _;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Option<Duration>, s: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(d) => {
                let millis = u64::try_from(d.as_millis()).map_err(|_| {
                    S::Error::custom(format!("timeout {d:?} does not fit in u64 milliseconds"))
                })?;
                s.serialize_some(&millis)
            }
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Duration>, D::Error> {
        Ok(Option::<u64>::deserialize(d)?.map(Duration::from_millis))
    }
}
