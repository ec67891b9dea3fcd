//! Configuration for a PowerShell session.
//!
//! This module provides:
//!
//! - [`SessionConfig`] and [`SessionConfigBuilder`] for configuring a session
//! - [`Elevation`] for running the interpreter through `sudo`
//! - [`LineEnding`] for the command terminator
//! - Binary name constants used during interpreter discovery
//!
//! # Example
//!
//! ```ignore
//! use libpwsh::config::SessionConfig;
//!
//! let config = SessionConfig::builder()
//!     .interpreter("/usr/local/bin/pwsh")
//!     .env("POWERSHELL_TELEMETRY_OPTOUT", "1")
//!     .build()?;
//! ```

pub mod builder;
pub mod options;

pub use builder::{SessionConfig, SessionConfigBuilder};
pub use options::{Elevation, LineEnding, INTERPRETER_ARGS, LEGACY_POWERSHELL, PWSH, SUDO};
