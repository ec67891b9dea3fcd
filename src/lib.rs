//! # libpwsh
//!
//! Async Rust host for a long-lived PowerShell process.
//!
//! A [`Session`] starts `pwsh -NoExit -Command -` once and then runs
//! commands through it, returning exactly what each command wrote to
//! stdout and stderr:
//! - Commands are framed with random per-call sentinels, so output is cut at
//!   the right place on both pipes
//! - Parse errors are detected even though they suppress the sentinels, and
//!   close the session
//! - Interpreter discovery, `sudo` elevation, environment and working
//!   directory are configurable
//! - The process backend is a trait, so it can be replaced
//!
//! ## Quick Start
//!
//! ```ignore
//! use libpwsh::{Result, Session};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let session = Session::start().await?;
//!     let output = session.execute(["Get-ComputerInfo"]).await?;
//!     println!("{}", output.stdout);
//!     session.close().await;
//!     Ok(())
//! }
//! ```
//!
//! ## Configuration
//!
//! ```ignore
//! use libpwsh::Session;
//!
//! let session = Session::builder()
//!     .interpreter("/opt/microsoft/powershell/7/pwsh")
//!     .elevated()
//!     .working_directory("/srv")
//!     .env("APP_ENV", "staging")
//!     .inherit_env(false)
//!     .start()
//!     .await?;
//! ```
//!
//! ## Quoting
//!
//! ```ignore
//! let path = libpwsh::quote_arg(user_supplied_path);
//! session.execute([format!("Get-Item -LiteralPath {path}")]).await?;
//! ```

pub mod config;
mod error;
pub mod executor;
pub mod framing;
pub mod process;
mod session;

pub use error::{Error, Result};

// Re-export the main session types at crate root
pub use session::{Session, SessionBuilder};

// Re-export commonly used config types at crate root
pub use config::{Elevation, LineEnding, SessionConfig, SessionConfigBuilder};

// Re-export commonly used framing types at crate root
pub use executor::Output;
pub use framing::{quote_arg, StreamKind, FATAL_MARKER};

// Re-export commonly used process types at crate root
pub use process::{LocalBackend, Pipes, ProcessBackend};
