//! Process management for the PowerShell interpreter.
//!
//! A session talks to exactly one long-lived interpreter through a
//! [`ProcessBackend`]. The backend owns the OS process; the session only
//! sees three byte streams.
//!
//! # Architecture
//!
//! ```text
//! libpwsh                              pwsh -NoExit -Command -
//! ┌──────────────┐                    ┌──────────────┐
//! │ ProcessBackend│──stdin (framed)──▶│              │
//! │              │◀──stdout + sentinel│              │
//! │              │◀──stderr + sentinel│              │
//! └──────────────┘                    └──────────────┘
//! ```

mod backend;
mod local;

pub use backend::{OutputHandle, Pipes, ProcessBackend, StdinHandle};
pub use local::LocalBackend;
