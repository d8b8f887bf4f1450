#![forbid(unsafe_code)]

//! Persistent-shell MCP server library.
//!
//! Runs shell commands inside a single long-lived shell process,
//! preserving working directory, environment, and background jobs across
//! calls, with per-command timeouts, strict one-command-at-a-time
//! serialization, and a banned-command policy gate.

pub mod config;
pub mod controller;
pub mod errors;
pub mod gate;
pub mod mcp;
pub mod session;

pub use config::GlobalConfig;
pub use errors::{AppError, Result};
