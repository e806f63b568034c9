//! Core pieces shared by the ptrelay client and server roles.
//!
//! This crate provides:
//! - The bidirectional relay engine ([`io::relay_bidirectional`])
//! - In-flight handler tracking for graceful shutdown ([`termmon::TermMonitor`])
//! - The per-listener accept loop and listener handles ([`listener`])
//! - The control interface used to report listeners to a parent process
//! - Address/error redaction for logs
//! - Shutdown signal handling for the role CLIs
//! - Default configuration values and error type labels

pub mod control;
pub mod defaults;
pub mod elide;
pub mod errors;
pub mod io;
pub mod listener;
pub mod shutdown;
pub mod termmon;

// Re-export commonly used items at crate root
pub use defaults::*;
pub use errors::*;
