//! Error type constants for metrics and logging.
//!
//! These constants provide consistent error classification across all crates.

/// I/O error while relaying.
pub const ERROR_IO: &str = "io";
/// Local handshake (SOCKS5) failure.
pub const ERROR_HANDSHAKE: &str = "handshake";
/// Outbound dial through a transport failed.
pub const ERROR_DIAL: &str = "dial";
/// Dial to the upstream endpoint failed.
pub const ERROR_UPSTREAM: &str = "upstream";
/// Listener could not be launched.
pub const ERROR_LISTEN: &str = "listen";
/// Configuration error.
pub const ERROR_CONFIG: &str = "config";
