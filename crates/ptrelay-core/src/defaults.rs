//! Default configuration values.
//!
//! Centralized default constants for use across all crates.

// ============================================================================
// Listener Defaults
// ============================================================================

/// Bind address for client-role SOCKS5 listeners (loopback, ephemeral port).
pub const DEFAULT_CLIENT_BIND_ADDR: &str = "127.0.0.1:0";
/// Default TCP listener backlog.
pub const DEFAULT_CONNECTION_BACKLOG: u32 = 1024;
/// Pause before retrying accept after a resource-exhaustion error (ms).
pub const DEFAULT_ACCEPT_BACKOFF_MS: u64 = 50;

// ============================================================================
// Relay Defaults
// ============================================================================

/// Default relay buffer size per direction (32 KiB).
pub const DEFAULT_RELAY_BUFFER_SIZE: usize = 32768;
/// Smallest accepted relay buffer size.
pub const MIN_RELAY_BUFFER_SIZE: usize = 1024;
/// Largest accepted relay buffer size (1 MiB).
pub const MAX_RELAY_BUFFER_SIZE: usize = 1024 * 1024;
/// Default TCP_NODELAY on outbound connections.
pub const DEFAULT_TCP_NO_DELAY: bool = true;

// ============================================================================
// Shutdown Defaults
// ============================================================================

/// Default graceful shutdown timeout in seconds.
pub const DEFAULT_SHUTDOWN_TIMEOUT_SECS: u64 = 30;

// ============================================================================
// Transport Names
// ============================================================================

/// Client transport that dials the destination directly over TCP.
pub const TRANSPORT_DIRECT: &str = "direct";
/// Server transport that hands accepted TCP streams back unmodified.
pub const TRANSPORT_PLAIN: &str = "plain";
/// Handshake protocol advertised for client-role listeners.
pub const CLIENT_PROTOCOL_SOCKS5: &str = "socks5";
