//! Metrics collection and Prometheus exporter for ptrelay.
//!
//! Both roles record accepted and closed sessions, relayed bytes, listener
//! failures and errors through the functions below. Nothing is exported
//! unless [`init_prometheus`] installs a recorder.

use std::net::SocketAddr;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use ptrelay_core::io::RelayMetrics;

/// Initialize Prometheus metrics exporter.
///
/// Starts an HTTP server on the given address to expose metrics.
/// Returns an error message if binding fails.
pub fn init_prometheus(listen: &str) -> Result<(), String> {
    let addr: SocketAddr = listen
        .parse()
        .map_err(|e| format!("invalid metrics listen address: {}", e))?;

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| format!("failed to install prometheus exporter: {}", e))?;

    Ok(())
}

// ============================================================================
// Metric Names
// ============================================================================

/// Total number of sessions accepted, by transport.
pub const CONNECTIONS_TOTAL: &str = "ptrelay_connections_total";
/// Number of currently active sessions, by transport.
pub const CONNECTIONS_ACTIVE: &str = "ptrelay_connections_active";
/// Session duration histogram (seconds).
pub const CONNECTION_DURATION_SECONDS: &str = "ptrelay_connection_duration_seconds";
/// Total bytes relayed, by role and direction.
pub const BYTES_TOTAL: &str = "ptrelay_bytes_total";
/// Total number of errors by type.
pub const ERRORS_TOTAL: &str = "ptrelay_errors_total";
/// Total number of transports that failed to launch a listener.
pub const LISTENER_FAILURES_TOTAL: &str = "ptrelay_listener_failures_total";
/// Handlers currently in flight.
pub const HANDLERS_IN_FLIGHT: &str = "ptrelay_handlers_in_flight";

// ============================================================================
// Metric Recording Functions
// ============================================================================

/// Record a new session accepted on `transport`.
#[inline]
pub fn record_connection_accepted(transport: &str) {
    counter!(CONNECTIONS_TOTAL, "transport" => transport.to_owned()).increment(1);
    gauge!(CONNECTIONS_ACTIVE, "transport" => transport.to_owned()).increment(1.0);
}

/// Record a session closed.
#[inline]
pub fn record_connection_closed(transport: &str, duration_secs: f64) {
    gauge!(CONNECTIONS_ACTIVE, "transport" => transport.to_owned()).decrement(1.0);
    histogram!(CONNECTION_DURATION_SECONDS).record(duration_secs);
}

/// Record bytes relayed (direction: "inbound" or "outbound").
#[inline]
pub fn record_bytes(role: &'static str, direction: &'static str, bytes: u64) {
    counter!(BYTES_TOTAL, "role" => role, "direction" => direction).increment(bytes);
}

/// Record an error by type.
#[inline]
pub fn record_error(error_type: &'static str) {
    counter!(ERRORS_TOTAL, "type" => error_type).increment(1);
}

/// Record a transport whose listener could not be launched.
#[inline]
pub fn record_listener_failed(transport: &str) {
    counter!(LISTENER_FAILURES_TOTAL, "transport" => transport.to_owned()).increment(1);
}

/// Set the in-flight handler gauge.
#[inline]
pub fn set_handlers_in_flight(count: usize) {
    gauge!(HANDLERS_IN_FLIGHT).set(count as f64);
}

// ============================================================================
// Relay Metrics
// ============================================================================

/// Role label for client-side sessions.
pub const ROLE_CLIENT: &str = "client";
/// Role label for server-side sessions.
pub const ROLE_SERVER: &str = "server";

/// [`RelayMetrics`] backed by the global metrics recorder.
#[derive(Debug, Clone, Copy)]
pub struct PrometheusRelayMetrics {
    role: &'static str,
}

impl PrometheusRelayMetrics {
    pub fn new(role: &'static str) -> Self {
        Self { role }
    }

    pub fn client() -> Self {
        Self::new(ROLE_CLIENT)
    }

    pub fn server() -> Self {
        Self::new(ROLE_SERVER)
    }
}

impl RelayMetrics for PrometheusRelayMetrics {
    #[inline]
    fn record_inbound(&self, bytes: u64) {
        record_bytes(self.role, "inbound", bytes);
    }

    #[inline]
    fn record_outbound(&self, bytes: u64) {
        record_bytes(self.role, "outbound", bytes);
    }
}

// ============================================================================
// Error Type Constants (re-exported from ptrelay-core)
// ============================================================================

pub use ptrelay_core::{
    ERROR_CONFIG, ERROR_DIAL, ERROR_HANDSHAKE, ERROR_IO, ERROR_LISTEN, ERROR_UPSTREAM,
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_listen_address() {
        let err = init_prometheus("not-an-address").unwrap_err();
        assert!(err.contains("invalid metrics listen address"));
    }

    #[test]
    fn recording_without_recorder_is_noop() {
        record_connection_accepted("direct");
        record_connection_closed("direct", 0.5);
        record_error(ERROR_DIAL);
        record_listener_failed("obfs");
        set_handlers_in_flight(3);
        let metrics = PrometheusRelayMetrics::server();
        metrics.record_inbound(10);
        metrics.record_outbound(20);
    }
}
