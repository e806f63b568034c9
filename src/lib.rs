//! # ptrelay
//!
//! Connection relay for pluggable transports.
//!
//! ## Crates
//!
//! - [`ptrelay_core`] - Relay engine, termination monitor, accept loop, control lines
//! - [`ptrelay_transport`] - Transport traits and the built-in plain transport
//! - [`ptrelay_config`] - Configuration loading, validation and logging setup
//! - [`ptrelay_metrics`] - Prometheus-compatible metrics
//! - [`ptrelay_client`] - Client role (local SOCKS5 listeners)
//! - [`ptrelay_server`] - Server role (transport listeners to a fixed upstream)

pub use ptrelay_client as client;
pub use ptrelay_config as config;
pub use ptrelay_core as core;
pub use ptrelay_metrics as metrics;
pub use ptrelay_server as server;
pub use ptrelay_transport as transport;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use ptrelay_client::{ClientContext, client_setup};
    pub use ptrelay_config::{load_client_config, load_server_config};
    pub use ptrelay_core::control::{Control, StdoutControl};
    pub use ptrelay_core::io::relay_bidirectional;
    pub use ptrelay_core::termmon::TermMonitor;
    pub use ptrelay_server::{ServerContext, server_setup};
    pub use ptrelay_transport::{ClientFactory, ServerFactory, TransportListener};
}
