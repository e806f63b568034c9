//! Client role for ptrelay.
//!
//! Every configured transport gets its own loopback SOCKS5 listener. Each
//! accepted connection runs the SOCKS5 handshake, dials the requested
//! destination (or the fixed target) through that transport, and relays
//! bytes until either side closes.

pub mod cli;
mod error;
mod handler;
pub mod socks5;

pub use cli::ClientArgs;
pub use error::{ClientError, Socks5Error};

use std::sync::Arc;

use ptrelay_config::ClientConfig;
use ptrelay_core::control::Control;
use ptrelay_core::io::{NoOpMetrics, RelayMetrics};
use ptrelay_core::listener::{ListenerHandle, Registration};
use ptrelay_core::termmon::TermMonitor;
use ptrelay_core::{CLIENT_PROTOCOL_SOCKS5, DEFAULT_CLIENT_BIND_ADDR, DEFAULT_RELAY_BUFFER_SIZE};
use ptrelay_transport::OutboundProxy;
use ptrelay_transport::registry::ClientFactories;
use tokio::net::TcpListener;
use tracing::{error, info};

use socks5::{HandshakeAdapter, Socks5Handshake};

/// Shared state for every client-role session.
pub struct ClientContext {
    /// Fixed destination overriding the handshake's request.
    pub target: Option<String>,
    /// Outbound proxy passed to every dial.
    pub proxy: Option<OutboundProxy>,
    pub monitor: TermMonitor,
    pub handshake: Arc<dyn HandshakeAdapter>,
    pub relay_buffer_size: usize,
    pub metrics: Arc<dyn RelayMetrics>,
    /// Address the per-transport listeners bind to.
    pub bind_addr: String,
}

impl ClientContext {
    pub fn new(monitor: TermMonitor) -> Self {
        Self {
            target: None,
            proxy: None,
            monitor,
            handshake: Arc::new(Socks5Handshake),
            relay_buffer_size: DEFAULT_RELAY_BUFFER_SIZE,
            metrics: Arc::new(NoOpMetrics),
            bind_addr: DEFAULT_CLIENT_BIND_ADDR.to_string(),
        }
    }

    /// Build a context from a validated configuration.
    pub fn from_config(config: &ClientConfig, monitor: TermMonitor) -> Self {
        let proxy = config.client.proxy.as_ref().map(|p| OutboundProxy {
            addr: p.addr.clone(),
            username: p.username.clone(),
            password: p.password.clone(),
        });
        Self {
            target: config.client.target.clone(),
            proxy,
            relay_buffer_size: config.client.relay_buffer_size,
            ..Self::new(monitor)
        }
    }

    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target = Some(target.into());
        self
    }

    pub fn with_proxy(mut self, proxy: OutboundProxy) -> Self {
        self.proxy = Some(proxy);
        self
    }

    pub fn with_handshake(mut self, handshake: Arc<dyn HandshakeAdapter>) -> Self {
        self.handshake = handshake;
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<dyn RelayMetrics>) -> Self {
        self.metrics = metrics;
        self
    }
}

/// Launch one loopback SOCKS5 listener per transport.
///
/// Failures are reported per transport through `control` and never stop
/// the remaining transports from launching. `client_methods_done` is
/// reported exactly once, after every transport was processed.
pub async fn client_setup(
    ctx: ClientContext,
    factories: ClientFactories,
    control: &dyn Control,
) -> Registration {
    let ctx = Arc::new(ctx);
    let mut registration = Registration::default();

    for (name, factory) in factories {
        let bound = match TcpListener::bind(&ctx.bind_addr).await {
            Ok(listener) => listener.local_addr().map(|addr| (listener, addr)),
            Err(e) => Err(e),
        };
        let (listener, addr) = match bound {
            Ok(bound) => bound,
            Err(e) => {
                error!(transport = %name, error = %e, "failed to bind SOCKS5 listener");
                ptrelay_metrics::record_listener_failed(&name);
                control.client_method_error(&name, &e.to_string());
                continue;
            }
        };

        let transport: Arc<str> = Arc::from(name.as_str());
        let session_ctx = ctx.clone();
        let handle = ListenerHandle::spawn(name.clone(), addr, listener, move |stream, peer| {
            handler::start_session(
                stream,
                peer,
                transport.clone(),
                factory.clone(),
                session_ctx.clone(),
            )
        });

        info!(transport = %name, addr = %addr, "SOCKS5 listener started");
        control.client_method(&name, CLIENT_PROTOCOL_SOCKS5, addr);
        registration.push(handle);
    }

    control.client_methods_done();
    registration
}
