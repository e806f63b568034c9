//! Server role for ptrelay.
//!
//! Each configured `(transport, bind address)` pair gets a transport
//! listener. Every accepted transport connection is forwarded to the fixed
//! upstream endpoint and relayed until either side closes.

pub mod cli;
mod error;
mod handler;
pub mod upstream;

pub use cli::ServerArgs;
pub use error::ServerError;

use std::sync::Arc;

use ptrelay_config::ServerConfig;
use ptrelay_core::DEFAULT_RELAY_BUFFER_SIZE;
use ptrelay_core::control::Control;
use ptrelay_core::elide::elide_addr;
use ptrelay_core::io::{NoOpMetrics, RelayMetrics};
use ptrelay_core::listener::{ListenerHandle, Registration};
use ptrelay_core::termmon::TermMonitor;
use ptrelay_transport::registry::ServerFactories;
use ptrelay_transport::{ServerFactory, TransportListener};
use tracing::{error, info};

use upstream::{DirectUpstream, UpstreamDialer, UpstreamInfo};

/// Reported for bind addresses naming a transport this build lacks.
pub const UNSUPPORTED_TRANSPORT: &str = "no such transport is supported";

/// Shared state for every server-role session.
pub struct ServerContext {
    pub upstream: UpstreamInfo,
    pub dialer: Arc<dyn UpstreamDialer>,
    pub monitor: TermMonitor,
    pub relay_buffer_size: usize,
    pub metrics: Arc<dyn RelayMetrics>,
}

impl ServerContext {
    pub fn new(upstream: UpstreamInfo, monitor: TermMonitor) -> Self {
        Self {
            upstream,
            dialer: Arc::new(DirectUpstream::new()),
            monitor,
            relay_buffer_size: DEFAULT_RELAY_BUFFER_SIZE,
            metrics: Arc::new(NoOpMetrics),
        }
    }

    /// Build a context from a validated configuration.
    pub fn from_config(config: &ServerConfig, monitor: TermMonitor) -> Self {
        Self {
            dialer: Arc::new(DirectUpstream::new().with_no_delay(config.server.tcp_no_delay)),
            relay_buffer_size: config.server.relay_buffer_size,
            ..Self::new(UpstreamInfo::new(config.server.upstream.clone()), monitor)
        }
    }

    pub fn with_dialer(mut self, dialer: Arc<dyn UpstreamDialer>) -> Self {
        self.dialer = dialer;
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<dyn RelayMetrics>) -> Self {
        self.metrics = metrics;
        self
    }
}

async fn launch(
    factory: &dyn ServerFactory,
    bind_addr: &str,
) -> Result<(Box<dyn TransportListener>, std::net::SocketAddr), ServerError> {
    let listener = factory.listen(bind_addr).await?;
    let local_addr = listener.local_addr()?;
    Ok((listener, local_addr))
}

/// Launch one transport listener per `(transport, bind address)` pair.
///
/// Unknown transports and listen failures are reported per pair through
/// `control` and skipped. `server_methods_done` is reported exactly once,
/// after every pair was processed.
pub async fn server_setup(
    ctx: ServerContext,
    bind_addrs: &[(String, String)],
    factories: &ServerFactories,
    control: &dyn Control,
) -> Registration {
    let ctx = Arc::new(ctx);
    let mut registration = Registration::default();

    for (name, bind_addr) in bind_addrs {
        let Some(factory) = factories.get(name) else {
            error!(transport = %name, "{}", UNSUPPORTED_TRANSPORT);
            ptrelay_metrics::record_listener_failed(name);
            control.server_method_error(name, UNSUPPORTED_TRANSPORT);
            continue;
        };

        let (listener, local_addr) = match launch(factory.as_ref(), bind_addr).await {
            Ok(launched) => launched,
            Err(e) => {
                error!(transport = %name, addr = %elide_addr(bind_addr), error = %e, "failed to launch listener");
                ptrelay_metrics::record_listener_failed(name);
                control.server_method_error(name, &e.to_string());
                continue;
            }
        };

        let transport: Arc<str> = Arc::from(name.as_str());
        let session_ctx = ctx.clone();
        let handle = ListenerHandle::spawn(name.clone(), local_addr, listener, move |conn, _peer| {
            handler::start_session(conn, transport.clone(), session_ctx.clone())
        });

        info!(transport = %name, addr = %elide_addr(&local_addr.to_string()), "registered listener");
        control.server_method(name, local_addr);
        registration.push(handle);
    }

    control.server_methods_done();
    registration
}
