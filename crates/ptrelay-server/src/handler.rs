//! Server-role session handler.

use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use ptrelay_core::ERROR_UPSTREAM;
use ptrelay_core::elide::{elide_addr, elide_error};
use ptrelay_core::io::relay_bidirectional;
use ptrelay_core::termmon::HandlerGuard;
use ptrelay_transport::TransportConn;
use tracing::{error, info, warn};

use crate::ServerContext;

/// Count the session as in flight and return its handler future.
///
/// Called from the accept loop, so a connection accepted right before
/// shutdown is already visible to `wait_for_zero` when its task is spawned.
pub(crate) fn start_session(
    conn: TransportConn,
    transport: Arc<str>,
    ctx: Arc<ServerContext>,
) -> impl Future<Output = ()> + Send + 'static {
    let guard = ctx.monitor.start_handler();
    handle_server_conn(conn, transport, ctx, guard)
}

/// Forward one accepted transport connection to the upstream endpoint.
///
/// The transport connection is dropped on every return path.
async fn handle_server_conn(
    conn: TransportConn,
    transport: Arc<str>,
    ctx: Arc<ServerContext>,
    _guard: HandlerGuard,
) {
    let started = Instant::now();
    ptrelay_metrics::record_connection_accepted(&transport);
    ptrelay_metrics::set_handlers_in_flight(ctx.monitor.count());

    let TransportConn { stream, peer } = conn;
    let peer_label = elide_addr(&peer.to_string());
    info!(transport = %transport, peer = %peer_label, "new connection");

    let upstream = match ctx
        .dialer
        .dial_upstream(&ctx.upstream, peer, &transport)
        .await
    {
        Ok(upstream) => upstream,
        Err(e) => {
            error!(transport = %transport, peer = %peer_label, error = %elide_error(&e), "failed to connect to upstream");
            ptrelay_metrics::record_error(ERROR_UPSTREAM);
            ptrelay_metrics::record_connection_closed(&transport, started.elapsed().as_secs_f64());
            return;
        }
    };

    match relay_bidirectional(upstream, stream, ctx.relay_buffer_size, ctx.metrics.clone()).await {
        Ok(()) => info!(transport = %transport, peer = %peer_label, "closed connection"),
        Err(e) => warn!(transport = %transport, peer = %peer_label, error = %elide_error(&e), "closed connection"),
    }
    ptrelay_metrics::record_connection_closed(&transport, started.elapsed().as_secs_f64());
}
