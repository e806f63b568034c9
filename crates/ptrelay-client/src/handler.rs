//! Client-role session handler.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use ptrelay_core::ERROR_DIAL;
use ptrelay_core::elide::{elide_addr, elide_error};
use ptrelay_core::io::relay_bidirectional;
use ptrelay_core::termmon::HandlerGuard;
use ptrelay_transport::ClientFactory;
use tokio::net::TcpStream;
use tracing::{debug, error, info, warn};

use crate::ClientContext;
use crate::socks5::ReplyCode;

/// Count the session as in flight and return its handler future.
///
/// Called from the accept loop, so a connection accepted right before
/// shutdown is already visible to `wait_for_zero` when its task is spawned.
pub(crate) fn start_session(
    stream: TcpStream,
    peer: SocketAddr,
    transport: Arc<str>,
    factory: Arc<dyn ClientFactory>,
    ctx: Arc<ClientContext>,
) -> impl Future<Output = ()> + Send + 'static {
    let guard = ctx.monitor.start_handler();
    handle_client_conn(stream, peer, transport, factory, ctx, guard)
}

/// Serve one accepted loopback connection end to end.
///
/// The accepted stream is owned here and dropped on every return path, so
/// the application always sees its connection closed once the session ends.
async fn handle_client_conn(
    mut stream: TcpStream,
    peer: SocketAddr,
    transport: Arc<str>,
    factory: Arc<dyn ClientFactory>,
    ctx: Arc<ClientContext>,
    _guard: HandlerGuard,
) {
    let started = Instant::now();
    ptrelay_metrics::record_connection_accepted(&transport);
    ptrelay_metrics::set_handlers_in_flight(ctx.monitor.count());
    debug!(transport = %transport, peer = %elide_addr(&peer.to_string()), "accepted local connection");

    let request = match ctx.handshake.handshake(&mut stream).await {
        Ok(request) => request,
        Err(e) => {
            error!(transport = %transport, error = %elide_error(&e), "handshake failed");
            ptrelay_metrics::record_error(e.error_type());
            ptrelay_metrics::record_connection_closed(&transport, started.elapsed().as_secs_f64());
            return;
        }
    };

    let destination = ctx.target.clone().unwrap_or(request.destination);
    let target = elide_addr(&destination);

    let outbound = match factory.dial(&destination, ctx.proxy.as_ref()).await {
        Ok(outbound) => outbound,
        Err(e) => {
            if let Err(reply_err) = ctx
                .handshake
                .reply(&mut stream, ReplyCode::from_transport_error(&e))
                .await
            {
                debug!(transport = %transport, error = %reply_err, "failed to send failure reply");
            }
            error!(transport = %transport, target = %target, error = %elide_error(&e), "outbound connection failed");
            ptrelay_metrics::record_error(ERROR_DIAL);
            ptrelay_metrics::record_connection_closed(&transport, started.elapsed().as_secs_f64());
            return;
        }
    };

    if let Err(e) = ctx.handshake.reply(&mut stream, ReplyCode::Succeeded).await {
        error!(transport = %transport, target = %target, error = %elide_error(&e), "failed to send reply");
        ptrelay_metrics::record_connection_closed(&transport, started.elapsed().as_secs_f64());
        return;
    }

    match relay_bidirectional(stream, outbound, ctx.relay_buffer_size, ctx.metrics.clone()).await {
        Ok(()) => info!(transport = %transport, target = %target, "closed connection"),
        Err(e) => warn!(transport = %transport, target = %target, error = %elide_error(&e), "closed connection"),
    }
    ptrelay_metrics::record_connection_closed(&transport, started.elapsed().as_secs_f64());
}

#[cfg(test)]
mod tests {
    use super::*;
    use ptrelay_core::termmon::TermMonitor;
    use ptrelay_transport::plain::DirectClientFactory;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn session_counted_before_first_poll() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (_local, accepted) = tokio::join!(TcpStream::connect(addr), listener.accept());
        let (stream, peer) = accepted.unwrap();

        let monitor = TermMonitor::new();
        let ctx = Arc::new(ClientContext::new(monitor.clone()));
        let session = start_session(
            stream,
            peer,
            Arc::from("direct"),
            Arc::new(DirectClientFactory::new()),
            ctx,
        );
        assert_eq!(monitor.count(), 1);

        drop(session);
        assert_eq!(monitor.count(), 0);
    }
}
