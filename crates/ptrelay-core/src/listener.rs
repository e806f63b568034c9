//! Per-listener accept loop and listener bookkeeping.
//!
//! Every registered transport gets one listener and one accept loop task.
//! The loop accepts connections one at a time and spawns a handler task for
//! each, so a slow session never delays the next accept. Transient accept
//! errors are retried; anything else ends the loop and releases the
//! listener without affecting sibling listeners.

use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::pin::Pin;
use std::time::Duration;

use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::defaults::DEFAULT_ACCEPT_BACKOFF_MS;

/// A source of inbound connections.
pub trait Acceptor: Send + 'static {
    /// Connection type produced by a successful accept.
    type Conn: Send + 'static;

    /// Wait for the next inbound connection.
    fn accept(
        &mut self,
    ) -> Pin<Box<dyn Future<Output = io::Result<(Self::Conn, SocketAddr)>> + Send + '_>>;

    /// Release the listener. Called once when the accept loop exits.
    fn close(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Acceptor for TcpListener {
    type Conn = TcpStream;

    fn accept(
        &mut self,
    ) -> Pin<Box<dyn Future<Output = io::Result<(Self::Conn, SocketAddr)>> + Send + '_>> {
        Box::pin(TcpListener::accept(self))
    }
}

/// Errors caused by running out of descriptors or buffers.
fn is_resource_exhaustion(err: &io::Error) -> bool {
    // EMFILE, ENFILE, ENOBUFS, ENOMEM
    matches!(err.raw_os_error(), Some(24) | Some(23) | Some(105) | Some(12))
}

/// Whether an accept error leaves the listener usable.
///
/// Aborted or reset handshakes and interrupted calls concern a single
/// pending connection; descriptor exhaustion clears once sessions end.
/// Everything else means the listener itself is closed or broken.
pub fn is_transient_accept_error(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::ConnectionAborted
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::Interrupted
            | io::ErrorKind::WouldBlock
            | io::ErrorKind::TimedOut
    ) || is_resource_exhaustion(err)
}

/// Accept connections until the listener fails permanently or `closed` is cancelled.
///
/// Each accepted connection is handed to `dispatch`, and the returned future
/// is spawned as its own task.
pub async fn accept_loop<L, F, Fut>(
    name: &str,
    mut listener: L,
    closed: CancellationToken,
    mut dispatch: F,
) -> io::Result<()>
where
    L: Acceptor,
    F: FnMut(L::Conn, SocketAddr) -> Fut,
    Fut: Future<Output = ()> + Send + 'static,
{
    let result = loop {
        let accepted = tokio::select! {
            biased;
            _ = closed.cancelled() => {
                debug!(transport = %name, "listener closed, stopping accept loop");
                break Ok(());
            }
            res = listener.accept() => res,
        };

        match accepted {
            Ok((conn, peer)) => {
                tokio::spawn(dispatch(conn, peer));
            }
            Err(e) if is_transient_accept_error(&e) => {
                debug!(transport = %name, error = %e, "transient accept error");
                if is_resource_exhaustion(&e) {
                    tokio::time::sleep(Duration::from_millis(DEFAULT_ACCEPT_BACKOFF_MS)).await;
                }
            }
            Err(e) => {
                warn!(transport = %name, error = %e, "accept failed, stopping listener");
                break Err(e);
            }
        }
    };

    if let Err(e) = listener.close() {
        debug!(transport = %name, error = %e, "error closing listener");
    }
    result
}

/// A launched listener: its transport name, bound address and accept loop.
#[derive(Debug)]
pub struct ListenerHandle {
    name: String,
    local_addr: SocketAddr,
    closed: CancellationToken,
    task: JoinHandle<io::Result<()>>,
}

impl ListenerHandle {
    /// Start an accept loop for `listener` on its own task.
    pub fn spawn<L, F, Fut>(
        name: impl Into<String>,
        local_addr: SocketAddr,
        listener: L,
        dispatch: F,
    ) -> Self
    where
        L: Acceptor,
        F: FnMut(L::Conn, SocketAddr) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let name = name.into();
        let closed = CancellationToken::new();
        let task = {
            let name = name.clone();
            let closed = closed.clone();
            tokio::spawn(async move { accept_loop(&name, listener, closed, dispatch).await })
        };
        Self {
            name,
            local_addr,
            closed,
            task,
        }
    }

    /// Transport name this listener serves.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The literal address the listener is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Stop accepting. Sessions already dispatched keep running.
    pub fn close(&self) {
        self.closed.cancel();
    }

    /// Whether the accept loop has exited.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait for the accept loop to exit and return its result.
    pub async fn join(self) -> io::Result<()> {
        self.task
            .await
            .map_err(|e| io::Error::other(format!("accept loop task failed: {e}")))?
    }
}

/// Result of registering a set of transports.
#[derive(Debug, Default)]
pub struct Registration {
    /// Whether at least one listener launched.
    pub launched: bool,
    /// Listeners that launched, in registration order.
    pub listeners: Vec<ListenerHandle>,
}

impl Registration {
    /// Record a launched listener.
    pub fn push(&mut self, handle: ListenerHandle) {
        self.launched = true;
        self.listeners.push(handle);
    }

    /// Stop accepting on every listener.
    pub fn close_all(&self) {
        for listener in &self.listeners {
            listener.close();
        }
    }

    /// Close every listener and wait for the accept loops to exit.
    pub async fn shutdown(self) {
        self.close_all();
        for listener in self.listeners {
            let name = listener.name().to_string();
            if let Err(e) = listener.join().await {
                debug!(transport = %name, error = %e, "accept loop ended with error");
            }
        }
        info!("all listeners closed");
    }
}
