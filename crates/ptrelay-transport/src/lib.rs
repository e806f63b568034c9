//! Pluggable transport abstraction for ptrelay.
//!
//! A transport is an opaque factory. In the client role it turns a
//! destination into an outbound connection; in the server role it turns a
//! bind address into a listener that accepts transport-wrapped connections.
//! The relay core depends only on these traits and never inspects what a
//! transport does to the byte stream.
//!
//! # Transports
//!
//! - [`plain`]: direct TCP dialer (client) and identity listener (server).
//! - [`proxy`]: SOCKS5 outbound proxy support used by the direct dialer.

pub mod error;
pub mod plain;
pub mod proxy;
pub mod registry;

use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::pin::Pin;

use ptrelay_core::listener::Acceptor;
use tokio::io::{AsyncRead, AsyncWrite};

use error::TransportError;
pub use proxy::OutboundProxy;

/// Marker trait for streams usable by the relay system.
pub trait TransportStream: AsyncRead + AsyncWrite + Unpin + Send + 'static {}

impl<T: AsyncRead + AsyncWrite + Unpin + Send + 'static> TransportStream for T {}

/// Type-erased transport stream. Dropping it closes the network connection.
pub type BoxedStream = Box<dyn TransportStream>;

/// A connection accepted by a transport listener.
pub struct TransportConn {
    /// The transport-wrapped stream.
    pub stream: BoxedStream,
    /// Address of the remote peer on the underlying network connection.
    pub peer: SocketAddr,
}

impl TransportConn {
    pub fn new(stream: impl TransportStream, peer: SocketAddr) -> Self {
        Self {
            stream: Box::new(stream),
            peer,
        }
    }
}

impl std::fmt::Debug for TransportConn {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransportConn")
            .field("peer", &self.peer)
            .finish_non_exhaustive()
    }
}

/// A bound transport listener (server role).
pub trait TransportListener: Send + 'static {
    /// Accept the next transport connection.
    fn accept(
        &mut self,
    ) -> Pin<Box<dyn Future<Output = Result<TransportConn, TransportError>> + Send + '_>>;

    /// The address the listener is bound to.
    fn local_addr(&self) -> io::Result<SocketAddr>;

    /// Stop listening. Further accepts fail with a non-transient error.
    fn close(&mut self) -> Result<(), TransportError>;
}

/// Dials outbound connections through a transport (client role).
pub trait ClientFactory: Send + Sync + 'static {
    /// Connect to `destination` (`host:port`), optionally through `proxy`.
    fn dial<'a>(
        &'a self,
        destination: &'a str,
        proxy: Option<&'a OutboundProxy>,
    ) -> Pin<Box<dyn Future<Output = Result<BoxedStream, TransportError>> + Send + 'a>>;
}

/// Creates transport listeners (server role).
pub trait ServerFactory: Send + Sync + 'static {
    /// Bind a transport listener on `bind_addr` (`host:port`).
    fn listen<'a>(
        &'a self,
        bind_addr: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Box<dyn TransportListener>, TransportError>> + Send + 'a>>;
}

impl Acceptor for Box<dyn TransportListener> {
    type Conn = TransportConn;

    fn accept(
        &mut self,
    ) -> Pin<Box<dyn Future<Output = io::Result<(TransportConn, SocketAddr)>> + Send + '_>> {
        Box::pin(async move {
            let conn = TransportListener::accept(&mut **self).await?;
            let peer = conn.peer;
            Ok((conn, peer))
        })
    }

    fn close(&mut self) -> io::Result<()> {
        TransportListener::close(&mut **self).map_err(io::Error::from)
    }
}
