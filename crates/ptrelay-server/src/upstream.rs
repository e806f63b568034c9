//! Connecting accepted transport sessions to the upstream endpoint.

use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::pin::Pin;

use ptrelay_transport::BoxedStream;
use tokio::net::TcpStream;
use tracing::debug;

use ptrelay_core::elide::elide_addr;

/// The fixed endpoint every server-role session is forwarded to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpstreamInfo {
    /// `host:port`.
    pub addr: String,
}

impl UpstreamInfo {
    pub fn new(addr: impl Into<String>) -> Self {
        Self { addr: addr.into() }
    }
}

/// Opens connections to the upstream endpoint.
///
/// The peer address and transport name of the session are passed along so
/// dialers that forward session metadata upstream can do so.
pub trait UpstreamDialer: Send + Sync + 'static {
    fn dial_upstream<'a>(
        &'a self,
        upstream: &'a UpstreamInfo,
        peer: SocketAddr,
        transport: &'a str,
    ) -> Pin<Box<dyn Future<Output = io::Result<BoxedStream>> + Send + 'a>>;
}

/// Plain TCP connection to the upstream address.
#[derive(Debug, Clone)]
pub struct DirectUpstream {
    no_delay: bool,
}

impl DirectUpstream {
    pub fn new() -> Self {
        Self {
            no_delay: ptrelay_core::DEFAULT_TCP_NO_DELAY,
        }
    }

    pub fn with_no_delay(mut self, no_delay: bool) -> Self {
        self.no_delay = no_delay;
        self
    }
}

impl Default for DirectUpstream {
    fn default() -> Self {
        Self::new()
    }
}

impl UpstreamDialer for DirectUpstream {
    fn dial_upstream<'a>(
        &'a self,
        upstream: &'a UpstreamInfo,
        _peer: SocketAddr,
        transport: &'a str,
    ) -> Pin<Box<dyn Future<Output = io::Result<BoxedStream>> + Send + 'a>> {
        Box::pin(async move {
            let tcp = TcpStream::connect(&upstream.addr).await?;
            tcp.set_nodelay(self.no_delay)?;
            debug!(transport = %transport, upstream = %elide_addr(&upstream.addr), "upstream connected");
            Ok(Box::new(tcp) as BoxedStream)
        })
    }
}
