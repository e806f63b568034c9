//! Plain TCP transport (no obfuscation).
//!
//! The client side dials the destination directly, or through the
//! configured outbound proxy. The server side is an identity listener that
//! hands accepted TCP streams to the relay unchanged.

use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::pin::Pin;

use ptrelay_core::DEFAULT_CONNECTION_BACKLOG;
use socket2::{Domain, Protocol, Socket, Type};
use tokio::net::{TcpListener, TcpStream};
use tracing::debug;

use crate::error::TransportError;
use crate::proxy::{OutboundProxy, connect_socks5};
use crate::{BoxedStream, ClientFactory, ServerFactory, TransportConn, TransportListener};

/// Direct TCP dialer.
#[derive(Debug, Clone)]
pub struct DirectClientFactory {
    no_delay: bool,
}

impl DirectClientFactory {
    pub fn new() -> Self {
        Self {
            no_delay: ptrelay_core::DEFAULT_TCP_NO_DELAY,
        }
    }

    pub fn with_no_delay(mut self, no_delay: bool) -> Self {
        self.no_delay = no_delay;
        self
    }

    async fn connect(&self, addr: &str) -> Result<TcpStream, TransportError> {
        let tcp = TcpStream::connect(addr).await?;
        tcp.set_nodelay(self.no_delay)?;
        Ok(tcp)
    }
}

impl Default for DirectClientFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl ClientFactory for DirectClientFactory {
    fn dial<'a>(
        &'a self,
        destination: &'a str,
        proxy: Option<&'a OutboundProxy>,
    ) -> Pin<Box<dyn Future<Output = Result<BoxedStream, TransportError>> + Send + 'a>> {
        Box::pin(async move {
            match proxy {
                Some(proxy) => {
                    debug!("dialing through outbound proxy");
                    let mut tcp = self.connect(&proxy.addr).await?;
                    connect_socks5(&mut tcp, destination, proxy).await?;
                    Ok(Box::new(tcp) as BoxedStream)
                }
                None => Ok(Box::new(self.connect(destination).await?) as BoxedStream),
            }
        })
    }
}

/// Create a TCP listener with an explicit backlog.
pub fn create_listener(addr: SocketAddr, backlog: u32) -> io::Result<TcpListener> {
    let domain = if addr.is_ipv4() {
        Domain::IPV4
    } else {
        Domain::IPV6
    };
    let socket = Socket::new(domain, Type::STREAM, Some(Protocol::TCP))?;
    socket.set_reuse_address(true)?;
    socket.set_nonblocking(true)?;
    socket.bind(&addr.into())?;
    socket.listen(backlog as i32)?;
    TcpListener::from_std(std::net::TcpListener::from(socket))
}

/// Resolve a `host:port` bind address to the first socket address.
pub async fn resolve_bind_addr(bind_addr: &str) -> Result<SocketAddr, TransportError> {
    if let Ok(addr) = bind_addr.parse::<SocketAddr>() {
        return Ok(addr);
    }
    tokio::net::lookup_host(bind_addr)
        .await?
        .next()
        .ok_or_else(|| TransportError::Config(format!("bind address did not resolve: {bind_addr}")))
}

/// Identity server transport.
#[derive(Debug, Clone)]
pub struct PlainServerFactory {
    backlog: u32,
}

impl PlainServerFactory {
    pub fn new() -> Self {
        Self {
            backlog: DEFAULT_CONNECTION_BACKLOG,
        }
    }

    pub fn with_backlog(mut self, backlog: u32) -> Self {
        self.backlog = backlog;
        self
    }
}

impl Default for PlainServerFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl ServerFactory for PlainServerFactory {
    fn listen<'a>(
        &'a self,
        bind_addr: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Box<dyn TransportListener>, TransportError>> + Send + 'a>>
    {
        Box::pin(async move {
            let addr = resolve_bind_addr(bind_addr).await?;
            let listener = create_listener(addr, self.backlog)?;
            Ok(Box::new(PlainListener::new(listener)) as Box<dyn TransportListener>)
        })
    }
}

/// TCP listener that passes accepted streams through untouched.
#[derive(Debug)]
pub struct PlainListener {
    inner: Option<TcpListener>,
}

impl PlainListener {
    pub fn new(listener: TcpListener) -> Self {
        Self {
            inner: Some(listener),
        }
    }
}

fn listener_closed() -> io::Error {
    io::Error::new(io::ErrorKind::NotConnected, "listener closed")
}

impl TransportListener for PlainListener {
    fn accept(
        &mut self,
    ) -> Pin<Box<dyn Future<Output = Result<TransportConn, TransportError>> + Send + '_>> {
        Box::pin(async move {
            let listener = self.inner.as_ref().ok_or_else(listener_closed)?;
            let (tcp, peer) = listener.accept().await?;
            Ok(TransportConn::new(tcp, peer))
        })
    }

    fn local_addr(&self) -> io::Result<SocketAddr> {
        self.inner
            .as_ref()
            .ok_or_else(listener_closed)?
            .local_addr()
    }

    fn close(&mut self) -> Result<(), TransportError> {
        self.inner = None;
        Ok(())
    }
}
