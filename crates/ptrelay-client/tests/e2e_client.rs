#![allow(clippy::tests_outside_test_module)]
use std::collections::BTreeMap;
use std::future::Future;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use ptrelay_client::{ClientContext, client_setup};
use ptrelay_core::control::{ControlEvent, MemoryControl};
use ptrelay_core::termmon::TermMonitor;
use ptrelay_transport::error::TransportError;
use ptrelay_transport::plain::DirectClientFactory;
use ptrelay_transport::registry::ClientFactories;
use ptrelay_transport::{BoxedStream, ClientFactory, OutboundProxy};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_test_writer()
        .try_init();
}

struct TcpEchoServer {
    addr: SocketAddr,
    shutdown: CancellationToken,
    handle: JoinHandle<()>,
}

impl TcpEchoServer {
    async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let shutdown = CancellationToken::new();
        let token = shutdown.clone();
        let handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    res = listener.accept() => {
                        let Ok((mut stream, _)) = res else { break };
                        tokio::spawn(async move {
                            let (mut r, mut w) = stream.split();
                            let _ = tokio::io::copy(&mut r, &mut w).await;
                        });
                    }
                }
            }
        });
        Self {
            addr,
            shutdown,
            handle,
        }
    }

    async fn stop(self) {
        self.shutdown.cancel();
        let _ = self.handle.await;
    }
}

/// Direct dialer that rewrites configured destinations to local addresses.
struct MappedFactory {
    routes: BTreeMap<String, SocketAddr>,
    inner: DirectClientFactory,
}

impl ClientFactory for MappedFactory {
    fn dial<'a>(
        &'a self,
        destination: &'a str,
        proxy: Option<&'a OutboundProxy>,
    ) -> Pin<Box<dyn Future<Output = Result<BoxedStream, TransportError>> + Send + 'a>> {
        Box::pin(async move {
            let mapped = self
                .routes
                .get(destination)
                .map(|addr| addr.to_string())
                .unwrap_or_else(|| destination.to_string());
            self.inner.dial(&mapped, proxy).await
        })
    }
}

fn mapped_factories(destination: &str, addr: SocketAddr) -> ClientFactories {
    let factory: Arc<dyn ClientFactory> = Arc::new(MappedFactory {
        routes: BTreeMap::from([(destination.to_string(), addr)]),
        inner: DirectClientFactory::new(),
    });
    ClientFactories::from([("direct".to_string(), factory)])
}

fn socks_addr(control: &MemoryControl, transport: &str) -> SocketAddr {
    control
        .events()
        .into_iter()
        .find_map(|event| match event {
            ControlEvent::ClientMethod { name, addr, .. } if name == transport => Some(addr),
            _ => None,
        })
        .expect("transport listener not reported")
}

/// Run the SOCKS5 greeting and CONNECT for an IPv4 destination; returns the reply code.
async fn socks5_connect(stream: &mut TcpStream, ip: [u8; 4], port: u16) -> u8 {
    stream.write_all(&[5, 1, 0]).await.unwrap();
    let mut method = [0u8; 2];
    stream.read_exact(&mut method).await.unwrap();
    assert_eq!(method, [5, 0]);

    let mut req = vec![5, 1, 0, 1];
    req.extend_from_slice(&ip);
    req.extend_from_slice(&port.to_be_bytes());
    stream.write_all(&req).await.unwrap();

    let mut reply = [0u8; 10];
    stream.read_exact(&mut reply).await.unwrap();
    reply[1]
}

async fn wait_for_zero(monitor: &TermMonitor) {
    assert!(
        monitor.wait_for_zero(Duration::from_secs(5)).await,
        "handlers still in flight: {}",
        monitor.count()
    );
}

#[tokio::test]
async fn direct_transport_relays_to_destination() {
    init_tracing();
    let echo = TcpEchoServer::start().await;
    let monitor = TermMonitor::new();
    let control = MemoryControl::new();

    let registration = client_setup(
        ClientContext::new(monitor.clone()),
        mapped_factories("203.0.113.5:9000", echo.addr),
        &control,
    )
    .await;
    assert!(registration.launched);
    let events = control.events();
    assert_eq!(events.len(), 2);
    assert_eq!(events[1], ControlEvent::ClientMethodsDone);
    let addr = socks_addr(&control, "direct");
    assert!(addr.ip().is_loopback());
    assert_ne!(addr.port(), 0);

    let mut stream = TcpStream::connect(addr).await.unwrap();
    assert_eq!(socks5_connect(&mut stream, [203, 0, 113, 5], 9000).await, 0);

    stream.write_all(b"ping").await.unwrap();
    let mut buf = [0u8; 4];
    stream.read_exact(&mut buf).await.unwrap();
    assert_eq!(&buf, b"ping");

    // Closing the local side ends the session and releases the handler.
    drop(stream);
    wait_for_zero(&monitor).await;

    registration.shutdown().await;
    echo.stop().await;
}

#[tokio::test]
async fn remote_close_propagates_to_local() {
    init_tracing();
    let remote = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let remote_addr = remote.local_addr().unwrap();
    let monitor = TermMonitor::new();
    let control = MemoryControl::new();

    let registration = client_setup(
        ClientContext::new(monitor.clone()),
        mapped_factories("203.0.113.5:9000", remote_addr),
        &control,
    )
    .await;
    let addr = socks_addr(&control, "direct");

    let mut stream = TcpStream::connect(addr).await.unwrap();
    let (reply, accepted) = tokio::join!(
        socks5_connect(&mut stream, [203, 0, 113, 5], 9000),
        remote.accept()
    );
    assert_eq!(reply, 0);
    let (mut remote_conn, _) = accepted.unwrap();

    remote_conn.write_all(b"bye").await.unwrap();
    drop(remote_conn);

    let mut received = Vec::new();
    tokio::time::timeout(Duration::from_secs(5), stream.read_to_end(&mut received))
        .await
        .expect("local side not closed")
        .unwrap();
    assert_eq!(received, b"bye");
    wait_for_zero(&monitor).await;

    registration.shutdown().await;
}

#[tokio::test]
async fn local_close_propagates_to_destination() {
    init_tracing();
    let destination = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let destination_addr = destination.local_addr().unwrap();
    let monitor = TermMonitor::new();
    let control = MemoryControl::new();

    let registration = client_setup(
        ClientContext::new(monitor.clone()),
        mapped_factories("203.0.113.5:9000", destination_addr),
        &control,
    )
    .await;
    let addr = socks_addr(&control, "direct");

    let mut stream = TcpStream::connect(addr).await.unwrap();
    let (reply, accepted) = tokio::join!(
        socks5_connect(&mut stream, [203, 0, 113, 5], 9000),
        destination.accept()
    );
    assert_eq!(reply, 0);
    let (mut destination_conn, _) = accepted.unwrap();

    stream.write_all(b"ping").await.unwrap();
    let mut buf = [0u8; 4];
    destination_conn.read_exact(&mut buf).await.unwrap();
    assert_eq!(&buf, b"ping");

    drop(stream);

    let mut rest = Vec::new();
    let n = tokio::time::timeout(Duration::from_secs(5), destination_conn.read_to_end(&mut rest))
        .await
        .expect("destination side not closed")
        .unwrap();
    assert_eq!(n, 0);
    wait_for_zero(&monitor).await;

    registration.shutdown().await;
}

#[tokio::test]
async fn fixed_target_overrides_request() {
    init_tracing();
    let echo = TcpEchoServer::start().await;
    let monitor = TermMonitor::new();
    let control = MemoryControl::new();

    let factories: ClientFactories = ClientFactories::from([(
        "direct".to_string(),
        Arc::new(DirectClientFactory::new()) as Arc<dyn ClientFactory>,
    )]);
    let ctx = ClientContext::new(monitor.clone()).with_target(echo.addr.to_string());
    let registration = client_setup(ctx, factories, &control).await;
    let addr = socks_addr(&control, "direct");

    let mut stream = TcpStream::connect(addr).await.unwrap();
    // The requested destination is unroutable; the fixed target wins.
    assert_eq!(socks5_connect(&mut stream, [192, 0, 2, 1], 1).await, 0);
    stream.write_all(b"fixed").await.unwrap();
    let mut buf = [0u8; 5];
    stream.read_exact(&mut buf).await.unwrap();
    assert_eq!(&buf, b"fixed");

    drop(stream);
    wait_for_zero(&monitor).await;
    registration.shutdown().await;
    echo.stop().await;
}

#[tokio::test]
async fn dial_failure_replies_and_closes() {
    init_tracing();
    let refused = {
        let l = TcpListener::bind("127.0.0.1:0").await.unwrap();
        l.local_addr().unwrap()
    };
    let monitor = TermMonitor::new();
    let control = MemoryControl::new();

    let registration = client_setup(
        ClientContext::new(monitor.clone()),
        mapped_factories("203.0.113.5:9000", refused),
        &control,
    )
    .await;
    let addr = socks_addr(&control, "direct");

    let mut stream = TcpStream::connect(addr).await.unwrap();
    // Connection refused
    assert_eq!(socks5_connect(&mut stream, [203, 0, 113, 5], 9000).await, 0x05);
    let mut rest = Vec::new();
    stream.read_to_end(&mut rest).await.unwrap();
    assert!(rest.is_empty());

    wait_for_zero(&monitor).await;
    registration.shutdown().await;
}

#[tokio::test]
async fn bind_failure_is_reported_per_transport() {
    init_tracing();
    let monitor = TermMonitor::new();
    let control = MemoryControl::new();

    let direct: Arc<dyn ClientFactory> = Arc::new(DirectClientFactory::new());
    let factories = ClientFactories::from([
        ("a".to_string(), direct.clone()),
        ("b".to_string(), direct),
    ]);
    let mut ctx = ClientContext::new(monitor);
    // Not a local address: every bind fails.
    ctx.bind_addr = "192.0.2.1:0".to_string();
    let registration = client_setup(ctx, factories, &control).await;

    assert!(!registration.launched);
    let events = control.events();
    assert_eq!(events.len(), 3);
    assert!(matches!(&events[0], ControlEvent::ClientMethodError { name, .. } if name == "a"));
    assert!(matches!(&events[1], ControlEvent::ClientMethodError { name, .. } if name == "b"));
    assert_eq!(events[2], ControlEvent::ClientMethodsDone);
}
