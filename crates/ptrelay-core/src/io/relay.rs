//! Bidirectional data relay with configurable metrics.
//!
//! Two copy tasks run concurrently, one per direction. Whichever task
//! finishes first (end of stream or an I/O error) closes both connections,
//! which unblocks its sibling immediately. Only the first reported result
//! is returned: once both sockets are torn down, the sibling's failure is
//! an artifact of that teardown and carries no new information.
//!
//! Metrics recording is abstracted via the `RelayMetrics` trait, allowing
//! each role to provide its own metrics backend.

use std::io;
use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::trace;

/// Direction of a single copy task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// First connection to second connection (`a -> b`).
    Inbound,
    /// Second connection to first connection (`b -> a`).
    Outbound,
}

impl Direction {
    pub fn as_str(self) -> &'static str {
        match self {
            Direction::Inbound => "inbound",
            Direction::Outbound => "outbound",
        }
    }
}

/// Trait for recording relay metrics.
///
/// Implementors can record bytes transferred in each direction. The relay
/// runs its copy tasks on the runtime, so implementations must be shareable
/// across threads.
pub trait RelayMetrics: Send + Sync + 'static {
    /// Record bytes copied from the first connection to the second.
    fn record_inbound(&self, bytes: u64);
    /// Record bytes copied from the second connection to the first.
    fn record_outbound(&self, bytes: u64);
}

/// No-op metrics implementation for cases where metrics aren't needed.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpMetrics;

impl RelayMetrics for NoOpMetrics {
    #[inline]
    fn record_inbound(&self, _bytes: u64) {}
    #[inline]
    fn record_outbound(&self, _bytes: u64) {}
}

#[inline]
fn record<M: RelayMetrics + ?Sized>(metrics: &M, direction: Direction, bytes: usize) {
    match direction {
        Direction::Inbound => metrics.record_inbound(bytes as u64),
        Direction::Outbound => metrics.record_outbound(bytes as u64),
    }
}

/// Read → write → flush until the reader reaches end of stream.
async fn copy_until_eof<R, W, M>(
    reader: &mut R,
    writer: &mut W,
    buf: &mut [u8],
    direction: Direction,
    metrics: &M,
) -> io::Result<()>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
    M: RelayMetrics + ?Sized,
{
    loop {
        let n = reader.read(buf).await?;
        if n == 0 {
            return Ok(());
        }
        writer.write_all(&buf[..n]).await?;
        writer.flush().await?;
        record(metrics, direction, n);
    }
}

/// One copy task. Reports its result only if it finished on its own, not
/// when it was interrupted by the sibling closing both connections.
async fn copy_task<R, W, M>(
    mut reader: R,
    mut writer: W,
    buffer_size: usize,
    direction: Direction,
    closed: CancellationToken,
    metrics: Arc<M>,
    results: mpsc::Sender<io::Result<()>>,
) where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
    M: RelayMetrics + ?Sized,
{
    let mut buf = vec![0u8; buffer_size];
    let result = tokio::select! {
        biased;
        _ = closed.cancelled() => None,
        res = copy_until_eof(&mut reader, &mut writer, &mut buf, direction, &*metrics) => Some(res),
    };

    // Close both connections. The sibling observes the token and releases
    // its halves; shutting down an already closed half is not an error here.
    closed.cancel();
    let _ = writer.shutdown().await;
    drop(writer);
    drop(reader);

    if let Some(res) = result {
        trace!(direction = direction.as_str(), ok = res.is_ok(), "copy finished");
        let _ = results.send(res).await;
    }
}

/// Relay bytes between two connections until either direction ends.
///
/// Spawns one task per direction and waits for both. Whichever direction
/// finishes first closes both connections. Returns `Ok(())` when that
/// direction reached end of stream, or its error otherwise.
///
/// # Arguments
///
/// * `a` - The first connection (e.g. the locally accepted connection)
/// * `b` - The second connection (e.g. the transport connection)
/// * `buffer_size` - Size of each direction's read buffer
/// * `metrics` - Metrics recorder for tracking bytes transferred
pub async fn relay_bidirectional<A, B, M>(
    a: A,
    b: B,
    buffer_size: usize,
    metrics: Arc<M>,
) -> io::Result<()>
where
    A: AsyncRead + AsyncWrite + Send + 'static,
    B: AsyncRead + AsyncWrite + Send + 'static,
    M: RelayMetrics + ?Sized,
{
    let (a_r, a_w) = tokio::io::split(a);
    let (b_r, b_w) = tokio::io::split(b);

    let closed = CancellationToken::new();
    let (tx, mut rx) = mpsc::channel(2);

    let inbound = tokio::spawn(copy_task(
        a_r,
        b_w,
        buffer_size,
        Direction::Inbound,
        closed.clone(),
        metrics.clone(),
        tx.clone(),
    ));
    let outbound = tokio::spawn(copy_task(
        b_r,
        a_w,
        buffer_size,
        Direction::Outbound,
        closed,
        metrics,
        tx,
    ));

    let (in_join, out_join) = tokio::join!(inbound, outbound);

    if let Ok(first) = rx.try_recv() {
        return first;
    }
    for joined in [in_join, out_join] {
        joined.map_err(|e| io::Error::other(format!("relay task failed: {e}")))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::pin::Pin;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::task::{Context, Poll};
    use std::time::Duration;
    use tokio::io::{ReadBuf, duplex};

    struct TestMetrics {
        inbound: AtomicU64,
        outbound: AtomicU64,
    }

    impl TestMetrics {
        fn new() -> Self {
            Self {
                inbound: AtomicU64::new(0),
                outbound: AtomicU64::new(0),
            }
        }
    }

    impl RelayMetrics for TestMetrics {
        fn record_inbound(&self, bytes: u64) {
            self.inbound.fetch_add(bytes, Ordering::Relaxed);
        }
        fn record_outbound(&self, bytes: u64) {
            self.outbound.fetch_add(bytes, Ordering::Relaxed);
        }
    }

    /// Stream whose reads fail immediately and whose writes never complete.
    struct ResetStream;

    impl AsyncRead for ResetStream {
        fn poll_read(
            self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            _buf: &mut ReadBuf<'_>,
        ) -> Poll<io::Result<()>> {
            Poll::Ready(Err(io::Error::new(io::ErrorKind::ConnectionReset, "reset")))
        }
    }

    impl AsyncWrite for ResetStream {
        fn poll_write(
            self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            _buf: &[u8],
        ) -> Poll<io::Result<usize>> {
            Poll::Pending
        }
        fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
            Poll::Ready(Ok(()))
        }
        fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
            Poll::Ready(Err(io::Error::new(io::ErrorKind::NotConnected, "closed")))
        }
    }

    #[tokio::test]
    async fn test_relay_basic() {
        let (mut client, server_side) = duplex(1024);
        let (target_side, mut target) = duplex(1024);

        let metrics = Arc::new(TestMetrics::new());
        let relay_metrics = metrics.clone();
        let relay_handle = tokio::spawn(async move {
            relay_bidirectional(server_side, target_side, 1024, relay_metrics).await
        });

        client.write_all(b"hello").await.unwrap();
        let mut buf = vec![0u8; 1024];
        let n = target.read(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], b"hello");

        target.write_all(b"world").await.unwrap();
        let n = client.read(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], b"world");

        drop(client);
        relay_handle.await.unwrap().unwrap();

        assert_eq!(metrics.inbound.load(Ordering::Relaxed), 5);
        assert_eq!(metrics.outbound.load(Ordering::Relaxed), 5);
    }

    #[tokio::test]
    async fn test_relay_closing_one_side_closes_both() {
        let (client, server_side) = duplex(1024);
        let (target_side, mut target) = duplex(1024);

        let relay_handle = tokio::spawn(relay_bidirectional(
            server_side,
            target_side,
            1024,
            Arc::new(NoOpMetrics),
        ));

        // The target never sends anything; closing the client alone must end the relay.
        drop(client);

        let result = tokio::time::timeout(Duration::from_secs(5), relay_handle)
            .await
            .expect("relay did not return after one side closed");
        result.unwrap().unwrap();

        let mut buf = [0u8; 16];
        let n = target.read(&mut buf).await.unwrap();
        assert_eq!(n, 0, "target side should observe the close");
    }

    #[tokio::test]
    async fn test_relay_both_sides_clean_eof() {
        let (client, server_side) = duplex(64);
        let (target_side, target) = duplex(64);
        drop(client);
        drop(target);

        relay_bidirectional(server_side, target_side, 64, Arc::new(NoOpMetrics))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_relay_returns_failing_direction_error() {
        let (_client, server_side) = duplex(64);

        let err = tokio::time::timeout(
            Duration::from_secs(5),
            relay_bidirectional(server_side, ResetStream, 64, Arc::new(NoOpMetrics)),
        )
        .await
        .expect("relay did not return")
        .unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::ConnectionReset);
    }

    #[tokio::test]
    async fn test_relay_failed_close_does_not_mask_clean_eof() {
        // The client side ends cleanly first; shutting down the failing stream
        // errors, and that must not turn the outcome into an error.
        let (client, server_side) = duplex(64);
        drop(client);

        struct Idle;
        impl AsyncRead for Idle {
            fn poll_read(
                self: Pin<&mut Self>,
                _cx: &mut Context<'_>,
                _buf: &mut ReadBuf<'_>,
            ) -> Poll<io::Result<()>> {
                Poll::Pending
            }
        }
        impl AsyncWrite for Idle {
            fn poll_write(
                self: Pin<&mut Self>,
                _cx: &mut Context<'_>,
                buf: &[u8],
            ) -> Poll<io::Result<usize>> {
                Poll::Ready(Ok(buf.len()))
            }
            fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
                Poll::Ready(Ok(()))
            }
            fn poll_shutdown(
                self: Pin<&mut Self>,
                _cx: &mut Context<'_>,
            ) -> Poll<io::Result<()>> {
                Poll::Ready(Err(io::Error::new(io::ErrorKind::NotConnected, "already closed")))
            }
        }

        tokio::time::timeout(
            Duration::from_secs(5),
            relay_bidirectional(server_side, Idle, 64, Arc::new(NoOpMetrics)),
        )
        .await
        .expect("relay did not return")
        .unwrap();
    }
}
