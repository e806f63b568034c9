//! In-flight connection handler tracking for graceful shutdown.
//!
//! Every connection handler marks itself started and finished on the shared
//! [`TermMonitor`]. The shutdown coordinator closes the listeners and then
//! waits for the in-flight count to reach zero before exiting, so live
//! relays are not cut off.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use tokio::sync::Notify;

/// Tracks in-flight connection handlers.
///
/// Cloning is cheap; all clones share one counter. Each test (or each
/// process) creates its own monitor and passes it to every accept loop.
#[derive(Debug, Clone, Default)]
pub struct TermMonitor {
    inner: Arc<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    active: AtomicUsize,
    zero_notify: Notify,
}

impl TermMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that one more handler is in flight.
    pub fn on_handler_start(&self) {
        self.inner.active.fetch_add(1, Ordering::AcqRel);
    }

    /// Record that one handler has finished.
    pub fn on_handler_finish(&self) {
        // AcqRel: Acquire to see previous increments, Release to make decrement visible
        if self.inner.active.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.inner.zero_notify.notify_waiters();
        }
    }

    /// Mark a handler started and return a guard that marks it finished on drop.
    pub fn start_handler(&self) -> HandlerGuard {
        self.on_handler_start();
        HandlerGuard {
            monitor: self.clone(),
        }
    }

    /// Number of handlers currently in flight.
    pub fn count(&self) -> usize {
        self.inner.active.load(Ordering::Acquire)
    }

    /// Wait until no handler is in flight, or until `timeout` elapses.
    ///
    /// Returns `true` if the count reached zero.
    pub async fn wait_for_zero(&self, timeout: Duration) -> bool {
        tokio::time::timeout(timeout, async {
            loop {
                let notified = self.inner.zero_notify.notified();
                tokio::pin!(notified);
                // Register before checking so a decrement in between is not missed.
                notified.as_mut().enable();
                if self.count() == 0 {
                    return;
                }
                notified.await;
            }
        })
        .await
        .is_ok()
    }
}

/// Guard that marks its handler finished on drop.
#[derive(Debug)]
pub struct HandlerGuard {
    monitor: TermMonitor,
}

impl Drop for HandlerGuard {
    fn drop(&mut self) {
        self.monitor.on_handler_finish();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn start_and_finish_balance() {
        let monitor = TermMonitor::new();
        monitor.on_handler_start();
        monitor.on_handler_start();
        assert_eq!(monitor.count(), 2);
        monitor.on_handler_finish();
        monitor.on_handler_finish();
        assert_eq!(monitor.count(), 0);
    }

    #[test]
    fn guard_finishes_on_drop() {
        let monitor = TermMonitor::new();
        {
            let _guard = monitor.start_handler();
            assert_eq!(monitor.count(), 1);
        }
        assert_eq!(monitor.count(), 0);
    }

    #[test]
    fn clones_share_the_counter() {
        let monitor = TermMonitor::new();
        let other = monitor.clone();
        let _guard = other.start_handler();
        assert_eq!(monitor.count(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn returns_to_zero_after_concurrent_handlers() {
        for m in [0usize, 1, 7, 64] {
            let monitor = TermMonitor::new();
            let mut handles = Vec::with_capacity(m);
            for i in 0..m {
                let guard = monitor.start_handler();
                handles.push(tokio::spawn(async move {
                    let _guard = guard;
                    tokio::time::sleep(Duration::from_millis((i % 5) as u64)).await;
                }));
            }
            assert!(monitor.wait_for_zero(Duration::from_secs(5)).await);
            for handle in handles {
                handle.await.unwrap();
            }
            assert_eq!(monitor.count(), 0);
        }
    }

    #[tokio::test]
    async fn wait_for_zero_times_out_with_live_handler() {
        let monitor = TermMonitor::new();
        let _guard = monitor.start_handler();
        assert!(!monitor.wait_for_zero(Duration::from_millis(20)).await);
    }
}
