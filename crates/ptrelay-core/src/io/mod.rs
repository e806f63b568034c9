//! I/O utilities for bidirectional relay.
//!
//! This module provides the relay engine used by both the client and the
//! server connection handlers.

mod relay;

pub use relay::{Direction, NoOpMetrics, RelayMetrics, relay_bidirectional};
