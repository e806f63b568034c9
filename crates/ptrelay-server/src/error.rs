//! Server error types.

use ptrelay_core::{ERROR_CONFIG, ERROR_IO, ERROR_LISTEN, ERROR_UPSTREAM};
use ptrelay_transport::error::TransportError;

/// Server error type.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("listen: {0}")]
    Listen(#[from] TransportError),
    #[error("upstream: {0}")]
    Upstream(std::io::Error),
    #[error("config: {0}")]
    Config(String),
}

impl ServerError {
    /// Get the error type string for metrics.
    pub fn error_type(&self) -> &'static str {
        match self {
            ServerError::Io(_) => ERROR_IO,
            ServerError::Listen(_) => ERROR_LISTEN,
            ServerError::Upstream(_) => ERROR_UPSTREAM,
            ServerError::Config(_) => ERROR_CONFIG,
        }
    }
}
