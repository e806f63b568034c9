//! Error types for the transport crate.

use std::io;

use ptrelay_core::{ERROR_CONFIG, ERROR_DIAL, ERROR_IO};
use thiserror::Error;

/// Errors that can occur in transport operations.
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("io: {0}")]
    Io(#[from] io::Error),

    #[error("config: {0}")]
    Config(String),

    #[error("outbound proxy: {0}")]
    Proxy(String),
}

impl TransportError {
    /// Error label for metrics.
    pub fn error_type(&self) -> &'static str {
        match self {
            TransportError::Io(_) => ERROR_IO,
            TransportError::Config(_) => ERROR_CONFIG,
            TransportError::Proxy(_) => ERROR_DIAL,
        }
    }
}

impl From<TransportError> for io::Error {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::Io(e) => e,
            TransportError::Config(msg) => io::Error::new(io::ErrorKind::InvalidInput, msg),
            TransportError::Proxy(msg) => io::Error::new(io::ErrorKind::ConnectionRefused, msg),
        }
    }
}
