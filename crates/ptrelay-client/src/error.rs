//! Client error types.

use std::fmt;

use ptrelay_core::{ERROR_CONFIG, ERROR_DIAL, ERROR_HANDSHAKE, ERROR_IO};
use ptrelay_transport::error::TransportError;

/// Errors that can occur in the client role.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SOCKS5 error: {0}")]
    Socks5(Socks5Error),

    #[error("dial failed: {0}")]
    Dial(#[from] TransportError),

    #[error("config error: {0}")]
    Config(String),
}

impl ClientError {
    /// Get the error type string for metrics.
    pub fn error_type(&self) -> &'static str {
        match self {
            ClientError::Io(_) => ERROR_IO,
            ClientError::Socks5(_) => ERROR_HANDSHAKE,
            ClientError::Dial(_) => ERROR_DIAL,
            ClientError::Config(_) => ERROR_CONFIG,
        }
    }
}

/// SOCKS5 protocol errors.
#[derive(Debug)]
pub enum Socks5Error {
    InvalidVersion(u8),
    NoAcceptableMethods,
    UnsupportedCommand(u8),
    UnsupportedAddressType(u8),
    InvalidDomain,
    Truncated,
}

impl fmt::Display for Socks5Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidVersion(v) => write!(f, "invalid SOCKS version: 0x{v:02x}"),
            Self::NoAcceptableMethods => write!(f, "no acceptable authentication methods"),
            Self::UnsupportedCommand(c) => write!(f, "unsupported command: 0x{c:02x}"),
            Self::UnsupportedAddressType(a) => write!(f, "unsupported address type: 0x{a:02x}"),
            Self::InvalidDomain => write!(f, "domain name is not valid UTF-8"),
            Self::Truncated => write!(f, "connection closed during handshake"),
        }
    }
}

impl std::error::Error for Socks5Error {}

impl From<Socks5Error> for ClientError {
    fn from(e: Socks5Error) -> Self {
        Self::Socks5(e)
    }
}
