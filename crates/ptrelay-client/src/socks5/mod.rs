//! Local handshake adapter.
//!
//! The client role terminates a handshake protocol on each accepted
//! loopback connection to learn where the application wants to go, and
//! answers once the outbound dial has succeeded or failed. [`Socks5Handshake`]
//! is the built-in adapter; the handler only sees [`HandshakeAdapter`].

pub mod handshake;

use std::future::Future;
use std::io::{self, ErrorKind};
use std::pin::Pin;

use ptrelay_transport::error::TransportError;
use tokio::net::TcpStream;

use crate::error::{ClientError, Socks5Error};
use handshake::*;

/// Destination requested by the local application.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandshakeRequest {
    /// `host:port`.
    pub destination: String,
}

/// Outcome reported back to the local application.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyCode {
    Succeeded,
    GeneralFailure,
    ConnectionNotAllowed,
    NetworkUnreachable,
    HostUnreachable,
    ConnectionRefused,
    TtlExpired,
    CommandNotSupported,
    AddressTypeNotSupported,
}

impl ReplyCode {
    /// SOCKS5 wire value.
    pub fn as_u8(self) -> u8 {
        match self {
            ReplyCode::Succeeded => REPLY_SUCCEEDED,
            ReplyCode::GeneralFailure => REPLY_GENERAL_FAILURE,
            ReplyCode::ConnectionNotAllowed => REPLY_CONNECTION_NOT_ALLOWED,
            ReplyCode::NetworkUnreachable => REPLY_NETWORK_UNREACHABLE,
            ReplyCode::HostUnreachable => REPLY_HOST_UNREACHABLE,
            ReplyCode::ConnectionRefused => REPLY_CONNECTION_REFUSED,
            ReplyCode::TtlExpired => REPLY_TTL_EXPIRED,
            ReplyCode::CommandNotSupported => REPLY_COMMAND_NOT_SUPPORTED,
            ReplyCode::AddressTypeNotSupported => REPLY_ADDRESS_TYPE_NOT_SUPPORTED,
        }
    }

    /// Map a dial error to the closest reply.
    pub fn from_io_error(err: &io::Error) -> Self {
        match err.kind() {
            ErrorKind::ConnectionRefused => ReplyCode::ConnectionRefused,
            ErrorKind::NetworkUnreachable => ReplyCode::NetworkUnreachable,
            ErrorKind::HostUnreachable | ErrorKind::AddrNotAvailable => ReplyCode::HostUnreachable,
            ErrorKind::PermissionDenied => ReplyCode::ConnectionNotAllowed,
            ErrorKind::TimedOut => ReplyCode::TtlExpired,
            _ => ReplyCode::GeneralFailure,
        }
    }

    /// Map a transport dial failure to a reply.
    pub fn from_transport_error(err: &TransportError) -> Self {
        match err {
            TransportError::Io(e) => Self::from_io_error(e),
            TransportError::Proxy(_) | TransportError::Config(_) => ReplyCode::GeneralFailure,
        }
    }
}

/// Handshake protocol spoken on client-role listeners.
pub trait HandshakeAdapter: Send + Sync + 'static {
    /// Read the application's request from a freshly accepted connection.
    fn handshake<'a>(
        &'a self,
        conn: &'a mut TcpStream,
    ) -> Pin<Box<dyn Future<Output = Result<HandshakeRequest, ClientError>> + Send + 'a>>;

    /// Report the dial outcome to the application.
    fn reply<'a>(
        &'a self,
        conn: &'a mut TcpStream,
        code: ReplyCode,
    ) -> Pin<Box<dyn Future<Output = io::Result<()>> + Send + 'a>>;
}

/// SOCKS5 CONNECT without authentication.
#[derive(Debug, Clone, Copy, Default)]
pub struct Socks5Handshake;

impl HandshakeAdapter for Socks5Handshake {
    fn handshake<'a>(
        &'a self,
        conn: &'a mut TcpStream,
    ) -> Pin<Box<dyn Future<Output = Result<HandshakeRequest, ClientError>> + Send + 'a>> {
        Box::pin(async move {
            negotiate_method(conn).await?;
            let request = match read_request(conn).await {
                Ok(request) => request,
                Err(e @ Socks5Error::UnsupportedAddressType(_)) => {
                    let _ = send_reply_unspecified(conn, REPLY_ADDRESS_TYPE_NOT_SUPPORTED).await;
                    return Err(e.into());
                }
                Err(e) => return Err(e.into()),
            };
            if request.command != CMD_CONNECT {
                let _ = send_reply_unspecified(conn, REPLY_COMMAND_NOT_SUPPORTED).await;
                return Err(Socks5Error::UnsupportedCommand(request.command).into());
            }
            Ok(HandshakeRequest {
                destination: request.destination(),
            })
        })
    }

    fn reply<'a>(
        &'a self,
        conn: &'a mut TcpStream,
        code: ReplyCode,
    ) -> Pin<Box<dyn Future<Output = io::Result<()>> + Send + 'a>> {
        Box::pin(send_reply_unspecified(conn, code.as_u8()))
    }
}
