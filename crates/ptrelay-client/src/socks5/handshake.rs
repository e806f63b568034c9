//! SOCKS5 handshake: method negotiation and command parsing (RFC 1928).

use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::Socks5Error;

const SOCKS5_VERSION: u8 = 0x05;
const METHOD_NO_AUTH: u8 = 0x00;
const METHOD_NO_ACCEPTABLE: u8 = 0xFF;

pub const CMD_CONNECT: u8 = 0x01;

const ATYP_IPV4: u8 = 0x01;
const ATYP_DOMAIN: u8 = 0x03;
const ATYP_IPV6: u8 = 0x04;

/// SOCKS5 reply codes.
pub const REPLY_SUCCEEDED: u8 = 0x00;
pub const REPLY_GENERAL_FAILURE: u8 = 0x01;
pub const REPLY_CONNECTION_NOT_ALLOWED: u8 = 0x02;
pub const REPLY_NETWORK_UNREACHABLE: u8 = 0x03;
pub const REPLY_HOST_UNREACHABLE: u8 = 0x04;
pub const REPLY_CONNECTION_REFUSED: u8 = 0x05;
pub const REPLY_TTL_EXPIRED: u8 = 0x06;
pub const REPLY_COMMAND_NOT_SUPPORTED: u8 = 0x07;
pub const REPLY_ADDRESS_TYPE_NOT_SUPPORTED: u8 = 0x08;

/// Requested destination host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Host {
    Ipv4(Ipv4Addr),
    Ipv6(Ipv6Addr),
    Domain(String),
}

/// Parsed SOCKS5 request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Socks5Request {
    pub command: u8,
    pub host: Host,
    pub port: u16,
}

impl Socks5Request {
    /// Destination as `host:port`, with IPv6 literals bracketed.
    pub fn destination(&self) -> String {
        match &self.host {
            Host::Ipv4(ip) => SocketAddr::from((*ip, self.port)).to_string(),
            Host::Ipv6(ip) => SocketAddr::from((*ip, self.port)).to_string(),
            Host::Domain(name) => format!("{}:{}", name, self.port),
        }
    }
}

/// Perform SOCKS5 method negotiation (server side).
///
/// Reads the client's greeting and responds with NO AUTH (0x00).
pub async fn negotiate_method<S>(stream: &mut S) -> Result<(), Socks5Error>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut header = [0u8; 2];
    stream
        .read_exact(&mut header)
        .await
        .map_err(|_| Socks5Error::Truncated)?;

    if header[0] != SOCKS5_VERSION {
        return Err(Socks5Error::InvalidVersion(header[0]));
    }

    let nmethods = header[1] as usize;
    let mut methods = vec![0u8; nmethods];
    stream
        .read_exact(&mut methods)
        .await
        .map_err(|_| Socks5Error::Truncated)?;

    if methods.contains(&METHOD_NO_AUTH) {
        stream
            .write_all(&[SOCKS5_VERSION, METHOD_NO_AUTH])
            .await
            .map_err(|_| Socks5Error::Truncated)?;
        Ok(())
    } else {
        let _ = stream
            .write_all(&[SOCKS5_VERSION, METHOD_NO_ACCEPTABLE])
            .await;
        Err(Socks5Error::NoAcceptableMethods)
    }
}

/// Read the SOCKS5 request after method negotiation.
pub async fn read_request<S>(stream: &mut S) -> Result<Socks5Request, Socks5Error>
where
    S: AsyncRead + Unpin,
{
    // VER CMD RSV ATYP
    let mut header = [0u8; 4];
    stream
        .read_exact(&mut header)
        .await
        .map_err(|_| Socks5Error::Truncated)?;

    if header[0] != SOCKS5_VERSION {
        return Err(Socks5Error::InvalidVersion(header[0]));
    }

    let command = header[1];
    let (host, port) = read_address(stream, header[3]).await?;

    Ok(Socks5Request {
        command,
        host,
        port,
    })
}

async fn read_port<S>(stream: &mut S) -> Result<u16, Socks5Error>
where
    S: AsyncRead + Unpin,
{
    let mut buf = [0u8; 2];
    stream
        .read_exact(&mut buf)
        .await
        .map_err(|_| Socks5Error::Truncated)?;
    Ok(u16::from_be_bytes(buf))
}

async fn read_address<S>(stream: &mut S, atyp: u8) -> Result<(Host, u16), Socks5Error>
where
    S: AsyncRead + Unpin,
{
    let host = match atyp {
        ATYP_IPV4 => {
            let mut buf = [0u8; 4];
            stream
                .read_exact(&mut buf)
                .await
                .map_err(|_| Socks5Error::Truncated)?;
            Host::Ipv4(Ipv4Addr::from(buf))
        }
        ATYP_DOMAIN => {
            let mut len_buf = [0u8; 1];
            stream
                .read_exact(&mut len_buf)
                .await
                .map_err(|_| Socks5Error::Truncated)?;
            let mut domain = vec![0u8; len_buf[0] as usize];
            stream
                .read_exact(&mut domain)
                .await
                .map_err(|_| Socks5Error::Truncated)?;
            let name = String::from_utf8(domain).map_err(|_| Socks5Error::InvalidDomain)?;
            if name.is_empty() {
                return Err(Socks5Error::InvalidDomain);
            }
            Host::Domain(name)
        }
        ATYP_IPV6 => {
            let mut buf = [0u8; 16];
            stream
                .read_exact(&mut buf)
                .await
                .map_err(|_| Socks5Error::Truncated)?;
            Host::Ipv6(Ipv6Addr::from(buf))
        }
        _ => return Err(Socks5Error::UnsupportedAddressType(atyp)),
    };
    let port = read_port(stream).await?;
    Ok((host, port))
}

/// Send a SOCKS5 reply.
pub async fn send_reply<S>(stream: &mut S, reply: u8, bind_addr: &SocketAddr) -> std::io::Result<()>
where
    S: AsyncWrite + Unpin,
{
    let mut buf = Vec::with_capacity(22);
    buf.push(SOCKS5_VERSION);
    buf.push(reply);
    buf.push(0x00); // RSV

    match bind_addr {
        SocketAddr::V4(addr) => {
            buf.push(ATYP_IPV4);
            buf.extend_from_slice(&addr.ip().octets());
        }
        SocketAddr::V6(addr) => {
            buf.push(ATYP_IPV6);
            buf.extend_from_slice(&addr.ip().octets());
        }
    }
    buf.extend_from_slice(&bind_addr.port().to_be_bytes());

    stream.write_all(&buf).await?;
    stream.flush().await
}

/// Send a SOCKS5 reply with a zeroed bind address (0.0.0.0:0).
pub async fn send_reply_unspecified<S>(stream: &mut S, reply: u8) -> std::io::Result<()>
where
    S: AsyncWrite + Unpin,
{
    let addr = SocketAddr::from(([0, 0, 0, 0], 0u16));
    send_reply(stream, reply, &addr).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::duplex;

    #[tokio::test]
    async fn negotiates_no_auth() {
        let (mut client, mut server) = duplex(64);
        client.write_all(&[5, 2, 0x02, 0x00]).await.unwrap();
        negotiate_method(&mut server).await.unwrap();
        let mut resp = [0u8; 2];
        client.read_exact(&mut resp).await.unwrap();
        assert_eq!(resp, [5, METHOD_NO_AUTH]);
    }

    #[tokio::test]
    async fn rejects_without_no_auth() {
        let (mut client, mut server) = duplex(64);
        client.write_all(&[5, 1, 0x02]).await.unwrap();
        let err = negotiate_method(&mut server).await.unwrap_err();
        assert!(matches!(err, Socks5Error::NoAcceptableMethods));
        let mut resp = [0u8; 2];
        client.read_exact(&mut resp).await.unwrap();
        assert_eq!(resp, [5, METHOD_NO_ACCEPTABLE]);
    }

    #[tokio::test]
    async fn rejects_wrong_version() {
        let (mut client, mut server) = duplex(64);
        client.write_all(&[4, 1, 0]).await.unwrap();
        let err = negotiate_method(&mut server).await.unwrap_err();
        assert!(matches!(err, Socks5Error::InvalidVersion(4)));
    }

    #[tokio::test]
    async fn reads_each_address_type() {
        let (mut client, mut server) = duplex(256);

        client
            .write_all(&[5, CMD_CONNECT, 0, ATYP_IPV4, 203, 0, 113, 5, 0x23, 0x28])
            .await
            .unwrap();
        let req = read_request(&mut server).await.unwrap();
        assert_eq!(req.destination(), "203.0.113.5:9000");

        let mut msg = vec![5, CMD_CONNECT, 0, ATYP_DOMAIN, 11];
        msg.extend_from_slice(b"example.com");
        msg.extend_from_slice(&443u16.to_be_bytes());
        client.write_all(&msg).await.unwrap();
        let req = read_request(&mut server).await.unwrap();
        assert_eq!(req.host, Host::Domain("example.com".into()));
        assert_eq!(req.destination(), "example.com:443");

        let mut msg = vec![5, CMD_CONNECT, 0, ATYP_IPV6];
        msg.extend_from_slice(&Ipv6Addr::LOCALHOST.octets());
        msg.extend_from_slice(&80u16.to_be_bytes());
        client.write_all(&msg).await.unwrap();
        let req = read_request(&mut server).await.unwrap();
        assert_eq!(req.destination(), "[::1]:80");
    }

    #[tokio::test]
    async fn unsupported_address_type() {
        let (mut client, mut server) = duplex(64);
        client.write_all(&[5, CMD_CONNECT, 0, 0x09]).await.unwrap();
        let err = read_request(&mut server).await.unwrap_err();
        assert!(matches!(err, Socks5Error::UnsupportedAddressType(0x09)));
    }

    #[tokio::test]
    async fn truncated_request() {
        let (mut client, mut server) = duplex(64);
        client.write_all(&[5, CMD_CONNECT, 0, ATYP_IPV4, 10]).await.unwrap();
        drop(client);
        let err = read_request(&mut server).await.unwrap_err();
        assert!(matches!(err, Socks5Error::Truncated));
    }

    #[tokio::test]
    async fn reply_encoding() {
        let (mut client, mut server) = duplex(64);
        send_reply_unspecified(&mut server, REPLY_HOST_UNREACHABLE)
            .await
            .unwrap();
        let mut resp = [0u8; 10];
        client.read_exact(&mut resp).await.unwrap();
        assert_eq!(resp, [5, REPLY_HOST_UNREACHABLE, 0, ATYP_IPV4, 0, 0, 0, 0, 0, 0]);
    }
}
