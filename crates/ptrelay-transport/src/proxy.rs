//! SOCKS5 outbound proxy support.
//!
//! When an outbound proxy is configured, the direct dialer connects to the
//! proxy and issues a CONNECT for the destination instead of connecting to
//! it itself. Username/password authentication (RFC 1929) is offered when
//! credentials are set.

use std::net::{IpAddr, SocketAddr};

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::TransportError;

const SOCKS_VERSION: u8 = 0x05;
const AUTH_VERSION: u8 = 0x01;
const METHOD_NO_AUTH: u8 = 0x00;
const METHOD_USER_PASS: u8 = 0x02;
const METHOD_NO_ACCEPTABLE: u8 = 0xFF;
const CMD_CONNECT: u8 = 0x01;
const ATYP_IPV4: u8 = 0x01;
const ATYP_DOMAIN: u8 = 0x03;
const ATYP_IPV6: u8 = 0x04;

/// An upstream SOCKS5 proxy that outbound dials are routed through.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundProxy {
    /// Proxy address (`host:port`).
    pub addr: String,
    pub username: Option<String>,
    pub password: Option<String>,
}

impl OutboundProxy {
    pub fn new(addr: impl Into<String>) -> Self {
        Self {
            addr: addr.into(),
            username: None,
            password: None,
        }
    }

    pub fn with_credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    fn credentials(&self) -> Option<(&str, &str)> {
        match (&self.username, &self.password) {
            (Some(u), Some(p)) => Some((u.as_str(), p.as_str())),
            (Some(u), None) => Some((u.as_str(), "")),
            _ => None,
        }
    }
}

fn proxy_err(msg: impl Into<String>) -> TransportError {
    TransportError::Proxy(msg.into())
}

/// Encode `destination` (`host:port`) as a SOCKS5 address.
fn encode_destination(destination: &str, buf: &mut Vec<u8>) -> Result<(), TransportError> {
    if let Ok(addr) = destination.parse::<SocketAddr>() {
        match addr.ip() {
            IpAddr::V4(ip) => {
                buf.push(ATYP_IPV4);
                buf.extend_from_slice(&ip.octets());
            }
            IpAddr::V6(ip) => {
                buf.push(ATYP_IPV6);
                buf.extend_from_slice(&ip.octets());
            }
        }
        buf.extend_from_slice(&addr.port().to_be_bytes());
        return Ok(());
    }

    let (host, port) = destination
        .rsplit_once(':')
        .ok_or_else(|| TransportError::Config(format!("destination without port: {destination}")))?;
    let port: u16 = port
        .parse()
        .map_err(|_| TransportError::Config(format!("invalid destination port: {destination}")))?;
    if host.is_empty() || host.len() > 255 {
        return Err(TransportError::Config(format!(
            "invalid destination host: {destination}"
        )));
    }
    buf.push(ATYP_DOMAIN);
    buf.push(host.len() as u8);
    buf.extend_from_slice(host.as_bytes());
    buf.extend_from_slice(&port.to_be_bytes());
    Ok(())
}

/// Run the SOCKS5 client handshake on an established proxy connection and
/// request a CONNECT to `destination`.
pub async fn connect_socks5<S>(
    stream: &mut S,
    destination: &str,
    proxy: &OutboundProxy,
) -> Result<(), TransportError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let credentials = proxy.credentials();

    // Method negotiation
    let greeting: &[u8] = if credentials.is_some() {
        &[SOCKS_VERSION, 2, METHOD_NO_AUTH, METHOD_USER_PASS]
    } else {
        &[SOCKS_VERSION, 1, METHOD_NO_AUTH]
    };
    stream.write_all(greeting).await?;

    let mut resp = [0u8; 2];
    stream.read_exact(&mut resp).await?;
    if resp[0] != SOCKS_VERSION {
        return Err(proxy_err(format!("invalid proxy version {}", resp[0])));
    }

    match resp[1] {
        METHOD_NO_AUTH => {}
        METHOD_USER_PASS => {
            let (user, pass) =
                credentials.ok_or_else(|| proxy_err("proxy requires authentication"))?;
            if user.len() > 255 || pass.len() > 255 {
                return Err(TransportError::Config("proxy credentials too long".into()));
            }
            let mut auth = Vec::with_capacity(3 + user.len() + pass.len());
            auth.push(AUTH_VERSION);
            auth.push(user.len() as u8);
            auth.extend_from_slice(user.as_bytes());
            auth.push(pass.len() as u8);
            auth.extend_from_slice(pass.as_bytes());
            stream.write_all(&auth).await?;

            let mut auth_resp = [0u8; 2];
            stream.read_exact(&mut auth_resp).await?;
            if auth_resp[1] != 0x00 {
                return Err(proxy_err("proxy authentication failed"));
            }
        }
        METHOD_NO_ACCEPTABLE => return Err(proxy_err("proxy rejected all auth methods")),
        other => return Err(proxy_err(format!("unsupported proxy auth method {other}"))),
    }

    // CONNECT request
    let mut req = vec![SOCKS_VERSION, CMD_CONNECT, 0x00];
    encode_destination(destination, &mut req)?;
    stream.write_all(&req).await?;

    let mut head = [0u8; 4];
    stream.read_exact(&mut head).await?;
    if head[0] != SOCKS_VERSION {
        return Err(proxy_err(format!("invalid proxy version {}", head[0])));
    }
    if head[1] != 0x00 {
        return Err(proxy_err(format!("proxy connect failed: code {}", head[1])));
    }

    // Drain the bound address; it is not used.
    let remaining = match head[3] {
        ATYP_IPV4 => 4 + 2,
        ATYP_IPV6 => 16 + 2,
        ATYP_DOMAIN => {
            let mut len = [0u8; 1];
            stream.read_exact(&mut len).await?;
            len[0] as usize + 2
        }
        other => return Err(proxy_err(format!("invalid bound address type {other}"))),
    };
    let mut bound = vec![0u8; remaining];
    stream.read_exact(&mut bound).await?;
    Ok(())
}
