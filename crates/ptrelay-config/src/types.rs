//! Configuration type definitions.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::defaults::*;

/// Client-role configuration file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClientConfig {
    #[serde(default)]
    pub client: ClientSettings,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
    /// Seconds to wait for in-flight sessions on shutdown.
    #[serde(default = "default_shutdown_timeout_secs")]
    pub shutdown_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientSettings {
    /// Transport names to launch, one loopback SOCKS5 listener each.
    #[serde(default = "default_client_transports")]
    pub transports: Vec<String>,
    /// Fixed destination (`host:port`). Overrides the address requested in
    /// the SOCKS5 handshake when set.
    #[serde(default)]
    pub target: Option<String>,
    /// Upstream SOCKS5 proxy for outbound dials.
    #[serde(default)]
    pub proxy: Option<ProxyConfig>,
    /// Buffer size per relay direction (bytes).
    #[serde(default = "default_relay_buffer_size")]
    pub relay_buffer_size: usize,
    /// Set TCP_NODELAY on outbound connections.
    #[serde(default = "default_tcp_no_delay")]
    pub tcp_no_delay: bool,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            transports: default_client_transports(),
            target: None,
            proxy: None,
            relay_buffer_size: default_relay_buffer_size(),
            tcp_no_delay: default_tcp_no_delay(),
        }
    }
}

/// Outbound SOCKS5 proxy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProxyConfig {
    /// Proxy address (`host:port`).
    pub addr: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

/// Server-role configuration file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub server: ServerSettings,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
    /// Seconds to wait for in-flight sessions on shutdown.
    #[serde(default = "default_shutdown_timeout_secs")]
    pub shutdown_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    /// Transport listeners, launched in order.
    #[serde(default)]
    pub bindaddrs: Vec<BindAddr>,
    /// Fixed upstream endpoint (`host:port`) every session is forwarded to.
    pub upstream: String,
    /// Buffer size per relay direction (bytes).
    #[serde(default = "default_relay_buffer_size")]
    pub relay_buffer_size: usize,
    /// TCP listener backlog.
    #[serde(default = "default_connection_backlog")]
    pub connection_backlog: u32,
    /// Set TCP_NODELAY on upstream connections.
    #[serde(default = "default_tcp_no_delay")]
    pub tcp_no_delay: bool,
}

/// A transport name and the address its listener binds to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BindAddr {
    pub transport: String,
    pub addr: String,
}

impl std::str::FromStr for BindAddr {
    type Err = String;

    /// Parse `transport=host:port`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (transport, addr) = s
            .split_once('=')
            .ok_or_else(|| format!("expected transport=host:port, got {s:?}"))?;
        if transport.is_empty() || addr.is_empty() {
            return Err(format!("expected transport=host:port, got {s:?}"));
        }
        Ok(Self {
            transport: transport.to_string(),
            addr: addr.to_string(),
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct MetricsConfig {
    /// Prometheus exporter listen address. Disabled when unset.
    pub listen: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    pub level: Option<String>,
    /// Log format: json, pretty, or compact. Default: pretty.
    pub format: Option<String>,
    /// Output target: stdout or stderr. Default: stderr.
    pub output: Option<String>,
    /// Per-module log level filters (e.g., {"ptrelay_core": "debug"}).
    #[serde(default)]
    pub filters: HashMap<String, String>,
    /// Log peer and target addresses unredacted.
    #[serde(default)]
    pub unsafe_logging: bool,
}
