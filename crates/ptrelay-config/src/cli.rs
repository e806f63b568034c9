//! CLI override definitions and application logic.

use clap::Parser;

use crate::types::*;

/// Overrides shared by both roles.
#[derive(Debug, Clone, Parser, Default)]
pub struct CommonOverrides {
    /// Override log level (trace/debug/info/warn/error)
    #[arg(long)]
    pub log_level: Option<String>,
    /// Override metrics listen address, e.g. 127.0.0.1:9100
    #[arg(long)]
    pub metrics_listen: Option<String>,
    /// Log addresses unredacted
    #[arg(long)]
    pub unsafe_logging: bool,
    /// Buffer size for relay (bytes)
    #[arg(long)]
    pub relay_buffer_size: Option<usize>,
    /// Graceful shutdown timeout (seconds)
    #[arg(long)]
    pub shutdown_timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Parser, Default)]
pub struct ClientOverrides {
    /// Override transport list (repeatable or comma-separated)
    #[arg(long = "transport", num_args = 1.., value_delimiter = ',')]
    pub transports: Option<Vec<String>>,
    /// Fixed destination for every session, e.g. 203.0.113.5:9000
    #[arg(long)]
    pub target: Option<String>,
    /// Outbound SOCKS5 proxy address
    #[arg(long)]
    pub proxy: Option<String>,
    /// Outbound proxy username
    #[arg(long, requires = "proxy")]
    pub proxy_username: Option<String>,
    /// Outbound proxy password
    #[arg(long, requires = "proxy")]
    pub proxy_password: Option<String>,
    #[command(flatten)]
    pub common: CommonOverrides,
}

#[derive(Debug, Clone, Parser, Default)]
pub struct ServerOverrides {
    /// Override upstream endpoint, e.g. 127.0.0.1:9001
    #[arg(long)]
    pub upstream: Option<String>,
    /// Override bind addresses as transport=host:port (repeatable)
    #[arg(long = "bindaddr")]
    pub bindaddrs: Option<Vec<BindAddr>>,
    /// TCP listener backlog size
    #[arg(long)]
    pub connection_backlog: Option<u32>,
    #[command(flatten)]
    pub common: CommonOverrides,
}

fn apply_common(
    logging: &mut LoggingConfig,
    metrics: &mut MetricsConfig,
    relay_buffer_size: &mut usize,
    shutdown_timeout_secs: &mut u64,
    overrides: &CommonOverrides,
) {
    if let Some(v) = &overrides.log_level {
        logging.level = Some(v.clone());
    }
    if let Some(v) = &overrides.metrics_listen {
        metrics.listen = Some(v.clone());
    }
    if overrides.unsafe_logging {
        logging.unsafe_logging = true;
    }
    if let Some(v) = overrides.relay_buffer_size {
        *relay_buffer_size = v;
    }
    if let Some(v) = overrides.shutdown_timeout_secs {
        *shutdown_timeout_secs = v;
    }
}

pub fn apply_client_overrides(config: &mut ClientConfig, overrides: &ClientOverrides) {
    if let Some(v) = &overrides.transports {
        config.client.transports = v.clone();
    }
    if let Some(v) = &overrides.target {
        config.client.target = Some(v.clone());
    }
    if let Some(addr) = &overrides.proxy {
        config.client.proxy = Some(ProxyConfig {
            addr: addr.clone(),
            username: overrides.proxy_username.clone(),
            password: overrides.proxy_password.clone(),
        });
    }
    apply_common(
        &mut config.logging,
        &mut config.metrics,
        &mut config.client.relay_buffer_size,
        &mut config.shutdown_timeout_secs,
        &overrides.common,
    );
}

pub fn apply_server_overrides(config: &mut ServerConfig, overrides: &ServerOverrides) {
    if let Some(v) = &overrides.upstream {
        config.server.upstream = v.clone();
    }
    if let Some(v) = &overrides.bindaddrs {
        config.server.bindaddrs = v.clone();
    }
    if let Some(v) = overrides.connection_backlog {
        config.server.connection_backlog = v;
    }
    apply_common(
        &mut config.logging,
        &mut config.metrics,
        &mut config.server.relay_buffer_size,
        &mut config.shutdown_timeout_secs,
        &overrides.common,
    );
}
