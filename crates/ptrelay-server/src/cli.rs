//! CLI module for the server role.
//!
//! Used both by the standalone `ptrelay-server` binary and as the `server`
//! subcommand of the unified `ptrelay` CLI.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use ptrelay_config::{
    ServerConfig, ServerOverrides, apply_server_overrides, init_tracing, load_server_config,
    validate_server_config,
};
use ptrelay_core::control::StdoutControl;
use ptrelay_core::elide::set_unsafe_logging;
use ptrelay_core::shutdown::shutdown_signal;
use ptrelay_core::termmon::TermMonitor;
use ptrelay_metrics::PrometheusRelayMetrics;
use ptrelay_transport::registry::builtin_server_factories;
use tracing::{info, warn};

use crate::{ServerContext, ServerError, server_setup};

/// Server role CLI arguments.
#[derive(Parser, Debug, Clone)]
#[command(name = "ptrelay-server", version, about = "ptrelay server role (transport listeners)")]
pub struct ServerArgs {
    /// Config file path (toml/json/jsonc/yaml)
    #[arg(short, long, default_value = "server.toml")]
    pub config: PathBuf,

    #[command(flatten)]
    pub overrides: ServerOverrides,
}

/// `(transport, bind address)` pairs in configuration order.
pub fn bind_pairs(config: &ServerConfig) -> Vec<(String, String)> {
    config
        .server
        .bindaddrs
        .iter()
        .map(|b| (b.transport.clone(), b.addr.clone()))
        .collect()
}

/// Run the server role with the given CLI arguments.
pub async fn run(args: ServerArgs) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = load_server_config(&args.config)?;
    apply_server_overrides(&mut config, &args.overrides);
    validate_server_config(&config)?;

    init_tracing(&config.logging);
    set_unsafe_logging(config.logging.unsafe_logging);

    if let Some(listen) = &config.metrics.listen {
        match ptrelay_metrics::init_prometheus(listen) {
            Ok(()) => info!("metrics exporter listening on {}", listen),
            Err(e) => warn!("failed to start metrics exporter: {}", e),
        }
    }

    let monitor = TermMonitor::new();
    let ctx = ServerContext::from_config(&config, monitor.clone())
        .with_metrics(Arc::new(PrometheusRelayMetrics::server()));

    let factories = builtin_server_factories(config.server.connection_backlog);
    let registration = server_setup(ctx, &bind_pairs(&config), &factories, &StdoutControl).await;
    if !registration.launched {
        return Err(ServerError::Config("no transport listener could be launched".into()).into());
    }

    shutdown_signal().await;
    info!("shutdown signal received");
    registration.shutdown().await;

    let timeout = Duration::from_secs(config.shutdown_timeout_secs);
    if monitor.wait_for_zero(timeout).await {
        info!("all sessions finished");
    } else {
        warn!(remaining = monitor.count(), "shutdown timeout reached with sessions in flight");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ptrelay_config::{LoggingConfig, MetricsConfig, ServerSettings};

    #[test]
    fn bindaddr_flags_keep_order() {
        let args = ServerArgs::parse_from([
            "ptrelay-server",
            "-c",
            "relay.yaml",
            "--bindaddr",
            "plain=127.0.0.1:4000",
            "--bindaddr",
            "obfs=0.0.0.0:4001",
        ]);
        assert_eq!(args.config, PathBuf::from("relay.yaml"));

        let mut config = ServerConfig {
            server: ServerSettings {
                bindaddrs: Vec::new(),
                upstream: "127.0.0.1:9001".into(),
                relay_buffer_size: ptrelay_core::DEFAULT_RELAY_BUFFER_SIZE,
                connection_backlog: ptrelay_core::DEFAULT_CONNECTION_BACKLOG,
                tcp_no_delay: true,
            },
            logging: LoggingConfig::default(),
            metrics: MetricsConfig::default(),
            shutdown_timeout_secs: 30,
        };
        apply_server_overrides(&mut config, &args.overrides);
        assert_eq!(
            bind_pairs(&config),
            vec![
                ("plain".to_string(), "127.0.0.1:4000".to_string()),
                ("obfs".to_string(), "0.0.0.0:4001".to_string()),
            ]
        );
    }
}
