//! CLI module for the client role.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use ptrelay_config::{
    ClientConfig, ClientOverrides, apply_client_overrides, init_tracing, load_client_config,
    validate_client_config,
};
use ptrelay_core::control::{Control, StdoutControl};
use ptrelay_core::elide::set_unsafe_logging;
use ptrelay_core::shutdown::shutdown_signal;
use ptrelay_core::termmon::TermMonitor;
use ptrelay_metrics::PrometheusRelayMetrics;
use ptrelay_transport::registry::{ClientFactories, builtin_client_factories};
use tracing::{info, warn};

use crate::{ClientContext, ClientError, client_setup};

/// Client role CLI arguments.
#[derive(Parser, Debug, Clone)]
#[command(name = "ptrelay-client", version, about = "ptrelay client role (local SOCKS5 listeners)")]
pub struct ClientArgs {
    /// Config file path (toml/json/jsonc/yaml). Built-in defaults when omitted.
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    #[command(flatten)]
    pub overrides: ClientOverrides,
}

/// Keep the configured transports that this build provides.
///
/// Names without an implementation are reported through `control` so the
/// parent sees one error per missing transport.
pub fn select_factories(
    names: &[String],
    mut available: ClientFactories,
    control: &dyn Control,
) -> ClientFactories {
    let mut selected = ClientFactories::new();
    for name in names {
        match available.remove(name) {
            Some(factory) => {
                selected.insert(name.clone(), factory);
            }
            None => {
                warn!(transport = %name, "no such transport is supported");
                ptrelay_metrics::record_listener_failed(name);
                control.client_method_error(name, "no such transport is supported");
            }
        }
    }
    selected
}

/// Run the client role with the given CLI arguments.
pub async fn run(args: ClientArgs) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = match &args.config {
        Some(path) => load_client_config(path)?,
        None => ClientConfig::default(),
    };
    apply_client_overrides(&mut config, &args.overrides);
    validate_client_config(&config)?;

    init_tracing(&config.logging);
    set_unsafe_logging(config.logging.unsafe_logging);

    if let Some(listen) = &config.metrics.listen {
        match ptrelay_metrics::init_prometheus(listen) {
            Ok(()) => info!("metrics exporter listening on {}", listen),
            Err(e) => warn!("failed to start metrics exporter: {}", e),
        }
    }

    let monitor = TermMonitor::new();
    let ctx = ClientContext::from_config(&config, monitor.clone())
        .with_metrics(Arc::new(PrometheusRelayMetrics::client()));

    let control = StdoutControl;
    let factories = select_factories(
        &config.client.transports,
        builtin_client_factories(config.client.tcp_no_delay),
        &control,
    );
    let registration = client_setup(ctx, factories, &control).await;
    if !registration.launched {
        return Err(ClientError::Config("no transport listener could be launched".into()).into());
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
