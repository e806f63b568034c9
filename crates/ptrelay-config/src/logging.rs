//! Tracing subscriber setup from [`LoggingConfig`].

use std::io;

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::LoggingConfig;

/// Build the filter directive string from base level and per-module filters.
pub fn filter_directives(config: &LoggingConfig) -> String {
    let base_level = config.level.as_deref().unwrap_or("info");
    let mut filter_str = base_level.to_string();

    let mut modules: Vec<_> = config.filters.iter().collect();
    modules.sort();
    for (module, level) in modules {
        filter_str.push(',');
        filter_str.push_str(module);
        filter_str.push('=');
        filter_str.push_str(level);
    }
    filter_str
}

/// Install the global tracing subscriber.
///
/// Supports:
/// - `level`: Base log level (trace, debug, info, warn, error)
/// - `format`: Output format (json, pretty, compact). Default: pretty
/// - `output`: Output target (stdout, stderr). Default: stderr
/// - `filters`: Per-module log level overrides
///
/// Keep logs on stderr when a parent process reads control lines from stdout.
pub fn init_tracing(config: &LoggingConfig) {
    let filter = EnvFilter::try_new(filter_directives(config))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let format = config.format.as_deref().unwrap_or("pretty");
    let output = config.output.as_deref().unwrap_or("stderr");

    let registry = tracing_subscriber::registry().with(filter);
    let result = match (format, output) {
        ("json", "stdout") => registry.with(fmt::layer().json().with_writer(io::stdout)).try_init(),
        ("json", _) => registry.with(fmt::layer().json().with_writer(io::stderr)).try_init(),
        ("compact", "stdout") => registry
            .with(fmt::layer().compact().with_writer(io::stdout))
            .try_init(),
        ("compact", _) => registry
            .with(fmt::layer().compact().with_writer(io::stderr))
            .try_init(),
        (_, "stdout") => registry.with(fmt::layer().with_writer(io::stdout)).try_init(),
        _ => registry.with(fmt::layer().with_writer(io::stderr)).try_init(),
    };
    if let Err(e) = result {
        eprintln!("tracing already initialised: {e}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn directives_include_module_filters() {
        let mut config = LoggingConfig {
            level: Some("warn".into()),
            ..Default::default()
        };
        assert_eq!(filter_directives(&config), "warn");

        config.filters.insert("ptrelay_core".into(), "debug".into());
        config.filters.insert("ptrelay_client".into(), "trace".into());
        assert_eq!(
            filter_directives(&config),
            "warn,ptrelay_client=trace,ptrelay_core=debug"
        );
    }

    #[test]
    fn default_level_is_info() {
        assert_eq!(filter_directives(&LoggingConfig::default()), "info");
    }
}
