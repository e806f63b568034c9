//! Configuration validation logic.

use std::collections::HashSet;

use crate::defaults::{max_relay_buffer_size, min_relay_buffer_size};
use crate::loader::ConfigError;
use crate::{ClientConfig, LoggingConfig, ServerConfig};

/// Check that `addr` looks like `host:port` with a numeric port.
fn validate_host_port(field: &str, addr: &str) -> Result<(), ConfigError> {
    let valid = match addr.trim().rsplit_once(':') {
        Some((host, port)) => !host.is_empty() && port.parse::<u16>().is_ok(),
        None => false,
    };
    if !valid {
        return Err(ConfigError::Validation(format!(
            "{field} must be host:port, got {addr:?}"
        )));
    }
    Ok(())
}

fn validate_relay_buffer_size(field: &str, size: usize) -> Result<(), ConfigError> {
    if size < min_relay_buffer_size() {
        return Err(ConfigError::Validation(format!(
            "{field} must be >= {}",
            min_relay_buffer_size()
        )));
    }
    if size > max_relay_buffer_size() {
        return Err(ConfigError::Validation(format!("{field} must be <= 1MB")));
    }
    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    if let Some(format) = logging.format.as_deref()
        && !matches!(format, "json" | "pretty" | "compact")
    {
        return Err(ConfigError::Validation(
            "logging.format must be one of: json, pretty, compact".into(),
        ));
    }
    if let Some(output) = logging.output.as_deref()
        && !matches!(output, "stdout" | "stderr")
    {
        return Err(ConfigError::Validation(
            "logging.output must be stdout or stderr".into(),
        ));
    }
    Ok(())
}

pub fn validate_client_config(config: &ClientConfig) -> Result<(), ConfigError> {
    if config.client.transports.is_empty() {
        return Err(ConfigError::Validation("client.transports is empty".into()));
    }
    let mut seen = HashSet::new();
    for name in &config.client.transports {
        if name.trim().is_empty() {
            return Err(ConfigError::Validation(
                "client.transports contains an empty name".into(),
            ));
        }
        if !seen.insert(name.as_str()) {
            return Err(ConfigError::Validation(format!(
                "client.transports lists {name:?} twice"
            )));
        }
    }
    if let Some(target) = &config.client.target {
        validate_host_port("client.target", target)?;
    }
    if let Some(proxy) = &config.client.proxy {
        validate_host_port("client.proxy.addr", &proxy.addr)?;
        if proxy.password.is_some() && proxy.username.is_none() {
            return Err(ConfigError::Validation(
                "client.proxy.password requires client.proxy.username".into(),
            ));
        }
    }
    validate_relay_buffer_size("client.relay_buffer_size", config.client.relay_buffer_size)?;
    validate_logging(&config.logging)
}

pub fn validate_server_config(config: &ServerConfig) -> Result<(), ConfigError> {
    validate_host_port("server.upstream", &config.server.upstream)?;
    if config.server.bindaddrs.is_empty() {
        return Err(ConfigError::Validation("server.bindaddrs is empty".into()));
    }
    for bind in &config.server.bindaddrs {
        if bind.transport.trim().is_empty() {
            return Err(ConfigError::Validation(
                "server.bindaddrs contains an empty transport name".into(),
            ));
        }
        validate_host_port("server.bindaddrs.addr", &bind.addr)?;
    }
    validate_relay_buffer_size("server.relay_buffer_size", config.server.relay_buffer_size)?;
    if config.server.connection_backlog == 0 {
        return Err(ConfigError::Validation(
            "server.connection_backlog must be > 0".into(),
        ));
    }
    validate_logging(&config.logging)
}
