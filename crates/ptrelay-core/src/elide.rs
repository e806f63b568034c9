//! Redaction of peer and target addresses in logs.
//!
//! At normal verbosity, addresses are logged as `[scrubbed]:port` and IP
//! literals inside error messages are replaced. Setting unsafe logging
//! (config `logging.unsafe_logging`) turns redaction off for debugging.

use std::net::{IpAddr, SocketAddr};
use std::sync::atomic::{AtomicBool, Ordering};

/// Replacement text for redacted hosts.
pub const SCRUBBED: &str = "[scrubbed]";

static UNSAFE_LOGGING: AtomicBool = AtomicBool::new(false);

/// Enable or disable logging of raw addresses.
pub fn set_unsafe_logging(enabled: bool) {
    UNSAFE_LOGGING.store(enabled, Ordering::Relaxed);
}

/// Whether raw addresses are logged.
pub fn unsafe_logging() -> bool {
    UNSAFE_LOGGING.load(Ordering::Relaxed)
}

/// Redact the host part of an address, keeping the port.
pub fn elide_addr(addr: &str) -> String {
    elide_addr_with(addr, unsafe_logging())
}

/// Redact IP literals and socket addresses inside an error message.
pub fn elide_error(err: &dyn std::error::Error) -> String {
    elide_error_with(&err.to_string(), unsafe_logging())
}

/// [`elide_addr`] with an explicit policy.
pub fn elide_addr_with(addr: &str, unsafe_logging: bool) -> String {
    if unsafe_logging {
        return addr.to_string();
    }
    match addr.rsplit_once(':') {
        Some((host, port)) if !host.is_empty() && port.parse::<u16>().is_ok() => {
            format!("{SCRUBBED}:{port}")
        }
        _ => SCRUBBED.to_string(),
    }
}

/// [`elide_error`] with an explicit policy.
pub fn elide_error_with(msg: &str, unsafe_logging: bool) -> String {
    if unsafe_logging {
        return msg.to_string();
    }
    msg.split(' ')
        .map(|word| {
            let token = word.trim_matches(|c: char| matches!(c, ',' | ';' | '(' | ')' | '"'));
            if token.parse::<SocketAddr>().is_ok() {
                word.replace(token, &elide_addr_with(token, false))
            } else if token.parse::<IpAddr>().is_ok() {
                word.replace(token, SCRUBBED)
            } else {
                word.to_string()
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
