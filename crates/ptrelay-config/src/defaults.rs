//! Default value functions for serde deserialization.
//!
//! These functions forward to constants defined in `ptrelay_core::defaults`.

use ptrelay_core::defaults;

/// Generate default value functions that forward to ptrelay_core::defaults constants.
macro_rules! default_fns {
    ($($fn_name:ident => $const_name:ident : $ty:ty),* $(,)?) => {
        $(
            pub(crate) fn $fn_name() -> $ty {
                defaults::$const_name
            }
        )*
    };
}

default_fns! {
    default_relay_buffer_size     => DEFAULT_RELAY_BUFFER_SIZE: usize,
    min_relay_buffer_size         => MIN_RELAY_BUFFER_SIZE: usize,
    max_relay_buffer_size         => MAX_RELAY_BUFFER_SIZE: usize,
    default_connection_backlog    => DEFAULT_CONNECTION_BACKLOG: u32,
    default_tcp_no_delay          => DEFAULT_TCP_NO_DELAY: bool,
    default_shutdown_timeout_secs => DEFAULT_SHUTDOWN_TIMEOUT_SECS: u64,
}

pub(crate) fn default_client_transports() -> Vec<String> {
    vec![defaults::TRANSPORT_DIRECT.to_string()]
}
