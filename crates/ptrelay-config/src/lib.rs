//! Configuration loading and CLI definitions.

mod cli;
mod defaults;
mod loader;
mod logging;
mod types;
mod validate;

pub use cli::{
    ClientOverrides, CommonOverrides, ServerOverrides, apply_client_overrides,
    apply_server_overrides,
};
pub use logging::{filter_directives, init_tracing};
pub use loader::{ConfigError, load_client_config, load_config, load_server_config};
pub use types::*;
pub use validate::{validate_client_config, validate_server_config};
