//! Built-in transport factories, keyed by transport name.

use std::collections::BTreeMap;
use std::sync::Arc;

use ptrelay_core::{TRANSPORT_DIRECT, TRANSPORT_PLAIN};

use crate::plain::{DirectClientFactory, PlainServerFactory};
use crate::{ClientFactory, ServerFactory};

pub type ClientFactories = BTreeMap<String, Arc<dyn ClientFactory>>;
pub type ServerFactories = BTreeMap<String, Arc<dyn ServerFactory>>;

/// Client-role transports compiled into this build.
pub fn builtin_client_factories(no_delay: bool) -> ClientFactories {
    let direct: Arc<dyn ClientFactory> =
        Arc::new(DirectClientFactory::new().with_no_delay(no_delay));
    let mut factories = ClientFactories::new();
    factories.insert(TRANSPORT_DIRECT.to_string(), direct.clone());
    factories.insert(TRANSPORT_PLAIN.to_string(), direct);
    factories
}

/// Server-role transports compiled into this build.
pub fn builtin_server_factories(backlog: u32) -> ServerFactories {
    let plain: Arc<dyn ServerFactory> = Arc::new(PlainServerFactory::new().with_backlog(backlog));
    let mut factories = ServerFactories::new();
    factories.insert(TRANSPORT_PLAIN.to_string(), plain);
    factories
}
