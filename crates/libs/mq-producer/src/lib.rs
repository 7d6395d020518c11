//! Producer facade and send pipeline (C3-C8): topic route cache,
//! publish-info index, partition selector, the bounded attempt loop, the
//! client-instance registry, and the lifecycle-driven producer facade
//! itself. Request signing and the transport seam live in `mq-transport`;
//! this crate drives them.

pub mod callback;
pub mod message_id;
pub mod producer;
pub mod publish_info;
pub mod registry;
pub mod route_cache;
pub mod selector;
pub mod send;

pub use callback::CallbackExecutor;
pub use producer::Producer;
pub use publish_info::{PublishInfo, PublishInfoIndex};
pub use registry::{ClientInstance, ClientInstanceRegistry};
pub use route_cache::RouteCache;
pub use send::SendPipeline;

use std::sync::Arc;

use mq_core::{ClientConfig, CredentialsProvider};
use mq_transport::Transport;

/// Convenience constructor: looks up (or creates) the shared `ClientInstance`
/// for `config.arn` via the registry, then builds a `Producer` on top of it.
pub fn producer(
    registry: &ClientInstanceRegistry,
    config: ClientConfig,
    credentials: Option<Arc<dyn CredentialsProvider>>,
    make_transport: impl FnOnce() -> Arc<dyn Transport>,
) -> Arc<Producer> {
    let instance = registry.get_or_create(&config.arn, make_transport);
    Producer::new(instance, config, credentials)
}
