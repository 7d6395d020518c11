use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use mq_transport::{IsolationRegistry, Transport};
use parking_lot::Mutex;

use crate::route_cache::RouteCache;

/// One shared transport/client per authentication realm, reference-counted
/// across producers (C7 entry). There's no separate timeout-scheduler
/// component alongside `transport`/`isolated` here — every call site already
/// threads its own deadline through `tokio`'s timers, so there is nothing
/// left for a scheduler to own.
pub struct ClientInstance {
    pub identity: String,
    pub transport: Arc<dyn Transport>,
    pub isolation: IsolationRegistry,
    pub route_cache: RouteCache,
    refcount: AtomicUsize,
}

impl ClientInstance {
    fn new(identity: String, transport: Arc<dyn Transport>) -> Self {
        Self {
            identity,
            transport,
            isolation: IsolationRegistry::new(),
            route_cache: RouteCache::new(),
            refcount: AtomicUsize::new(0),
        }
    }

    fn acquire(&self) -> usize {
        self.refcount.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Cooperative release: callers must not release an instance still in
    /// use by another producer. This only reports the resulting count for
    /// the caller to act on.
    pub fn release(&self) -> usize {
        self.refcount.fetch_sub(1, Ordering::SeqCst) - 1
    }
}

/// One shared `ClientInstance` per `arn`, looked up and created atomically
/// under a single lock (C7). Invariant I1: at most one live instance exists
/// per identity at any moment.
pub struct ClientInstanceRegistry {
    instances: Mutex<HashMap<String, Arc<ClientInstance>>>,
}

impl ClientInstanceRegistry {
    pub fn new() -> Self {
        Self { instances: Mutex::new(HashMap::new()) }
    }

    pub fn get_or_create(
        &self,
        arn: &str,
        make_transport: impl FnOnce() -> Arc<dyn Transport>,
    ) -> Arc<ClientInstance> {
        let mut instances = self.instances.lock();
        if let Some(existing) = instances.get(arn) {
            existing.acquire();
            return existing.clone();
        }
        let instance = Arc::new(ClientInstance::new(arn.to_string(), make_transport()));
        instance.acquire();
        instances.insert(arn.to_string(), instance.clone());
        instance
    }

    pub fn remove(&self, arn: &str) {
        self.instances.lock().remove(arn);
    }
}

impl Default for ClientInstanceRegistry {
    fn default() -> Self {
        Self::new()
    }
}
