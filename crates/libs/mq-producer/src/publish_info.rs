use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use mq_core::{ClientError, Partition, TopicRouteData};
use mq_transport::{Metadata, Transport};
use rand_core::{OsRng, RngCore};

use crate::route_cache::RouteCache;

/// Producer-local view of a topic's writable partitions plus a rotation
/// cursor (C4). One per `(producer, topic)`.
///
/// The cursor is seeded from a process-wide random source at construction
/// rather than from thread-local state — this prevents fleet-wide
/// hot-spotting on partition 0 without tying the cursor to whichever thread
/// happened to create it.
pub struct PublishInfo {
    partitions: Vec<Partition>,
    cursor: AtomicU64,
}

impl PublishInfo {
    pub(crate) fn from_route(route: &TopicRouteData) -> Self {
        Self {
            partitions: route.writable_partitions(),
            cursor: AtomicU64::new(OsRng.next_u64()),
        }
    }

    pub fn partitions(&self) -> &[Partition] {
        &self.partitions
    }

    /// Atomically advances the cursor and returns the pre-advance value, for
    /// the selector (C5) to index into `partitions` modulo its length.
    pub fn advance_cursor(&self) -> u64 {
        self.cursor.fetch_add(1, Ordering::Relaxed)
    }
}

/// Per-producer index of `PublishInfo` by topic.
pub struct PublishInfoIndex {
    entries: DashMap<String, Arc<PublishInfo>>,
}

impl PublishInfoIndex {
    pub fn new() -> Self {
        Self { entries: DashMap::new() }
    }

    /// Returns the cached entry immediately if present; otherwise fetches
    /// the route via the shared `RouteCache` (C3), builds a fresh
    /// `PublishInfo`, stores it, and returns it.
    ///
    /// If two concurrent callers both miss, both may build a `PublishInfo`;
    /// last-writer-wins is fine here since the partition set is identical
    /// either way (the route fetch behind it already single-flights), so
    /// this deliberately does not serialize the insert.
    pub async fn get_publish_info(
        &self,
        route_cache: &RouteCache,
        transport: &dyn Transport,
        topic: &str,
        metadata: &Metadata,
        timeout: Duration,
    ) -> Result<Arc<PublishInfo>, ClientError> {
        if let Some(existing) = self.entries.get(topic) {
            return Ok(existing.clone());
        }
        let route = route_cache.get_route(transport, topic, metadata, timeout).await?;
        let info = Arc::new(PublishInfo::from_route(&route));
        self.entries.insert(topic.to_string(), info.clone());
        Ok(info)
    }
}

impl Default for PublishInfoIndex {
    fn default() -> Self {
        Self::new()
    }
}
