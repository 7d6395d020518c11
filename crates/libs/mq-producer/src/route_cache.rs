use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use mq_core::{ClientError, TopicRouteData};
use mq_transport::{Metadata, Transport};
use tokio::sync::OnceCell;

/// Per-topic lazy-loaded partition list, shared by all producers on the same
/// client instance (C3). Single-flight: concurrent callers for the same
/// topic observe exactly one underlying route-fetch RPC.
///
/// Built on `tokio::sync::OnceCell` rather than a hand-rolled "loading vs.
/// cached" enum: `get_or_try_init` already gives single-flight with
/// retry-on-failure — a failed init leaves the cell empty for the next
/// caller, so a cache miss on error doesn't stick around poisoning future
/// lookups.
pub struct RouteCache {
    entries: DashMap<String, Arc<OnceCell<TopicRouteData>>>,
}

impl RouteCache {
    pub fn new() -> Self {
        Self { entries: DashMap::new() }
    }

    pub async fn get_route(
        &self,
        transport: &dyn Transport,
        topic: &str,
        metadata: &Metadata,
        timeout: Duration,
    ) -> Result<TopicRouteData, ClientError> {
        let cell = self
            .entries
            .entry(topic.to_string())
            .or_insert_with(|| Arc::new(OnceCell::new()))
            .clone();

        cell.get_or_try_init(|| async move { transport.query_route(topic, metadata, timeout).await })
            .await
            .cloned()
            .map_err(|err| ClientError::route_resolution(topic, err))
    }

    /// Overwrites a topic's cached route atomically.
    pub fn refresh(&self, topic: &str, route: TopicRouteData) {
        let cell = OnceCell::new();
        let _ = cell.set(route);
        self.entries.insert(topic.to_string(), Arc::new(cell));
    }
}

impl Default for RouteCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mq_core::{Endpoints, Partition};
    use mq_transport::TransportError;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingTransport {
        calls: AtomicUsize,
        fail_first: bool,
    }

    #[async_trait::async_trait]
    impl Transport for CountingTransport {
        async fn send_message(
            &self,
            _target: &Endpoints,
            _metadata: &Metadata,
            _request: &mq_core::SendMessageRequest,
            _timeout: Duration,
        ) -> Result<mq_core::SendResult, TransportError> {
            unimplemented!()
        }

        async fn query_route(
            &self,
            _topic: &str,
            _metadata: &Metadata,
            _timeout: Duration,
        ) -> Result<TopicRouteData, TransportError> {
            let count = self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_first && count == 0 {
                return Err(TransportError::Io { target: "ns".into(), message: "boom".into() });
            }
            Ok(TopicRouteData::new(vec![Partition::new(0, Endpoints::single("10.0.0.1:9000"), "b0")]))
        }
    }

    #[tokio::test]
    async fn concurrent_misses_single_flight_to_one_rpc() {
        let cache = RouteCache::new();
        let transport = CountingTransport { calls: AtomicUsize::new(0), fail_first: false };
        let metadata = Metadata::new();
        let (a, b) = tokio::join!(
            cache.get_route(&transport, "orders", &metadata, Duration::from_secs(1)),
            cache.get_route(&transport, "orders", &metadata, Duration::from_secs(1)),
        );
        assert!(a.is_ok() && b.is_ok());
        assert_eq!(transport.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn failed_fetch_is_not_cached() {
        let cache = RouteCache::new();
        let transport = CountingTransport { calls: AtomicUsize::new(0), fail_first: true };
        let metadata = Metadata::new();
        let first = cache.get_route(&transport, "orders", &metadata, Duration::from_secs(1)).await;
        assert!(first.is_err());
        let second = cache.get_route(&transport, "orders", &metadata, Duration::from_secs(1)).await;
        assert!(second.is_ok());
        assert_eq!(transport.calls.load(Ordering::SeqCst), 2);
    }
}
