use std::collections::HashSet;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use mq_core::Endpoints;

/// Default time an endpoint stays isolated before it becomes eligible again.
/// Re-admission here is TTL-based rather than probe-based: a TTL needs no
/// transport access, keeping this registry's dependency surface at zero.
pub const DEFAULT_ISOLATION_TTL: Duration = Duration::from_secs(30);

/// Process-scoped-per-identity set of endpoints considered unhealthy (C2).
/// Concurrent-safe: `isolate`/`unisolate`/`snapshot` may be called from any
/// thread. Membership is advisory — callers still try isolated endpoints
/// when nothing else is available.
pub struct IsolationRegistry {
    isolated: DashMap<Endpoints, Instant>,
    ttl: Duration,
}

impl IsolationRegistry {
    pub fn new() -> Self {
        Self::with_ttl(DEFAULT_ISOLATION_TTL)
    }

    pub fn with_ttl(ttl: Duration) -> Self {
        Self { isolated: DashMap::new(), ttl }
    }

    pub fn isolate(&self, endpoints: Endpoints) {
        self.isolated.insert(endpoints, Instant::now());
    }

    pub fn unisolate(&self, endpoints: &Endpoints) {
        self.isolated.remove(endpoints);
    }

    /// A consistent point-in-time copy, with TTL-expired entries excluded
    /// (and opportunistically evicted) so callers never see a stale
    /// isolation that should have lapsed.
    pub fn snapshot(&self) -> HashSet<Endpoints> {
        let now = Instant::now();
        let expired: Vec<Endpoints> = self
            .isolated
            .iter()
            .filter(|entry| now.duration_since(*entry.value()) >= self.ttl)
            .map(|entry| entry.key().clone())
            .collect();
        for endpoints in &expired {
            self.isolated.remove(endpoints);
        }
        self.isolated.iter().map(|entry| entry.key().clone()).collect()
    }
}

impl Default for IsolationRegistry {
    fn default() -> Self {
        Self::new()
    }
}
