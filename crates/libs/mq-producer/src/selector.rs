use std::collections::HashSet;

use mq_core::{ClientError, Partition};
use mq_transport::IsolationRegistry;

use crate::publish_info::PublishInfo;

/// Picks candidate partitions for a send attempt, preferring non-isolated
/// endpoints and spreading across brokers when possible (C5).
///
/// The returned list is fixed for the lifetime of one send's attempt loop —
/// this function is the only place the cursor advances.
pub fn take_partitions(
    info: &PublishInfo,
    isolation: &IsolationRegistry,
    topic: &str,
    count: usize,
) -> Result<Vec<Partition>, ClientError> {
    let partitions = info.partitions();
    if partitions.is_empty() {
        return Err(ClientError::NoWritablePartition { topic: topic.to_string() });
    }

    let isolated = isolation.snapshot();
    let mut eligible: Vec<&Partition> =
        partitions.iter().filter(|p| !isolated.contains(&p.target)).collect();
    if eligible.is_empty() {
        // Best-effort fallback: every endpoint is isolated, but the caller
        // must not deadlock.
        eligible = partitions.iter().collect();
    }

    let mut candidates = Vec::with_capacity(count);
    let mut used_brokers: HashSet<&str> = HashSet::new();
    let len = eligible.len();

    for _ in 0..count {
        let start = info.advance_cursor() as usize;
        let mut chosen = eligible[start % len];
        if used_brokers.len() < len {
            for offset in 0..len {
                let candidate = eligible[(start + offset) % len];
                if !used_brokers.contains(candidate.broker_name.as_str()) {
                    chosen = candidate;
                    break;
                }
            }
        }
        used_brokers.insert(chosen.broker_name.as_str());
        candidates.push(chosen.clone());
    }

    Ok(candidates)
}

#[cfg(test)]
mod tests {
    use super::*;
    use mq_core::{Endpoints, TopicRouteData};

    fn info_with(partitions: Vec<Partition>) -> PublishInfo {
        let route = TopicRouteData::new(partitions);
        PublishInfo::from_route(&route)
    }

    #[test]
    fn empty_partitions_fail_with_no_writable_partition() {
        let info = info_with(vec![]);
        let isolation = IsolationRegistry::new();
        let err = take_partitions(&info, &isolation, "orders", 3).unwrap_err();
        assert!(matches!(err, ClientError::NoWritablePartition { .. }));
    }

    #[test]
    fn falls_back_to_all_partitions_when_everything_isolated() {
        let a = Partition::new(0, Endpoints::single("10.0.0.1:9000"), "b0");
        let b = Partition::new(1, Endpoints::single("10.0.0.2:9000"), "b1");
        let isolation = IsolationRegistry::new();
        isolation.isolate(a.target.clone());
        isolation.isolate(b.target.clone());
        let info = info_with(vec![a, b]);
        let candidates = take_partitions(&info, &isolation, "orders", 2).unwrap();
        assert_eq!(candidates.len(), 2);
    }

    #[test]
    fn prefers_non_isolated_endpoints() {
        let a = Partition::new(0, Endpoints::single("10.0.0.1:9000"), "b0");
        let b = Partition::new(1, Endpoints::single("10.0.0.2:9000"), "b1");
        let isolation = IsolationRegistry::new();
        isolation.isolate(a.target.clone());
        let info = info_with(vec![a, b.clone()]);
        let candidates = take_partitions(&info, &isolation, "orders", 3).unwrap();
        assert!(candidates.iter().all(|p| p.target == b.target));
    }
}
