use std::collections::BTreeSet;

/// A partition id, scoped to a topic. `(topic, id)` is the full identity
///; `Partition` itself only carries the bare id plus its target.
pub type PartitionId = i32;

/// A remote broker address, expressed as a set of `host:port` strings.
/// Equality is structural on the address set, which is exactly
/// what `derive(PartialEq, Eq, Hash)` over a `BTreeSet<String>` gives us —
/// this type is used directly as the isolation registry's key (C2).
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct Endpoints {
    addresses: BTreeSet<String>,
}

impl Endpoints {
    pub fn single(address: impl Into<String>) -> Self {
        let mut addresses = BTreeSet::new();
        addresses.insert(address.into());
        Self { addresses }
    }

    pub fn from_addresses(addresses: impl IntoIterator<Item = String>) -> Self {
        Self { addresses: addresses.into_iter().collect() }
    }

    pub fn addresses(&self) -> impl Iterator<Item = &str> {
        self.addresses.iter().map(String::as_str)
    }

    pub fn primary(&self) -> Option<&str> {
        self.addresses.iter().next().map(String::as_str)
    }
}

/// A broker-owned shard of a topic, produced by the route-fetch and consumed
/// read-only by producers.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Partition {
    pub id: PartitionId,
    pub target: Endpoints,
    pub writable: bool,
    pub broker_name: String,
}

impl Partition {
    pub fn new(id: PartitionId, target: Endpoints, broker_name: impl Into<String>) -> Self {
        Self { id, target, writable: true, broker_name: broker_name.into() }
    }

    pub fn read_only(mut self) -> Self {
        self.writable = false;
        self
    }
}

/// The ordered sequence of partitions for a topic, as delivered by the route
/// service. Opaque beyond its partition list.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TopicRouteData {
    partitions: Vec<Partition>,
}

impl TopicRouteData {
    pub fn new(partitions: Vec<Partition>) -> Self {
        Self { partitions }
    }

    pub fn partitions(&self) -> &[Partition] {
        &self.partitions
    }

    pub fn writable_partitions(&self) -> Vec<Partition> {
        self.partitions.iter().filter(|p| p.writable).cloned().collect()
    }
}
