use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::OnceLock;
use std::time::{SystemTime, UNIX_EPOCH};

use rand_core::{OsRng, RngCore};

/// Generates globally-unique opaque message ids by combining a per-process
/// prefix, the process id, a time component, and a monotonically increasing
/// counter. The prefix stands in for a host MAC address: there is no
/// portable way to read one without a new dependency, and a random prefix
/// serves the same purpose (telling concurrently-running processes apart)
/// without the privacy and platform-support baggage of reading a real NIC
/// address.
pub struct MessageIdGenerator {
    process_prefix: u64,
    counter: AtomicU64,
}

static PROCESS_PREFIX: OnceLock<u64> = OnceLock::new();

impl MessageIdGenerator {
    pub fn new() -> Self {
        let process_prefix = *PROCESS_PREFIX.get_or_init(random_prefix);
        Self { process_prefix, counter: AtomicU64::new(0) }
    }

    /// `prefix` pinned, for tests that need reproducible ids.
    #[cfg(test)]
    fn with_prefix(process_prefix: u64) -> Self {
        Self { process_prefix, counter: AtomicU64::new(0) }
    }

    pub fn next(&self) -> String {
        let sequence = self.counter.fetch_add(1, Ordering::Relaxed);
        let millis = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis() as u64;
        format!("{:016x}{:x}{:012x}", self.process_prefix, std::process::id(), millis)
            + &format!("{sequence:x}")
    }
}

impl Default for MessageIdGenerator {
    fn default() -> Self {
        Self::new()
    }
}

fn random_prefix() -> u64 {
    OsRng.next_u64()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn successive_ids_are_unique() {
        let generator = MessageIdGenerator::with_prefix(0xabc);
        let first = generator.next();
        let second = generator.next();
        assert_ne!(first, second);
    }

    #[test]
    fn ids_share_the_process_prefix() {
        let generator = MessageIdGenerator::with_prefix(0xabc);
        let first = generator.next();
        assert!(first.starts_with("0000000000000abc"));
    }
}
