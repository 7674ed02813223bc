//! Statistics counters.
//!
//! Counters are incremented by datapath workers without synchronization;
//! they are statistical, not transactional. Everything here is a relaxed
//! atomic so a shared reference is enough to record events.

use std::sync::atomic::{AtomicU64, Ordering};

/// Atomic counter for thread-safe increment operations.
#[derive(Debug, Default)]
pub struct Counter(AtomicU64);

impl Counter {
    /// Creates a new counter initialized to zero.
    pub fn new() -> Self {
        Self(AtomicU64::new(0))
    }

    /// Increments the counter by 1.
    pub fn inc(&self) {
        self.0.fetch_add(1, Ordering::Relaxed);
    }

    /// Adds a value to the counter.
    pub fn add(&self, val: u64) {
        self.0.fetch_add(val, Ordering::Relaxed);
    }

    /// Gets the current value of the counter.
    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

/// Per-label usage statistics.
///
/// `hits`/`misses` count the FIB-intersection path; `enforced_hits`/
/// `enforced_misses` count the default-route enforced path that bypasses
/// the intersection.
#[derive(Debug, Default)]
pub struct LabelStats {
    pub hits: Counter,
    pub misses: Counter,
    pub enforced_hits: Counter,
    pub enforced_misses: Counter,
}

/// Per-policy counters.
#[derive(Debug, Default)]
pub struct PolicyCounters {
    /// ACL lookup hit.
    pub matched: Counter,
    /// Policy applied successfully.
    pub applied: Counter,
    /// Policy failed, fell back to default routing.
    pub fallback: Counter,
    /// Policy failed, packet dropped.
    pub dropped: Counter,
    /// Default-route override action engaged.
    pub default_route: Counter,
}

/// Datapath node counters.
#[derive(Debug, Default)]
pub struct NodeCounters {
    /// Packets that matched an ACL.
    pub matched: Counter,
    /// Packets forwarded by a policy descriptor.
    pub policy_forwarded: Counter,
    /// Packets forwarded by the plain FIB path.
    pub fib_forwarded: Counter,
    /// Packets that bypassed classification (locally destined).
    pub local_bypass: Counter,
}
