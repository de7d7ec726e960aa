//! Per-destination failure cooldowns.
//!
//! A failed conversation records the destination with the cooldown chosen
//! by the failure policy; while the cooldown runs, the enqueue side skips
//! that destination when picking alternatives. Expired entries linger
//! harmlessly until overwritten, cleared, or removed with their peer.

use dashmap::DashMap;
use fanout_types::NodeId;
use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug, Clone, Copy)]
pub(crate) struct FailureEntry {
    /// Start of the failed conversation, not its end: a slow failure
    /// should not extend the cooldown by its own duration.
    pub failed_at: Instant,
    pub cooldown: Duration,
}

impl FailureEntry {
    pub fn is_recent(&self, now: Instant) -> bool {
        now < self.failed_at + self.cooldown
    }

    /// Cooldown time left at `now`, zero if expired.
    pub fn remaining(&self, now: Instant) -> Duration {
        (self.failed_at + self.cooldown).saturating_duration_since(now)
    }
}

pub(crate) struct FailureLog<N: NodeId> {
    peers: DashMap<N, FailureEntry>,
}

impl<N: NodeId> FailureLog<N> {
    pub fn new() -> Self {
        Self {
            peers: DashMap::new(),
        }
    }

    /// True while `dest` is inside a recorded cooldown window.
    pub fn has_recent(&self, dest: &N) -> bool {
        let now = Instant::now();
        self.peers.get(dest).is_some_and(|e| e.is_recent(now))
    }

    /// Record a failure observed at `failed_at`; overwrites any earlier
    /// entry for the destination.
    pub fn record(&self, dest: N, failed_at: Instant, cooldown: Duration) {
        self.peers.insert(
            dest,
            FailureEntry {
                failed_at,
                cooldown,
            },
        );
    }

    pub fn remove(&self, dest: &N) {
        self.peers.remove(dest);
    }

    /// Forget every recorded failure, e.g. when connectivity returns.
    pub fn clear(&self) {
        self.peers.clear();
    }

    /// Destinations currently in cooldown.
    pub fn recent_count(&self) -> usize {
        let now = Instant::now();
        self.peers
            .iter()
            .filter(|entry| entry.value().is_recent(now))
            .count()
    }

    pub fn snapshot(&self) -> Vec<(N, FailureEntry)> {
        self.peers
            .iter()
            .map(|entry| (entry.key().clone(), *entry.value()))
            .collect()
    }
}
