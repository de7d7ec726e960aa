//! Per-destination in-flight conversation counts, broken out by
//! precedence so the enqueue side can compute "work queued ahead of this
//! message" without walking the scheduled queue.

use dashmap::DashMap;
use fanout_types::{NodeId, Precedence};
use std::collections::HashMap;

/// Conversation counts per precedence level for one destination.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct PrecCounts([usize; Precedence::COUNT]);

impl PrecCounts {
    pub fn incr(&mut self, prec: Precedence) {
        self.0[prec.index()] += 1;
    }

    pub fn decr(&mut self, prec: Precedence) {
        self.0[prec.index()] = self.0[prec.index()].saturating_sub(1);
    }

    pub fn get(&self, prec: Precedence) -> usize {
        self.0[prec.index()]
    }

    pub fn total(&self) -> usize {
        self.0.iter().sum()
    }

    pub fn at_or_above(&self, prec: Precedence) -> usize {
        prec.and_above().map(|p| self.get(p)).sum()
    }
}

/// Conversations dispatched but not yet completed, per destination.
pub(crate) struct InFlight<N: NodeId> {
    peers: DashMap<N, PrecCounts>,
}

impl<N: NodeId> InFlight<N> {
    pub fn new() -> Self {
        Self {
            peers: DashMap::new(),
        }
    }

    pub fn incr(&self, dest: &N, prec: Precedence) {
        self.peers.entry(dest.clone()).or_default().incr(prec);
    }

    /// Decrement, dropping the entry once it reaches zero. Tolerates a
    /// missing entry: the peer may have been reclaimed by a bucket update
    /// while its last conversation was still running.
    pub fn decr(&self, dest: &N, prec: Precedence) {
        if let Some(mut counts) = self.peers.get_mut(dest) {
            counts.decr(prec);
        }
        self.peers.remove_if(dest, |_, counts| counts.total() == 0);
    }

    pub fn total(&self, dest: &N) -> usize {
        self.peers.get(dest).map_or(0, |c| c.total())
    }

    pub fn at_or_above(&self, dest: &N, prec: Precedence) -> usize {
        self.peers.get(dest).map_or(0, |c| c.at_or_above(prec))
    }

    /// Totals per destination, for the dispatch loop's admissibility scan.
    pub fn totals_snapshot(&self) -> HashMap<N, usize> {
        self.peers
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().total()))
            .collect()
    }

    /// Full per-precedence view, for state dumps.
    pub fn snapshot(&self) -> Vec<(N, PrecCounts)> {
        self.peers
            .iter()
            .map(|entry| (entry.key().clone(), *entry.value()))
            .collect()
    }

    pub fn remove(&self, dest: &N) {
        self.peers.remove(dest);
    }

    pub fn grand_total(&self) -> usize {
        self.peers.iter().map(|entry| entry.value().total()).sum()
    }

    pub fn peer_count(&self) -> usize {
        self.peers.len()
    }
}
