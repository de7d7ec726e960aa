//! Bucketed peer knowledge.
//!
//! Peers arrive from independent sources — static configuration, peer
//! discovery, per-subscriber registration — each owning a named bucket.
//! The effective routing table is the monoidal fold of all buckets. Each
//! bucket has exactly one writer (caller discipline): a writer can only
//! ever delete peers from its own bucket, so one subsystem updating its
//! view can never yank a peer another subsystem still vouches for.

use fanout_types::{NodeId, Peers};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::fmt;

/// Name of one independently-written slot in the peer table.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BucketId(String);

impl From<&str> for BucketId {
    fn from(name: &str) -> Self {
        Self(name.to_owned())
    }
}

impl From<String> for BucketId {
    fn from(name: String) -> Self {
        Self(name)
    }
}

impl fmt::Display for BucketId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

pub(crate) struct Buckets<N: NodeId> {
    inner: Mutex<HashMap<BucketId, Peers<N>>>,
}

impl<N: NodeId> Buckets<N> {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(HashMap::new()),
        }
    }

    /// The merged view of every bucket.
    pub fn fold(&self) -> Peers<N> {
        self.inner
            .lock()
            .values()
            .cloned()
            .fold(Peers::default(), Peers::merge)
    }

    /// Apply `f` to one bucket under the lock and report which peer ids
    /// vanished from the fold — they are known by no bucket anymore and
    /// must have their queue state reclaimed.
    pub fn update(
        &self,
        id: BucketId,
        f: impl FnOnce(Peers<N>) -> Peers<N>,
    ) -> HashSet<N> {
        let mut map = self.inner.lock();
        let before = fold_ids(&map);

        let current = map.remove(&id).unwrap_or_default();
        let updated = f(current);
        if !updated.is_empty() {
            map.insert(id, updated);
        }

        let after = fold_ids(&map);
        before.difference(&after).cloned().collect()
    }

    pub fn bucket_count(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn snapshot(&self) -> Vec<(BucketId, Peers<N>)> {
        let mut buckets: Vec<_> = self
            .inner
            .lock()
            .iter()
            .map(|(id, peers)| (id.clone(), peers.clone()))
            .collect();
        buckets.sort_by(|(a, _), (b, _)| a.cmp(b));
        buckets
    }
}

fn fold_ids<N: NodeId>(map: &HashMap<BucketId, Peers<N>>) -> HashSet<N> {
    map.values().flat_map(Peers::node_ids).collect()
}
