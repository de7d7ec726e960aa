//! Concurrent multi-queue: one item indexed under several keys at once.
//!
//! Each stored item is appended to the FIFO of every key it is enqueued
//! under; dequeuing it from one key removes it from all of them. A single
//! mutex over the whole structure makes every operation atomic across
//! keys, which is what the scheduling invariants need:
//!
//! - an item is present under *all* of its keys or under none;
//! - per key, items become candidates in enqueue order.
//!
//! Item identity is pointer identity of the `Arc`, so the same allocation
//! must not be enqueued twice.

use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::hash::Hash;
use std::sync::Arc;

/// A slot pairs the shared item with the full key list it sits under, so
/// removal can visit every other queue holding it.
struct Slot<K, T> {
    item: Arc<T>,
    keys: Arc<[K]>,
}

impl<K, T> Clone for Slot<K, T> {
    fn clone(&self) -> Self {
        Self {
            item: Arc::clone(&self.item),
            keys: Arc::clone(&self.keys),
        }
    }
}

struct Inner<K, T> {
    queues: HashMap<K, VecDeque<Slot<K, T>>>,
    /// Number of distinct items (not per-key entries).
    items: usize,
}

/// Mapping from key to FIFO where one item lives under many keys.
pub(crate) struct MultiQueue<K, T> {
    inner: Mutex<Inner<K, T>>,
}

impl<K: Eq + Hash + Clone, T> MultiQueue<K, T> {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                queues: HashMap::new(),
                items: 0,
            }),
        }
    }

    /// Append `item` to the FIFO of every key in `keys`, atomically.
    pub fn enqueue(&self, item: Arc<T>, keys: Vec<K>) {
        let keys: Arc<[K]> = keys.into();
        let slot = Slot { item, keys };
        let mut inner = self.inner.lock();
        for key in slot.keys.iter() {
            inner
                .queues
                .entry(key.clone())
                .or_default()
                .push_back(slot.clone());
        }
        inner.items += 1;
    }

    /// Pop the first item under `key` satisfying `pred`, removing it from
    /// every key it was enqueued under. Items failing the predicate keep
    /// their position.
    pub fn dequeue(&self, key: &K, mut pred: impl FnMut(&T) -> bool) -> Option<Arc<T>> {
        let mut inner = self.inner.lock();
        let queue = inner.queues.get_mut(key)?;
        let pos = queue.iter().position(|slot| pred(&slot.item))?;
        let slot = queue.remove(pos).expect("position was just found");
        if queue.is_empty() {
            inner.queues.remove(key);
        }
        for other in slot.keys.iter().filter(|k| *k != key) {
            Self::remove_entry(&mut inner.queues, other, &slot.item);
        }
        inner.items -= 1;
        Some(slot.item)
    }

    /// Remove every item indexed under `key` from all of its keys.
    /// Returns the removed items.
    pub fn remove_all_in(&self, key: &K) -> Vec<Arc<T>> {
        let mut inner = self.inner.lock();
        let Some(queue) = inner.queues.remove(key) else {
            return Vec::new();
        };
        let mut removed = Vec::with_capacity(queue.len());
        for slot in queue {
            for other in slot.keys.iter().filter(|k| *k != key) {
                Self::remove_entry(&mut inner.queues, other, &slot.item);
            }
            inner.items -= 1;
            removed.push(slot.item);
        }
        removed
    }

    /// Number of items indexed under `key`.
    pub fn len_of(&self, key: &K) -> usize {
        self.inner.lock().queues.get(key).map_or(0, VecDeque::len)
    }

    /// Number of distinct items in the queue.
    pub fn total_len(&self) -> usize {
        self.inner.lock().items
    }

    pub fn is_empty(&self) -> bool {
        self.total_len() == 0
    }

    fn remove_entry(queues: &mut HashMap<K, VecDeque<Slot<K, T>>>, key: &K, item: &Arc<T>) {
        if let Some(queue) = queues.get_mut(key) {
            if let Some(pos) = queue.iter().position(|s| Arc::ptr_eq(&s.item, item)) {
                queue.remove(pos);
            }
            if queue.is_empty() {
                queues.remove(key);
            }
        }
    }
}
