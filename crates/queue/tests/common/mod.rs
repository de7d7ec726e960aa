//! Shared fixtures: a scripted in-memory transport and policy helpers.
#![allow(dead_code)] // each test binary uses a different subset

use async_trait::async_trait;
use bytes::Bytes;
use fanout_queue::{
    DequeueLimits, DequeuePolicy, EnqueueInstruction, EnqueuePolicy, FailurePolicy, Transport,
    TransportError,
};
use fanout_types::{MessageKind, NodeType, Precedence};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::time::Instant;

/// Peer identity used throughout the tests.
pub type Nid = &'static str;

/// What the transport should do for one destination. Default is to
/// acknowledge immediately.
#[derive(Clone)]
pub enum Behavior {
    Ok,
    OkAfter(Duration),
    Fail,
    /// Park the conversation until the test adds a permit.
    Hold(Arc<Semaphore>),
}

/// One observed `send` call.
#[derive(Clone)]
pub struct SendRecord {
    pub dest: Nid,
    pub kind: MessageKind,
    pub payload: Bytes,
    pub started_at: Instant,
}

/// Transport double that records every conversation and follows a
/// per-destination script.
pub struct ScriptedTransport {
    behaviors: Mutex<HashMap<Nid, Behavior>>,
    sends: Mutex<Vec<SendRecord>>,
    concurrent: AtomicUsize,
    max_concurrent: AtomicUsize,
    per_dest: Mutex<HashMap<Nid, (usize, usize)>>,
}

impl ScriptedTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            behaviors: Mutex::new(HashMap::new()),
            sends: Mutex::new(Vec::new()),
            concurrent: AtomicUsize::new(0),
            max_concurrent: AtomicUsize::new(0),
            per_dest: Mutex::new(HashMap::new()),
        })
    }

    pub fn set_behavior(&self, dest: Nid, behavior: Behavior) {
        self.behaviors.lock().insert(dest, behavior);
    }

    pub fn sends(&self) -> Vec<SendRecord> {
        self.sends.lock().clone()
    }

    pub fn send_count(&self) -> usize {
        self.sends.lock().len()
    }

    pub fn sends_to(&self, dest: Nid) -> usize {
        self.sends.lock().iter().filter(|r| r.dest == dest).count()
    }

    /// Highest conversation concurrency observed across all peers.
    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent.load(Ordering::SeqCst)
    }

    /// Highest conversation concurrency observed toward one peer.
    pub fn max_concurrent_to(&self, dest: Nid) -> usize {
        self.per_dest.lock().get(dest).map_or(0, |(_, max)| *max)
    }

    fn enter(&self, dest: Nid) {
        let now = self.concurrent.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_concurrent.fetch_max(now, Ordering::SeqCst);
        let mut per_dest = self.per_dest.lock();
        let (current, max) = per_dest.entry(dest).or_insert((0, 0));
        *current += 1;
        *max = (*max).max(*current);
    }

    fn exit(&self, dest: Nid) {
        self.concurrent.fetch_sub(1, Ordering::SeqCst);
        if let Some((current, _)) = self.per_dest.lock().get_mut(dest) {
            *current -= 1;
        }
    }
}

#[async_trait]
impl Transport<Nid> for ScriptedTransport {
    async fn send(
        &self,
        dest: &Nid,
        kind: MessageKind,
        payload: Bytes,
    ) -> Result<Bytes, TransportError> {
        self.sends.lock().push(SendRecord {
            dest: *dest,
            kind,
            payload,
            started_at: Instant::now(),
        });
        let behavior = self
            .behaviors
            .lock()
            .get(dest)
            .cloned()
            .unwrap_or(Behavior::Ok);
        self.enter(*dest);

        let result = match behavior {
            Behavior::Ok => Ok(Bytes::from_static(b"ack")),
            Behavior::OkAfter(delay) => {
                tokio::time::sleep(delay).await;
                Ok(Bytes::from_static(b"ack"))
            }
            Behavior::Fail => Err(TransportError::PeerError("scripted failure".into())),
            Behavior::Hold(gate) => {
                let permit = gate.acquire().await.expect("gate never closes");
                permit.forget();
                Ok(Bytes::from_static(b"ack"))
            }
        };

        self.exit(*dest);
        result
    }
}

/// Enqueue policy sending every message class to every forwarding set of
/// `dest`, at one fixed precedence.
pub fn policy_all(dest: NodeType, max_ahead: usize, prec: Precedence) -> EnqueuePolicy {
    Arc::new(move |_, _| {
        vec![EnqueueInstruction::All {
            dest,
            max_ahead,
            prec,
        }]
    })
}

/// Enqueue policy trying one forwarding set of `dest_order`, at one fixed
/// precedence.
pub fn policy_one(dest_order: Vec<NodeType>, max_ahead: usize, prec: Precedence) -> EnqueuePolicy {
    Arc::new(move |_, _| {
        vec![EnqueueInstruction::One {
            dest_order: dest_order.clone(),
            max_ahead,
            prec,
        }]
    })
}

/// Dequeue policy with the same limits for every destination type.
pub fn limits(rate: Option<u32>, max_in_flight: usize) -> DequeuePolicy {
    Arc::new(move |_| DequeueLimits {
        rate,
        max_in_flight,
    })
}

/// Failure policy with one flat cooldown.
pub fn cooldown(duration: Duration) -> FailurePolicy {
    Arc::new(move |_, _, _| duration)
}

/// Let spawned tasks make progress without advancing time.
pub async fn settle() {
    for _ in 0..64 {
        tokio::task::yield_now().await;
    }
}

/// A distinct payload for send-identity assertions.
pub fn payload(tag: &str) -> Bytes {
    Bytes::from(tag.to_owned())
}
