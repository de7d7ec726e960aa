//! Public facade: construction, enqueue entry points, bucket updates,
//! lifecycle, and state dumps.

use crate::buckets::{BucketId, Buckets};
use crate::enqueue::enqueue_with;
use crate::error::DeliveryError;
use crate::failures::FailureLog;
use crate::inflight::InFlight;
use crate::multiqueue::MultiQueue;
use crate::packet::{Delivery, Packet, QueueKey};
use crate::policy::{
    dequeue_policy_for, enqueue_policy_for, failure_policy_for, DequeuePolicy, EnqueuePolicy,
    FailurePolicy, SelfRole,
};
use crate::scheduler;
use crate::signal::{Ctrl, Signal};
use bytes::Bytes;
use fanout_transport::Transport;
use fanout_types::{MessageClass, NodeId, Peers, Precedence};
use futures::future::join_all;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::oneshot;
use tokio::time::Instant;
use tracing::{debug, error, warn};

/// How many enqueue rounds a cherished message gets before we give up.
const CHERISH_ROUNDS: usize = 4;

/// State shared between callers, the dispatch loop, and workers.
pub(crate) struct Shared<N: NodeId> {
    pub self_id: N,
    pub enqueue_policy: EnqueuePolicy,
    pub dequeue_policy: DequeuePolicy,
    pub failure_policy: FailurePolicy,
    pub buckets: Buckets<N>,
    pub in_flight: InFlight<N>,
    pub failures: FailureLog<N>,
    pub scheduled: MultiQueue<QueueKey<N>, Packet<N>>,
    pub signal: Signal,
    /// Set by the dispatch loop on shutdown; enqueues are refused after.
    pub stopped: AtomicBool,
    running: AtomicBool,
}

/// Outbound message queue: decides which peers receive a message, at what
/// precedence, with bounded concurrent work per destination and failure
/// cooldowns. See the crate docs for the architecture.
///
/// Cheap to clone; all clones share one queue. One node runs one instance.
pub struct OutboundQueue<N: NodeId> {
    shared: Arc<Shared<N>>,
}

impl<N: NodeId> Clone for OutboundQueue<N> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<N: NodeId> OutboundQueue<N> {
    /// Create an empty queue with explicit policies.
    pub fn new(
        self_id: N,
        enqueue_policy: EnqueuePolicy,
        dequeue_policy: DequeuePolicy,
        failure_policy: FailurePolicy,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                self_id,
                enqueue_policy,
                dequeue_policy,
                failure_policy,
                buckets: Buckets::new(),
                in_flight: InFlight::new(),
                failures: FailureLog::new(),
                scheduled: MultiQueue::new(),
                signal: Signal::new(),
                stopped: AtomicBool::new(false),
                running: AtomicBool::new(false),
            }),
        }
    }

    /// Create a queue with the default policies for `role`.
    pub fn with_role(self_id: N, role: SelfRole) -> Self {
        Self::new(
            self_id,
            enqueue_policy_for(role),
            dequeue_policy_for(role),
            failure_policy_for(role),
        )
    }

    /// Schedule a message; fire-and-forget. Returns one delivery handle
    /// per chosen destination; dropping them is fine.
    ///
    /// Never blocks on the network — only short lock acquisitions.
    pub fn enqueue(&self, class: MessageClass<N>, payload: Bytes) -> Vec<(N, Delivery)> {
        enqueue_with(&self.shared, &class, &payload, None)
    }

    /// Like [`enqueue`](Self::enqueue), restricted to the given peers.
    pub fn enqueue_to(
        &self,
        class: MessageClass<N>,
        payload: Bytes,
        restriction: &[N],
    ) -> Vec<(N, Delivery)> {
        let allowed: HashSet<N> = restriction.iter().cloned().collect();
        enqueue_with(&self.shared, &class, &payload, Some(&allowed))
    }

    /// Enqueue and wait for every conversation to finish. Logs a warning
    /// when destinations were chosen but none succeeded.
    pub async fn enqueue_sync(
        &self,
        class: MessageClass<N>,
        payload: Bytes,
    ) -> Vec<(N, Result<Bytes, DeliveryError>)> {
        let handles = self.enqueue(class.clone(), payload);
        Self::await_all(&class, handles).await
    }

    /// [`enqueue_sync`](Self::enqueue_sync) restricted to the given peers.
    pub async fn enqueue_sync_to(
        &self,
        class: MessageClass<N>,
        payload: Bytes,
        restriction: &[N],
    ) -> Vec<(N, Result<Bytes, DeliveryError>)> {
        let handles = self.enqueue_to(class.clone(), payload, restriction);
        Self::await_all(&class, handles).await
    }

    /// Enqueue, insisting on at least one successful delivery: re-runs
    /// the whole enqueue up to four times until some destination
    /// acknowledges. Returns whether any conversation succeeded.
    pub async fn enqueue_cherished(&self, class: MessageClass<N>, payload: Bytes) -> bool {
        self.cherish(class, payload, None).await
    }

    /// [`enqueue_cherished`](Self::enqueue_cherished) restricted to the
    /// given peers.
    pub async fn enqueue_cherished_to(
        &self,
        class: MessageClass<N>,
        payload: Bytes,
        restriction: &[N],
    ) -> bool {
        let allowed: HashSet<N> = restriction.iter().cloned().collect();
        self.cherish(class, payload, Some(allowed)).await
    }

    async fn cherish(
        &self,
        class: MessageClass<N>,
        payload: Bytes,
        restriction: Option<HashSet<N>>,
    ) -> bool {
        for round in 0..CHERISH_ROUNDS {
            let handles = enqueue_with(&self.shared, &class, &payload, restriction.as_ref());
            let outcomes = join_all(
                handles
                    .into_iter()
                    .map(|(_, delivery)| delivery.wait()),
            )
            .await;
            if outcomes.iter().any(Result::is_ok) {
                return true;
            }
            debug!(class = %class, round, "cherished delivery round failed");
        }
        error!(class = %class, rounds = CHERISH_ROUNDS, "cherished message exhausted its retries");
        false
    }

    async fn await_all(
        class: &MessageClass<N>,
        handles: Vec<(N, Delivery)>,
    ) -> Vec<(N, Result<Bytes, DeliveryError>)> {
        let outcomes = join_all(handles.into_iter().map(|(dest, delivery)| async move {
            (dest, delivery.wait().await)
        }))
        .await;
        if !outcomes.is_empty() && outcomes.iter().all(|(_, r)| r.is_err()) {
            warn!(class = %class, dests = outcomes.len(), "no conversation succeeded");
        }
        outcomes
    }

    /// Replace the contents of one peer bucket.
    ///
    /// `f` receives the bucket's current peers and returns its new
    /// contents. Peers that thereby vanish from the fold of *all* buckets
    /// are reclaimed completely: their scheduled packets are discarded
    /// (their delivery handles resolve as abandoned) and their in-flight
    /// and failure records dropped.
    ///
    /// Each bucket must have a single writer.
    pub fn update_peers_bucket(
        &self,
        bucket: impl Into<BucketId>,
        f: impl FnOnce(Peers<N>) -> Peers<N>,
    ) {
        let vanished = self.shared.buckets.update(bucket.into(), f);
        for peer in &vanished {
            let dropped = self
                .shared
                .scheduled
                .remove_all_in(&QueueKey::Dest(peer.clone()));
            if !dropped.is_empty() {
                debug!(
                    peer = %peer,
                    dropped = dropped.len(),
                    "discarded scheduled messages for removed peer"
                );
            }
            self.shared.in_flight.remove(peer);
            self.shared.failures.remove(peer);
        }
        if !vanished.is_empty() {
            // The queue may just have become empty; a waiting flush or
            // shutdown needs a wakeup to notice.
            self.shared.signal.poke();
        }
    }

    /// Forget all failure cooldowns, e.g. after regaining connectivity.
    pub fn clear_recent_failures(&self) {
        self.shared.failures.clear();
    }

    /// Run the dispatch loop against `transport` until shutdown.
    ///
    /// Must be called exactly once per queue; a second call is a
    /// programmer error and panics.
    pub async fn run<T: Transport<N>>(&self, transport: T) {
        let was_running = self.shared.running.swap(true, Ordering::SeqCst);
        assert!(!was_running, "OutboundQueue::run called twice");
        scheduler::run(Arc::clone(&self.shared), Arc::new(transport)).await;
    }

    /// Wait until everything scheduled so far has been dispatched and
    /// every worker has finished. Messages enqueued while the flush is
    /// pending are drained too (scheduled traffic outranks control).
    pub async fn flush(&self) {
        let (tx, rx) = oneshot::channel();
        self.shared.signal.submit(Ctrl::Flush(tx));
        if rx.await.is_err() {
            warn!("flush submitted but the dispatch loop is gone");
        }
    }

    /// Ask the dispatch loop to stop and wait until it has: the queue
    /// drains, workers finish, then [`run`](Self::run) returns.
    pub async fn shutdown(&self) {
        let (tx, rx) = oneshot::channel();
        self.shared.signal.submit(Ctrl::Shutdown(tx));
        if rx.await.is_err() {
            warn!("shutdown submitted but the dispatch loop is gone");
        }
    }

    /// Counters for monitoring.
    pub fn stats(&self) -> QueueStats {
        let mut scheduled_by_precedence = [0usize; Precedence::COUNT];
        for prec in Precedence::ALL {
            scheduled_by_precedence[prec.index()] =
                self.shared.scheduled.len_of(&QueueKey::Prec(prec));
        }
        QueueStats {
            scheduled_total: self.shared.scheduled.total_len(),
            scheduled_by_precedence,
            in_flight_total: self.shared.in_flight.grand_total(),
            in_flight_peers: self.shared.in_flight.peer_count(),
            recent_failures: self.shared.failures.recent_count(),
            buckets: self.shared.buckets.bucket_count(),
        }
    }

    /// Human-readable dump of the queue's entire mutable state, for
    /// operator diagnostics.
    pub fn dump_state(&self) -> String {
        use std::fmt::Write;

        let now = Instant::now();
        let mut out = String::new();
        let _ = writeln!(out, "outbound queue of {}", self.shared.self_id);

        let _ = writeln!(out, "scheduled ({} total):", self.shared.scheduled.total_len());
        for prec in Precedence::descending() {
            let count = self.shared.scheduled.len_of(&QueueKey::Prec(prec));
            if count > 0 {
                let _ = writeln!(out, "  {prec}: {count}");
            }
        }

        let mut in_flight = self.shared.in_flight.snapshot();
        in_flight.sort_by(|(a, _), (b, _)| a.cmp(b));
        let _ = writeln!(out, "in flight ({} total):", self.shared.in_flight.grand_total());
        for (peer, counts) in in_flight {
            let per_prec: Vec<String> = Precedence::descending()
                .filter(|p| counts.get(*p) > 0)
                .map(|p| format!("{p}={}", counts.get(p)))
                .collect();
            let _ = writeln!(out, "  {peer}: {} ({})", counts.total(), per_prec.join(", "));
        }

        let mut failures = self.shared.failures.snapshot();
        failures.sort_by(|(a, _), (b, _)| a.cmp(b));
        let _ = writeln!(out, "failures ({}):", failures.len());
        for (peer, entry) in failures {
            if entry.is_recent(now) {
                let _ = writeln!(out, "  {peer}: cooling down for {:?}", entry.remaining(now));
            } else {
                let _ = writeln!(out, "  {peer}: expired");
            }
        }

        let buckets = self.shared.buckets.snapshot();
        let _ = writeln!(out, "buckets ({}):", buckets.len());
        for (id, peers) in buckets {
            let _ = writeln!(
                out,
                "  {id}: {} forwarding sets, {} peers",
                peers.set_count(),
                peers.node_ids().len()
            );
        }

        out
    }
}

/// Point-in-time counters over the queue's state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueStats {
    /// Packets waiting in the scheduled queue.
    pub scheduled_total: usize,
    /// Scheduled packets per precedence, indexed by `Precedence::index()`.
    pub scheduled_by_precedence: [usize; Precedence::COUNT],
    /// Conversations dispatched but not yet completed.
    pub in_flight_total: usize,
    /// Destinations with at least one conversation in flight.
    pub in_flight_peers: usize,
    /// Destinations currently in failure cooldown.
    pub recent_failures: usize,
    /// Peer buckets currently present.
    pub buckets: usize,
}
