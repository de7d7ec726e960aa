//! The dispatch loop: one supervisor task pulling admissible packets and
//! spawning one worker per conversation.
//!
//! The supervisor never talks to the network itself — a stuck peer must
//! not block priority service to everyone else — so each dequeued packet
//! is handed to a short-lived worker task. Workers live in a
//! [`JoinSet`], which doubles as the task registry: flush and shutdown
//! drain it, and dropping the supervisor (panic, abort) aborts every
//! live worker.
//!
//! Control messages are taken only when the scheduled queue is empty,
//! giving real traffic strict priority over lifecycle requests.

use crate::packet::{Packet, QueueKey};
use crate::queue::Shared;
use crate::signal::Ctrl;
use fanout_transport::Transport;
use fanout_types::{NodeId, Precedence};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tracing::{debug, info, trace, warn};

enum Wakeup<N> {
    Packet(Arc<Packet<N>>),
    Ctrl(Ctrl),
}

/// Run the dispatch loop until a shutdown control message is processed.
pub(crate) async fn run<N, T>(shared: Arc<Shared<N>>, transport: Arc<T>)
where
    N: NodeId,
    T: Transport<N>,
{
    let mut workers: JoinSet<()> = JoinSet::new();
    info!(self_id = %shared.self_id, "outbound queue dispatch loop started");

    loop {
        // Reap finished workers so the set only holds live tasks.
        while workers.try_join_next().is_some() {}

        match next_wakeup(&shared).await {
            Wakeup::Packet(packet) => dispatch(&shared, &transport, &mut workers, packet),
            Wakeup::Ctrl(Ctrl::Flush(ack)) => {
                debug!(pending_workers = workers.len(), "flush: draining workers");
                drain(&mut workers).await;
                let _ = ack.send(());
            }
            Wakeup::Ctrl(Ctrl::Shutdown(ack)) => {
                debug!(pending_workers = workers.len(), "shutdown: draining workers");
                drain(&mut workers).await;
                shared.stopped.store(true, Ordering::SeqCst);
                // Anything that raced in while we drained is abandoned;
                // its delivery handles resolve instead of hanging.
                let stranded = purge_scheduled(&shared);
                if stranded > 0 {
                    debug!(stranded, "discarded packets enqueued during shutdown");
                }
                let _ = ack.send(());
                info!(self_id = %shared.self_id, "outbound queue dispatch loop stopped");
                return;
            }
        }
    }
}

/// Block until there is either an admissible packet or, with the
/// scheduled queue empty, a pending control message.
async fn next_wakeup<N: NodeId>(shared: &Shared<N>) -> Wakeup<N> {
    loop {
        if let Some(packet) = try_next_packet(shared) {
            return Wakeup::Packet(packet);
        }
        // Scheduled messages outrank flush/shutdown: only surface control
        // when nothing is waiting (inadmissible packets still count as
        // waiting — a finishing worker will poke and free them).
        if shared.scheduled.is_empty() {
            if let Some(ctrl) = shared.signal.try_take_ctrl() {
                return Wakeup::Ctrl(ctrl);
            }
        }
        shared.signal.wait().await;
    }
}

/// Highest-precedence packet whose destination has in-flight room.
///
/// The in-flight snapshot is taken before touching the multi-queue so the
/// two locks are never held together.
fn try_next_packet<N: NodeId>(shared: &Shared<N>) -> Option<Arc<Packet<N>>> {
    let totals = shared.in_flight.totals_snapshot();
    for prec in Precedence::descending() {
        let packet = shared.scheduled.dequeue(&QueueKey::Prec(prec), |p| {
            let current = totals.get(&p.dest).copied().unwrap_or(0);
            current < (shared.dequeue_policy)(p.dest_type).max_in_flight
        });
        if packet.is_some() {
            return packet;
        }
    }
    None
}

/// Account the packet as in flight and spawn its worker.
fn dispatch<N, T>(
    shared: &Arc<Shared<N>>,
    transport: &Arc<T>,
    workers: &mut JoinSet<()>,
    packet: Arc<Packet<N>>,
) where
    N: NodeId,
    T: Transport<N>,
{
    shared.in_flight.incr(&packet.dest, packet.prec);
    let limits = (shared.dequeue_policy)(packet.dest_type);
    let shared = Arc::clone(shared);
    let transport = Arc::clone(transport);

    workers.spawn(async move {
        let started = Instant::now();
        trace!(dest = %packet.dest, kind = %packet.kind, prec = %packet.prec, "conversation started");

        let result = transport
            .send(&packet.dest, packet.kind, packet.payload.clone())
            .await;
        let elapsed = started.elapsed();

        let cooldown = match &result {
            Ok(_) => {
                trace!(
                    dest = %packet.dest,
                    kind = %packet.kind,
                    elapsed_us = elapsed.as_micros() as u64,
                    "conversation succeeded"
                );
                None
            }
            Err(err) => {
                warn!(dest = %packet.dest, kind = %packet.kind, error = %err, "conversation failed");
                Some((shared.failure_policy)(packet.dest_type, packet.kind, err))
            }
        };

        packet.resolve(result);

        // Pacing: hold the in-flight slot for the rest of the per-send
        // interval so this destination type drains at the policy rate.
        if let Some(per_sec) = limits.rate.filter(|n| *n > 0) {
            let interval = Duration::from_micros(1_000_000 / u64::from(per_sec));
            tokio::time::sleep(interval.saturating_sub(elapsed)).await;
        }

        if let Some(cooldown) = cooldown {
            shared
                .failures
                .record(packet.dest.clone(), started, cooldown);
        }

        shared.in_flight.decr(&packet.dest, packet.prec);
        shared.signal.poke();
    });
}

/// Drop every packet still in the scheduled queue. Returns how many.
fn purge_scheduled<N: NodeId>(shared: &Shared<N>) -> usize {
    let mut purged = 0;
    for prec in Precedence::descending() {
        purged += shared
            .scheduled
            .remove_all_in(&QueueKey::Prec(prec))
            .len();
    }
    purged
}

/// Wait for every live worker. Worker panics are contained here: the
/// conversation's delivery handle already resolved or reports abandoned.
async fn drain(workers: &mut JoinSet<()>) {
    while let Some(result) = workers.join_next().await {
        if let Err(err) = result {
            if err.is_panic() {
                warn!("worker task panicked during drain");
            }
        }
    }
}
