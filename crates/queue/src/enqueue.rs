//! The enqueue interpreter: expands a message class into scheduled
//! packets.
//!
//! The enqueue policy yields instructions; for each forwarding set touched
//! by an instruction, [`pick_alt`] chooses the least-loaded alternative
//! that is not cooling down from a failure and is not already drowning in
//! work at this precedence or above. Admitted packets are indexed into the
//! scheduled multi-queue and the dispatch loop is poked.
//!
//! Runs entirely on the caller: short lock acquisitions only, never the
//! network.

use crate::packet::{Delivery, Packet, QueueKey};
use crate::policy::EnqueueInstruction;
use crate::queue::Shared;
use bytes::Bytes;
use fanout_types::{ForwardSet, MessageClass, NodeId, NodeType, Origin, Precedence};
use std::collections::HashSet;
use std::sync::atomic::Ordering;
use tracing::{debug, error, trace};

/// Enqueue `payload` according to policy, optionally restricted to a
/// subset of known peers. Returns one delivery handle per admitted
/// destination.
pub(crate) fn enqueue_with<N: NodeId>(
    shared: &Shared<N>,
    class: &MessageClass<N>,
    payload: &Bytes,
    restriction: Option<&HashSet<N>>,
) -> Vec<(N, Delivery)> {
    if shared.stopped.load(Ordering::SeqCst) {
        debug!(class = %class, "not enqueued: queue is shut down");
        return Vec::new();
    }

    let instructions = (shared.enqueue_policy)(class.kind, class.origin.kind());
    if instructions.is_empty() {
        trace!(class = %class, "message class not sent from this node");
        return Vec::new();
    }

    let mut peers = shared.buckets.fold();
    if let Some(allowed) = restriction {
        peers = peers.restricted_to(allowed);
    }
    if let Origin::Forwarded(from) = &class.origin {
        peers = peers.without(from);
    }

    // How many forwarding sets the plan could possibly touch; decides
    // whether an empty result is "nothing to talk to" or a real failure.
    let candidate_sets: usize = instructions
        .iter()
        .map(|instruction| match instruction {
            EnqueueInstruction::All { dest, .. } => peers.of_type(*dest).len(),
            EnqueueInstruction::One { dest_order, .. } => dest_order
                .iter()
                .map(|t| peers.of_type(*t).len())
                .sum(),
        })
        .sum();

    let mut enqueued: Vec<(N, Delivery)> = Vec::new();
    for instruction in &instructions {
        match instruction {
            EnqueueInstruction::All {
                dest,
                max_ahead,
                prec,
            } => {
                // One alternative per forwarding set, never the same peer
                // twice for one instruction.
                let mut picked: HashSet<N> = HashSet::new();
                for fwd_set in peers.of_type(*dest) {
                    if let Some(alt) = pick_alt(shared, fwd_set, *prec, *max_ahead, &picked) {
                        picked.insert(alt.clone());
                        enqueued.push(admit(shared, class, payload, alt, *dest, *prec));
                    }
                }
            }
            EnqueueInstruction::One {
                dest_order,
                max_ahead,
                prec,
            } => {
                let none_picked = HashSet::new();
                'search: for dest in dest_order {
                    for fwd_set in peers.of_type(*dest) {
                        if let Some(alt) =
                            pick_alt(shared, fwd_set, *prec, *max_ahead, &none_picked)
                        {
                            enqueued.push(admit(shared, class, payload, alt, *dest, *prec));
                            break 'search;
                        }
                    }
                }
            }
        }
    }

    // Shutdown may have landed between the check above and the inserts;
    // the dispatch loop purged before we inserted, so clean up ourselves.
    // Either way the packets are gone and the caller sees "not enqueued".
    if shared.stopped.load(Ordering::SeqCst) && !enqueued.is_empty() {
        for prec in Precedence::descending() {
            shared.scheduled.remove_all_in(&QueueKey::Prec(prec));
        }
        debug!(class = %class, "enqueue raced with shutdown; messages dropped");
        return Vec::new();
    }

    if enqueued.is_empty() {
        if candidate_sets == 0 {
            debug!(class = %class, "not enqueued to any peer: no candidates");
        } else {
            error!(
                class = %class,
                candidate_sets,
                "failed to enqueue to any peer"
            );
        }
    } else {
        let dests: Vec<&N> = enqueued.iter().map(|(n, _)| n).collect();
        debug!(class = %class, dests = ?dests, "enqueued");
    }
    enqueued
}

/// Choose one alternative from a forwarding set.
///
/// Candidates are ranked by ascending `ahead` — the count of conversations
/// already in flight or scheduled to them at this precedence or higher —
/// with the set's own preference order breaking ties. A candidate in
/// failure cooldown, already picked by this instruction, or carrying more
/// than `max_ahead` queued work is rejected.
fn pick_alt<N: NodeId>(
    shared: &Shared<N>,
    fwd_set: &ForwardSet<N>,
    prec: Precedence,
    max_ahead: usize,
    exclude: &HashSet<N>,
) -> Option<N> {
    let mut candidates: Vec<(usize, &N)> = fwd_set
        .alternatives()
        .iter()
        .filter(|alt| !exclude.contains(*alt))
        .map(|alt| (count_ahead(shared, alt, prec), alt))
        .collect();
    // Stable sort: equal loads keep the forwarding set's preference order.
    candidates.sort_by_key(|(ahead, _)| *ahead);

    candidates
        .into_iter()
        .find(|(ahead, alt)| *ahead <= max_ahead && !shared.failures.has_recent(alt))
        .map(|(_, alt)| alt.clone())
}

/// Work already committed to `dest` at `prec` or above: dispatched
/// conversations plus packets still waiting in the scheduled queue.
fn count_ahead<N: NodeId>(shared: &Shared<N>, dest: &N, prec: Precedence) -> usize {
    let in_flight = shared.in_flight.at_or_above(dest, prec);
    let scheduled: usize = prec
        .and_above()
        .map(|p| {
            shared
                .scheduled
                .len_of(&QueueKey::DestPrec(dest.clone(), p))
        })
        .sum();
    in_flight + scheduled
}

fn admit<N: NodeId>(
    shared: &Shared<N>,
    class: &MessageClass<N>,
    payload: &Bytes,
    dest: N,
    dest_type: NodeType,
    prec: Precedence,
) -> (N, Delivery) {
    let (packet, delivery) = Packet::new(
        class.kind,
        payload.clone(),
        dest.clone(),
        dest_type,
        prec,
    );
    let keys = packet.keys();
    shared.scheduled.enqueue(packet, keys);
    shared.signal.poke();
    trace!(class = %class, dest = %dest, prec = %prec, "packet scheduled");
    (dest, delivery)
}
