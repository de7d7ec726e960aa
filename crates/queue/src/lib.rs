//! Outbound message queue for a Byzantine-tolerant gossip network.
//!
//! The queue sits between application code ("deliver this announcement /
//! transaction / request") and a point-to-point [`Transport`] that runs a
//! single conversation with a single peer. Per message it decides which
//! peers to contact, at what precedence, how much concurrent work one
//! destination may absorb, and how to back off from failing peers.
//!
//! # Architecture
//!
//! ```text
//!  callers                       supervisor task              workers
//! ┌──────────────┐   scheduled  ┌──────────────────┐   spawn ┌─────────────┐
//! │ enqueue()    │──► multi-    │ dispatch loop:   │────────►│ transport   │
//! │ enqueue_to() │    queue ───►│  highest admiss- │         │   .send()   │
//! │   (policy +  │       ▲      │  ible precedence │         │ rate-limit  │
//! │    pick_alt) │       │poke  │  first, bounded  │◄────────│ sleep, poke │
//! └──────────────┘     signal   │  per-dest work   │  poke   └─────────────┘
//!         │              ▲      └──────────────────┘
//!         ▼              │               ▲
//!  buckets / in-flight / failures ───────┘  (shared, lock-ordered state)
//! ```
//!
//! - **Enqueue** runs on the caller: the enqueue policy expands the message
//!   class into instructions, `pick_alt` chooses the least-loaded healthy
//!   alternative per forwarding set, and admitted packets land in the
//!   multi-queue under three keys (by precedence, by destination, by both).
//! - **Dispatch** is a single supervisor task: it pulls the
//!   highest-precedence packet whose destination has in-flight room and
//!   spawns one worker per conversation, so one stuck peer never blocks
//!   service to the rest.
//! - **Workers** resolve the caller's delivery handle, apply the
//!   per-destination-type rate limit, record failures for cooldown, and
//!   poke the supervisor.
//!
//! Flush and shutdown ride the same wakeup signal as packets and are only
//! surfaced once the scheduled queue is empty, giving real traffic
//! priority over lifecycle control.
//!
//! Lock order, where two of these are ever held in sequence:
//! buckets → in-flight → failures → scheduled queue. The supervisor
//! snapshots in-flight totals before touching the multi-queue and never
//! holds two locks at once.

mod buckets;
mod enqueue;
mod error;
mod failures;
mod inflight;
mod multiqueue;
mod packet;
mod policy;
mod queue;
mod scheduler;
mod signal;

pub use buckets::BucketId;
pub use error::DeliveryError;
pub use packet::Delivery;
pub use policy::{
    dequeue_policy_for, enqueue_policy_for, failure_policy_for, DequeueLimits, DequeuePolicy,
    EnqueueInstruction, EnqueuePolicy, FailurePolicy, SelfRole,
};
pub use queue::{OutboundQueue, QueueStats};

pub use fanout_transport::{Transport, TransportError};
