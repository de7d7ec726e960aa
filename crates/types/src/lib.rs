//! Core types for the fanout outbound queue.
//!
//! This crate provides the foundational vocabulary shared by the queue and
//! its collaborators:
//!
//! - [`Precedence`]: urgency ordering for scheduled messages (five levels)
//! - [`NodeType`]: peer classification (core / relay / edge)
//! - [`NodeId`]: bound alias for peer identity types
//! - [`MessageKind`], [`Origin`], [`MessageClass`]: message classification
//! - [`Peers`], [`ForwardSet`]: layered peer sets with forwarding-set
//!   semantics ("deliver to exactly one alternative per set")
//!
//! Everything here is plain data: no I/O, no locks, no async. The queue
//! crate builds its scheduling decisions on top of these values.

mod message;
mod node;
mod peers;
mod precedence;

pub use message::{MessageClass, MessageKind, Origin, OriginKind};
pub use node::{NodeId, NodeType};
pub use peers::{ForwardSet, Peers};
pub use precedence::Precedence;
