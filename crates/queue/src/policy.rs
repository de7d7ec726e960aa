//! Routing policies: what to enqueue where, how fast to drain, how long to
//! shun a failing peer.
//!
//! Policies are values chosen at construction time, one per dimension:
//!
//! - **Enqueue**: message class → instructions (which node types, how much
//!   queued-ahead work a candidate may already carry, at what precedence).
//! - **Dequeue**: destination type → rate limit + in-flight cap.
//! - **Failure**: destination type + message class + error → cooldown.
//!
//! Defaults are provided per [`SelfRole`]. An empty instruction list means
//! "a node in this role does not send this message class" — callers get an
//! empty target list, not an error.

use fanout_transport::TransportError;
use fanout_types::{MessageKind, NodeType, OriginKind, Precedence};
use std::sync::Arc;
use std::time::Duration;

/// How long a destination is excluded from peer selection after a failed
/// conversation, unless the failure policy says otherwise.
pub const DEFAULT_FAILURE_COOLDOWN: Duration = Duration::from_secs(200);

/// One step of an enqueue plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnqueueInstruction {
    /// Deliver to one alternative of *every* forwarding set of `dest`.
    All {
        dest: NodeType,
        max_ahead: usize,
        prec: Precedence,
    },
    /// Deliver to one alternative of *one* forwarding set, trying node
    /// types in the given preference order.
    One {
        dest_order: Vec<NodeType>,
        max_ahead: usize,
        prec: Precedence,
    },
}

/// Drain limits for one destination type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DequeueLimits {
    /// Maximum conversations started per second to one destination of
    /// this type, enforced by holding the in-flight slot for the
    /// remainder of the interval. `None` means unthrottled.
    pub rate: Option<u32>,
    /// Maximum concurrent unacknowledged conversations per destination.
    pub max_in_flight: usize,
}

pub type EnqueuePolicy =
    Arc<dyn Fn(MessageKind, OriginKind) -> Vec<EnqueueInstruction> + Send + Sync>;
pub type DequeuePolicy = Arc<dyn Fn(NodeType) -> DequeueLimits + Send + Sync>;
pub type FailurePolicy =
    Arc<dyn Fn(NodeType, MessageKind, &TransportError) -> Duration + Send + Sync>;

/// The role this node plays in the topology; selects the default policy
/// tables. Edge roles differ in how aggressively they push transactions
/// at their relays.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelfRole {
    Core,
    Relay,
    /// Edge node behind NAT: one relay conversation at a time, gently.
    EdgeBehindNat,
    /// Exchange-operated edge: sustained transaction volume.
    EdgeExchange,
    /// Ordinary peer-to-peer edge node.
    EdgeP2p,
}

/// Default enqueue policy for `role`.
pub fn enqueue_policy_for(role: SelfRole) -> EnqueuePolicy {
    Arc::new(move |kind, origin| match role {
        SelfRole::Core => enqueue_core(kind, origin),
        SelfRole::Relay => enqueue_relay(kind, origin),
        SelfRole::EdgeBehindNat | SelfRole::EdgeExchange | SelfRole::EdgeP2p => {
            enqueue_edge(role, kind, origin)
        }
    })
}

/// Default dequeue policy for `role`.
pub fn dequeue_policy_for(role: SelfRole) -> DequeuePolicy {
    Arc::new(move |dest| match role {
        SelfRole::Core => match dest {
            NodeType::Core => DequeueLimits {
                rate: None,
                max_in_flight: 3,
            },
            NodeType::Relay => DequeueLimits {
                rate: None,
                max_in_flight: 2,
            },
            NodeType::Edge => DequeueLimits {
                rate: None,
                max_in_flight: 1,
            },
        },
        SelfRole::Relay => match dest {
            NodeType::Core => DequeueLimits {
                rate: None,
                max_in_flight: 2,
            },
            NodeType::Relay => DequeueLimits {
                rate: None,
                max_in_flight: 2,
            },
            // Edges are slow consumers; pace them instead of queueing
            // conversations behind a stalled link.
            NodeType::Edge => DequeueLimits {
                rate: Some(5),
                max_in_flight: 1,
            },
        },
        SelfRole::EdgeBehindNat => DequeueLimits {
            rate: Some(1),
            max_in_flight: 1,
        },
        SelfRole::EdgeExchange => DequeueLimits {
            rate: Some(10),
            max_in_flight: 2,
        },
        SelfRole::EdgeP2p => DequeueLimits {
            rate: Some(2),
            max_in_flight: 1,
        },
    })
}

/// Default failure policy: flat cooldown regardless of role, destination,
/// or error. The signature leaves room for callers to shun timeouts longer
/// than explicit rejections, etc.
pub fn failure_policy_for(_role: SelfRole) -> FailurePolicy {
    Arc::new(|_dest, _kind, _err| DEFAULT_FAILURE_COOLDOWN)
}

fn all(dest: NodeType, max_ahead: usize, prec: Precedence) -> EnqueueInstruction {
    EnqueueInstruction::All {
        dest,
        max_ahead,
        prec,
    }
}

fn one(dest_order: &[NodeType], max_ahead: usize, prec: Precedence) -> EnqueueInstruction {
    EnqueueInstruction::One {
        dest_order: dest_order.to_vec(),
        max_ahead,
        prec,
    }
}

fn enqueue_core(kind: MessageKind, _origin: OriginKind) -> Vec<EnqueueInstruction> {
    use MessageKind::*;
    use NodeType::*;
    use Precedence::*;
    match kind {
        // Block announcements go everywhere, ahead of everything.
        AnnounceBlockHeader => vec![all(Core, 0, Highest), all(Relay, 0, High)],
        RequestBlockHeaders => vec![all(Core, 1, High), all(Relay, 1, High)],
        // Block bodies come from whoever answers first; one conversation.
        RequestBlocks => vec![one(&[Core, Relay], 3, Highest)],
        // Bulk traffic: tolerate deep per-peer queues, stay out of the way.
        Transaction => vec![all(Core, 20, Low)],
        Mpc => vec![all(Core, 1, Medium), all(Relay, 1, Medium)],
    }
}

fn enqueue_relay(kind: MessageKind, origin: OriginKind) -> Vec<EnqueueInstruction> {
    use MessageKind::*;
    use NodeType::*;
    use Precedence::*;
    match (kind, origin) {
        (AnnounceBlockHeader, _) => vec![
            all(Core, 0, Highest),
            all(Relay, 0, High),
            all(Edge, 0, Medium),
        ],
        (RequestBlockHeaders, _) => vec![all(Core, 1, High), all(Relay, 1, High)],
        (RequestBlocks, _) => vec![one(&[Core, Relay], 3, Highest)],
        // Relays do not create transactions; they pass them along.
        (Transaction, OriginKind::Local) => vec![],
        (Transaction, OriginKind::Forwarded) => {
            vec![all(Core, 20, Low), all(Relay, 20, Lowest)]
        }
        (Mpc, _) => vec![all(Core, 1, Medium)],
    }
}

fn enqueue_edge(role: SelfRole, kind: MessageKind, origin: OriginKind) -> Vec<EnqueueInstruction> {
    use MessageKind::*;
    use NodeType::*;
    use Precedence::*;
    // Edges only ever talk upward, and never forward gossip.
    if origin == OriginKind::Forwarded {
        return vec![];
    }
    match kind {
        Transaction => match role {
            SelfRole::EdgeBehindNat => vec![one(&[Relay], 0, Highest)],
            SelfRole::EdgeExchange => vec![all(Relay, 3, Medium)],
            _ => vec![all(Relay, 0, Highest)],
        },
        RequestBlockHeaders => vec![one(&[Relay], 1, High)],
        RequestBlocks => vec![one(&[Relay], 3, Highest)],
        AnnounceBlockHeader | Mpc => vec![],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_core_announce_fans_out_to_core_and_relay() {
        let policy = enqueue_policy_for(SelfRole::Core);
        let plan = policy(MessageKind::AnnounceBlockHeader, OriginKind::Local);
        assert_eq!(
            plan,
            vec![
                EnqueueInstruction::All {
                    dest: NodeType::Core,
                    max_ahead: 0,
                    prec: Precedence::Highest,
                },
                EnqueueInstruction::All {
                    dest: NodeType::Relay,
                    max_ahead: 0,
                    prec: Precedence::High,
                },
            ]
        );
    }

    #[test]
    fn test_relay_does_not_originate_transactions() {
        let policy = enqueue_policy_for(SelfRole::Relay);
        assert!(policy(MessageKind::Transaction, OriginKind::Local).is_empty());
        assert!(!policy(MessageKind::Transaction, OriginKind::Forwarded).is_empty());
    }

    #[test]
    fn test_edges_never_forward() {
        for role in [
            SelfRole::EdgeBehindNat,
            SelfRole::EdgeExchange,
            SelfRole::EdgeP2p,
        ] {
            let policy = enqueue_policy_for(role);
            for kind in [
                MessageKind::AnnounceBlockHeader,
                MessageKind::RequestBlockHeaders,
                MessageKind::RequestBlocks,
                MessageKind::Transaction,
                MessageKind::Mpc,
            ] {
                assert!(
                    policy(kind, OriginKind::Forwarded).is_empty(),
                    "{role:?} should not forward {kind}"
                );
            }
        }
    }

    #[test]
    fn test_edge_transactions_target_relays_only() {
        let policy = enqueue_policy_for(SelfRole::EdgeP2p);
        let plan = policy(MessageKind::Transaction, OriginKind::Local);
        for instruction in plan {
            match instruction {
                EnqueueInstruction::All { dest, .. } => assert_eq!(dest, NodeType::Relay),
                EnqueueInstruction::One { dest_order, .. } => {
                    assert_eq!(dest_order, vec![NodeType::Relay])
                }
            }
        }
    }

    #[test]
    fn test_dequeue_policy_is_total() {
        for role in [
            SelfRole::Core,
            SelfRole::Relay,
            SelfRole::EdgeBehindNat,
            SelfRole::EdgeExchange,
            SelfRole::EdgeP2p,
        ] {
            let policy = dequeue_policy_for(role);
            for dest in NodeType::ALL {
                let limits = policy(dest);
                assert!(limits.max_in_flight >= 1, "{role:?}/{dest} has no capacity");
            }
        }
    }

    #[test]
    fn test_relay_paces_edges() {
        let policy = dequeue_policy_for(SelfRole::Relay);
        assert!(policy(NodeType::Edge).rate.is_some());
        assert!(policy(NodeType::Core).rate.is_none());
    }

    #[test]
    fn test_default_failure_cooldown() {
        let policy = failure_policy_for(SelfRole::Core);
        let cooldown = policy(
            NodeType::Relay,
            MessageKind::Transaction,
            &TransportError::Timeout,
        );
        assert_eq!(cooldown, DEFAULT_FAILURE_COOLDOWN);
    }
}
