//! Peer classification and identity bounds.

use std::fmt;
use std::hash::Hash;

/// Classification of a peer in the gossip topology.
///
/// The type determines which routing table a peer lands in and which
/// dequeue limits apply to conversations with it. A peer is tagged with
/// its type at the moment it enters a bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum NodeType {
    /// Validator-grade node in the inner gossip mesh.
    Core,
    /// Relay node bridging the core mesh and the edge.
    Relay,
    /// Leaf node: wallet, exchange, or other end-user peer.
    Edge,
}

impl NodeType {
    /// All node types.
    pub const ALL: [NodeType; 3] = [NodeType::Core, NodeType::Relay, NodeType::Edge];
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            NodeType::Core => "core",
            NodeType::Relay => "relay",
            NodeType::Edge => "edge",
        };
        f.write_str(name)
    }
}

/// Bounds required of a peer identity type.
///
/// The queue is generic over peer identity; anything comparable, hashable,
/// and printable works (a base58 key hash, a `(host, port)` newtype, a test
/// string). Blanket-implemented, never implemented by hand.
pub trait NodeId:
    Clone + Eq + Ord + Hash + fmt::Debug + fmt::Display + Send + Sync + 'static
{
}

impl<T> NodeId for T where
    T: Clone + Eq + Ord + Hash + fmt::Debug + fmt::Display + Send + Sync + 'static
{
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_node_id<N: NodeId>() {}

    #[test]
    fn test_common_types_are_node_ids() {
        assert_node_id::<u64>();
        assert_node_id::<String>();
        assert_node_id::<&'static str>();
    }

    #[test]
    fn test_display() {
        assert_eq!(NodeType::Core.to_string(), "core");
        assert_eq!(NodeType::Relay.to_string(), "relay");
        assert_eq!(NodeType::Edge.to_string(), "edge");
    }
}
