//! Layered peer sets with forwarding-set semantics.
//!
//! A [`ForwardSet`] is an ordered, non-empty list of alternative peers;
//! delivering "to the set" means delivering to exactly one alternative,
//! preferring earlier entries. [`Peers`] holds one list of forwarding sets
//! per [`NodeType`] and merges pointwise, so independently maintained
//! views of the network (static config, discovery, subscriptions) can be
//! folded into one effective routing table.

use crate::{NodeId, NodeType};
use std::collections::HashSet;

/// An ordered, non-empty list of alternative peers.
///
/// Invariant: `alts` is never empty. Operations that could empty a set
/// return `Option` and drop the set instead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForwardSet<N> {
    alts: Vec<N>,
}

impl<N: NodeId> ForwardSet<N> {
    /// Build a forwarding set; `None` if `alts` is empty.
    pub fn new(alts: Vec<N>) -> Option<Self> {
        if alts.is_empty() {
            None
        } else {
            Some(Self { alts })
        }
    }

    /// A forwarding set with a single alternative.
    pub fn single(node: N) -> Self {
        Self { alts: vec![node] }
    }

    /// The alternatives, in preference order.
    pub fn alternatives(&self) -> &[N] {
        &self.alts
    }

    pub fn len(&self) -> usize {
        self.alts.len()
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn contains(&self, node: &N) -> bool {
        self.alts.contains(node)
    }

    /// Copy of this set with `node` removed; `None` if that empties it.
    pub fn without(&self, node: &N) -> Option<Self> {
        let alts: Vec<N> = self.alts.iter().filter(|a| *a != node).cloned().collect();
        Self::new(alts)
    }

    /// Copy of this set keeping only `allowed` peers; `None` if emptied.
    pub fn restricted_to(&self, allowed: &HashSet<N>) -> Option<Self> {
        let alts: Vec<N> = self
            .alts
            .iter()
            .filter(|a| allowed.contains(*a))
            .cloned()
            .collect();
        Self::new(alts)
    }
}

/// Peers known to this node, one list of forwarding sets per node type.
///
/// `Peers` is a monoid under [`Peers::merge`] (pointwise concatenation,
/// identity [`Peers::default`]); bucketed peer knowledge is folded with it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Peers<N> {
    pub core: Vec<ForwardSet<N>>,
    pub relay: Vec<ForwardSet<N>>,
    pub edge: Vec<ForwardSet<N>>,
}

impl<N> Default for Peers<N> {
    fn default() -> Self {
        Self {
            core: Vec::new(),
            relay: Vec::new(),
            edge: Vec::new(),
        }
    }
}

impl<N: NodeId> Peers<N> {
    /// One singleton forwarding set per peer, all under `node_type`.
    ///
    /// This is the common case for flat peer lists with no alternative
    /// structure: every peer is contacted individually.
    pub fn simple(node_type: NodeType, ids: impl IntoIterator<Item = N>) -> Self {
        let sets: Vec<ForwardSet<N>> = ids.into_iter().map(ForwardSet::single).collect();
        let mut peers = Self::default();
        match node_type {
            NodeType::Core => peers.core = sets,
            NodeType::Relay => peers.relay = sets,
            NodeType::Edge => peers.edge = sets,
        }
        peers
    }

    /// Monoid operation: pointwise concatenation of the three layers.
    pub fn merge(mut self, other: Self) -> Self {
        self.core.extend(other.core);
        self.relay.extend(other.relay);
        self.edge.extend(other.edge);
        self
    }

    /// The forwarding sets for one node type.
    pub fn of_type(&self, node_type: NodeType) -> &[ForwardSet<N>] {
        match node_type {
            NodeType::Core => &self.core,
            NodeType::Relay => &self.relay,
            NodeType::Edge => &self.edge,
        }
    }

    /// Copy with `node` dropped from every forwarding set; sets that are
    /// emptied disappear. Used for origin suppression.
    pub fn without(&self, node: &N) -> Self {
        Self {
            core: self.core.iter().filter_map(|s| s.without(node)).collect(),
            relay: self.relay.iter().filter_map(|s| s.without(node)).collect(),
            edge: self.edge.iter().filter_map(|s| s.without(node)).collect(),
        }
    }

    /// Copy keeping only `allowed` peers; emptied sets disappear.
    pub fn restricted_to(&self, allowed: &HashSet<N>) -> Self {
        Self {
            core: self
                .core
                .iter()
                .filter_map(|s| s.restricted_to(allowed))
                .collect(),
            relay: self
                .relay
                .iter()
                .filter_map(|s| s.restricted_to(allowed))
                .collect(),
            edge: self
                .edge
                .iter()
                .filter_map(|s| s.restricted_to(allowed))
                .collect(),
        }
    }

    /// Every peer id appearing in any forwarding set.
    pub fn node_ids(&self) -> HashSet<N> {
        NodeType::ALL
            .iter()
            .flat_map(|t| self.of_type(*t))
            .flat_map(|s| s.alternatives())
            .cloned()
            .collect()
    }

    /// True when no layer has any forwarding set.
    pub fn is_empty(&self) -> bool {
        self.core.is_empty() && self.relay.is_empty() && self.edge.is_empty()
    }

    /// Total number of forwarding sets across all layers.
    pub fn set_count(&self) -> usize {
        self.core.len() + self.relay.len() + self.edge.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fs(alts: &[&'static str]) -> ForwardSet<&'static str> {
        ForwardSet::new(alts.to_vec()).unwrap()
    }

    #[test]
    fn test_forward_set_never_empty() {
        assert!(ForwardSet::<&str>::new(vec![]).is_none());
        assert!(ForwardSet::new(vec!["a"]).is_some());
    }

    #[test]
    fn test_without_drops_emptied_set() {
        let set = fs(&["a"]);
        assert!(set.without(&"a").is_none());

        let set = fs(&["a", "b"]);
        let rest = set.without(&"a").unwrap();
        assert_eq!(rest.alternatives(), &["b"]);
    }

    #[test]
    fn test_merge_identity() {
        let peers = Peers::simple(NodeType::Core, ["a", "b"]);
        assert_eq!(peers.clone().merge(Peers::default()), peers);
        assert_eq!(Peers::default().merge(peers.clone()), peers);
    }

    #[test]
    fn test_merge_associative() {
        let a = Peers::simple(NodeType::Core, ["a"]);
        let b = Peers::simple(NodeType::Relay, ["b"]);
        let c = Peers::simple(NodeType::Core, ["c"]);

        let left = a.clone().merge(b.clone()).merge(c.clone());
        let right = a.merge(b.merge(c));
        assert_eq!(left, right);
    }

    #[test]
    fn test_simple_distributes_over_concat() {
        // simple(a ++ b) == simple(a) <> simple(b)
        let joined = Peers::simple(NodeType::Relay, ["a", "b", "c"]);
        let split = Peers::simple(NodeType::Relay, ["a"])
            .merge(Peers::simple(NodeType::Relay, ["b", "c"]));
        assert_eq!(joined, split);
    }

    #[test]
    fn test_without_suppresses_across_layers() {
        let peers = Peers {
            core: vec![fs(&["a", "b"])],
            relay: vec![fs(&["a"])],
            edge: vec![],
        };
        let suppressed = peers.without(&"a");
        assert_eq!(suppressed.core[0].alternatives(), &["b"]);
        assert!(suppressed.relay.is_empty());
    }

    #[test]
    fn test_restricted_to() {
        let peers = Peers {
            core: vec![fs(&["a", "b"]), fs(&["c"])],
            relay: vec![],
            edge: vec![],
        };
        let allowed: HashSet<_> = ["b"].into_iter().collect();
        let restricted = peers.restricted_to(&allowed);
        assert_eq!(restricted.core.len(), 1);
        assert_eq!(restricted.core[0].alternatives(), &["b"]);
    }

    #[test]
    fn test_node_ids_spans_layers() {
        let peers = Peers::simple(NodeType::Core, ["a"])
            .merge(Peers::simple(NodeType::Relay, ["b"]))
            .merge(Peers::simple(NodeType::Edge, ["c"]));
        let ids = peers.node_ids();
        assert_eq!(ids.len(), 3);
        assert!(ids.contains("a") && ids.contains("b") && ids.contains("c"));
    }

    #[test]
    fn test_set_count() {
        let peers = Peers::simple(NodeType::Core, ["a", "b"])
            .merge(Peers::simple(NodeType::Edge, ["c"]));
        assert_eq!(peers.set_count(), 3);
        assert!(!peers.is_empty());
        assert!(Peers::<&str>::default().is_empty());
    }
}
