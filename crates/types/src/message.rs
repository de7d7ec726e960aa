//! Message classification.
//!
//! Every enqueue call carries a [`MessageClass`]: the kind of message plus
//! where it came from. Policies key routing decisions on the kind and on
//! whether the message was created locally or is being forwarded; the
//! enqueue interpreter uses the concrete origin peer for suppression (a
//! forwarded message is never sent back to the peer it came from).

use crate::NodeId;
use std::fmt;

/// The closed set of message classes this node sends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    /// Announcement of a newly adopted block header.
    AnnounceBlockHeader,
    /// Request for a range of block headers.
    RequestBlockHeaders,
    /// Request for block bodies.
    RequestBlocks,
    /// Transaction gossip.
    Transaction,
    /// Multi-party computation protocol traffic.
    Mpc,
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MessageKind::AnnounceBlockHeader => "announce-block-header",
            MessageKind::RequestBlockHeaders => "request-block-headers",
            MessageKind::RequestBlocks => "request-blocks",
            MessageKind::Transaction => "transaction",
            MessageKind::Mpc => "mpc",
        };
        f.write_str(name)
    }
}

/// Where a message came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Origin<N> {
    /// Created by this node.
    Local,
    /// Received from the given peer and being forwarded.
    Forwarded(N),
}

impl<N: NodeId> Origin<N> {
    /// The origin shape without the peer identity (what policies see).
    pub fn kind(&self) -> OriginKind {
        match self {
            Origin::Local => OriginKind::Local,
            Origin::Forwarded(_) => OriginKind::Forwarded,
        }
    }

    /// The peer this message was forwarded from, if any.
    pub fn forwarded_from(&self) -> Option<&N> {
        match self {
            Origin::Local => None,
            Origin::Forwarded(n) => Some(n),
        }
    }
}

/// [`Origin`] stripped of the peer identity, so policy tables stay
/// independent of the peer identity type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OriginKind {
    Local,
    Forwarded,
}

/// A message kind together with its origin: the unit of classification
/// handed to the queue on every enqueue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageClass<N> {
    pub kind: MessageKind,
    pub origin: Origin<N>,
}

impl<N: NodeId> MessageClass<N> {
    /// A message created by this node.
    pub fn local(kind: MessageKind) -> Self {
        Self {
            kind,
            origin: Origin::Local,
        }
    }

    /// A message received from `from` and being forwarded on.
    pub fn forwarded(kind: MessageKind, from: N) -> Self {
        Self {
            kind,
            origin: Origin::Forwarded(from),
        }
    }
}

impl<N: NodeId> fmt::Display for MessageClass<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.origin {
            Origin::Local => write!(f, "{}", self.kind),
            Origin::Forwarded(from) => write!(f, "{} (from {})", self.kind, from),
        }
    }
}
