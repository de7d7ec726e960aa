//! The unit of scheduling and its single-shot result cell.

use crate::error::DeliveryError;
use bytes::Bytes;
use fanout_transport::TransportError;
use fanout_types::{MessageKind, NodeId, NodeType, Precedence};
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::oneshot;

pub(crate) type SendResult = Result<Bytes, TransportError>;

/// Keys a packet is indexed under in the scheduled multi-queue.
///
/// `Prec` drives dispatch (highest first), `Dest` supports reclaiming
/// everything bound for a removed peer, `DestPrec` supports the
/// queued-ahead computation on enqueue.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) enum QueueKey<N> {
    Prec(Precedence),
    Dest(N),
    DestPrec(N, Precedence),
}

/// One scheduled conversation: payload, classification, destination, and
/// the write-once cell the caller's [`Delivery`] handle reads.
pub(crate) struct Packet<N> {
    pub kind: MessageKind,
    pub payload: Bytes,
    pub dest: N,
    pub dest_type: NodeType,
    pub prec: Precedence,
    slot: Mutex<Option<oneshot::Sender<SendResult>>>,
}

impl<N: NodeId> Packet<N> {
    pub fn new(
        kind: MessageKind,
        payload: Bytes,
        dest: N,
        dest_type: NodeType,
        prec: Precedence,
    ) -> (Arc<Self>, Delivery) {
        let (tx, rx) = oneshot::channel();
        let packet = Arc::new(Self {
            kind,
            payload,
            dest,
            dest_type,
            prec,
            slot: Mutex::new(Some(tx)),
        });
        (packet, Delivery { rx })
    }

    /// The three multi-queue keys for this packet.
    pub fn keys(&self) -> Vec<QueueKey<N>> {
        vec![
            QueueKey::Prec(self.prec),
            QueueKey::Dest(self.dest.clone()),
            QueueKey::DestPrec(self.dest.clone(), self.prec),
        ]
    }

    /// Write the conversation result. Single-shot: the first write wins,
    /// later calls are no-ops. A packet dropped unresolved closes the
    /// channel instead, which the handle reports as [`DeliveryError::Abandoned`].
    pub fn resolve(&self, result: SendResult) {
        if let Some(tx) = self.slot.lock().take() {
            let _ = tx.send(result);
        }
    }
}

/// Caller-side handle to one scheduled conversation's outcome.
///
/// Await with [`Delivery::wait`]; dropping the handle is fine for
/// fire-and-forget use. The handle always resolves eventually: the worker
/// writes the transport result, and a packet discarded without a
/// conversation (peer removed, shutdown) resolves as abandoned.
pub struct Delivery {
    rx: oneshot::Receiver<SendResult>,
}

impl Delivery {
    /// Wait for the conversation bound to this handle.
    pub async fn wait(self) -> Result<Bytes, DeliveryError> {
        match self.rx.await {
            Ok(Ok(ack)) => Ok(ack),
            Ok(Err(err)) => Err(DeliveryError::Transport(err)),
            Err(_) => Err(DeliveryError::Abandoned),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_packet() -> (Arc<Packet<&'static str>>, Delivery) {
        Packet::new(
            MessageKind::Transaction,
            Bytes::from_static(b"tx"),
            "peer",
            NodeType::Core,
            Precedence::Low,
        )
    }

    #[test]
    fn test_keys_cover_all_three_indexes() {
        let (packet, _delivery) = test_packet();
        let keys = packet.keys();
        assert_eq!(keys.len(), 3);
        assert!(keys.contains(&QueueKey::Prec(Precedence::Low)));
        assert!(keys.contains(&QueueKey::Dest("peer")));
        assert!(keys.contains(&QueueKey::DestPrec("peer", Precedence::Low)));
    }

    #[tokio::test]
    async fn test_resolve_reaches_handle() {
        let (packet, delivery) = test_packet();
        packet.resolve(Ok(Bytes::from_static(b"ack")));
        let ack = delivery.wait().await.unwrap();
        assert_eq!(ack, Bytes::from_static(b"ack"));
    }

    #[tokio::test]
    async fn test_first_resolve_wins() {
        let (packet, delivery) = test_packet();
        packet.resolve(Ok(Bytes::from_static(b"first")));
        packet.resolve(Err(TransportError::Timeout));
        assert_eq!(delivery.wait().await.unwrap(), Bytes::from_static(b"first"));
    }

    #[tokio::test]
    async fn test_dropped_packet_resolves_as_abandoned() {
        let (packet, delivery) = test_packet();
        drop(packet);
        let err = delivery.wait().await.unwrap_err();
        assert!(err.is_abandoned());
    }

    #[tokio::test]
    async fn test_transport_error_surfaces() {
        let (packet, delivery) = test_packet();
        packet.resolve(Err(TransportError::PeerError("refused".into())));
        match delivery.wait().await.unwrap_err() {
            DeliveryError::Transport(TransportError::PeerError(msg)) => {
                assert_eq!(msg, "refused")
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
