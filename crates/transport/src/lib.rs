//! Transport trait for single-peer conversations.
//!
//! Defines the [`Transport`] interface the outbound queue drives: one call
//! performs one conversation with one peer and resolves when the peer has
//! acknowledged application-level receipt (or the conversation failed).
//! Framing, serialization, connection management, and timeouts all live
//! behind this trait; the queue treats the call as opaque and applies no
//! timeout of its own.
//!
//! Implementations are expected to be cheap to share (`Arc` internally);
//! the queue clones a handle per in-flight conversation.

use async_trait::async_trait;
use bytes::Bytes;
use fanout_types::{MessageKind, NodeId};
use std::sync::Arc;
use thiserror::Error;

/// Error returned when a conversation with a peer fails.
///
/// Surfaced verbatim to whoever awaits the delivery, and fed to the
/// failure policy to pick a cooldown for the destination.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("conversation timed out")]
    Timeout,

    #[error("peer unreachable: {0}")]
    PeerUnreachable(String),

    #[error("peer returned error: {0}")]
    PeerError(String),

    #[error("i/o error: {0}")]
    Io(String),

    #[error("transport shutting down")]
    Shutdown,
}

/// A point-to-point transport capable of one conversation per call.
///
/// `send` must block (await) until the destination has acknowledged the
/// message at the application level, and must not panic on peer
/// misbehavior — every failure mode is an [`TransportError`].
#[async_trait]
pub trait Transport<N: NodeId>: Send + Sync + 'static {
    /// Run one conversation: deliver `payload` to `dest` and return the
    /// peer's acknowledgment payload.
    async fn send(
        &self,
        dest: &N,
        kind: MessageKind,
        payload: Bytes,
    ) -> Result<Bytes, TransportError>;
}

#[async_trait]
impl<N: NodeId, T: Transport<N> + ?Sized> Transport<N> for Arc<T> {
    async fn send(
        &self,
        dest: &N,
        kind: MessageKind,
        payload: Bytes,
    ) -> Result<Bytes, TransportError> {
        (**self).send(dest, kind, payload).await
    }
}
