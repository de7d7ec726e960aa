//! Errors surfaced through delivery handles.

use fanout_transport::TransportError;
use thiserror::Error;

/// Why an awaited delivery did not produce an acknowledgment.
#[derive(Debug, Error)]
pub enum DeliveryError {
    /// The conversation ran and the transport reported failure.
    #[error("transport: {0}")]
    Transport(#[from] TransportError),

    /// The message was discarded before its conversation completed: its
    /// destination left every bucket, or the queue shut down first.
    #[error("message dropped before delivery")]
    Abandoned,
}

impl DeliveryError {
    /// True when the message never reached the transport at all.
    pub fn is_abandoned(&self) -> bool {
        matches!(self, DeliveryError::Abandoned)
    }
}
