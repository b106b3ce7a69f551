//! Server error type.
//!
//! Every variant maps onto a wire [`ErrorKind`] so the failure can be reported
//! to the originating client as an `error` frame. Internal details are logged
//! server-side and never sent to clients.

use tandem_core::{ClientId, ErrorKind, RoomId, SignalMessage};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SignalError {
    /// Server-wide connection limit reached.
    #[error("connection limit of {0} reached")]
    CapacityExceeded(usize),

    #[error("room {0} is full")]
    RoomFull(RoomId),

    #[error("client is already in room {0}")]
    AlreadyInRoom(RoomId),

    #[error("client {0} not found")]
    ClientNotFound(ClientId),

    #[error("not in a room")]
    NotInRoom,

    #[error("no negotiation with {0}")]
    PeerNotFound(ClientId),

    /// Outbound queue overflowed; the client gets disconnected.
    #[error("outbound queue of {0} is full")]
    SlowConsumer(ClientId),

    #[error("invalid payload: {0}")]
    InvalidPayload(String),

    #[error("unexpected {message} in state {state}")]
    InvalidState {
        message: &'static str,
        state: &'static str,
    },

    #[error("timed out: {0}")]
    Timeout(&'static str),

    #[error("internal error: {0}")]
    Internal(String),
}

impl SignalError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SignalError::CapacityExceeded(_) => ErrorKind::CapacityExceeded,
            SignalError::RoomFull(_) => ErrorKind::RoomFull,
            SignalError::AlreadyInRoom(_) => ErrorKind::AlreadyInRoom,
            SignalError::ClientNotFound(_)
            | SignalError::NotInRoom
            | SignalError::PeerNotFound(_) => ErrorKind::NotFound,
            SignalError::SlowConsumer(_) => ErrorKind::SlowConsumer,
            SignalError::InvalidPayload(_) => ErrorKind::InvalidPayload,
            SignalError::InvalidState { .. } => ErrorKind::InvalidState,
            SignalError::Timeout(_) => ErrorKind::Timeout,
            SignalError::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Client-safe description.
    pub fn client_detail(&self) -> String {
        match self {
            SignalError::Internal(_) => "an internal error occurred".to_string(),
            other => other.to_string(),
        }
    }

    pub fn to_message(&self) -> SignalMessage {
        SignalMessage::error(self.kind(), self.client_detail())
    }

    /// Channel-level failures end the client's session.
    pub fn is_fatal(&self) -> bool {
        matches!(self, SignalError::SlowConsumer(_) | SignalError::CapacityExceeded(_))
    }
}
