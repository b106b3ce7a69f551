use crate::error::SignalError;
use crate::negotiation::NegotiationState;
use tandem_core::{ClientId, RoomId, SignalMessage};
use tokio::sync::oneshot;

/// Commands delivered to a room actor by the coordinator.
#[derive(Debug)]
pub enum RoomCommand {
    /// Admit a client; answered with the member list in join order.
    Join {
        client_id: ClientId,
        respond_to: oneshot::Sender<Result<JoinResult, SignalError>>,
    },

    /// Remove a client; answered with whether it was a member.
    Leave {
        client_id: ClientId,
        respond_to: oneshot::Sender<bool>,
    },

    /// Offer, answer or ICE candidate from a member.
    Relay {
        from: ClientId,
        message: SignalMessage,
    },

    Inspect {
        respond_to: oneshot::Sender<RoomSnapshot>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinResult {
    pub room: RoomId,
    pub members: Vec<ClientId>,
}

#[derive(Debug, Clone)]
pub struct RoomSnapshot {
    pub id: RoomId,
    pub members: Vec<ClientId>,
    pub capacity: usize,
    pub sessions: Vec<SessionSnapshot>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub offerer: ClientId,
    pub answerer: ClientId,
    pub state: NegotiationState,
    pub epoch: u64,
}
