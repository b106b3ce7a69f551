use crate::model::client::ClientId;
use crate::model::room::RoomId;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IceServerConfig {
    pub urls: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credential: Option<String>,
}

impl IceServerConfig {
    pub fn from_url(url: impl Into<String>) -> Self {
        Self {
            urls: vec![url.into()],
            username: None,
            credential: None,
        }
    }
}

/// Error categories reported to clients in `error` frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    CapacityExceeded,
    RoomFull,
    AlreadyInRoom,
    NotFound,
    SlowConsumer,
    InvalidPayload,
    InvalidState,
    Timeout,
    Internal,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::CapacityExceeded => "capacity_exceeded",
            ErrorKind::RoomFull => "room_full",
            ErrorKind::AlreadyInRoom => "already_in_room",
            ErrorKind::NotFound => "not_found",
            ErrorKind::SlowConsumer => "slow_consumer",
            ErrorKind::InvalidPayload => "invalid_payload",
            ErrorKind::InvalidState => "invalid_state",
            ErrorKind::Timeout => "timeout",
            ErrorKind::Internal => "internal",
        }
    }
}

/// One signaling frame, encoded as a JSON object with a `type` field.
///
/// The same type is used in both directions. Relayed variants carry `from`,
/// which the server always overwrites with the sender's registered id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SignalMessage {
    Welcome {
        to: ClientId,
        #[serde(default)]
        ice_servers: Vec<IceServerConfig>,
    },
    /// `payload` names the room; absent means "create a new room".
    Join {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        payload: Option<RoomId>,
    },
    Joined {
        room: RoomId,
        members: Vec<ClientId>,
    },
    PeerJoined {
        from: ClientId,
    },
    /// Asks the receiver to create an offer for `peer`.
    StartOffer {
        peer: ClientId,
        seq: u64,
    },
    /// Glare rollback: discard the local offer for `peer` and wait for theirs.
    NegotiationReset {
        peer: ClientId,
        seq: u64,
    },
    Offer {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        from: Option<ClientId>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        to: Option<ClientId>,
        #[serde(default)]
        payload: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        seq: Option<u64>,
    },
    Answer {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        from: Option<ClientId>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        to: Option<ClientId>,
        #[serde(default)]
        payload: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        seq: Option<u64>,
    },
    IceCandidate {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        from: Option<ClientId>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        to: Option<ClientId>,
        #[serde(default)]
        payload: String,
    },
    Leave {},
    PeerLeft {
        from: ClientId,
    },
    Ping {
        seq: u64,
    },
    Pong {
        seq: u64,
    },
    Error {
        kind: ErrorKind,
        detail: String,
    },
}

impl SignalMessage {
    pub fn error(kind: ErrorKind, detail: impl Into<String>) -> Self {
        SignalMessage::Error {
            kind,
            detail: detail.into(),
        }
    }

    /// Wire name of the variant, for logs.
    pub fn type_name(&self) -> &'static str {
        match self {
            SignalMessage::Welcome { .. } => "welcome",
            SignalMessage::Join { .. } => "join",
            SignalMessage::Joined { .. } => "joined",
            SignalMessage::PeerJoined { .. } => "peer_joined",
            SignalMessage::StartOffer { .. } => "start_offer",
            SignalMessage::NegotiationReset { .. } => "negotiation_reset",
            SignalMessage::Offer { .. } => "offer",
            SignalMessage::Answer { .. } => "answer",
            SignalMessage::IceCandidate { .. } => "ice_candidate",
            SignalMessage::Leave {} => "leave",
            SignalMessage::PeerLeft { .. } => "peer_left",
            SignalMessage::Ping { .. } => "ping",
            SignalMessage::Pong { .. } => "pong",
            SignalMessage::Error { .. } => "error",
        }
    }

    /// Offer, answer and ICE candidate frames are routed to a room peer.
    pub fn is_relay(&self) -> bool {
        matches!(
            self,
            SignalMessage::Offer { .. }
                | SignalMessage::Answer { .. }
                | SignalMessage::IceCandidate { .. }
        )
    }

    pub fn target(&self) -> Option<&ClientId> {
        match self {
            SignalMessage::Offer { to, .. }
            | SignalMessage::Answer { to, .. }
            | SignalMessage::IceCandidate { to, .. } => to.as_ref(),
            _ => None,
        }
    }

    pub fn payload(&self) -> Option<&str> {
        match self {
            SignalMessage::Offer { payload, .. }
            | SignalMessage::Answer { payload, .. }
            | SignalMessage::IceCandidate { payload, .. } => Some(payload),
            _ => None,
        }
    }
}
