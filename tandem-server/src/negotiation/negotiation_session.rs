use std::fmt;
use tandem_core::ClientId;
use tokio::time::Instant;

/// Offer/answer progress of one peer pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NegotiationState {
    /// No offer requested yet, or rolled back after glare.
    Idle,
    /// The offerer was asked for an offer.
    OfferSent,
    /// The offer was relayed; waiting for the answer.
    AnswerPending,
    Connected,
    /// A mid-call offer was relayed; waiting for the answer.
    Renegotiating,
    Terminated,
}

impl NegotiationState {
    pub fn as_str(&self) -> &'static str {
        match self {
            NegotiationState::Idle => "idle",
            NegotiationState::OfferSent => "offer_sent",
            NegotiationState::AnswerPending => "answer_pending",
            NegotiationState::Connected => "connected",
            NegotiationState::Renegotiating => "renegotiating",
            NegotiationState::Terminated => "terminated",
        }
    }

    /// States in which the session waits on a client and a deadline applies.
    pub fn is_waiting(&self) -> bool {
        matches!(
            self,
            NegotiationState::OfferSent
                | NegotiationState::AnswerPending
                | NegotiationState::Renegotiating
        )
    }
}

impl fmt::Display for NegotiationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Negotiation between two room members.
///
/// The members are stored ordered; `offerer` is always the smaller id.
#[derive(Debug, Clone)]
pub struct NegotiationSession {
    offerer: ClientId,
    answerer: ClientId,
    pub(crate) state: NegotiationState,
    pub(crate) epoch: u64,
    /// Sender of the offer currently awaiting an answer.
    pub(crate) pending_offer_from: Option<ClientId>,
    pub(crate) deadline: Option<Instant>,
}

impl NegotiationSession {
    pub fn new(a: ClientId, b: ClientId, epoch: u64) -> Self {
        let (offerer, answerer) = if a <= b { (a, b) } else { (b, a) };

        Self {
            offerer,
            answerer,
            state: NegotiationState::Idle,
            epoch,
            pending_offer_from: None,
            deadline: None,
        }
    }

    pub fn offerer(&self) -> &ClientId {
        &self.offerer
    }

    pub fn answerer(&self) -> &ClientId {
        &self.answerer
    }

    pub fn state(&self) -> NegotiationState {
        self.state
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn involves(&self, client_id: &ClientId) -> bool {
        &self.offerer == client_id || &self.answerer == client_id
    }

    /// The member that is not `client_id`.
    pub fn peer_of(&self, client_id: &ClientId) -> &ClientId {
        if &self.offerer == client_id {
            &self.answerer
        } else {
            &self.offerer
        }
    }

    pub(crate) fn transition(&mut self, next: NegotiationState, deadline: Option<Instant>) {
        tracing::debug!(
            offerer = %self.offerer,
            answerer = %self.answerer,
            epoch = self.epoch,
            "negotiation {} -> {}",
            self.state,
            next
        );
        self.state = next;
        self.deadline = deadline.filter(|_| next.is_waiting());
    }
}

/// Order-independent key for a member pair.
pub(crate) fn pair_key(a: &ClientId, b: &ClientId) -> (ClientId, ClientId) {
    if a <= b {
        (a.clone(), b.clone())
    } else {
        (b.clone(), a.clone())
    }
}
