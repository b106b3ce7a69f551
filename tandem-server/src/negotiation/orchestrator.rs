use crate::error::SignalError;
use crate::negotiation::negotiation_session::{NegotiationSession, NegotiationState, pair_key};
use std::collections::HashMap;
use std::time::Duration;
use tandem_core::{ClientId, ErrorKind, SignalMessage};
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Events the room coordinator feeds into the orchestrator.
#[derive(Debug, Clone)]
pub enum NegotiationEvent {
    /// Both clients are in the room and need a peer connection.
    NegotiationStart { a: ClientId, b: ClientId },
    /// The client left; every session it takes part in ends.
    NegotiationAbort { client_id: ClientId },
}

/// A message the room must deliver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outbound {
    pub to: ClientId,
    pub message: SignalMessage,
}

impl Outbound {
    fn new(to: &ClientId, message: SignalMessage) -> Self {
        Self {
            to: to.clone(),
            message,
        }
    }
}

/// Offer/answer state machines for every member pair of one room.
pub struct NegotiationOrchestrator {
    sessions: HashMap<(ClientId, ClientId), NegotiationSession>,
    step_timeout: Duration,
    max_payload_bytes: usize,
}

impl NegotiationOrchestrator {
    pub fn new(step_timeout: Duration, max_payload_bytes: usize) -> Self {
        Self {
            sessions: HashMap::new(),
            step_timeout,
            max_payload_bytes,
        }
    }

    pub fn on_event(&mut self, event: NegotiationEvent, now: Instant) -> Vec<Outbound> {
        match event {
            NegotiationEvent::NegotiationStart { a, b } => self.start(a, b, now),
            NegotiationEvent::NegotiationAbort { client_id } => {
                self.abort(&client_id);
                Vec::new()
            }
        }
    }

    fn start(&mut self, a: ClientId, b: ClientId, now: Instant) -> Vec<Outbound> {
        let key = pair_key(&a, &b);
        if a == b || self.sessions.contains_key(&key) {
            return Vec::new();
        }

        let mut session = NegotiationSession::new(a, b, 0);
        let out = Self::request_offer(&mut session, now + self.step_timeout, false);
        self.sessions.insert(key, session);
        out
    }

    fn abort(&mut self, client_id: &ClientId) {
        self.sessions.retain(|_, session| {
            if !session.involves(client_id) {
                return true;
            }
            session.transition(NegotiationState::Terminated, None);
            false
        });
    }

    /// Routes an offer, answer or ICE candidate from `from`.
    pub fn handle(
        &mut self,
        from: &ClientId,
        message: SignalMessage,
        now: Instant,
    ) -> Result<Vec<Outbound>, SignalError> {
        let payload = message.payload().ok_or_else(|| {
            SignalError::InvalidPayload(format!("{} is not relayed", message.type_name()))
        })?;
        self.check_payload(payload)?;

        let peer = self.resolve_target(from, message.target())?;
        let deadline = now + self.step_timeout;
        let session = self
            .sessions
            .get_mut(&pair_key(from, &peer))
            .ok_or_else(|| SignalError::PeerNotFound(peer.clone()))?;

        match message {
            SignalMessage::IceCandidate { payload, .. } => Ok(vec![Outbound::new(
                &peer,
                SignalMessage::IceCandidate {
                    from: Some(from.clone()),
                    to: Some(peer.clone()),
                    payload,
                },
            )]),
            SignalMessage::Offer { payload, seq, .. } => {
                Self::handle_offer(session, from, &peer, payload, seq, deadline)
            }
            SignalMessage::Answer { payload, seq, .. } => {
                Self::handle_answer(session, from, &peer, payload, seq)
            }
            other => Err(SignalError::InvalidPayload(format!(
                "{} is not relayed",
                other.type_name()
            ))),
        }
    }

    fn handle_offer(
        session: &mut NegotiationSession,
        from: &ClientId,
        peer: &ClientId,
        payload: String,
        seq: Option<u64>,
        deadline: Instant,
    ) -> Result<Vec<Outbound>, SignalError> {
        let seq = seq.unwrap_or(session.epoch);
        if seq < session.epoch {
            debug!(
                "Dropping stale offer from {} (seq {} < epoch {})",
                from, seq, session.epoch
            );
            return Ok(Vec::new());
        }
        check_not_ahead(seq, session.epoch)?;

        let glare = match session.state {
            NegotiationState::OfferSent => from != session.offerer(),
            NegotiationState::AnswerPending | NegotiationState::Renegotiating => {
                session.pending_offer_from.as_ref() != Some(from)
            }
            NegotiationState::Connected => false,
            NegotiationState::Idle | NegotiationState::Terminated => {
                return Err(SignalError::InvalidState {
                    message: "offer",
                    state: session.state.as_str(),
                });
            }
        };

        if glare {
            info!(
                "Glare between {} and {} at epoch {}, rolling back",
                session.offerer(),
                session.answerer(),
                session.epoch
            );
            session.transition(NegotiationState::Idle, None);
            session.epoch += 1;
            session.pending_offer_from = None;
            return Ok(Self::request_offer(session, deadline, true));
        }

        let next = match session.state {
            NegotiationState::Connected | NegotiationState::Renegotiating => {
                NegotiationState::Renegotiating
            }
            _ => NegotiationState::AnswerPending,
        };
        session.pending_offer_from = Some(from.clone());
        session.transition(next, Some(deadline));

        Ok(vec![Outbound::new(
            peer,
            SignalMessage::Offer {
                from: Some(from.clone()),
                to: Some(peer.clone()),
                payload,
                seq: Some(session.epoch),
            },
        )])
    }

    fn handle_answer(
        session: &mut NegotiationSession,
        from: &ClientId,
        peer: &ClientId,
        payload: String,
        seq: Option<u64>,
    ) -> Result<Vec<Outbound>, SignalError> {
        let seq = seq.unwrap_or(session.epoch);
        if seq < session.epoch {
            debug!(
                "Dropping stale answer from {} (seq {} < epoch {})",
                from, seq, session.epoch
            );
            return Ok(Vec::new());
        }

        check_not_ahead(seq, session.epoch)?;

        let expected = matches!(
            session.state,
            NegotiationState::AnswerPending | NegotiationState::Renegotiating
        ) && session.pending_offer_from.as_ref() == Some(peer);

        if !expected {
            return Err(SignalError::InvalidState {
                message: "answer",
                state: session.state.as_str(),
            });
        }

        session.pending_offer_from = None;
        session.transition(NegotiationState::Connected, None);

        Ok(vec![Outbound::new(
            peer,
            SignalMessage::Answer {
                from: Some(from.clone()),
                to: Some(peer.clone()),
                payload,
                seq: Some(session.epoch),
            },
        )])
    }

    /// Terminates sessions whose current step ran past its deadline and
    /// replaces each with a fresh one at the next epoch.
    pub fn expire(&mut self, now: Instant) -> Vec<Outbound> {
        let mut out = Vec::new();
        let deadline = now + self.step_timeout;

        for session in self.sessions.values_mut() {
            if !session.deadline.is_some_and(|d| d <= now) {
                continue;
            }

            warn!(
                "Negotiation between {} and {} timed out in state {}",
                session.offerer(),
                session.answerer(),
                session.state
            );
            session.transition(NegotiationState::Terminated, None);

            for (member, peer) in [
                (session.offerer(), session.answerer()),
                (session.answerer(), session.offerer()),
            ] {
                out.push(Outbound::new(
                    member,
                    SignalMessage::error(
                        ErrorKind::Timeout,
                        format!("negotiation with {peer} timed out"),
                    ),
                ));
            }

            let mut next = NegotiationSession::new(
                session.offerer().clone(),
                session.answerer().clone(),
                session.epoch + 1,
            );
            out.extend(Self::request_offer(&mut next, deadline, true));
            *session = next;
        }

        out
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.sessions.values().filter_map(|s| s.deadline).min()
    }

    pub fn session(&self, a: &ClientId, b: &ClientId) -> Option<&NegotiationSession> {
        self.sessions.get(&pair_key(a, b))
    }

    pub fn sessions(&self) -> impl Iterator<Item = &NegotiationSession> {
        self.sessions.values()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    fn check_payload(&self, payload: &str) -> Result<(), SignalError> {
        if payload.is_empty() {
            return Err(SignalError::InvalidPayload("empty payload".to_string()));
        }
        if payload.len() > self.max_payload_bytes {
            return Err(SignalError::InvalidPayload(format!(
                "payload of {} bytes exceeds limit of {}",
                payload.len(),
                self.max_payload_bytes
            )));
        }
        Ok(())
    }

    /// Explicit target, or the only peer `from` negotiates with.
    fn resolve_target(
        &self,
        from: &ClientId,
        to: Option<&ClientId>,
    ) -> Result<ClientId, SignalError> {
        if let Some(to) = to {
            return Ok(to.clone());
        }

        let mut peers = self
            .sessions
            .values()
            .filter(|s| s.involves(from))
            .map(|s| s.peer_of(from));

        match (peers.next(), peers.next()) {
            (Some(peer), None) => Ok(peer.clone()),
            (None, _) => Err(SignalError::InvalidPayload(
                "no peer to negotiate with".to_string(),
            )),
            (Some(_), Some(_)) => Err(SignalError::InvalidPayload(
                "target required in a group room".to_string(),
            )),
        }
    }

    /// Idle -> OfferSent: asks the smaller id for an offer. With `reset`, the
    /// other member is told to drop any offer of its own.
    fn request_offer(
        session: &mut NegotiationSession,
        deadline: Instant,
        reset: bool,
    ) -> Vec<Outbound> {
        let mut out = vec![Outbound::new(
            session.offerer(),
            SignalMessage::StartOffer {
                peer: session.answerer().clone(),
                seq: session.epoch,
            },
        )];

        if reset {
            out.push(Outbound::new(
                session.answerer(),
                SignalMessage::NegotiationReset {
                    peer: session.offerer().clone(),
                    seq: session.epoch,
                },
            ));
        }

        session.transition(NegotiationState::OfferSent, Some(deadline));
        out
    }
}

fn check_not_ahead(seq: u64, epoch: u64) -> Result<(), SignalError> {
    if seq > epoch {
        return Err(SignalError::InvalidPayload(format!(
            "sequence {seq} is ahead of negotiation epoch {epoch}"
        )));
    }
    Ok(())
}
