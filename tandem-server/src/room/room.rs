use crate::error::SignalError;
use crate::negotiation::{NegotiationEvent, NegotiationOrchestrator, Outbound};
use crate::room::room_command::{JoinResult, RoomCommand, RoomSnapshot, SessionSnapshot};
use crate::room::room_manager::{RoomHandle, RoomSettings};
use crate::signaling::SignalingOutput;
use dashmap::DashMap;
use std::sync::Arc;
use tandem_core::{ClientId, RoomId, SignalMessage};
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Room actor.
///
/// Owns the member list and the negotiation sessions of one room; every
/// mutation runs on this task, so rooms never share a lock.
pub struct Room {
    id: RoomId,
    /// Distinguishes this actor from a later room with the same id.
    generation: u64,
    capacity: usize,
    /// Join order.
    members: Vec<ClientId>,
    created_at: Instant,
    negotiation: NegotiationOrchestrator,
    command_rx: mpsc::Receiver<RoomCommand>,
    output: Arc<dyn SignalingOutput>,
    directory: Arc<DashMap<RoomId, RoomHandle>>,
}

impl Room {
    pub fn new(
        id: RoomId,
        generation: u64,
        settings: &RoomSettings,
        command_rx: mpsc::Receiver<RoomCommand>,
        output: Arc<dyn SignalingOutput>,
        directory: Arc<DashMap<RoomId, RoomHandle>>,
    ) -> Self {
        Self {
            id,
            generation,
            capacity: settings.capacity,
            members: Vec::new(),
            created_at: Instant::now(),
            negotiation: NegotiationOrchestrator::new(
                settings.negotiation_timeout,
                settings.max_payload_bytes,
            ),
            command_rx,
            output,
            directory,
        }
    }

    /// Runs until the last member leaves. Must be spawned.
    pub async fn run(mut self) {
        info!("Room {} started", self.id);

        loop {
            let deadline = self.negotiation.next_deadline();

            tokio::select! {
                cmd = self.command_rx.recv() => {
                    match cmd {
                        Some(c) => self.handle_command(c),
                        None => {
                            info!("Command channel closed. Shutting down room {}.", self.id);
                            break;
                        }
                    }

                    if self.members.is_empty() {
                        break;
                    }
                }

                _ = sleep_until(deadline) => {
                    let out = self.negotiation.expire(Instant::now());
                    self.dispatch(out);
                }
            }
        }

        let generation = self.generation;
        self.directory
            .remove_if(&self.id, |_, handle| handle.generation == generation);

        info!("Room {} closed after {:?}", self.id, self.created_at.elapsed());
    }

    fn handle_command(&mut self, cmd: RoomCommand) {
        match cmd {
            RoomCommand::Join {
                client_id,
                respond_to,
            } => {
                if respond_to.is_closed() {
                    debug!("Join of {} to room {} abandoned", client_id, self.id);
                    return;
                }

                let result = self.join(client_id.clone());
                let admitted = result.is_ok();
                if respond_to.send(result).is_err() && admitted {
                    // the joiner timed out while being admitted
                    warn!("Rolling back join of {} to room {}", client_id, self.id);
                    self.leave(&client_id);
                }
            }

            RoomCommand::Leave {
                client_id,
                respond_to,
            } => {
                let was_member = self.leave(&client_id);
                let _ = respond_to.send(was_member);
            }

            RoomCommand::Relay { from, message } => {
                if !self.members.contains(&from) {
                    self.output.deliver(&from, SignalError::NotInRoom.to_message());
                    return;
                }

                let kind = message.type_name();
                match self.negotiation.handle(&from, message, Instant::now()) {
                    Ok(out) => self.dispatch(out),
                    Err(e) => {
                        warn!("Dropping {} from {} in room {}: {}", kind, from, self.id, e);
                        self.output.deliver(&from, e.to_message());
                    }
                }
            }

            RoomCommand::Inspect { respond_to } => {
                let _ = respond_to.send(self.snapshot());
            }
        }
    }

    fn join(&mut self, client_id: ClientId) -> Result<JoinResult, SignalError> {
        if self.members.contains(&client_id) {
            return Err(SignalError::AlreadyInRoom(self.id.clone()));
        }
        if self.members.len() >= self.capacity {
            info!("Room {} is full, rejecting {}", self.id, client_id);
            return Err(SignalError::RoomFull(self.id.clone()));
        }

        self.members.push(client_id.clone());
        info!(
            "Client {} joined room {} ({}/{})",
            client_id,
            self.id,
            self.members.len(),
            self.capacity
        );

        // the joiner learns about the room before any negotiation traffic
        self.output.deliver(
            &client_id,
            SignalMessage::Joined {
                room: self.id.clone(),
                members: self.members.clone(),
            },
        );

        let now = Instant::now();
        let existing: Vec<ClientId> = self
            .members
            .iter()
            .filter(|m| **m != client_id)
            .cloned()
            .collect();

        for member in existing {
            self.output.deliver(
                &member,
                SignalMessage::PeerJoined {
                    from: client_id.clone(),
                },
            );

            let out = self.negotiation.on_event(
                NegotiationEvent::NegotiationStart {
                    a: member,
                    b: client_id.clone(),
                },
                now,
            );
            self.dispatch(out);
        }

        Ok(JoinResult {
            room: self.id.clone(),
            members: self.members.clone(),
        })
    }

    fn leave(&mut self, client_id: &ClientId) -> bool {
        let Some(pos) = self.members.iter().position(|m| m == client_id) else {
            return false;
        };
        self.members.remove(pos);

        self.negotiation.on_event(
            NegotiationEvent::NegotiationAbort {
                client_id: client_id.clone(),
            },
            Instant::now(),
        );

        for member in &self.members {
            self.output.deliver(
                member,
                SignalMessage::PeerLeft {
                    from: client_id.clone(),
                },
            );
        }

        info!(
            "Client {} left room {} ({} remaining)",
            client_id,
            self.id,
            self.members.len()
        );
        true
    }

    fn dispatch(&self, out: Vec<Outbound>) {
        for Outbound { to, message } in out {
            debug!("Room {} -> {}: {}", self.id, to, message.type_name());
            self.output.deliver(&to, message);
        }
    }

    fn snapshot(&self) -> RoomSnapshot {
        RoomSnapshot {
            id: self.id.clone(),
            members: self.members.clone(),
            capacity: self.capacity,
            sessions: self
                .negotiation
                .sessions()
                .map(|s| SessionSnapshot {
                    offerer: s.offerer().clone(),
                    answerer: s.answerer().clone(),
                    state: s.state(),
                    epoch: s.epoch(),
                })
                .collect(),
        }
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
