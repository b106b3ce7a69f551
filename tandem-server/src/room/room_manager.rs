use crate::config::Config;
use crate::error::SignalError;
use crate::room::{JoinResult, Room, RoomCommand, RoomSnapshot};
use crate::signaling::SignalingOutput;
use dashmap::DashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tandem_core::{ClientId, RoomId, SignalMessage};
use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;
use tracing::{debug, info, warn};

const ROOM_CHANNEL_BUFFER: usize = 100;

#[derive(Debug, Clone)]
pub struct RoomSettings {
    pub capacity: usize,
    pub join_timeout: Duration,
    pub negotiation_timeout: Duration,
    pub max_payload_bytes: usize,
}

impl From<&Config> for RoomSettings {
    fn from(config: &Config) -> Self {
        Self {
            capacity: config.room_capacity,
            join_timeout: config.join_timeout(),
            negotiation_timeout: config.negotiation_timeout(),
            max_payload_bytes: config.max_payload_bytes,
        }
    }
}

#[derive(Clone, Debug)]
pub struct RoomHandle {
    pub(crate) sender: mpsc::Sender<RoomCommand>,
    pub(crate) generation: u64,
}

/// Room coordinator: creates room actors on first join and routes commands
/// to them.
#[derive(Clone)]
pub struct RoomManager {
    rooms: Arc<DashMap<RoomId, RoomHandle>>,
    output: Arc<dyn SignalingOutput>,
    settings: RoomSettings,
    next_generation: Arc<AtomicU64>,
}

impl RoomManager {
    pub fn new(settings: RoomSettings, output: Arc<dyn SignalingOutput>) -> Self {
        Self {
            rooms: Arc::new(DashMap::new()),
            output,
            settings,
            next_generation: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Admits `client_id` into `room_id`, creating the room if needed.
    ///
    /// A timed-out join leaves no trace: the room either never sees the
    /// request or rolls the member back once it finds the reply unwanted.
    pub async fn join(
        &self,
        client_id: &ClientId,
        room_id: &RoomId,
    ) -> Result<JoinResult, SignalError> {
        let deadline = Instant::now() + self.settings.join_timeout;

        loop {
            let handle = self.get_or_create(room_id);
            let (tx, mut rx) = oneshot::channel();

            let cmd = RoomCommand::Join {
                client_id: client_id.clone(),
                respond_to: tx,
            };
            match tokio::time::timeout_at(deadline, handle.sender.send(cmd)).await {
                Ok(Ok(())) => {}
                Ok(Err(_)) => {
                    self.forget(room_id, handle.generation);
                    continue;
                }
                Err(_) => return Err(SignalError::Timeout("join")),
            }

            match tokio::time::timeout_at(deadline, &mut rx).await {
                Ok(Ok(result)) => return result,
                // the room emptied and shut down while we were queued
                Ok(Err(_)) => {
                    debug!("Room {} closed during join, retrying", room_id);
                    self.forget(room_id, handle.generation);
                }
                Err(_) => {
                    // a reply that raced the deadline still counts
                    rx.close();
                    return match rx.try_recv() {
                        Ok(result) => result,
                        Err(_) => {
                            warn!("Join of {} to room {} timed out", client_id, room_id);
                            Err(SignalError::Timeout("join"))
                        }
                    };
                }
            }
        }
    }

    /// Removes the client from the room. Returns whether it was a member;
    /// a missing room counts as "not a member".
    pub async fn leave(&self, client_id: &ClientId, room_id: &RoomId) -> bool {
        let Some(handle) = self.handle(room_id) else {
            return false;
        };

        let (tx, rx) = oneshot::channel();
        let cmd = RoomCommand::Leave {
            client_id: client_id.clone(),
            respond_to: tx,
        };
        if handle.sender.send(cmd).await.is_err() {
            return false;
        }

        rx.await.unwrap_or(false)
    }

    /// Queues an offer, answer or ICE candidate for the room's orchestrator.
    pub async fn relay(
        &self,
        room_id: &RoomId,
        from: &ClientId,
        message: SignalMessage,
    ) -> Result<(), SignalError> {
        let handle = self
            .handle(room_id)
            .ok_or_else(|| SignalError::Internal(format!("room {room_id} has no actor")))?;

        handle
            .sender
            .send(RoomCommand::Relay {
                from: from.clone(),
                message,
            })
            .await
            .map_err(|_| SignalError::Internal(format!("room {room_id} actor is gone")))
    }

    pub async fn snapshot(&self, room_id: &RoomId) -> Option<RoomSnapshot> {
        let handle = self.handle(room_id)?;
        let (tx, rx) = oneshot::channel();

        handle
            .sender
            .send(RoomCommand::Inspect { respond_to: tx })
            .await
            .ok()?;
        rx.await.ok()
    }

    pub fn contains(&self, room_id: &RoomId) -> bool {
        self.rooms.contains_key(room_id)
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    fn handle(&self, room_id: &RoomId) -> Option<RoomHandle> {
        self.rooms.get(room_id).map(|h| h.value().clone())
    }

    /// Compare-and-create: concurrent joins for a new id agree on one actor.
    fn get_or_create(&self, room_id: &RoomId) -> RoomHandle {
        self.rooms
            .entry(room_id.clone())
            .or_insert_with(|| {
                info!("Creating new room: {}", room_id);
                let (tx, rx) = mpsc::channel(ROOM_CHANNEL_BUFFER);
                let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);

                let room = Room::new(
                    room_id.clone(),
                    generation,
                    &self.settings,
                    rx,
                    self.output.clone(),
                    self.rooms.clone(),
                );
                tokio::spawn(room.run());

                RoomHandle {
                    sender: tx,
                    generation,
                }
            })
            .value()
            .clone()
    }

    fn forget(&self, room_id: &RoomId, generation: u64) {
        self.rooms
            .remove_if(room_id, |_, handle| handle.generation == generation);
    }
}
