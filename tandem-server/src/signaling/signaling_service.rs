use crate::config::Config;
use crate::error::SignalError;
use crate::presence::LivenessMonitor;
use crate::registry::{ClientHandle, SessionRegistry};
use crate::room::{JoinResult, RoomManager, RoomSettings};
use crate::signaling::ClientChannel;
use std::sync::{Arc, OnceLock};
use tandem_core::{ClientId, RoomId, SignalMessage};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

struct SignalingInner {
    registry: Arc<SessionRegistry>,
    rooms: RoomManager,
    config: Config,
    shutdown: CancellationToken,
}

/// Entry point for everything a connected client can do.
#[derive(Clone)]
pub struct SignalingService {
    inner: Arc<SignalingInner>,
}

impl SignalingService {
    /// Builds the service. The returned queue carries evicted clients and must
    /// be drained by a [`LivenessMonitor`].
    pub fn new(
        config: Config,
        shutdown: CancellationToken,
    ) -> (Self, mpsc::UnboundedReceiver<ClientId>) {
        let (registry, evictions) = SessionRegistry::new(config.max_connections);
        let registry = Arc::new(registry);
        let rooms = RoomManager::new(RoomSettings::from(&config), registry.clone());

        let service = Self {
            inner: Arc::new(SignalingInner {
                registry,
                rooms,
                config,
                shutdown,
            }),
        };

        (service, evictions)
    }

    /// Builds the service and spawns its liveness monitor.
    pub fn start(config: Config, shutdown: CancellationToken) -> Self {
        let (service, evictions) = Self::new(config, shutdown.clone());
        LivenessMonitor::new(service.clone(), evictions, shutdown).spawn();
        service
    }

    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    pub fn registry(&self) -> &SessionRegistry {
        &self.inner.registry
    }

    pub fn rooms(&self) -> &RoomManager {
        &self.inner.rooms
    }

    /// Registers a new client and greets it with its id.
    pub fn connect(&self) -> Result<ClientChannel, SignalError> {
        let (outbound, inbound) = mpsc::channel(self.inner.config.outbound_queue_capacity);
        let cancel = self.inner.shutdown.child_token();
        let close_reason = Arc::new(OnceLock::new());

        let id = self.inner.registry.register(ClientHandle {
            outbound,
            cancel: cancel.clone(),
            close_reason: close_reason.clone(),
        })?;

        info!(
            "Client {} connected ({} online)",
            id,
            self.inner.registry.len()
        );

        let welcome = SignalMessage::Welcome {
            to: id.clone(),
            ice_servers: self.inner.config.ice_server_configs(),
        };
        if let Err(e) = self.send(&id, welcome) {
            self.inner.registry.unregister(&id);
            return Err(e);
        }

        Ok(ClientChannel::new(id, inbound, cancel, close_reason))
    }

    /// Enqueues a message for a client. Overflow evicts the client.
    pub fn send(&self, client_id: &ClientId, message: SignalMessage) -> Result<(), SignalError> {
        let result = self.inner.registry.try_deliver(client_id, message);
        if let Err(e) = &result
            && e.is_fatal()
        {
            self.inner.registry.evict(client_id, e.kind());
        }
        result
    }

    /// Decodes and handles one text frame from a client.
    pub async fn handle_frame(&self, client_id: &ClientId, frame: &str) {
        match serde_json::from_str::<SignalMessage>(frame) {
            Ok(message) => self.handle_inbound(client_id, message).await,
            Err(e) => {
                self.inner.registry.touch(client_id);
                warn!("Invalid SignalMessage from {}: {}", client_id, e);
                self.report(
                    client_id,
                    SignalError::InvalidPayload(format!("malformed frame: {e}")),
                );
            }
        }
    }

    /// Handles one message from a client. Failures are reported back to that
    /// client as `error` frames.
    pub async fn handle_inbound(&self, client_id: &ClientId, message: SignalMessage) {
        self.inner.registry.touch(client_id);

        let kind = message.type_name();
        if let Err(e) = self.process(client_id, message).await {
            warn!("{} from {} failed: {}", kind, client_id, e);
            self.report(client_id, e);
        }
    }

    async fn process(
        &self,
        client_id: &ClientId,
        message: SignalMessage,
    ) -> Result<(), SignalError> {
        match message {
            SignalMessage::Join { payload } => {
                let room_id = payload.unwrap_or_else(RoomId::generate);
                self.join_room(client_id, room_id).await.map(|_| ())
            }
            SignalMessage::Leave {} => {
                self.leave_room(client_id).await;
                Ok(())
            }
            SignalMessage::Pong { .. } => Ok(()),
            message if message.is_relay() => {
                let room_id = self
                    .inner
                    .registry
                    .lookup(client_id)?
                    .room
                    .ok_or(SignalError::NotInRoom)?;
                self.inner.rooms.relay(&room_id, client_id, message).await
            }
            other => Err(SignalError::InvalidPayload(format!(
                "{} cannot be sent by clients",
                other.type_name()
            ))),
        }
    }

    pub async fn join_room(
        &self,
        client_id: &ClientId,
        room_id: RoomId,
    ) -> Result<JoinResult, SignalError> {
        if let Some(current) = self.inner.registry.lookup(client_id)?.room {
            return Err(SignalError::AlreadyInRoom(current));
        }

        let result = self.inner.rooms.join(client_id, &room_id).await?;

        // the client may have been dropped while the room admitted it
        if let Err(e) = self.inner.registry.set_room(client_id, room_id.clone()) {
            self.inner.rooms.leave(client_id, &room_id).await;
            return Err(e);
        }

        Ok(result)
    }

    /// Leaves the current room. A client outside any room is left untouched.
    pub async fn leave_room(&self, client_id: &ClientId) {
        if let Some(room_id) = self.inner.registry.take_room(client_id) {
            self.inner.rooms.leave(client_id, &room_id).await;
        }
    }

    /// Unregisters the client and releases its room slot. Idempotent.
    pub async fn disconnect(&self, client_id: &ClientId) {
        let Some(client) = self.inner.registry.unregister(client_id) else {
            return;
        };

        if let Some(room_id) = &client.room {
            self.inner.rooms.leave(client_id, room_id).await;
        }

        let online = client.connected_at.elapsed();
        match client.close_reason {
            Some(reason) => warn!(
                "Client {} dropped ({}) after {:?}, last heard from {:?} ago",
                client_id,
                reason.as_str(),
                online,
                client.last_seen.elapsed()
            ),
            None => info!("Client {} disconnected after {:?}", client_id, online),
        }
    }

    fn report(&self, client_id: &ClientId, error: SignalError) {
        // the send error is either the client being gone or being evicted
        let _ = self.send(client_id, error.to_message());
    }
}
