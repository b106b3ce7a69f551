use crate::error::SignalError;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tandem_core::{ClientId, ErrorKind, RoomId, SignalMessage};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Server-side half of a client's signaling channel.
pub struct ClientHandle {
    pub outbound: mpsc::Sender<SignalMessage>,
    pub cancel: CancellationToken,
    pub close_reason: Arc<OnceLock<ErrorKind>>,
}

struct Client {
    handle: ClientHandle,
    room: Option<RoomId>,
    last_seen: Instant,
    connected_at: Instant,
}

/// Point-in-time view of a registered client.
#[derive(Debug, Clone)]
pub struct ClientInfo {
    pub id: ClientId,
    pub room: Option<RoomId>,
    pub last_seen: Instant,
    pub connected_at: Instant,
    pub close_reason: Option<ErrorKind>,
}

/// Connected clients and their room membership.
///
/// Each entry is only mutated under its own map shard lock, and no lock is
/// held across an await point.
pub struct SessionRegistry {
    clients: DashMap<ClientId, Client>,
    next_id: AtomicU64,
    connected: AtomicUsize,
    max_connections: usize,
    evictions: mpsc::UnboundedSender<ClientId>,
}

impl SessionRegistry {
    /// Returns the registry and the queue of clients awaiting cleanup.
    pub fn new(max_connections: usize) -> (Self, mpsc::UnboundedReceiver<ClientId>) {
        let (evictions, eviction_rx) = mpsc::unbounded_channel();

        let registry = Self {
            clients: DashMap::new(),
            next_id: AtomicU64::new(1),
            connected: AtomicUsize::new(0),
            max_connections,
            evictions,
        };

        (registry, eviction_rx)
    }

    pub fn register(&self, handle: ClientHandle) -> Result<ClientId, SignalError> {
        self.connected
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
                (n < self.max_connections).then_some(n + 1)
            })
            .map_err(|_| SignalError::CapacityExceeded(self.max_connections))?;

        let id = ClientId::from_sequence(self.next_id.fetch_add(1, Ordering::Relaxed));
        let now = Instant::now();

        self.clients.insert(
            id.clone(),
            Client {
                handle,
                room: None,
                last_seen: now,
                connected_at: now,
            },
        );

        debug!("Registered client {}", id);
        Ok(id)
    }

    /// Removes the client. Calling it again for the same id returns `None`.
    pub fn unregister(&self, client_id: &ClientId) -> Option<ClientInfo> {
        let (id, client) = self.clients.remove(client_id)?;
        self.connected.fetch_sub(1, Ordering::AcqRel);
        client.handle.cancel.cancel();

        Some(ClientInfo {
            id,
            room: client.room,
            last_seen: client.last_seen,
            connected_at: client.connected_at,
            close_reason: client.handle.close_reason.get().copied(),
        })
    }

    pub fn lookup(&self, client_id: &ClientId) -> Result<ClientInfo, SignalError> {
        self.clients
            .get(client_id)
            .map(|client| ClientInfo {
                id: client_id.clone(),
                room: client.room.clone(),
                last_seen: client.last_seen,
                connected_at: client.connected_at,
                close_reason: client.handle.close_reason.get().copied(),
            })
            .ok_or_else(|| SignalError::ClientNotFound(client_id.clone()))
    }

    pub fn contains(&self, client_id: &ClientId) -> bool {
        self.clients.contains_key(client_id)
    }

    /// Enqueues a message without waiting. A full queue means the client is
    /// not keeping up.
    pub fn try_deliver(
        &self,
        client_id: &ClientId,
        message: SignalMessage,
    ) -> Result<(), SignalError> {
        let client = self
            .clients
            .get(client_id)
            .ok_or_else(|| SignalError::ClientNotFound(client_id.clone()))?;

        match client.handle.outbound.try_send(message) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => Err(SignalError::SlowConsumer(client_id.clone())),
            Err(TrySendError::Closed(_)) => Err(SignalError::ClientNotFound(client_id.clone())),
        }
    }

    /// Records why the client is going away, closes its channel and queues it
    /// for cleanup.
    pub fn evict(&self, client_id: &ClientId, reason: ErrorKind) {
        let Some(client) = self.clients.get(client_id) else {
            return;
        };

        let _ = client.handle.close_reason.set(reason);
        client.handle.cancel.cancel();
        drop(client);

        warn!("Evicting client {} ({})", client_id, reason.as_str());
        let _ = self.evictions.send(client_id.clone());
    }

    pub fn touch(&self, client_id: &ClientId) {
        if let Some(mut client) = self.clients.get_mut(client_id) {
            client.last_seen = Instant::now();
        }
    }

    pub fn set_room(&self, client_id: &ClientId, room_id: RoomId) -> Result<(), SignalError> {
        let mut client = self
            .clients
            .get_mut(client_id)
            .ok_or_else(|| SignalError::ClientNotFound(client_id.clone()))?;

        if let Some(current) = &client.room {
            return Err(SignalError::AlreadyInRoom(current.clone()));
        }

        client.room = Some(room_id);
        Ok(())
    }

    pub fn take_room(&self, client_id: &ClientId) -> Option<RoomId> {
        self.clients
            .get_mut(client_id)
            .and_then(|mut client| client.room.take())
    }

    /// Clients silent for longer than `timeout`.
    pub fn stale(&self, timeout: Duration) -> Vec<ClientId> {
        let now = Instant::now();
        self.clients
            .iter()
            .filter(|entry| now.saturating_duration_since(entry.last_seen) > timeout)
            .map(|entry| entry.key().clone())
            .collect()
    }

    pub fn ids(&self) -> Vec<ClientId> {
        self.clients.iter().map(|entry| entry.key().clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.connected.load(Ordering::Acquire)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
