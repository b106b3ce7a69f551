use crate::error::SignalError;
use crate::registry::SessionRegistry;
use tandem_core::{ClientId, ErrorKind, SignalMessage};
use tracing::debug;

/// Sink the rooms use to reach clients.
///
/// Delivery never waits: a client that cannot take the message is dealt
/// with by the implementation, not by the caller.
pub trait SignalingOutput: Send + Sync {
    fn deliver(&self, client_id: &ClientId, message: SignalMessage);
}

impl SignalingOutput for SessionRegistry {
    fn deliver(&self, client_id: &ClientId, message: SignalMessage) {
        let kind = message.type_name();

        match self.try_deliver(client_id, message) {
            Ok(()) => {}
            Err(SignalError::SlowConsumer(_)) => self.evict(client_id, ErrorKind::SlowConsumer),
            Err(e) => debug!("Dropping {} for {}: {}", kind, client_id, e),
        }
    }
}
