use std::sync::{Arc, OnceLock};
use tandem_core::{ClientId, ErrorKind, SignalMessage};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Client-side half of a signaling channel: the messages the server has
/// queued for one client.
pub struct ClientChannel {
    id: ClientId,
    inbound: mpsc::Receiver<SignalMessage>,
    cancel: CancellationToken,
    close_reason: Arc<OnceLock<ErrorKind>>,
}

impl ClientChannel {
    pub(crate) fn new(
        id: ClientId,
        inbound: mpsc::Receiver<SignalMessage>,
        cancel: CancellationToken,
        close_reason: Arc<OnceLock<ErrorKind>>,
    ) -> Self {
        Self {
            id,
            inbound,
            cancel,
            close_reason,
        }
    }

    pub fn id(&self) -> &ClientId {
        &self.id
    }

    /// Next message for this client. Returns `None` as soon as the client is
    /// disconnected, even if messages are still queued.
    pub async fn receive(&mut self) -> Option<SignalMessage> {
        tokio::select! {
            biased;
            () = self.cancel.cancelled() => None,
            msg = self.inbound.recv() => msg,
        }
    }

    /// Non-blocking variant of [`receive`](Self::receive).
    pub fn try_receive(&mut self) -> Option<SignalMessage> {
        if self.cancel.is_cancelled() {
            return None;
        }
        self.inbound.try_recv().ok()
    }

    pub fn is_closed(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Why the server dropped this client, if it did.
    pub fn close_reason(&self) -> Option<ErrorKind> {
        self.close_reason.get().copied()
    }

    pub fn cancellation(&self) -> CancellationToken {
        self.cancel.clone()
    }
}
