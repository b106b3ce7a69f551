use crate::SignalingService;
use tandem_core::{ClientId, ErrorKind, SignalMessage};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Background task that pings clients, drops the silent ones and finishes
/// the cleanup of evicted ones.
pub struct LivenessMonitor {
    service: SignalingService,
    evictions: mpsc::UnboundedReceiver<ClientId>,
    shutdown: CancellationToken,
    ping_seq: u64,
}

impl LivenessMonitor {
    pub fn new(
        service: SignalingService,
        evictions: mpsc::UnboundedReceiver<ClientId>,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            service,
            evictions,
            shutdown,
            ping_seq: 0,
        }
    }

    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    async fn run(mut self) {
        let config = self.service.config();
        let mut ticker = tokio::time::interval(config.ping_interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!(
            "Liveness monitor started (ping every {:?}, timeout {:?})",
            config.ping_interval(),
            config.liveness_timeout()
        );

        loop {
            tokio::select! {
                () = self.shutdown.cancelled() => {
                    info!("Liveness monitor shutting down");
                    break;
                }
                Some(client_id) = self.evictions.recv() => {
                    self.service.disconnect(&client_id).await;
                }
                _ = ticker.tick() => {
                    self.sweep().await;
                }
            }
        }
    }

    /// Disconnects clients past the liveness timeout and pings the rest.
    pub async fn sweep(&mut self) {
        let registry = self.service.registry();

        for client_id in registry.stale(self.service.config().liveness_timeout()) {
            info!("Client {} missed its liveness deadline", client_id);
            registry.evict(&client_id, ErrorKind::Timeout);
            self.service.disconnect(&client_id).await;
        }

        self.ping_seq += 1;
        let ids = registry.ids();
        debug!("Pinging {} clients (seq {})", ids.len(), self.ping_seq);

        for client_id in ids {
            // overflow evicts through `send`
            let _ = self
                .service
                .send(&client_id, SignalMessage::Ping { seq: self.ping_seq });
        }
    }
}
