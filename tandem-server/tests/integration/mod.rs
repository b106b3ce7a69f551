
use std::sync::Arc;
use std::time::Duration;
use tandem_core::{ClientId, SignalMessage};
use tandem_server::room::RoomSettings;
use tandem_server::{Config, RoomManager, SignalingService};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::Level;

use crate::utils::MockSignalingOutput;

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(Level::DEBUG)
        .with_test_writer()
        .try_init();
}

pub fn test_config() -> Config {
    Config {
        bind_address: "127.0.0.1:0".parse().unwrap(),
        ..Config::default()
    }
}

/// Service with its liveness monitor running.
pub fn create_service(config: Config) -> SignalingService {
    SignalingService::start(config, CancellationToken::new())
}

pub fn create_room_manager(
    capacity: usize,
) -> (
    RoomManager,
    MockSignalingOutput,
    mpsc::UnboundedReceiver<(ClientId, SignalMessage)>,
) {
    let (signaling, signal_rx) = MockSignalingOutput::new();
    let settings = RoomSettings {
        capacity,
        join_timeout: Duration::from_secs(5),
        negotiation_timeout: Duration::from_secs(30),
        max_payload_bytes: 64 * 1024,
    };
    let manager = RoomManager::new(settings, Arc::new(signaling.clone()));

    (manager, signaling, signal_rx)
}
