//! Startup configuration.
//!
//! Every option is a command-line flag with a `TANDEM_*` environment fallback.

use clap::Parser;
use std::net::SocketAddr;
use std::time::Duration;
use tandem_core::IceServerConfig;
use thiserror::Error;

pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:3000";
pub const DEFAULT_MAX_CONNECTIONS: usize = 1024;
pub const DEFAULT_ROOM_CAPACITY: usize = 2;
pub const DEFAULT_PING_INTERVAL_MS: u64 = 5_000;
pub const DEFAULT_LIVENESS_TIMEOUT_MS: u64 = 15_000;
pub const DEFAULT_JOIN_TIMEOUT_MS: u64 = 5_000;
pub const DEFAULT_NEGOTIATION_TIMEOUT_MS: u64 = 30_000;
pub const DEFAULT_OUTBOUND_QUEUE_CAPACITY: usize = 64;
pub const DEFAULT_MAX_PAYLOAD_BYTES: usize = 64 * 1024;
pub const DEFAULT_ICE_SERVER: &str = "stun:stun.l.google.com:19302";

#[derive(Debug, Clone, Parser)]
#[command(name = "tandem-server", version, about = "WebRTC signaling server")]
pub struct Config {
    /// Address the HTTP/WebSocket listener binds to.
    #[arg(long, env = "TANDEM_BIND_ADDRESS", default_value = DEFAULT_BIND_ADDRESS)]
    pub bind_address: SocketAddr,

    /// Server-wide limit on concurrently connected clients.
    #[arg(long, env = "TANDEM_MAX_CONNECTIONS", default_value_t = DEFAULT_MAX_CONNECTIONS)]
    pub max_connections: usize,

    /// Maximum members per room (2 for one-to-one calls).
    #[arg(long, env = "TANDEM_ROOM_CAPACITY", default_value_t = DEFAULT_ROOM_CAPACITY)]
    pub room_capacity: usize,

    #[arg(long, env = "TANDEM_PING_INTERVAL_MS", default_value_t = DEFAULT_PING_INTERVAL_MS)]
    pub ping_interval_ms: u64,

    /// A client silent for longer than this is disconnected.
    #[arg(long, env = "TANDEM_LIVENESS_TIMEOUT_MS", default_value_t = DEFAULT_LIVENESS_TIMEOUT_MS)]
    pub liveness_timeout_ms: u64,

    #[arg(long, env = "TANDEM_JOIN_TIMEOUT_MS", default_value_t = DEFAULT_JOIN_TIMEOUT_MS)]
    pub join_timeout_ms: u64,

    /// Deadline for each offer/answer step.
    #[arg(
        long,
        env = "TANDEM_NEGOTIATION_TIMEOUT_MS",
        default_value_t = DEFAULT_NEGOTIATION_TIMEOUT_MS
    )]
    pub negotiation_timeout_ms: u64,

    /// Messages buffered per client before it is dropped as a slow consumer.
    #[arg(
        long,
        env = "TANDEM_OUTBOUND_QUEUE_CAPACITY",
        default_value_t = DEFAULT_OUTBOUND_QUEUE_CAPACITY
    )]
    pub outbound_queue_capacity: usize,

    #[arg(long, env = "TANDEM_MAX_PAYLOAD_BYTES", default_value_t = DEFAULT_MAX_PAYLOAD_BYTES)]
    pub max_payload_bytes: usize,

    /// STUN/TURN urls handed to clients in the welcome frame.
    #[arg(
        long = "ice-server",
        env = "TANDEM_ICE_SERVERS",
        value_delimiter = ',',
        default_value = DEFAULT_ICE_SERVER
    )]
    pub ice_servers: Vec<String>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_address: SocketAddr::from(([0, 0, 0, 0], 3000)),
            max_connections: DEFAULT_MAX_CONNECTIONS,
            room_capacity: DEFAULT_ROOM_CAPACITY,
            ping_interval_ms: DEFAULT_PING_INTERVAL_MS,
            liveness_timeout_ms: DEFAULT_LIVENESS_TIMEOUT_MS,
            join_timeout_ms: DEFAULT_JOIN_TIMEOUT_MS,
            negotiation_timeout_ms: DEFAULT_NEGOTIATION_TIMEOUT_MS,
            outbound_queue_capacity: DEFAULT_OUTBOUND_QUEUE_CAPACITY,
            max_payload_bytes: DEFAULT_MAX_PAYLOAD_BYTES,
            ice_servers: vec![DEFAULT_ICE_SERVER.to_string()],
        }
    }
}

impl Config {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.room_capacity < 2 {
            return Err(ConfigError::InvalidValue(format!(
                "room_capacity must be at least 2, got {}",
                self.room_capacity
            )));
        }
        if self.max_connections == 0 {
            return Err(ConfigError::InvalidValue(
                "max_connections must be positive".to_string(),
            ));
        }
        if self.outbound_queue_capacity == 0 {
            return Err(ConfigError::InvalidValue(
                "outbound_queue_capacity must be positive".to_string(),
            ));
        }
        if self.max_payload_bytes == 0 {
            return Err(ConfigError::InvalidValue(
                "max_payload_bytes must be positive".to_string(),
            ));
        }

        for (name, value) in [
            ("ping_interval_ms", self.ping_interval_ms),
            ("liveness_timeout_ms", self.liveness_timeout_ms),
            ("join_timeout_ms", self.join_timeout_ms),
            ("negotiation_timeout_ms", self.negotiation_timeout_ms),
        ] {
            if value == 0 {
                return Err(ConfigError::InvalidValue(format!("{name} must be positive")));
            }
        }

        if self.liveness_timeout_ms < self.ping_interval_ms {
            return Err(ConfigError::InvalidValue(format!(
                "liveness_timeout_ms ({}) must not be shorter than ping_interval_ms ({})",
                self.liveness_timeout_ms, self.ping_interval_ms
            )));
        }

        Ok(())
    }

    pub fn ping_interval(&self) -> Duration {
        Duration::from_millis(self.ping_interval_ms)
    }

    pub fn liveness_timeout(&self) -> Duration {
        Duration::from_millis(self.liveness_timeout_ms)
    }

    pub fn join_timeout(&self) -> Duration {
        Duration::from_millis(self.join_timeout_ms)
    }

    pub fn negotiation_timeout(&self) -> Duration {
        Duration::from_millis(self.negotiation_timeout_ms)
    }

    pub fn ice_server_configs(&self) -> Vec<IceServerConfig> {
        self.ice_servers
            .iter()
            .filter(|url| !url.is_empty())
            .map(IceServerConfig::from_url)
            .collect()
    }
}
