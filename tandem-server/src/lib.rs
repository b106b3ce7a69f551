//! WebRTC signaling server.
//!
//! Clients connect over a WebSocket, join rooms and exchange SDP offers,
//! answers and ICE candidates through the server. Each room runs as its own
//! actor and coordinates offer/answer negotiation between every pair of
//! members. Media never passes through the server.

pub mod config;
pub mod error;
pub mod negotiation;
pub mod presence;
pub mod registry;
pub mod room;
pub mod signaling;

pub use config::Config;
pub use error::SignalError;
pub use negotiation::{NegotiationOrchestrator, NegotiationState};
pub use presence::LivenessMonitor;
pub use registry::SessionRegistry;
pub use room::{RoomCommand, RoomManager, RoomSnapshot};
pub use signaling::{ClientChannel, SignalingOutput, SignalingService, ws_handler};

use axum::Router;
use axum::routing::get;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// HTTP routes: `/ws` for signaling and `/health` for load balancer checks.
pub fn app(service: SignalingService) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/ws", get(ws_handler))
        .route("/health", get(|| async { "ok" }))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(service)
}
