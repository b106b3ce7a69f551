mod negotiation_session;
mod orchestrator;

pub use negotiation_session::{NegotiationSession, NegotiationState};
pub use orchestrator::*;
