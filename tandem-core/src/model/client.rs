use serde::{Deserialize, Serialize};
use std::fmt;

/// Server-assigned identity of a connected client.
///
/// Rendered as 16 lowercase hex digits so that lexicographic order equals
/// allocation order; the negotiation tie-break relies on `Ord`.
#[derive(Debug, Serialize, Deserialize, Clone, Hash, Eq, PartialEq, Ord, PartialOrd)]
#[serde(transparent)]
pub struct ClientId(String);

impl ClientId {
    pub fn from_sequence(seq: u64) -> Self {
        Self(format!("{seq:016x}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ClientId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for ClientId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
