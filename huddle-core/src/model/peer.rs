use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Identity of a room participant as assigned by the signaling transport.
///
/// Opaque and stable for the lifetime of one transport connection. The total
/// order is byte-wise lexicographic and decides who initiates negotiation.
#[derive(Debug, Serialize, Deserialize, Clone, Hash, Eq, PartialEq, Ord, PartialOrd)]
#[serde(transparent)]
pub struct ParticipantId(pub String);

impl ParticipantId {
    /// Fresh v4 UUID identity, for transports that do not assign one.
    pub fn random() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True when `self` sends the first offer to `other`.
    pub fn initiates_with(&self, other: &ParticipantId) -> bool {
        self < other
    }
}

impl From<&str> for ParticipantId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

impl From<String> for ParticipantId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
