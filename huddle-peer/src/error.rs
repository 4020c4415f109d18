use huddle_core::ParticipantId;
use thiserror::Error;

/// Failures surfaced by the negotiation engine.
///
/// None of these is fatal to the process: the worst outcome is one peer
/// session that never converges, recoverable by a fresh join.
#[derive(Debug, Error)]
pub enum MeshError {
    #[error("no session for peer {0}")]
    UnknownPeer(ParticipantId),

    #[error("session for peer {0} is closed")]
    StaleSession(ParticipantId),

    #[error("malformed candidate from {peer}: {reason}")]
    MalformedCandidate { peer: ParticipantId, reason: String },

    #[error("local media unavailable: {0}")]
    MediaUnavailable(#[from] MediaError),

    #[error("session for peer {0} has nothing to negotiate yet")]
    NotReady(ParticipantId),

    #[error("connection error for {peer}: {source}")]
    Connection {
        peer: ParticipantId,
        #[source]
        source: anyhow::Error,
    },

    #[error("room event loop is gone")]
    RoomClosed,
}

#[derive(Debug, Error)]
pub enum MediaError {
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("no capture device for {0}")]
    NoDevice(String),

    #[error("capture failed: {0}")]
    Capture(String),
}

pub type Result<T, E = MeshError> = std::result::Result<T, E>;
