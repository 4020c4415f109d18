use crate::session::{SessionSnapshot, SessionState};
use huddle_core::{ParticipantId, RoomId, TrackId};

/// Point-in-time view of a room loop's state.
#[derive(Debug, Clone)]
pub struct RoomSnapshot {
    pub local_id: ParticipantId,
    pub room_id: Option<RoomId>,
    /// `true` once the transport confirmed the room was created or joined.
    pub active: bool,
    pub roster: Vec<ParticipantId>,
    pub local_tracks: Vec<TrackId>,
    pub sessions: Vec<SessionSnapshot>,
}

impl RoomSnapshot {
    pub fn session(&self, peer_id: &ParticipantId) -> Option<&SessionSnapshot> {
        self.sessions.iter().find(|s| &s.peer_id == peer_id)
    }

    pub fn all_stable(&self) -> bool {
        self.sessions.iter().all(|s| s.state == SessionState::Stable)
    }
}
