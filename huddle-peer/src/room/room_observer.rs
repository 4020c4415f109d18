use crate::transport::{ConnectionState, RemoteTrackInfo};
use async_trait::async_trait;
use huddle_core::{ParticipantId, RoomId};

/// Notifications the room loop emits for the embedding application.
///
/// All methods default to no-ops.
#[async_trait]
pub trait RoomObserver: Send + Sync + 'static {
    async fn on_room_entered(&self, _room_id: RoomId) {}

    async fn on_peer_joined(&self, _peer_id: ParticipantId) {}

    async fn on_peer_left(&self, _peer_id: ParticipantId) {}

    async fn on_session_stable(&self, _peer_id: ParticipantId) {}

    /// Called exactly once per remote track of a session.
    async fn on_remote_track(&self, _peer_id: ParticipantId, _track: RemoteTrackInfo) {}

    async fn on_connection_state(&self, _peer_id: ParticipantId, _state: ConnectionState) {}

    async fn on_room_error(&self, _message: String) {}
}

/// Observer that ignores everything.
pub struct NoopObserver;

impl RoomObserver for NoopObserver {}
