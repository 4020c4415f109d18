use crate::error::{MeshError, Result};
use crate::room::orchestrator::Orchestrator;
use crate::room::room_command::{EnterMode, RoomCommand};
use crate::room::room_observer::RoomObserver;
use crate::room::snapshot::RoomSnapshot;
use crate::signaling::SignalingOutput;
use crate::transport::{ConnectionFactory, LocalMedia, MediaSource, TransportConfig};
use huddle_core::{ParticipantId, RoomEvent, RoomId, SignalMessage, TrackKind};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tracing::{info, warn};

/// Starts the room loop for `local_id` and returns a handle to drive it.
///
/// The loop runs until every handle is dropped, then closes all sessions.
pub fn spawn_room(
    local_id: ParticipantId,
    config: &TransportConfig,
    factory: Arc<dyn ConnectionFactory>,
    signaling: Arc<dyn SignalingOutput>,
    observer: Arc<dyn RoomObserver>,
) -> RoomHandle {
    info!(local = %local_id, "Spawning room loop");
    let (tx, rx) = mpsc::channel(config.command_buffer.max(1));

    let orchestrator = Orchestrator::new(local_id.clone(), config, factory, rx, signaling, observer);
    tokio::spawn(orchestrator.run());

    RoomHandle { local_id, tx }
}

#[derive(Clone)]
pub struct RoomHandle {
    local_id: ParticipantId,
    tx: mpsc::Sender<RoomCommand>,
}

impl RoomHandle {
    pub fn local_id(&self) -> &ParticipantId {
        &self.local_id
    }

    /// Acquires local media, then asks the transport to create `room_id`.
    ///
    /// Nothing is sent when media is unavailable.
    pub async fn create_room(&self, room_id: RoomId, source: &dyn MediaSource) -> Result<()> {
        self.enter(EnterMode::Create, room_id, source).await
    }

    /// Acquires local media, then asks the transport to join `room_id`.
    pub async fn join_room(&self, room_id: RoomId, source: &dyn MediaSource) -> Result<()> {
        self.enter(EnterMode::Join, room_id, source).await
    }

    async fn enter(&self, mode: EnterMode, room_id: RoomId, source: &dyn MediaSource) -> Result<()> {
        let media = match source.acquire().await {
            Ok(media) => media,
            Err(e) => {
                warn!(room = %room_id, "local media unavailable: {e}");
                return Err(MeshError::MediaUnavailable(e));
            }
        };

        let (reply, rx) = oneshot::channel();
        self.send(RoomCommand::Enter {
            mode,
            room_id,
            media,
            reply,
        })
        .await?;
        rx.await.map_err(|_| MeshError::RoomClosed)
    }

    /// Replaces the local media; every session gets the new tracks.
    pub async fn set_local_media(&self, media: LocalMedia) -> Result<()> {
        self.send(RoomCommand::SetLocalMedia(media)).await
    }

    /// Re-acquires media from `source` and installs it.
    pub async fn restart_media(&self, source: &dyn MediaSource) -> Result<()> {
        let media = source.acquire().await?;
        self.set_local_media(media).await
    }

    /// Entry point for offers, answers and candidates from the transport.
    pub async fn deliver_signal(&self, msg: SignalMessage) -> Result<()> {
        self.send(RoomCommand::Signal(msg)).await
    }

    /// Entry point for room lifecycle events from the transport.
    pub async fn deliver_event(&self, event: RoomEvent) -> Result<()> {
        self.send(RoomCommand::Room(event)).await
    }

    /// Returns how many local tracks of `kind` were switched.
    pub async fn set_track_enabled(&self, kind: TrackKind, enabled: bool) -> Result<usize> {
        let (reply, rx) = oneshot::channel();
        self.send(RoomCommand::SetTrackEnabled {
            kind,
            enabled,
            reply,
        })
        .await?;
        rx.await.map_err(|_| MeshError::RoomClosed)
    }

    pub async fn set_audio_enabled(&self, enabled: bool) -> Result<usize> {
        self.set_track_enabled(TrackKind::Audio, enabled).await
    }

    pub async fn set_video_enabled(&self, enabled: bool) -> Result<usize> {
        self.set_track_enabled(TrackKind::Video, enabled).await
    }

    /// Closes every session and leaves the room. Safe to call repeatedly.
    pub async fn leave_room(&self) -> Result<()> {
        let (reply, rx) = oneshot::channel();
        self.send(RoomCommand::Leave { reply }).await?;
        rx.await.map_err(|_| MeshError::RoomClosed)
    }

    pub async fn snapshot(&self) -> Result<RoomSnapshot> {
        let (reply, rx) = oneshot::channel();
        self.send(RoomCommand::Snapshot(reply)).await?;
        rx.await.map_err(|_| MeshError::RoomClosed)
    }

    async fn send(&self, cmd: RoomCommand) -> Result<()> {
        self.tx.send(cmd).await.map_err(|_| MeshError::RoomClosed)
    }
}
