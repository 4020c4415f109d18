use crate::room::snapshot::RoomSnapshot;
use crate::transport::LocalMedia;
use huddle_core::{RoomEvent, RoomId, SignalMessage, TrackKind};
use tokio::sync::oneshot;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnterMode {
    Create,
    Join,
}

/// Input consumed by the room loop, from the signaling transport or the local user.
#[derive(Debug)]
pub enum RoomCommand {
    /// Offer, answer or candidate relayed from another participant.
    Signal(SignalMessage),

    /// Room lifecycle notification from the transport.
    Room(RoomEvent),

    /// Local media is acquired; ask the transport to create or join the room.
    Enter {
        mode: EnterMode,
        room_id: RoomId,
        media: LocalMedia,
        reply: oneshot::Sender<()>,
    },

    /// Local media started or changed.
    SetLocalMedia(LocalMedia),

    /// Enable or disable every local track of a kind.
    SetTrackEnabled {
        kind: TrackKind,
        enabled: bool,
        reply: oneshot::Sender<usize>,
    },

    /// Local participant leaves: close every session and drop local media.
    Leave { reply: oneshot::Sender<()> },

    Snapshot(oneshot::Sender<RoomSnapshot>),
}
