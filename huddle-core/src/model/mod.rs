mod peer;
mod room;
mod room_event;
mod signaling;
mod track;

pub use peer::ParticipantId;
pub use room::RoomId;
pub use room_event::{RoomEvent, RoomRequest};
pub use signaling::{IceCandidate, IceServerConfig, SignalMessage, SignalPayload};
pub use track::{TrackId, TrackKind};
