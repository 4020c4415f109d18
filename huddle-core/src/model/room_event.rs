use crate::model::peer::ParticipantId;
use crate::model::room::RoomId;
use serde::{Deserialize, Serialize};

/// Room lifecycle notifications delivered by the signaling transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum RoomEvent {
    RoomCreated(RoomId),
    RoomJoined(RoomId),
    /// Authoritative roster snapshot, local participant included.
    RoomUsers(Vec<ParticipantId>),
    UserJoined(ParticipantId),
    UserLeft(ParticipantId),
    RoomError(String),
}

/// Commands sent to the signaling transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum RoomRequest {
    CreateRoom(RoomId),
    JoinRoom(RoomId),
    LeaveRoom(RoomId),
}

impl RoomRequest {
    pub fn room_id(&self) -> &RoomId {
        match self {
            RoomRequest::CreateRoom(id) | RoomRequest::JoinRoom(id) | RoomRequest::LeaveRoom(id) => id,
        }
    }
}
