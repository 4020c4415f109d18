use crate::model::peer::ParticipantId;
use crate::model::room::RoomId;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IceServerConfig {
    pub urls: Vec<String>,
    pub username: Option<String>,
    pub credential: Option<String>,
}

impl IceServerConfig {
    pub fn stun<I, S>(urls: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            urls: urls.into_iter().map(Into::into).collect(),
            username: None,
            credential: None,
        }
    }
}

/// One network-path candidate, in the browser `RTCIceCandidateInit` JSON shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IceCandidate {
    pub candidate: String,
    #[serde(default)]
    pub sdp_mid: Option<String>,
    #[serde(default, rename = "sdpMLineIndex")]
    pub sdp_m_line_index: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username_fragment: Option<String>,
}

impl IceCandidate {
    pub fn new(candidate: impl Into<String>) -> Self {
        Self {
            candidate: candidate.into(),
            sdp_mid: None,
            sdp_m_line_index: None,
            username_fragment: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum SignalPayload {
    Offer { sdp: String },
    Answer { sdp: String },
    Candidate { candidate: IceCandidate },
}

impl SignalPayload {
    pub fn kind(&self) -> &'static str {
        match self {
            SignalPayload::Offer { .. } => "offer",
            SignalPayload::Answer { .. } => "answer",
            SignalPayload::Candidate { .. } => "candidate",
        }
    }
}

/// Directed negotiation message relayed by the signaling transport.
///
/// Serialized flat: `{"type":"offer","sdp":"...","from":"a","to":"b","roomId":"r"}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignalMessage {
    #[serde(flatten)]
    pub payload: SignalPayload,
    pub from: ParticipantId,
    pub to: ParticipantId,
    pub room_id: RoomId,
}

impl SignalMessage {
    pub fn offer(from: ParticipantId, to: ParticipantId, room_id: RoomId, sdp: String) -> Self {
        Self {
            payload: SignalPayload::Offer { sdp },
            from,
            to,
            room_id,
        }
    }

    pub fn answer(from: ParticipantId, to: ParticipantId, room_id: RoomId, sdp: String) -> Self {
        Self {
            payload: SignalPayload::Answer { sdp },
            from,
            to,
            room_id,
        }
    }

    pub fn candidate(
        from: ParticipantId,
        to: ParticipantId,
        room_id: RoomId,
        candidate: IceCandidate,
    ) -> Self {
        Self {
            payload: SignalPayload::Candidate { candidate },
            from,
            to,
            room_id,
        }
    }

    pub fn kind(&self) -> &'static str {
        self.payload.kind()
    }
}
