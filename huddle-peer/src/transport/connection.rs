use crate::transport::media::LocalTrack;
use crate::transport::transport_event::EventSink;
use anyhow::Result;
use async_trait::async_trait;
use huddle_core::IceCandidate;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SdpKind {
    Offer,
    Answer,
}

/// The media-and-data transport object a session negotiates over.
///
/// Calls for one connection are issued strictly one at a time, in the order
/// the session submitted them.
#[async_trait]
pub trait PeerConnection: Send + Sync {
    /// Generates an offer and installs it as the local description.
    async fn create_offer(&self) -> Result<String>;

    /// Generates an answer to the applied remote offer and installs it locally.
    async fn create_answer(&self) -> Result<String>;

    async fn set_remote_description(&self, kind: SdpKind, sdp: String) -> Result<()>;

    /// Drops a pending local offer, returning to a stable signaling state.
    async fn rollback(&self) -> Result<()>;

    async fn add_ice_candidate(&self, candidate: IceCandidate) -> Result<()>;

    async fn add_track(&self, track: LocalTrack) -> Result<()>;

    async fn close(&self) -> Result<()>;
}

/// Builds connection objects for new sessions.
#[async_trait]
pub trait ConnectionFactory: Send + Sync {
    async fn create(&self, events: EventSink) -> Result<Arc<dyn PeerConnection>>;
}
