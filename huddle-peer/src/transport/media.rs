use crate::error::MediaError;
use async_trait::async_trait;
use huddle_core::{TrackId, TrackKind};
use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use uuid::Uuid;
use webrtc::api::media_engine::{MIME_TYPE_OPUS, MIME_TYPE_VP8};
use webrtc::media::Sample;
use webrtc::rtp_transceiver::rtp_codec::RTCRtpCodecCapability;
use webrtc::track::track_local::track_local_static_sample::TrackLocalStaticSample;

struct LocalTrackInner {
    id: TrackId,
    kind: TrackKind,
    stream_id: String,
    enabled: AtomicBool,
    rtp: Arc<TrackLocalStaticSample>,
}

/// A locally captured track, shared by every session it is attached to.
///
/// Cloning is cheap. A session keeps its clones until it closes, so replacing
/// the room's local media never frees a track an open session still sends.
#[derive(Clone)]
pub struct LocalTrack {
    inner: Arc<LocalTrackInner>,
}

impl LocalTrack {
    pub fn new(kind: TrackKind, id: impl Into<TrackId>, stream_id: impl Into<String>) -> Self {
        let id = id.into();
        let stream_id = stream_id.into();
        let rtp = Arc::new(TrackLocalStaticSample::new(
            codec_for(kind),
            id.0.clone(),
            stream_id.clone(),
        ));

        Self {
            inner: Arc::new(LocalTrackInner {
                id,
                kind,
                stream_id,
                enabled: AtomicBool::new(true),
                rtp,
            }),
        }
    }

    pub fn id(&self) -> &TrackId {
        &self.inner.id
    }

    pub fn kind(&self) -> TrackKind {
        self.inner.kind
    }

    pub fn stream_id(&self) -> &str {
        &self.inner.stream_id
    }

    pub fn is_enabled(&self) -> bool {
        self.inner.enabled.load(Ordering::Acquire)
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.inner.enabled.store(enabled, Ordering::Release);
    }

    pub fn rtp_track(&self) -> Arc<TrackLocalStaticSample> {
        self.inner.rtp.clone()
    }

    /// Writes one media sample; returns `false` without sending while the track is disabled.
    pub async fn write_sample(&self, sample: &Sample) -> anyhow::Result<bool> {
        if !self.is_enabled() {
            return Ok(false);
        }
        self.inner.rtp.write_sample(sample).await?;
        Ok(true)
    }
}

impl std::fmt::Debug for LocalTrack {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalTrack")
            .field("id", &self.inner.id)
            .field("kind", &self.inner.kind)
            .field("enabled", &self.is_enabled())
            .finish()
    }
}

fn codec_for(kind: TrackKind) -> RTCRtpCodecCapability {
    match kind {
        TrackKind::Audio => RTCRtpCodecCapability {
            mime_type: MIME_TYPE_OPUS.to_owned(),
            clock_rate: 48_000,
            channels: 2,
            ..Default::default()
        },
        TrackKind::Video => RTCRtpCodecCapability {
            mime_type: MIME_TYPE_VP8.to_owned(),
            clock_rate: 90_000,
            ..Default::default()
        },
    }
}

/// The room's local media handle and its tracks.
#[derive(Debug, Clone)]
pub struct LocalMedia {
    stream_id: String,
    tracks: Vec<LocalTrack>,
}

impl LocalMedia {
    pub fn new(stream_id: impl Into<String>, tracks: Vec<LocalTrack>) -> Self {
        Self {
            stream_id: stream_id.into(),
            tracks,
        }
    }

    pub fn stream_id(&self) -> &str {
        &self.stream_id
    }

    pub fn tracks(&self) -> &[LocalTrack] {
        &self.tracks
    }

    pub fn track_ids(&self) -> HashSet<TrackId> {
        self.tracks.iter().map(|t| t.id().clone()).collect()
    }

    /// Flips every track of `kind`; returns how many tracks were touched.
    pub fn set_enabled(&self, kind: TrackKind, enabled: bool) -> usize {
        let mut touched = 0;
        for track in self.tracks.iter().filter(|t| t.kind() == kind) {
            track.set_enabled(enabled);
            touched += 1;
        }
        touched
    }
}

/// Description of a track announced by the remote side of a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteTrackInfo {
    pub track_id: TrackId,
    pub kind: TrackKind,
    pub stream_id: String,
}

/// Acquires local media before a room is entered.
#[async_trait]
pub trait MediaSource: Send + Sync {
    async fn acquire(&self) -> Result<LocalMedia, MediaError>;
}

/// Produces sample-fed tracks without touching capture devices.
#[derive(Debug, Clone, Copy)]
pub struct SyntheticMediaSource {
    pub audio: bool,
    pub video: bool,
}

impl Default for SyntheticMediaSource {
    fn default() -> Self {
        Self {
            audio: true,
            video: true,
        }
    }
}

#[async_trait]
impl MediaSource for SyntheticMediaSource {
    async fn acquire(&self) -> Result<LocalMedia, MediaError> {
        if !self.audio && !self.video {
            return Err(MediaError::NoDevice("audio or video".to_owned()));
        }

        let stream_id = Uuid::new_v4().to_string();
        let mut tracks = Vec::new();
        if self.audio {
            tracks.push(LocalTrack::new(
                TrackKind::Audio,
                format!("audio-{stream_id}"),
                stream_id.clone(),
            ));
        }
        if self.video {
            tracks.push(LocalTrack::new(
                TrackKind::Video,
                format!("video-{stream_id}"),
                stream_id.clone(),
            ));
        }
        Ok(LocalMedia::new(stream_id, tracks))
    }
}
