use crate::transport::connection::{ConnectionFactory, PeerConnection, SdpKind};
use crate::transport::media::{LocalTrack, RemoteTrackInfo};
use crate::transport::transport_config::TransportConfig;
use crate::transport::transport_event::{ConnectionSignal, ConnectionState, EventSink};
use anyhow::{Context, Result};
use async_trait::async_trait;
use huddle_core::{IceCandidate, TrackKind};
use std::sync::Arc;
use tracing::{debug, info};
use webrtc::api::APIBuilder;
use webrtc::api::interceptor_registry::register_default_interceptors;
use webrtc::api::media_engine::MediaEngine;
use webrtc::data_channel::RTCDataChannel;
use webrtc::data_channel::data_channel_init::RTCDataChannelInit;
use webrtc::ice_transport::ice_candidate::{RTCIceCandidate, RTCIceCandidateInit};
use webrtc::ice_transport::ice_server::RTCIceServer;
use webrtc::interceptor::registry::Registry;
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::peer_connection_state::RTCPeerConnectionState;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;
use webrtc::rtp_transceiver::rtp_codec::RTPCodecType;
use webrtc::track::track_local::TrackLocal;

/// Builds webrtc-rs backed connections from a shared [`TransportConfig`].
#[derive(Clone, Default)]
pub struct WebRtcConnectionFactory {
    config: TransportConfig,
}

impl WebRtcConnectionFactory {
    pub fn new(config: TransportConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl ConnectionFactory for WebRtcConnectionFactory {
    async fn create(&self, events: EventSink) -> Result<Arc<dyn PeerConnection>> {
        let connection = ConnectionWrapper::new(events, &self.config).await?;
        Ok(Arc::new(connection))
    }
}

pub struct ConnectionWrapper {
    pub peer_connection: Arc<RTCPeerConnection>,
    _data_channel: Arc<RTCDataChannel>,
}

impl ConnectionWrapper {
    /// Builds a peer connection whose callbacks report into `events`.
    pub async fn new(events: EventSink, config: &TransportConfig) -> Result<Self> {
        let mut m = MediaEngine::default();
        m.register_default_codecs()?;
        let registry = register_default_interceptors(Registry::new(), &mut m)?;

        let api = APIBuilder::new()
            .with_media_engine(m)
            .with_interceptor_registry(registry)
            .build();

        let rtc_config = RTCConfiguration {
            ice_servers: config
                .ice_servers
                .iter()
                .map(|server| RTCIceServer {
                    urls: server.urls.clone(),
                    username: server.username.clone().unwrap_or_default(),
                    credential: server.credential.clone().unwrap_or_default(),
                    ..Default::default()
                })
                .collect(),
            ice_candidate_pool_size: config.ice_candidate_pool_size,
            ..Default::default()
        };

        let peer_connection = Arc::new(api.new_peer_connection(rtc_config).await?);

        let state_events = events.clone();
        peer_connection.on_peer_connection_state_change(Box::new(
            move |s: RTCPeerConnectionState| {
                let events = state_events.clone();
                Box::pin(async move {
                    info!(peer = %events.peer_id(), state = ?s, "peer connection state changed");
                    events
                        .emit(ConnectionSignal::StateChanged(map_state(s)))
                        .await;
                })
            },
        ));

        let ice_events = events.clone();
        peer_connection.on_ice_candidate(Box::new(move |c: Option<RTCIceCandidate>| {
            let events = ice_events.clone();
            Box::pin(async move {
                let Some(candidate) = c else { return };
                let Ok(init) = candidate.to_json() else {
                    return;
                };
                events
                    .emit(ConnectionSignal::CandidateGenerated(IceCandidate {
                        candidate: init.candidate,
                        sdp_mid: init.sdp_mid,
                        sdp_m_line_index: init.sdp_mline_index,
                        username_fragment: init.username_fragment,
                    }))
                    .await;
            })
        }));

        let track_events = events.clone();
        peer_connection.on_track(Box::new(move |track, _receiver, _transceiver| {
            let events = track_events.clone();
            Box::pin(async move {
                let kind = match track.kind() {
                    RTPCodecType::Audio => TrackKind::Audio,
                    RTPCodecType::Video => TrackKind::Video,
                    _ => return,
                };
                let info = RemoteTrackInfo {
                    track_id: track.id().into(),
                    kind,
                    stream_id: track.stream_id(),
                };
                debug!(peer = %events.peer_id(), track = %info.track_id, "remote track arrived");
                events.emit(ConnectionSignal::RemoteTrack(info)).await;

                // Rendering is the consumer's job; keep the receive path drained.
                tokio::spawn(async move { while track.read_rtp().await.is_ok() {} });
            })
        }));

        // Pre-negotiated on both ends so every offer carries a transport even without media.
        let data_channel = peer_connection
            .create_data_channel(
                &config.data_channel_label,
                Some(RTCDataChannelInit {
                    negotiated: Some(0),
                    ordered: Some(true),
                    ..Default::default()
                }),
            )
            .await
            .context("Failed to create data channel")?;

        Ok(Self {
            peer_connection,
            _data_channel: data_channel,
        })
    }
}

#[async_trait]
impl PeerConnection for ConnectionWrapper {
    async fn create_offer(&self) -> Result<String> {
        let offer = self.peer_connection.create_offer(None).await?;
        self.peer_connection
            .set_local_description(offer.clone())
            .await?;
        Ok(offer.sdp)
    }

    async fn create_answer(&self) -> Result<String> {
        let answer = self.peer_connection.create_answer(None).await?;
        self.peer_connection
            .set_local_description(answer.clone())
            .await?;
        Ok(answer.sdp)
    }

    async fn set_remote_description(&self, kind: SdpKind, sdp: String) -> Result<()> {
        let desc = match kind {
            SdpKind::Offer => RTCSessionDescription::offer(sdp)?,
            SdpKind::Answer => RTCSessionDescription::answer(sdp)?,
        };
        self.peer_connection.set_remote_description(desc).await?;
        Ok(())
    }

    async fn rollback(&self) -> Result<()> {
        let Some(pending) = self.peer_connection.pending_local_description().await else {
            return Ok(());
        };
        // The rollback description must still parse, so it carries the pending SDP.
        let rollback: RTCSessionDescription =
            serde_json::from_value(serde_json::json!({ "type": "rollback", "sdp": pending.sdp }))
                .context("Failed to build rollback description")?;
        self.peer_connection.set_local_description(rollback).await?;
        Ok(())
    }

    async fn add_ice_candidate(&self, candidate: IceCandidate) -> Result<()> {
        let init = RTCIceCandidateInit {
            candidate: candidate.candidate,
            sdp_mid: candidate.sdp_mid,
            sdp_mline_index: candidate.sdp_m_line_index,
            username_fragment: candidate.username_fragment,
        };
        self.peer_connection.add_ice_candidate(init).await?;
        Ok(())
    }

    async fn add_track(&self, track: LocalTrack) -> Result<()> {
        let rtp: Arc<dyn TrackLocal + Send + Sync> = track.rtp_track();
        let sender = self
            .peer_connection
            .add_track(rtp)
            .await
            .with_context(|| format!("Failed to add track {}", track.id()))?;

        tokio::spawn(async move {
            let mut rtcp_buf = vec![0u8; 1500];
            while sender.read(&mut rtcp_buf).await.is_ok() {}
        });
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.peer_connection.close().await?;
        Ok(())
    }
}

fn map_state(state: RTCPeerConnectionState) -> ConnectionState {
    match state {
        RTCPeerConnectionState::Connecting => ConnectionState::Connecting,
        RTCPeerConnectionState::Connected => ConnectionState::Connected,
        RTCPeerConnectionState::Disconnected => ConnectionState::Disconnected,
        RTCPeerConnectionState::Failed => ConnectionState::Failed,
        RTCPeerConnectionState::Closed => ConnectionState::Closed,
        _ => ConnectionState::New,
    }
}
