use anyhow::{Result, bail};
use async_trait::async_trait;
use huddle_core::{IceCandidate, ParticipantId, TrackId};
use huddle_peer::{
    ConnectionFactory, ConnectionSignal, EventSink, LocalTrack, PeerConnection, SdpKind,
};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tokio::sync::{Mutex, Semaphore};

use super::wait::{EVENT_TIMEOUT_MS, wait_until};

/// Every call a session made on its connection, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnCall {
    CreateOffer,
    CreateAnswer,
    SetRemote(SdpKind, String),
    Rollback,
    AddCandidate(String),
    AddTrack(TrackId),
    Close,
}

/// Holds description generation until the test opens it.
struct DescriptionGate {
    held: AtomicBool,
    open: Semaphore,
}

impl DescriptionGate {
    fn new() -> Self {
        Self {
            held: AtomicBool::new(false),
            open: Semaphore::new(0),
        }
    }

    async fn pass(&self) {
        if self.held.load(Ordering::SeqCst) {
            // Never granted a permit; returns once the semaphore is closed.
            let _ = self.open.acquire().await;
        }
    }
}

/// In-memory connection that records calls and fabricates SDP.
pub struct FakeConnection {
    local_id: ParticipantId,
    events: EventSink,
    calls: Mutex<Vec<ConnCall>>,
    descriptions: AtomicUsize,
    gate: Arc<DescriptionGate>,
    reject_answers: Arc<AtomicBool>,
}

impl FakeConnection {
    pub async fn calls(&self) -> Vec<ConnCall> {
        self.calls.lock().await.clone()
    }

    async fn record(&self, call: ConnCall) {
        tracing::debug!(
            "[FakeConnection] {} -> {}: {:?}",
            self.local_id,
            self.events.peer_id(),
            call
        );
        self.calls.lock().await.push(call);
    }

    fn next_sdp(&self, kind: &str) -> String {
        let n = self.descriptions.fetch_add(1, Ordering::SeqCst) + 1;
        format!("{kind}:{}->{}#{n}", self.local_id, self.events.peer_id())
    }
}

#[async_trait]
impl PeerConnection for FakeConnection {
    async fn create_offer(&self) -> Result<String> {
        self.record(ConnCall::CreateOffer).await;
        self.gate.pass().await;
        Ok(self.next_sdp("offer"))
    }

    async fn create_answer(&self) -> Result<String> {
        self.record(ConnCall::CreateAnswer).await;
        self.gate.pass().await;
        Ok(self.next_sdp("answer"))
    }

    async fn set_remote_description(&self, kind: SdpKind, sdp: String) -> Result<()> {
        self.record(ConnCall::SetRemote(kind, sdp)).await;
        if kind == SdpKind::Answer && self.reject_answers.load(Ordering::SeqCst) {
            bail!("fake connection rejects the remote answer");
        }
        Ok(())
    }

    async fn rollback(&self) -> Result<()> {
        self.record(ConnCall::Rollback).await;
        Ok(())
    }

    async fn add_ice_candidate(&self, candidate: IceCandidate) -> Result<()> {
        self.record(ConnCall::AddCandidate(candidate.candidate)).await;
        Ok(())
    }

    async fn add_track(&self, track: LocalTrack) -> Result<()> {
        self.record(ConnCall::AddTrack(track.id().clone())).await;
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.record(ConnCall::Close).await;
        Ok(())
    }
}

/// Factory for one participant; keeps every connection it built.
#[derive(Clone)]
pub struct FakeConnectionFactory {
    local_id: ParticipantId,
    connections: Arc<Mutex<Vec<Arc<FakeConnection>>>>,
    fail: Arc<AtomicBool>,
    gate: Arc<DescriptionGate>,
    reject_answers: Arc<AtomicBool>,
}

impl FakeConnectionFactory {
    pub fn new(local_id: impl Into<ParticipantId>) -> Self {
        Self {
            local_id: local_id.into(),
            connections: Arc::new(Mutex::new(Vec::new())),
            fail: Arc::new(AtomicBool::new(false)),
            gate: Arc::new(DescriptionGate::new()),
            reject_answers: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Makes every later `create` fail.
    pub fn fail_creation(&self) {
        self.fail.store(true, Ordering::SeqCst);
    }

    /// Makes offer and answer creation block until [`Self::release_descriptions`].
    pub fn hold_descriptions(&self) {
        self.gate.held.store(true, Ordering::SeqCst);
    }

    pub fn release_descriptions(&self) {
        self.gate.open.close();
    }

    /// Makes every connection fail to apply a remote answer.
    pub fn reject_answers(&self) {
        self.reject_answers.store(true, Ordering::SeqCst);
    }

    /// The most recent connection towards `peer_id`.
    pub async fn latest(&self, peer_id: &ParticipantId) -> Option<Arc<FakeConnection>> {
        self.connections
            .lock()
            .await
            .iter()
            .rev()
            .find(|c| c.events.peer_id() == peer_id)
            .cloned()
    }

    pub async fn connections_to(&self, peer_id: &ParticipantId) -> usize {
        self.connections
            .lock()
            .await
            .iter()
            .filter(|c| c.events.peer_id() == peer_id)
            .count()
    }

    pub async fn calls_to(&self, peer_id: &ParticipantId) -> Vec<ConnCall> {
        match self.latest(peer_id).await {
            Some(connection) => connection.calls().await,
            None => Vec::new(),
        }
    }

    /// Waits until the calls towards `peer_id` satisfy `check`, then returns them.
    pub async fn wait_for_calls<F>(&self, peer_id: &ParticipantId, check: F) -> Vec<ConnCall>
    where
        F: Fn(&[ConnCall]) -> bool,
    {
        let check = &check;
        wait_until(EVENT_TIMEOUT_MS, || async move {
            check(&self.calls_to(peer_id).await)
        })
        .await;
        self.calls_to(peer_id).await
    }

    /// Fires a connection callback as if the transport raised it.
    pub async fn emit(&self, peer_id: &ParticipantId, signal: ConnectionSignal) -> bool {
        let Some(connection) = self.latest(peer_id).await else {
            return false;
        };
        connection.events.emit(signal).await;
        true
    }
}

#[async_trait]
impl ConnectionFactory for FakeConnectionFactory {
    async fn create(&self, events: EventSink) -> Result<Arc<dyn PeerConnection>> {
        if self.fail.load(Ordering::SeqCst) {
            bail!("fake factory refuses to build a connection to {}", events.peer_id());
        }

        let connection = Arc::new(FakeConnection {
            local_id: self.local_id.clone(),
            events,
            calls: Mutex::new(Vec::new()),
            descriptions: AtomicUsize::new(0),
            gate: self.gate.clone(),
            reject_answers: self.reject_answers.clone(),
        });
        self.connections.lock().await.push(connection.clone());
        Ok(connection)
    }
}
