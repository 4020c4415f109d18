
use std::sync::Arc;
use tracing::Level;

use huddle_core::{ParticipantId, RoomEvent, RoomId, SignalMessage};
use huddle_peer::{
    LoopbackHub, RoomHandle, RoomSnapshot, SyntheticMediaSource, TransportConfig, spawn_room,
};

use crate::utils::{
    EVENT_TIMEOUT_MS, FakeConnectionFactory, MockSignalingOutput, RecordingObserver, wait_until,
};

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(Level::DEBUG)
        .with_test_writer()
        .try_init();
}

/// A room loop wired to a capturing transport; the test plays the server.
pub struct TestParticipant {
    pub id: ParticipantId,
    pub handle: RoomHandle,
    pub signaling: MockSignalingOutput,
    pub observer: RecordingObserver,
    pub factory: FakeConnectionFactory,
}

impl TestParticipant {
    pub fn spawn(id: &str) -> Self {
        let id = ParticipantId::from(id);
        let signaling = MockSignalingOutput::new();
        let observer = RecordingObserver::new();
        let factory = FakeConnectionFactory::new(id.clone());

        let handle = spawn_room(
            id.clone(),
            &TransportConfig::local(),
            Arc::new(factory.clone()),
            Arc::new(signaling.clone()),
            Arc::new(observer.clone()),
        );

        Self {
            id,
            handle,
            signaling,
            observer,
            factory,
        }
    }

    /// Joins `room` and confirms it with the given roster, as a server would.
    pub async fn join_with_roster(&self, room: &RoomId, roster: &[&str]) {
        self.handle
            .join_room(room.clone(), &SyntheticMediaSource::default())
            .await
            .expect("join failed");
        self.event(RoomEvent::RoomJoined(room.clone())).await;
        self.event(RoomEvent::RoomUsers(
            roster.iter().map(|id| ParticipantId::from(*id)).collect(),
        ))
        .await;
    }

    pub async fn event(&self, event: RoomEvent) {
        self.handle.deliver_event(event).await.expect("room loop gone");
    }

    pub async fn signal(&self, msg: SignalMessage) {
        self.handle.deliver_signal(msg).await.expect("room loop gone");
    }

    pub async fn snapshot(&self) -> RoomSnapshot {
        self.handle.snapshot().await.expect("room loop gone")
    }

    /// Waits for `count` offers to `peer_id` and returns them.
    pub async fn wait_for_offers(&self, peer_id: &ParticipantId, count: usize) -> Vec<String> {
        let arrived = wait_until(EVENT_TIMEOUT_MS, || async move {
            self.signaling.offers_to(peer_id).await.len() >= count
        })
        .await;
        assert!(arrived, "{} never sent {count} offer(s) to {peer_id}", self.id);
        self.signaling.offers_to(peer_id).await
    }

    /// Waits for `count` answers to `peer_id` and returns them.
    pub async fn wait_for_answers(&self, peer_id: &ParticipantId, count: usize) -> Vec<String> {
        let arrived = wait_until(EVENT_TIMEOUT_MS, || async move {
            self.signaling.answers_to(peer_id).await.len() >= count
        })
        .await;
        assert!(arrived, "{} never sent {count} answer(s) to {peer_id}", self.id);
        self.signaling.answers_to(peer_id).await
    }
}

/// A room loop connected to a shared loopback hub.
pub struct HubParticipant {
    pub id: ParticipantId,
    pub handle: RoomHandle,
    pub observer: RecordingObserver,
    pub factory: FakeConnectionFactory,
}

impl HubParticipant {
    pub fn spawn(hub: &LoopbackHub, id: &str) -> Self {
        let id = ParticipantId::from(id);
        let observer = RecordingObserver::new();
        let factory = FakeConnectionFactory::new(id.clone());

        let handle = spawn_room(
            id.clone(),
            &TransportConfig::local(),
            Arc::new(factory.clone()),
            hub.signaling_for(id.clone()),
            Arc::new(observer.clone()),
        );
        hub.connect(handle.clone());

        Self {
            id,
            handle,
            observer,
            factory,
        }
    }
}

/// Waits until the snapshot of `handle` satisfies `check`.
pub async fn wait_for_snapshot<F>(handle: &RoomHandle, check: F) -> Option<RoomSnapshot>
where
    F: Fn(&RoomSnapshot) -> bool,
{
    let check = &check;
    let matched = wait_until(EVENT_TIMEOUT_MS, || {
        let handle = handle.clone();
        async move { handle.snapshot().await.ok().is_some_and(|s| check(&s)) }
    })
    .await;
    if !matched {
        return None;
    }
    handle.snapshot().await.ok()
}
