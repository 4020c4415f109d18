use huddle_core::{ParticipantId, RoomId, RoomRequest, SignalMessage};
use huddle_peer::{SdpKind, SessionState};

use crate::integration::{TestParticipant, init_tracing};
use crate::utils::ConnCall;

#[tokio::test]
async fn test_leave_twice_is_harmless() {
    init_tracing();

    let alice = TestParticipant::spawn("alice");
    let room = RoomId::from("r1");
    let bob = ParticipantId::from("bob");

    alice.join_with_roster(&room, &["alice", "bob"]).await;
    alice.wait_for_offers(&bob, 1).await;

    alice.handle.leave_room().await.expect("first leave");
    alice.handle.leave_room().await.expect("second leave");

    let snapshot = alice.snapshot().await;
    assert_eq!(snapshot.room_id, None);
    assert!(snapshot.sessions.is_empty());
    assert!(snapshot.roster.is_empty());
    assert!(snapshot.local_tracks.is_empty());

    let leaves = alice
        .signaling
        .requests()
        .await
        .into_iter()
        .filter(|r| matches!(r, RoomRequest::LeaveRoom(_)))
        .count();
    assert_eq!(leaves, 1);

    let calls = alice
        .factory
        .wait_for_calls(&bob, |calls| calls.contains(&ConnCall::Close))
        .await;
    assert_eq!(calls.iter().filter(|c| **c == ConnCall::Close).count(), 1);
}

#[tokio::test]
async fn test_answer_after_leave_is_ignored() {
    init_tracing();

    let alice = TestParticipant::spawn("alice");
    let room = RoomId::from("r1");
    let bob = ParticipantId::from("bob");

    alice.join_with_roster(&room, &["alice", "bob"]).await;
    let offers = alice.wait_for_offers(&bob, 1).await;
    assert_eq!(
        alice.snapshot().await.session(&bob).map(|s| s.state),
        Some(SessionState::HaveLocalOffer)
    );

    alice.handle.leave_room().await.unwrap();
    alice
        .signal(SignalMessage::answer(
            bob.clone(),
            alice.id.clone(),
            room.clone(),
            format!("answer to {}", offers[0]),
        ))
        .await;

    let snapshot = alice.snapshot().await;
    assert!(snapshot.sessions.is_empty());

    let calls = alice
        .factory
        .wait_for_calls(&bob, |calls| calls.contains(&ConnCall::Close))
        .await;
    assert!(
        !calls
            .iter()
            .any(|c| matches!(c, ConnCall::SetRemote(SdpKind::Answer, _)))
    );
}

#[tokio::test]
async fn test_rejoin_after_leave_starts_fresh_sessions() {
    init_tracing();

    let alice = TestParticipant::spawn("alice");
    let room = RoomId::from("r1");
    let bob = ParticipantId::from("bob");

    alice.join_with_roster(&room, &["alice", "bob"]).await;
    alice.wait_for_offers(&bob, 1).await;
    alice.handle.leave_room().await.unwrap();

    alice.join_with_roster(&room, &["alice", "bob"]).await;
    alice.wait_for_offers(&bob, 2).await;

    assert_eq!(alice.factory.connections_to(&bob).await, 2);
    let snapshot = alice.snapshot().await;
    assert_eq!(snapshot.sessions.len(), 1);
    assert_eq!(snapshot.room_id, Some(room));
}
