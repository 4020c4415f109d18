use huddle_core::{ParticipantId, RoomId, SignalMessage};
use huddle_peer::{SdpKind, SessionState};

use crate::integration::{TestParticipant, init_tracing};
use crate::utils::{ConnCall, EVENT_TIMEOUT_MS, Observed};

#[tokio::test]
async fn test_initiator_ignores_colliding_offer() {
    init_tracing();

    let alice = TestParticipant::spawn("alice");
    let room = RoomId::from("r1");
    let bob = ParticipantId::from("bob");

    alice.join_with_roster(&room, &["alice", "bob"]).await;
    let offers = alice.wait_for_offers(&bob, 1).await;

    alice
        .signal(SignalMessage::offer(
            bob.clone(),
            alice.id.clone(),
            room.clone(),
            "offer:bob->alice#1".into(),
        ))
        .await;

    let snapshot = alice.snapshot().await;
    assert_eq!(
        snapshot.session(&bob).map(|s| s.state),
        Some(SessionState::HaveLocalOffer)
    );
    assert!(alice.signaling.answers_to(&bob).await.is_empty());

    // bob yields and answers the surviving offer.
    alice
        .signal(SignalMessage::answer(
            bob.clone(),
            alice.id.clone(),
            room.clone(),
            format!("answer to {}", offers[0]),
        ))
        .await;

    assert!(
        alice
            .observer
            .wait_for(Observed::SessionStable(bob.clone()), 1, EVENT_TIMEOUT_MS)
            .await
    );

    let calls = alice
        .factory
        .wait_for_calls(&bob, |calls| {
            calls
                .iter()
                .any(|c| matches!(c, ConnCall::SetRemote(SdpKind::Answer, _)))
        })
        .await;
    assert!(
        !calls
            .iter()
            .any(|c| matches!(c, ConnCall::SetRemote(SdpKind::Offer, _)))
    );
    assert!(!calls.contains(&ConnCall::Rollback));
    assert_eq!(alice.signaling.offers_to(&bob).await.len(), 1);
}
