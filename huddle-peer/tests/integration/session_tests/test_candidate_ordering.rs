use std::sync::Arc;
use tokio::sync::mpsc;

use huddle_core::{IceCandidate, ParticipantId};
use huddle_peer::{CandidateOutcome, SdpKind, SessionRegistry};

use crate::integration::init_tracing;
use crate::utils::{ConnCall, FakeConnectionFactory};

#[tokio::test]
async fn test_early_candidates_applied_after_remote_description() {
    init_tracing();

    let (tx, _rx) = mpsc::channel(16);
    let factory = FakeConnectionFactory::new("bob");
    let mut registry = SessionRegistry::new("bob".into(), Arc::new(factory.clone()), tx);
    let alice = ParticipantId::from("alice");
    let (session, _) = registry.get_or_create(&alice);

    let early = session
        .apply_remote_candidate(IceCandidate::new("candidate:1"))
        .unwrap();
    assert_eq!(early, CandidateOutcome::Buffered);
    session
        .apply_remote_candidate(IceCandidate::new("candidate:2"))
        .unwrap();
    assert_eq!(session.pending_candidates(), 2);

    session
        .apply_remote_description(SdpKind::Offer, "alice-offer".into())
        .unwrap();
    assert_eq!(session.pending_candidates(), 0);

    let late = session
        .apply_remote_candidate(IceCandidate::new("candidate:3"))
        .unwrap();
    assert_eq!(late, CandidateOutcome::Applied);

    let calls = factory.wait_for_calls(&alice, |calls| calls.len() >= 5).await;

    assert_eq!(
        calls,
        vec![
            ConnCall::SetRemote(SdpKind::Offer, "alice-offer".into()),
            ConnCall::CreateAnswer,
            ConnCall::AddCandidate("candidate:1".into()),
            ConnCall::AddCandidate("candidate:2".into()),
            ConnCall::AddCandidate("candidate:3".into()),
        ]
    );
}

#[tokio::test]
async fn test_candidates_for_closed_session_are_rejected() {
    init_tracing();

    let (tx, _rx) = mpsc::channel(16);
    let factory = FakeConnectionFactory::new("bob");
    let mut registry = SessionRegistry::new("bob".into(), Arc::new(factory.clone()), tx);
    let alice = ParticipantId::from("alice");

    let (session, _) = registry.get_or_create(&alice);
    session.close();

    assert!(
        session
            .apply_remote_candidate(IceCandidate::new("candidate:1"))
            .is_err()
    );

    let calls = factory.wait_for_calls(&alice, |calls| !calls.is_empty()).await;
    assert_eq!(calls, vec![ConnCall::Close]);
}
