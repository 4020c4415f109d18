use crate::transport::media::RemoteTrackInfo;
use huddle_core::{IceCandidate, ParticipantId};
use tokio::sync::mpsc;
use tracing::debug;

/// Identifies one negotiation round of one session instance.
///
/// `session` is unique per session object for the lifetime of the room, so a
/// result from a closed session never matches a newer session for the same peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ticket {
    pub session: u64,
    pub epoch: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    New,
    Connecting,
    Connected,
    Disconnected,
    Failed,
    Closed,
}

/// Completion of an asynchronous description operation.
#[derive(Debug)]
pub enum NegotiationOutcome {
    OfferCreated(String),
    AnswerCreated(String),
    AnswerApplied,
    Failed {
        op: &'static str,
        error: anyhow::Error,
    },
}

/// Something the connection object reported on its own.
#[derive(Debug)]
pub enum ConnectionSignal {
    CandidateGenerated(IceCandidate),
    RemoteTrack(RemoteTrackInfo),
    StateChanged(ConnectionState),
}

/// Events flowing from session drivers and connection callbacks back into the room loop.
#[derive(Debug)]
pub enum TransportEvent {
    Negotiation {
        peer_id: ParticipantId,
        ticket: Ticket,
        outcome: NegotiationOutcome,
    },
    Connection {
        peer_id: ParticipantId,
        session: u64,
        signal: ConnectionSignal,
    },
}

/// Handle a connection object uses to report callbacks for its session.
#[derive(Clone)]
pub struct EventSink {
    peer_id: ParticipantId,
    session: u64,
    tx: mpsc::Sender<TransportEvent>,
}

impl EventSink {
    pub(crate) fn new(peer_id: ParticipantId, session: u64, tx: mpsc::Sender<TransportEvent>) -> Self {
        Self { peer_id, session, tx }
    }

    pub fn peer_id(&self) -> &ParticipantId {
        &self.peer_id
    }

    pub async fn emit(&self, signal: ConnectionSignal) {
        let event = TransportEvent::Connection {
            peer_id: self.peer_id.clone(),
            session: self.session,
            signal,
        };
        if self.tx.send(event).await.is_err() {
            debug!(peer = %self.peer_id, "room loop gone, dropping connection event");
        }
    }

    pub(crate) async fn complete(&self, ticket: Ticket, outcome: NegotiationOutcome) {
        let event = TransportEvent::Negotiation {
            peer_id: self.peer_id.clone(),
            ticket,
            outcome,
        };
        if self.tx.send(event).await.is_err() {
            debug!(peer = %self.peer_id, "room loop gone, dropping negotiation result");
        }
    }
}
