use crate::transport::{
    ConnectionFactory, EventSink, LocalTrack, NegotiationOutcome, PeerConnection, SdpKind, Ticket,
};
use huddle_core::IceCandidate;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, warn};

#[derive(Debug)]
pub(crate) enum ConnectionOp {
    CreateOffer(Ticket),
    AcceptOffer {
        ticket: Ticket,
        sdp: String,
        rollback: bool,
    },
    ApplyAnswer {
        ticket: Ticket,
        sdp: String,
    },
    AddCandidate(IceCandidate),
    AddTrack(LocalTrack),
    Close,
}

impl ConnectionOp {
    fn ticket(&self) -> Option<(Ticket, &'static str)> {
        match self {
            ConnectionOp::CreateOffer(ticket) => Some((*ticket, "create_offer")),
            ConnectionOp::AcceptOffer { ticket, .. } => Some((*ticket, "accept_offer")),
            ConnectionOp::ApplyAnswer { ticket, .. } => Some((*ticket, "apply_answer")),
            _ => None,
        }
    }
}

/// Owns a session's connection object and runs its operations one at a time.
///
/// The room loop never awaits the connection: it submits operations here and
/// receives their results later as [`crate::TransportEvent`]s.
pub(crate) struct SessionDriver {
    ops: mpsc::UnboundedSender<ConnectionOp>,
}

impl SessionDriver {
    pub(crate) fn spawn(factory: Arc<dyn ConnectionFactory>, events: EventSink) -> Self {
        let (ops, rx) = mpsc::unbounded_channel();
        tokio::spawn(drive(factory, events, rx));
        Self { ops }
    }

    pub(crate) fn submit(&self, op: ConnectionOp) {
        if let Err(e) = self.ops.send(op) {
            debug!("session driver already stopped, dropping {:?}", e.0);
        }
    }
}

async fn drive(
    factory: Arc<dyn ConnectionFactory>,
    events: EventSink,
    mut rx: mpsc::UnboundedReceiver<ConnectionOp>,
) {
    let connection = match factory.create(events.clone()).await {
        Ok(connection) => connection,
        Err(e) => {
            error!(peer = %events.peer_id(), "Failed to create connection: {e:#}");
            fail_remaining(&events, &mut rx, format!("{e:#}")).await;
            return;
        }
    };

    while let Some(op) = rx.recv().await {
        match op {
            ConnectionOp::CreateOffer(ticket) => {
                let outcome = match connection.create_offer().await {
                    Ok(sdp) => NegotiationOutcome::OfferCreated(sdp),
                    Err(e) => failed("create_offer", e),
                };
                events.complete(ticket, outcome).await;
            }

            ConnectionOp::AcceptOffer {
                ticket,
                sdp,
                rollback,
            } => {
                if rollback {
                    if let Err(e) = connection.rollback().await {
                        warn!(peer = %events.peer_id(), "Rollback before remote offer failed: {e:#}");
                    }
                }
                let outcome = match accept_offer(connection.as_ref(), sdp).await {
                    Ok(answer) => NegotiationOutcome::AnswerCreated(answer),
                    Err(e) => failed("accept_offer", e),
                };
                events.complete(ticket, outcome).await;
            }

            ConnectionOp::ApplyAnswer { ticket, sdp } => {
                let outcome = match connection.set_remote_description(SdpKind::Answer, sdp).await {
                    Ok(()) => NegotiationOutcome::AnswerApplied,
                    Err(e) => failed("apply_answer", e),
                };
                events.complete(ticket, outcome).await;
            }

            ConnectionOp::AddCandidate(candidate) => {
                if let Err(e) = connection.add_ice_candidate(candidate).await {
                    warn!(peer = %events.peer_id(), "Failed to add ICE candidate: {e:#}");
                }
            }

            ConnectionOp::AddTrack(track) => {
                let id = track.id().clone();
                if let Err(e) = connection.add_track(track).await {
                    warn!(peer = %events.peer_id(), track = %id, "Failed to attach track: {e:#}");
                }
            }

            ConnectionOp::Close => break,
        }
    }

    if let Err(e) = connection.close().await {
        debug!(peer = %events.peer_id(), "Error while closing connection: {e:#}");
    }
    debug!(peer = %events.peer_id(), "session driver finished");
}

async fn accept_offer(connection: &dyn PeerConnection, sdp: String) -> anyhow::Result<String> {
    connection.set_remote_description(SdpKind::Offer, sdp).await?;
    connection.create_answer().await
}

fn failed(op: &'static str, error: anyhow::Error) -> NegotiationOutcome {
    NegotiationOutcome::Failed { op, error }
}

async fn fail_remaining(
    events: &EventSink,
    rx: &mut mpsc::UnboundedReceiver<ConnectionOp>,
    reason: String,
) {
    while let Some(op) = rx.recv().await {
        if matches!(op, ConnectionOp::Close) {
            break;
        }
        if let Some((ticket, name)) = op.ticket() {
            let error = anyhow::anyhow!("no connection: {reason}");
            events.complete(ticket, failed(name, error)).await;
        }
    }
}
