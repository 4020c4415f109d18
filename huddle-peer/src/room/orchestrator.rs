use crate::error::MeshError;
use crate::room::membership::MembershipTracker;
use crate::room::room_command::{EnterMode, RoomCommand};
use crate::room::room_observer::RoomObserver;
use crate::room::snapshot::RoomSnapshot;
use crate::session::{CandidateOutcome, RemoteDescriptionOutcome, SessionRegistry, SessionState};
use crate::signaling::SignalingOutput;
use crate::transport::{
    ConnectionFactory, ConnectionSignal, LocalMedia, NegotiationOutcome, SdpKind, Ticket,
    TransportConfig, TransportEvent,
};
use huddle_core::{
    IceCandidate, ParticipantId, RoomEvent, RoomId, RoomRequest, SignalMessage, SignalPayload,
};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

struct CurrentRoom {
    id: RoomId,
    /// Set once the transport confirmed creation or join.
    active: bool,
}

/// Single owner of a participant's mesh state.
///
/// Every signaling message, room event, local command and connection result
/// is handled here one at a time, so no two events touch the same session
/// concurrently.
pub struct Orchestrator {
    local_id: ParticipantId,
    room: Option<CurrentRoom>,
    membership: MembershipTracker,
    registry: SessionRegistry,
    local_media: Option<LocalMedia>,
    command_rx: mpsc::Receiver<RoomCommand>,
    transport_rx: mpsc::Receiver<TransportEvent>,
    signaling: Arc<dyn SignalingOutput>,
    observer: Arc<dyn RoomObserver>,
}

impl Orchestrator {
    pub fn new(
        local_id: ParticipantId,
        config: &TransportConfig,
        factory: Arc<dyn ConnectionFactory>,
        command_rx: mpsc::Receiver<RoomCommand>,
        signaling: Arc<dyn SignalingOutput>,
        observer: Arc<dyn RoomObserver>,
    ) -> Self {
        let (transport_tx, transport_rx) = mpsc::channel(config.event_buffer.max(1));

        Self {
            membership: MembershipTracker::new(local_id.clone()),
            registry: SessionRegistry::new(local_id.clone(), factory, transport_tx),
            local_id,
            room: None,
            local_media: None,
            command_rx,
            transport_rx,
            signaling,
            observer,
        }
    }

    pub async fn run(mut self) {
        info!(local = %self.local_id, "Room event loop started");

        loop {
            tokio::select! {
                cmd = self.command_rx.recv() => {
                    match cmd {
                        Some(c) => self.handle_command(c).await,
                        None => {
                            info!("Command channel closed. Shutting down room.");
                            break;
                        }
                    }
                }

                evt = self.transport_rx.recv() => {
                    match evt {
                        Some(e) => self.handle_transport_event(e).await,
                        None => {
                            warn!("Transport channel closed unexpectedly");
                            break;
                        }
                    }
                }
            }
        }

        self.leave_room().await;
        info!(local = %self.local_id, "Room event loop finished");
    }

    async fn handle_command(&mut self, cmd: RoomCommand) {
        match cmd {
            RoomCommand::Signal(msg) => self.handle_signal(msg).await,

            RoomCommand::Room(event) => self.handle_room_event(event).await,

            RoomCommand::Enter {
                mode,
                room_id,
                media,
                reply,
            } => {
                self.enter_room(mode, room_id, media).await;
                let _ = reply.send(());
            }

            RoomCommand::SetLocalMedia(media) => self.install_local_media(media),

            RoomCommand::SetTrackEnabled {
                kind,
                enabled,
                reply,
            } => {
                let touched = self
                    .local_media
                    .as_ref()
                    .map_or(0, |media| media.set_enabled(kind, enabled));
                debug!(%kind, enabled, touched, "local tracks toggled");
                let _ = reply.send(touched);
            }

            RoomCommand::Leave { reply } => {
                self.leave_room().await;
                let _ = reply.send(());
            }

            RoomCommand::Snapshot(reply) => {
                let _ = reply.send(self.snapshot());
            }
        }
    }

    async fn enter_room(&mut self, mode: EnterMode, room_id: RoomId, media: LocalMedia) {
        if self.room.is_some() {
            self.leave_room().await;
        }

        info!(room = %room_id, ?mode, "entering room");
        self.room = Some(CurrentRoom {
            id: room_id.clone(),
            active: false,
        });
        self.install_local_media(media);

        let request = match mode {
            EnterMode::Create => RoomRequest::CreateRoom(room_id),
            EnterMode::Join => RoomRequest::JoinRoom(room_id),
        };
        self.signaling.send_request(request).await;
    }

    async fn leave_room(&mut self) {
        let closed = self.registry.close_all();
        self.membership.clear();
        self.local_media = None;

        let Some(room) = self.room.take() else {
            return;
        };
        info!(room = %room.id, sessions = closed.len(), "leaving room");
        self.signaling
            .send_request(RoomRequest::LeaveRoom(room.id))
            .await;
    }

    fn install_local_media(&mut self, media: LocalMedia) {
        let tracks = media.tracks().to_vec();
        info!(tracks = tracks.len(), "local media ready");
        self.local_media = Some(media);

        for peer_id in self.registry.peers() {
            let Some(session) = self.registry.get_mut(&peer_id) else {
                continue;
            };
            let attached = session.attach_local_tracks(&tracks);
            let offer = match session.state() {
                SessionState::Idle => session.is_initiator(),
                SessionState::Closed => false,
                // Stable renegotiates now, in-flight rounds flag a follow-up offer.
                _ => attached > 0,
            };
            if offer {
                self.start_offer(&peer_id);
            }
        }
    }

    /// Ensures a session for `peer_id` exists; a new one gets the local tracks.
    fn open_session(&mut self, peer_id: &ParticipantId) {
        let tracks = self
            .local_media
            .as_ref()
            .map(|media| media.tracks().to_vec())
            .unwrap_or_default();
        let (session, created) = self.registry.get_or_create(peer_id);
        if created {
            session.attach_local_tracks(&tracks);
        }
    }

    fn start_offer(&mut self, peer_id: &ParticipantId) {
        let Some(session) = self.registry.get_mut(peer_id) else {
            return;
        };
        if let Err(e) = session.readiness() {
            debug!(peer = %peer_id, "{e}; offering without media");
        }
        match session.create_offer() {
            Ok(Some(ticket)) => debug!(peer = %peer_id, epoch = ticket.epoch, "creating offer"),
            Ok(None) => debug!(peer = %peer_id, "negotiation in flight, offer deferred"),
            Err(e) => warn!(peer = %peer_id, "cannot offer: {e}"),
        }
    }

    async fn peer_joined(&mut self, peer_id: ParticipantId, initiate: bool) {
        self.open_session(&peer_id);
        info!(peer = %peer_id, "participant joined");
        self.observer.on_peer_joined(peer_id.clone()).await;

        let should_offer = initiate
            && self.local_media.is_some()
            && self
                .registry
                .get(&peer_id)
                .is_some_and(|s| s.is_initiator() && s.state() == SessionState::Idle);
        if should_offer {
            self.start_offer(&peer_id);
        }
    }

    async fn peer_left(&mut self, peer_id: ParticipantId) {
        if self.registry.remove(&peer_id) {
            info!(peer = %peer_id, "participant left, session closed");
        }
        self.observer.on_peer_left(peer_id).await;
    }

    async fn session_stable(&mut self, peer_id: &ParticipantId) {
        info!(peer = %peer_id, "session stable");
        self.observer.on_session_stable(peer_id.clone()).await;

        let renegotiate = self
            .registry
            .get_mut(peer_id)
            .is_some_and(|session| session.take_renegotiation());
        if renegotiate {
            debug!(peer = %peer_id, "sending deferred offer");
            self.start_offer(peer_id);
        }
    }

    async fn handle_room_event(&mut self, event: RoomEvent) {
        match event {
            RoomEvent::RoomCreated(room_id) | RoomEvent::RoomJoined(room_id) => {
                let Some(room) = self.room.as_mut().filter(|room| room.id == room_id) else {
                    warn!(room = %room_id, "confirmation for a room we are not entering");
                    return;
                };
                if room.active {
                    return;
                }
                room.active = true;
                info!(room = %room_id, "room entered");
                self.observer.on_room_entered(room_id).await;
            }

            RoomEvent::RoomUsers(users) => {
                if self.room.is_none() {
                    debug!("roster received outside a room, ignored");
                    return;
                }
                let delta = self.membership.apply_roster(users);
                for peer_id in delta.left {
                    self.peer_left(peer_id).await;
                }
                for peer_id in delta.joined {
                    self.peer_joined(peer_id, true).await;
                }
            }

            RoomEvent::UserJoined(peer_id) => {
                if self.room.is_none() {
                    return;
                }
                if self.membership.apply_join(&peer_id) {
                    self.peer_joined(peer_id, true).await;
                } else {
                    debug!(peer = %peer_id, "join for known participant ignored");
                }
            }

            RoomEvent::UserLeft(peer_id) => {
                if self.membership.apply_leave(&peer_id) {
                    self.peer_left(peer_id).await;
                } else {
                    debug!(peer = %peer_id, "leave for unknown participant ignored");
                }
            }

            RoomEvent::RoomError(message) => {
                warn!("room error: {message}");
                if self.room.as_ref().is_some_and(|room| !room.active) {
                    // The create or join was refused; nothing was negotiated yet.
                    self.room = None;
                    self.local_media = None;
                    self.membership.clear();
                    self.registry.close_all();
                }
                self.observer.on_room_error(message).await;
            }
        }
    }

    async fn handle_signal(&mut self, msg: SignalMessage) {
        if msg.to != self.local_id {
            warn!(to = %msg.to, kind = msg.kind(), "signal addressed to another participant dropped");
            return;
        }
        let Some(room) = &self.room else {
            debug!(from = %msg.from, kind = msg.kind(), "signal outside a room dropped");
            return;
        };
        if room.id != msg.room_id {
            warn!(room = %msg.room_id, "signal for another room dropped");
            return;
        }

        let SignalMessage { payload, from, .. } = msg;
        if from == self.local_id {
            return;
        }
        match payload {
            SignalPayload::Offer { sdp } => self.handle_offer(from, sdp).await,
            SignalPayload::Answer { sdp } => self.handle_answer(from, sdp),
            SignalPayload::Candidate { candidate } => self.handle_candidate(from, candidate),
        }
    }

    async fn handle_offer(&mut self, from: ParticipantId, sdp: String) {
        // An offer may overtake the roster update that announces its sender.
        if self.membership.apply_join(&from) {
            self.peer_joined(from.clone(), false).await;
        }
        self.open_session(&from);

        let Some(session) = self.registry.get_mut(&from) else {
            return;
        };
        match session.apply_remote_description(SdpKind::Offer, sdp) {
            Ok(RemoteDescriptionOutcome::AnswerPending(ticket)) => {
                debug!(peer = %from, epoch = ticket.epoch, "remote offer accepted, answering")
            }
            Ok(RemoteDescriptionOutcome::OfferIgnored) => {
                info!(peer = %from, "offer collision, keeping local offer")
            }
            Ok(_) => {}
            Err(e) => debug!(peer = %from, "offer dropped: {e}"),
        }
    }

    fn handle_answer(&mut self, from: ParticipantId, sdp: String) {
        let Some(session) = self.registry.get_mut(&from) else {
            warn!("answer dropped: {}", MeshError::UnknownPeer(from));
            return;
        };
        match session.apply_remote_description(SdpKind::Answer, sdp) {
            Ok(RemoteDescriptionOutcome::AnswerSubmitted(ticket)) => {
                debug!(peer = %from, epoch = ticket.epoch, "applying remote answer")
            }
            Ok(RemoteDescriptionOutcome::UnexpectedAnswer) => {
                warn!(peer = %from, state = %session.state(), "answer without outstanding offer dropped")
            }
            Ok(_) => {}
            Err(e) => debug!(peer = %from, "answer dropped: {e}"),
        }
    }

    fn handle_candidate(&mut self, from: ParticipantId, candidate: IceCandidate) {
        let Some(session) = self.registry.get_mut(&from) else {
            warn!("candidate dropped: {}", MeshError::UnknownPeer(from));
            return;
        };
        match session.apply_remote_candidate(candidate) {
            Ok(CandidateOutcome::Applied) => {}
            Ok(CandidateOutcome::Buffered) => {
                debug!(peer = %from, pending = session.pending_candidates(), "candidate buffered")
            }
            Err(e @ MeshError::MalformedCandidate { .. }) => warn!("{e}"),
            Err(e) => debug!("candidate dropped: {e}"),
        }
    }

    async fn handle_transport_event(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::Negotiation {
                peer_id,
                ticket,
                outcome,
            } => self.handle_negotiation(peer_id, ticket, outcome).await,

            TransportEvent::Connection {
                peer_id,
                session,
                signal,
            } => self.handle_connection_signal(peer_id, session, signal).await,
        }
    }

    async fn handle_negotiation(
        &mut self,
        peer_id: ParticipantId,
        ticket: Ticket,
        outcome: NegotiationOutcome,
    ) {
        let Some(room_id) = self.room.as_ref().map(|room| room.id.clone()) else {
            return;
        };
        let Some(session) = self.registry.get_instance_mut(&peer_id, ticket.session) else {
            debug!(peer = %peer_id, "result for a closed session discarded");
            return;
        };

        match outcome {
            NegotiationOutcome::OfferCreated(sdp) => {
                if !session.offer_ready(ticket) {
                    debug!(peer = %peer_id, epoch = ticket.epoch, "superseded offer discarded");
                    return;
                }
                let msg = SignalMessage::offer(self.local_id.clone(), peer_id, room_id, sdp);
                self.signaling.send_message(msg).await;
            }

            NegotiationOutcome::AnswerCreated(sdp) => {
                if !session.answer_ready(ticket) {
                    debug!(peer = %peer_id, epoch = ticket.epoch, "superseded answer discarded");
                    return;
                }
                let msg =
                    SignalMessage::answer(self.local_id.clone(), peer_id.clone(), room_id, sdp);
                self.signaling.send_message(msg).await;
                self.session_stable(&peer_id).await;
            }

            NegotiationOutcome::AnswerApplied => {
                if !session.answer_applied(ticket) {
                    debug!(peer = %peer_id, epoch = ticket.epoch, "superseded answer result discarded");
                    return;
                }
                debug!(peer = %peer_id, "remote answer applied");
                self.session_stable(&peer_id).await;
            }

            NegotiationOutcome::Failed { op, error } => {
                let failed = session.negotiation_failed(ticket);
                let err = MeshError::Connection {
                    peer: peer_id.clone(),
                    source: error,
                };
                warn!(op, "{err}");
                if failed {
                    debug!(peer = %peer_id, state = %session.state(), "negotiation round abandoned");
                }
            }
        }
    }

    async fn handle_connection_signal(
        &mut self,
        peer_id: ParticipantId,
        serial: u64,
        signal: ConnectionSignal,
    ) {
        let Some(room_id) = self.room.as_ref().map(|room| room.id.clone()) else {
            return;
        };
        let Some(session) = self.registry.get_instance_mut(&peer_id, serial) else {
            return;
        };

        match signal {
            ConnectionSignal::CandidateGenerated(candidate) => {
                let msg =
                    SignalMessage::candidate(self.local_id.clone(), peer_id, room_id, candidate);
                self.signaling.send_message(msg).await;
            }

            ConnectionSignal::RemoteTrack(track) => {
                if !session.announce_remote_track(&track.track_id) {
                    return;
                }
                info!(peer = %peer_id, track = %track.track_id, kind = %track.kind, "remote track");
                self.observer.on_remote_track(peer_id, track).await;
            }

            ConnectionSignal::StateChanged(state) => {
                debug!(peer = %peer_id, ?state, "connection state changed");
                self.observer.on_connection_state(peer_id, state).await;
            }
        }
    }

    fn snapshot(&self) -> RoomSnapshot {
        let mut local_tracks: Vec<_> = self
            .local_media
            .as_ref()
            .map(LocalMedia::track_ids)
            .unwrap_or_default()
            .into_iter()
            .collect();
        local_tracks.sort();

        RoomSnapshot {
            local_id: self.local_id.clone(),
            room_id: self.room.as_ref().map(|room| room.id.clone()),
            active: self.room.as_ref().is_some_and(|room| room.active),
            roster: self.membership.members(),
            local_tracks,
            sessions: self.registry.snapshot(),
        }
    }
}
