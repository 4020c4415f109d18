use crate::error::MeshError;
use crate::session::candidate_buffer::CandidateBuffer;
use crate::session::session_driver::{ConnectionOp, SessionDriver};
use crate::transport::{ConnectionFactory, EventSink, LocalTrack, SdpKind, Ticket, TransportEvent};
use huddle_core::{IceCandidate, ParticipantId, TrackId};
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use tokio::sync::mpsc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    HaveLocalOffer,
    HaveRemoteOffer,
    Stable,
    Closed,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Idle => "idle",
            SessionState::HaveLocalOffer => "have-local-offer",
            SessionState::HaveRemoteOffer => "have-remote-offer",
            SessionState::Stable => "stable",
            SessionState::Closed => "closed",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteDescriptionOutcome {
    /// Remote offer accepted; the answer arrives later under this ticket.
    AnswerPending(Ticket),
    /// Glare won locally: the remote offer is discarded and ours stands.
    OfferIgnored,
    /// Remote answer handed to the connection; the session turns stable
    /// once it reports success under this ticket.
    AnswerSubmitted(Ticket),
    /// Answer with no local offer outstanding.
    UnexpectedAnswer,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CandidateOutcome {
    Applied,
    Buffered,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub peer_id: ParticipantId,
    pub state: SessionState,
    pub pending_candidates: usize,
    pub attached_tracks: Vec<TrackId>,
    pub remote_description_applied: bool,
}

/// Negotiation with one remote participant.
///
/// Every connection call goes through the session driver in submission
/// order, so a candidate submitted after a remote description is always
/// applied after it. Results come back as [`TransportEvent`]s and are matched
/// against the current [`Ticket`]; anything stale is discarded.
pub struct NegotiationSession {
    peer_id: ParticipantId,
    serial: u64,
    initiator: bool,
    state: SessionState,
    epoch: u64,
    candidates: CandidateBuffer,
    attached_tracks: HashSet<TrackId>,
    remote_tracks: HashSet<TrackId>,
    remote_description_applied: bool,
    answer_submitted: bool,
    negotiated_once: bool,
    renegotiation_needed: bool,
    driver: SessionDriver,
}

impl NegotiationSession {
    pub(crate) fn open(
        local_id: &ParticipantId,
        peer_id: ParticipantId,
        serial: u64,
        factory: Arc<dyn ConnectionFactory>,
        events: mpsc::Sender<TransportEvent>,
    ) -> Self {
        let sink = EventSink::new(peer_id.clone(), serial, events);
        Self {
            initiator: local_id.initiates_with(&peer_id),
            peer_id,
            serial,
            state: SessionState::Idle,
            epoch: 0,
            candidates: CandidateBuffer::new(),
            attached_tracks: HashSet::new(),
            remote_tracks: HashSet::new(),
            remote_description_applied: false,
            answer_submitted: false,
            negotiated_once: false,
            renegotiation_needed: false,
            driver: SessionDriver::spawn(factory, sink),
        }
    }

    pub fn peer_id(&self) -> &ParticipantId {
        &self.peer_id
    }

    /// Unique per session object; distinguishes a re-created session for the same peer.
    pub fn serial(&self) -> u64 {
        self.serial
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// True when the local side sends the first offer and wins glare.
    pub fn is_initiator(&self) -> bool {
        self.initiator
    }

    pub fn is_closed(&self) -> bool {
        self.state == SessionState::Closed
    }

    pub fn pending_candidates(&self) -> usize {
        self.candidates.len()
    }

    pub fn attached_tracks(&self) -> &HashSet<TrackId> {
        &self.attached_tracks
    }

    pub fn remote_description_applied(&self) -> bool {
        self.remote_description_applied
    }

    /// Advisory only: an offer without local tracks is still valid.
    pub fn readiness(&self) -> Result<(), MeshError> {
        if self.attached_tracks.is_empty() {
            return Err(MeshError::NotReady(self.peer_id.clone()));
        }
        Ok(())
    }

    /// Starts a local offer. Returns `None` when a negotiation is already in
    /// flight; the offer is then retried once the session is stable.
    pub fn create_offer(&mut self) -> Result<Option<Ticket>, MeshError> {
        match self.state {
            SessionState::Closed => Err(MeshError::StaleSession(self.peer_id.clone())),
            SessionState::HaveLocalOffer | SessionState::HaveRemoteOffer => {
                self.renegotiation_needed = true;
                Ok(None)
            }
            SessionState::Idle | SessionState::Stable => {
                let ticket = self.next_ticket();
                self.state = SessionState::HaveLocalOffer;
                self.driver.submit(ConnectionOp::CreateOffer(ticket));
                Ok(Some(ticket))
            }
        }
    }

    pub fn apply_remote_description(
        &mut self,
        kind: SdpKind,
        sdp: String,
    ) -> Result<RemoteDescriptionOutcome, MeshError> {
        if self.is_closed() {
            return Err(MeshError::StaleSession(self.peer_id.clone()));
        }

        match (kind, self.state) {
            (SdpKind::Offer, SessionState::HaveLocalOffer)
                if self.initiator && !self.answer_submitted =>
            {
                Ok(RemoteDescriptionOutcome::OfferIgnored)
            }
            (SdpKind::Offer, current) => {
                // Once their answer is queued our offer is no longer pending.
                let rollback = current == SessionState::HaveLocalOffer && !self.answer_submitted;
                if rollback && self.negotiated_once {
                    // Our discarded renegotiation offer still has to go out.
                    self.renegotiation_needed = true;
                }
                let ticket = self.next_ticket();
                self.state = SessionState::HaveRemoteOffer;
                self.answer_submitted = false;
                self.driver.submit(ConnectionOp::AcceptOffer {
                    ticket,
                    sdp,
                    rollback,
                });
                self.remote_description_submitted();
                Ok(RemoteDescriptionOutcome::AnswerPending(ticket))
            }
            (SdpKind::Answer, SessionState::HaveLocalOffer) if !self.answer_submitted => {
                let ticket = self.next_ticket();
                self.answer_submitted = true;
                self.driver
                    .submit(ConnectionOp::ApplyAnswer { ticket, sdp });
                self.remote_description_submitted();
                Ok(RemoteDescriptionOutcome::AnswerSubmitted(ticket))
            }
            (SdpKind::Answer, _) => Ok(RemoteDescriptionOutcome::UnexpectedAnswer),
        }
    }

    pub fn apply_remote_candidate(
        &mut self,
        candidate: IceCandidate,
    ) -> Result<CandidateOutcome, MeshError> {
        if self.is_closed() {
            return Err(MeshError::StaleSession(self.peer_id.clone()));
        }
        if candidate.candidate.trim().is_empty() {
            return Err(MeshError::MalformedCandidate {
                peer: self.peer_id.clone(),
                reason: "empty candidate line".to_owned(),
            });
        }

        if self.remote_description_applied {
            self.driver.submit(ConnectionOp::AddCandidate(candidate));
            Ok(CandidateOutcome::Applied)
        } else {
            self.candidates.add(candidate);
            Ok(CandidateOutcome::Buffered)
        }
    }

    /// Attaches tracks not attached yet; returns how many were new.
    pub fn attach_local_tracks(&mut self, tracks: &[LocalTrack]) -> usize {
        if self.is_closed() {
            return 0;
        }
        let mut attached = 0;
        for track in tracks {
            if self.attached_tracks.insert(track.id().clone()) {
                self.driver.submit(ConnectionOp::AddTrack(track.clone()));
                attached += 1;
            }
        }
        attached
    }

    /// Releases the connection. Returns `false` if the session was already closed.
    pub fn close(&mut self) -> bool {
        if self.is_closed() {
            return false;
        }
        self.state = SessionState::Closed;
        self.candidates.clear();
        self.renegotiation_needed = false;
        self.driver.submit(ConnectionOp::Close);
        true
    }

    /// True if a created offer belongs to the current round and may be sent.
    pub(crate) fn offer_ready(&self, ticket: Ticket) -> bool {
        self.is_current(ticket) && self.state == SessionState::HaveLocalOffer
    }

    /// True if a created answer may be sent; the session becomes stable.
    pub(crate) fn answer_ready(&mut self, ticket: Ticket) -> bool {
        if !self.is_current(ticket) || self.state != SessionState::HaveRemoteOffer {
            return false;
        }
        self.enter_stable();
        true
    }

    /// True if the connection applied the remote answer for this round; the
    /// session becomes stable.
    pub(crate) fn answer_applied(&mut self, ticket: Ticket) -> bool {
        if !self.is_current(ticket)
            || self.state != SessionState::HaveLocalOffer
            || !self.answer_submitted
        {
            return false;
        }
        self.answer_submitted = false;
        self.enter_stable();
        true
    }

    /// Backs out of a round whose connection operation failed.
    pub(crate) fn negotiation_failed(&mut self, ticket: Ticket) -> bool {
        let in_flight = matches!(
            self.state,
            SessionState::HaveLocalOffer | SessionState::HaveRemoteOffer
        );
        if !self.is_current(ticket) || !in_flight {
            return false;
        }
        self.answer_submitted = false;
        if self.negotiated_once {
            self.state = SessionState::Stable;
        } else {
            // Nothing remote was ever applied; later candidates wait again.
            self.state = SessionState::Idle;
            self.remote_description_applied = false;
        }
        true
    }

    pub(crate) fn announce_remote_track(&mut self, track_id: &TrackId) -> bool {
        self.remote_tracks.insert(track_id.clone())
    }

    pub(crate) fn take_renegotiation(&mut self) -> bool {
        std::mem::take(&mut self.renegotiation_needed)
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let mut attached_tracks: Vec<TrackId> = self.attached_tracks.iter().cloned().collect();
        attached_tracks.sort();
        SessionSnapshot {
            peer_id: self.peer_id.clone(),
            state: self.state,
            pending_candidates: self.candidates.len(),
            attached_tracks,
            remote_description_applied: self.remote_description_applied,
        }
    }

    fn next_ticket(&mut self) -> Ticket {
        self.epoch += 1;
        self.current_ticket()
    }

    fn current_ticket(&self) -> Ticket {
        Ticket {
            session: self.serial,
            epoch: self.epoch,
        }
    }

    fn is_current(&self, ticket: Ticket) -> bool {
        ticket == self.current_ticket()
    }

    fn remote_description_submitted(&mut self) {
        self.remote_description_applied = true;
        let driver = &self.driver;
        self.candidates
            .drain_into(|candidate| driver.submit(ConnectionOp::AddCandidate(candidate)));
    }

    fn enter_stable(&mut self) {
        self.state = SessionState::Stable;
        self.negotiated_once = true;
    }
}
