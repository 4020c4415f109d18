use crate::session::negotiation_session::{NegotiationSession, SessionSnapshot};
use crate::transport::{ConnectionFactory, TransportEvent};
use huddle_core::ParticipantId;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::debug;

/// The single owner of every live [`NegotiationSession`] in a room.
///
/// Only the room loop touches it, so lookups and creations for the same peer
/// are serialized and at most one session exists per participant.
pub struct SessionRegistry {
    local_id: ParticipantId,
    sessions: HashMap<ParticipantId, NegotiationSession>,
    next_serial: u64,
    factory: Arc<dyn ConnectionFactory>,
    events: mpsc::Sender<TransportEvent>,
}

impl SessionRegistry {
    pub fn new(
        local_id: ParticipantId,
        factory: Arc<dyn ConnectionFactory>,
        events: mpsc::Sender<TransportEvent>,
    ) -> Self {
        Self {
            local_id,
            sessions: HashMap::new(),
            next_serial: 1,
            factory,
            events,
        }
    }

    /// Returns the session for `peer_id`, creating an idle one if absent.
    /// The flag is `true` when the session was created by this call.
    pub fn get_or_create(&mut self, peer_id: &ParticipantId) -> (&mut NegotiationSession, bool) {
        let mut created = false;
        let session = self.sessions.entry(peer_id.clone()).or_insert_with(|| {
            created = true;
            let serial = self.next_serial;
            self.next_serial += 1;
            debug!(peer = %peer_id, serial, "opening negotiation session");
            NegotiationSession::open(
                &self.local_id,
                peer_id.clone(),
                serial,
                self.factory.clone(),
                self.events.clone(),
            )
        });
        (session, created)
    }

    pub fn get(&self, peer_id: &ParticipantId) -> Option<&NegotiationSession> {
        self.sessions.get(peer_id)
    }

    pub fn get_mut(&mut self, peer_id: &ParticipantId) -> Option<&mut NegotiationSession> {
        self.sessions.get_mut(peer_id)
    }

    /// Like [`Self::get_mut`], but only if the session is the instance `serial` refers to.
    pub fn get_instance_mut(
        &mut self,
        peer_id: &ParticipantId,
        serial: u64,
    ) -> Option<&mut NegotiationSession> {
        self.sessions
            .get_mut(peer_id)
            .filter(|session| session.serial() == serial)
    }

    /// Closes and forgets the session. Returns `false` if there was none.
    pub fn remove(&mut self, peer_id: &ParticipantId) -> bool {
        let Some(mut session) = self.sessions.remove(peer_id) else {
            return false;
        };
        session.close();
        debug!(peer = %peer_id, serial = session.serial(), "session removed");
        true
    }

    /// Closes every session; returns the peers that had one.
    pub fn close_all(&mut self) -> Vec<ParticipantId> {
        let mut peers = Vec::with_capacity(self.sessions.len());
        for (peer_id, mut session) in self.sessions.drain() {
            session.close();
            peers.push(peer_id);
        }
        peers.sort();
        peers
    }

    pub fn peers(&self) -> Vec<ParticipantId> {
        let mut peers: Vec<ParticipantId> = self.sessions.keys().cloned().collect();
        peers.sort();
        peers
    }

    pub fn snapshot(&self) -> Vec<SessionSnapshot> {
        let mut sessions: Vec<SessionSnapshot> =
            self.sessions.values().map(NegotiationSession::snapshot).collect();
        sessions.sort_by(|a, b| a.peer_id.cmp(&b.peer_id));
        sessions
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
