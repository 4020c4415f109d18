use crate::room::RoomHandle;
use crate::signaling::SignalingOutput;
use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use huddle_core::{ParticipantId, RoomEvent, RoomId, RoomRequest, SignalMessage};
use std::collections::BTreeSet;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

enum Inbound {
    Signal(SignalMessage),
    Event(RoomEvent),
}

struct HubInner {
    participants: DashMap<ParticipantId, mpsc::UnboundedSender<Inbound>>,
    rooms: DashMap<RoomId, BTreeSet<ParticipantId>>,
}

/// In-process signaling transport with the room semantics of a real server.
///
/// Messages to each participant are delivered in order through its own
/// unbounded queue, so a room loop never blocks on another one.
#[derive(Clone)]
pub struct LoopbackHub {
    inner: Arc<HubInner>,
}

impl Default for LoopbackHub {
    fn default() -> Self {
        Self::new()
    }
}

impl LoopbackHub {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(HubInner {
                participants: DashMap::new(),
                rooms: DashMap::new(),
            }),
        }
    }

    /// Outbound transport for `local_id`; stamps `from` on every message.
    pub fn signaling_for(&self, local_id: ParticipantId) -> Arc<LoopbackSignaling> {
        Arc::new(LoopbackSignaling {
            local_id,
            hub: self.clone(),
        })
    }

    /// Starts delivering inbound traffic addressed to the handle's participant.
    pub fn connect(&self, handle: RoomHandle) {
        let participant_id = handle.local_id().clone();
        let (tx, mut rx) = mpsc::unbounded_channel();
        self.inner.participants.insert(participant_id.clone(), tx);
        info!(participant = %participant_id, "participant connected to loopback hub");

        tokio::spawn(async move {
            while let Some(inbound) = rx.recv().await {
                let delivered = match inbound {
                    Inbound::Signal(msg) => handle.deliver_signal(msg).await,
                    Inbound::Event(event) => handle.deliver_event(event).await,
                };
                if delivered.is_err() {
                    debug!(participant = %participant_id, "room loop gone, delivery stopped");
                    break;
                }
            }
        });
    }

    /// Drops the participant from the hub and every room it was in.
    pub fn disconnect(&self, participant_id: &ParticipantId) {
        self.inner.participants.remove(participant_id);

        let rooms: Vec<RoomId> = self
            .inner
            .rooms
            .iter()
            .filter(|entry| entry.value().contains(participant_id))
            .map(|entry| entry.key().clone())
            .collect();
        for room_id in rooms {
            self.leave(participant_id, &room_id);
        }
        info!(participant = %participant_id, "participant disconnected from loopback hub");
    }

    /// Current members of `room_id`, sorted.
    pub fn members(&self, room_id: &RoomId) -> Vec<ParticipantId> {
        self.inner
            .rooms
            .get(room_id)
            .map(|members| members.iter().cloned().collect())
            .unwrap_or_default()
    }

    fn route(&self, msg: SignalMessage) {
        let to = msg.to.clone();
        if !self.deliver(&to, Inbound::Signal(msg)) {
            warn!("Attempted to send signal to disconnected participant {to}");
        }
    }

    fn handle_request(&self, from: &ParticipantId, request: RoomRequest) {
        match request {
            RoomRequest::CreateRoom(room_id) => self.create(from, room_id),
            RoomRequest::JoinRoom(room_id) => self.join(from, room_id),
            RoomRequest::LeaveRoom(room_id) => self.leave(from, &room_id),
        }
    }

    fn create(&self, from: &ParticipantId, room_id: RoomId) {
        let created = match self.inner.rooms.entry(room_id.clone()) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(BTreeSet::from([from.clone()]));
                true
            }
        };

        if !created {
            self.notify(from, RoomEvent::RoomError(format!("room {room_id} already exists")));
            return;
        }
        info!(room = %room_id, owner = %from, "room created");
        self.notify(from, RoomEvent::RoomCreated(room_id));
        self.notify(from, RoomEvent::RoomUsers(vec![from.clone()]));
    }

    fn join(&self, from: &ParticipantId, room_id: RoomId) {
        let roster: Option<Vec<ParticipantId>> =
            self.inner.rooms.get_mut(&room_id).map(|mut members| {
                members.insert(from.clone());
                members.iter().cloned().collect()
            });

        let Some(roster) = roster else {
            self.notify(from, RoomEvent::RoomError(format!("room {room_id} does not exist")));
            return;
        };
        info!(room = %room_id, participant = %from, members = roster.len(), "room joined");

        self.notify(from, RoomEvent::RoomJoined(room_id));
        for member in roster.iter().filter(|member| *member != from) {
            self.notify(member, RoomEvent::UserJoined(from.clone()));
        }
        self.notify(from, RoomEvent::RoomUsers(roster));
    }

    fn leave(&self, from: &ParticipantId, room_id: &RoomId) {
        let remaining: Option<Vec<ParticipantId>> =
            self.inner.rooms.get_mut(room_id).and_then(|mut members| {
                members
                    .remove(from)
                    .then(|| members.iter().cloned().collect())
            });
        let Some(remaining) = remaining else {
            return;
        };

        if remaining.is_empty() {
            self.inner
                .rooms
                .remove_if(room_id, |_, members| members.is_empty());
            debug!(room = %room_id, "room emptied and removed");
        }
        for member in &remaining {
            self.notify(member, RoomEvent::UserLeft(from.clone()));
        }
    }

    fn notify(&self, to: &ParticipantId, event: RoomEvent) {
        if !self.deliver(to, Inbound::Event(event)) {
            debug!(participant = %to, "room event for disconnected participant dropped");
        }
    }

    fn deliver(&self, to: &ParticipantId, inbound: Inbound) -> bool {
        self.inner
            .participants
            .get(to)
            .is_some_and(|tx| tx.send(inbound).is_ok())
    }
}

/// One participant's view of a [`LoopbackHub`].
pub struct LoopbackSignaling {
    local_id: ParticipantId,
    hub: LoopbackHub,
}

#[async_trait]
impl SignalingOutput for LoopbackSignaling {
    async fn send_message(&self, mut msg: SignalMessage) {
        msg.from = self.local_id.clone();
        self.hub.route(msg);
    }

    async fn send_request(&self, request: RoomRequest) {
        self.hub.handle_request(&self.local_id, request);
    }
}
