use huddle_core::ParticipantId;
use std::collections::HashSet;

/// Participants added to and removed from the roster by one update, sorted.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RosterDelta {
    pub joined: Vec<ParticipantId>,
    pub left: Vec<ParticipantId>,
}

impl RosterDelta {
    pub fn is_empty(&self) -> bool {
        self.joined.is_empty() && self.left.is_empty()
    }
}

/// Remote participants currently in the room. The local participant is never a member.
#[derive(Debug)]
pub struct MembershipTracker {
    local_id: ParticipantId,
    roster: HashSet<ParticipantId>,
}

impl MembershipTracker {
    pub fn new(local_id: ParticipantId) -> Self {
        Self {
            local_id,
            roster: HashSet::new(),
        }
    }

    /// Reconciles against an authoritative full roster.
    pub fn apply_roster<I>(&mut self, ids: I) -> RosterDelta
    where
        I: IntoIterator<Item = ParticipantId>,
    {
        let next: HashSet<ParticipantId> = ids
            .into_iter()
            .filter(|id| *id != self.local_id)
            .collect();

        let mut joined: Vec<ParticipantId> = next.difference(&self.roster).cloned().collect();
        let mut left: Vec<ParticipantId> = self.roster.difference(&next).cloned().collect();
        joined.sort();
        left.sort();

        self.roster = next;
        RosterDelta { joined, left }
    }

    /// Returns `true` if `id` is new to the roster.
    pub fn apply_join(&mut self, id: &ParticipantId) -> bool {
        if *id == self.local_id {
            return false;
        }
        self.roster.insert(id.clone())
    }

    /// Returns `true` if `id` was in the roster.
    pub fn apply_leave(&mut self, id: &ParticipantId) -> bool {
        self.roster.remove(id)
    }

    pub fn contains(&self, id: &ParticipantId) -> bool {
        self.roster.contains(id)
    }

    pub fn members(&self) -> Vec<ParticipantId> {
        let mut members: Vec<ParticipantId> = self.roster.iter().cloned().collect();
        members.sort();
        members
    }

    pub fn clear(&mut self) {
        self.roster.clear();
    }
}
