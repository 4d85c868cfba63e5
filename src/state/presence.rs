use indexmap::IndexMap;
use uuid::Uuid;

use crate::state::clock::TimestampMs;

/// Identifier allocated to every transport connection.
pub type ConnectionId = Uuid;

/// Liveness of a participant's transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresenceStatus {
    /// Transport is up.
    Connected,
    /// Transport dropped; the participant still counts until the heartbeat timeout expires.
    Disconnected {
        /// When the drop was noticed.
        since_ms: TimestampMs,
    },
}

/// A connection collaborating on a room.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Participant {
    /// Transport connection the participant joined through.
    pub connection_id: ConnectionId,
    /// User behind the connection, as reported on join.
    pub user_id: String,
    /// Join instant.
    pub joined_at_ms: TimestampMs,
    /// Transport liveness.
    pub status: PresenceStatus,
}

impl Participant {
    /// Build a freshly connected participant.
    pub fn new(connection_id: ConnectionId, user_id: impl Into<String>, now: TimestampMs) -> Self {
        Self {
            connection_id,
            user_id: user_id.into(),
            joined_at_ms: now,
            status: PresenceStatus::Connected,
        }
    }

    /// Whether the participant's transport is currently up.
    pub fn is_connected(&self) -> bool {
        matches!(self.status, PresenceStatus::Connected)
    }
}

/// Participants of one room, in join order.
///
/// Purely additive/subtractive: nothing here gates timer commands.
#[derive(Debug, Default)]
pub struct Presence {
    participants: IndexMap<ConnectionId, Participant>,
}

impl Presence {
    /// Add `participant`.
    ///
    /// A disconnected entry belonging to the same user is replaced rather than kept
    /// alongside, so a reload inside the heartbeat window does not change the count.
    /// Returns the connection id of the replaced entry.
    pub fn join(&mut self, participant: Participant) -> Option<ConnectionId> {
        let stale = self
            .participants
            .values()
            .find(|existing| {
                existing.user_id == participant.user_id && !existing.is_connected()
            })
            .map(|existing| existing.connection_id);

        if let Some(stale_id) = stale {
            self.participants.shift_remove(&stale_id);
        }

        self.participants
            .insert(participant.connection_id, participant);
        stale
    }

    /// Remove a participant regardless of its liveness.
    pub fn leave(&mut self, connection_id: &ConnectionId) -> Option<Participant> {
        self.participants.shift_remove(connection_id)
    }

    /// Flag a participant whose transport dropped. Returns `false` when unknown.
    pub fn mark_disconnected(&mut self, connection_id: &ConnectionId, now: TimestampMs) -> bool {
        match self.participants.get_mut(connection_id) {
            Some(participant) => {
                participant.status = PresenceStatus::Disconnected { since_ms: now };
                true
            }
            None => false,
        }
    }

    /// Remove a participant only if it is still disconnected.
    pub fn expire(&mut self, connection_id: &ConnectionId) -> Option<Participant> {
        let disconnected = self
            .participants
            .get(connection_id)
            .is_some_and(|participant| !participant.is_connected());
        if disconnected {
            self.participants.shift_remove(connection_id)
        } else {
            None
        }
    }

    /// Whether `connection_id` is part of the room.
    pub fn contains(&self, connection_id: &ConnectionId) -> bool {
        self.participants.contains_key(connection_id)
    }

    /// Number of participants, disconnected ones included.
    pub fn count(&self) -> usize {
        self.participants.len()
    }

    /// Whether the room has nobody left.
    pub fn is_empty(&self) -> bool {
        self.participants.is_empty()
    }

    /// Participants in join order.
    pub fn iter(&self) -> impl Iterator<Item = &Participant> {
        self.participants.values()
    }
}
