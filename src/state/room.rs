use std::sync::Arc;

use tokio::{
    sync::{Mutex, OwnedMutexGuard, broadcast},
    task::JoinHandle,
};
use tracing::warn;

use crate::{
    dto::{common::RoomSnapshot, sse::RoomEvent, ws::ServerMessage},
    error::ServiceError,
    state::{
        clock::TimestampMs, hub::RoomHub, presence::Presence, timer::TimerMachine,
    },
};

/// In-memory state of one session's room.
pub struct Room {
    session_id: String,
    hub: RoomHub,
    inner: Arc<Mutex<RoomInner>>,
}

/// Mutable part of a [`Room`], only reachable through the room lock.
pub(super) struct RoomInner {
    pub(super) presence: Presence,
    pub(super) timer: TimerMachine,
    pub(super) drill_order: Vec<String>,
    pub(super) last_activity_ms: TimestampMs,
    /// Bumped on every join and on every transition to empty; a pending collection
    /// only proceeds when the epoch it was scheduled with is still current.
    pub(super) gc_epoch: u64,
    /// Set once the room was removed from the registry.
    pub(super) closed: bool,
    /// Scheduled natural completion of the running round.
    pub(super) expiry: Option<JoinHandle<()>>,
}

impl Room {
    pub(super) fn new(
        session_id: String,
        drill_order: Vec<String>,
        capacity: usize,
        now: TimestampMs,
    ) -> Self {
        Self {
            session_id,
            hub: RoomHub::new(capacity),
            inner: Arc::new(Mutex::new(RoomInner {
                presence: Presence::default(),
                timer: TimerMachine::new(),
                drill_order,
                last_activity_ms: now,
                gc_epoch: 0,
                closed: false,
                expiry: None,
            })),
        }
    }

    /// Session the room belongs to.
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub(super) async fn lock(&self) -> OwnedMutexGuard<RoomInner> {
        Arc::clone(&self.inner).lock_owned().await
    }

    pub(super) fn subscribe(&self) -> broadcast::Receiver<RoomEvent> {
        self.hub.subscribe()
    }

    /// Serialize `message` once and hand it to every subscriber.
    pub(super) fn broadcast(&self, message: &ServerMessage) {
        match RoomEvent::from_message(message) {
            Ok(event) => self.hub.broadcast(event),
            Err(err) => warn!(
                session_id = %self.session_id,
                event = message.event_name(),
                error = %err,
                "failed to serialize room event"
            ),
        }
    }

    pub(super) fn snapshot(&self, inner: &RoomInner) -> RoomSnapshot {
        RoomSnapshot {
            session_id: self.session_id.clone(),
            timer: (&inner.timer.state()).into(),
            participant_count: inner.presence.count(),
            drill_order: inner.drill_order.clone(),
        }
    }
}

impl RoomInner {
    /// Ensure `drill_index` points into the drill order, or is 0 when the order is empty.
    pub(super) fn check_drill_index(&self, drill_index: usize) -> Result<(), ServiceError> {
        let len = self.drill_order.len();
        let valid = if len == 0 {
            drill_index == 0
        } else {
            drill_index < len
        };
        if valid {
            Ok(())
        } else {
            Err(ServiceError::InvalidCommand(format!(
                "drill_index {drill_index} is out of range for {len} drills"
            )))
        }
    }
}
