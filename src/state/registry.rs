use std::{sync::Arc, time::Duration};

use dashmap::{DashMap, mapref::entry::Entry};
use tokio::{
    sync::{OwnedMutexGuard, broadcast},
    time::sleep,
};
use tracing::{debug, info, warn};

use crate::{
    dao::session_directory::SessionDirectory,
    dto::{
        common::{ParticipantSummary, RoomSnapshot, SessionStatusResponse},
        sse::RoomEvent,
        ws::ServerMessage,
    },
    error::ServiceError,
    state::{
        clock::Clock,
        presence::{ConnectionId, Participant},
        room::{Room, RoomInner},
        timer::{TimerCommand, TimerPhase, TimerState},
    },
};

/// Timing knobs of the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegistrySettings {
    /// How long a dropped participant keeps counting before it is removed.
    pub heartbeat_timeout: Duration,
    /// How long an empty room survives before it is collected.
    pub room_gc_grace: Duration,
    /// Per-room broadcast buffer.
    pub broadcast_capacity: usize,
}

impl Default for RegistrySettings {
    fn default() -> Self {
        Self {
            heartbeat_timeout: Duration::from_secs(30),
            room_gc_grace: Duration::from_secs(300),
            broadcast_capacity: 64,
        }
    }
}

/// Snapshot handed to a joiner or observer together with its live event feed.
#[derive(Debug)]
pub struct Subscription {
    pub snapshot: RoomSnapshot,
    pub receiver: broadcast::Receiver<RoomEvent>,
}

/// Maps session ids to live rooms.
///
/// Rooms are created lazily from the session directory and collected once they
/// stayed empty for [`RegistrySettings::room_gc_grace`]. Every mutation of a room
/// happens under that room's lock and broadcasts before releasing it, so the
/// broadcast order of a room is its `seq` order.
pub struct RoomRegistry {
    rooms: DashMap<String, Arc<Room>>,
    clock: Arc<dyn Clock>,
    directory: Arc<dyn SessionDirectory>,
    settings: RegistrySettings,
}

impl RoomRegistry {
    /// Build an empty registry.
    pub fn new(
        clock: Arc<dyn Clock>,
        directory: Arc<dyn SessionDirectory>,
        settings: RegistrySettings,
    ) -> Arc<Self> {
        Arc::new(Self {
            rooms: DashMap::new(),
            clock,
            directory,
            settings,
        })
    }

    /// Number of live rooms.
    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    /// Whether a room currently exists for `session_id`.
    pub fn contains(&self, session_id: &str) -> bool {
        self.rooms.contains_key(session_id)
    }

    /// Add `connection_id` to the room of `session_id`, creating the room if needed.
    ///
    /// Everyone already in the room is told about the join before the joiner is
    /// subscribed, so the returned snapshot is never older than its event feed.
    /// Joining again on the same connection only refreshes the snapshot.
    pub async fn join(
        self: &Arc<Self>,
        session_id: &str,
        connection_id: ConnectionId,
        user_id: &str,
    ) -> Result<Subscription, ServiceError> {
        let (room, mut inner) = self.open_room(session_id).await?;
        let now = self.clock.now_ms();

        if !inner.presence.contains(&connection_id) {
            let replaced = inner
                .presence
                .join(Participant::new(connection_id, user_id, now));
            inner.gc_epoch += 1;
            if let Some(stale) = replaced {
                debug!(
                    session_id,
                    %connection_id,
                    stale_connection_id = %stale,
                    "replaced disconnected participant of the same user"
                );
            }
            room.broadcast(&ServerMessage::Joined {
                participant_count: inner.presence.count(),
            });
            info!(
                session_id,
                %connection_id,
                user_id,
                participants = inner.presence.count(),
                "participant joined"
            );
        }

        inner.last_activity_ms = now;
        let receiver = room.subscribe();
        Ok(Subscription {
            snapshot: room.snapshot(&inner),
            receiver,
        })
    }

    /// Remove `connection_id` from the room right away.
    pub async fn leave(
        self: &Arc<Self>,
        session_id: &str,
        connection_id: ConnectionId,
    ) -> Result<usize, ServiceError> {
        let not_joined = || {
            ServiceError::InvalidCommand(format!(
                "connection is not part of session `{session_id}`"
            ))
        };

        let room = self.existing_room(session_id).ok_or_else(not_joined)?;
        let mut inner = room.lock().await;
        if inner.closed || inner.presence.leave(&connection_id).is_none() {
            return Err(not_joined());
        }

        info!(session_id, %connection_id, "participant left");
        Ok(self.after_departure(&room, &mut inner))
    }

    /// Flag a participant whose transport dropped and remove it once the
    /// heartbeat timeout passes without a rejoin.
    pub async fn disconnect(self: &Arc<Self>, session_id: &str, connection_id: ConnectionId) {
        let Some(room) = self.existing_room(session_id) else {
            return;
        };
        let mut inner = room.lock().await;
        if inner.closed
            || !inner
                .presence
                .mark_disconnected(&connection_id, self.clock.now_ms())
        {
            return;
        }
        drop(inner);

        info!(
            session_id,
            %connection_id,
            timeout_ms = self.settings.heartbeat_timeout.as_millis() as u64,
            "participant transport dropped"
        );

        let registry = Arc::clone(self);
        let timeout = self.settings.heartbeat_timeout;
        tokio::spawn(async move {
            sleep(timeout).await;
            registry.expire_participant(&room, connection_id).await;
        });
    }

    /// Apply a timer command and broadcast the resulting canonical state.
    pub async fn apply(
        self: &Arc<Self>,
        session_id: &str,
        command: TimerCommand,
    ) -> Result<TimerState, ServiceError> {
        let (room, mut inner) = self.open_room(session_id).await?;

        if let TimerCommand::Start { drill_index, .. } | TimerCommand::SetDrill { drill_index } =
            command
        {
            inner.check_drill_index(drill_index)?;
        }

        let now = self.clock.now_ms();
        let state = inner.timer.apply(command, now)?;
        inner.last_activity_ms = now;

        room.broadcast(&ServerMessage::for_transition(
            command == TimerCommand::Stop,
            &state,
        ));
        self.schedule_elapse(&room, &mut inner, &state);

        info!(
            session_id,
            command = command.name(),
            seq = state.seq,
            phase = ?state.phase,
            "timer command applied"
        );
        Ok(state)
    }

    /// Forward an opaque relay message to everyone in the room.
    pub async fn relay(
        self: &Arc<Self>,
        session_id: &str,
        message: ServerMessage,
    ) -> Result<(), ServiceError> {
        let (room, mut inner) = self.open_room(session_id).await?;
        inner.last_activity_ms = self.clock.now_ms();
        room.broadcast(&message);
        debug!(session_id, event = message.event_name(), "relayed room message");
        Ok(())
    }

    /// Subscribe a read-only observer. Observers do not count as participants.
    pub async fn observe(self: &Arc<Self>, session_id: &str) -> Result<Subscription, ServiceError> {
        let (room, inner) = self.open_room(session_id).await?;
        let receiver = room.subscribe();
        Ok(Subscription {
            snapshot: room.snapshot(&inner),
            receiver,
        })
    }

    /// Current state of `session_id` without creating a room.
    ///
    /// A session known to the directory but without a live room reports an idle timer.
    pub async fn status(&self, session_id: &str) -> Result<SessionStatusResponse, ServiceError> {
        if let Some(room) = self.existing_room(session_id) {
            let inner = room.lock().await;
            if !inner.closed {
                return Ok(SessionStatusResponse {
                    snapshot: room.snapshot(&inner),
                    participants: inner.presence.iter().map(ParticipantSummary::from).collect(),
                });
            }
        }

        let drill_order = self
            .directory
            .drill_order(session_id.to_string())
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("session `{session_id}` not found")))?;

        Ok(SessionStatusResponse {
            snapshot: RoomSnapshot {
                session_id: session_id.to_string(),
                timer: (&TimerState::default()).into(),
                participant_count: 0,
                drill_order,
            },
            participants: Vec::new(),
        })
    }

    fn existing_room(&self, session_id: &str) -> Option<Arc<Room>> {
        self.rooms.get(session_id).map(|entry| Arc::clone(entry.value()))
    }

    /// Find or create the room of `session_id`.
    async fn resolve(self: &Arc<Self>, session_id: &str) -> Result<Arc<Room>, ServiceError> {
        if let Some(room) = self.existing_room(session_id) {
            return Ok(room);
        }

        let drill_order = self
            .directory
            .drill_order(session_id.to_string())
            .await?
            .ok_or_else(|| ServiceError::UnknownSession(session_id.to_string()))?;

        let drills = drill_order.len();
        let room = match self.rooms.entry(session_id.to_string()) {
            Entry::Occupied(entry) => return Ok(Arc::clone(entry.get())),
            Entry::Vacant(entry) => {
                let room = Arc::new(Room::new(
                    session_id.to_string(),
                    drill_order,
                    self.settings.broadcast_capacity,
                    self.clock.now_ms(),
                ));
                entry.insert(Arc::clone(&room));
                room
            }
        };

        info!(session_id, drills, "room created");
        // Covers rooms opened by a command or an observer that nobody ever joins.
        self.schedule_gc(&room, 0);
        Ok(room)
    }

    /// Lock the live room of `session_id`, retrying when it was collected meanwhile.
    async fn open_room(
        self: &Arc<Self>,
        session_id: &str,
    ) -> Result<(Arc<Room>, OwnedMutexGuard<RoomInner>), ServiceError> {
        loop {
            let room = self.resolve(session_id).await?;
            let inner = room.lock().await;
            if !inner.closed {
                return Ok((room, inner));
            }
            debug!(session_id, "room was collected while waiting; retrying");
        }
    }

    /// Broadcast the new count after a departure and arm collection when empty.
    fn after_departure(self: &Arc<Self>, room: &Arc<Room>, inner: &mut RoomInner) -> usize {
        let participant_count = inner.presence.count();
        inner.last_activity_ms = self.clock.now_ms();
        room.broadcast(&ServerMessage::Left { participant_count });

        if participant_count == 0 {
            inner.gc_epoch += 1;
            self.schedule_gc(room, inner.gc_epoch);
        }
        participant_count
    }

    async fn expire_participant(self: &Arc<Self>, room: &Arc<Room>, connection_id: ConnectionId) {
        let mut inner = room.lock().await;
        if inner.closed {
            return;
        }
        if inner.presence.expire(&connection_id).is_some() {
            info!(
                session_id = room.session_id(),
                %connection_id,
                "participant heartbeat timed out"
            );
            self.after_departure(room, &mut inner);
        }
    }

    fn schedule_gc(self: &Arc<Self>, room: &Arc<Room>, epoch: u64) {
        let registry = Arc::clone(self);
        let room = Arc::clone(room);
        let grace = self.settings.room_gc_grace;
        tokio::spawn(async move {
            sleep(grace).await;
            registry.collect(&room, epoch).await;
        });
    }

    async fn collect(&self, room: &Arc<Room>, epoch: u64) {
        let mut inner = room.lock().await;
        if inner.closed || inner.gc_epoch != epoch || !inner.presence.is_empty() {
            return;
        }

        inner.closed = true;
        if let Some(expiry) = inner.expiry.take() {
            expiry.abort();
        }
        self.rooms
            .remove_if(room.session_id(), |_, current| Arc::ptr_eq(current, room));

        info!(
            session_id = room.session_id(),
            idle_ms = self.clock.now_ms().saturating_sub(inner.last_activity_ms),
            "empty room collected"
        );
    }

    /// Replace the pending natural completion with one matching `state`.
    fn schedule_elapse(self: &Arc<Self>, room: &Arc<Room>, inner: &mut RoomInner, state: &TimerState) {
        if let Some(previous) = inner.expiry.take() {
            previous.abort();
        }
        let Some(deadline) = state.deadline_ms() else {
            return;
        };

        let delay = Duration::from_millis(deadline.saturating_sub(self.clock.now_ms()));
        let registry = Arc::clone(self);
        let task_room = Arc::clone(room);
        let seq = state.seq;
        inner.expiry = Some(tokio::spawn(async move {
            sleep(delay).await;
            registry.elapse(&task_room, seq).await;
        }));
    }

    async fn elapse(self: &Arc<Self>, room: &Arc<Room>, seq: u64) {
        let mut inner = room.lock().await;
        if inner.closed || inner.timer.seq() != seq {
            return;
        }
        // The handle belongs to this task; dropping it detaches without aborting.
        inner.expiry.take();

        match inner.timer.apply(TimerCommand::Elapse, self.clock.now_ms()) {
            Ok(state) => {
                room.broadcast(&ServerMessage::for_transition(false, &state));
                info!(
                    session_id = room.session_id(),
                    seq = state.seq,
                    "round elapsed"
                );
            }
            Err(err) => {
                let state = inner.timer.state();
                if matches!(state.phase, TimerPhase::Running { .. }) {
                    // Timer woke up before the room clock reached the deadline.
                    self.schedule_elapse(room, &mut inner, &state);
                } else {
                    warn!(session_id = room.session_id(), error = %err, "elapse skipped");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        dao::session_directory::memory::InMemoryDirectory, dto::phase::VisibleTimerPhase,
        state::clock::ManualClock,
    };
    use uuid::Uuid;

    const T0: u64 = 1_000_000;

    fn registry(clock: Arc<ManualClock>) -> Arc<RoomRegistry> {
        let directory = InMemoryDirectory::new();
        directory.insert_session("sess-42", vec!["warmup".into(), "rondo".into(), "sprints".into()]);
        directory.insert_session("empty", Vec::new());
        RoomRegistry::new(
            clock,
            Arc::new(directory),
            RegistrySettings {
                heartbeat_timeout: Duration::from_secs(30),
                room_gc_grace: Duration::from_secs(60),
                broadcast_capacity: 16,
            },
        )
    }

    fn next_message(receiver: &mut broadcast::Receiver<RoomEvent>) -> ServerMessage {
        receiver.try_recv().unwrap().message().unwrap()
    }

    #[tokio::test]
    async fn join_broadcasts_to_existing_participants_only() {
        let registry = registry(Arc::new(ManualClock::new(T0)));
        let mut first = registry.join("sess-42", Uuid::new_v4(), "coach").await.unwrap();
        assert_eq!(first.snapshot.participant_count, 1);
        assert_eq!(first.snapshot.drill_order.len(), 3);

        let mut second = registry.join("sess-42", Uuid::new_v4(), "wall").await.unwrap();
        assert_eq!(second.snapshot.participant_count, 2);
        assert_eq!(
            next_message(&mut first.receiver),
            ServerMessage::Joined {
                participant_count: 2
            }
        );
        assert!(second.receiver.try_recv().is_err());
        assert!(first.receiver.try_recv().is_err());
    }

    #[tokio::test]
    async fn unknown_sessions_are_rejected() {
        let registry = registry(Arc::new(ManualClock::new(T0)));
        let err = registry.join("nope", Uuid::new_v4(), "coach").await.unwrap_err();
        assert!(matches!(err, ServiceError::UnknownSession(id) if id == "nope"));
        assert_eq!(registry.room_count(), 0);

        let err = registry.apply("nope", TimerCommand::Stop).await.unwrap_err();
        assert!(matches!(err, ServiceError::UnknownSession(_)));
    }

    #[tokio::test]
    async fn rejoin_on_same_connection_is_idempotent() {
        let registry = registry(Arc::new(ManualClock::new(T0)));
        let id = Uuid::new_v4();
        let mut first = registry.join("sess-42", id, "coach").await.unwrap();
        let again = registry.join("sess-42", id, "coach").await.unwrap();
        assert_eq!(again.snapshot.participant_count, 1);
        assert!(first.receiver.try_recv().is_err());
    }

    #[tokio::test]
    async fn commands_are_broadcast_to_the_issuer_too() {
        let clock = Arc::new(ManualClock::new(T0));
        let registry = registry(clock.clone());
        let mut sub = registry.join("sess-42", Uuid::new_v4(), "coach").await.unwrap();

        let state = registry
            .apply(
                "sess-42",
                TimerCommand::Start {
                    duration_ms: 300_000,
                    drill_index: 0,
                },
            )
            .await
            .unwrap();
        assert_eq!(state.seq, 1);

        match next_message(&mut sub.receiver) {
            ServerMessage::State(timer) => {
                assert_eq!(timer.phase, VisibleTimerPhase::Running);
                assert_eq!(timer.started_at_ms, Some(T0));
                assert_eq!(timer.seq, 1);
            }
            other => panic!("unexpected {other:?}"),
        }

        registry.apply("sess-42", TimerCommand::Stop).await.unwrap();
        assert_eq!(
            next_message(&mut sub.receiver),
            ServerMessage::Stopped {
                seq: 2,
                drill_index: 0
            }
        );
    }

    #[tokio::test]
    async fn rejected_commands_leave_state_and_stream_untouched() {
        let registry = registry(Arc::new(ManualClock::new(T0)));
        let mut sub = registry.join("sess-42", Uuid::new_v4(), "coach").await.unwrap();

        let err = registry.apply("sess-42", TimerCommand::Pause).await.unwrap_err();
        assert!(matches!(err, ServiceError::RejectedTransition(_)));

        let err = registry
            .apply("sess-42", TimerCommand::SetDrill { drill_index: 3 })
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidCommand(_)));

        assert!(sub.receiver.try_recv().is_err());
        let status = registry.status("sess-42").await.unwrap();
        assert_eq!(status.snapshot.timer.seq, 0);
    }

    #[tokio::test]
    async fn empty_drill_order_accepts_index_zero_only() {
        let registry = registry(Arc::new(ManualClock::new(T0)));
        let start = |drill_index| TimerCommand::Start {
            duration_ms: 60_000,
            drill_index,
        };
        assert!(registry.apply("empty", start(1)).await.is_err());
        assert!(registry.apply("empty", start(0)).await.is_ok());
    }

    #[tokio::test]
    async fn leave_requires_membership() {
        let registry = registry(Arc::new(ManualClock::new(T0)));
        let err = registry.leave("sess-42", Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, ServiceError::InvalidCommand(_)));

        let id = Uuid::new_v4();
        let mut watcher = registry.join("sess-42", Uuid::new_v4(), "wall").await.unwrap();
        registry.join("sess-42", id, "coach").await.unwrap();
        assert_eq!(registry.leave("sess-42", id).await.unwrap(), 1);

        assert!(matches!(
            next_message(&mut watcher.receiver),
            ServerMessage::Joined { .. }
        ));
        assert_eq!(
            next_message(&mut watcher.receiver),
            ServerMessage::Left {
                participant_count: 1
            }
        );
    }

    #[tokio::test]
    async fn status_of_a_known_session_without_room_is_idle() {
        let registry = registry(Arc::new(ManualClock::new(T0)));
        let status = registry.status("sess-42").await.unwrap();
        assert_eq!(status.snapshot.timer.phase, VisibleTimerPhase::Idle);
        assert_eq!(status.snapshot.participant_count, 0);
        assert_eq!(registry.room_count(), 0);

        assert!(matches!(
            registry.status("nope").await,
            Err(ServiceError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn observers_do_not_count_as_participants() {
        let registry = registry(Arc::new(ManualClock::new(T0)));
        let mut observer = registry.observe("sess-42").await.unwrap();
        assert_eq!(observer.snapshot.participant_count, 0);

        registry.join("sess-42", Uuid::new_v4(), "coach").await.unwrap();
        assert_eq!(
            next_message(&mut observer.receiver),
            ServerMessage::Joined {
                participant_count: 1
            }
        );
    }

    #[tokio::test]
    async fn relays_do_not_touch_seq() {
        let registry = registry(Arc::new(ManualClock::new(T0)));
        let mut sub = registry.join("sess-42", Uuid::new_v4(), "coach").await.unwrap();
        let update = ServerMessage::NoteUpdate {
            drill_id: "rondo".into(),
            text: "keep it tight".into(),
        };
        registry.relay("sess-42", update.clone()).await.unwrap();

        assert_eq!(next_message(&mut sub.receiver), update);
        assert_eq!(registry.status("sess-42").await.unwrap().snapshot.timer.seq, 0);
    }

    #[tokio::test]
    async fn join_waiting_on_a_collected_room_lands_in_a_fresh_one() {
        let registry = registry(Arc::new(ManualClock::new(T0)));
        registry
            .apply("sess-42", TimerCommand::SetDrill { drill_index: 2 })
            .await
            .unwrap();

        let stale = registry.existing_room("sess-42").unwrap();
        let mut guard = stale.lock().await;
        let joining = tokio::spawn({
            let registry = Arc::clone(&registry);
            async move { registry.join("sess-42", Uuid::new_v4(), "coach").await }
        });
        for _ in 0..8 {
            tokio::task::yield_now().await;
        }
        assert!(!joining.is_finished());

        // Same steps as `collect`, while the join is parked on the lock.
        guard.closed = true;
        registry
            .rooms
            .remove_if("sess-42", |_, current| Arc::ptr_eq(current, &stale));
        drop(guard);

        let sub = joining.await.unwrap().unwrap();
        assert_eq!(sub.snapshot.timer.seq, 0);
        assert_eq!(sub.snapshot.timer.drill_index, 0);
        assert_eq!(sub.snapshot.participant_count, 1);

        let fresh = registry.existing_room("sess-42").unwrap();
        assert!(!Arc::ptr_eq(&fresh, &stale));
        assert!(stale.lock().await.presence.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn empty_room_is_collected_after_the_grace_window() {
        let registry = registry(Arc::new(ManualClock::new(T0)));
        let id = Uuid::new_v4();
        registry.join("sess-42", id, "coach").await.unwrap();
        registry.leave("sess-42", id).await.unwrap();

        tokio::time::sleep(Duration::from_secs(59)).await;
        assert!(registry.contains("sess-42"));

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(!registry.contains("sess-42"));
    }

    #[tokio::test(start_paused = true)]
    async fn rejoin_within_grace_keeps_room_and_timer() {
        let registry = registry(Arc::new(ManualClock::new(T0)));
        let id = Uuid::new_v4();
        registry.join("sess-42", id, "coach").await.unwrap();
        registry
            .apply("sess-42", TimerCommand::SetDrill { drill_index: 2 })
            .await
            .unwrap();
        registry.leave("sess-42", id).await.unwrap();

        tokio::time::sleep(Duration::from_secs(30)).await;
        let sub = registry.join("sess-42", Uuid::new_v4(), "coach").await.unwrap();
        assert_eq!(sub.snapshot.timer.drill_index, 2);

        tokio::time::sleep(Duration::from_secs(120)).await;
        assert!(registry.contains("sess-42"));
    }

    #[tokio::test(start_paused = true)]
    async fn dropped_transport_counts_until_heartbeat_timeout() {
        let registry = registry(Arc::new(ManualClock::new(T0)));
        let mut wall = registry.join("sess-42", Uuid::new_v4(), "wall").await.unwrap();
        let coach = Uuid::new_v4();
        registry.join("sess-42", coach, "coach").await.unwrap();
        assert!(matches!(
            next_message(&mut wall.receiver),
            ServerMessage::Joined { .. }
        ));

        registry.disconnect("sess-42", coach).await;
        tokio::time::sleep(Duration::from_secs(29)).await;
        assert!(wall.receiver.try_recv().is_err());
        assert_eq!(
            registry.status("sess-42").await.unwrap().snapshot.participant_count,
            2
        );

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(
            next_message(&mut wall.receiver),
            ServerMessage::Left {
                participant_count: 1
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn same_user_rejoin_during_heartbeat_window_keeps_the_count() {
        let registry = registry(Arc::new(ManualClock::new(T0)));
        let mut wall = registry.join("sess-42", Uuid::new_v4(), "wall").await.unwrap();
        let first = Uuid::new_v4();
        registry.join("sess-42", first, "coach").await.unwrap();
        registry.disconnect("sess-42", first).await;

        let again = registry.join("sess-42", Uuid::new_v4(), "coach").await.unwrap();
        assert_eq!(again.snapshot.participant_count, 2);

        tokio::time::sleep(Duration::from_secs(31)).await;
        let status = registry.status("sess-42").await.unwrap();
        assert_eq!(status.snapshot.participant_count, 2);

        let events: Vec<_> = std::iter::from_fn(|| wall.receiver.try_recv().ok())
            .map(|event| event.event)
            .collect();
        assert_eq!(events, vec!["joined", "joined"]);
    }

    #[tokio::test(start_paused = true)]
    async fn running_round_elapses_into_stopped() {
        let clock = Arc::new(ManualClock::new(T0));
        let registry = registry(clock.clone());
        let mut sub = registry.join("sess-42", Uuid::new_v4(), "coach").await.unwrap();
        registry
            .apply(
                "sess-42",
                TimerCommand::Start {
                    duration_ms: 10_000,
                    drill_index: 1,
                },
            )
            .await
            .unwrap();
        let _ = next_message(&mut sub.receiver);

        clock.advance(10_000);
        tokio::time::sleep(Duration::from_millis(10_001)).await;

        match next_message(&mut sub.receiver) {
            ServerMessage::State(timer) => {
                assert_eq!(timer.phase, VisibleTimerPhase::Stopped);
                assert_eq!(timer.seq, 2);
                assert_eq!(timer.drill_index, 1);
            }
            other => panic!("unexpected {other:?}"),
        }

        let restarted = registry
            .apply(
                "sess-42",
                TimerCommand::Start {
                    duration_ms: 5_000,
                    drill_index: 2,
                },
            )
            .await
            .unwrap();
        assert_eq!(restarted.seq, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn paused_round_never_elapses() {
        let clock = Arc::new(ManualClock::new(T0));
        let registry = registry(clock.clone());
        registry
            .apply(
                "sess-42",
                TimerCommand::Start {
                    duration_ms: 10_000,
                    drill_index: 0,
                },
            )
            .await
            .unwrap();
        clock.advance(4_000);
        registry.apply("sess-42", TimerCommand::Pause).await.unwrap();

        clock.advance(20_000);
        tokio::time::sleep(Duration::from_secs(20)).await;

        let status = registry.status("sess-42").await.unwrap();
        assert_eq!(status.snapshot.timer.phase, VisibleTimerPhase::Paused);
        assert_eq!(status.snapshot.timer.paused_remaining_ms, Some(6_000));
    }
}
