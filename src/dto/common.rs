use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::{
    dto::{format_timestamp_ms, phase::VisibleTimerPhase},
    state::{presence::Participant, timer::TimerState},
};

/// Canonical timer state as seen on the wire.
///
/// Timestamps are absolute milliseconds since the Unix epoch; viewers recompute the
/// countdown from them with their own clock.
#[derive(Debug, Serialize, Deserialize, ToSchema, Clone, PartialEq, Eq)]
pub struct TimerStateDto {
    pub phase: VisibleTimerPhase,
    /// Length of the current round. After a resume this is the remainder captured at pause.
    pub duration_ms: u64,
    /// Set while running.
    pub started_at_ms: Option<u64>,
    /// Set while paused.
    pub paused_remaining_ms: Option<u64>,
    pub drill_index: usize,
    /// Room sequence number of the command that produced this state.
    pub seq: u64,
}

impl From<&TimerState> for TimerStateDto {
    fn from(state: &TimerState) -> Self {
        Self {
            phase: (&state.phase).into(),
            duration_ms: state.duration_ms,
            started_at_ms: state.started_at_ms(),
            paused_remaining_ms: state.paused_remaining_ms(),
            drill_index: state.drill_index,
            seq: state.seq,
        }
    }
}

/// Full room state handed to a joining participant or a new observer.
#[derive(Debug, Serialize, Deserialize, ToSchema, Clone, PartialEq, Eq)]
pub struct RoomSnapshot {
    pub session_id: String,
    pub timer: TimerStateDto,
    pub participant_count: usize,
    /// Ordered drill identifiers supplied by the session-content service.
    pub drill_order: Vec<String>,
}

/// Participant entry exposed on the REST status route.
#[derive(Debug, Serialize, ToSchema, Clone)]
pub struct ParticipantSummary {
    pub user_id: String,
    /// RFC 3339 join instant.
    pub joined_at: String,
    /// False while the participant is inside its heartbeat grace window.
    pub connected: bool,
}

impl From<&Participant> for ParticipantSummary {
    fn from(participant: &Participant) -> Self {
        Self {
            user_id: participant.user_id.clone(),
            joined_at: format_timestamp_ms(participant.joined_at_ms),
            connected: participant.is_connected(),
        }
    }
}

/// Response of `GET /sessions/{id}`.
#[derive(Debug, Serialize, ToSchema)]
pub struct SessionStatusResponse {
    pub snapshot: RoomSnapshot,
    pub participants: Vec<ParticipantSummary>,
}
