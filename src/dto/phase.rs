use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::state::timer::TimerPhase;

/// Timer phase exposed to clients (WebSocket, SSE and REST).
#[derive(Debug, Serialize, Deserialize, ToSchema, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum VisibleTimerPhase {
    /// No countdown is shown.
    Idle,
    /// Counting down from `started_at_ms`.
    Running,
    /// Frozen at `paused_remaining_ms`.
    Paused,
    /// The round ran out; the display shows zero.
    Stopped,
}

impl From<&TimerPhase> for VisibleTimerPhase {
    fn from(value: &TimerPhase) -> Self {
        match value {
            TimerPhase::Idle => VisibleTimerPhase::Idle,
            TimerPhase::Running { .. } => VisibleTimerPhase::Running,
            TimerPhase::Paused { .. } => VisibleTimerPhase::Paused,
            TimerPhase::Stopped => VisibleTimerPhase::Stopped,
        }
    }
}
