//! Viewer-side reconciliation of broadcast timer state.
//!
//! Every viewer keeps its own ticking display from the absolute timestamps it
//! receives: remaining time is recomputed from `started_at_ms` and the viewer's
//! local clock instead of being decremented, so two viewers whose clocks differ
//! by δ never disagree by more than δ. Deliveries older than the last applied
//! `seq` are discarded.

use crate::{
    dto::{common::TimerStateDto, phase::VisibleTimerPhase, ws::ServerMessage},
    state::{clock::TimestampMs, timer::remaining_at},
};

/// Remaining milliseconds a viewer should display at `local_now`.
///
/// `None` means no countdown is shown (idle).
pub fn remaining_ms(timer: &TimerStateDto, local_now: TimestampMs) -> Option<u64> {
    match timer.phase {
        VisibleTimerPhase::Running => Some(match timer.started_at_ms {
            Some(started_at_ms) => remaining_at(timer.duration_ms, started_at_ms, local_now),
            None => timer.duration_ms,
        }),
        VisibleTimerPhase::Paused => Some(timer.paused_remaining_ms.unwrap_or_default()),
        VisibleTimerPhase::Stopped => Some(0),
        VisibleTimerPhase::Idle => None,
    }
}

/// Effect of a delivery on a [`TimerView`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    /// The display now follows the delivered state.
    Updated,
    /// A snapshot replaced the whole view and its `seq` baseline.
    Reset,
    /// Older than the last applied `seq`; ignored.
    Stale,
    /// Not a timer delivery.
    Ignored,
}

/// What one viewer currently renders.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TimerView {
    last_seq: Option<u64>,
    timer: Option<TimerStateDto>,
    participant_count: usize,
}

impl TimerView {
    /// Empty view, before any snapshot.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sequence number of the last applied delivery.
    pub fn last_seq(&self) -> Option<u64> {
        self.last_seq
    }

    /// Timer state the display follows.
    pub fn timer(&self) -> Option<&TimerStateDto> {
        self.timer.as_ref()
    }

    /// Participant count from the last snapshot or presence event.
    pub fn participant_count(&self) -> usize {
        self.participant_count
    }

    /// Remaining time to render at `local_now`.
    pub fn remaining_ms(&self, local_now: TimestampMs) -> Option<u64> {
        self.timer
            .as_ref()
            .and_then(|timer| remaining_ms(timer, local_now))
    }

    /// Fold a server message into the view.
    pub fn apply(&mut self, message: &ServerMessage) -> Applied {
        match message {
            ServerMessage::Snapshot(snapshot) => {
                self.last_seq = Some(snapshot.timer.seq);
                self.timer = Some(snapshot.timer.clone());
                self.participant_count = snapshot.participant_count;
                Applied::Reset
            }
            ServerMessage::State(timer) => {
                if self.is_stale(timer.seq) {
                    return Applied::Stale;
                }
                self.last_seq = Some(timer.seq);
                self.timer = Some(timer.clone());
                Applied::Updated
            }
            ServerMessage::Stopped { seq, drill_index } => {
                if self.is_stale(*seq) {
                    return Applied::Stale;
                }
                self.last_seq = Some(*seq);
                let duration_ms = self.timer.as_ref().map_or(0, |timer| timer.duration_ms);
                self.timer = Some(TimerStateDto {
                    phase: VisibleTimerPhase::Idle,
                    duration_ms,
                    started_at_ms: None,
                    paused_remaining_ms: None,
                    drill_index: *drill_index,
                    seq: *seq,
                });
                Applied::Updated
            }
            ServerMessage::Joined { participant_count }
            | ServerMessage::Left { participant_count } => {
                self.participant_count = *participant_count;
                Applied::Updated
            }
            ServerMessage::CompletionUpdate { .. }
            | ServerMessage::NoteUpdate { .. }
            | ServerMessage::Ack(_) => Applied::Ignored,
        }
    }

    fn is_stale(&self, seq: u64) -> bool {
        self.last_seq.is_some_and(|last| seq < last)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dto::common::RoomSnapshot;

    fn running(started_at_ms: u64, duration_ms: u64, seq: u64) -> TimerStateDto {
        TimerStateDto {
            phase: VisibleTimerPhase::Running,
            duration_ms,
            started_at_ms: Some(started_at_ms),
            paused_remaining_ms: None,
            drill_index: 0,
            seq,
        }
    }

    #[test]
    fn running_state_is_recomputed_from_the_local_clock() {
        let timer = running(1_000_000, 300_000, 1);
        assert_eq!(remaining_ms(&timer, 1_031_000), Some(269_000));
        assert_eq!(remaining_ms(&timer, 2_000_000), Some(0));
    }

    #[test]
    fn clock_offset_bounds_the_disagreement() {
        let timer = running(1_000_000, 300_000, 1);
        let delta = 1_500;
        for now in [1_000_000, 1_100_000, 1_250_000] {
            let a = remaining_ms(&timer, now).unwrap();
            let b = remaining_ms(&timer, now + delta).unwrap();
            assert!(a.abs_diff(b) <= delta);
        }
    }

    #[test]
    fn paused_and_idle_states_do_not_tick() {
        let paused = TimerStateDto {
            phase: VisibleTimerPhase::Paused,
            duration_ms: 300_000,
            started_at_ms: None,
            paused_remaining_ms: Some(250_000),
            drill_index: 0,
            seq: 2,
        };
        assert_eq!(remaining_ms(&paused, 0), Some(250_000));
        assert_eq!(remaining_ms(&paused, u64::MAX), Some(250_000));

        let idle = TimerStateDto {
            phase: VisibleTimerPhase::Idle,
            ..paused
        };
        assert_eq!(remaining_ms(&idle, 0), None);
    }

    #[test]
    fn out_of_order_deliveries_are_discarded() {
        let mut view = TimerView::new();
        assert_eq!(
            view.apply(&ServerMessage::State(running(0, 1_000, 7))),
            Applied::Updated
        );
        assert_eq!(
            view.apply(&ServerMessage::State(running(0, 9_000, 5))),
            Applied::Stale
        );
        assert_eq!(
            view.apply(&ServerMessage::Stopped {
                seq: 6,
                drill_index: 0
            }),
            Applied::Stale
        );
        assert_eq!(view.last_seq(), Some(7));
        assert_eq!(view.timer().unwrap().duration_ms, 1_000);
    }

    #[test]
    fn snapshot_resets_the_seq_baseline() {
        let mut view = TimerView::new();
        view.apply(&ServerMessage::State(running(0, 1_000, 40)));

        let snapshot = RoomSnapshot {
            session_id: "sess-42".into(),
            timer: TimerStateDto {
                phase: VisibleTimerPhase::Idle,
                duration_ms: 0,
                started_at_ms: None,
                paused_remaining_ms: None,
                drill_index: 0,
                seq: 0,
            },
            participant_count: 1,
            drill_order: vec!["warmup".into()],
        };
        assert_eq!(
            view.apply(&ServerMessage::Snapshot(snapshot)),
            Applied::Reset
        );
        assert_eq!(view.last_seq(), Some(0));
        assert_eq!(
            view.apply(&ServerMessage::State(running(10, 5_000, 1))),
            Applied::Updated
        );
    }

    #[test]
    fn stop_clears_the_display() {
        let mut view = TimerView::new();
        view.apply(&ServerMessage::State(running(0, 60_000, 3)));
        view.apply(&ServerMessage::Stopped {
            seq: 4,
            drill_index: 2,
        });

        assert_eq!(view.remaining_ms(30_000), None);
        let timer = view.timer().unwrap();
        assert_eq!(timer.phase, VisibleTimerPhase::Idle);
        assert_eq!(timer.drill_index, 2);
    }

    #[test]
    fn relays_and_acks_leave_the_timer_alone() {
        let mut view = TimerView::new();
        assert_eq!(
            view.apply(&ServerMessage::NoteUpdate {
                drill_id: "rondo".into(),
                text: "x".into()
            }),
            Applied::Ignored
        );
        assert_eq!(view.apply(&ServerMessage::Joined { participant_count: 3 }), Applied::Updated);
        assert_eq!(view.participant_count(), 3);
        assert!(view.timer().is_none());
    }
}
