use thiserror::Error;

use crate::state::clock::TimestampMs;

/// Phases of a room's countdown.
///
/// Running and paused periods carry their timestamps so a running timer can never be
/// observed without a start instant, nor a paused one without its frozen remainder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TimerPhase {
    /// No round is configured or the timer was hard-reset.
    #[default]
    Idle,
    /// Counting down since `started_at_ms`.
    Running {
        /// Absolute instant the current running period began.
        started_at_ms: TimestampMs,
    },
    /// Frozen with `remaining_ms` left on the clock.
    Paused {
        /// Snapshot of the remaining time taken when the pause was applied.
        remaining_ms: u64,
    },
    /// The round ran to zero on its own.
    Stopped,
}

/// Commands that can be applied to the timer state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerCommand {
    /// Begin a new round of `duration_ms` on drill `drill_index`.
    Start {
        /// Length of the round.
        duration_ms: u64,
        /// Drill the round belongs to.
        drill_index: usize,
    },
    /// Freeze a running countdown.
    Pause,
    /// Continue a paused countdown from where it froze.
    Resume,
    /// Hard reset back to idle. Always accepted.
    Stop,
    /// Move every viewer to another drill without touching the countdown.
    SetDrill {
        /// Drill to display.
        drill_index: usize,
    },
    /// Mark a running round whose remaining time reached zero as finished.
    Elapse,
}

impl TimerCommand {
    /// Short wire name of the command.
    pub fn name(&self) -> &'static str {
        match self {
            TimerCommand::Start { .. } => "start",
            TimerCommand::Pause => "pause",
            TimerCommand::Resume => "resume",
            TimerCommand::Stop => "stop",
            TimerCommand::SetDrill { .. } => "set_drill",
            TimerCommand::Elapse => "elapse",
        }
    }
}

/// Error returned when a command is not legal from the current phase.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid transition: {} cannot be applied while {from:?}", .command.name())]
pub struct InvalidTransition {
    /// Phase the machine was in when the command arrived.
    pub from: TimerPhase,
    /// The rejected command.
    pub command: TimerCommand,
}

/// Canonical timer state of a room, as broadcast to every viewer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TimerState {
    /// Current phase with its timestamps.
    pub phase: TimerPhase,
    /// Length of the current round. While running after a resume this is the remainder
    /// captured at pause time, so `remaining = duration - elapsed` keeps holding.
    pub duration_ms: u64,
    /// Drill currently displayed.
    pub drill_index: usize,
    /// Incremented by every accepted command.
    pub seq: u64,
}

impl TimerState {
    /// Start instant of the current running period.
    pub fn started_at_ms(&self) -> Option<TimestampMs> {
        match self.phase {
            TimerPhase::Running { started_at_ms } => Some(started_at_ms),
            _ => None,
        }
    }

    /// Remaining time frozen by the last pause.
    pub fn paused_remaining_ms(&self) -> Option<u64> {
        match self.phase {
            TimerPhase::Paused { remaining_ms } => Some(remaining_ms),
            _ => None,
        }
    }

    /// Remaining time at `now`, recomputed from the absolute start instant.
    pub fn remaining_ms(&self, now: TimestampMs) -> u64 {
        match self.phase {
            TimerPhase::Running { started_at_ms } => {
                remaining_at(self.duration_ms, started_at_ms, now)
            }
            TimerPhase::Paused { remaining_ms } => remaining_ms,
            TimerPhase::Idle | TimerPhase::Stopped => 0,
        }
    }

    /// Instant at which a running round reaches zero.
    pub fn deadline_ms(&self) -> Option<TimestampMs> {
        self.started_at_ms()
            .map(|started_at_ms| started_at_ms.saturating_add(self.duration_ms))
    }
}

/// `max(0, duration - (now - started_at))`, tolerating a clock that reads before `started_at`.
pub fn remaining_at(duration_ms: u64, started_at_ms: TimestampMs, now: TimestampMs) -> u64 {
    let elapsed = now.saturating_sub(started_at_ms);
    duration_ms.saturating_sub(elapsed)
}

/// Per-room timer state machine.
///
/// Every transition is a pure function of the current state, the command and the
/// timestamp handed in by the caller.
#[derive(Debug, Clone, Default)]
pub struct TimerMachine {
    state: TimerState,
}

impl TimerMachine {
    /// Create an idle timer on the first drill.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current canonical state.
    pub fn state(&self) -> TimerState {
        self.state
    }

    /// Current phase.
    pub fn phase(&self) -> TimerPhase {
        self.state.phase
    }

    /// Sequence number of the last accepted command.
    pub fn seq(&self) -> u64 {
        self.state.seq
    }

    /// Apply `command` at `now`, returning the new state.
    ///
    /// Rejected commands leave the machine untouched, including its `seq`.
    pub fn apply(
        &mut self,
        command: TimerCommand,
        now: TimestampMs,
    ) -> Result<TimerState, InvalidTransition> {
        let next = self.compute_transition(command, now)?;
        self.state = TimerState {
            seq: self.state.seq + 1,
            ..next
        };
        Ok(self.state)
    }

    fn compute_transition(
        &self,
        command: TimerCommand,
        now: TimestampMs,
    ) -> Result<TimerState, InvalidTransition> {
        let current = self.state;
        let next = match (current.phase, command) {
            (
                TimerPhase::Idle | TimerPhase::Stopped,
                TimerCommand::Start {
                    duration_ms,
                    drill_index,
                },
            ) if duration_ms > 0 => TimerState {
                phase: TimerPhase::Running { started_at_ms: now },
                duration_ms,
                drill_index,
                ..current
            },
            (TimerPhase::Running { started_at_ms }, TimerCommand::Pause) => TimerState {
                phase: TimerPhase::Paused {
                    remaining_ms: remaining_at(current.duration_ms, started_at_ms, now),
                },
                ..current
            },
            (TimerPhase::Paused { remaining_ms }, TimerCommand::Resume) if remaining_ms > 0 => {
                TimerState {
                    phase: TimerPhase::Running { started_at_ms: now },
                    duration_ms: remaining_ms,
                    ..current
                }
            }
            (_, TimerCommand::Stop) => TimerState {
                phase: TimerPhase::Idle,
                ..current
            },
            (_, TimerCommand::SetDrill { drill_index }) => TimerState {
                drill_index,
                ..current
            },
            (TimerPhase::Running { started_at_ms }, TimerCommand::Elapse)
                if remaining_at(current.duration_ms, started_at_ms, now) == 0 =>
            {
                TimerState {
                    phase: TimerPhase::Stopped,
                    ..current
                }
            }
            (from, command) => return Err(InvalidTransition { from, command }),
        };

        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECOND: u64 = 1_000;

    fn start(sm: &mut TimerMachine, duration_s: u64, drill_index: usize, now: u64) -> TimerState {
        sm.apply(
            TimerCommand::Start {
                duration_ms: duration_s * SECOND,
                drill_index,
            },
            now,
        )
        .unwrap()
    }

    #[test]
    fn initial_state_is_idle() {
        let sm = TimerMachine::new();
        assert_eq!(sm.phase(), TimerPhase::Idle);
        assert_eq!(sm.seq(), 0);
        assert_eq!(sm.state().started_at_ms(), None);
        assert_eq!(sm.state().paused_remaining_ms(), None);
    }

    #[test]
    fn pause_and_resume_follow_the_coaching_scenario() {
        let mut sm = TimerMachine::new();
        let started = start(&mut sm, 300, 0, 1_000 * SECOND);
        assert_eq!(started.remaining_ms(1_031 * SECOND), 269 * SECOND);

        let paused = sm.apply(TimerCommand::Pause, 1_050 * SECOND).unwrap();
        assert_eq!(paused.paused_remaining_ms(), Some(250 * SECOND));
        assert_eq!(paused.started_at_ms(), None);
        // Frozen while paused no matter how late it is read.
        assert_eq!(paused.remaining_ms(1_199 * SECOND), 250 * SECOND);

        let resumed = sm.apply(TimerCommand::Resume, 1_200 * SECOND).unwrap();
        assert_eq!(resumed.duration_ms, 250 * SECOND);
        assert_eq!(resumed.started_at_ms(), Some(1_200 * SECOND));
        assert_eq!(resumed.paused_remaining_ms(), None);
        assert_eq!(resumed.remaining_ms(1_210 * SECOND), 240 * SECOND);
    }

    #[test]
    fn remaining_matches_cumulative_running_time_across_cycles() {
        let mut sm = TimerMachine::new();
        let duration = 600 * SECOND;
        let mut now = 5_000;
        sm.apply(
            TimerCommand::Start {
                duration_ms: duration,
                drill_index: 0,
            },
            now,
        )
        .unwrap();

        let mut running_total = 0;
        for (run, idle) in [(12_345, 40_000), (1, 3), (99_999, 0), (7_000, 250_000)] {
            now += run;
            running_total += run;
            let paused = sm.apply(TimerCommand::Pause, now).unwrap();
            assert_eq!(paused.remaining_ms(now), duration - running_total);

            now += idle;
            let resumed = sm.apply(TimerCommand::Resume, now).unwrap();
            assert_eq!(resumed.remaining_ms(now), duration - running_total);
        }

        now += 10_000;
        running_total += 10_000;
        assert_eq!(sm.state().remaining_ms(now), duration - running_total);
    }

    #[test]
    fn stop_is_idempotent() {
        let mut sm = TimerMachine::new();
        start(&mut sm, 60, 1, 0);
        sm.apply(TimerCommand::Pause, 10 * SECOND).unwrap();

        let once = sm.apply(TimerCommand::Stop, 11 * SECOND).unwrap();
        let twice = sm.apply(TimerCommand::Stop, 12 * SECOND).unwrap();

        assert_eq!(once.phase, TimerPhase::Idle);
        assert_eq!(twice.phase, TimerPhase::Idle);
        assert_eq!(once.started_at_ms(), twice.started_at_ms());
        assert_eq!(once.paused_remaining_ms(), twice.paused_remaining_ms());
        assert_eq!(once.drill_index, twice.drill_index);
        assert_eq!(twice.seq, once.seq + 1);
    }

    #[test]
    fn restart_after_stop_does_not_leak_pause_snapshot() {
        let mut sm = TimerMachine::new();
        start(&mut sm, 180, 0, 0);
        sm.apply(TimerCommand::Pause, 30 * SECOND).unwrap();
        sm.apply(TimerCommand::Stop, 31 * SECOND).unwrap();

        let restarted = start(&mut sm, 300, 0, 40 * SECOND);
        assert_eq!(restarted.duration_ms, 300 * SECOND);
        assert_eq!(restarted.paused_remaining_ms(), None);
        assert_eq!(restarted.remaining_ms(40 * SECOND), 300 * SECOND);
    }

    #[test]
    fn set_drill_while_running_only_changes_the_drill() {
        let mut sm = TimerMachine::new();
        let before = start(&mut sm, 300, 0, 1_000);
        let after = sm
            .apply(TimerCommand::SetDrill { drill_index: 2 }, 9_000)
            .unwrap();

        assert_eq!(after.drill_index, 2);
        assert_eq!(after.phase, before.phase);
        assert_eq!(after.duration_ms, before.duration_ms);
        assert_eq!(after.seq, before.seq + 1);
    }

    #[test]
    fn rejected_commands_leave_state_and_seq_untouched() {
        let mut sm = TimerMachine::new();
        let err = sm.apply(TimerCommand::Pause, 0).unwrap_err();
        assert_eq!(err.from, TimerPhase::Idle);
        assert_eq!(err.command, TimerCommand::Pause);
        assert_eq!(sm.seq(), 0);

        start(&mut sm, 10, 0, 0);
        assert!(sm.apply(TimerCommand::Resume, 1).is_err());
        assert!(
            sm.apply(
                TimerCommand::Start {
                    duration_ms: 5,
                    drill_index: 0
                },
                1
            )
            .is_err()
        );
        assert_eq!(sm.seq(), 1);
    }

    #[test]
    fn zero_duration_start_is_rejected() {
        let mut sm = TimerMachine::new();
        let err = sm
            .apply(
                TimerCommand::Start {
                    duration_ms: 0,
                    drill_index: 0,
                },
                0,
            )
            .unwrap_err();
        assert_eq!(err.from, TimerPhase::Idle);
    }

    #[test]
    fn pause_after_deadline_cannot_resume() {
        let mut sm = TimerMachine::new();
        start(&mut sm, 5, 0, 0);
        let paused = sm.apply(TimerCommand::Pause, 8 * SECOND).unwrap();
        assert_eq!(paused.paused_remaining_ms(), Some(0));
        assert!(sm.apply(TimerCommand::Resume, 9 * SECOND).is_err());
        assert!(sm.apply(TimerCommand::Stop, 9 * SECOND).is_ok());
    }

    #[test]
    fn elapse_only_applies_once_the_deadline_passed() {
        let mut sm = TimerMachine::new();
        let running = start(&mut sm, 5, 3, 0);
        assert_eq!(running.deadline_ms(), Some(5 * SECOND));

        assert!(sm.apply(TimerCommand::Elapse, 4 * SECOND).is_err());
        let stopped = sm.apply(TimerCommand::Elapse, 5 * SECOND).unwrap();
        assert_eq!(stopped.phase, TimerPhase::Stopped);
        assert_eq!(stopped.drill_index, 3);
        assert_eq!(stopped.remaining_ms(6 * SECOND), 0);

        let next_round = start(&mut sm, 30, 4, 6 * SECOND);
        assert_eq!(next_round.drill_index, 4);
        assert_eq!(next_round.seq, 3);
    }

    #[test]
    fn clock_behind_start_does_not_overflow() {
        assert_eq!(remaining_at(10_000, 5_000, 4_000), 10_000);
        assert_eq!(remaining_at(10_000, 5_000, u64::MAX), 0);
    }
}
