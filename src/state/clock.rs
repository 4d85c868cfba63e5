//! Absolute timestamp sources used to stamp timer transitions.

use std::sync::atomic::{AtomicU64, Ordering};

use time::OffsetDateTime;

/// Milliseconds since the Unix epoch.
pub type TimestampMs = u64;

/// Source of wall-clock timestamps consumed by the room registry.
pub trait Clock: Send + Sync {
    /// Current time in milliseconds since the Unix epoch.
    fn now_ms(&self) -> TimestampMs;
}

/// Clock backed by the operating system's wall clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> TimestampMs {
        let millis = OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000;
        TimestampMs::try_from(millis).unwrap_or_default()
    }
}

/// Clock that only moves when told to.
///
/// Used by tests, and by a purely local single-device timer that sources its own timestamps.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicU64,
}

impl ManualClock {
    /// Create a clock frozen at `start`.
    pub fn new(start: TimestampMs) -> Self {
        Self {
            now: AtomicU64::new(start),
        }
    }

    /// Jump to an absolute timestamp.
    pub fn set(&self, now: TimestampMs) {
        self.now.store(now, Ordering::SeqCst);
    }

    /// Move the clock forward by `millis`.
    pub fn advance(&self, millis: u64) {
        self.now.fetch_add(millis, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> TimestampMs {
        self.now.load(Ordering::SeqCst)
    }
}
