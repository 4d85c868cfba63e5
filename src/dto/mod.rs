use time::{OffsetDateTime, format_description::well_known::Rfc3339};

use crate::state::clock::TimestampMs;

pub mod common;
pub mod health;
pub mod phase;
pub mod sse;
pub mod validation;
pub mod ws;

fn format_timestamp_ms(timestamp: TimestampMs) -> String {
    OffsetDateTime::from_unix_timestamp_nanos(i128::from(timestamp) * 1_000_000)
        .ok()
        .and_then(|instant| instant.format(&Rfc3339).ok())
        .unwrap_or_else(|| "invalid-timestamp".into())
}
