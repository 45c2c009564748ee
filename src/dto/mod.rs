//! Wire-facing request, response, and stream payload types.

use time::{OffsetDateTime, format_description::well_known::Rfc3339};

pub mod admin;
pub mod health;
pub mod play;
pub mod sse;
pub mod timer;
pub mod validation;

fn format_timestamp(time: OffsetDateTime) -> String {
    time.format(&Rfc3339)
        .unwrap_or_else(|_| "invalid-timestamp".into())
}

pub(crate) fn unix_millis(time: OffsetDateTime) -> i64 {
    (time.unix_timestamp_nanos() / 1_000_000) as i64
}
