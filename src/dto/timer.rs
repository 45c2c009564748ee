//! Timer synchronization request and response bodies.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    dao::models::{EventEntity, EventStatus},
    dto::unix_millis,
    state::clock::{ClockAnchors, TimerReading},
};

/// Request body for a timer synchronization round-trip.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct TimerSyncRequest {
    /// Event whose clock is being read.
    pub event_id: Uuid,
}

/// Authoritative clock reading returned by `/timer-sync`.
///
/// `server_time_ms` lets the client estimate its offset from the server
/// clock (half the measured round-trip is attributed to network latency).
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TimerSyncResponse {
    /// Event whose clock was read.
    pub event_id: Uuid,
    /// Lifecycle status after lazy expiry was applied.
    pub status: EventStatus,
    /// Configured countdown length.
    pub duration_seconds: i64,
    /// Seconds of game time consumed, pauses excluded.
    pub elapsed_seconds: i64,
    /// Seconds left on the countdown, clamped at zero.
    pub remaining_seconds: i64,
    /// Whether play time is advancing right now.
    pub is_running: bool,
    /// First start instant; None until the event has started.
    #[serde(with = "time::serde::rfc3339::option")]
    pub started_at: Option<OffsetDateTime>,
    /// Current pause instant; None unless paused.
    #[serde(with = "time::serde::rfc3339::option")]
    pub paused_at: Option<OffsetDateTime>,
    /// Total seconds spent paused so far.
    pub accumulated_pause_seconds: i64,
    /// Server wall clock at response time, unix milliseconds.
    pub server_time_ms: i64,
}

impl TimerSyncResponse {
    /// Assemble the wire payload from a derived reading.
    pub fn new(event: &EventEntity, reading: TimerReading, now: OffsetDateTime) -> Self {
        Self {
            event_id: event.id,
            status: reading.status,
            duration_seconds: event.duration_seconds,
            elapsed_seconds: reading.elapsed_seconds,
            remaining_seconds: reading.remaining_seconds,
            is_running: reading.is_running(),
            started_at: event.started_at,
            paused_at: event.paused_at,
            accumulated_pause_seconds: event.accumulated_pause_seconds,
            server_time_ms: unix_millis(now),
        }
    }

    /// Anchors for client-side extrapolation between syncs.
    ///
    /// The end instant is not carried on the wire; a finished event is never
    /// extrapolated, so the fallback reading (elapsed pinned at the full
    /// duration) is never shown.
    pub fn anchors(&self) -> ClockAnchors {
        ClockAnchors {
            status: self.status,
            duration_seconds: self.duration_seconds,
            started_at: self.started_at,
            paused_at: self.paused_at,
            ended_at: None,
            accumulated_pause_seconds: self.accumulated_pause_seconds,
        }
    }
}
