//! The authoritative game clock.
//!
//! Time is never stored as a ticking counter. The event row keeps the
//! anchors (`started_at`, `paused_at`, `accumulated_pause_seconds`) and every
//! reading is derived from them on demand, so two servers reading the same
//! row always agree and a crashed process loses nothing.

use thiserror::Error;
use time::OffsetDateTime;

use crate::dao::models::{EventEntity, EventStatus};

/// Clock transitions an organizer can request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClockAction {
    /// Begin the countdown from the full duration.
    Start,
    /// Freeze the countdown.
    Pause,
    /// Unfreeze the countdown, folding the pause into the accumulator.
    Resume,
    /// Terminate the event early.
    End,
    /// Return the event to the waiting state, clearing all anchors.
    Reset,
}

/// Error returned when a clock action cannot be applied from the current
/// status.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid transition: {action:?} cannot be applied while {from:?}")]
pub struct InvalidTransition {
    /// Status the event was in when the action arrived.
    pub from: EventStatus,
    /// The rejected action.
    pub action: ClockAction,
}

/// A derived snapshot of the clock at a single instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerReading {
    /// Status the reading was derived from.
    pub status: EventStatus,
    /// Seconds of play consumed so far, pause time excluded.
    pub elapsed_seconds: i64,
    /// Seconds left on the countdown, clamped at zero.
    pub remaining_seconds: i64,
}

impl TimerReading {
    /// True when play time is actually advancing: a running status with an
    /// exhausted countdown reads as not running.
    pub fn is_running(&self) -> bool {
        self.status == EventStatus::Running && self.remaining_seconds > 0
    }
}

/// The minimal set of fields a clock reading is derived from.
///
/// Both the server (from the event row) and the sync client (from the wire
/// payload) derive readings through this view, so the two sides can never
/// disagree on the arithmetic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClockAnchors {
    /// Lifecycle status the anchors were captured under.
    pub status: EventStatus,
    /// Total countdown duration in seconds.
    pub duration_seconds: i64,
    /// First start instant, if any.
    pub started_at: Option<OffsetDateTime>,
    /// Current pause instant, if paused.
    pub paused_at: Option<OffsetDateTime>,
    /// End instant, if finished.
    pub ended_at: Option<OffsetDateTime>,
    /// Total seconds spent paused so far.
    pub accumulated_pause_seconds: i64,
}

impl From<&EventEntity> for ClockAnchors {
    fn from(event: &EventEntity) -> Self {
        Self {
            status: event.status,
            duration_seconds: event.duration_seconds,
            started_at: event.started_at,
            paused_at: event.paused_at,
            ended_at: event.ended_at,
            accumulated_pause_seconds: event.accumulated_pause_seconds,
        }
    }
}

/// Derive the clock reading for an event at `now`.
///
/// A running event whose reading hits zero is reported with zero remaining;
/// the caller decides whether to also transition it to finished.
pub fn read_timer(event: &EventEntity, now: OffsetDateTime) -> TimerReading {
    read_anchors(&ClockAnchors::from(event), now)
}

/// Derive the clock reading from bare anchors at `now`.
pub fn read_anchors(anchors: &ClockAnchors, now: OffsetDateTime) -> TimerReading {
    let elapsed = match anchors.status {
        EventStatus::Waiting => 0,
        EventStatus::Running => anchors
            .started_at
            .map(|started| (now - started).whole_seconds() - anchors.accumulated_pause_seconds)
            .unwrap_or(0),
        EventStatus::Paused => match (anchors.started_at, anchors.paused_at) {
            (Some(started), Some(paused)) => {
                (paused - started).whole_seconds() - anchors.accumulated_pause_seconds
            }
            _ => 0,
        },
        EventStatus::Finished => match (anchors.started_at, anchors.ended_at) {
            (Some(started), Some(ended)) => {
                (ended - started).whole_seconds() - anchors.accumulated_pause_seconds
            }
            _ => anchors.duration_seconds,
        },
    };
    let elapsed = elapsed.clamp(0, anchors.duration_seconds);

    let remaining = match anchors.status {
        EventStatus::Finished => 0,
        _ => anchors.duration_seconds - elapsed,
    };

    TimerReading {
        status: anchors.status,
        elapsed_seconds: elapsed,
        remaining_seconds: remaining,
    }
}

/// Statuses from which `action` is legal; also the guard set for the
/// compare-and-set write that persists the transition.
pub fn allowed_from(action: ClockAction) -> Vec<EventStatus> {
    match action {
        ClockAction::Start => vec![EventStatus::Waiting],
        ClockAction::Pause => vec![EventStatus::Running],
        ClockAction::Resume => vec![EventStatus::Paused],
        ClockAction::End => vec![EventStatus::Running, EventStatus::Paused],
        ClockAction::Reset => vec![
            EventStatus::Waiting,
            EventStatus::Running,
            EventStatus::Paused,
            EventStatus::Finished,
        ],
    }
}

/// Apply a clock action to an event, returning the updated entity.
///
/// Pure: the caller persists the result with a status-guarded replace so a
/// concurrent transition loses cleanly instead of clobbering the anchors.
pub fn apply_transition(
    event: &EventEntity,
    action: ClockAction,
    now: OffsetDateTime,
) -> Result<EventEntity, InvalidTransition> {
    if !allowed_from(action).contains(&event.status) {
        return Err(InvalidTransition {
            from: event.status,
            action,
        });
    }

    let mut next = event.clone();
    next.updated_at = now;

    match action {
        ClockAction::Start => {
            next.status = EventStatus::Running;
            next.started_at = Some(now);
            next.paused_at = None;
            next.ended_at = None;
            next.accumulated_pause_seconds = 0;
        }
        ClockAction::Pause => {
            next.status = EventStatus::Paused;
            next.paused_at = Some(now);
        }
        ClockAction::Resume => {
            if let Some(paused) = next.paused_at.take() {
                next.accumulated_pause_seconds += (now - paused).whole_seconds();
            }
            next.status = EventStatus::Running;
        }
        ClockAction::End => {
            // Ending a paused event folds the open pause first so the frozen
            // elapsed value stays accurate.
            if let Some(paused) = next.paused_at.take() {
                next.accumulated_pause_seconds += (now - paused).whole_seconds();
            }
            next.status = EventStatus::Finished;
            next.ended_at = Some(now);
        }
        ClockAction::Reset => {
            next.status = EventStatus::Waiting;
            next.started_at = None;
            next.paused_at = None;
            next.ended_at = None;
            next.accumulated_pause_seconds = 0;
        }
    }

    Ok(next)
}
