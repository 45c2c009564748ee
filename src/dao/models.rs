//! Domain entities shared by every storage backend.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use utoipa::ToSchema;
use uuid::Uuid;

/// Lifecycle status of an event, driving the authoritative game clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum EventStatus {
    /// Created but not started; the clock shows the full duration.
    Waiting,
    /// Clock is counting down.
    Running,
    /// Clock is frozen at the pause point.
    Paused,
    /// Event is over; remaining time is pinned at zero.
    Finished,
}

/// Per-(team, stage) progression state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ProgressStatus {
    /// Stage is not yet reachable for the team.
    Locked,
    /// Stage is the team's current checkpoint and accepts code submissions.
    Active,
    /// Stage has been solved; terminal for the (team, stage) pair.
    Completed,
    /// Stage was skipped by an organizer.
    Skipped,
}

/// One game session, owning its teams and stages.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EventEntity {
    /// Primary key of the event.
    pub id: Uuid,
    /// Display name shown on dashboards.
    pub name: String,
    /// Current lifecycle status.
    pub status: EventStatus,
    /// Total countdown duration in seconds.
    pub duration_seconds: i64,
    /// Absolute timestamp of the first start, None until started.
    pub started_at: Option<OffsetDateTime>,
    /// Absolute timestamp of the current pause, None unless paused.
    pub paused_at: Option<OffsetDateTime>,
    /// Absolute timestamp of the end, None until finished.
    pub ended_at: Option<OffsetDateTime>,
    /// Total seconds spent paused so far; only ever grows between resets.
    pub accumulated_pause_seconds: i64,
    /// Hint coin budget granted to each team.
    pub hints_per_team: u32,
    /// Optional cap on members per team.
    pub max_team_size: Option<u32>,
    /// Whether players may join after the event has started.
    pub allow_late_join: bool,
    /// Creation timestamp for auditing/debugging.
    pub created_at: OffsetDateTime,
    /// Last time the event entity was updated.
    pub updated_at: OffsetDateTime,
}

/// A competing team within an event.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TeamEntity {
    /// Stable identifier for the team.
    pub id: Uuid,
    /// Owning event.
    pub event_id: Uuid,
    /// Display name chosen by the organizer.
    pub name: String,
    /// Display color (CSS-style string, e.g. `#7c3aed`).
    pub color: String,
    /// Join code, stored uppercase and compared case-insensitively.
    pub join_code: String,
    /// Hint coins left; decremented by the hint ledger only.
    pub hints_remaining: u32,
    /// Running total of points, bonuses and penalties.
    pub total_points: i64,
    /// Inactive teams cannot join, submit codes, or use hints.
    pub is_active: bool,
    /// Set when the team completes the final stage; terminal.
    pub finished_at: Option<OffsetDateTime>,
    /// Creation timestamp.
    pub created_at: OffsetDateTime,
}

/// A player who joined a team; identified by an opaque session token.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TeamMemberEntity {
    /// Stable identifier for the member.
    pub id: Uuid,
    /// Team the member belongs to.
    pub team_id: Uuid,
    /// Display name entered at join time.
    pub display_name: String,
    /// Opaque credential presented on every mutating call.
    pub session_token: String,
    /// First joiner of a team becomes captain.
    pub is_captain: bool,
    /// Join timestamp.
    pub joined_at: OffsetDateTime,
    /// Updated on every authenticated call.
    pub last_active_at: OffsetDateTime,
}

/// An ordered checkpoint gated by an unlock code.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StageEntity {
    /// Stable identifier for the stage.
    pub id: Uuid,
    /// Owning event.
    pub event_id: Uuid,
    /// Position in the sequential unlock order.
    pub order_index: u32,
    /// Display name shown once the stage is unlocked.
    pub name: String,
    /// Entry code, compared via uppercase normalization.
    pub unlock_code: String,
    /// Flat points awarded on completion.
    pub base_points: i64,
    /// Whether fast completions earn a time bonus.
    pub time_bonus_enabled: bool,
}

/// A graduated hint attached to a stage.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HintEntity {
    /// Stable identifier for the hint.
    pub id: Uuid,
    /// Stage this hint belongs to.
    pub stage_id: Uuid,
    /// Graduation level (1 = vaguest).
    pub level: u32,
    /// Optional short title shown before reveal.
    pub title: Option<String>,
    /// Full hint text; never sent to clients before first use.
    pub content: String,
    /// Points subtracted from the stage score when revealed.
    pub point_penalty: i64,
}

/// Per-(team, stage) progress row; exactly one exists per pair once the
/// event has started.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TeamProgressEntity {
    /// Team side of the unique pair.
    pub team_id: Uuid,
    /// Stage side of the unique pair.
    pub stage_id: Uuid,
    /// Current progression state.
    pub status: ProgressStatus,
    /// When the stage became reachable.
    pub unlocked_at: Option<OffsetDateTime>,
    /// When the team started working on the stage.
    pub started_at: Option<OffsetDateTime>,
    /// When the stage was completed; frozen afterwards.
    pub completed_at: Option<OffsetDateTime>,
    /// Total submissions, correct or not; reset only by a full event reset.
    pub attempt_count: u32,
    /// Timestamp of the most recent submission.
    pub last_attempt_at: Option<OffsetDateTime>,
    /// Base points frozen at completion.
    pub points_earned: i64,
    /// Time bonus frozen at completion.
    pub time_bonus: i64,
    /// Accumulated hint penalties for this stage.
    pub hint_penalties: i64,
}

impl TeamProgressEntity {
    /// Fresh locked row for a (team, stage) pair.
    pub fn locked(team_id: Uuid, stage_id: Uuid) -> Self {
        Self {
            team_id,
            stage_id,
            status: ProgressStatus::Locked,
            unlocked_at: None,
            started_at: None,
            completed_at: None,
            attempt_count: 0,
            last_attempt_at: None,
            points_earned: 0,
            time_bonus: 0,
            hint_penalties: 0,
        }
    }

    /// Fresh active row, used for the first stage when the event starts and
    /// for each stage unlocked by the progress cascade.
    pub fn active(team_id: Uuid, stage_id: Uuid, now: OffsetDateTime) -> Self {
        Self {
            status: ProgressStatus::Active,
            unlocked_at: Some(now),
            started_at: Some(now),
            ..Self::locked(team_id, stage_id)
        }
    }
}

/// Append-only record of a hint consumption; at most one per (team, hint).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HintUsageEntity {
    /// Team that spent the coin.
    pub team_id: Uuid,
    /// Hint that was revealed.
    pub hint_id: Uuid,
    /// Session token of the requesting player.
    pub requested_by_session: String,
    /// How long the team had been on the stage when the hint was requested.
    pub time_in_stage_seconds: i64,
    /// Consumption timestamp.
    pub used_at: OffsetDateTime,
}

/// Append-only audit record of a code submission; never mutated or deleted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CodeAttemptEntity {
    /// Stable identifier for the attempt.
    pub id: Uuid,
    /// Submitting team.
    pub team_id: Uuid,
    /// Stage the code was submitted against.
    pub stage_id: Uuid,
    /// Raw submitted text, kept verbatim for anti-cheat review.
    pub submitted_code: String,
    /// Whether the submission matched the stage's unlock code.
    pub is_correct: bool,
    /// Session token of the submitting player.
    pub submitted_by_session: String,
    /// How long the team had been on the stage at submission time.
    pub time_in_stage_seconds: i64,
    /// Submission timestamp.
    pub submitted_at: OffsetDateTime,
}
