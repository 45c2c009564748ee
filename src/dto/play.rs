//! Request and response bodies for the player-facing endpoints.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    dao::models::{EventStatus, HintEntity, StageEntity, TeamEntity},
    dto::{format_timestamp, validation::validate_join_code},
};

/// Payload presented by a player joining a team.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct JoinTeamRequest {
    /// Event being joined.
    pub event_id: Uuid,
    /// Team join code; matched case-insensitively.
    #[validate(custom(function = "validate_join_code"))]
    pub join_code: String,
    /// Name shown to teammates and on scoreboards.
    #[validate(length(min = 1, max = 50))]
    pub display_name: String,
}

/// Public projection of a team exposed to REST/SSE clients.
#[derive(Clone, Debug, Serialize, ToSchema)]
pub struct TeamSummary {
    pub id: Uuid,
    pub name: String,
    pub color: String,
    pub hints_remaining: u32,
    pub total_points: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<String>,
}

impl From<TeamEntity> for TeamSummary {
    fn from(value: TeamEntity) -> Self {
        Self {
            id: value.id,
            name: value.name,
            color: value.color,
            hints_remaining: value.hints_remaining,
            total_points: value.total_points,
            finished_at: value.finished_at.map(format_timestamp),
        }
    }
}

/// Returned once a player has joined; the session token authenticates every
/// subsequent mutating call.
#[derive(Debug, Serialize, ToSchema)]
pub struct JoinTeamResponse {
    pub session_token: String,
    pub team: TeamSummary,
    pub is_captain: bool,
    pub event_status: EventStatus,
}

/// A code submission against the caller's active stage.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct ValidateCodeRequest {
    /// Team the caller claims to act for; must match the session token.
    pub team_id: Uuid,
    /// Stage the code is submitted against.
    pub stage_id: Uuid,
    /// Raw code as typed; compared after uppercase normalization.
    #[validate(length(min = 1, max = 64))]
    pub code: String,
}

/// Stage fields safe to show a team once the stage is reachable.
#[derive(Clone, Debug, Serialize, ToSchema)]
pub struct StageSummary {
    pub id: Uuid,
    pub order_index: u32,
    pub name: String,
    pub base_points: i64,
    pub time_bonus_enabled: bool,
}

impl From<StageEntity> for StageSummary {
    fn from(value: StageEntity) -> Self {
        Self {
            id: value.id,
            order_index: value.order_index,
            name: value.name,
            base_points: value.base_points,
            time_bonus_enabled: value.time_bonus_enabled,
        }
    }
}

/// Outcome of a code submission.
///
/// An incorrect code is a normal gameplay outcome and is reported with
/// `correct: false` and HTTP 200, not an error status.
#[derive(Debug, Serialize, ToSchema)]
pub struct ValidateCodeResponse {
    pub correct: bool,
    pub points_earned: i64,
    pub time_bonus: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_stage: Option<StageSummary>,
    pub event_completed: bool,
}

impl ValidateCodeResponse {
    /// Response for a wrong code.
    pub fn incorrect() -> Self {
        Self {
            correct: false,
            points_earned: 0,
            time_bonus: 0,
            next_stage: None,
            event_completed: false,
        }
    }
}

/// Request to reveal a hint for the caller's team.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct UseHintRequest {
    /// Team the caller claims to act for; must match the session token.
    pub team_id: Uuid,
    pub hint_id: Uuid,
}

/// Why a hint request was declined without error.
#[derive(Debug, Clone, Copy, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum HintDenyReason {
    /// The team's coin balance is exhausted.
    NoHintsRemaining,
    /// The hint belongs to a stage the team is not currently on.
    StageNotActive,
}

/// The revealed hint content.
#[derive(Debug, Serialize, ToSchema)]
pub struct HintReveal {
    pub id: Uuid,
    pub level: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub content: String,
    pub point_penalty: i64,
}

impl From<HintEntity> for HintReveal {
    fn from(value: HintEntity) -> Self {
        Self {
            id: value.id,
            level: value.level,
            title: value.title,
            content: value.content,
            point_penalty: value.point_penalty,
        }
    }
}

/// Outcome of a hint request.
///
/// Replays return `success: true` with `already_used: true` and never charge
/// a second coin; denials are `success: false` with a reason, again at
/// HTTP 200.
#[derive(Debug, Serialize, ToSchema)]
pub struct UseHintResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<HintDenyReason>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<HintReveal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hints_remaining: Option<u32>,
    pub already_used: bool,
}

impl UseHintResponse {
    /// A first-time reveal that charged a coin.
    pub fn revealed(hint: HintReveal, hints_remaining: u32) -> Self {
        Self {
            success: true,
            reason: None,
            hint: Some(hint),
            hints_remaining: Some(hints_remaining),
            already_used: false,
        }
    }

    /// A replay of an already-consumed hint; free.
    pub fn replay(hint: HintReveal, hints_remaining: u32) -> Self {
        Self {
            success: true,
            reason: None,
            hint: Some(hint),
            hints_remaining: Some(hints_remaining),
            already_used: true,
        }
    }

    /// A declined request.
    pub fn denied(reason: HintDenyReason) -> Self {
        Self {
            success: false,
            reason: Some(reason),
            hint: None,
            hints_remaining: None,
            already_used: false,
        }
    }
}
