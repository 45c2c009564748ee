//! Organizer-facing request and response bodies.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    dao::models::{EventEntity, EventStatus, HintEntity, StageEntity},
    dto::{
        format_timestamp,
        play::{StageSummary, TeamSummary},
        timer::TimerSyncResponse,
        validation::{validate_hex_color, validate_join_code},
    },
};

/// Clock transitions exposed on the control endpoint.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ControlAction {
    Start,
    Pause,
    Resume,
    End,
    Reset,
}

/// Extra knobs for the reset action.
#[derive(Debug, Default, Clone, Copy, Deserialize, ToSchema)]
pub struct ControlOptions {
    /// Also delete teams and members instead of only wiping play data.
    #[serde(default)]
    pub reset_teams: bool,
}

/// Organizer command against an event's clock.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct EventControlRequest {
    pub event_id: Uuid,
    pub action: ControlAction,
    #[serde(default)]
    pub options: ControlOptions,
}

/// Event fields exposed to organizers and dashboards.
#[derive(Debug, Serialize, ToSchema)]
pub struct EventSummary {
    pub id: Uuid,
    pub name: String,
    pub status: EventStatus,
    pub duration_seconds: i64,
    pub hints_per_team: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_team_size: Option<u32>,
    pub allow_late_join: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<String>,
    pub created_at: String,
}

impl From<EventEntity> for EventSummary {
    fn from(value: EventEntity) -> Self {
        Self {
            id: value.id,
            name: value.name,
            status: value.status,
            duration_seconds: value.duration_seconds,
            hints_per_team: value.hints_per_team,
            max_team_size: value.max_team_size,
            allow_late_join: value.allow_late_join,
            started_at: value.started_at.map(format_timestamp),
            ended_at: value.ended_at.map(format_timestamp),
            created_at: format_timestamp(value.created_at),
        }
    }
}

/// Returned after a control action: the new event state plus a fresh clock
/// reading so dashboards update without a second round-trip.
#[derive(Debug, Serialize, ToSchema)]
pub struct EventControlResponse {
    pub event: EventSummary,
    pub timer: TimerSyncResponse,
}

/// Payload used to bootstrap a brand-new event with its teams and stages.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct CreateEventRequest {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    /// Countdown length; one minute to twenty-four hours.
    #[validate(range(min = 60, max = 86400))]
    pub duration_seconds: i64,
    #[serde(default = "default_hints_per_team")]
    pub hints_per_team: u32,
    #[serde(default)]
    pub max_team_size: Option<u32>,
    #[serde(default)]
    pub allow_late_join: bool,
    #[validate(nested)]
    pub teams: Vec<TeamInput>,
    /// Stages in play order; position in the list fixes the unlock order.
    #[validate(length(min = 1), nested)]
    pub stages: Vec<StageInput>,
}

fn default_hints_per_team() -> u32 {
    5
}

/// Incoming team definition for the event bootstrap.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct TeamInput {
    #[validate(length(min = 1, max = 50))]
    pub name: String,
    #[validate(custom(function = "validate_hex_color"))]
    pub color: String,
    #[validate(custom(function = "validate_join_code"))]
    pub join_code: String,
}

/// Incoming stage definition, hints included.
// Serialize is required by the `length` validator on `CreateEventRequest.stages`,
// which embeds the offending value in its error params.
#[derive(Debug, Serialize, Deserialize, ToSchema, Validate)]
pub struct StageInput {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    #[validate(length(min = 1, max = 64))]
    pub unlock_code: String,
    pub base_points: i64,
    #[serde(default = "default_time_bonus_enabled")]
    pub time_bonus_enabled: bool,
    #[serde(default)]
    #[validate(nested)]
    pub hints: Vec<HintInput>,
}

fn default_time_bonus_enabled() -> bool {
    true
}

/// Incoming hint definition for a stage.
#[derive(Debug, Serialize, Deserialize, ToSchema, Validate)]
pub struct HintInput {
    /// Graduation level, 1 being the vaguest.
    #[validate(range(min = 1, max = 10))]
    pub level: u32,
    #[serde(default)]
    pub title: Option<String>,
    #[validate(length(min = 1, max = 2000))]
    pub content: String,
    pub point_penalty: i64,
}

/// Stage projection for organizers, unlock code and hint contents included.
#[derive(Debug, Serialize, ToSchema)]
pub struct StageDetail {
    #[serde(flatten)]
    pub summary: StageSummary,
    pub unlock_code: String,
    pub hints: Vec<HintDetail>,
}

/// Full hint projection for organizers.
#[derive(Debug, Serialize, ToSchema)]
pub struct HintDetail {
    pub id: Uuid,
    pub level: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub content: String,
    pub point_penalty: i64,
}

impl From<HintEntity> for HintDetail {
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

impl StageDetail {
    /// Assemble the organizer view of a stage with its hints.
    pub fn new(stage: StageEntity, hints: Vec<HintEntity>) -> Self {
        let unlock_code = stage.unlock_code.clone();
        Self {
            summary: stage.into(),
            unlock_code,
            hints: hints.into_iter().map(Into::into).collect(),
        }
    }
}

/// Full organizer view of an event.
#[derive(Debug, Serialize, ToSchema)]
pub struct EventDetailResponse {
    pub event: EventSummary,
    pub teams: Vec<TeamSummary>,
    pub stages: Vec<StageDetail>,
    pub timer: TimerSyncResponse,
}

#[cfg(test)]
mod tests {
    use validator::Validate;

    use super::*;

    fn create_request(stages: Vec<StageInput>) -> CreateEventRequest {
        CreateEventRequest {
            name: "Night Hunt".into(),
            duration_seconds: 3600,
            hints_per_team: 5,
            max_team_size: None,
            allow_late_join: false,
            teams: vec![TeamInput {
                name: "Purple".into(),
                color: "#7c3aed".into(),
                join_code: "PURPLE7".into(),
            }],
            stages,
        }
    }

    fn stage(name: &str) -> StageInput {
        StageInput {
            name: name.into(),
            unlock_code: "CODE0".into(),
            base_points: 100,
            time_bonus_enabled: true,
            hints: vec![HintInput {
                level: 1,
                title: None,
                content: "Look behind the painting.".into(),
                point_penalty: 20,
            }],
        }
    }

    #[test]
    fn an_event_needs_at_least_one_stage() {
        let request = create_request(Vec::new());
        let errors = request.validate().unwrap_err();
        assert!(errors.errors().contains_key("stages"));
    }

    #[test]
    fn a_well_formed_request_validates() {
        let request = create_request(vec![stage("Cipher")]);
        assert!(request.validate().is_ok());
    }
}
