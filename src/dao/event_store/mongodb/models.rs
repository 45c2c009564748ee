//! BSON document shapes for the store's collections.
//!
//! Timestamps cross the boundary as BSON datetimes, uuids as binary subtype
//! 4, and status enums as the same lowercase strings the wire uses, so the
//! collections stay queryable from `mongosh`.

use mongodb::bson::{Binary, DateTime, Document, doc, spec::BinarySubtype};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::dao::models::{
    CodeAttemptEntity, EventEntity, EventStatus, HintEntity, HintUsageEntity, ProgressStatus,
    StageEntity, TeamEntity, TeamMemberEntity, TeamProgressEntity,
};

pub fn uuid_as_binary(id: Uuid) -> Binary {
    Binary {
        subtype: BinarySubtype::Uuid,
        bytes: id.into_bytes().to_vec(),
    }
}

pub fn doc_id(id: Uuid) -> Document {
    doc! {"_id": uuid_as_binary(id)}
}

/// Lowercase status string matching the serde representation, usable inside
/// query filters.
pub fn event_status_str(status: EventStatus) -> &'static str {
    match status {
        EventStatus::Waiting => "waiting",
        EventStatus::Running => "running",
        EventStatus::Paused => "paused",
        EventStatus::Finished => "finished",
    }
}

pub fn progress_status_str(status: ProgressStatus) -> &'static str {
    match status {
        ProgressStatus::Locked => "locked",
        ProgressStatus::Active => "active",
        ProgressStatus::Completed => "completed",
        ProgressStatus::Skipped => "skipped",
    }
}

fn to_bson_dt(value: OffsetDateTime) -> DateTime {
    DateTime::from_system_time(value.into())
}

fn from_bson_dt(value: DateTime) -> OffsetDateTime {
    value.to_system_time().into()
}

fn to_bson_dt_opt(value: Option<OffsetDateTime>) -> Option<DateTime> {
    value.map(to_bson_dt)
}

fn from_bson_dt_opt(value: Option<DateTime>) -> Option<OffsetDateTime> {
    value.map(from_bson_dt)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoEventDocument {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub name: String,
    pub status: EventStatus,
    pub duration_seconds: i64,
    pub started_at: Option<DateTime>,
    pub paused_at: Option<DateTime>,
    pub ended_at: Option<DateTime>,
    pub accumulated_pause_seconds: i64,
    pub hints_per_team: u32,
    pub max_team_size: Option<u32>,
    pub allow_late_join: bool,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

impl From<EventEntity> for MongoEventDocument {
    fn from(value: EventEntity) -> Self {
        Self {
            id: value.id,
            name: value.name,
            status: value.status,
            duration_seconds: value.duration_seconds,
            started_at: to_bson_dt_opt(value.started_at),
            paused_at: to_bson_dt_opt(value.paused_at),
            ended_at: to_bson_dt_opt(value.ended_at),
            accumulated_pause_seconds: value.accumulated_pause_seconds,
            hints_per_team: value.hints_per_team,
            max_team_size: value.max_team_size,
            allow_late_join: value.allow_late_join,
            created_at: to_bson_dt(value.created_at),
            updated_at: to_bson_dt(value.updated_at),
        }
    }
}

impl From<MongoEventDocument> for EventEntity {
    fn from(value: MongoEventDocument) -> Self {
        Self {
            id: value.id,
            name: value.name,
            status: value.status,
            duration_seconds: value.duration_seconds,
            started_at: from_bson_dt_opt(value.started_at),
            paused_at: from_bson_dt_opt(value.paused_at),
            ended_at: from_bson_dt_opt(value.ended_at),
            accumulated_pause_seconds: value.accumulated_pause_seconds,
            hints_per_team: value.hints_per_team,
            max_team_size: value.max_team_size,
            allow_late_join: value.allow_late_join,
            created_at: from_bson_dt(value.created_at),
            updated_at: from_bson_dt(value.updated_at),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoTeamDocument {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub event_id: Uuid,
    pub name: String,
    pub color: String,
    pub join_code: String,
    pub hints_remaining: u32,
    pub total_points: i64,
    pub is_active: bool,
    pub finished_at: Option<DateTime>,
    pub created_at: DateTime,
}

impl From<TeamEntity> for MongoTeamDocument {
    fn from(value: TeamEntity) -> Self {
        Self {
            id: value.id,
            event_id: value.event_id,
            name: value.name,
            color: value.color,
            join_code: value.join_code,
            hints_remaining: value.hints_remaining,
            total_points: value.total_points,
            is_active: value.is_active,
            finished_at: to_bson_dt_opt(value.finished_at),
            created_at: to_bson_dt(value.created_at),
        }
    }
}

impl From<MongoTeamDocument> for TeamEntity {
    fn from(value: MongoTeamDocument) -> Self {
        Self {
            id: value.id,
            event_id: value.event_id,
            name: value.name,
            color: value.color,
            join_code: value.join_code,
            hints_remaining: value.hints_remaining,
            total_points: value.total_points,
            is_active: value.is_active,
            finished_at: from_bson_dt_opt(value.finished_at),
            created_at: from_bson_dt(value.created_at),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoMemberDocument {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub team_id: Uuid,
    pub display_name: String,
    pub session_token: String,
    pub is_captain: bool,
    pub joined_at: DateTime,
    pub last_active_at: DateTime,
}

impl From<TeamMemberEntity> for MongoMemberDocument {
    fn from(value: TeamMemberEntity) -> Self {
        Self {
            id: value.id,
            team_id: value.team_id,
            display_name: value.display_name,
            session_token: value.session_token,
            is_captain: value.is_captain,
            joined_at: to_bson_dt(value.joined_at),
            last_active_at: to_bson_dt(value.last_active_at),
        }
    }
}

impl From<MongoMemberDocument> for TeamMemberEntity {
    fn from(value: MongoMemberDocument) -> Self {
        Self {
            id: value.id,
            team_id: value.team_id,
            display_name: value.display_name,
            session_token: value.session_token,
            is_captain: value.is_captain,
            joined_at: from_bson_dt(value.joined_at),
            last_active_at: from_bson_dt(value.last_active_at),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoStageDocument {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub event_id: Uuid,
    pub order_index: u32,
    pub name: String,
    pub unlock_code: String,
    pub base_points: i64,
    pub time_bonus_enabled: bool,
}

impl From<StageEntity> for MongoStageDocument {
    fn from(value: StageEntity) -> Self {
        Self {
            id: value.id,
            event_id: value.event_id,
            order_index: value.order_index,
            name: value.name,
            unlock_code: value.unlock_code,
            base_points: value.base_points,
            time_bonus_enabled: value.time_bonus_enabled,
        }
    }
}

impl From<MongoStageDocument> for StageEntity {
    fn from(value: MongoStageDocument) -> Self {
        Self {
            id: value.id,
            event_id: value.event_id,
            order_index: value.order_index,
            name: value.name,
            unlock_code: value.unlock_code,
            base_points: value.base_points,
            time_bonus_enabled: value.time_bonus_enabled,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoHintDocument {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub stage_id: Uuid,
    pub level: u32,
    pub title: Option<String>,
    pub content: String,
    pub point_penalty: i64,
}

impl From<HintEntity> for MongoHintDocument {
    fn from(value: HintEntity) -> Self {
        Self {
            id: value.id,
            stage_id: value.stage_id,
            level: value.level,
            title: value.title,
            content: value.content,
            point_penalty: value.point_penalty,
        }
    }
}

impl From<MongoHintDocument> for HintEntity {
    fn from(value: MongoHintDocument) -> Self {
        Self {
            id: value.id,
            stage_id: value.stage_id,
            level: value.level,
            title: value.title,
            content: value.content,
            point_penalty: value.point_penalty,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoProgressDocument {
    pub team_id: Uuid,
    pub stage_id: Uuid,
    pub status: ProgressStatus,
    pub unlocked_at: Option<DateTime>,
    pub started_at: Option<DateTime>,
    pub completed_at: Option<DateTime>,
    pub attempt_count: u32,
    pub last_attempt_at: Option<DateTime>,
    pub points_earned: i64,
    pub time_bonus: i64,
    pub hint_penalties: i64,
}

impl From<TeamProgressEntity> for MongoProgressDocument {
    fn from(value: TeamProgressEntity) -> Self {
        Self {
            team_id: value.team_id,
            stage_id: value.stage_id,
            status: value.status,
            unlocked_at: to_bson_dt_opt(value.unlocked_at),
            started_at: to_bson_dt_opt(value.started_at),
            completed_at: to_bson_dt_opt(value.completed_at),
            attempt_count: value.attempt_count,
            last_attempt_at: to_bson_dt_opt(value.last_attempt_at),
            points_earned: value.points_earned,
            time_bonus: value.time_bonus,
            hint_penalties: value.hint_penalties,
        }
    }
}

impl From<MongoProgressDocument> for TeamProgressEntity {
    fn from(value: MongoProgressDocument) -> Self {
        Self {
            team_id: value.team_id,
            stage_id: value.stage_id,
            status: value.status,
            unlocked_at: from_bson_dt_opt(value.unlocked_at),
            started_at: from_bson_dt_opt(value.started_at),
            completed_at: from_bson_dt_opt(value.completed_at),
            attempt_count: value.attempt_count,
            last_attempt_at: from_bson_dt_opt(value.last_attempt_at),
            points_earned: value.points_earned,
            time_bonus: value.time_bonus,
            hint_penalties: value.hint_penalties,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoHintUsageDocument {
    pub team_id: Uuid,
    pub hint_id: Uuid,
    pub requested_by_session: String,
    pub time_in_stage_seconds: i64,
    pub used_at: DateTime,
}

impl From<HintUsageEntity> for MongoHintUsageDocument {
    fn from(value: HintUsageEntity) -> Self {
        Self {
            team_id: value.team_id,
            hint_id: value.hint_id,
            requested_by_session: value.requested_by_session,
            time_in_stage_seconds: value.time_in_stage_seconds,
            used_at: to_bson_dt(value.used_at),
        }
    }
}

impl From<MongoHintUsageDocument> for HintUsageEntity {
    fn from(value: MongoHintUsageDocument) -> Self {
        Self {
            team_id: value.team_id,
            hint_id: value.hint_id,
            requested_by_session: value.requested_by_session,
            time_in_stage_seconds: value.time_in_stage_seconds,
            used_at: from_bson_dt(value.used_at),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoCodeAttemptDocument {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub team_id: Uuid,
    pub stage_id: Uuid,
    pub submitted_code: String,
    pub is_correct: bool,
    pub submitted_by_session: String,
    pub time_in_stage_seconds: i64,
    pub submitted_at: DateTime,
}

impl From<CodeAttemptEntity> for MongoCodeAttemptDocument {
    fn from(value: CodeAttemptEntity) -> Self {
        Self {
            id: value.id,
            team_id: value.team_id,
            stage_id: value.stage_id,
            submitted_code: value.submitted_code,
            is_correct: value.is_correct,
            submitted_by_session: value.submitted_by_session,
            time_in_stage_seconds: value.time_in_stage_seconds,
            submitted_at: to_bson_dt(value.submitted_at),
        }
    }
}

impl From<MongoCodeAttemptDocument> for CodeAttemptEntity {
    fn from(value: MongoCodeAttemptDocument) -> Self {
        Self {
            id: value.id,
            team_id: value.team_id,
            stage_id: value.stage_id,
            submitted_code: value.submitted_code,
            is_correct: value.is_correct,
            submitted_by_session: value.submitted_by_session,
            time_in_stage_seconds: value.time_in_stage_seconds,
            submitted_at: from_bson_dt(value.submitted_at),
        }
    }
}
