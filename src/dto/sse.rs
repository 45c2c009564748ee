//! Payloads carried on the per-event SSE streams.

use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    dao::models::EventStatus,
    dto::{play::TeamSummary, timer::TimerSyncResponse},
};

#[derive(Clone, Debug)]
/// Dispatched payload carried across SSE channels.
pub struct ServerEvent {
    pub event: Option<String>,
    pub data: String,
}

impl ServerEvent {
    /// Convenience wrapper that serialises `payload` into the SSE data field.
    pub fn json<E, T>(event: E, payload: &T) -> serde_json::Result<Self>
    where
        E: Into<Option<String>>,
        T: Serialize,
    {
        Ok(Self {
            event: event.into(),
            data: serde_json::to_string(payload)?,
        })
    }
}

#[derive(Debug, Serialize, ToSchema)]
/// Initial metadata sent to an SSE client when it connects.
pub struct Handshake {
    /// Event the stream is scoped to.
    pub event_id: Uuid,
    /// Human-readable message confirming the subscription.
    pub message: String,
    /// Whether the backend is running without a storage backend connection.
    pub degraded: bool,
}

#[derive(Debug, Serialize, ToSchema)]
/// Broadcast when the backend enters or leaves degraded mode.
pub struct SystemStatus {
    pub degraded: bool,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(transparent)]
/// Broadcast after every clock transition so dashboards resync immediately
/// instead of waiting for their next poll.
pub struct TimerUpdateEvent(pub TimerSyncResponse);

#[derive(Debug, Serialize, ToSchema)]
/// Broadcast when the event's lifecycle status changes.
pub struct StatusChangedEvent {
    pub status: EventStatus,
}

#[derive(Debug, Serialize, ToSchema)]
/// Broadcast when a player joins a team.
pub struct TeamJoinedEvent {
    pub team_id: Uuid,
    pub display_name: String,
    pub member_count: u64,
}

#[derive(Debug, Serialize, ToSchema)]
/// Broadcast when a team completes a stage.
pub struct StageCompletedEvent {
    pub team_id: Uuid,
    pub stage_id: Uuid,
    pub points_earned: i64,
    pub time_bonus: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_stage_id: Option<Uuid>,
    pub event_completed: bool,
}

#[derive(Debug, Serialize, ToSchema)]
/// Broadcast when a team spends a hint coin.
pub struct HintUsedEvent {
    pub team_id: Uuid,
    pub stage_id: Uuid,
    pub hint_id: Uuid,
    pub hints_remaining: u32,
}

#[derive(Debug, Serialize, ToSchema)]
/// Broadcast when a team completes the final stage.
pub struct TeamFinishedEvent {
    pub team: TeamSummary,
}
