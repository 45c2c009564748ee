//! Broadcast helpers that fan realtime notifications out to the SSE hub of
//! the event they concern.

use serde::Serialize;
use tracing::warn;
use uuid::Uuid;

use crate::{
    dao::models::{EventStatus, TeamEntity},
    dto::{
        sse::{
            HintUsedEvent, ServerEvent, StageCompletedEvent, StatusChangedEvent, SystemStatus,
            TeamFinishedEvent, TeamJoinedEvent, TimerUpdateEvent,
        },
        timer::TimerSyncResponse,
    },
    state::SharedState,
};

const EVENT_TIMER_UPDATE: &str = "timer.update";
const EVENT_STATUS_CHANGED: &str = "status.changed";
const EVENT_TEAM_JOINED: &str = "team.joined";
const EVENT_STAGE_COMPLETED: &str = "stage.completed";
const EVENT_HINT_USED: &str = "hint.used";
const EVENT_TEAM_FINISHED: &str = "team.finished";
const EVENT_SYSTEM_STATUS: &str = "system.status";

/// Broadcast a fresh clock reading after a control transition or expiry.
pub fn broadcast_timer_update(state: &SharedState, event_id: Uuid, timer: TimerSyncResponse) {
    send_event(state, event_id, EVENT_TIMER_UPDATE, &TimerUpdateEvent(timer));
}

/// Broadcast a lifecycle status change.
pub fn broadcast_status_changed(state: &SharedState, event_id: Uuid, status: EventStatus) {
    send_event(
        state,
        event_id,
        EVENT_STATUS_CHANGED,
        &StatusChangedEvent { status },
    );
}

/// Broadcast that a player joined a team.
pub fn broadcast_team_joined(
    state: &SharedState,
    event_id: Uuid,
    team_id: Uuid,
    display_name: &str,
    member_count: u64,
) {
    send_event(
        state,
        event_id,
        EVENT_TEAM_JOINED,
        &TeamJoinedEvent {
            team_id,
            display_name: display_name.to_owned(),
            member_count,
        },
    );
}

/// Broadcast a stage completion with its scoring breakdown.
pub fn broadcast_stage_completed(state: &SharedState, event_id: Uuid, payload: StageCompletedEvent) {
    send_event(state, event_id, EVENT_STAGE_COMPLETED, &payload);
}

/// Broadcast a hint reveal and the team's new coin balance.
pub fn broadcast_hint_used(state: &SharedState, event_id: Uuid, payload: HintUsedEvent) {
    send_event(state, event_id, EVENT_HINT_USED, &payload);
}

/// Broadcast that a team completed the final stage.
pub fn broadcast_team_finished(state: &SharedState, event_id: Uuid, team: TeamEntity) {
    send_event(
        state,
        event_id,
        EVENT_TEAM_FINISHED,
        &TeamFinishedEvent { team: team.into() },
    );
}

/// Broadcast a degraded-mode flip to every connected stream.
pub fn broadcast_system_status(state: &SharedState, degraded: bool) {
    match ServerEvent::json(Some(EVENT_SYSTEM_STATUS.to_string()), &SystemStatus { degraded }) {
        Ok(event) => state.channels().broadcast_all(event),
        Err(err) => warn!(error = %err, "failed to serialize system status payload"),
    }
}

fn send_event(state: &SharedState, event_id: Uuid, event: &str, payload: &impl Serialize) {
    match ServerEvent::json(Some(event.to_string()), payload) {
        Ok(event) => state.channels().hub_for(event_id).broadcast(event),
        Err(err) => warn!(event, error = %err, "failed to serialize SSE payload"),
    }
}
