//! Organizer operations: event bootstrap, inspection, and clock control.

use time::OffsetDateTime;
use tracing::info;
use uuid::Uuid;

use crate::{
    dao::models::{
        EventEntity, EventStatus, HintEntity, StageEntity, TeamEntity, TeamProgressEntity,
    },
    dto::{
        admin::{
            ControlAction, CreateEventRequest, EventControlRequest, EventControlResponse,
            EventDetailResponse, StageDetail,
        },
        timer::TimerSyncResponse,
    },
    error::ServiceError,
    services::sse_events,
    state::{
        SharedState,
        clock::{self, ClockAction},
    },
};

/// Create an event with its teams, stages, and hints in one shot.
pub async fn create_event(
    state: &SharedState,
    payload: CreateEventRequest,
) -> Result<EventDetailResponse, ServiceError> {
    let store = state.require_event_store().await?;

    ensure_unique_codes(&payload)?;

    let now = OffsetDateTime::now_utc();
    let event = EventEntity {
        id: Uuid::new_v4(),
        name: payload.name,
        status: EventStatus::Waiting,
        duration_seconds: payload.duration_seconds,
        started_at: None,
        paused_at: None,
        ended_at: None,
        accumulated_pause_seconds: 0,
        hints_per_team: payload.hints_per_team,
        max_team_size: payload.max_team_size,
        allow_late_join: payload.allow_late_join,
        created_at: now,
        updated_at: now,
    };
    store.save_event(event.clone()).await?;

    let mut teams = Vec::with_capacity(payload.teams.len());
    for input in payload.teams {
        let team = TeamEntity {
            id: Uuid::new_v4(),
            event_id: event.id,
            name: input.name,
            color: input.color,
            // Stored uppercase so lookups can normalize the probe.
            join_code: input.join_code.to_ascii_uppercase(),
            hints_remaining: event.hints_per_team,
            total_points: 0,
            is_active: true,
            finished_at: None,
            created_at: now,
        };
        store.save_team(team.clone()).await?;
        teams.push(team);
    }

    let mut stages = Vec::with_capacity(payload.stages.len());
    for (index, input) in payload.stages.into_iter().enumerate() {
        let stage = StageEntity {
            id: Uuid::new_v4(),
            event_id: event.id,
            order_index: index as u32,
            name: input.name,
            unlock_code: input.unlock_code,
            base_points: input.base_points,
            time_bonus_enabled: input.time_bonus_enabled,
        };
        store.save_stage(stage.clone()).await?;

        let mut hints = Vec::with_capacity(input.hints.len());
        for hint_input in input.hints {
            let hint = HintEntity {
                id: Uuid::new_v4(),
                stage_id: stage.id,
                level: hint_input.level,
                title: hint_input.title,
                content: hint_input.content,
                point_penalty: hint_input.point_penalty,
            };
            store.save_hint(hint.clone()).await?;
            hints.push(hint);
        }
        stages.push(StageDetail::new(stage, hints));
    }

    info!(
        event_id = %event.id,
        teams = teams.len(),
        stages = stages.len(),
        "event created"
    );

    let timer = TimerSyncResponse::new(&event, clock::read_timer(&event, now), now);
    Ok(EventDetailResponse {
        event: event.into(),
        teams: teams.into_iter().map(Into::into).collect(),
        stages,
        timer,
    })
}

/// Full organizer view of an event, unlock codes and hint contents included.
pub async fn get_event(
    state: &SharedState,
    event_id: Uuid,
) -> Result<EventDetailResponse, ServiceError> {
    let store = state.require_event_store().await?;

    let event = store
        .find_event(event_id)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("event {event_id}")))?;
    let teams = store.list_teams(event.id).await?;

    let mut stages = Vec::new();
    for stage in store.list_stages(event.id).await? {
        let hints = store.list_hints(stage.id).await?;
        stages.push(StageDetail::new(stage, hints));
    }

    let now = OffsetDateTime::now_utc();
    let timer = TimerSyncResponse::new(&event, clock::read_timer(&event, now), now);
    Ok(EventDetailResponse {
        event: event.into(),
        teams: teams.into_iter().map(Into::into).collect(),
        stages,
        timer,
    })
}

/// Apply an organizer clock transition and run its side effects.
pub async fn control(
    state: &SharedState,
    payload: EventControlRequest,
) -> Result<EventControlResponse, ServiceError> {
    let store = state.require_event_store().await?;

    let event = store
        .find_event(payload.event_id)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("event {}", payload.event_id)))?;

    let action = match payload.action {
        ControlAction::Start => ClockAction::Start,
        ControlAction::Pause => ClockAction::Pause,
        ControlAction::Resume => ClockAction::Resume,
        ControlAction::End => ClockAction::End,
        ControlAction::Reset => ClockAction::Reset,
    };

    let now = OffsetDateTime::now_utc();
    let updated = clock::apply_transition(&event, action, now)?;

    // Guarded replace: a concurrent transition between our read and this
    // write leaves the row untouched and surfaces here as a conflict.
    let stored = store
        .replace_event_if_status(updated, clock::allowed_from(action))
        .await?
        .ok_or_else(|| {
            ServiceError::InvalidState("event status changed concurrently; retry".into())
        })?;

    match action {
        ClockAction::Start => seed_progress(state, &stored, now).await?,
        ClockAction::Reset => {
            store
                .reset_event_play_data(
                    stored.id,
                    stored.hints_per_team,
                    payload.options.reset_teams,
                )
                .await?;
        }
        _ => {}
    }

    info!(event_id = %stored.id, action = ?payload.action, status = ?stored.status, "event control applied");

    let reading = clock::read_timer(&stored, now);
    let timer = TimerSyncResponse::new(&stored, reading, now);
    sse_events::broadcast_status_changed(state, stored.id, stored.status);
    sse_events::broadcast_timer_update(
        state,
        stored.id,
        TimerSyncResponse::new(&stored, reading, now),
    );

    Ok(EventControlResponse {
        event: stored.into(),
        timer,
    })
}

/// Give every team its opening position: first stage active, the rest locked.
async fn seed_progress(
    state: &SharedState,
    event: &EventEntity,
    now: OffsetDateTime,
) -> Result<(), ServiceError> {
    let store = state.require_event_store().await?;
    let stages = store.list_stages(event.id).await?;
    let teams = store.list_teams(event.id).await?;

    for team in &teams {
        for (index, stage) in stages.iter().enumerate() {
            let row = if index == 0 {
                TeamProgressEntity::active(team.id, stage.id, now)
            } else {
                TeamProgressEntity::locked(team.id, stage.id)
            };
            store.save_progress(row).await?;
        }
    }
    Ok(())
}

fn ensure_unique_codes(payload: &CreateEventRequest) -> Result<(), ServiceError> {
    let mut join_codes: Vec<String> = payload
        .teams
        .iter()
        .map(|team| team.join_code.to_ascii_uppercase())
        .collect();
    join_codes.sort();
    join_codes.dedup();
    if join_codes.len() != payload.teams.len() {
        return Err(ServiceError::InvalidInput(
            "team join codes must be unique within the event".into(),
        ));
    }

    let mut unlock_codes: Vec<String> = payload
        .stages
        .iter()
        .map(|stage| stage.unlock_code.to_uppercase())
        .collect();
    unlock_codes.sort();
    unlock_codes.dedup();
    if unlock_codes.len() != payload.stages.len() {
        return Err(ServiceError::InvalidInput(
            "stage unlock codes must be unique within the event".into(),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{
        config::AppConfig,
        dao::{
            event_store::{EventStore, memory::MemoryEventStore},
            models::ProgressStatus,
        },
        dto::admin::{ControlOptions, HintInput, StageInput, TeamInput},
        state::AppState,
    };

    fn create_request(team_codes: &[&str], stage_codes: &[&str]) -> CreateEventRequest {
        CreateEventRequest {
            name: "Night Hunt".into(),
            duration_seconds: 3600,
            hints_per_team: 3,
            max_team_size: Some(6),
            allow_late_join: false,
            teams: team_codes
                .iter()
                .map(|code| TeamInput {
                    name: format!("Team {code}"),
                    color: "#7c3aed".into(),
                    join_code: (*code).into(),
                })
                .collect(),
            stages: stage_codes
                .iter()
                .enumerate()
                .map(|(index, code)| StageInput {
                    name: format!("Stage {index}"),
                    unlock_code: (*code).into(),
                    base_points: 100,
                    time_bonus_enabled: true,
                    hints: vec![HintInput {
                        level: 1,
                        title: None,
                        content: "Look closer.".into(),
                        point_penalty: 10,
                    }],
                })
                .collect(),
        }
    }

    async fn fresh_state() -> (crate::state::SharedState, MemoryEventStore) {
        let state = AppState::new(AppConfig::default());
        let store = MemoryEventStore::new();
        state.install_event_store(Arc::new(store.clone())).await;
        (state, store)
    }

    fn control_request(event_id: Uuid, action: ControlAction) -> EventControlRequest {
        EventControlRequest {
            event_id,
            action,
            options: ControlOptions::default(),
        }
    }

    #[tokio::test]
    async fn create_event_persists_the_full_tree() {
        let (state, store) = fresh_state().await;

        let detail = create_event(&state, create_request(&["red1", "blue2"], &["ALPHA", "BETA"]))
            .await
            .unwrap();
        assert_eq!(detail.event.status, EventStatus::Waiting);
        assert_eq!(detail.teams.len(), 2);
        assert_eq!(detail.stages.len(), 2);
        assert_eq!(detail.timer.remaining_seconds, 3600);

        let stages = store.list_stages(detail.event.id).await.unwrap();
        assert_eq!(stages[0].order_index, 0);
        assert_eq!(stages[1].order_index, 1);

        // Join codes are stored uppercase with the per-event hint budget.
        let teams = store.list_teams(detail.event.id).await.unwrap();
        assert!(teams.iter().any(|team| team.join_code == "RED1"));
        assert!(teams.iter().all(|team| team.hints_remaining == 3));
    }

    #[tokio::test]
    async fn duplicate_join_codes_are_rejected() {
        let (state, _) = fresh_state().await;

        let err = create_event(&state, create_request(&["red1", "RED1"], &["ALPHA"]))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn duplicate_unlock_codes_are_rejected() {
        let (state, _) = fresh_state().await;

        let err = create_event(&state, create_request(&["red1"], &["alpha", "ALPHA"]))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn start_seeds_progress_for_every_team() {
        let (state, store) = fresh_state().await;
        let detail = create_event(&state, create_request(&["red1", "blue2"], &["ALPHA", "BETA"]))
            .await
            .unwrap();

        let response = control(&state, control_request(detail.event.id, ControlAction::Start))
            .await
            .unwrap();
        assert_eq!(response.event.status, EventStatus::Running);

        let stages = store.list_stages(detail.event.id).await.unwrap();
        for team in store.list_teams(detail.event.id).await.unwrap() {
            let first = store
                .find_progress(team.id, stages[0].id)
                .await
                .unwrap()
                .unwrap();
            assert_eq!(first.status, ProgressStatus::Active);
            let second = store
                .find_progress(team.id, stages[1].id)
                .await
                .unwrap()
                .unwrap();
            assert_eq!(second.status, ProgressStatus::Locked);
        }
    }

    #[tokio::test]
    async fn illegal_transition_is_rejected() {
        let (state, _) = fresh_state().await;
        let detail = create_event(&state, create_request(&["red1"], &["ALPHA"]))
            .await
            .unwrap();

        // Pausing an event that never started.
        let err = control(&state, control_request(detail.event.id, ControlAction::Pause))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidState(_)));
    }

    #[tokio::test]
    async fn pause_and_resume_round_trip() {
        let (state, _) = fresh_state().await;
        let detail = create_event(&state, create_request(&["red1"], &["ALPHA"]))
            .await
            .unwrap();

        control(&state, control_request(detail.event.id, ControlAction::Start))
            .await
            .unwrap();
        let paused = control(&state, control_request(detail.event.id, ControlAction::Pause))
            .await
            .unwrap();
        assert_eq!(paused.event.status, EventStatus::Paused);

        let resumed = control(&state, control_request(detail.event.id, ControlAction::Resume))
            .await
            .unwrap();
        assert_eq!(resumed.event.status, EventStatus::Running);
    }

    #[tokio::test]
    async fn reset_returns_the_event_to_waiting_and_wipes_play_data() {
        let (state, store) = fresh_state().await;
        let detail = create_event(&state, create_request(&["red1"], &["ALPHA"]))
            .await
            .unwrap();

        control(&state, control_request(detail.event.id, ControlAction::Start))
            .await
            .unwrap();
        let response = control(&state, control_request(detail.event.id, ControlAction::Reset))
            .await
            .unwrap();
        assert_eq!(response.event.status, EventStatus::Waiting);
        assert_eq!(response.timer.elapsed_seconds, 0);

        let stages = store.list_stages(detail.event.id).await.unwrap();
        let team = store.list_teams(detail.event.id).await.unwrap().remove(0);
        assert!(
            store
                .find_progress(team.id, stages[0].id)
                .await
                .unwrap()
                .is_none()
        );
    }
}
