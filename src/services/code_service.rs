//! Code submission flow: audit, validation, scoring, and the sequential
//! progress cascade.

use time::OffsetDateTime;
use tracing::info;
use uuid::Uuid;

use crate::{
    dao::models::{
        CodeAttemptEntity, EventStatus, ProgressStatus, StageEntity, TeamProgressEntity,
    },
    dto::{
        play::{ValidateCodeRequest, ValidateCodeResponse},
        sse::StageCompletedEvent,
    },
    error::ServiceError,
    services::{sse_events, team_service},
    state::SharedState,
};

/// Validate a code submission against the caller's active stage.
///
/// Every submission is appended to the audit log before its outcome is
/// applied, wrong codes included.
pub async fn submit_code(
    state: &SharedState,
    session_token: &str,
    payload: ValidateCodeRequest,
) -> Result<ValidateCodeResponse, ServiceError> {
    let (member, team, event) = team_service::authenticate(state, session_token).await?;
    if payload.team_id != team.id {
        return Err(ServiceError::Forbidden(
            "session token does not belong to this team".into(),
        ));
    }
    let store = state.require_event_store().await?;

    if event.status != EventStatus::Running {
        return Err(ServiceError::InvalidState(
            "codes can only be submitted while the event is running".into(),
        ));
    }
    if team.finished_at.is_some() {
        return Err(ServiceError::InvalidState(
            "team has already finished the event".into(),
        ));
    }

    let stage = store
        .find_stage(payload.stage_id)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("stage {}", payload.stage_id)))?;
    if stage.event_id != event.id {
        return Err(ServiceError::InvalidInput(
            "stage does not belong to this event".into(),
        ));
    }

    let progress = store
        .find_progress(team.id, stage.id)
        .await?
        .ok_or_else(|| ServiceError::InvalidState("stage is locked".into()))?;
    if progress.status != ProgressStatus::Active {
        return Err(ServiceError::InvalidState(
            "stage is not the team's active stage".into(),
        ));
    }

    let now = OffsetDateTime::now_utc();
    let time_in_stage = progress
        .started_at
        .map(|started| (now - started).whole_seconds().max(0))
        .unwrap_or(0);

    let correct = payload.code.trim().to_uppercase() == stage.unlock_code.to_uppercase();
    store
        .append_code_attempt(CodeAttemptEntity {
            id: Uuid::new_v4(),
            team_id: team.id,
            stage_id: stage.id,
            submitted_code: payload.code.clone(),
            is_correct: correct,
            submitted_by_session: member.session_token.clone(),
            time_in_stage_seconds: time_in_stage,
            submitted_at: now,
        })
        .await?;

    if !correct {
        store.record_attempt_failure(team.id, stage.id, now).await?;
        return Ok(ValidateCodeResponse::incorrect());
    }

    let time_bonus = compute_time_bonus(state, &stage, time_in_stage);

    let mut completed = progress.clone();
    completed.status = ProgressStatus::Completed;
    completed.completed_at = Some(now);
    completed.attempt_count += 1;
    completed.last_attempt_at = Some(now);
    completed.points_earned = stage.base_points;
    completed.time_bonus = time_bonus;

    // One-shot guard: a concurrent correct submission already closed the
    // stage, so this one scores nothing.
    if !store.complete_progress_if_active(completed).await? {
        return Err(ServiceError::InvalidState(
            "stage was already completed".into(),
        ));
    }

    let delta = stage.base_points + time_bonus - progress.hint_penalties;
    store.add_team_points(team.id, delta).await?;

    let stages = store.list_stages(event.id).await?;
    let next_stage = stages
        .into_iter()
        .find(|candidate| candidate.order_index > stage.order_index);

    let event_completed = match &next_stage {
        Some(next) => {
            unlock_stage(state, team.id, next.id, now).await?;
            false
        }
        None => {
            store.mark_team_finished(team.id, now).await?;
            if let Some(finished) = store.find_team(team.id).await? {
                sse_events::broadcast_team_finished(state, event.id, finished);
            }
            true
        }
    };

    info!(
        event_id = %event.id,
        team_id = %team.id,
        stage_id = %stage.id,
        points = stage.base_points,
        bonus = time_bonus,
        "stage completed"
    );
    sse_events::broadcast_stage_completed(
        state,
        event.id,
        StageCompletedEvent {
            team_id: team.id,
            stage_id: stage.id,
            points_earned: stage.base_points,
            time_bonus,
            next_stage_id: next_stage.as_ref().map(|next| next.id),
            event_completed,
        },
    );

    Ok(ValidateCodeResponse {
        correct: true,
        points_earned: stage.base_points,
        time_bonus,
        next_stage: next_stage.map(Into::into),
        event_completed,
    })
}

/// Time bonus for a completion `time_in_stage` seconds into the stage.
fn compute_time_bonus(state: &SharedState, stage: &StageEntity, time_in_stage: i64) -> i64 {
    let config = state.config();
    if !stage.time_bonus_enabled || time_in_stage >= config.time_bonus_window_seconds {
        return 0;
    }
    (config.time_bonus_window_seconds - time_in_stage) / config.time_bonus_divisor
}

/// Move a team's progress row for `stage_id` to active, creating it when the
/// row does not exist yet.
async fn unlock_stage(
    state: &SharedState,
    team_id: Uuid,
    stage_id: Uuid,
    now: OffsetDateTime,
) -> Result<(), ServiceError> {
    let store = state.require_event_store().await?;

    let row = match store.find_progress(team_id, stage_id).await? {
        Some(mut locked) => {
            locked.status = ProgressStatus::Active;
            locked.unlocked_at = Some(now);
            locked.started_at = Some(now);
            locked
        }
        None => TeamProgressEntity::active(team_id, stage_id, now),
    };
    store.save_progress(row).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use time::{Duration, macros::datetime};

    use super::*;
    use crate::{
        config::AppConfig,
        dao::{
            event_store::{EventStore, memory::MemoryEventStore},
            models::{EventEntity, TeamEntity, TeamMemberEntity},
        },
        state::{AppState, SharedState},
    };

    struct Fixture {
        state: SharedState,
        store: MemoryEventStore,
        event: EventEntity,
        team: TeamEntity,
        stages: Vec<StageEntity>,
        token: String,
    }

    async fn fixture(stage_count: usize) -> Fixture {
        let state = AppState::new(AppConfig::default());
        let store = MemoryEventStore::new();
        let now = OffsetDateTime::now_utc();

        let event = EventEntity {
            id: Uuid::new_v4(),
            name: "Night Hunt".into(),
            status: EventStatus::Running,
            duration_seconds: 3600,
            started_at: Some(now - Duration::minutes(5)),
            paused_at: None,
            ended_at: None,
            accumulated_pause_seconds: 0,
            hints_per_team: 5,
            max_team_size: None,
            allow_late_join: false,
            created_at: datetime!(2025-06-01 09:00 UTC),
            updated_at: now,
        };
        store.save_event(event.clone()).await.unwrap();

        let team = TeamEntity {
            id: Uuid::new_v4(),
            event_id: event.id,
            name: "Purple".into(),
            color: "#7c3aed".into(),
            join_code: "PURPLE7".into(),
            hints_remaining: 5,
            total_points: 0,
            is_active: true,
            finished_at: None,
            created_at: now,
        };
        store.save_team(team.clone()).await.unwrap();

        let token = "session-token".to_string();
        store
            .insert_member(TeamMemberEntity {
                id: Uuid::new_v4(),
                team_id: team.id,
                display_name: "Ada".into(),
                session_token: token.clone(),
                is_captain: true,
                joined_at: now,
                last_active_at: now,
            })
            .await
            .unwrap();

        let mut stages = Vec::new();
        for index in 0..stage_count {
            let stage = StageEntity {
                id: Uuid::new_v4(),
                event_id: event.id,
                order_index: index as u32,
                name: format!("Stage {index}"),
                unlock_code: format!("CODE{index}"),
                base_points: 100,
                time_bonus_enabled: false,
            };
            store.save_stage(stage.clone()).await.unwrap();
            stages.push(stage);
        }

        // First stage active, the rest locked, as the start transition does.
        store
            .save_progress(TeamProgressEntity::active(team.id, stages[0].id, now))
            .await
            .unwrap();
        for stage in &stages[1..] {
            store
                .save_progress(TeamProgressEntity::locked(team.id, stage.id))
                .await
                .unwrap();
        }

        state.install_event_store(Arc::new(store.clone())).await;
        Fixture {
            state,
            store,
            event,
            team,
            stages,
            token,
        }
    }

    impl Fixture {
        fn request(&self, stage_id: Uuid, code: &str) -> ValidateCodeRequest {
            ValidateCodeRequest {
                team_id: self.team.id,
                stage_id,
                code: code.into(),
            }
        }
    }

    #[tokio::test]
    async fn wrong_code_records_failure_without_scoring() {
        let fx = fixture(2).await;

        let response = submit_code(&fx.state, &fx.token, fx.request(fx.stages[0].id, "NOPE"))
            .await
            .unwrap();
        assert!(!response.correct);
        assert_eq!(response.points_earned, 0);

        let progress = fx
            .store
            .find_progress(fx.team.id, fx.stages[0].id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(progress.status, ProgressStatus::Active);
        assert_eq!(progress.attempt_count, 1);

        let team = fx.store.find_team(fx.team.id).await.unwrap().unwrap();
        assert_eq!(team.total_points, 0);
    }

    #[tokio::test]
    async fn correct_code_completes_and_unlocks_the_next_stage() {
        let fx = fixture(2).await;

        // Codes are matched case-insensitively with surrounding whitespace
        // stripped.
        let response = submit_code(&fx.state, &fx.token, fx.request(fx.stages[0].id, " code0 "))
            .await
            .unwrap();
        assert!(response.correct);
        assert_eq!(response.points_earned, 100);
        assert!(!response.event_completed);
        assert_eq!(
            response.next_stage.as_ref().map(|stage| stage.id),
            Some(fx.stages[1].id)
        );

        let done = fx
            .store
            .find_progress(fx.team.id, fx.stages[0].id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(done.status, ProgressStatus::Completed);
        assert_eq!(done.points_earned, 100);

        let next = fx
            .store
            .find_progress(fx.team.id, fx.stages[1].id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(next.status, ProgressStatus::Active);
        assert!(next.started_at.is_some());

        let team = fx.store.find_team(fx.team.id).await.unwrap().unwrap();
        assert_eq!(team.total_points, 100);
    }

    #[tokio::test]
    async fn resubmitting_a_completed_stage_conflicts() {
        let fx = fixture(2).await;

        submit_code(&fx.state, &fx.token, fx.request(fx.stages[0].id, "CODE0"))
            .await
            .unwrap();
        let err = submit_code(&fx.state, &fx.token, fx.request(fx.stages[0].id, "CODE0"))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidState(_)));
    }

    #[tokio::test]
    async fn final_stage_finishes_the_team() {
        let fx = fixture(1).await;

        let response = submit_code(&fx.state, &fx.token, fx.request(fx.stages[0].id, "CODE0"))
            .await
            .unwrap();
        assert!(response.event_completed);
        assert!(response.next_stage.is_none());

        let team = fx.store.find_team(fx.team.id).await.unwrap().unwrap();
        assert!(team.finished_at.is_some());

        // A finished team can no longer submit.
        let err = submit_code(&fx.state, &fx.token, fx.request(fx.stages[0].id, "CODE0"))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidState(_)));
    }

    #[tokio::test]
    async fn fast_completion_earns_a_time_bonus() {
        let fx = fixture(2).await;
        let mut stage = fx.stages[0].clone();
        stage.time_bonus_enabled = true;
        fx.store.save_stage(stage).await.unwrap();

        let response = submit_code(&fx.state, &fx.token, fx.request(fx.stages[0].id, "CODE0"))
            .await
            .unwrap();
        // The stage was entered moments ago, so nearly the whole window is
        // unused: bonus is window / divisor give or take clock skew.
        assert!(response.time_bonus >= 49, "bonus was {}", response.time_bonus);
        assert!(response.time_bonus <= 50);

        let team = fx.store.find_team(fx.team.id).await.unwrap().unwrap();
        assert_eq!(team.total_points, 100 + response.time_bonus);
    }

    #[tokio::test]
    async fn slow_completion_earns_no_bonus() {
        let fx = fixture(2).await;
        let mut stage = fx.stages[0].clone();
        stage.time_bonus_enabled = true;
        fx.store.save_stage(stage).await.unwrap();

        let now = OffsetDateTime::now_utc();
        let mut slow = TeamProgressEntity::active(fx.team.id, fx.stages[0].id, now);
        slow.started_at = Some(now - Duration::seconds(600));
        fx.store.save_progress(slow).await.unwrap();

        let response = submit_code(&fx.state, &fx.token, fx.request(fx.stages[0].id, "CODE0"))
            .await
            .unwrap();
        assert_eq!(response.time_bonus, 0);
    }

    #[tokio::test]
    async fn hint_penalties_are_settled_at_completion() {
        let fx = fixture(2).await;
        fx.store
            .add_hint_penalty(fx.team.id, fx.stages[0].id, 30)
            .await
            .unwrap();

        submit_code(&fx.state, &fx.token, fx.request(fx.stages[0].id, "CODE0"))
            .await
            .unwrap();

        let team = fx.store.find_team(fx.team.id).await.unwrap().unwrap();
        assert_eq!(team.total_points, 70);
    }

    #[tokio::test]
    async fn submissions_are_rejected_while_paused() {
        let fx = fixture(1).await;
        let mut paused = fx.event.clone();
        paused.status = EventStatus::Paused;
        paused.paused_at = Some(OffsetDateTime::now_utc());
        fx.store.save_event(paused).await.unwrap();

        let err = submit_code(&fx.state, &fx.token, fx.request(fx.stages[0].id, "CODE0"))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidState(_)));
    }

    #[tokio::test]
    async fn mismatched_team_id_is_forbidden() {
        let fx = fixture(1).await;

        let request = ValidateCodeRequest {
            team_id: Uuid::new_v4(),
            stage_id: fx.stages[0].id,
            code: "CODE0".into(),
        };
        let err = submit_code(&fx.state, &fx.token, request).await.unwrap_err();
        assert!(matches!(err, ServiceError::Forbidden(_)));

        // Rejected before the audit log or progress row was touched.
        let progress = fx
            .store
            .find_progress(fx.team.id, fx.stages[0].id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(progress.attempt_count, 0);
    }

    #[tokio::test]
    async fn locked_stage_rejects_submissions() {
        let fx = fixture(2).await;

        let err = submit_code(&fx.state, &fx.token, fx.request(fx.stages[1].id, "CODE1"))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidState(_)));
    }
}
