//! Hint economy: coin-debited reveals with replay-safe accounting.

use time::OffsetDateTime;
use tracing::info;

use crate::{
    dao::models::{EventStatus, HintUsageEntity, ProgressStatus},
    dto::{
        play::{HintDenyReason, UseHintRequest, UseHintResponse},
        sse::HintUsedEvent,
    },
    error::ServiceError,
    services::{sse_events, team_service},
    state::SharedState,
};

/// Reveal a hint for the caller's team, charging one coin on first use.
///
/// A hint the team has already paid for is replayed for free, so a retried
/// request after a lost response never costs a second coin.
pub async fn use_hint(
    state: &SharedState,
    session_token: &str,
    payload: UseHintRequest,
) -> Result<UseHintResponse, ServiceError> {
    let (member, team, event) = team_service::authenticate(state, session_token).await?;
    if payload.team_id != team.id {
        return Err(ServiceError::Forbidden(
            "session token does not belong to this team".into(),
        ));
    }
    let store = state.require_event_store().await?;

    let hint = store
        .find_hint(payload.hint_id)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("hint {}", payload.hint_id)))?;
    let stage = store
        .find_stage(hint.stage_id)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("stage {}", hint.stage_id)))?;
    if stage.event_id != event.id {
        return Err(ServiceError::InvalidInput(
            "hint does not belong to this event".into(),
        ));
    }

    // Replay before any gameplay gate: content the team already paid for
    // stays readable even while paused or after the stage moved on.
    if store.find_hint_usage(team.id, hint.id).await?.is_some() {
        return Ok(UseHintResponse::replay(hint.into(), team.hints_remaining));
    }

    // A pause stops the clock, not the puzzling: teams may still buy hints.
    if !matches!(event.status, EventStatus::Running | EventStatus::Paused) {
        return Err(ServiceError::InvalidState(
            "hints can only be requested while the event is in play".into(),
        ));
    }

    let progress = store.find_progress(team.id, stage.id).await?;
    let active = progress
        .as_ref()
        .is_some_and(|row| row.status == ProgressStatus::Active);
    if !active {
        return Ok(UseHintResponse::denied(HintDenyReason::StageNotActive));
    }

    let now = OffsetDateTime::now_utc();
    let time_in_stage = progress
        .and_then(|row| row.started_at)
        .map(|started| (now - started).whole_seconds().max(0))
        .unwrap_or(0);

    let inserted = store
        .insert_hint_usage(HintUsageEntity {
            team_id: team.id,
            hint_id: hint.id,
            requested_by_session: member.session_token.clone(),
            time_in_stage_seconds: time_in_stage,
            used_at: now,
        })
        .await?;
    if !inserted {
        // A concurrent request from a teammate claimed the usage row.
        return Ok(UseHintResponse::replay(hint.into(), team.hints_remaining));
    }

    let hints_remaining = match store
        .debit_team_hints(team.id, state.config().hint_cost)
        .await?
    {
        Some(balance) => balance,
        None => {
            // Roll the usage row back so a later request with a replenished
            // balance is charged normally.
            store.delete_hint_usage(team.id, hint.id).await?;
            return Ok(UseHintResponse::denied(HintDenyReason::NoHintsRemaining));
        }
    };

    store
        .add_hint_penalty(team.id, stage.id, hint.point_penalty)
        .await?;

    info!(
        event_id = %event.id,
        team_id = %team.id,
        hint_id = %hint.id,
        hints_remaining,
        "hint revealed"
    );
    sse_events::broadcast_hint_used(
        state,
        event.id,
        HintUsedEvent {
            team_id: team.id,
            stage_id: stage.id,
            hint_id: hint.id,
            hints_remaining,
        },
    );

    Ok(UseHintResponse::revealed(hint.into(), hints_remaining))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use time::macros::datetime;
    use uuid::Uuid;

    use super::*;
    use crate::{
        config::AppConfig,
        dao::{
            event_store::{EventStore, memory::MemoryEventStore},
            models::{
                EventEntity, HintEntity, StageEntity, TeamEntity, TeamMemberEntity,
                TeamProgressEntity,
            },
        },
        state::{AppState, SharedState},
    };

    struct Fixture {
        state: SharedState,
        store: MemoryEventStore,
        event: EventEntity,
        team: TeamEntity,
        stage: StageEntity,
        hint: HintEntity,
        token: String,
    }

    async fn fixture(hints_remaining: u32) -> Fixture {
        let state = AppState::new(AppConfig::default());
        let store = MemoryEventStore::new();
        let now = OffsetDateTime::now_utc();

        let event = EventEntity {
            id: Uuid::new_v4(),
            name: "Night Hunt".into(),
            status: EventStatus::Running,
            duration_seconds: 3600,
            started_at: Some(now),
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
            hints_remaining,
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

        let stage = StageEntity {
            id: Uuid::new_v4(),
            event_id: event.id,
            order_index: 0,
            name: "Cipher".into(),
            unlock_code: "CODE0".into(),
            base_points: 100,
            time_bonus_enabled: false,
        };
        store.save_stage(stage.clone()).await.unwrap();

        let hint = HintEntity {
            id: Uuid::new_v4(),
            stage_id: stage.id,
            level: 1,
            title: Some("Look up".into()),
            content: "The key is on the ceiling.".into(),
            point_penalty: 20,
        };
        store.save_hint(hint.clone()).await.unwrap();

        store
            .save_progress(TeamProgressEntity::active(team.id, stage.id, now))
            .await
            .unwrap();

        state.install_event_store(Arc::new(store.clone())).await;
        Fixture {
            state,
            store,
            event,
            team,
            stage,
            hint,
            token,
        }
    }

    impl Fixture {
        fn request(&self, hint_id: Uuid) -> UseHintRequest {
            UseHintRequest {
                team_id: self.team.id,
                hint_id,
            }
        }
    }

    #[tokio::test]
    async fn first_use_charges_a_coin_and_records_the_penalty() {
        let fx = fixture(5).await;

        let response = use_hint(&fx.state, &fx.token, fx.request(fx.hint.id))
            .await
            .unwrap();
        assert!(response.success);
        assert!(!response.already_used);
        assert_eq!(response.hints_remaining, Some(4));
        assert_eq!(
            response.hint.map(|hint| hint.content),
            Some(fx.hint.content.clone())
        );

        let team = fx.store.find_team(fx.team.id).await.unwrap().unwrap();
        assert_eq!(team.hints_remaining, 4);

        let progress = fx
            .store
            .find_progress(fx.team.id, fx.stage.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(progress.hint_penalties, 20);
    }

    #[tokio::test]
    async fn replay_is_free() {
        let fx = fixture(5).await;

        use_hint(&fx.state, &fx.token, fx.request(fx.hint.id))
            .await
            .unwrap();
        let replay = use_hint(&fx.state, &fx.token, fx.request(fx.hint.id))
            .await
            .unwrap();
        assert!(replay.success);
        assert!(replay.already_used);
        assert_eq!(replay.hints_remaining, Some(4));

        let team = fx.store.find_team(fx.team.id).await.unwrap().unwrap();
        assert_eq!(team.hints_remaining, 4);

        let progress = fx
            .store
            .find_progress(fx.team.id, fx.stage.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(progress.hint_penalties, 20);
    }

    #[tokio::test]
    async fn replay_survives_a_pause() {
        let fx = fixture(5).await;

        use_hint(&fx.state, &fx.token, fx.request(fx.hint.id))
            .await
            .unwrap();

        let mut paused = fx.event.clone();
        paused.status = EventStatus::Paused;
        paused.paused_at = Some(OffsetDateTime::now_utc());
        fx.store.save_event(paused).await.unwrap();

        let replay = use_hint(&fx.state, &fx.token, fx.request(fx.hint.id))
            .await
            .unwrap();
        assert!(replay.success);
        assert!(replay.already_used);
    }

    #[tokio::test]
    async fn exhausted_balance_is_denied_and_rolled_back() {
        let fx = fixture(0).await;

        let response = use_hint(&fx.state, &fx.token, fx.request(fx.hint.id))
            .await
            .unwrap();
        assert!(!response.success);
        assert!(matches!(
            response.reason,
            Some(HintDenyReason::NoHintsRemaining)
        ));
        assert!(response.hint.is_none());

        // The compensating delete removed the usage row, so a later request
        // with a restored balance charges normally.
        assert!(
            fx.store
                .find_hint_usage(fx.team.id, fx.hint.id)
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn inactive_stage_is_denied() {
        let fx = fixture(5).await;
        fx.store
            .save_progress(TeamProgressEntity::locked(fx.team.id, fx.stage.id))
            .await
            .unwrap();

        let response = use_hint(&fx.state, &fx.token, fx.request(fx.hint.id))
            .await
            .unwrap();
        assert!(!response.success);
        assert!(matches!(
            response.reason,
            Some(HintDenyReason::StageNotActive)
        ));

        let team = fx.store.find_team(fx.team.id).await.unwrap().unwrap();
        assert_eq!(team.hints_remaining, 5);
    }

    #[tokio::test]
    async fn mismatched_team_id_is_forbidden() {
        let fx = fixture(5).await;

        let request = UseHintRequest {
            team_id: Uuid::new_v4(),
            hint_id: fx.hint.id,
        };
        let err = use_hint(&fx.state, &fx.token, request).await.unwrap_err();
        assert!(matches!(err, ServiceError::Forbidden(_)));

        let team = fx.store.find_team(fx.team.id).await.unwrap().unwrap();
        assert_eq!(team.hints_remaining, 5);
    }

    #[tokio::test]
    async fn first_use_is_charged_while_paused() {
        let fx = fixture(5).await;
        let mut paused = fx.event.clone();
        paused.status = EventStatus::Paused;
        paused.paused_at = Some(OffsetDateTime::now_utc());
        fx.store.save_event(paused).await.unwrap();

        let response = use_hint(&fx.state, &fx.token, fx.request(fx.hint.id))
            .await
            .unwrap();
        assert!(response.success);
        assert!(!response.already_used);
        assert_eq!(response.hints_remaining, Some(4));
    }

    #[tokio::test]
    async fn first_use_requires_an_event_in_play() {
        let fx = fixture(5).await;
        for status in [EventStatus::Waiting, EventStatus::Finished] {
            let mut event = fx.event.clone();
            event.status = status;
            fx.store.save_event(event).await.unwrap();

            let err = use_hint(&fx.state, &fx.token, fx.request(fx.hint.id))
                .await
                .unwrap_err();
            assert!(matches!(err, ServiceError::InvalidState(_)));
        }
    }
}
