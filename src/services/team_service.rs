//! Team membership: joining an event and resolving session tokens.

use time::OffsetDateTime;
use tracing::info;
use uuid::Uuid;

use crate::{
    dao::models::{EventEntity, EventStatus, TeamEntity, TeamMemberEntity},
    dto::play::{JoinTeamRequest, JoinTeamResponse},
    error::ServiceError,
    services::sse_events,
    state::SharedState,
};

/// Register a player on a team identified by its join code.
pub async fn join_team(
    state: &SharedState,
    payload: JoinTeamRequest,
) -> Result<JoinTeamResponse, ServiceError> {
    let store = state.require_event_store().await?;

    let event = store
        .find_event(payload.event_id)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("event {}", payload.event_id)))?;

    match event.status {
        EventStatus::Waiting => {}
        EventStatus::Running | EventStatus::Paused if event.allow_late_join => {}
        EventStatus::Running | EventStatus::Paused => {
            return Err(ServiceError::InvalidState(
                "event has already started and does not allow late joining".into(),
            ));
        }
        EventStatus::Finished => {
            return Err(ServiceError::InvalidState("event is over".into()));
        }
    }

    let team = store
        .find_team_by_join_code(event.id, payload.join_code.clone())
        .await?
        .ok_or_else(|| ServiceError::NotFound("no team with this join code".into()))?;

    if !team.is_active {
        return Err(ServiceError::Forbidden("team is deactivated".into()));
    }

    let member_count = store.count_members(team.id).await?;
    if let Some(max) = event.max_team_size {
        if member_count >= u64::from(max) {
            return Err(ServiceError::InvalidState("team is full".into()));
        }
    }

    let now = OffsetDateTime::now_utc();
    let member = TeamMemberEntity {
        id: Uuid::new_v4(),
        team_id: team.id,
        display_name: payload.display_name,
        session_token: Uuid::new_v4().simple().to_string(),
        // First joiner of a team becomes captain.
        is_captain: member_count == 0,
        joined_at: now,
        last_active_at: now,
    };
    store.insert_member(member.clone()).await?;

    info!(
        event_id = %event.id,
        team_id = %team.id,
        member_id = %member.id,
        "player joined team"
    );
    sse_events::broadcast_team_joined(
        state,
        event.id,
        team.id,
        &member.display_name,
        member_count + 1,
    );

    Ok(JoinTeamResponse {
        session_token: member.session_token,
        team: team.into(),
        is_captain: member.is_captain,
        event_status: event.status,
    })
}

/// Resolve a session token into its member, team, and event, refusing
/// deactivated teams and stamping the member's activity.
pub async fn authenticate(
    state: &SharedState,
    session_token: &str,
) -> Result<(TeamMemberEntity, TeamEntity, EventEntity), ServiceError> {
    let store = state.require_event_store().await?;

    let member = store
        .find_member_by_token(session_token.to_owned())
        .await?
        .ok_or_else(|| ServiceError::Unauthorized("unknown session token".into()))?;

    let team = store
        .find_team(member.team_id)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("team {}", member.team_id)))?;

    if !team.is_active {
        return Err(ServiceError::Forbidden("team is deactivated".into()));
    }

    let event = store
        .find_event(team.event_id)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("event {}", team.event_id)))?;

    store
        .touch_member(member.id, OffsetDateTime::now_utc())
        .await?;

    Ok((member, team, event))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use time::macros::datetime;

    use super::*;
    use crate::{
        config::AppConfig,
        dao::event_store::{EventStore, memory::MemoryEventStore},
        state::AppState,
    };

    fn event(status: EventStatus, allow_late_join: bool, max_team_size: Option<u32>) -> EventEntity {
        let created = datetime!(2025-06-01 09:00 UTC);
        EventEntity {
            id: Uuid::new_v4(),
            name: "Night Hunt".into(),
            status,
            duration_seconds: 3600,
            started_at: None,
            paused_at: None,
            ended_at: None,
            accumulated_pause_seconds: 0,
            hints_per_team: 5,
            max_team_size,
            allow_late_join,
            created_at: created,
            updated_at: created,
        }
    }

    fn team(event_id: Uuid) -> TeamEntity {
        TeamEntity {
            id: Uuid::new_v4(),
            event_id,
            name: "Purple".into(),
            color: "#7c3aed".into(),
            join_code: "PURPLE7".into(),
            hints_remaining: 5,
            total_points: 0,
            is_active: true,
            finished_at: None,
            created_at: datetime!(2025-06-01 09:00 UTC),
        }
    }

    async fn state_with(
        event: &EventEntity,
        team: &TeamEntity,
    ) -> (crate::state::SharedState, MemoryEventStore) {
        let state = AppState::new(AppConfig::default());
        let store = MemoryEventStore::new();
        store.save_event(event.clone()).await.unwrap();
        store.save_team(team.clone()).await.unwrap();
        state.install_event_store(Arc::new(store.clone())).await;
        (state, store)
    }

    fn join_request(event_id: Uuid, join_code: &str, name: &str) -> JoinTeamRequest {
        JoinTeamRequest {
            event_id,
            join_code: join_code.into(),
            display_name: name.into(),
        }
    }

    #[tokio::test]
    async fn first_joiner_becomes_captain() {
        let event = event(EventStatus::Waiting, false, None);
        let team = team(event.id);
        let (state, _) = state_with(&event, &team).await;

        let first = join_team(&state, join_request(event.id, "purple7", "Ada"))
            .await
            .unwrap();
        assert!(first.is_captain);
        assert!(!first.session_token.is_empty());

        let second = join_team(&state, join_request(event.id, "PURPLE7", "Grace"))
            .await
            .unwrap();
        assert!(!second.is_captain);
        assert_ne!(first.session_token, second.session_token);
    }

    #[tokio::test]
    async fn unknown_join_code_is_not_found() {
        let event = event(EventStatus::Waiting, false, None);
        let team = team(event.id);
        let (state, _) = state_with(&event, &team).await;

        let err = join_team(&state, join_request(event.id, "WRONG1", "Ada"))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));
    }

    #[tokio::test]
    async fn late_join_requires_the_flag() {
        let closed = event(EventStatus::Running, false, None);
        let team_a = team(closed.id);
        let (state, _) = state_with(&closed, &team_a).await;
        let err = join_team(&state, join_request(closed.id, "purple7", "Ada"))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidState(_)));

        let open = event(EventStatus::Running, true, None);
        let team_b = team(open.id);
        let (state, _) = state_with(&open, &team_b).await;
        assert!(
            join_team(&state, join_request(open.id, "purple7", "Ada"))
                .await
                .is_ok()
        );
    }

    #[tokio::test]
    async fn team_size_cap_is_enforced() {
        let event = event(EventStatus::Waiting, false, Some(1));
        let team = team(event.id);
        let (state, _) = state_with(&event, &team).await;

        join_team(&state, join_request(event.id, "purple7", "Ada"))
            .await
            .unwrap();
        let err = join_team(&state, join_request(event.id, "purple7", "Grace"))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidState(_)));
    }

    #[tokio::test]
    async fn authenticate_round_trips_the_session_token() {
        let event = event(EventStatus::Waiting, false, None);
        let team = team(event.id);
        let (state, _) = state_with(&event, &team).await;

        let joined = join_team(&state, join_request(event.id, "purple7", "Ada"))
            .await
            .unwrap();
        let (member, resolved_team, resolved_event) =
            authenticate(&state, &joined.session_token).await.unwrap();
        assert_eq!(member.display_name, "Ada");
        assert_eq!(resolved_team.id, team.id);
        assert_eq!(resolved_event.id, event.id);

        let err = authenticate(&state, "bogus").await.unwrap_err();
        assert!(matches!(err, ServiceError::Unauthorized(_)));
    }
}
