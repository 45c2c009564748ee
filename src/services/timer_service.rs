//! Authoritative clock reads, including lazy expiry of overrun events.

use time::{Duration, OffsetDateTime};
use tracing::info;
use uuid::Uuid;

use crate::{
    dao::models::{EventEntity, EventStatus},
    dto::timer::TimerSyncResponse,
    error::ServiceError,
    services::sse_events,
    state::{
        SharedState,
        clock::{self, ClockAction},
    },
};

/// Read the clock of an event, finishing it first when the countdown has
/// already run out.
pub async fn sync(state: &SharedState, event_id: Uuid) -> Result<TimerSyncResponse, ServiceError> {
    let store = state.require_event_store().await?;
    let mut event = store
        .find_event(event_id)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("event {event_id}")))?;

    let now = OffsetDateTime::now_utc();
    let reading = clock::read_timer(&event, now);

    if reading.status == EventStatus::Running && reading.remaining_seconds == 0 {
        if let Some(expired) = expire(state, &event, now).await? {
            event = expired;
        } else {
            // Another reader finished it first; re-read the stored row.
            event = store
                .find_event(event_id)
                .await?
                .ok_or_else(|| ServiceError::NotFound(format!("event {event_id}")))?;
        }
    }

    let reading = clock::read_timer(&event, now);
    Ok(TimerSyncResponse::new(&event, reading, now))
}

/// Finish a running event whose countdown has run out.
///
/// The end anchor is the exact expiry instant, not the observation time, so
/// the frozen elapsed value equals the configured duration no matter how
/// late the expiry is noticed.
async fn expire(
    state: &SharedState,
    event: &EventEntity,
    now: OffsetDateTime,
) -> Result<Option<EventEntity>, ServiceError> {
    let store = state.require_event_store().await?;

    let expiry_at = match event.started_at {
        Some(started) => {
            started + Duration::seconds(event.duration_seconds + event.accumulated_pause_seconds)
        }
        None => now,
    };

    let finished = clock::apply_transition(event, ClockAction::End, expiry_at)?;
    let stored = store
        .replace_event_if_status(finished, clock::allowed_from(ClockAction::End))
        .await?;

    if let Some(stored) = &stored {
        info!(event_id = %stored.id, "countdown ran out; event finished");
        sse_events::broadcast_status_changed(state, stored.id, stored.status);
        let reading = clock::read_timer(stored, now);
        sse_events::broadcast_timer_update(
            state,
            stored.id,
            TimerSyncResponse::new(stored, reading, now),
        );
    }

    Ok(stored)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use time::macros::datetime;

    use super::*;
    use crate::{
        config::AppConfig,
        dao::{
            event_store::{EventStore, memory::MemoryEventStore},
            models::EventEntity,
        },
        state::AppState,
    };

    fn running_event_started_at(started: OffsetDateTime, duration: i64) -> EventEntity {
        EventEntity {
            id: Uuid::new_v4(),
            name: "Vault Run".into(),
            status: EventStatus::Running,
            duration_seconds: duration,
            started_at: Some(started),
            paused_at: None,
            ended_at: None,
            accumulated_pause_seconds: 0,
            hints_per_team: 5,
            max_team_size: None,
            allow_late_join: false,
            created_at: started,
            updated_at: started,
        }
    }

    #[tokio::test]
    async fn sync_finishes_an_overrun_event() {
        let state = AppState::new(AppConfig::default());
        let store = MemoryEventStore::new();
        // Started long enough ago that the countdown has run out.
        let event =
            running_event_started_at(OffsetDateTime::now_utc() - Duration::seconds(120), 60);
        store.save_event(event.clone()).await.unwrap();
        state.install_event_store(Arc::new(store.clone())).await;

        let response = sync(&state, event.id).await.unwrap();
        assert_eq!(response.status, EventStatus::Finished);
        assert_eq!(response.remaining_seconds, 0);
        assert!(!response.is_running);

        let stored = store.find_event(event.id).await.unwrap().unwrap();
        assert_eq!(stored.status, EventStatus::Finished);
        // The end anchor is the expiry instant, so elapsed froze at the
        // configured duration.
        assert_eq!(
            stored.ended_at,
            Some(stored.started_at.unwrap() + Duration::seconds(60))
        );
    }

    #[tokio::test]
    async fn sync_of_unknown_event_is_not_found() {
        let state = AppState::new(AppConfig::default());
        state
            .install_event_store(Arc::new(MemoryEventStore::new()))
            .await;

        let err = sync(&state, Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));
    }

    #[tokio::test]
    async fn sync_without_storage_reports_degraded() {
        let state = AppState::new(AppConfig::default());
        let err = sync(&state, Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, ServiceError::Degraded));
    }

    #[tokio::test]
    async fn sync_reports_live_reading_for_paused_event() {
        let state = AppState::new(AppConfig::default());
        let store = MemoryEventStore::new();
        let mut event = running_event_started_at(datetime!(2025-06-01 10:00 UTC), 3600);
        event.status = EventStatus::Paused;
        event.paused_at = Some(datetime!(2025-06-01 10:10 UTC));
        store.save_event(event.clone()).await.unwrap();
        state.install_event_store(Arc::new(store)).await;

        let response = sync(&state, event.id).await.unwrap();
        assert_eq!(response.status, EventStatus::Paused);
        assert_eq!(response.remaining_seconds, 3000);
        assert!(!response.is_running);
    }

    #[tokio::test]
    async fn sync_reports_a_live_countdown_as_running() {
        let state = AppState::new(AppConfig::default());
        let store = MemoryEventStore::new();
        let event =
            running_event_started_at(OffsetDateTime::now_utc() - Duration::seconds(10), 3600);
        store.save_event(event.clone()).await.unwrap();
        state.install_event_store(Arc::new(store)).await;

        let response = sync(&state, event.id).await.unwrap();
        assert_eq!(response.status, EventStatus::Running);
        assert!(response.is_running);
    }
}
