//! In-memory event store used for local play and as the fallback backend
//! when no database is configured. Selected at startup, never mixed with a
//! remote backend mid-session.

use std::sync::Arc;

use futures::future::BoxFuture;
use indexmap::IndexMap;
use time::OffsetDateTime;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::dao::{
    event_store::EventStore,
    models::{
        CodeAttemptEntity, EventEntity, EventStatus, HintEntity, HintUsageEntity, StageEntity,
        TeamEntity, TeamMemberEntity, TeamProgressEntity,
    },
    storage::StorageResult,
};

/// Event store keeping everything in process memory.
///
/// All operations funnel through a single async lock, which trivially gives
/// the serializable-per-row guarantees the trait asks for.
#[derive(Clone, Default)]
pub struct MemoryEventStore {
    inner: Arc<Mutex<Inner>>,
}

#[derive(Default)]
struct Inner {
    events: IndexMap<Uuid, EventEntity>,
    teams: IndexMap<Uuid, TeamEntity>,
    members: IndexMap<Uuid, TeamMemberEntity>,
    stages: IndexMap<Uuid, StageEntity>,
    hints: IndexMap<Uuid, HintEntity>,
    progress: IndexMap<(Uuid, Uuid), TeamProgressEntity>,
    hint_usage: IndexMap<(Uuid, Uuid), HintUsageEntity>,
    code_attempts: Vec<CodeAttemptEntity>,
}

impl MemoryEventStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl EventStore for MemoryEventStore {
    fn save_event(&self, event: EventEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            store.inner.lock().await.events.insert(event.id, event);
            Ok(())
        })
    }

    fn find_event(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<EventEntity>>> {
        let store = self.clone();
        Box::pin(async move { Ok(store.inner.lock().await.events.get(&id).cloned()) })
    }

    fn replace_event_if_status(
        &self,
        event: EventEntity,
        expected: Vec<EventStatus>,
    ) -> BoxFuture<'static, StorageResult<Option<EventEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let mut guard = store.inner.lock().await;
            let Some(stored) = guard.events.get_mut(&event.id) else {
                return Ok(None);
            };
            if !expected.contains(&stored.status) {
                return Ok(None);
            }
            *stored = event.clone();
            Ok(Some(event))
        })
    }

    fn save_team(&self, team: TeamEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            store.inner.lock().await.teams.insert(team.id, team);
            Ok(())
        })
    }

    fn find_team(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<TeamEntity>>> {
        let store = self.clone();
        Box::pin(async move { Ok(store.inner.lock().await.teams.get(&id).cloned()) })
    }

    fn list_teams(&self, event_id: Uuid) -> BoxFuture<'static, StorageResult<Vec<TeamEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            Ok(store
                .inner
                .lock()
                .await
                .teams
                .values()
                .filter(|team| team.event_id == event_id)
                .cloned()
                .collect())
        })
    }

    fn find_team_by_join_code(
        &self,
        event_id: Uuid,
        join_code: String,
    ) -> BoxFuture<'static, StorageResult<Option<TeamEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            Ok(store
                .inner
                .lock()
                .await
                .teams
                .values()
                .find(|team| {
                    team.event_id == event_id
                        && team.join_code.eq_ignore_ascii_case(&join_code)
                })
                .cloned())
        })
    }

    fn mark_team_finished(
        &self,
        team_id: Uuid,
        at: OffsetDateTime,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            if let Some(team) = store.inner.lock().await.teams.get_mut(&team_id) {
                team.finished_at = Some(at);
            }
            Ok(())
        })
    }

    fn add_team_points(
        &self,
        team_id: Uuid,
        delta: i64,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            if let Some(team) = store.inner.lock().await.teams.get_mut(&team_id) {
                team.total_points += delta;
            }
            Ok(())
        })
    }

    fn debit_team_hints(
        &self,
        team_id: Uuid,
        cost: u32,
    ) -> BoxFuture<'static, StorageResult<Option<u32>>> {
        let store = self.clone();
        Box::pin(async move {
            let mut guard = store.inner.lock().await;
            let Some(team) = guard.teams.get_mut(&team_id) else {
                return Ok(None);
            };
            if team.hints_remaining < cost {
                return Ok(None);
            }
            team.hints_remaining -= cost;
            Ok(Some(team.hints_remaining))
        })
    }

    fn insert_member(&self, member: TeamMemberEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            store.inner.lock().await.members.insert(member.id, member);
            Ok(())
        })
    }

    fn count_members(&self, team_id: Uuid) -> BoxFuture<'static, StorageResult<u64>> {
        let store = self.clone();
        Box::pin(async move {
            Ok(store
                .inner
                .lock()
                .await
                .members
                .values()
                .filter(|member| member.team_id == team_id)
                .count() as u64)
        })
    }

    fn find_member_by_token(
        &self,
        session_token: String,
    ) -> BoxFuture<'static, StorageResult<Option<TeamMemberEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            Ok(store
                .inner
                .lock()
                .await
                .members
                .values()
                .find(|member| member.session_token == session_token)
                .cloned())
        })
    }

    fn touch_member(
        &self,
        member_id: Uuid,
        at: OffsetDateTime,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            if let Some(member) = store.inner.lock().await.members.get_mut(&member_id) {
                member.last_active_at = at;
            }
            Ok(())
        })
    }

    fn save_stage(&self, stage: StageEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            store.inner.lock().await.stages.insert(stage.id, stage);
            Ok(())
        })
    }

    fn find_stage(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<StageEntity>>> {
        let store = self.clone();
        Box::pin(async move { Ok(store.inner.lock().await.stages.get(&id).cloned()) })
    }

    fn list_stages(&self, event_id: Uuid) -> BoxFuture<'static, StorageResult<Vec<StageEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let mut stages: Vec<StageEntity> = store
                .inner
                .lock()
                .await
                .stages
                .values()
                .filter(|stage| stage.event_id == event_id)
                .cloned()
                .collect();
            stages.sort_by_key(|stage| stage.order_index);
            Ok(stages)
        })
    }

    fn save_hint(&self, hint: HintEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            store.inner.lock().await.hints.insert(hint.id, hint);
            Ok(())
        })
    }

    fn find_hint(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<HintEntity>>> {
        let store = self.clone();
        Box::pin(async move { Ok(store.inner.lock().await.hints.get(&id).cloned()) })
    }

    fn list_hints(&self, stage_id: Uuid) -> BoxFuture<'static, StorageResult<Vec<HintEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let mut hints: Vec<HintEntity> = store
                .inner
                .lock()
                .await
                .hints
                .values()
                .filter(|hint| hint.stage_id == stage_id)
                .cloned()
                .collect();
            hints.sort_by_key(|hint| hint.level);
            Ok(hints)
        })
    }

    fn save_progress(
        &self,
        progress: TeamProgressEntity,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .inner
                .lock()
                .await
                .progress
                .insert((progress.team_id, progress.stage_id), progress);
            Ok(())
        })
    }

    fn find_progress(
        &self,
        team_id: Uuid,
        stage_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Option<TeamProgressEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            Ok(store
                .inner
                .lock()
                .await
                .progress
                .get(&(team_id, stage_id))
                .cloned())
        })
    }

    fn list_progress(
        &self,
        team_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Vec<TeamProgressEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            Ok(store
                .inner
                .lock()
                .await
                .progress
                .values()
                .filter(|row| row.team_id == team_id)
                .cloned()
                .collect())
        })
    }

    fn complete_progress_if_active(
        &self,
        progress: TeamProgressEntity,
    ) -> BoxFuture<'static, StorageResult<bool>> {
        use crate::dao::models::ProgressStatus;

        let store = self.clone();
        Box::pin(async move {
            let mut guard = store.inner.lock().await;
            let key = (progress.team_id, progress.stage_id);
            let Some(stored) = guard.progress.get_mut(&key) else {
                return Ok(false);
            };
            if stored.status != ProgressStatus::Active {
                return Ok(false);
            }
            *stored = progress;
            Ok(true)
        })
    }

    fn record_attempt_failure(
        &self,
        team_id: Uuid,
        stage_id: Uuid,
        at: OffsetDateTime,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            if let Some(row) = store
                .inner
                .lock()
                .await
                .progress
                .get_mut(&(team_id, stage_id))
            {
                row.attempt_count += 1;
                row.last_attempt_at = Some(at);
            }
            Ok(())
        })
    }

    fn add_hint_penalty(
        &self,
        team_id: Uuid,
        stage_id: Uuid,
        penalty: i64,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            if let Some(row) = store
                .inner
                .lock()
                .await
                .progress
                .get_mut(&(team_id, stage_id))
            {
                row.hint_penalties += penalty;
            }
            Ok(())
        })
    }

    fn insert_hint_usage(
        &self,
        usage: HintUsageEntity,
    ) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        Box::pin(async move {
            let mut guard = store.inner.lock().await;
            let key = (usage.team_id, usage.hint_id);
            if guard.hint_usage.contains_key(&key) {
                return Ok(false);
            }
            guard.hint_usage.insert(key, usage);
            Ok(true)
        })
    }

    fn find_hint_usage(
        &self,
        team_id: Uuid,
        hint_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Option<HintUsageEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            Ok(store
                .inner
                .lock()
                .await
                .hint_usage
                .get(&(team_id, hint_id))
                .cloned())
        })
    }

    fn delete_hint_usage(
        &self,
        team_id: Uuid,
        hint_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .inner
                .lock()
                .await
                .hint_usage
                .shift_remove(&(team_id, hint_id));
            Ok(())
        })
    }

    fn append_code_attempt(
        &self,
        attempt: CodeAttemptEntity,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            store.inner.lock().await.code_attempts.push(attempt);
            Ok(())
        })
    }

    fn reset_event_play_data(
        &self,
        event_id: Uuid,
        hints_per_team: u32,
        drop_teams: bool,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            let mut guard = store.inner.lock().await;
            let team_ids: Vec<Uuid> = guard
                .teams
                .values()
                .filter(|team| team.event_id == event_id)
                .map(|team| team.id)
                .collect();

            guard
                .progress
                .retain(|(team_id, _), _| !team_ids.contains(team_id));
            guard
                .hint_usage
                .retain(|(team_id, _), _| !team_ids.contains(team_id));
            guard
                .code_attempts
                .retain(|attempt| !team_ids.contains(&attempt.team_id));

            if drop_teams {
                guard.teams.retain(|_, team| team.event_id != event_id);
                guard
                    .members
                    .retain(|_, member| !team_ids.contains(&member.team_id));
            } else {
                for team_id in &team_ids {
                    if let Some(team) = guard.teams.get_mut(team_id) {
                        team.hints_remaining = hints_per_team;
                        team.total_points = 0;
                        team.finished_at = None;
                    }
                }
            }

            Ok(())
        })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(async { Ok(()) })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(async { Ok(()) })
    }
}

#[cfg(test)]
mod tests {
    use time::macros::datetime;

    use super::*;
    use crate::dao::models::ProgressStatus;

    fn team(event_id: Uuid, join_code: &str, hints: u32) -> TeamEntity {
        TeamEntity {
            id: Uuid::new_v4(),
            event_id,
            name: "Purple".into(),
            color: "#7c3aed".into(),
            join_code: join_code.into(),
            hints_remaining: hints,
            total_points: 0,
            is_active: true,
            finished_at: None,
            created_at: datetime!(2025-06-01 12:00 UTC),
        }
    }

    fn usage(team_id: Uuid, hint_id: Uuid) -> HintUsageEntity {
        HintUsageEntity {
            team_id,
            hint_id,
            requested_by_session: "token".into(),
            time_in_stage_seconds: 30,
            used_at: datetime!(2025-06-01 12:05 UTC),
        }
    }

    #[tokio::test]
    async fn join_code_lookup_is_case_insensitive() {
        let store = MemoryEventStore::new();
        let event_id = Uuid::new_v4();
        let team = team(event_id, "PURPLE", 5);
        store.save_team(team.clone()).await.unwrap();

        let found = store
            .find_team_by_join_code(event_id, "purple".into())
            .await
            .unwrap();
        assert_eq!(found.map(|t| t.id), Some(team.id));

        let other_event = store
            .find_team_by_join_code(Uuid::new_v4(), "purple".into())
            .await
            .unwrap();
        assert!(other_event.is_none());
    }

    #[tokio::test]
    async fn hint_usage_insert_is_idempotent() {
        let store = MemoryEventStore::new();
        let (team_id, hint_id) = (Uuid::new_v4(), Uuid::new_v4());

        assert!(store.insert_hint_usage(usage(team_id, hint_id)).await.unwrap());
        assert!(!store.insert_hint_usage(usage(team_id, hint_id)).await.unwrap());
    }

    #[tokio::test]
    async fn debit_refuses_to_overdraw() {
        let store = MemoryEventStore::new();
        let team = team(Uuid::new_v4(), "RED", 1);
        store.save_team(team.clone()).await.unwrap();

        assert_eq!(store.debit_team_hints(team.id, 1).await.unwrap(), Some(0));
        assert_eq!(store.debit_team_hints(team.id, 1).await.unwrap(), None);

        let stored = store.find_team(team.id).await.unwrap().unwrap();
        assert_eq!(stored.hints_remaining, 0);
    }

    #[tokio::test]
    async fn progress_completion_is_one_shot() {
        let store = MemoryEventStore::new();
        let (team_id, stage_id) = (Uuid::new_v4(), Uuid::new_v4());
        let now = datetime!(2025-06-01 12:00 UTC);

        store
            .save_progress(TeamProgressEntity::active(team_id, stage_id, now))
            .await
            .unwrap();

        let mut completed = TeamProgressEntity::active(team_id, stage_id, now);
        completed.status = ProgressStatus::Completed;
        completed.completed_at = Some(now);

        assert!(store
            .complete_progress_if_active(completed.clone())
            .await
            .unwrap());
        assert!(!store.complete_progress_if_active(completed).await.unwrap());
    }

    #[tokio::test]
    async fn reset_restores_budgets_and_clears_ledgers() {
        let store = MemoryEventStore::new();
        let event_id = Uuid::new_v4();
        let mut team = team(event_id, "GREEN", 5);
        team.hints_remaining = 1;
        team.total_points = 42;
        store.save_team(team.clone()).await.unwrap();

        let stage_id = Uuid::new_v4();
        store
            .save_progress(TeamProgressEntity::locked(team.id, stage_id))
            .await
            .unwrap();
        store
            .insert_hint_usage(usage(team.id, Uuid::new_v4()))
            .await
            .unwrap();

        store.reset_event_play_data(event_id, 5, false).await.unwrap();

        let stored = store.find_team(team.id).await.unwrap().unwrap();
        assert_eq!(stored.hints_remaining, 5);
        assert_eq!(stored.total_points, 0);
        assert!(store.find_progress(team.id, stage_id).await.unwrap().is_none());
        assert!(store.list_progress(team.id).await.unwrap().is_empty());
    }
}
