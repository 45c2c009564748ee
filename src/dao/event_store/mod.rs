//! Pluggable storage backends behind the object-safe [`EventStore`] trait.

pub mod memory;
#[cfg(feature = "mongo-store")]
pub mod mongodb;

use futures::future::BoxFuture;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::dao::models::{
    CodeAttemptEntity, EventEntity, EventStatus, HintEntity, HintUsageEntity, StageEntity,
    TeamEntity, TeamMemberEntity, TeamProgressEntity,
};
use crate::dao::storage::StorageResult;

/// Abstraction over the persistence layer for events, teams, stages, hints,
/// progress rows, and the append-only ledgers.
///
/// Mutating operations that participate in race-sensitive flows are expressed
/// as guarded primitives (compare-and-set, insert-if-absent, conditional
/// decrement) so backends can provide serializable-per-row semantics: the
/// MongoDB backend uses filtered `find_one_and_*` updates and unique indexes,
/// the in-memory backend serializes through a single inner lock.
pub trait EventStore: Send + Sync {
    /// Insert or replace an event definition.
    fn save_event(&self, event: EventEntity) -> BoxFuture<'static, StorageResult<()>>;
    /// Look up an event by id.
    fn find_event(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<EventEntity>>>;
    /// Replace an event only if its stored status is one of `expected`.
    ///
    /// Returns the stored entity after the swap, or `None` when the guard
    /// failed because another writer transitioned the event first.
    fn replace_event_if_status(
        &self,
        event: EventEntity,
        expected: Vec<EventStatus>,
    ) -> BoxFuture<'static, StorageResult<Option<EventEntity>>>;

    /// Insert or replace a team.
    fn save_team(&self, team: TeamEntity) -> BoxFuture<'static, StorageResult<()>>;
    /// Look up a team by id.
    fn find_team(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<TeamEntity>>>;
    /// All teams of an event, in creation order.
    fn list_teams(&self, event_id: Uuid) -> BoxFuture<'static, StorageResult<Vec<TeamEntity>>>;
    /// Case-insensitive join-code lookup scoped to one event.
    fn find_team_by_join_code(
        &self,
        event_id: Uuid,
        join_code: String,
    ) -> BoxFuture<'static, StorageResult<Option<TeamEntity>>>;
    /// Stamp the team's terminal finish time.
    fn mark_team_finished(
        &self,
        team_id: Uuid,
        at: OffsetDateTime,
    ) -> BoxFuture<'static, StorageResult<()>>;
    /// Adjust the team's running point total (delta may be negative).
    fn add_team_points(&self, team_id: Uuid, delta: i64)
    -> BoxFuture<'static, StorageResult<()>>;
    /// Conditionally spend `cost` hint coins.
    ///
    /// Returns the new balance, or `None` when the balance was insufficient
    /// (the balance is left untouched in that case).
    fn debit_team_hints(
        &self,
        team_id: Uuid,
        cost: u32,
    ) -> BoxFuture<'static, StorageResult<Option<u32>>>;

    /// Register a new member.
    fn insert_member(&self, member: TeamMemberEntity) -> BoxFuture<'static, StorageResult<()>>;
    /// Current member count of a team.
    fn count_members(&self, team_id: Uuid) -> BoxFuture<'static, StorageResult<u64>>;
    /// Resolve a session token to its member record.
    fn find_member_by_token(
        &self,
        session_token: String,
    ) -> BoxFuture<'static, StorageResult<Option<TeamMemberEntity>>>;
    /// Update the member's last-active timestamp.
    fn touch_member(
        &self,
        member_id: Uuid,
        at: OffsetDateTime,
    ) -> BoxFuture<'static, StorageResult<()>>;

    /// Insert or replace a stage.
    fn save_stage(&self, stage: StageEntity) -> BoxFuture<'static, StorageResult<()>>;
    /// Look up a stage by id.
    fn find_stage(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<StageEntity>>>;
    /// All stages of an event, sorted by order index.
    fn list_stages(&self, event_id: Uuid) -> BoxFuture<'static, StorageResult<Vec<StageEntity>>>;

    /// Insert or replace a hint.
    fn save_hint(&self, hint: HintEntity) -> BoxFuture<'static, StorageResult<()>>;
    /// Look up a hint by id.
    fn find_hint(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<HintEntity>>>;
    /// All hints of a stage, sorted by level.
    fn list_hints(&self, stage_id: Uuid) -> BoxFuture<'static, StorageResult<Vec<HintEntity>>>;

    /// Insert or replace a progress row keyed by (team, stage).
    fn save_progress(
        &self,
        progress: TeamProgressEntity,
    ) -> BoxFuture<'static, StorageResult<()>>;
    /// Look up the progress row for a (team, stage) pair.
    fn find_progress(
        &self,
        team_id: Uuid,
        stage_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Option<TeamProgressEntity>>>;
    /// All progress rows of a team.
    fn list_progress(
        &self,
        team_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Vec<TeamProgressEntity>>>;
    /// Replace a progress row only while its stored status is `active`.
    ///
    /// Returns `false` when the guard failed, which makes stage completion a
    /// one-shot transition even under concurrent correct submissions.
    fn complete_progress_if_active(
        &self,
        progress: TeamProgressEntity,
    ) -> BoxFuture<'static, StorageResult<bool>>;
    /// Bump the attempt counter after an incorrect submission.
    fn record_attempt_failure(
        &self,
        team_id: Uuid,
        stage_id: Uuid,
        at: OffsetDateTime,
    ) -> BoxFuture<'static, StorageResult<()>>;
    /// Accumulate a hint penalty on the owning progress row.
    fn add_hint_penalty(
        &self,
        team_id: Uuid,
        stage_id: Uuid,
        penalty: i64,
    ) -> BoxFuture<'static, StorageResult<()>>;

    /// Insert a usage row unless one already exists for the (team, hint) pair.
    ///
    /// Returns `false` on conflict; the caller treats that as a replay.
    fn insert_hint_usage(
        &self,
        usage: HintUsageEntity,
    ) -> BoxFuture<'static, StorageResult<bool>>;
    /// Look up the usage row for a (team, hint) pair.
    fn find_hint_usage(
        &self,
        team_id: Uuid,
        hint_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Option<HintUsageEntity>>>;
    /// Remove a usage row; compensation path when a debit fails after the
    /// usage insert won the race.
    fn delete_hint_usage(
        &self,
        team_id: Uuid,
        hint_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<()>>;
    /// Append to the code-attempt audit log.
    fn append_code_attempt(
        &self,
        attempt: CodeAttemptEntity,
    ) -> BoxFuture<'static, StorageResult<()>>;

    /// Wipe all play data of an event: progress rows, hint usage, and code
    /// attempts are deleted, every team's balance is restored to
    /// `hints_per_team` and its points and finish time cleared. When
    /// `drop_teams` is set, the teams and their members are deleted as well.
    fn reset_event_play_data(
        &self,
        event_id: Uuid,
        hints_per_team: u32,
        drop_teams: bool,
    ) -> BoxFuture<'static, StorageResult<()>>;

    /// Cheap connectivity probe used by the storage supervisor.
    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>>;
    /// Attempt to re-establish a lost backend connection.
    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>>;
}
