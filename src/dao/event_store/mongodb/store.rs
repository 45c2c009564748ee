use std::sync::Arc;

use futures::{TryStreamExt, future::BoxFuture};
use mongodb::{
    Client, Collection, Database,
    bson::doc,
    error::{Error as MongoError, ErrorKind, WriteFailure},
    options::{IndexOptions, ReturnDocument},
};
use time::OffsetDateTime;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{
    config::MongoConfig,
    connection::establish_connection,
    error::{MongoDaoError, MongoResult},
    models::{
        MongoCodeAttemptDocument, MongoEventDocument, MongoHintDocument, MongoHintUsageDocument,
        MongoMemberDocument, MongoProgressDocument, MongoStageDocument, MongoTeamDocument, doc_id,
        event_status_str, progress_status_str, uuid_as_binary,
    },
};
use crate::dao::{
    event_store::EventStore,
    models::{
        CodeAttemptEntity, EventEntity, EventStatus, HintEntity, HintUsageEntity, ProgressStatus,
        StageEntity, TeamEntity, TeamMemberEntity, TeamProgressEntity,
    },
    storage::StorageResult,
};

const EVENT_COLLECTION: &str = "events";
const TEAM_COLLECTION: &str = "teams";
const MEMBER_COLLECTION: &str = "team_members";
const STAGE_COLLECTION: &str = "stages";
const HINT_COLLECTION: &str = "hints";
const PROGRESS_COLLECTION: &str = "team_progress";
const HINT_USAGE_COLLECTION: &str = "hint_usage";
const CODE_ATTEMPT_COLLECTION: &str = "code_attempts";

/// Event store backed by MongoDB.
///
/// The guarded trait operations map onto filtered `find_one_and_*` updates
/// plus unique indexes, so their atomicity is the server's, not ours.
#[derive(Clone)]
pub struct MongoEventStore {
    inner: Arc<MongoInner>,
}

struct MongoInner {
    state: RwLock<MongoState>,
    config: MongoConfig,
}

struct MongoState {
    client: Client,
    database: Database,
}

fn is_duplicate_key(err: &MongoError) -> bool {
    match err.kind.as_ref() {
        ErrorKind::Write(WriteFailure::WriteError(write_error)) => write_error.code == 11000,
        _ => false,
    }
}

fn to_bson(value: OffsetDateTime) -> mongodb::bson::DateTime {
    mongodb::bson::DateTime::from_system_time(value.into())
}

impl MongoInner {
    async fn ping(&self) -> MongoResult<()> {
        let database = {
            let guard = self.state.read().await;
            guard.database.clone()
        };

        database
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|source| MongoDaoError::HealthPing { source })?;
        Ok(())
    }

    async fn reconnect(&self) -> MongoResult<()> {
        let (client, database) =
            establish_connection(&self.config.options, &self.config.database_name).await?;
        let mut guard = self.state.write().await;
        guard.client = client;
        guard.database = database;
        Ok(())
    }
}

impl MongoEventStore {
    /// Establish a connection to MongoDB and ensure indexes are present.
    pub async fn connect(config: MongoConfig) -> MongoResult<Self> {
        let (client, database) =
            establish_connection(&config.options, &config.database_name).await?;

        let inner = Arc::new(MongoInner {
            state: RwLock::new(MongoState { client, database }),
            config,
        });

        let store = Self { inner };
        store.ensure_indexes().await?;
        Ok(store)
    }

    async fn ensure_indexes(&self) -> MongoResult<()> {
        let database = self.database().await;

        let create = |collection: &'static str,
                      index: &'static str,
                      keys: mongodb::bson::Document,
                      unique: bool| {
            let database = database.clone();
            async move {
                let model = mongodb::IndexModel::builder()
                    .keys(keys)
                    .options(
                        IndexOptions::builder()
                            .name(Some(index.to_owned()))
                            .unique(unique.then_some(true))
                            .build(),
                    )
                    .build();
                database
                    .collection::<mongodb::bson::Document>(collection)
                    .create_index(model)
                    .await
                    .map_err(|source| MongoDaoError::EnsureIndex {
                        collection,
                        index,
                        source,
                    })?;
                Ok::<(), MongoDaoError>(())
            }
        };

        // Join codes are stored uppercase, so uniqueness here is effectively
        // case-insensitive.
        create(
            TEAM_COLLECTION,
            "team_join_code_idx",
            doc! {"event_id": 1, "join_code": 1},
            true,
        )
        .await?;
        create(
            MEMBER_COLLECTION,
            "member_session_idx",
            doc! {"session_token": 1},
            true,
        )
        .await?;
        create(
            STAGE_COLLECTION,
            "stage_order_idx",
            doc! {"event_id": 1, "order_index": 1},
            false,
        )
        .await?;
        create(
            HINT_COLLECTION,
            "hint_level_idx",
            doc! {"stage_id": 1, "level": 1},
            false,
        )
        .await?;
        create(
            PROGRESS_COLLECTION,
            "progress_pair_idx",
            doc! {"team_id": 1, "stage_id": 1},
            true,
        )
        .await?;
        // The replay guard: at most one usage row per (team, hint).
        create(
            HINT_USAGE_COLLECTION,
            "hint_usage_pair_idx",
            doc! {"team_id": 1, "hint_id": 1},
            true,
        )
        .await?;
        create(
            CODE_ATTEMPT_COLLECTION,
            "attempt_team_idx",
            doc! {"team_id": 1},
            false,
        )
        .await?;

        Ok(())
    }

    async fn database(&self) -> Database {
        let guard = self.inner.state.read().await;
        guard.database.clone()
    }

    async fn collection<T: Send + Sync>(&self, name: &str) -> Collection<T> {
        let guard = self.inner.state.read().await;
        guard.database.collection::<T>(name)
    }

    async fn save_event(&self, event: EventEntity) -> MongoResult<()> {
        let document: MongoEventDocument = event.into();
        self.collection::<MongoEventDocument>(EVENT_COLLECTION)
            .await
            .replace_one(doc_id(document.id), &document)
            .upsert(true)
            .await
            .map_err(|source| MongoDaoError::Write {
                collection: EVENT_COLLECTION,
                source,
            })?;
        Ok(())
    }

    async fn find_event(&self, id: Uuid) -> MongoResult<Option<EventEntity>> {
        let document = self
            .collection::<MongoEventDocument>(EVENT_COLLECTION)
            .await
            .find_one(doc_id(id))
            .await
            .map_err(|source| MongoDaoError::Read {
                collection: EVENT_COLLECTION,
                source,
            })?;
        Ok(document.map(Into::into))
    }

    async fn replace_event_if_status(
        &self,
        event: EventEntity,
        expected: Vec<EventStatus>,
    ) -> MongoResult<Option<EventEntity>> {
        let expected: Vec<&str> = expected.into_iter().map(event_status_str).collect();
        let document: MongoEventDocument = event.into();
        let filter = doc! {
            "_id": uuid_as_binary(document.id),
            "status": { "$in": expected },
        };

        let replaced = self
            .collection::<MongoEventDocument>(EVENT_COLLECTION)
            .await
            .find_one_and_replace(filter, &document)
            .return_document(ReturnDocument::After)
            .await
            .map_err(|source| MongoDaoError::Write {
                collection: EVENT_COLLECTION,
                source,
            })?;
        Ok(replaced.map(Into::into))
    }

    async fn save_team(&self, team: TeamEntity) -> MongoResult<()> {
        let document: MongoTeamDocument = team.into();
        self.collection::<MongoTeamDocument>(TEAM_COLLECTION)
            .await
            .replace_one(doc_id(document.id), &document)
            .upsert(true)
            .await
            .map_err(|source| MongoDaoError::Write {
                collection: TEAM_COLLECTION,
                source,
            })?;
        Ok(())
    }

    async fn find_team(&self, id: Uuid) -> MongoResult<Option<TeamEntity>> {
        let document = self
            .collection::<MongoTeamDocument>(TEAM_COLLECTION)
            .await
            .find_one(doc_id(id))
            .await
            .map_err(|source| MongoDaoError::Read {
                collection: TEAM_COLLECTION,
                source,
            })?;
        Ok(document.map(Into::into))
    }

    async fn list_teams(&self, event_id: Uuid) -> MongoResult<Vec<TeamEntity>> {
        let documents: Vec<MongoTeamDocument> = self
            .collection::<MongoTeamDocument>(TEAM_COLLECTION)
            .await
            .find(doc! {"event_id": uuid_as_binary(event_id)})
            .sort(doc! {"created_at": 1})
            .await
            .map_err(|source| MongoDaoError::Read {
                collection: TEAM_COLLECTION,
                source,
            })?
            .try_collect()
            .await
            .map_err(|source| MongoDaoError::Read {
                collection: TEAM_COLLECTION,
                source,
            })?;
        Ok(documents.into_iter().map(Into::into).collect())
    }

    async fn find_team_by_join_code(
        &self,
        event_id: Uuid,
        join_code: String,
    ) -> MongoResult<Option<TeamEntity>> {
        // Codes are stored uppercase; normalizing the probe makes the lookup
        // case-insensitive without a collation.
        let document = self
            .collection::<MongoTeamDocument>(TEAM_COLLECTION)
            .await
            .find_one(doc! {
                "event_id": uuid_as_binary(event_id),
                "join_code": join_code.to_ascii_uppercase(),
            })
            .await
            .map_err(|source| MongoDaoError::Read {
                collection: TEAM_COLLECTION,
                source,
            })?;
        Ok(document.map(Into::into))
    }

    async fn mark_team_finished(&self, team_id: Uuid, at: OffsetDateTime) -> MongoResult<()> {
        self.collection::<MongoTeamDocument>(TEAM_COLLECTION)
            .await
            .update_one(
                doc_id(team_id),
                doc! {"$set": {"finished_at": to_bson(at)}},
            )
            .await
            .map_err(|source| MongoDaoError::Write {
                collection: TEAM_COLLECTION,
                source,
            })?;
        Ok(())
    }

    async fn add_team_points(&self, team_id: Uuid, delta: i64) -> MongoResult<()> {
        self.collection::<MongoTeamDocument>(TEAM_COLLECTION)
            .await
            .update_one(doc_id(team_id), doc! {"$inc": {"total_points": delta}})
            .await
            .map_err(|source| MongoDaoError::Write {
                collection: TEAM_COLLECTION,
                source,
            })?;
        Ok(())
    }

    async fn debit_team_hints(&self, team_id: Uuid, cost: u32) -> MongoResult<Option<u32>> {
        let cost = i64::from(cost);
        let mut filter = doc_id(team_id);
        filter.insert("hints_remaining", doc! {"$gte": cost});

        let updated = self
            .collection::<MongoTeamDocument>(TEAM_COLLECTION)
            .await
            .find_one_and_update(filter, doc! {"$inc": {"hints_remaining": -cost}})
            .return_document(ReturnDocument::After)
            .await
            .map_err(|source| MongoDaoError::Write {
                collection: TEAM_COLLECTION,
                source,
            })?;
        Ok(updated.map(|team| team.hints_remaining))
    }

    async fn insert_member(&self, member: TeamMemberEntity) -> MongoResult<()> {
        let document: MongoMemberDocument = member.into();
        self.collection::<MongoMemberDocument>(MEMBER_COLLECTION)
            .await
            .insert_one(&document)
            .await
            .map_err(|source| MongoDaoError::Write {
                collection: MEMBER_COLLECTION,
                source,
            })?;
        Ok(())
    }

    async fn count_members(&self, team_id: Uuid) -> MongoResult<u64> {
        self.collection::<MongoMemberDocument>(MEMBER_COLLECTION)
            .await
            .count_documents(doc! {"team_id": uuid_as_binary(team_id)})
            .await
            .map_err(|source| MongoDaoError::Read {
                collection: MEMBER_COLLECTION,
                source,
            })
    }

    async fn find_member_by_token(
        &self,
        session_token: String,
    ) -> MongoResult<Option<TeamMemberEntity>> {
        let document = self
            .collection::<MongoMemberDocument>(MEMBER_COLLECTION)
            .await
            .find_one(doc! {"session_token": session_token})
            .await
            .map_err(|source| MongoDaoError::Read {
                collection: MEMBER_COLLECTION,
                source,
            })?;
        Ok(document.map(Into::into))
    }

    async fn touch_member(&self, member_id: Uuid, at: OffsetDateTime) -> MongoResult<()> {
        self.collection::<MongoMemberDocument>(MEMBER_COLLECTION)
            .await
            .update_one(
                doc_id(member_id),
                doc! {"$set": {"last_active_at": to_bson(at)}},
            )
            .await
            .map_err(|source| MongoDaoError::Write {
                collection: MEMBER_COLLECTION,
                source,
            })?;
        Ok(())
    }

    async fn save_stage(&self, stage: StageEntity) -> MongoResult<()> {
        let document: MongoStageDocument = stage.into();
        self.collection::<MongoStageDocument>(STAGE_COLLECTION)
            .await
            .replace_one(doc_id(document.id), &document)
            .upsert(true)
            .await
            .map_err(|source| MongoDaoError::Write {
                collection: STAGE_COLLECTION,
                source,
            })?;
        Ok(())
    }

    async fn find_stage(&self, id: Uuid) -> MongoResult<Option<StageEntity>> {
        let document = self
            .collection::<MongoStageDocument>(STAGE_COLLECTION)
            .await
            .find_one(doc_id(id))
            .await
            .map_err(|source| MongoDaoError::Read {
                collection: STAGE_COLLECTION,
                source,
            })?;
        Ok(document.map(Into::into))
    }

    async fn list_stages(&self, event_id: Uuid) -> MongoResult<Vec<StageEntity>> {
        let documents: Vec<MongoStageDocument> = self
            .collection::<MongoStageDocument>(STAGE_COLLECTION)
            .await
            .find(doc! {"event_id": uuid_as_binary(event_id)})
            .sort(doc! {"order_index": 1})
            .await
            .map_err(|source| MongoDaoError::Read {
                collection: STAGE_COLLECTION,
                source,
            })?
            .try_collect()
            .await
            .map_err(|source| MongoDaoError::Read {
                collection: STAGE_COLLECTION,
                source,
            })?;
        Ok(documents.into_iter().map(Into::into).collect())
    }

    async fn save_hint(&self, hint: HintEntity) -> MongoResult<()> {
        let document: MongoHintDocument = hint.into();
        self.collection::<MongoHintDocument>(HINT_COLLECTION)
            .await
            .replace_one(doc_id(document.id), &document)
            .upsert(true)
            .await
            .map_err(|source| MongoDaoError::Write {
                collection: HINT_COLLECTION,
                source,
            })?;
        Ok(())
    }

    async fn find_hint(&self, id: Uuid) -> MongoResult<Option<HintEntity>> {
        let document = self
            .collection::<MongoHintDocument>(HINT_COLLECTION)
            .await
            .find_one(doc_id(id))
            .await
            .map_err(|source| MongoDaoError::Read {
                collection: HINT_COLLECTION,
                source,
            })?;
        Ok(document.map(Into::into))
    }

    async fn list_hints(&self, stage_id: Uuid) -> MongoResult<Vec<HintEntity>> {
        let documents: Vec<MongoHintDocument> = self
            .collection::<MongoHintDocument>(HINT_COLLECTION)
            .await
            .find(doc! {"stage_id": uuid_as_binary(stage_id)})
            .sort(doc! {"level": 1})
            .await
            .map_err(|source| MongoDaoError::Read {
                collection: HINT_COLLECTION,
                source,
            })?
            .try_collect()
            .await
            .map_err(|source| MongoDaoError::Read {
                collection: HINT_COLLECTION,
                source,
            })?;
        Ok(documents.into_iter().map(Into::into).collect())
    }

    fn progress_filter(team_id: Uuid, stage_id: Uuid) -> mongodb::bson::Document {
        doc! {
            "team_id": uuid_as_binary(team_id),
            "stage_id": uuid_as_binary(stage_id),
        }
    }

    async fn save_progress(&self, progress: TeamProgressEntity) -> MongoResult<()> {
        let document: MongoProgressDocument = progress.into();
        self.collection::<MongoProgressDocument>(PROGRESS_COLLECTION)
            .await
            .replace_one(
                Self::progress_filter(document.team_id, document.stage_id),
                &document,
            )
            .upsert(true)
            .await
            .map_err(|source| MongoDaoError::Write {
                collection: PROGRESS_COLLECTION,
                source,
            })?;
        Ok(())
    }

    async fn find_progress(
        &self,
        team_id: Uuid,
        stage_id: Uuid,
    ) -> MongoResult<Option<TeamProgressEntity>> {
        let document = self
            .collection::<MongoProgressDocument>(PROGRESS_COLLECTION)
            .await
            .find_one(Self::progress_filter(team_id, stage_id))
            .await
            .map_err(|source| MongoDaoError::Read {
                collection: PROGRESS_COLLECTION,
                source,
            })?;
        Ok(document.map(Into::into))
    }

    async fn list_progress(&self, team_id: Uuid) -> MongoResult<Vec<TeamProgressEntity>> {
        let documents: Vec<MongoProgressDocument> = self
            .collection::<MongoProgressDocument>(PROGRESS_COLLECTION)
            .await
            .find(doc! {"team_id": uuid_as_binary(team_id)})
            .await
            .map_err(|source| MongoDaoError::Read {
                collection: PROGRESS_COLLECTION,
                source,
            })?
            .try_collect()
            .await
            .map_err(|source| MongoDaoError::Read {
                collection: PROGRESS_COLLECTION,
                source,
            })?;
        Ok(documents.into_iter().map(Into::into).collect())
    }

    async fn complete_progress_if_active(
        &self,
        progress: TeamProgressEntity,
    ) -> MongoResult<bool> {
        let document: MongoProgressDocument = progress.into();
        let mut filter = Self::progress_filter(document.team_id, document.stage_id);
        filter.insert("status", progress_status_str(ProgressStatus::Active));

        let result = self
            .collection::<MongoProgressDocument>(PROGRESS_COLLECTION)
            .await
            .replace_one(filter, &document)
            .await
            .map_err(|source| MongoDaoError::Write {
                collection: PROGRESS_COLLECTION,
                source,
            })?;
        Ok(result.modified_count > 0)
    }

    async fn record_attempt_failure(
        &self,
        team_id: Uuid,
        stage_id: Uuid,
        at: OffsetDateTime,
    ) -> MongoResult<()> {
        self.collection::<MongoProgressDocument>(PROGRESS_COLLECTION)
            .await
            .update_one(
                Self::progress_filter(team_id, stage_id),
                doc! {
                    "$inc": {"attempt_count": 1},
                    "$set": {"last_attempt_at": to_bson(at)},
                },
            )
            .await
            .map_err(|source| MongoDaoError::Write {
                collection: PROGRESS_COLLECTION,
                source,
            })?;
        Ok(())
    }

    async fn add_hint_penalty(
        &self,
        team_id: Uuid,
        stage_id: Uuid,
        penalty: i64,
    ) -> MongoResult<()> {
        self.collection::<MongoProgressDocument>(PROGRESS_COLLECTION)
            .await
            .update_one(
                Self::progress_filter(team_id, stage_id),
                doc! {"$inc": {"hint_penalties": penalty}},
            )
            .await
            .map_err(|source| MongoDaoError::Write {
                collection: PROGRESS_COLLECTION,
                source,
            })?;
        Ok(())
    }

    async fn insert_hint_usage(&self, usage: HintUsageEntity) -> MongoResult<bool> {
        let document: MongoHintUsageDocument = usage.into();
        match self
            .collection::<MongoHintUsageDocument>(HINT_USAGE_COLLECTION)
            .await
            .insert_one(&document)
            .await
        {
            Ok(_) => Ok(true),
            // The unique (team_id, hint_id) index turns a replay into a
            // duplicate-key error rather than a second row.
            Err(err) if is_duplicate_key(&err) => Ok(false),
            Err(source) => Err(MongoDaoError::Write {
                collection: HINT_USAGE_COLLECTION,
                source,
            }),
        }
    }

    async fn find_hint_usage(
        &self,
        team_id: Uuid,
        hint_id: Uuid,
    ) -> MongoResult<Option<HintUsageEntity>> {
        let document = self
            .collection::<MongoHintUsageDocument>(HINT_USAGE_COLLECTION)
            .await
            .find_one(doc! {
                "team_id": uuid_as_binary(team_id),
                "hint_id": uuid_as_binary(hint_id),
            })
            .await
            .map_err(|source| MongoDaoError::Read {
                collection: HINT_USAGE_COLLECTION,
                source,
            })?;
        Ok(document.map(Into::into))
    }

    async fn delete_hint_usage(&self, team_id: Uuid, hint_id: Uuid) -> MongoResult<()> {
        self.collection::<MongoHintUsageDocument>(HINT_USAGE_COLLECTION)
            .await
            .delete_one(doc! {
                "team_id": uuid_as_binary(team_id),
                "hint_id": uuid_as_binary(hint_id),
            })
            .await
            .map_err(|source| MongoDaoError::Delete {
                collection: HINT_USAGE_COLLECTION,
                source,
            })?;
        Ok(())
    }

    async fn append_code_attempt(&self, attempt: CodeAttemptEntity) -> MongoResult<()> {
        let document: MongoCodeAttemptDocument = attempt.into();
        self.collection::<MongoCodeAttemptDocument>(CODE_ATTEMPT_COLLECTION)
            .await
            .insert_one(&document)
            .await
            .map_err(|source| MongoDaoError::Write {
                collection: CODE_ATTEMPT_COLLECTION,
                source,
            })?;
        Ok(())
    }

    async fn reset_event_play_data(
        &self,
        event_id: Uuid,
        hints_per_team: u32,
        drop_teams: bool,
    ) -> MongoResult<()> {
        let teams = self.list_teams(event_id).await?;
        let team_ids: Vec<mongodb::bson::Binary> =
            teams.iter().map(|team| uuid_as_binary(team.id)).collect();
        let team_filter = doc! {"team_id": {"$in": team_ids.clone()}};

        self.collection::<MongoProgressDocument>(PROGRESS_COLLECTION)
            .await
            .delete_many(team_filter.clone())
            .await
            .map_err(|source| MongoDaoError::Delete {
                collection: PROGRESS_COLLECTION,
                source,
            })?;
        self.collection::<MongoHintUsageDocument>(HINT_USAGE_COLLECTION)
            .await
            .delete_many(team_filter.clone())
            .await
            .map_err(|source| MongoDaoError::Delete {
                collection: HINT_USAGE_COLLECTION,
                source,
            })?;
        self.collection::<MongoCodeAttemptDocument>(CODE_ATTEMPT_COLLECTION)
            .await
            .delete_many(team_filter.clone())
            .await
            .map_err(|source| MongoDaoError::Delete {
                collection: CODE_ATTEMPT_COLLECTION,
                source,
            })?;

        if drop_teams {
            self.collection::<MongoMemberDocument>(MEMBER_COLLECTION)
                .await
                .delete_many(team_filter)
                .await
                .map_err(|source| MongoDaoError::Delete {
                    collection: MEMBER_COLLECTION,
                    source,
                })?;
            self.collection::<MongoTeamDocument>(TEAM_COLLECTION)
                .await
                .delete_many(doc! {"event_id": uuid_as_binary(event_id)})
                .await
                .map_err(|source| MongoDaoError::Delete {
                    collection: TEAM_COLLECTION,
                    source,
                })?;
        } else {
            self.collection::<MongoTeamDocument>(TEAM_COLLECTION)
                .await
                .update_many(
                    doc! {"event_id": uuid_as_binary(event_id)},
                    doc! {"$set": {
                        "hints_remaining": i64::from(hints_per_team),
                        "total_points": 0_i64,
                        "finished_at": mongodb::bson::Bson::Null,
                    }},
                )
                .await
                .map_err(|source| MongoDaoError::Write {
                    collection: TEAM_COLLECTION,
                    source,
                })?;
        }

        Ok(())
    }
}

impl EventStore for MongoEventStore {
    fn save_event(&self, event: EventEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.save_event(event).await.map_err(Into::into) })
    }

    fn find_event(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<EventEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.find_event(id).await.map_err(Into::into) })
    }

    fn replace_event_if_status(
        &self,
        event: EventEntity,
        expected: Vec<EventStatus>,
    ) -> BoxFuture<'static, StorageResult<Option<EventEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .replace_event_if_status(event, expected)
                .await
                .map_err(Into::into)
        })
    }

    fn save_team(&self, team: TeamEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.save_team(team).await.map_err(Into::into) })
    }

    fn find_team(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<TeamEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.find_team(id).await.map_err(Into::into) })
    }

    fn list_teams(&self, event_id: Uuid) -> BoxFuture<'static, StorageResult<Vec<TeamEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.list_teams(event_id).await.map_err(Into::into) })
    }

    fn find_team_by_join_code(
        &self,
        event_id: Uuid,
        join_code: String,
    ) -> BoxFuture<'static, StorageResult<Option<TeamEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .find_team_by_join_code(event_id, join_code)
                .await
                .map_err(Into::into)
        })
    }

    fn mark_team_finished(
        &self,
        team_id: Uuid,
        at: OffsetDateTime,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .mark_team_finished(team_id, at)
                .await
                .map_err(Into::into)
        })
    }

    fn add_team_points(
        &self,
        team_id: Uuid,
        delta: i64,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .add_team_points(team_id, delta)
                .await
                .map_err(Into::into)
        })
    }

    fn debit_team_hints(
        &self,
        team_id: Uuid,
        cost: u32,
    ) -> BoxFuture<'static, StorageResult<Option<u32>>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .debit_team_hints(team_id, cost)
                .await
                .map_err(Into::into)
        })
    }

    fn insert_member(&self, member: TeamMemberEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.insert_member(member).await.map_err(Into::into) })
    }

    fn count_members(&self, team_id: Uuid) -> BoxFuture<'static, StorageResult<u64>> {
        let store = self.clone();
        Box::pin(async move { store.count_members(team_id).await.map_err(Into::into) })
    }

    fn find_member_by_token(
        &self,
        session_token: String,
    ) -> BoxFuture<'static, StorageResult<Option<TeamMemberEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .find_member_by_token(session_token)
                .await
                .map_err(Into::into)
        })
    }

    fn touch_member(
        &self,
        member_id: Uuid,
        at: OffsetDateTime,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.touch_member(member_id, at).await.map_err(Into::into) })
    }

    fn save_stage(&self, stage: StageEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.save_stage(stage).await.map_err(Into::into) })
    }

    fn find_stage(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<StageEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.find_stage(id).await.map_err(Into::into) })
    }

    fn list_stages(&self, event_id: Uuid) -> BoxFuture<'static, StorageResult<Vec<StageEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.list_stages(event_id).await.map_err(Into::into) })
    }

    fn save_hint(&self, hint: HintEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.save_hint(hint).await.map_err(Into::into) })
    }

    fn find_hint(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<HintEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.find_hint(id).await.map_err(Into::into) })
    }

    fn list_hints(&self, stage_id: Uuid) -> BoxFuture<'static, StorageResult<Vec<HintEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.list_hints(stage_id).await.map_err(Into::into) })
    }

    fn save_progress(
        &self,
        progress: TeamProgressEntity,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.save_progress(progress).await.map_err(Into::into) })
    }

    fn find_progress(
        &self,
        team_id: Uuid,
        stage_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Option<TeamProgressEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .find_progress(team_id, stage_id)
                .await
                .map_err(Into::into)
        })
    }

    fn list_progress(
        &self,
        team_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Vec<TeamProgressEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.list_progress(team_id).await.map_err(Into::into) })
    }

    fn complete_progress_if_active(
        &self,
        progress: TeamProgressEntity,
    ) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .complete_progress_if_active(progress)
                .await
                .map_err(Into::into)
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
            store
                .record_attempt_failure(team_id, stage_id, at)
                .await
                .map_err(Into::into)
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
            store
                .add_hint_penalty(team_id, stage_id, penalty)
                .await
                .map_err(Into::into)
        })
    }

    fn insert_hint_usage(
        &self,
        usage: HintUsageEntity,
    ) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        Box::pin(async move { store.insert_hint_usage(usage).await.map_err(Into::into) })
    }

    fn find_hint_usage(
        &self,
        team_id: Uuid,
        hint_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Option<HintUsageEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .find_hint_usage(team_id, hint_id)
                .await
                .map_err(Into::into)
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
                .delete_hint_usage(team_id, hint_id)
                .await
                .map_err(Into::into)
        })
    }

    fn append_code_attempt(
        &self,
        attempt: CodeAttemptEntity,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.append_code_attempt(attempt).await.map_err(Into::into) })
    }

    fn reset_event_play_data(
        &self,
        event_id: Uuid,
        hints_per_team: u32,
        drop_teams: bool,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .reset_event_play_data(event_id, hints_per_team, drop_teams)
                .await
                .map_err(Into::into)
        })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.inner.ping().await.map_err(Into::into) })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.inner.reconnect().await.map_err(Into::into) })
    }
}
