//! `PostgreSQL` implementation of the `ProgressRepository` trait.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use sqlx::error::ErrorKind;
use uuid::Uuid;

use questline_core::error::StoreError;
use questline_core::ids::{ActorId, QuestId};
use questline_core::repository::{
    LeaderboardRow, ProgressRepository, StoredProgress, StoredQuestDefinition,
};

/// PostgreSQL-backed quest and progress repository.
#[derive(Debug, Clone)]
pub struct PgProgressRepository {
    pool: PgPool,
}

impl PgProgressRepository {
    /// Creates a new `PgProgressRepository`.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// The underlying pool.
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[derive(Debug, sqlx::FromRow)]
struct QuestRow {
    id: i32,
    quest_key: String,
    name: String,
    description: String,
    objective_kind: String,
    target: String,
    required_amount: i32,
}

impl From<QuestRow> for StoredQuestDefinition {
    fn from(row: QuestRow) -> Self {
        Self {
            id: QuestId(row.id),
            quest_key: row.quest_key,
            name: row.name,
            description: row.description,
            objective_kind: row.objective_kind,
            target: row.target,
            required_amount: row.required_amount,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct ProgressRow {
    actor_id: Uuid,
    quest_id: i32,
    progress: i32,
    status: String,
    revision: i64,
    updated_at: DateTime<Utc>,
}

impl From<ProgressRow> for StoredProgress {
    fn from(row: ProgressRow) -> Self {
        Self {
            actor_id: ActorId(row.actor_id),
            quest_id: QuestId(row.quest_id),
            progress: row.progress,
            status: row.status,
            revision: row.revision,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct LeaderboardQueryRow {
    actor_id: Uuid,
    completed_quests: i64,
}

/// Maps a driver error onto the store's two failure classes: rows that
/// cannot be decoded or violate a constraint are corrupt, everything else
/// is an availability problem.
fn store_error(err: sqlx::Error) -> StoreError {
    match &err {
        sqlx::Error::Decode(_)
        | sqlx::Error::ColumnDecode { .. }
        | sqlx::Error::ColumnNotFound(_)
        | sqlx::Error::TypeNotFound { .. } => StoreError::Corrupt(err.to_string()),
        sqlx::Error::Database(db) if !matches!(db.kind(), ErrorKind::Other) => {
            StoreError::Corrupt(err.to_string())
        }
        _ => StoreError::Unavailable(err.to_string()),
    }
}

#[async_trait]
impl ProgressRepository for PgProgressRepository {
    async fn fetch_all_quest_definitions(&self) -> Result<Vec<StoredQuestDefinition>, StoreError> {
        let rows = sqlx::query_as::<_, QuestRow>(
            r"SELECT id, quest_key, name, description, objective_kind, target, required_amount
              FROM quests
              ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(store_error)?;

        Ok(rows.into_iter().map(StoredQuestDefinition::from).collect())
    }

    async fn fetch_progress_for_actor(
        &self,
        actor_id: ActorId,
    ) -> Result<Vec<StoredProgress>, StoreError> {
        let rows = sqlx::query_as::<_, ProgressRow>(
            r"SELECT actor_id, quest_id, progress, status, revision, updated_at
              FROM quest_progress
              WHERE actor_id = $1",
        )
        .bind(actor_id.into_inner())
        .fetch_all(&self.pool)
        .await
        .map_err(store_error)?;

        Ok(rows.into_iter().map(StoredProgress::from).collect())
    }

    async fn upsert_progress(&self, record: &StoredProgress) -> Result<(), StoreError> {
        let result = sqlx::query(
            r"INSERT INTO quest_progress (actor_id, quest_id, progress, status, revision, updated_at)
              VALUES ($1, $2, $3, $4, $5, $6)
              ON CONFLICT (actor_id, quest_id) DO UPDATE
              SET progress = EXCLUDED.progress,
                  status = EXCLUDED.status,
                  revision = EXCLUDED.revision,
                  updated_at = EXCLUDED.updated_at
              WHERE quest_progress.revision < EXCLUDED.revision",
        )
        .bind(record.actor_id.into_inner())
        .bind(record.quest_id.0)
        .bind(record.progress)
        .bind(&record.status)
        .bind(record.revision)
        .bind(record.updated_at)
        .execute(&self.pool)
        .await
        .map_err(store_error)?;

        if result.rows_affected() == 0 {
            tracing::debug!(
                actor_id = %record.actor_id,
                quest_id = %record.quest_id,
                revision = record.revision,
                "Stale progress write ignored"
            );
        }
        Ok(())
    }

    async fn upsert_quest_definition(
        &self,
        definition: &StoredQuestDefinition,
    ) -> Result<(), StoreError> {
        sqlx::query(
            r"INSERT INTO quests (id, quest_key, name, description, objective_kind, target, required_amount)
              VALUES ($1, $2, $3, $4, $5, $6, $7)
              ON CONFLICT (id) DO UPDATE
              SET quest_key = EXCLUDED.quest_key,
                  name = EXCLUDED.name,
                  description = EXCLUDED.description,
                  objective_kind = EXCLUDED.objective_kind,
                  target = EXCLUDED.target,
                  required_amount = EXCLUDED.required_amount",
        )
        .bind(definition.id.0)
        .bind(&definition.quest_key)
        .bind(&definition.name)
        .bind(&definition.description)
        .bind(&definition.objective_kind)
        .bind(&definition.target)
        .bind(definition.required_amount)
        .execute(&self.pool)
        .await
        .map_err(store_error)?;

        Ok(())
    }

    async fn fetch_leaderboard(&self, limit: u32) -> Result<Vec<LeaderboardRow>, StoreError> {
        let rows = sqlx::query_as::<_, LeaderboardQueryRow>(
            r"SELECT actor_id, COUNT(*) AS completed_quests
              FROM quest_progress
              WHERE status = 'COMPLETED'
              GROUP BY actor_id
              ORDER BY completed_quests DESC, actor_id
              LIMIT $1",
        )
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(store_error)?;

        Ok(rows
            .into_iter()
            .map(|row| LeaderboardRow {
                actor_id: ActorId(row.actor_id),
                completed_quests: row.completed_quests,
            })
            .collect())
    }
}
