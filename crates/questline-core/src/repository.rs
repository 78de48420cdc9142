//! Progress store abstraction.
//!
//! The durable store is a write-behind replica of the in-memory progress
//! cache. Rows cross this boundary in their stored shape (strings for
//! enumerations, signed integers for counters); the progress context validates
//! and converts them into domain types.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::StoreError;
use crate::ids::{ActorId, QuestId};

/// Stored representation of a quest definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredQuestDefinition {
    /// Quest identifier.
    pub id: QuestId,
    /// Unique human-readable key, e.g. `zombie_hunter_1`.
    pub quest_key: String,
    /// Display name.
    pub name: String,
    /// Description lines joined with `\n`.
    pub description: String,
    /// Objective kind name, e.g. `KILL_TARGET`.
    pub objective_kind: String,
    /// Target discriminator, e.g. `ZOMBIE`.
    pub target: String,
    /// Amount required to complete the quest.
    pub required_amount: i32,
}

/// Stored representation of one actor's progress on one quest.
///
/// Only `IN_PROGRESS` and `COMPLETED` rows are ever written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredProgress {
    /// Owning actor.
    pub actor_id: ActorId,
    /// Quest the progress refers to.
    pub quest_id: QuestId,
    /// Progress counter.
    pub progress: i32,
    /// Status name, `IN_PROGRESS` or `COMPLETED`.
    pub status: String,
    /// Monotonic per-record revision. A write only lands if it is newer
    /// than what the store already holds.
    pub revision: i64,
    /// Time of the mutation that produced this revision.
    pub updated_at: DateTime<Utc>,
}

/// One leaderboard line: an actor and how many quests they completed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeaderboardRow {
    /// The actor.
    pub actor_id: ActorId,
    /// Number of `COMPLETED` progress rows.
    pub completed_quests: i64,
}

/// Repository trait for quest definitions and progress records.
#[async_trait]
pub trait ProgressRepository: Send + Sync {
    /// Load every quest definition.
    async fn fetch_all_quest_definitions(&self) -> Result<Vec<StoredQuestDefinition>, StoreError>;

    /// Load every persisted progress row for one actor.
    async fn fetch_progress_for_actor(
        &self,
        actor_id: ActorId,
    ) -> Result<Vec<StoredProgress>, StoreError>;

    /// Insert or update a progress row keyed by `(actor_id, quest_id)`.
    ///
    /// Implementations must ignore the write when the stored revision is
    /// greater than or equal to `record.revision`.
    async fn upsert_progress(&self, record: &StoredProgress) -> Result<(), StoreError>;

    /// Insert or replace a quest definition keyed by its id.
    async fn upsert_quest_definition(
        &self,
        definition: &StoredQuestDefinition,
    ) -> Result<(), StoreError>;

    /// Actors ranked by completed quest count, highest first, ties broken by
    /// actor id.
    async fn fetch_leaderboard(&self, limit: u32) -> Result<Vec<LeaderboardRow>, StoreError>;
}
