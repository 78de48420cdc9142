//! Test repositories — `ProgressRepository` implementations for tests.

use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use questline_core::error::StoreError;
use questline_core::ids::{ActorId, QuestId};
use questline_core::repository::{
    LeaderboardRow, ProgressRepository, StoredProgress, StoredQuestDefinition,
};

/// An in-memory store with the same revision rule as the PostgreSQL adapter:
/// an upsert only lands when its revision is newer than the stored one.
///
/// Every `upsert_progress` call is counted, whether it landed or not.
#[derive(Debug, Default)]
pub struct InMemoryProgressRepository {
    quests: Mutex<BTreeMap<QuestId, StoredQuestDefinition>>,
    progress: Mutex<HashMap<(ActorId, QuestId), StoredProgress>>,
    upsert_calls: AtomicUsize,
}

impl InMemoryProgressRepository {
    /// Creates an empty repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a repository pre-loaded with the given quest definitions.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[must_use]
    pub fn with_quests(quests: Vec<StoredQuestDefinition>) -> Self {
        let repo = Self::new();
        {
            let mut map = repo.quests.lock().unwrap();
            for quest in quests {
                map.insert(quest.id, quest);
            }
        }
        repo
    }

    /// Stores a progress row directly, bypassing the revision check.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn insert_progress(&self, row: StoredProgress) {
        self.progress
            .lock()
            .unwrap()
            .insert((row.actor_id, row.quest_id), row);
    }

    /// Replaces every quest definition.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn replace_quests(&self, quests: Vec<StoredQuestDefinition>) {
        let mut map = self.quests.lock().unwrap();
        map.clear();
        for quest in quests {
            map.insert(quest.id, quest);
        }
    }

    /// Returns the stored row for `(actor_id, quest_id)`, if any.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn progress_for(&self, actor_id: ActorId, quest_id: QuestId) -> Option<StoredProgress> {
        self.progress
            .lock()
            .unwrap()
            .get(&(actor_id, quest_id))
            .cloned()
    }

    /// Returns the number of stored progress rows.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn progress_len(&self) -> usize {
        self.progress.lock().unwrap().len()
    }

    /// Returns the stored quest definition, if any.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn quest(&self, quest_id: QuestId) -> Option<StoredQuestDefinition> {
        self.quests.lock().unwrap().get(&quest_id).cloned()
    }

    /// Returns how many times `upsert_progress` was called.
    pub fn upsert_calls(&self) -> usize {
        self.upsert_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ProgressRepository for InMemoryProgressRepository {
    async fn fetch_all_quest_definitions(&self) -> Result<Vec<StoredQuestDefinition>, StoreError> {
        Ok(self.quests.lock().unwrap().values().cloned().collect())
    }

    async fn fetch_progress_for_actor(
        &self,
        actor_id: ActorId,
    ) -> Result<Vec<StoredProgress>, StoreError> {
        Ok(self
            .progress
            .lock()
            .unwrap()
            .values()
            .filter(|row| row.actor_id == actor_id)
            .cloned()
            .collect())
    }

    async fn upsert_progress(&self, record: &StoredProgress) -> Result<(), StoreError> {
        self.upsert_calls.fetch_add(1, Ordering::SeqCst);
        let mut map = self.progress.lock().unwrap();
        let key = (record.actor_id, record.quest_id);
        let newer = map
            .get(&key)
            .is_none_or(|existing| existing.revision < record.revision);
        if newer {
            map.insert(key, record.clone());
        }
        Ok(())
    }

    async fn upsert_quest_definition(
        &self,
        definition: &StoredQuestDefinition,
    ) -> Result<(), StoreError> {
        self.quests
            .lock()
            .unwrap()
            .insert(definition.id, definition.clone());
        Ok(())
    }

    async fn fetch_leaderboard(&self, limit: u32) -> Result<Vec<LeaderboardRow>, StoreError> {
        let mut counts: BTreeMap<ActorId, i64> = BTreeMap::new();
        for row in self.progress.lock().unwrap().values() {
            if row.status == "COMPLETED" {
                *counts.entry(row.actor_id).or_default() += 1;
            }
        }
        let mut rows: Vec<LeaderboardRow> = counts
            .into_iter()
            .map(|(actor_id, completed_quests)| LeaderboardRow {
                actor_id,
                completed_quests,
            })
            .collect();
        rows.sort_by(|a, b| {
            b.completed_quests
                .cmp(&a.completed_quests)
                .then(a.actor_id.cmp(&b.actor_id))
        });
        rows.truncate(limit as usize);
        Ok(rows)
    }
}

/// A repository that always returns an unavailable error. Useful for testing
/// error-handling paths.
#[derive(Debug)]
pub struct FailingProgressRepository;

fn refused() -> StoreError {
    StoreError::Unavailable("connection refused".into())
}

#[async_trait]
impl ProgressRepository for FailingProgressRepository {
    async fn fetch_all_quest_definitions(&self) -> Result<Vec<StoredQuestDefinition>, StoreError> {
        Err(refused())
    }

    async fn fetch_progress_for_actor(
        &self,
        _actor_id: ActorId,
    ) -> Result<Vec<StoredProgress>, StoreError> {
        Err(refused())
    }

    async fn upsert_progress(&self, _record: &StoredProgress) -> Result<(), StoreError> {
        Err(refused())
    }

    async fn upsert_quest_definition(
        &self,
        _definition: &StoredQuestDefinition,
    ) -> Result<(), StoreError> {
        Err(refused())
    }

    async fn fetch_leaderboard(&self, _limit: u32) -> Result<Vec<LeaderboardRow>, StoreError> {
        Err(refused())
    }
}

/// Wraps an [`InMemoryProgressRepository`] and fails the first
/// `failures` calls to `upsert_progress`.
#[derive(Debug)]
pub struct FlakyProgressRepository {
    inner: InMemoryProgressRepository,
    failures_left: AtomicUsize,
    upsert_attempts: AtomicUsize,
}

impl FlakyProgressRepository {
    /// Creates a flaky repository around `inner`.
    #[must_use]
    pub fn new(inner: InMemoryProgressRepository, failures: usize) -> Self {
        Self {
            inner,
            failures_left: AtomicUsize::new(failures),
            upsert_attempts: AtomicUsize::new(0),
        }
    }

    /// The wrapped repository.
    #[must_use]
    pub fn inner(&self) -> &InMemoryProgressRepository {
        &self.inner
    }

    /// Returns how many upserts were attempted, failed ones included.
    pub fn upsert_attempts(&self) -> usize {
        self.upsert_attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ProgressRepository for FlakyProgressRepository {
    async fn fetch_all_quest_definitions(&self) -> Result<Vec<StoredQuestDefinition>, StoreError> {
        self.inner.fetch_all_quest_definitions().await
    }

    async fn fetch_progress_for_actor(
        &self,
        actor_id: ActorId,
    ) -> Result<Vec<StoredProgress>, StoreError> {
        self.inner.fetch_progress_for_actor(actor_id).await
    }

    async fn upsert_progress(&self, record: &StoredProgress) -> Result<(), StoreError> {
        self.upsert_attempts.fetch_add(1, Ordering::SeqCst);
        let failed = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failed {
            return Err(StoreError::Unavailable("transient write failure".into()));
        }
        self.inner.upsert_progress(record).await
    }

    async fn upsert_quest_definition(
        &self,
        definition: &StoredQuestDefinition,
    ) -> Result<(), StoreError> {
        self.inner.upsert_quest_definition(definition).await
    }

    async fn fetch_leaderboard(&self, limit: u32) -> Result<Vec<LeaderboardRow>, StoreError> {
        self.inner.fetch_leaderboard(limit).await
    }
}

/// Wraps an [`InMemoryProgressRepository`] and delays every fetch by a fixed
/// duration. Writes are not delayed. Useful for timeout and in-flight load
/// scenarios.
#[derive(Debug)]
pub struct StallingProgressRepository {
    inner: InMemoryProgressRepository,
    delay: Duration,
}

impl StallingProgressRepository {
    /// Creates a stalling repository around `inner`.
    #[must_use]
    pub fn new(inner: InMemoryProgressRepository, delay: Duration) -> Self {
        Self { inner, delay }
    }

    /// The wrapped repository.
    #[must_use]
    pub fn inner(&self) -> &InMemoryProgressRepository {
        &self.inner
    }
}

#[async_trait]
impl ProgressRepository for StallingProgressRepository {
    async fn fetch_all_quest_definitions(&self) -> Result<Vec<StoredQuestDefinition>, StoreError> {
        tokio::time::sleep(self.delay).await;
        self.inner.fetch_all_quest_definitions().await
    }

    async fn fetch_progress_for_actor(
        &self,
        actor_id: ActorId,
    ) -> Result<Vec<StoredProgress>, StoreError> {
        tokio::time::sleep(self.delay).await;
        self.inner.fetch_progress_for_actor(actor_id).await
    }

    async fn upsert_progress(&self, record: &StoredProgress) -> Result<(), StoreError> {
        self.inner.upsert_progress(record).await
    }

    async fn upsert_quest_definition(
        &self,
        definition: &StoredQuestDefinition,
    ) -> Result<(), StoreError> {
        self.inner.upsert_quest_definition(definition).await
    }

    async fn fetch_leaderboard(&self, limit: u32) -> Result<Vec<LeaderboardRow>, StoreError> {
        self.inner.fetch_leaderboard(limit).await
    }
}
