//! The progress coordinator: applies start and progress events to the cache
//! and hands every changed record to the write-behind queue.
//!
//! `start_quest`, `report_progress` and `get_record` only touch memory and
//! are safe to call from any thread handling live events. `reload_catalog`
//! and `load_actor_session` await the store, under a timeout.
//!
//! A progress report for an actor whose session has not finished loading
//! finds no partition and is dropped. That window is bounded by one session
//! query and the drop is logged at debug level; reports are not buffered.
//!
//! Once loaded, a partition is the only authority for that actor: loading
//! again is a no-op, and a fresh load overlays writes that have not landed
//! yet on the stored rows.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use questline_core::clock::Clock;
use questline_core::ids::{ActorId, QuestId};
use questline_core::repository::{ProgressRepository, StoredProgress};
use tokio::sync::broadcast;

use crate::application::cache::{ActorPartition, ProgressCache};
use crate::application::catalog::{CatalogSnapshot, QuestCatalog};
use crate::application::write_behind::{WriteBehindQueue, WritePolicy, WriteStats};
use crate::config::CoordinatorConfig;
use crate::domain::events::{ProgressNotification, QuestProgressSummary};
use crate::domain::progress::{ProgressRecord, QuestStatus};
use crate::domain::quest::{ObjectiveKind, QuestDefinition};
use crate::error::{LoadError, SessionLoadError, StartError};

/// Owner of the quest catalog, the progress cache and the write-behind queue.
pub struct ProgressCoordinator {
    repo: Arc<dyn ProgressRepository>,
    clock: Arc<dyn Clock>,
    config: CoordinatorConfig,
    catalog: QuestCatalog,
    cache: ProgressCache,
    writes: WriteBehindQueue,
    /// Generation of the newest in-flight session load per actor.
    loading: DashMap<ActorId, u64>,
    next_generation: AtomicU64,
    notifications: broadcast::Sender<ProgressNotification>,
}

impl std::fmt::Debug for ProgressCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressCoordinator")
            .field("config", &self.config)
            .field("active_sessions", &self.cache.active_sessions())
            .field("writes", &self.writes)
            .finish_non_exhaustive()
    }
}

impl ProgressCoordinator {
    /// Creates a coordinator with an empty catalog and no sessions, and
    /// starts its write-behind worker.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime.
    #[must_use]
    pub fn new(
        repo: Arc<dyn ProgressRepository>,
        clock: Arc<dyn Clock>,
        config: CoordinatorConfig,
    ) -> Self {
        let writes = WriteBehindQueue::spawn(
            Arc::clone(&repo),
            WritePolicy {
                max_attempts: config.persist_max_attempts,
                retry_backoff: config.persist_retry_backoff,
                concurrency: config.persist_concurrency,
            },
        );
        let (notifications, _) = broadcast::channel(config.notification_capacity.max(1));
        Self {
            repo,
            clock,
            config,
            catalog: QuestCatalog::new(),
            cache: ProgressCache::new(),
            writes,
            loading: DashMap::new(),
            next_generation: AtomicU64::new(0),
            notifications,
        }
    }

    // ------------------------------------------------------------------
    // Catalog
    // ------------------------------------------------------------------

    /// Loads the quest catalog from the store and publishes it. Returns the
    /// number of quests.
    ///
    /// # Errors
    ///
    /// Returns `LoadError` if the store fails, times out, or holds an invalid
    /// definition; the previous catalog stays active.
    pub async fn reload_catalog(&self) -> Result<usize, LoadError> {
        match self
            .catalog
            .load(self.repo.as_ref(), self.config.catalog_load_timeout)
            .await
        {
            Ok(snapshot) => Ok(snapshot.len()),
            Err(e) => {
                tracing::error!(error = %e, "Quest catalog load failed, keeping previous catalog");
                Err(e)
            }
        }
    }

    /// One quest definition from the active catalog.
    #[must_use]
    pub fn quest(&self, quest_id: QuestId) -> Option<Arc<QuestDefinition>> {
        self.catalog.get(quest_id)
    }

    /// Every quest definition, in unspecified order.
    #[must_use]
    pub fn quests(&self) -> Vec<Arc<QuestDefinition>> {
        self.catalog.all()
    }

    /// The active catalog snapshot.
    #[must_use]
    pub fn catalog(&self) -> Arc<CatalogSnapshot> {
        self.catalog.snapshot()
    }

    /// Whether the catalog has been loaded at least once.
    #[must_use]
    pub fn catalog_loaded(&self) -> bool {
        self.catalog.is_loaded()
    }

    // ------------------------------------------------------------------
    // Sessions
    // ------------------------------------------------------------------

    /// Loads the actor's persisted progress and publishes it as their cache
    /// partition. Returns the number of records loaded.
    ///
    /// An actor who already has a partition keeps it untouched and the store
    /// is not read. Records still queued for writing win over older stored
    /// rows.
    ///
    /// Nothing is published unless the whole load succeeds. If the actor's
    /// session ends, or a newer load starts, before this one finishes, the
    /// result is discarded.
    ///
    /// # Errors
    ///
    /// Returns `SessionLoadError` on store failure, timeout, undecodable rows,
    /// or when superseded. The actor keeps any partition it already had.
    pub async fn load_actor_session(&self, actor_id: ActorId) -> Result<usize, SessionLoadError> {
        if let Some(partition) = self.cache.partition(actor_id) {
            tracing::debug!(actor_id = %actor_id, "Session already loaded");
            return Ok(partition.len());
        }

        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed) + 1;
        self.loading.insert(actor_id, generation);

        let result = self.fetch_partition(actor_id).await;
        let (partition, clamped) = match result {
            Ok(loaded) => loaded,
            Err(e) => {
                self.loading.remove_if(&actor_id, |_, g| *g == generation);
                tracing::warn!(
                    actor_id = %actor_id,
                    error = %e,
                    "Session load failed, actor falls back to default progress"
                );
                return Err(e);
            }
        };

        let records = partition.len();
        // Publish while holding the loading entry so a concurrent
        // `end_actor_session` is ordered entirely before or after us.
        match self.loading.entry(actor_id) {
            Entry::Occupied(current) if *current.get() == generation => {
                self.cache.install(actor_id, partition);
                current.remove();
            }
            _ => {
                tracing::debug!(actor_id = %actor_id, "Session load superseded, discarding result");
                return Err(SessionLoadError::Superseded(actor_id));
            }
        }

        for record in &clamped {
            self.writes.schedule(record.to_stored());
        }
        tracing::info!(
            actor_id = %actor_id,
            records,
            clamped = clamped.len(),
            "Session loaded"
        );
        Ok(records)
    }

    /// Builds the partition from stored rows overlaid with unwritten
    /// records. Also returns the records that clamping changed, which still
    /// need a durable write.
    async fn fetch_partition(
        &self,
        actor_id: ActorId,
    ) -> Result<(ActorPartition, Vec<ProgressRecord>), SessionLoadError> {
        // Taken before the fetch: anything that leaves the queue afterwards
        // has landed and is visible to the query.
        let unwritten = self.writes.unwritten_for(actor_id);
        let timeout = self.config.session_load_timeout;
        let rows = tokio::time::timeout(timeout, self.repo.fetch_progress_for_actor(actor_id))
            .await
            .map_err(|_| SessionLoadError::Timeout(timeout))??;

        let mut latest: HashMap<QuestId, StoredProgress> =
            rows.into_iter().map(|row| (row.quest_id, row)).collect();
        for record in unwritten {
            if latest
                .get(&record.quest_id)
                .is_none_or(|row| row.revision < record.revision)
            {
                latest.insert(record.quest_id, record);
            }
        }

        let catalog = self.catalog.snapshot();
        let now = self.clock.now();
        let mut records = Vec::with_capacity(latest.len());
        let mut clamped = Vec::new();
        for row in latest.values() {
            let mut record = ProgressRecord::try_from(row)?;
            if record.is_default() {
                continue;
            }
            if let Some(quest) = catalog.get(record.quest_id)
                && record.clamp_to(quest.required_amount, now)
            {
                clamped.push(record.clone());
            }
            records.push(record);
        }
        Ok((ActorPartition::from_records(records), clamped))
    }

    /// Evicts the actor's partition and cancels any in-flight load for them.
    /// Writes already scheduled for the actor still complete. Returns whether
    /// a partition was evicted.
    pub fn end_actor_session(&self, actor_id: ActorId) -> bool {
        self.loading.remove(&actor_id);
        let evicted = self.cache.evict(actor_id);
        tracing::info!(actor_id = %actor_id, evicted, "Session ended");
        evicted
    }

    /// Whether the actor has a loaded session.
    #[must_use]
    pub fn has_session(&self, actor_id: ActorId) -> bool {
        self.cache.contains(actor_id)
    }

    /// Number of actors with a loaded session.
    #[must_use]
    pub fn active_sessions(&self) -> usize {
        self.cache.active_sessions()
    }

    // ------------------------------------------------------------------
    // State machine
    // ------------------------------------------------------------------

    /// The actor's record for a quest, or the `AVAILABLE` default when none
    /// is cached. Never touches the store and never inserts anything.
    #[must_use]
    pub fn get_record(&self, actor_id: ActorId, quest_id: QuestId) -> ProgressRecord {
        self.cache
            .get(actor_id, quest_id)
            .unwrap_or_else(|| ProgressRecord::available(actor_id, quest_id))
    }

    /// Moves the quest from `AVAILABLE` to `IN_PROGRESS` and schedules the
    /// durable write.
    ///
    /// # Errors
    ///
    /// - `StartError::QuestNotFound` if the quest is not in the catalog.
    /// - `StartError::SessionNotLoaded` if the actor has no partition.
    /// - `StartError::AlreadyStarted` with the unchanged record if the quest
    ///   is already in progress or completed.
    pub fn start_quest(
        &self,
        actor_id: ActorId,
        quest_id: QuestId,
    ) -> Result<ProgressRecord, StartError> {
        let quest = self
            .catalog
            .get(quest_id)
            .ok_or(StartError::QuestNotFound(quest_id))?;
        let partition = self
            .cache
            .partition(actor_id)
            .ok_or(StartError::SessionNotLoaded(actor_id))?;

        let record = partition
            .insert_if_absent(ProgressRecord::started(actor_id, quest_id, self.clock.now()))
            .map_err(StartError::AlreadyStarted)?;

        self.writes.schedule(record.to_stored());
        tracing::info!(
            actor_id = %actor_id,
            quest_id = %quest_id,
            quest = quest.name.as_str(),
            "Quest started"
        );
        self.publish(ProgressNotification::QuestStarted(summary(&quest, &record)));
        Ok(record)
    }

    /// Advances every in-progress quest of the actor that matches `objective`
    /// and `target` (case-insensitive) by one, completing those that reach
    /// their required amount. Returns the changed records; each is scheduled
    /// for one durable write.
    pub fn report_progress(
        &self,
        actor_id: ActorId,
        objective: ObjectiveKind,
        target: &str,
    ) -> Vec<ProgressRecord> {
        let Some(partition) = self.cache.partition(actor_id) else {
            tracing::debug!(
                actor_id = %actor_id,
                objective = %objective,
                target,
                "No session loaded, progress report dropped"
            );
            return Vec::new();
        };

        let catalog = self.catalog.snapshot();
        let target_key = QuestDefinition::target_key(target);
        let now = self.clock.now();

        let advanced = partition.update_each(|record| {
            catalog
                .get(record.quest_id)
                .filter(|quest| quest.matches(objective, &target_key))
                .and_then(|quest| record.advance(quest.required_amount, now))
                .is_some()
        });

        for record in &advanced {
            self.writes.schedule(record.to_stored());
            let Some(quest) = catalog.get(record.quest_id) else {
                continue;
            };
            let summary = summary(quest, record);
            if record.status == QuestStatus::Completed {
                tracing::info!(
                    actor_id = %actor_id,
                    quest_id = %record.quest_id,
                    progress = record.progress,
                    "Quest completed"
                );
                self.publish(ProgressNotification::QuestCompleted(summary));
            } else {
                tracing::debug!(
                    actor_id = %actor_id,
                    quest_id = %record.quest_id,
                    progress = record.progress,
                    required = quest.required_amount,
                    "Quest progress advanced"
                );
                self.publish(ProgressNotification::ProgressAdvanced(summary));
            }
        }
        advanced
    }

    // ------------------------------------------------------------------
    // Notifications and persistence
    // ------------------------------------------------------------------

    /// Subscribes to progress notifications published from now on.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<ProgressNotification> {
        self.notifications.subscribe()
    }

    fn publish(&self, notification: ProgressNotification) {
        // No subscribers is fine.
        let _ = self.notifications.send(notification);
    }

    /// The store behind this coordinator.
    #[must_use]
    pub fn repository(&self) -> Arc<dyn ProgressRepository> {
        Arc::clone(&self.repo)
    }

    /// Write-behind counters.
    #[must_use]
    pub fn write_stats(&self) -> WriteStats {
        self.writes.stats()
    }

    /// Waits until every write scheduled so far has landed or been given up.
    pub async fn flush(&self) {
        self.writes.flush().await;
    }

    /// Stops background persistence, draining pending writes within
    /// `deadline`. Returns the number of writes left unwritten.
    pub async fn shutdown(&self, deadline: Duration) -> usize {
        self.writes.shutdown(deadline).await
    }
}

fn summary(quest: &QuestDefinition, record: &ProgressRecord) -> QuestProgressSummary {
    QuestProgressSummary {
        actor_id: record.actor_id,
        quest_id: record.quest_id,
        quest_name: quest.name.clone(),
        progress: record.progress,
        required_amount: quest.required_amount,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use questline_core::ids::{ActorId, QuestId};
    use questline_test_support::{
        FailingProgressRepository, FixedClock, FlakyProgressRepository, InMemoryProgressRepository,
        StallingProgressRepository, quest_definition, stored_progress, zombie_hunter,
    };

    use super::*;

    fn config() -> CoordinatorConfig {
        CoordinatorConfig {
            session_load_timeout: Duration::from_millis(200),
            persist_retry_backoff: Duration::from_millis(1),
            ..CoordinatorConfig::default()
        }
    }

    async fn coordinator_with(repo: Arc<InMemoryProgressRepository>) -> ProgressCoordinator {
        let coordinator = ProgressCoordinator::new(repo, Arc::new(FixedClock::default()), config());
        coordinator.reload_catalog().await.unwrap();
        coordinator
    }

    async fn zombie_world() -> (Arc<InMemoryProgressRepository>, ProgressCoordinator, ActorId) {
        let repo = Arc::new(InMemoryProgressRepository::with_quests(vec![
            zombie_hunter(),
            quest_definition(2, "KILL_TARGET", "SKELETON", 5),
            quest_definition(3, "GATHER_ITEM", "ZOMBIE", 3),
        ]));
        let coordinator = coordinator_with(repo.clone()).await;
        let actor = ActorId::new();
        coordinator.load_actor_session(actor).await.unwrap();
        (repo, coordinator, actor)
    }

    #[tokio::test]
    async fn test_get_record_before_any_session_is_available_default() {
        let (_, coordinator, _) = zombie_world().await;
        let stranger = ActorId::new();

        let record = coordinator.get_record(stranger, QuestId(1));

        assert_eq!(record.status, QuestStatus::Available);
        assert_eq!(record.progress, 0);
        assert!(!coordinator.has_session(stranger));
    }

    #[tokio::test]
    async fn test_start_quest_is_idempotent() {
        // Arrange
        let (_, coordinator, actor) = zombie_world().await;

        // Act
        let first = coordinator.start_quest(actor, QuestId(1)).unwrap();
        let second = coordinator.start_quest(actor, QuestId(1));

        // Assert
        assert_eq!(first.status, QuestStatus::InProgress);
        assert_eq!(first.progress, 0);
        match second.unwrap_err() {
            StartError::AlreadyStarted(record) => assert_eq!(record, first),
            other => panic!("expected AlreadyStarted, got {other:?}"),
        }
        assert_eq!(coordinator.get_record(actor, QuestId(1)), first);
    }

    #[tokio::test]
    async fn test_start_unknown_quest_is_rejected() {
        let (_, coordinator, actor) = zombie_world().await;

        let result = coordinator.start_quest(actor, QuestId(99));

        assert!(matches!(result, Err(StartError::QuestNotFound(QuestId(99)))));
        assert!(coordinator.get_record(actor, QuestId(99)).is_default());
    }

    #[tokio::test]
    async fn test_start_without_session_is_rejected() {
        let (_, coordinator, _) = zombie_world().await;
        let stranger = ActorId::new();

        let result = coordinator.start_quest(stranger, QuestId(1));

        assert!(matches!(result, Err(StartError::SessionNotLoaded(a)) if a == stranger));
    }

    #[tokio::test]
    async fn test_zombie_hunter_scenario() {
        // Arrange
        let (repo, coordinator, actor) = zombie_world().await;
        coordinator.start_quest(actor, QuestId(1)).unwrap();

        // Act + Assert: nine kills, mixed case
        for _ in 0..9 {
            coordinator.report_progress(actor, ObjectiveKind::KillTarget, "zombie");
        }
        let record = coordinator.get_record(actor, QuestId(1));
        assert_eq!((record.progress, record.status), (9, QuestStatus::InProgress));

        let advanced = coordinator.report_progress(actor, ObjectiveKind::KillTarget, "zombie");
        assert_eq!(advanced.len(), 1);
        let record = coordinator.get_record(actor, QuestId(1));
        assert_eq!((record.progress, record.status), (10, QuestStatus::Completed));

        let advanced = coordinator.report_progress(actor, ObjectiveKind::KillTarget, "zombie");
        assert!(advanced.is_empty());
        let record = coordinator.get_record(actor, QuestId(1));
        assert_eq!((record.progress, record.status), (10, QuestStatus::Completed));

        // The durable replica converges on the final state.
        coordinator.flush().await;
        let stored = repo.progress_for(actor, QuestId(1)).unwrap();
        assert_eq!(stored.progress, 10);
        assert_eq!(stored.status, "COMPLETED");
        assert_eq!(stored.revision, 11);
    }

    #[tokio::test]
    async fn test_report_progress_is_selective_on_kind_and_target() {
        // Arrange
        let (_, coordinator, actor) = zombie_world().await;
        coordinator.start_quest(actor, QuestId(1)).unwrap();
        coordinator.start_quest(actor, QuestId(3)).unwrap();

        // Act
        for _ in 0..25 {
            coordinator.report_progress(actor, ObjectiveKind::KillTarget, "SKELETON");
        }
        let advanced = coordinator.report_progress(actor, ObjectiveKind::GatherItem, "Zombie");

        // Assert
        assert_eq!(coordinator.get_record(actor, QuestId(1)).progress, 0);
        assert_eq!(advanced.len(), 1);
        assert_eq!(advanced[0].quest_id, QuestId(3));
        // Quest 2 matches SKELETON but was never started.
        assert!(coordinator.get_record(actor, QuestId(2)).is_default());
    }

    #[tokio::test]
    async fn test_report_progress_without_session_is_dropped() {
        let (repo, coordinator, _) = zombie_world().await;
        let stranger = ActorId::new();
        repo.insert_progress(stored_progress(stranger, 1, 4, "IN_PROGRESS", 5));

        let advanced = coordinator.report_progress(stranger, ObjectiveKind::KillTarget, "ZOMBIE");
        coordinator.flush().await;

        assert!(advanced.is_empty());
        assert_eq!(repo.progress_for(stranger, QuestId(1)).unwrap().progress, 4);
    }

    #[tokio::test]
    async fn test_end_session_evicts_and_returns_defaults() {
        // Arrange
        let (_, coordinator, actor) = zombie_world().await;
        coordinator.start_quest(actor, QuestId(1)).unwrap();
        coordinator.report_progress(actor, ObjectiveKind::KillTarget, "ZOMBIE");

        // Act
        assert!(coordinator.end_actor_session(actor));

        // Assert
        assert!(coordinator.get_record(actor, QuestId(1)).is_default());
        assert!(coordinator.report_progress(actor, ObjectiveKind::KillTarget, "ZOMBIE").is_empty());
    }

    #[tokio::test]
    async fn test_writes_scheduled_before_session_end_still_land() {
        // Arrange
        let (repo, coordinator, actor) = zombie_world().await;
        coordinator.start_quest(actor, QuestId(1)).unwrap();
        coordinator.report_progress(actor, ObjectiveKind::KillTarget, "ZOMBIE");
        coordinator.end_actor_session(actor);

        // Act
        coordinator.flush().await;
        let loaded = coordinator.load_actor_session(actor).await.unwrap();

        // Assert
        assert_eq!(repo.progress_for(actor, QuestId(1)).unwrap().progress, 1);
        assert_eq!(loaded, 1);
        let record = coordinator.get_record(actor, QuestId(1));
        assert_eq!((record.progress, record.status), (1, QuestStatus::InProgress));
        assert_eq!(record.revision, 2);
    }

    #[tokio::test]
    async fn test_session_load_restores_persisted_records() {
        // Arrange
        let repo = Arc::new(InMemoryProgressRepository::with_quests(vec![zombie_hunter()]));
        let actor = ActorId::new();
        repo.insert_progress(stored_progress(actor, 1, 9, "IN_PROGRESS", 10));
        let coordinator = coordinator_with(repo.clone()).await;

        // Act
        coordinator.load_actor_session(actor).await.unwrap();
        let advanced = coordinator.report_progress(actor, ObjectiveKind::KillTarget, "ZOMBIE");

        // Assert
        assert_eq!(advanced.len(), 1);
        assert_eq!(advanced[0].status, QuestStatus::Completed);
        assert_eq!(advanced[0].revision, 11);
    }

    #[tokio::test]
    async fn test_reloading_a_live_session_keeps_in_memory_progress() {
        // Arrange
        let (_, coordinator, actor) = zombie_world().await;
        coordinator.start_quest(actor, QuestId(1)).unwrap();
        for _ in 0..5 {
            coordinator.report_progress(actor, ObjectiveKind::KillTarget, "ZOMBIE");
        }
        let before = coordinator.get_record(actor, QuestId(1));

        // Act
        let loaded = coordinator.load_actor_session(actor).await.unwrap();

        // Assert
        assert_eq!(loaded, 1);
        let after = coordinator.get_record(actor, QuestId(1));
        assert_eq!(after, before);
        assert_eq!((after.progress, after.status), (5, QuestStatus::InProgress));
    }

    #[tokio::test]
    async fn test_quick_relogin_keeps_completed_quest_completed() {
        // Arrange: complete the quest and leave before anything is flushed
        let (repo, coordinator, actor) = zombie_world().await;
        coordinator.start_quest(actor, QuestId(1)).unwrap();
        for _ in 0..10 {
            coordinator.report_progress(actor, ObjectiveKind::KillTarget, "ZOMBIE");
        }
        coordinator.end_actor_session(actor);

        // Act
        coordinator.load_actor_session(actor).await.unwrap();
        let restart = coordinator.start_quest(actor, QuestId(1));

        // Assert
        match restart.unwrap_err() {
            StartError::AlreadyStarted(record) => {
                assert_eq!((record.progress, record.status), (10, QuestStatus::Completed));
                assert_eq!(record.revision, 11);
            }
            other => panic!("expected AlreadyStarted, got {other:?}"),
        }
        assert!(coordinator.report_progress(actor, ObjectiveKind::KillTarget, "ZOMBIE").is_empty());
        coordinator.flush().await;
        let stored = repo.progress_for(actor, QuestId(1)).unwrap();
        assert_eq!((stored.status.as_str(), stored.progress, stored.revision), ("COMPLETED", 10, 11));
    }

    #[tokio::test]
    async fn test_relogin_overlays_a_write_still_being_retried() {
        // Arrange: the first upsert fails and its retry is still backing off
        let inner = InMemoryProgressRepository::with_quests(vec![zombie_hunter()]);
        let repo = Arc::new(FlakyProgressRepository::new(inner, 1));
        let coordinator = ProgressCoordinator::new(
            repo.clone(),
            Arc::new(FixedClock::default()),
            CoordinatorConfig {
                persist_retry_backoff: Duration::from_millis(200),
                ..config()
            },
        );
        coordinator.reload_catalog().await.unwrap();
        let actor = ActorId::new();
        coordinator.load_actor_session(actor).await.unwrap();
        coordinator.start_quest(actor, QuestId(1)).unwrap();
        for _ in 0..3 {
            coordinator.report_progress(actor, ObjectiveKind::KillTarget, "ZOMBIE");
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
        coordinator.end_actor_session(actor);

        // Act
        coordinator.load_actor_session(actor).await.unwrap();
        coordinator.report_progress(actor, ObjectiveKind::KillTarget, "ZOMBIE");
        coordinator.flush().await;

        // Assert
        let record = coordinator.get_record(actor, QuestId(1));
        assert_eq!((record.progress, record.revision), (4, 5));
        let stored = repo.inner().progress_for(actor, QuestId(1)).unwrap();
        assert_eq!((stored.progress, stored.revision), (4, 5));
        assert_eq!(repo.upsert_attempts(), 3);
    }

    #[tokio::test]
    async fn test_session_load_completes_records_past_a_lowered_requirement() {
        // Arrange
        let repo = Arc::new(InMemoryProgressRepository::with_quests(vec![zombie_hunter()]));
        let actor = ActorId::new();
        repo.insert_progress(stored_progress(actor, 1, 12, "IN_PROGRESS", 13));
        let coordinator = coordinator_with(repo.clone()).await;

        // Act
        coordinator.load_actor_session(actor).await.unwrap();
        coordinator.flush().await;

        // Assert
        let record = coordinator.get_record(actor, QuestId(1));
        assert_eq!((record.progress, record.status), (10, QuestStatus::Completed));
        assert_eq!(record.revision, 14);
        let stored = repo.progress_for(actor, QuestId(1)).unwrap();
        assert_eq!((stored.status.as_str(), stored.progress, stored.revision), ("COMPLETED", 10, 14));
    }

    #[tokio::test]
    async fn test_failed_session_load_degrades_to_defaults() {
        let coordinator = ProgressCoordinator::new(
            Arc::new(FailingProgressRepository),
            Arc::new(FixedClock::default()),
            config(),
        );
        let actor = ActorId::new();

        let result = coordinator.load_actor_session(actor).await;

        assert!(matches!(result, Err(SessionLoadError::Store(_))));
        assert!(!coordinator.has_session(actor));
        assert!(coordinator.get_record(actor, QuestId(1)).is_default());
    }

    #[tokio::test]
    async fn test_session_load_timeout_keeps_prior_state() {
        // Arrange
        let inner = InMemoryProgressRepository::with_quests(vec![zombie_hunter()]);
        let repo = Arc::new(StallingProgressRepository::new(inner, Duration::from_secs(5)));
        let coordinator = ProgressCoordinator::new(
            repo,
            Arc::new(FixedClock::default()),
            CoordinatorConfig {
                session_load_timeout: Duration::from_millis(20),
                ..config()
            },
        );
        let actor = ActorId::new();

        // Act
        let result = coordinator.load_actor_session(actor).await;

        // Assert
        assert!(matches!(result, Err(SessionLoadError::Timeout(_))));
        assert!(!coordinator.has_session(actor));
    }

    #[tokio::test]
    async fn test_session_ended_during_load_is_not_resurrected() {
        // Arrange
        let inner = InMemoryProgressRepository::with_quests(vec![zombie_hunter()]);
        let repo = Arc::new(StallingProgressRepository::new(inner, Duration::from_millis(50)));
        let coordinator = Arc::new(ProgressCoordinator::new(
            repo,
            Arc::new(FixedClock::default()),
            config(),
        ));
        coordinator.reload_catalog().await.unwrap();
        let actor = ActorId::new();

        // Act
        let loader = {
            let coordinator = Arc::clone(&coordinator);
            tokio::spawn(async move { coordinator.load_actor_session(actor).await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        coordinator.end_actor_session(actor);
        let result = loader.await.unwrap();

        // Assert
        assert!(matches!(result, Err(SessionLoadError::Superseded(_))));
        assert!(!coordinator.has_session(actor));
    }

    #[tokio::test]
    async fn test_notifications_follow_the_state_machine() {
        // Arrange
        let repo = Arc::new(InMemoryProgressRepository::with_quests(vec![quest_definition(
            7,
            "REACH_LOCATION",
            "Spawn",
            2,
        )]));
        let coordinator = coordinator_with(repo).await;
        let actor = ActorId::new();
        coordinator.load_actor_session(actor).await.unwrap();
        let mut rx = coordinator.subscribe();

        // Act
        coordinator.start_quest(actor, QuestId(7)).unwrap();
        coordinator.report_progress(actor, ObjectiveKind::ReachLocation, "spawn");
        coordinator.report_progress(actor, ObjectiveKind::ReachLocation, "SPAWN");

        // Assert
        let types: Vec<&str> = (0..3).map(|_| rx.try_recv().unwrap().event_type()).collect();
        assert_eq!(
            types,
            vec![
                "progress.quest_started",
                "progress.progress_advanced",
                "progress.quest_completed"
            ]
        );
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_reports_never_overshoot() {
        // Arrange
        let (repo, coordinator, actor) = zombie_world().await;
        let coordinator = Arc::new(coordinator);
        coordinator.start_quest(actor, QuestId(1)).unwrap();

        // Act: 64 tasks race on the same record
        let tasks: Vec<_> = (0..64)
            .map(|_| {
                let coordinator = Arc::clone(&coordinator);
                tokio::spawn(async move {
                    coordinator
                        .report_progress(actor, ObjectiveKind::KillTarget, "zombie")
                        .len()
                })
            })
            .collect();
        let mut advanced = 0;
        for task in tasks {
            advanced += task.await.unwrap();
        }

        // Assert
        assert_eq!(advanced, 10);
        let record = coordinator.get_record(actor, QuestId(1));
        assert_eq!((record.progress, record.status), (10, QuestStatus::Completed));
        coordinator.flush().await;
        assert_eq!(repo.progress_for(actor, QuestId(1)).unwrap().progress, 10);
    }

    #[tokio::test]
    async fn test_catalog_reload_failure_keeps_quests_startable() {
        // Arrange
        let (repo, coordinator, actor) = zombie_world().await;
        repo.replace_quests(vec![quest_definition(1, "TELEPORT", "MOON", 1)]);

        // Act
        let result = coordinator.reload_catalog().await;

        // Assert
        assert!(result.is_err());
        assert!(coordinator.catalog_loaded());
        assert_eq!(coordinator.quests().len(), 3);
        assert!(coordinator.start_quest(actor, QuestId(1)).is_ok());
    }

    #[tokio::test]
    async fn test_shutdown_drains_scheduled_writes() {
        let (repo, coordinator, actor) = zombie_world().await;
        coordinator.start_quest(actor, QuestId(1)).unwrap();
        coordinator.start_quest(actor, QuestId(2)).unwrap();

        let remaining = coordinator.shutdown(Duration::from_secs(5)).await;

        assert_eq!(remaining, 0);
        assert_eq!(repo.progress_len(), 2);
        assert_eq!(coordinator.write_stats().written, 2);
    }
}
