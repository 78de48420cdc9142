//! Progress cache: actor id → quest id → record.
//!
//! Both levels are sharded concurrent maps. A record is only ever mutated
//! while its shard's write guard is held, so two events racing on the same
//! record are applied one after the other. Records in other shards, even of
//! the same actor, are not blocked.

use std::sync::Arc;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use questline_core::ids::{ActorId, QuestId};

use crate::domain::progress::ProgressRecord;

/// All cached records of one actor for the duration of their session.
#[derive(Debug, Default)]
pub struct ActorPartition {
    records: DashMap<QuestId, ProgressRecord>,
}

impl ActorPartition {
    /// Builds a partition from loaded records.
    pub fn from_records(records: impl IntoIterator<Item = ProgressRecord>) -> Self {
        Self {
            records: records
                .into_iter()
                .map(|record| (record.quest_id, record))
                .collect(),
        }
    }

    /// A copy of the record for `quest_id`, if the actor has one.
    #[must_use]
    pub fn get(&self, quest_id: QuestId) -> Option<ProgressRecord> {
        self.records.get(&quest_id).map(|r| r.value().clone())
    }

    /// Inserts `record` unless the quest already has a record.
    ///
    /// # Errors
    ///
    /// Returns a copy of the existing record if one is present; nothing is
    /// changed in that case.
    pub fn insert_if_absent(&self, record: ProgressRecord) -> Result<ProgressRecord, ProgressRecord> {
        match self.records.entry(record.quest_id) {
            Entry::Occupied(existing) => Err(existing.get().clone()),
            Entry::Vacant(slot) => Ok(slot.insert(record).value().clone()),
        }
    }

    /// Runs `mutate` on every record under its shard's write guard and
    /// returns copies of the records for which it reported a change.
    pub fn update_each<F>(&self, mut mutate: F) -> Vec<ProgressRecord>
    where
        F: FnMut(&mut ProgressRecord) -> bool,
    {
        let mut changed = Vec::new();
        for mut entry in self.records.iter_mut() {
            if mutate(entry.value_mut()) {
                changed.push(entry.value().clone());
            }
        }
        changed
    }

    /// Copies of every record.
    #[must_use]
    pub fn records(&self) -> Vec<ProgressRecord> {
        self.records.iter().map(|r| r.value().clone()).collect()
    }

    /// Number of records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the actor has no records yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Per-actor partitions of the progress cache.
#[derive(Debug, Default)]
pub struct ProgressCache {
    partitions: DashMap<ActorId, Arc<ActorPartition>>,
}

impl ProgressCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The actor's partition, if their session is loaded.
    ///
    /// The returned handle stays usable after eviction; writes to an evicted
    /// partition are still persisted but no longer visible through the cache.
    #[must_use]
    pub fn partition(&self, actor_id: ActorId) -> Option<Arc<ActorPartition>> {
        self.partitions.get(&actor_id).map(|p| Arc::clone(p.value()))
    }

    /// Publishes a fully built partition, replacing any previous one.
    pub fn install(&self, actor_id: ActorId, partition: ActorPartition) {
        self.partitions.insert(actor_id, Arc::new(partition));
    }

    /// Drops the actor's partition. Returns whether one existed.
    pub fn evict(&self, actor_id: ActorId) -> bool {
        self.partitions.remove(&actor_id).is_some()
    }

    /// A copy of one cached record.
    #[must_use]
    pub fn get(&self, actor_id: ActorId, quest_id: QuestId) -> Option<ProgressRecord> {
        self.partition(actor_id)?.get(quest_id)
    }

    /// Whether the actor has a loaded partition.
    #[must_use]
    pub fn contains(&self, actor_id: ActorId) -> bool {
        self.partitions.contains_key(&actor_id)
    }

    /// Number of actors with a loaded partition.
    #[must_use]
    pub fn active_sessions(&self) -> usize {
        self.partitions.len()
    }
}

#[cfg(test)]
mod tests {
    use questline_test_support::fixed_now;

    use super::*;
    use crate::domain::progress::QuestStatus;

    #[test]
    fn test_insert_if_absent_returns_existing_record_unchanged() {
        // Arrange
        let actor = ActorId::new();
        let partition = ActorPartition::default();
        let mut existing = ProgressRecord::started(actor, QuestId(1), fixed_now());
        existing.advance(10, fixed_now());
        partition.insert_if_absent(existing.clone()).unwrap();

        // Act
        let result = partition.insert_if_absent(ProgressRecord::started(actor, QuestId(1), fixed_now()));

        // Assert
        assert_eq!(result, Err(existing.clone()));
        assert_eq!(partition.get(QuestId(1)), Some(existing));
    }

    #[test]
    fn test_update_each_returns_only_changed_records() {
        let actor = ActorId::new();
        let partition = ActorPartition::from_records([
            ProgressRecord::started(actor, QuestId(1), fixed_now()),
            ProgressRecord::started(actor, QuestId(2), fixed_now()),
        ]);

        let changed = partition.update_each(|record| {
            record.quest_id == QuestId(2) && record.advance(5, fixed_now()).is_some()
        });

        assert_eq!(changed.len(), 1);
        assert_eq!(changed[0].quest_id, QuestId(2));
        assert_eq!(partition.get(QuestId(2)).unwrap().progress, 1);
        assert_eq!(partition.get(QuestId(1)).unwrap().progress, 0);
    }

    #[test]
    fn test_evicted_partition_is_no_longer_visible() {
        // Arrange
        let actor = ActorId::new();
        let cache = ProgressCache::new();
        cache.install(
            actor,
            ActorPartition::from_records([ProgressRecord::started(actor, QuestId(1), fixed_now())]),
        );
        assert_eq!(
            cache.get(actor, QuestId(1)).map(|r| r.status),
            Some(QuestStatus::InProgress)
        );

        // Act
        let evicted = cache.evict(actor);

        // Assert
        assert!(evicted);
        assert!(!cache.contains(actor));
        assert!(cache.get(actor, QuestId(1)).is_none());
        assert_eq!(cache.active_sessions(), 0);
    }

    #[test]
    fn test_partitions_of_different_actors_are_independent() {
        let alice = ActorId::new();
        let bob = ActorId::new();
        let cache = ProgressCache::new();
        cache.install(alice, ActorPartition::default());
        cache.install(bob, ActorPartition::default());

        cache
            .partition(alice)
            .unwrap()
            .insert_if_absent(ProgressRecord::started(alice, QuestId(1), fixed_now()))
            .unwrap();

        assert!(cache.get(alice, QuestId(1)).is_some());
        assert!(cache.get(bob, QuestId(1)).is_none());
    }
}
