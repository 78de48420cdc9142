//! Quest catalog: an immutable snapshot of quest definitions, swapped
//! wholesale on reload.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use questline_core::ids::QuestId;
use questline_core::repository::ProgressRepository;

use crate::domain::quest::QuestDefinition;
use crate::error::LoadError;

/// One published version of the catalog. Never mutated after publish.
#[derive(Debug, Default)]
pub struct CatalogSnapshot {
    quests: HashMap<QuestId, Arc<QuestDefinition>>,
}

impl CatalogSnapshot {
    /// Validates and indexes a set of definitions.
    ///
    /// # Errors
    ///
    /// Returns `LoadError::InvalidDefinition` for the first row that fails
    /// validation, or `LoadError::DuplicateQuest` if two rows share an id.
    pub fn from_definitions(
        definitions: impl IntoIterator<Item = QuestDefinition>,
    ) -> Result<Self, LoadError> {
        let mut quests = HashMap::new();
        for definition in definitions {
            match quests.entry(definition.id) {
                Entry::Occupied(_) => return Err(LoadError::DuplicateQuest(definition.id)),
                Entry::Vacant(slot) => {
                    slot.insert(Arc::new(definition));
                }
            }
        }
        Ok(Self { quests })
    }

    /// Looks up one quest.
    #[must_use]
    pub fn get(&self, id: QuestId) -> Option<&Arc<QuestDefinition>> {
        self.quests.get(&id)
    }

    /// Iterates every quest in unspecified order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<QuestDefinition>> {
        self.quests.values()
    }

    /// Number of quests.
    #[must_use]
    pub fn len(&self) -> usize {
        self.quests.len()
    }

    /// Whether the snapshot has no quests.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.quests.is_empty()
    }
}

/// Holder of the active [`CatalogSnapshot`].
///
/// Readers clone the `Arc` of the current snapshot and keep using it even if
/// a reload publishes a new one meanwhile.
#[derive(Debug, Default)]
pub struct QuestCatalog {
    active: RwLock<Arc<CatalogSnapshot>>,
    loaded: AtomicBool,
}

impl QuestCatalog {
    /// Creates an empty, never-loaded catalog.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads all definitions from `repo`, validates them, and publishes the
    /// result as the active snapshot.
    ///
    /// # Errors
    ///
    /// Returns `LoadError` if the store fails, does not answer within
    /// `timeout`, or any definition is invalid. The active snapshot is left
    /// untouched in every error case.
    pub async fn load(
        &self,
        repo: &dyn ProgressRepository,
        timeout: Duration,
    ) -> Result<Arc<CatalogSnapshot>, LoadError> {
        let rows = tokio::time::timeout(timeout, repo.fetch_all_quest_definitions())
            .await
            .map_err(|_| LoadError::Timeout(timeout))??;

        let definitions = rows
            .into_iter()
            .map(QuestDefinition::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        let snapshot = Arc::new(CatalogSnapshot::from_definitions(definitions)?);

        *self.active.write().unwrap_or_else(PoisonError::into_inner) = Arc::clone(&snapshot);
        self.loaded.store(true, Ordering::Release);

        tracing::info!(quests = snapshot.len(), "Quest catalog loaded");
        Ok(snapshot)
    }

    /// The active snapshot.
    #[must_use]
    pub fn snapshot(&self) -> Arc<CatalogSnapshot> {
        Arc::clone(&self.active.read().unwrap_or_else(PoisonError::into_inner))
    }

    /// Looks up one quest in the active snapshot.
    #[must_use]
    pub fn get(&self, id: QuestId) -> Option<Arc<QuestDefinition>> {
        self.snapshot().get(id).cloned()
    }

    /// Every quest in the active snapshot, in unspecified order.
    #[must_use]
    pub fn all(&self) -> Vec<Arc<QuestDefinition>> {
        self.snapshot().iter().cloned().collect()
    }

    /// Whether at least one load has succeeded.
    #[must_use]
    pub fn is_loaded(&self) -> bool {
        self.loaded.load(Ordering::Acquire)
    }
}
