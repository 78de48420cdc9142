//! Quest catalog seeding from a YAML file.
//!
//! The file is a list of quest definitions. Each entry is validated the same
//! way the catalog validates stored rows before anything is written.

use std::path::Path;

use questline_core::ids::QuestId;
use questline_core::repository::{ProgressRepository, StoredQuestDefinition};
use questline_progress::domain::quest::QuestDefinition;
use serde::Deserialize;

use crate::error::AppError;

/// One quest as written in the seed file.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SeedQuest {
    /// Quest id.
    pub id: i32,
    /// Unique external key.
    pub key: String,
    /// Display name.
    pub name: String,
    /// Description lines.
    #[serde(default)]
    pub description: Vec<String>,
    /// Objective kind, e.g. `KILL_TARGET`.
    pub objective: String,
    /// Target discriminator.
    pub target: String,
    /// Amount needed to complete.
    pub required_amount: i32,
}

impl From<SeedQuest> for StoredQuestDefinition {
    fn from(quest: SeedQuest) -> Self {
        Self {
            id: QuestId(quest.id),
            quest_key: quest.key,
            name: quest.name,
            description: quest.description.join("\n"),
            objective_kind: quest.objective,
            target: quest.target,
            required_amount: quest.required_amount,
        }
    }
}

/// Parses and validates seed YAML.
///
/// # Errors
///
/// Returns `AppError::Seed` if the YAML is malformed or any entry would be
/// rejected by the catalog.
pub fn parse_seed(yaml: &str) -> Result<Vec<StoredQuestDefinition>, AppError> {
    let quests: Vec<SeedQuest> =
        serde_yaml::from_str(yaml).map_err(|e| AppError::Seed(e.to_string()))?;

    quests
        .into_iter()
        .map(|quest| {
            let row = StoredQuestDefinition::from(quest);
            QuestDefinition::try_from(row.clone()).map_err(|e| AppError::Seed(e.to_string()))?;
            Ok(row)
        })
        .collect()
}

/// Reads `path` and upserts every quest in it. Returns the number of quests
/// written.
///
/// # Errors
///
/// Returns `AppError::Seed` if the file cannot be read or parsed, and
/// `AppError::Store` if an upsert fails.
pub async fn seed_from_file(path: &Path, repo: &dyn ProgressRepository) -> Result<usize, AppError> {
    let yaml = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| AppError::Seed(format!("cannot read {}: {e}", path.display())))?;
    let quests = parse_seed(&yaml)?;

    for quest in &quests {
        repo.upsert_quest_definition(quest).await?;
    }
    tracing::info!(path = %path.display(), quests = quests.len(), "Quest seed applied");
    Ok(quests.len())
}
