//! Quest definitions and objective kinds.

use std::fmt;
use std::str::FromStr;

use questline_core::ids::QuestId;
use questline_core::repository::StoredQuestDefinition;
use serde::{Deserialize, Serialize};

use crate::error::LoadError;

/// The category of action that advances a quest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ObjectiveKind {
    /// Defeat targets of a given kind.
    KillTarget,
    /// Collect items of a given kind.
    GatherItem,
    /// Arrive at a named location.
    ReachLocation,
}

impl ObjectiveKind {
    /// Canonical stored name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::KillTarget => "KILL_TARGET",
            Self::GatherItem => "GATHER_ITEM",
            Self::ReachLocation => "REACH_LOCATION",
        }
    }
}

impl fmt::Display for ObjectiveKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a stored objective kind has no matching variant.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown objective kind: {0:?}")]
pub struct UnknownObjectiveKind(pub String);

impl FromStr for ObjectiveKind {
    type Err = UnknownObjectiveKind;

    /// Case-insensitive. `KILL_MOBS` and `GATHER_ITEMS` are accepted for rows
    /// written by older schemas.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "KILL_TARGET" | "KILL_MOBS" => Ok(Self::KillTarget),
            "GATHER_ITEM" | "GATHER_ITEMS" => Ok(Self::GatherItem),
            "REACH_LOCATION" => Ok(Self::ReachLocation),
            _ => Err(UnknownObjectiveKind(s.to_owned())),
        }
    }
}

/// A validated, immutable quest definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QuestDefinition {
    /// Quest identifier.
    pub id: QuestId,
    /// Display name.
    pub name: String,
    /// Ordered description lines.
    pub description: Vec<String>,
    /// What kind of action advances this quest.
    pub objective: ObjectiveKind,
    /// Target discriminator as stored, e.g. `ZOMBIE`.
    pub target: String,
    /// Amount needed to complete. Always at least 1.
    pub required_amount: u32,
    #[serde(skip)]
    target_key: String,
}

impl QuestDefinition {
    /// Whether an occurrence of `kind` on a target whose lowercase form is
    /// `target_key` counts toward this quest.
    #[must_use]
    pub fn matches(&self, kind: ObjectiveKind, target_key: &str) -> bool {
        self.objective == kind && self.target_key == target_key
    }

    /// Normalizes a target discriminator for [`QuestDefinition::matches`].
    #[must_use]
    pub fn target_key(target: &str) -> String {
        target.trim().to_lowercase()
    }
}

impl TryFrom<StoredQuestDefinition> for QuestDefinition {
    type Error = LoadError;

    fn try_from(row: StoredQuestDefinition) -> Result<Self, Self::Error> {
        let invalid = |reason: String| LoadError::InvalidDefinition {
            quest_id: row.id,
            reason,
        };

        if row.name.trim().is_empty() {
            return Err(invalid("name is empty".to_owned()));
        }
        let required_amount = u32::try_from(row.required_amount)
            .ok()
            .filter(|amount| *amount >= 1)
            .ok_or_else(|| {
                invalid(format!(
                    "required amount must be at least 1, got {}",
                    row.required_amount
                ))
            })?;
        let objective: ObjectiveKind = row
            .objective_kind
            .parse()
            .map_err(|e: UnknownObjectiveKind| invalid(e.to_string()))?;

        let description = if row.description.is_empty() {
            Vec::new()
        } else {
            row.description.split('\n').map(str::to_owned).collect()
        };

        Ok(Self {
            id: row.id,
            name: row.name,
            description,
            objective,
            target_key: Self::target_key(&row.target),
            target: row.target,
            required_amount,
        })
    }
}
