//! Progress records and the quest status state machine.
//!
//! ```text
//! AVAILABLE --start--> IN_PROGRESS --advance (progress reaches required)--> COMPLETED
//! ```
//!
//! `AVAILABLE` is the implicit default and is never stored. `COMPLETED` is
//! terminal.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use questline_core::ids::{ActorId, QuestId};
use questline_core::repository::StoredProgress;
use serde::{Deserialize, Serialize};

/// Status of one actor on one quest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QuestStatus {
    /// Not started. Implicit, never persisted.
    Available,
    /// Started and counting.
    InProgress,
    /// Done. No further mutation is accepted.
    Completed,
}

impl QuestStatus {
    /// Stored name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Available => "AVAILABLE",
            Self::InProgress => "IN_PROGRESS",
            Self::Completed => "COMPLETED",
        }
    }
}

impl fmt::Display for QuestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QuestStatus {
    type Err = InvalidRecord;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "AVAILABLE" => Ok(Self::Available),
            "IN_PROGRESS" => Ok(Self::InProgress),
            "COMPLETED" => Ok(Self::Completed),
            other => Err(InvalidRecord(format!("unknown status {other:?}"))),
        }
    }
}

/// A persisted progress row that cannot be turned into a [`ProgressRecord`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid progress record: {0}")]
pub struct InvalidRecord(pub String);

/// Result of applying one qualifying occurrence to a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Advance {
    /// Progress went up and the quest is still in progress.
    Progressed,
    /// Progress reached the required amount; the record is now completed.
    Completed,
}

/// One actor's progress on one quest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProgressRecord {
    /// Owning actor.
    pub actor_id: ActorId,
    /// Quest this record tracks.
    pub quest_id: QuestId,
    /// Progress counter. Never above the quest's required amount.
    pub progress: u32,
    /// Current status.
    pub status: QuestStatus,
    /// Bumped on every mutation; 0 for the synthesized default.
    pub revision: u64,
    /// Time of the last mutation; `None` for the synthesized default.
    pub updated_at: Option<DateTime<Utc>>,
}

impl ProgressRecord {
    /// The implicit record for a quest the actor has not touched.
    #[must_use]
    pub fn available(actor_id: ActorId, quest_id: QuestId) -> Self {
        Self {
            actor_id,
            quest_id,
            progress: 0,
            status: QuestStatus::Available,
            revision: 0,
            updated_at: None,
        }
    }

    /// The record produced by starting a quest.
    #[must_use]
    pub fn started(actor_id: ActorId, quest_id: QuestId, now: DateTime<Utc>) -> Self {
        Self {
            actor_id,
            quest_id,
            progress: 0,
            status: QuestStatus::InProgress,
            revision: 1,
            updated_at: Some(now),
        }
    }

    /// Applies one qualifying occurrence.
    ///
    /// Returns `None` and leaves the record untouched unless it is
    /// `IN_PROGRESS`.
    pub fn advance(&mut self, required_amount: u32, now: DateTime<Utc>) -> Option<Advance> {
        if self.status != QuestStatus::InProgress {
            return None;
        }
        let next = self.progress.saturating_add(1);
        self.revision = self.revision.saturating_add(1);
        self.updated_at = Some(now);
        if next >= required_amount {
            self.progress = required_amount;
            self.status = QuestStatus::Completed;
            Some(Advance::Completed)
        } else {
            self.progress = next;
            Some(Advance::Progressed)
        }
    }

    /// Clamps a loaded record against the current quest definition.
    ///
    /// Progress never exceeds `required_amount`, and an `IN_PROGRESS` record
    /// that has reached it is completed. Returns whether the record changed;
    /// a changed record carries a new revision.
    pub(crate) fn clamp_to(&mut self, required_amount: u32, now: DateTime<Utc>) -> bool {
        let settled = match self.status {
            QuestStatus::Available => true,
            QuestStatus::InProgress => self.progress < required_amount,
            QuestStatus::Completed => self.progress <= required_amount,
        };
        if settled {
            return false;
        }
        self.progress = required_amount;
        self.status = QuestStatus::Completed;
        self.revision = self.revision.saturating_add(1);
        self.updated_at = Some(now);
        true
    }

    /// Whether this record is the synthesized default.
    #[must_use]
    pub fn is_default(&self) -> bool {
        self.status == QuestStatus::Available
    }

    /// Converts the record to its stored shape.
    ///
    /// Counters saturate at the stored integer range.
    #[must_use]
    pub fn to_stored(&self) -> StoredProgress {
        StoredProgress {
            actor_id: self.actor_id,
            quest_id: self.quest_id,
            progress: i32::try_from(self.progress).unwrap_or(i32::MAX),
            status: self.status.as_str().to_owned(),
            revision: i64::try_from(self.revision).unwrap_or(i64::MAX),
            updated_at: self.updated_at.unwrap_or_default(),
        }
    }
}

impl TryFrom<&StoredProgress> for ProgressRecord {
    type Error = InvalidRecord;

    fn try_from(row: &StoredProgress) -> Result<Self, Self::Error> {
        let status: QuestStatus = row.status.parse()?;
        let progress = u32::try_from(row.progress)
            .map_err(|_| InvalidRecord(format!("negative progress {}", row.progress)))?;
        let revision = u64::try_from(row.revision)
            .map_err(|_| InvalidRecord(format!("negative revision {}", row.revision)))?;
        Ok(Self {
            actor_id: row.actor_id,
            quest_id: row.quest_id,
            progress,
            status,
            revision,
            updated_at: Some(row.updated_at),
        })
    }
}
