//! Error types for the progress context.

use std::time::Duration;

use questline_core::error::StoreError;
use questline_core::ids::{ActorId, QuestId};
use thiserror::Error;

use crate::domain::progress::{InvalidRecord, ProgressRecord};

/// The quest catalog could not be (re)loaded. The previously active
/// snapshot, if any, stays in place.
#[derive(Debug, Error)]
pub enum LoadError {
    /// The store failed.
    #[error("quest store unavailable: {0}")]
    Store(#[from] StoreError),

    /// The store did not answer in time.
    #[error("quest catalog load timed out after {0:?}")]
    Timeout(Duration),

    /// A definition failed validation.
    #[error("invalid quest definition {quest_id}: {reason}")]
    InvalidDefinition {
        /// The offending quest.
        quest_id: QuestId,
        /// What was wrong with it.
        reason: String,
    },

    /// Two rows share one quest id.
    #[error("duplicate quest id {0}")]
    DuplicateQuest(QuestId),
}

/// A quest could not be started. Every variant is a no-op for the cache.
#[derive(Debug, Error)]
pub enum StartError {
    /// The quest id is not in the active catalog.
    #[error("quest {0} does not exist")]
    QuestNotFound(QuestId),

    /// The actor already started (or finished) this quest. Carries the
    /// unchanged record.
    #[error("quest {} already {}", .0.quest_id, .0.status)]
    AlreadyStarted(ProgressRecord),

    /// The actor has no loaded session to record progress in.
    #[error("no active session for actor {0}")]
    SessionNotLoaded(ActorId),
}

/// An actor's persisted progress could not be loaded. The actor keeps
/// whatever partition it had before, or none.
#[derive(Debug, Error)]
pub enum SessionLoadError {
    /// The store failed.
    #[error("progress store unavailable: {0}")]
    Store(#[from] StoreError),

    /// The store did not answer in time.
    #[error("session load timed out after {0:?}")]
    Timeout(Duration),

    /// A persisted row could not be decoded.
    #[error(transparent)]
    InvalidRecord(#[from] InvalidRecord),

    /// The session ended, or a newer load started, before this one finished.
    #[error("session load for actor {0} was superseded")]
    Superseded(ActorId),
}

/// A durable write was given up after the bounded retry policy. Logged by
/// the write-behind worker; never returned to the caller that caused it.
#[derive(Debug, Error)]
#[error("failed to persist progress for actor {actor_id} quest {quest_id} after {attempts} attempts: {source}")]
pub struct PersistenceError {
    /// Actor of the lost write.
    pub actor_id: ActorId,
    /// Quest of the lost write.
    pub quest_id: QuestId,
    /// How many attempts were made.
    pub attempts: u32,
    /// The last store error.
    pub source: StoreError,
}
