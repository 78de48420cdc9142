//! Notifications published by the coordinator after a state change.

use questline_core::ids::{ActorId, QuestId};
use serde::Serialize;

/// Event type identifier for [`ProgressNotification::QuestStarted`].
pub const QUEST_STARTED_EVENT_TYPE: &str = "progress.quest_started";

/// Event type identifier for [`ProgressNotification::ProgressAdvanced`].
pub const PROGRESS_ADVANCED_EVENT_TYPE: &str = "progress.progress_advanced";

/// Event type identifier for [`ProgressNotification::QuestCompleted`].
pub const QUEST_COMPLETED_EVENT_TYPE: &str = "progress.quest_completed";

/// Payload shared by every notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QuestProgressSummary {
    /// The actor whose record changed.
    pub actor_id: ActorId,
    /// The quest.
    pub quest_id: QuestId,
    /// Quest display name.
    pub quest_name: String,
    /// Progress after the change.
    pub progress: u32,
    /// Amount required to complete.
    pub required_amount: u32,
}

/// What happened to an actor's quest, for whoever tells the actor about it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "summary", rename_all = "snake_case")]
pub enum ProgressNotification {
    /// The actor accepted a quest.
    QuestStarted(QuestProgressSummary),
    /// A qualifying occurrence advanced an in-progress quest.
    ProgressAdvanced(QuestProgressSummary),
    /// The quest reached its required amount.
    QuestCompleted(QuestProgressSummary),
}

impl ProgressNotification {
    /// Returns the event type name.
    #[must_use]
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::QuestStarted(_) => QUEST_STARTED_EVENT_TYPE,
            Self::ProgressAdvanced(_) => PROGRESS_ADVANCED_EVENT_TYPE,
            Self::QuestCompleted(_) => QUEST_COMPLETED_EVENT_TYPE,
        }
    }

    /// Returns the summary carried by any variant.
    #[must_use]
    pub fn summary(&self) -> &QuestProgressSummary {
        match self {
            Self::QuestStarted(s) | Self::ProgressAdvanced(s) | Self::QuestCompleted(s) => s,
        }
    }
}
