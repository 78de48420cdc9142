//! Quest and progress row fixtures.

use questline_core::ids::{ActorId, QuestId};
use questline_core::repository::{StoredProgress, StoredQuestDefinition};

use crate::clock::fixed_now;

/// Quest 1 of the original server: kill ten zombies.
#[must_use]
pub fn zombie_hunter() -> StoredQuestDefinition {
    StoredQuestDefinition {
        id: QuestId(1),
        quest_key: "zombie_hunter_1".to_owned(),
        name: "Zombie Hunter".to_owned(),
        description: "Kill 10 zombies to prove your strength.".to_owned(),
        objective_kind: "KILL_TARGET".to_owned(),
        target: "ZOMBIE".to_owned(),
        required_amount: 10,
    }
}

/// Builds a quest definition row with a generated key and name.
#[must_use]
pub fn quest_definition(
    id: i32,
    objective_kind: &str,
    target: &str,
    required_amount: i32,
) -> StoredQuestDefinition {
    StoredQuestDefinition {
        id: QuestId(id),
        quest_key: format!("quest_{id}"),
        name: format!("Quest {id}"),
        description: format!("{objective_kind} {required_amount} {target}"),
        objective_kind: objective_kind.to_owned(),
        target: target.to_owned(),
        required_amount,
    }
}

/// Builds a persisted progress row at the fixed test time.
#[must_use]
pub fn stored_progress(
    actor_id: ActorId,
    quest_id: i32,
    progress: i32,
    status: &str,
    revision: i64,
) -> StoredProgress {
    StoredProgress {
        actor_id,
        quest_id: QuestId(quest_id),
        progress,
        status: status.to_owned(),
        revision,
        updated_at: fixed_now(),
    }
}
