//! Read-only views over the coordinator and the store.
//!
//! Nothing here mutates the cache or schedules writes.

use questline_core::error::StoreError;
use questline_core::ids::{ActorId, QuestId};
use questline_core::repository::ProgressRepository;
use serde::Serialize;

use crate::application::coordinator::ProgressCoordinator;
use crate::domain::progress::QuestStatus;
use crate::domain::quest::ObjectiveKind;

/// Number of leaderboard rows returned when the caller does not ask for a
/// specific limit.
pub const DEFAULT_LEADERBOARD_LIMIT: u32 = 28;

/// Largest leaderboard page served.
pub const MAX_LEADERBOARD_LIMIT: u32 = 500;

/// One quest as seen by one actor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QuestBoardEntry {
    /// The quest.
    pub quest_id: QuestId,
    /// Display name.
    pub name: String,
    /// Description lines.
    pub description: Vec<String>,
    /// Objective kind.
    pub objective: ObjectiveKind,
    /// Target discriminator.
    pub target: String,
    /// Amount needed to complete.
    pub required_amount: u32,
    /// The actor's progress.
    pub progress: u32,
    /// The actor's status.
    pub status: QuestStatus,
}

/// Every quest in the catalog joined with the actor's record, ordered by
/// quest id. Quests the actor never touched show as `AVAILABLE` with zero
/// progress.
#[must_use]
pub fn quest_board(coordinator: &ProgressCoordinator, actor_id: ActorId) -> Vec<QuestBoardEntry> {
    let catalog = coordinator.catalog();
    let mut board: Vec<QuestBoardEntry> = catalog
        .iter()
        .map(|quest| {
            let record = coordinator.get_record(actor_id, quest.id);
            QuestBoardEntry {
                quest_id: quest.id,
                name: quest.name.clone(),
                description: quest.description.clone(),
                objective: quest.objective,
                target: quest.target.clone(),
                required_amount: quest.required_amount,
                progress: record.progress,
                status: record.status,
            }
        })
        .collect();
    board.sort_by_key(|entry| entry.quest_id);
    board
}

/// One leaderboard row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LeaderboardEntry {
    /// 1-based position.
    pub rank: u32,
    /// The actor.
    pub actor_id: ActorId,
    /// Number of quests the actor has completed.
    pub completed_quests: i64,
}

/// Actors ranked by completed quests, read from the durable store.
///
/// `limit` is clamped to `1..=MAX_LEADERBOARD_LIMIT`. Completions still in
/// the write-behind queue are not counted yet.
///
/// # Errors
///
/// Returns `StoreError` if the store cannot be read.
pub async fn get_leaderboard(
    repo: &dyn ProgressRepository,
    limit: u32,
) -> Result<Vec<LeaderboardEntry>, StoreError> {
    let limit = limit.clamp(1, MAX_LEADERBOARD_LIMIT);
    let rows = repo.fetch_leaderboard(limit).await?;
    Ok((1..)
        .zip(rows)
        .map(|(rank, row)| LeaderboardEntry {
            rank,
            actor_id: row.actor_id,
            completed_quests: row.completed_quests,
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use questline_core::ids::{ActorId, QuestId};
    use questline_test_support::{
        FailingProgressRepository, FixedClock, InMemoryProgressRepository, quest_definition,
        stored_progress, zombie_hunter,
    };
    use uuid::Uuid;

    use super::*;
    use crate::config::CoordinatorConfig;

    #[tokio::test]
    async fn test_quest_board_joins_catalog_with_actor_progress() {
        // Arrange
        let repo = Arc::new(InMemoryProgressRepository::with_quests(vec![
            quest_definition(3, "REACH_LOCATION", "SPAWN", 1),
            zombie_hunter(),
        ]));
        let coordinator = ProgressCoordinator::new(
            repo,
            Arc::new(FixedClock::default()),
            CoordinatorConfig::default(),
        );
        coordinator.reload_catalog().await.unwrap();
        let actor = ActorId::new();
        coordinator.load_actor_session(actor).await.unwrap();
        coordinator.start_quest(actor, QuestId(1)).unwrap();
        coordinator.report_progress(actor, ObjectiveKind::KillTarget, "Zombie");

        // Act
        let board = quest_board(&coordinator, actor);

        // Assert
        assert_eq!(board.len(), 2);
        assert_eq!(board[0].quest_id, QuestId(1));
        assert_eq!(board[0].progress, 1);
        assert_eq!(board[0].status, QuestStatus::InProgress);
        assert_eq!(board[1].quest_id, QuestId(3));
        assert_eq!(board[1].status, QuestStatus::Available);
    }

    #[tokio::test]
    async fn test_leaderboard_ranks_from_one() {
        // Arrange
        let repo = InMemoryProgressRepository::with_quests(vec![
            zombie_hunter(),
            quest_definition(2, "GATHER_ITEM", "OAK_LOG", 4),
        ]);
        let leader = ActorId::from(Uuid::from_u128(2));
        let runner_up = ActorId::from(Uuid::from_u128(1));
        repo.insert_progress(stored_progress(leader, 1, 10, "COMPLETED", 11));
        repo.insert_progress(stored_progress(leader, 2, 4, "COMPLETED", 5));
        repo.insert_progress(stored_progress(runner_up, 1, 10, "COMPLETED", 11));
        repo.insert_progress(stored_progress(runner_up, 2, 1, "IN_PROGRESS", 2));

        // Act
        let board = get_leaderboard(&repo, DEFAULT_LEADERBOARD_LIMIT).await.unwrap();

        // Assert
        assert_eq!(board.len(), 2);
        assert_eq!((board[0].rank, board[0].actor_id, board[0].completed_quests), (1, leader, 2));
        assert_eq!((board[1].rank, board[1].actor_id, board[1].completed_quests), (2, runner_up, 1));
    }

    #[tokio::test]
    async fn test_leaderboard_zero_limit_is_clamped_to_one() {
        let repo = InMemoryProgressRepository::with_quests(vec![zombie_hunter()]);
        for n in 1..=3 {
            repo.insert_progress(stored_progress(ActorId::from(Uuid::from_u128(n)), 1, 10, "COMPLETED", 11));
        }

        let board = get_leaderboard(&repo, 0).await.unwrap();

        assert_eq!(board.len(), 1);
    }

    #[tokio::test]
    async fn test_leaderboard_surfaces_store_failure() {
        let result = get_leaderboard(&FailingProgressRepository, 10).await;

        assert!(matches!(result, Err(StoreError::Unavailable(_))));
    }
}
