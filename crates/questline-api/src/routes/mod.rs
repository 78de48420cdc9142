//! Route modules.

pub mod actors;
pub mod health;
pub mod leaderboard;
pub mod quests;
