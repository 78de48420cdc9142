//! Questline — `PostgreSQL` store.
//!
//! Implements [`ProgressRepository`](questline_core::repository::ProgressRepository)
//! over the `quests` and `quest_progress` tables created by the workspace
//! migrations. Queries are built at runtime so no live database is needed
//! at build time.

pub mod pg_progress_repository;

pub use pg_progress_repository::PgProgressRepository;

/// Embedded workspace migrations.
pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("../../migrations");
