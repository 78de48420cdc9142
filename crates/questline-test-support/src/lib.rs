//! Shared test doubles and fixtures for the Questline quest progress service.

mod clock;
mod fixtures;
mod repository;

pub use clock::{FixedClock, fixed_now};
pub use fixtures::{quest_definition, stored_progress, zombie_hunter};
pub use repository::{
    FailingProgressRepository, FlakyProgressRepository, InMemoryProgressRepository,
    StallingProgressRepository,
};
