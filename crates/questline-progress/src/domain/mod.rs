//! Domain types for the progress context.

pub mod events;
pub mod progress;
pub mod quest;
