//! Questline — quest catalog, progress cache and write-behind coordinator.
//!
//! The [`ProgressCoordinator`](application::coordinator::ProgressCoordinator)
//! owns an in-memory view of quest definitions and per-actor progress. It
//! applies start and progress events under per-record exclusive access and
//! hands the resulting records to a background write-behind queue, so the
//! caller never waits on the durable store.

pub mod application;
pub mod config;
pub mod domain;
pub mod error;

pub use application::coordinator::ProgressCoordinator;
pub use config::CoordinatorConfig;
