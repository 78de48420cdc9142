//! Shared application state.

use std::sync::Arc;

use questline_core::repository::ProgressRepository;
use questline_progress::ProgressCoordinator;

/// Application state shared across all request handlers.
#[derive(Clone)]
pub struct AppState {
    /// The progress coordinator.
    pub coordinator: Arc<ProgressCoordinator>,
    /// Durable store, for reads that bypass the cache.
    pub repository: Arc<dyn ProgressRepository>,
}

impl AppState {
    /// Create new application state.
    #[must_use]
    pub fn new(coordinator: Arc<ProgressCoordinator>) -> Self {
        let repository = coordinator.repository();
        Self {
            coordinator,
            repository,
        }
    }
}
