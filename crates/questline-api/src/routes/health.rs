//! Health check endpoint.

use axum::extract::State;
use axum::{Json, Router, routing::get};
use serde::Serialize;

use crate::state::AppState;

/// Health check response.
#[derive(Serialize)]
pub struct HealthResponse {
    /// Service status.
    pub status: String,
    /// Service version.
    pub version: String,
    /// Whether the quest catalog has been loaded.
    pub catalog_loaded: bool,
    /// Actors with a loaded session.
    pub active_sessions: usize,
    /// Durable writes given up so far.
    pub failed_writes: u64,
}

/// GET /health
async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let coordinator = &state.coordinator;
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        catalog_loaded: coordinator.catalog_loaded(),
        active_sessions: coordinator.active_sessions(),
        failed_writes: coordinator.write_stats().failed,
    })
}

/// Returns the health check router.
pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
