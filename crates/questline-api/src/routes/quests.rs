//! Routes for the quest catalog.

use axum::extract::State;
use axum::{
    Json, Router,
    routing::{get, post},
};
use questline_progress::domain::quest::QuestDefinition;
use serde::Serialize;
use tracing::{info, instrument};

use crate::error::ApiError;
use crate::state::AppState;

/// Response body for POST /reload.
#[derive(Debug, Serialize)]
pub struct ReloadResponse {
    /// Number of quests in the newly published catalog.
    pub quests: usize,
}

/// GET /
async fn list_quests(State(state): State<AppState>) -> Json<Vec<QuestDefinition>> {
    let mut quests: Vec<QuestDefinition> = state
        .coordinator
        .quests()
        .iter()
        .map(|quest| quest.as_ref().clone())
        .collect();
    quests.sort_by_key(|quest| quest.id);
    Json(quests)
}

/// POST /reload
#[instrument(skip(state))]
async fn reload_catalog(State(state): State<AppState>) -> Result<Json<ReloadResponse>, ApiError> {
    let quests = state.coordinator.reload_catalog().await?;
    info!(quests, "catalog reloaded on request");
    Ok(Json(ReloadResponse { quests }))
}

/// Returns the router for the quest catalog.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_quests))
        .route("/reload", post(reload_catalog))
}
