//! Leaderboard route.

use axum::extract::{Query, State};
use axum::{Json, Router, routing::get};
use questline_progress::application::query_handlers::{
    self, DEFAULT_LEADERBOARD_LIMIT, LeaderboardEntry,
};
use serde::Deserialize;

use crate::error::ApiError;
use crate::state::AppState;

/// Query string for GET /.
#[derive(Debug, Deserialize)]
pub struct LeaderboardParams {
    /// Maximum number of rows.
    pub limit: Option<u32>,
}

/// GET /
async fn get_leaderboard(
    State(state): State<AppState>,
    Query(params): Query<LeaderboardParams>,
) -> Result<Json<Vec<LeaderboardEntry>>, ApiError> {
    let limit = params.limit.unwrap_or(DEFAULT_LEADERBOARD_LIMIT);
    let entries = query_handlers::get_leaderboard(state.repository.as_ref(), limit).await?;
    Ok(Json(entries))
}

/// Returns the leaderboard router.
pub fn router() -> Router<AppState> {
    Router::new().route("/", get(get_leaderboard))
}
