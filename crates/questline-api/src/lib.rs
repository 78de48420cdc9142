//! Questline API — HTTP host for the progress coordinator.

use axum::Router;

pub mod config;
pub mod error;
pub mod notifications;
pub mod routes;
pub mod seed;
pub mod state;
pub mod telemetry;

/// Builds the full application router. Middleware is layered on by the
/// caller.
pub fn app(state: state::AppState) -> Router {
    Router::new()
        .merge(routes::health::router())
        .nest("/api/v1/quests", routes::quests::router())
        .nest("/api/v1/actors", routes::actors::router())
        .nest("/api/v1/leaderboard", routes::leaderboard::router())
        .with_state(state)
}
