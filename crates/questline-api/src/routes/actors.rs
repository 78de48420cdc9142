//! Routes for actor sessions, quest starts and progress events.
//!
//! These are the ingestion side of the coordinator: the game server calls
//! them when an actor joins or leaves, accepts a quest, or does something
//! that may count toward one.

use axum::extract::{Path, State};
use axum::{
    Json, Router,
    routing::{get, post, put},
};
use questline_core::ids::{ActorId, QuestId};
use questline_progress::application::query_handlers::{self, QuestBoardEntry};
use questline_progress::domain::progress::ProgressRecord;
use questline_progress::domain::quest::ObjectiveKind;
use questline_progress::error::StartError;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::error::ApiError;
use crate::state::AppState;

/// Response body for PUT /{actor_id}/session.
#[derive(Debug, Serialize)]
pub struct SessionLoadedResponse {
    /// The actor.
    pub actor_id: ActorId,
    /// Records restored from the store.
    pub records: usize,
}

/// Response body for DELETE /{actor_id}/session.
#[derive(Debug, Serialize)]
pub struct SessionEndedResponse {
    /// The actor.
    pub actor_id: ActorId,
    /// Whether a loaded session was evicted.
    pub ended: bool,
}

/// Response body for POST /{actor_id}/quests/{quest_id}/start.
#[derive(Debug, Serialize)]
pub struct StartQuestResponse {
    /// `false` when the quest was already started or completed.
    pub started: bool,
    /// The actor's record after the call.
    pub record: ProgressRecord,
}

/// Request body for POST /{actor_id}/events.
#[derive(Debug, Deserialize)]
pub struct ProgressEventRequest {
    /// Kind of occurrence.
    pub objective: ObjectiveKind,
    /// Target discriminator, matched case-insensitively.
    pub target: String,
}

/// Response body for POST /{actor_id}/events.
#[derive(Debug, Serialize)]
pub struct ProgressEventResponse {
    /// Records advanced by this event.
    pub advanced: Vec<ProgressRecord>,
}

/// PUT /{actor_id}/session
#[instrument(skip(state))]
async fn load_session(
    State(state): State<AppState>,
    Path(actor_id): Path<Uuid>,
) -> Result<Json<SessionLoadedResponse>, ApiError> {
    let actor_id = ActorId::from(actor_id);
    let records = state.coordinator.load_actor_session(actor_id).await?;
    Ok(Json(SessionLoadedResponse { actor_id, records }))
}

/// DELETE /{actor_id}/session
#[instrument(skip(state))]
async fn end_session(
    State(state): State<AppState>,
    Path(actor_id): Path<Uuid>,
) -> Json<SessionEndedResponse> {
    let actor_id = ActorId::from(actor_id);
    let ended = state.coordinator.end_actor_session(actor_id);
    Json(SessionEndedResponse { actor_id, ended })
}

/// GET /{actor_id}/quests
async fn quest_board(
    State(state): State<AppState>,
    Path(actor_id): Path<Uuid>,
) -> Json<Vec<QuestBoardEntry>> {
    Json(query_handlers::quest_board(
        &state.coordinator,
        ActorId::from(actor_id),
    ))
}

/// GET /{actor_id}/quests/{quest_id}
async fn get_record(
    State(state): State<AppState>,
    Path((actor_id, quest_id)): Path<(Uuid, i32)>,
) -> Json<ProgressRecord> {
    Json(
        state
            .coordinator
            .get_record(ActorId::from(actor_id), QuestId::from(quest_id)),
    )
}

/// POST /{actor_id}/quests/{quest_id}/start
#[instrument(skip(state))]
async fn start_quest(
    State(state): State<AppState>,
    Path((actor_id, quest_id)): Path<(Uuid, i32)>,
) -> Result<Json<StartQuestResponse>, ApiError> {
    let actor_id = ActorId::from(actor_id);
    let quest_id = QuestId::from(quest_id);

    match state.coordinator.start_quest(actor_id, quest_id) {
        Ok(record) => Ok(Json(StartQuestResponse {
            started: true,
            record,
        })),
        Err(StartError::AlreadyStarted(record)) => {
            debug!(status = %record.status, "quest already started");
            Ok(Json(StartQuestResponse {
                started: false,
                record,
            }))
        }
        Err(e) => Err(e.into()),
    }
}

/// POST /{actor_id}/events
#[instrument(skip(state, request), fields(objective = %request.objective, target = %request.target))]
async fn report_progress(
    State(state): State<AppState>,
    Path(actor_id): Path<Uuid>,
    Json(request): Json<ProgressEventRequest>,
) -> Json<ProgressEventResponse> {
    let advanced = state.coordinator.report_progress(
        ActorId::from(actor_id),
        request.objective,
        &request.target,
    );
    Json(ProgressEventResponse { advanced })
}

/// Returns the router for actor-scoped routes.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/{actor_id}/session", put(load_session).delete(end_session))
        .route("/{actor_id}/quests", get(quest_board))
        .route("/{actor_id}/quests/{quest_id}", get(get_record))
        .route("/{actor_id}/quests/{quest_id}/start", post(start_quest))
        .route("/{actor_id}/events", post(report_progress))
}
