//! Shared test helpers for API integration tests.
#![allow(dead_code)]

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use questline_core::repository::StoredQuestDefinition;
use questline_progress::{CoordinatorConfig, ProgressCoordinator};
use questline_test_support::{FixedClock, InMemoryProgressRepository, quest_definition, zombie_hunter};
use tower::ServiceExt;

use questline_api::state::AppState;

/// A running coordinator over an in-memory store, plus the router in front
/// of it.
pub struct TestApp {
    pub router: Router,
    pub repo: Arc<InMemoryProgressRepository>,
    pub coordinator: Arc<ProgressCoordinator>,
}

/// The quests every test app starts with.
pub fn default_quests() -> Vec<StoredQuestDefinition> {
    vec![
        zombie_hunter(),
        quest_definition(2, "KILL_TARGET", "SKELETON", 5),
        quest_definition(3, "GATHER_ITEM", "OAK_LOG", 2),
    ]
}

/// Build the full app router over an in-memory repository holding
/// `quests`, with the catalog already loaded. Uses the same route structure
/// as `main.rs`.
pub async fn build_test_app_with(quests: Vec<StoredQuestDefinition>) -> TestApp {
    let repo = Arc::new(InMemoryProgressRepository::with_quests(quests));
    let coordinator = Arc::new(ProgressCoordinator::new(
        repo.clone(),
        Arc::new(FixedClock::default()),
        CoordinatorConfig::default(),
    ));
    coordinator.reload_catalog().await.unwrap();
    let router = questline_api::app(AppState::new(Arc::clone(&coordinator)));
    TestApp {
        router,
        repo,
        coordinator,
    }
}

/// [`build_test_app_with`] over [`default_quests`].
pub async fn build_test_app() -> TestApp {
    build_test_app_with(default_quests()).await
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, serde_json::Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let body_bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json = if body_bytes.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&body_bytes).unwrap()
    };

    (status, json)
}

/// Send a request with an optional JSON body and return the response.
pub async fn request_json(
    app: Router,
    method: &str,
    uri: &str,
    body: Option<&serde_json::Value>,
) -> (StatusCode, serde_json::Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_vec(body).unwrap()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    send(app, request).await
}

/// Send a POST request with a JSON body and return the response.
pub async fn post_json(
    app: Router,
    uri: &str,
    body: &serde_json::Value,
) -> (StatusCode, serde_json::Value) {
    request_json(app, "POST", uri, Some(body)).await
}

/// Send a GET request and return the response.
pub async fn get_json(app: Router, uri: &str) -> (StatusCode, serde_json::Value) {
    request_json(app, "GET", uri, None).await
}
