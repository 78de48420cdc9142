//! Integration tests for the quest catalog routes.

mod common;

use axum::http::StatusCode;
use questline_test_support::quest_definition;

#[tokio::test]
async fn test_list_quests_is_sorted_by_id() {
    let app = common::build_test_app().await;

    let (status, json) = common::get_json(app.router, "/api/v1/quests").await;

    assert_eq!(status, StatusCode::OK);
    let quests = json.as_array().unwrap();
    assert_eq!(quests.len(), 3);
    assert_eq!(quests[0]["id"], 1);
    assert_eq!(quests[0]["name"], "Zombie Hunter");
    assert_eq!(quests[0]["objective"], "KILL_TARGET");
    assert_eq!(quests[0]["required_amount"], 10);
    assert_eq!(quests[2]["id"], 3);
}

#[tokio::test]
async fn test_reload_publishes_new_definitions() {
    // Arrange
    let app = common::build_test_app().await;
    let mut quests = common::default_quests();
    quests.push(quest_definition(4, "REACH_LOCATION", "watchtower", 1));
    app.repo.replace_quests(quests);

    // Act
    let (status, json) = common::post_json(
        app.router.clone(),
        "/api/v1/quests/reload",
        &serde_json::json!({}),
    )
    .await;

    // Assert
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["quests"], 4);
    let (_, json) = common::get_json(app.router, "/api/v1/quests").await;
    assert_eq!(json.as_array().unwrap().len(), 4);
}

#[tokio::test]
async fn test_invalid_reload_returns_500_and_keeps_catalog() {
    // Arrange
    let app = common::build_test_app().await;
    app.repo
        .replace_quests(vec![quest_definition(1, "TELEPORT", "MOON", 1)]);

    // Act
    let (status, json) = common::post_json(
        app.router.clone(),
        "/api/v1/quests/reload",
        &serde_json::json!({}),
    )
    .await;

    // Assert
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json["error"], "invalid_catalog");
    let (_, json) = common::get_json(app.router, "/api/v1/quests").await;
    assert_eq!(json.as_array().unwrap().len(), 3);
}
