use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use tower::ServiceExt;

use tutor_engine::db::InMemoryProfileStore;
use tutor_engine::tutor::TutorEngine;

mod common;

fn post_json(uri: &str, body: String) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

#[tokio::test]
async fn test_health_root() {
    let app = common::create_test_app();

    let response = app.oneshot(get("/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = common::body_json(response).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["store"], "memory");
    assert_eq!(body["storeStatus"], "connected");
}

#[tokio::test]
async fn test_health_live() {
    let app = common::create_test_app();

    let response = app.oneshot(get("/health/live")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = common::body_json(response).await;
    assert_eq!(body["status"], "healthy");
    assert!(body["version"].is_string());
}

#[tokio::test]
async fn test_unknown_route_returns_json_404() {
    let app = common::create_test_app();

    let response = app.oneshot(get("/api/nothing-here")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let body = common::body_json(response).await;
    assert_eq!(body["success"], false);
    assert_eq!(body["code"], "NOT_FOUND");
}

#[tokio::test]
async fn test_submit_answer() {
    let app = common::create_test_app();
    let event = common::answer("12", "12", 12_000.0, true);

    let response = app
        .oneshot(post_json(
            "/api/tutor/users/u1/answers",
            serde_json::to_string(&event).unwrap(),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = common::body_json(response).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["pattern"], "slow_correct");
    assert_eq!(body["data"]["version"], 1);
    assert!(body["data"]["teachingMoment"].is_object());
    assert!(body["data"]["zpdZone"].is_string());
    assert!(body["data"]["responseContext"]["profileSnippet"].is_object());
}

#[tokio::test]
async fn test_profile_after_answers() {
    let app = common::create_test_app();

    for _ in 0..2 {
        let event = common::answer("12", "12", 12_000.0, true);
        let response = app
            .clone()
            .oneshot(post_json(
                "/api/tutor/users/u1/answers",
                serde_json::to_string(&event).unwrap(),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    let response = app
        .oneshot(get("/api/tutor/users/u1/profile"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = common::body_json(response).await;
    assert_eq!(body["data"]["userId"], "u1");
    assert_eq!(body["data"]["version"], 2);
    assert_eq!(body["data"]["profile"]["interactionCount"], 2);
}

#[tokio::test]
async fn test_unknown_profile_returns_404() {
    let app = common::create_test_app();

    let response = app
        .oneshot(get("/api/tutor/users/ghost/profile"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let body = common::body_json(response).await;
    assert_eq!(body["code"], "NOT_FOUND");
}

#[tokio::test]
async fn test_malformed_json_is_validation_error() {
    let app = common::create_test_app();

    let response = app
        .oneshot(post_json(
            "/api/tutor/users/u1/answers",
            "{ not json".to_string(),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = common::body_json(response).await;
    assert_eq!(body["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn test_negative_response_time_is_rejected() {
    let app = common::create_test_app();
    let event = common::answer("12", "12", -5.0, true);

    let response = app
        .oneshot(post_json(
            "/api/tutor/users/u1/answers",
            serde_json::to_string(&event).unwrap(),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = common::body_json(response).await;
    assert_eq!(body["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn test_store_outage_returns_503() {
    let store = Arc::new(InMemoryProfileStore::new());
    store.fail_next_loads(100);
    let engine = Arc::new(TutorEngine::new(common::test_config(), store));
    let app = tutor_engine::create_app_with_engine(engine);

    let event = common::answer("12", "12", 12_000.0, true);
    let response = app
        .oneshot(post_json(
            "/api/tutor/users/u1/answers",
            serde_json::to_string(&event).unwrap(),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

    let body = common::body_json(response).await;
    assert_eq!(body["success"], false);
}
