//! Integration tests for the channel REST endpoints.
//!
//! Tests use Axum's `Router` directly via `tower::ServiceExt` without
//! starting a TCP server.

#![allow(clippy::unwrap_used, clippy::arithmetic_side_effects)]

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use serde_json::Value;
use showcase_channel::router::{STATUS_TEXT, build_router};
use showcase_channel::state::AppState;
use showcase_core::config::ShowcaseConfig;
use showcase_core::presentation::{NoOpCallback, Presentation, PresentationHandle};
use tower::ServiceExt;

fn spawn_presentation() -> PresentationHandle {
    let (handle, _task) = Presentation::spawn(&ShowcaseConfig::default(), NoOpCallback).unwrap();
    handle
}

fn app_with_presentation() -> (axum::Router, PresentationHandle) {
    let handle = spawn_presentation();
    let state = Arc::new(AppState::with_presentation(handle.clone()));
    (build_router(state), handle)
}

async fn body_to_json(body: Body) -> Value {
    let bytes = axum::body::to_bytes(body, usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn post_json(uri: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn post_empty(uri: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

// =========================================================================
// GET /
// =========================================================================

#[tokio::test]
async fn index_returns_status_text() {
    let app = build_router(Arc::new(AppState::new()));
    let response = app.oneshot(get("/")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let content_type = response
        .headers()
        .get(header::CONTENT_TYPE)
        .unwrap()
        .to_str()
        .unwrap()
        .to_owned();
    assert!(content_type.starts_with("text/plain"));

    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    assert_eq!(bytes.as_ref(), STATUS_TEXT.as_bytes());
}

#[tokio::test]
async fn unknown_route_is_404() {
    let app = build_router(Arc::new(AppState::new()));
    let response = app.oneshot(get("/nope")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

// =========================================================================
// GET /api/presentation
// =========================================================================

#[tokio::test]
async fn presentation_snapshot_describes_the_catalog() {
    let (app, _handle) = app_with_presentation();
    let response = app.oneshot(get("/api/presentation")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["stage_count"], 5);
    assert!(json["speed_factor"].is_number());
    assert!(json["signals"].is_object());
}

#[tokio::test]
async fn presentation_without_runner_is_503() {
    let app = build_router(Arc::new(AppState::new()));
    let response = app.oneshot(get("/api/presentation")).await.unwrap();

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["status"], 503);
    assert!(json["error"].is_string());
}

#[tokio::test]
async fn control_without_runner_is_503() {
    let app = build_router(Arc::new(AppState::new()));
    let response = app
        .oneshot(post_empty("/api/presentation/pause"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}

// =========================================================================
// POST /api/presentation/{pause,resume,reset,advance}
// =========================================================================

#[tokio::test]
async fn pause_then_resume_round_trip() {
    let (app, handle) = app_with_presentation();

    let response = app
        .clone()
        .oneshot(post_empty("/api/presentation/pause"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["ok"], true);

    let mut snapshots = handle.subscribe();
    tokio::time::timeout(Duration::from_secs(5), snapshots.wait_for(|s| s.is_paused))
        .await
        .unwrap()
        .unwrap();

    let response = app
        .oneshot(post_empty("/api/presentation/resume"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    tokio::time::timeout(Duration::from_secs(5), snapshots.wait_for(|s| !s.is_paused))
        .await
        .unwrap()
        .unwrap();
}

#[tokio::test]
async fn advance_moves_to_the_next_stage() {
    let (app, handle) = app_with_presentation();

    let response = app
        .oneshot(post_empty("/api/presentation/advance"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let mut snapshots = handle.subscribe();
    tokio::time::timeout(
        Duration::from_secs(5),
        snapshots.wait_for(|s| s.stage_index >= 1),
    )
    .await
    .unwrap()
    .unwrap();
}

#[tokio::test]
async fn reset_is_accepted() {
    let (app, _handle) = app_with_presentation();
    let response = app
        .oneshot(post_empty("/api/presentation/reset"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["ok"], true);
    assert!(json["message"].as_str().unwrap().contains("reset"));
}

// =========================================================================
// POST /api/presentation/speed
// =========================================================================

#[tokio::test]
async fn set_speed_valid() {
    let (app, handle) = app_with_presentation();
    let response = app
        .oneshot(post_json(
            "/api/presentation/speed",
            &serde_json::json!({"speed_factor": 2.0}),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["ok"], true);

    let mut snapshots = handle.subscribe();
    tokio::time::timeout(
        Duration::from_secs(5),
        snapshots.wait_for(|s| (s.speed_factor - 2.0).abs() < f64::EPSILON),
    )
    .await
    .unwrap()
    .unwrap();
}

#[tokio::test]
async fn set_speed_out_of_range_is_400() {
    let (app, _handle) = app_with_presentation();
    let response = app
        .oneshot(post_json(
            "/api/presentation/speed",
            &serde_json::json!({"speed_factor": 0.0}),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["status"], 400);
}

#[tokio::test]
async fn set_speed_missing_field_is_rejected() {
    let (app, _handle) = app_with_presentation();
    let response = app
        .oneshot(post_json(
            "/api/presentation/speed",
            &serde_json::json!({"speed": 2.0}),
        ))
        .await
        .unwrap();

    assert!(response.status().is_client_error());
}

// =========================================================================
// POST /api/presentation/signal
// =========================================================================

#[tokio::test]
async fn report_known_signal() {
    let (app, handle) = app_with_presentation();
    let response = app
        .oneshot(post_json(
            "/api/presentation/signal",
            &serde_json::json!({"signal": "sphereComplete"}),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["ok"], true);
    assert!(json["message"].as_str().unwrap().contains("sphereComplete"));

    // The runner is still alive after the signal.
    assert!(handle.pause().await.is_ok());
}

#[tokio::test]
async fn report_unknown_signal_is_400() {
    let (app, _handle) = app_with_presentation();
    let response = app
        .oneshot(post_json(
            "/api/presentation/signal",
            &serde_json::json!({"signal": "teleportComplete"}),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_to_json(response.into_body()).await;
    assert!(json["error"].as_str().unwrap().contains("teleportComplete"));
}

// =========================================================================
// Runner gone
// =========================================================================

#[tokio::test]
async fn control_after_stop_is_503() {
    let (app, handle) = app_with_presentation();
    handle.stop().await.unwrap();

    // Wait for the runner to drop its command receiver.
    let mut closed = false;
    for _ in 0..100 {
        if handle.pause().await.is_err() {
            closed = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(closed);

    let response = app
        .oneshot(post_empty("/api/presentation/advance"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}
