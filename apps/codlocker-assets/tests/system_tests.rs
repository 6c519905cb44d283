//! Integration tests for probes, flag introspection and the offline gate.

mod common;

use axum::http::StatusCode;
use codlocker_assets::services::flags::{Flags, LogLevel};
use codlocker_assets::services::storage::StorageLocation;
use common::TestApp;
use serde_json::Value;

fn offline() -> Flags {
    Flags {
        offline: true,
        ..Default::default()
    }
}

// =============================================================================
// Probes
// =============================================================================

#[tokio::test]
async fn test_health_returns_ok() {
    let app = TestApp::new();

    let response = app.server().get("/health").await;

    response.assert_status_ok();
    assert_eq!(response.text(), "ok");
}

#[tokio::test]
async fn test_health_ignores_database() {
    let app = TestApp::new();
    app.set_ready(false);

    let response = app.server().get("/health").await;

    response.assert_status_ok();
}

#[tokio::test]
async fn test_health_rejects_post() {
    let app = TestApp::new();

    let response = app.server().post("/health").await;

    response.assert_status(StatusCode::METHOD_NOT_ALLOWED);
}

#[tokio::test]
async fn test_ready_when_database_answers() {
    let app = TestApp::new();

    let response = app.server().get("/ready").await;

    response.assert_status_ok();
    assert_eq!(response.text(), "ready");
}

#[tokio::test]
async fn test_not_ready_when_database_is_down() {
    let app = TestApp::new();
    app.set_ready(false);

    let response = app.server().get("/ready").await;

    response.assert_status(StatusCode::SERVICE_UNAVAILABLE);
    let body: Value = response.json();
    assert_eq!(body["error"], "service_unavailable");
    assert_eq!(body["message"], "db not ready");

    app.set_ready(true);
    app.server().get("/ready").await.assert_status_ok();
}

// =============================================================================
// Flags
// =============================================================================

#[tokio::test]
async fn test_flags_defaults() {
    let app = TestApp::new();

    let response = app.server().get("/_flags").await;

    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["offline"], false);
    assert_eq!(body["logLevel"], "info");
    assert_eq!(body["imageStorageLocation"], "local");
}

#[tokio::test]
async fn test_flags_reflect_latest_snapshot() {
    let app = TestApp::new();
    app.set_flags(Flags {
        log_level: LogLevel::Debug,
        image_storage_location: StorageLocation::Bucket,
        ..Default::default()
    });

    let body: Value = app.server().get("/_flags").await.json();

    assert_eq!(body["logLevel"], "debug");
    assert_eq!(body["imageStorageLocation"], "bucket");
}

// =============================================================================
// Offline gate
// =============================================================================

#[tokio::test]
async fn test_offline_rejects_assets() {
    let app = TestApp::new();
    app.write_asset("logo.png", "png");
    app.set_flags(offline());

    let response = app.server().get("/assets/logo.png").await;

    response.assert_status(StatusCode::SERVICE_UNAVAILABLE);
    let body: Value = response.json();
    assert_eq!(body["error"], "service_unavailable");
    assert_eq!(body["message"], "service temporarily offline");
}

#[tokio::test]
async fn test_offline_rejects_flag_introspection() {
    let app = TestApp::new();
    app.set_flags(offline());

    let response = app.server().get("/_flags").await;

    response.assert_status(StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_offline_lets_probes_through() {
    let app = TestApp::new();
    app.set_flags(offline());

    app.server().get("/health").await.assert_status_ok();
    app.server().get("/ready").await.assert_status_ok();
}

#[tokio::test]
async fn test_back_online_serves_again() {
    let app = TestApp::new();
    app.write_asset("logo.png", "png");

    app.set_flags(offline());
    app.server()
        .get("/assets/logo.png")
        .await
        .assert_status(StatusCode::SERVICE_UNAVAILABLE);

    app.set_flags(Flags::default());
    let response = app.server().get("/assets/logo.png").await;
    response.assert_status_ok();
    assert_eq!(response.text(), "png");
}
