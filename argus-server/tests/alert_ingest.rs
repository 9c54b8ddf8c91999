mod common;

use axum::http::StatusCode;
use serde_json::{Value, json};

use common::build_test_app;

fn alert_payload(camera_id: &str, confidence: f64) -> Value {
    json!({
        "cameraId": camera_id,
        "confidence": confidence,
        "boundingBox": { "x": 10.0, "y": 20.0, "width": 64.0, "height": 80.0 },
        "imageUrl": "https://cdn.example.test/frames/1.jpg"
    })
}

#[tokio::test]
async fn alert_is_created_with_camera_summary() {
    let app = build_test_app();

    let response = app
        .server
        .post("/api/v1/alerts")
        .json(&alert_payload("cam1", 0.93))
        .await;
    response.assert_status(StatusCode::CREATED);

    let event: Value = response.json();
    assert_eq!(event["cameraId"], "cam1");
    assert_eq!(event["confidence"], 0.93);
    assert_eq!(event["boundingBox"]["width"], 64.0);
    assert_eq!(event["camera"]["name"], "Lobby");
    assert_eq!(event["camera"]["location"], "Entrance");

    let stored = app.alerts.all();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].id.to_string(), event["id"].as_str().unwrap());
}

#[tokio::test]
async fn invalid_confidence_is_rejected() {
    let app = build_test_app();

    app.server
        .post("/api/v1/alerts")
        .json(&alert_payload("cam1", 1.5))
        .await
        .assert_status(StatusCode::BAD_REQUEST);

    assert!(app.alerts.is_empty());
}

#[tokio::test]
async fn alert_for_unknown_camera_is_not_found() {
    let app = build_test_app();

    app.server
        .post("/api/v1/alerts")
        .json(&alert_payload("ghost", 0.5))
        .await
        .assert_status_not_found();

    assert!(app.alerts.is_empty());
}

#[tokio::test]
async fn health_reports_connection_count() {
    let app = build_test_app();

    let response = app.server.get("/health").await;
    response.assert_status_ok();

    let body: Value = response.json();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["connections"], 0);
    assert!(body["timestamp"].is_string());
}
