mod helpers;

use std::time::Duration;

use axum::http::StatusCode;
use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use helpers::{create_database, patch_json, test_router, test_state_with_telemetry};

async fn mount_sink(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/v1/track"))
        .respond_with(ResponseTemplate::new(200))
        .mount(server)
        .await;
}

/// Wait for the forwarder task to drain; events travel an async channel.
async fn wait_for_events(server: &MockServer, expected: usize) -> Vec<serde_json::Value> {
    for _ in 0..50 {
        let received = server.received_requests().await.unwrap_or_default();
        if received.len() >= expected {
            return received
                .iter()
                .map(|r| serde_json::from_slice(&r.body).unwrap_or(serde_json::Value::Null))
                .collect();
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    let received = server.received_requests().await.unwrap_or_default();
    received
        .iter()
        .map(|r| serde_json::from_slice(&r.body).unwrap_or(serde_json::Value::Null))
        .collect()
}

#[tokio::test]
async fn consented_events_reach_the_sink_with_context() {
    let sink = MockServer::start().await;
    mount_sink(&sink).await;

    let app = test_router(test_state_with_telemetry(&sink.uri()).await);

    let (status, _) = patch_json(
        &app,
        "/api/settings",
        json!({ "agreements": { "analytics": true } }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    create_database(&app, "tracked").await;

    let events = wait_for_events(&sink, 1).await;
    assert!(!events.is_empty(), "no telemetry delivered");
    let event = &events[0];
    assert_eq!(event["event"], "CONFIG_DATABASES_DATABASE_ADDED");
    assert_eq!(event["anonymousId"], helpers::TEST_ANONYMOUS_ID);
    assert_eq!(event["context"]["traits"]["telemetry"], "enabled");
    assert!(event["properties"]["appVersion"].is_string());
    assert!(event["properties"]["controlNumber"].is_number());
}

#[tokio::test]
async fn without_consent_nothing_is_sent() {
    let sink = MockServer::start().await;
    mount_sink(&sink).await;

    let app = test_router(test_state_with_telemetry(&sink.uri()).await);
    create_database(&app, "untracked").await;

    tokio::time::sleep(Duration::from_millis(300)).await;
    let received = sink.received_requests().await.unwrap_or_default();
    assert!(received.is_empty(), "consent was never granted");
}

#[tokio::test]
async fn sink_failures_never_surface_to_the_api() {
    let sink = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/track"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&sink)
        .await;

    let app = test_router(test_state_with_telemetry(&sink.uri()).await);
    let (status, _) = patch_json(
        &app,
        "/api/settings",
        json!({ "agreements": { "analytics": true } }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    // The request succeeds even though every delivery attempt fails.
    create_database(&app, "resilient").await;
}
