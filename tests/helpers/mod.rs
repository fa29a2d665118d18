#![allow(dead_code)]

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;

use redisboard::config::Config;
use redisboard::features::FeatureFlagProvider;
use redisboard::redis::client::ConnectionRegistry;
use redisboard::store::encryption::Encryption;
use redisboard::store::{AppState, Session, pool};
use redisboard::telemetry::{Telemetry, TelemetryContext};

pub const TEST_ANONYMOUS_ID: &str = "11111111-2222-3333-4444-555555555555";

fn test_config() -> Config {
    Config {
        listen: "127.0.0.1:0".into(),
        database_path: ":memory:".into(),
        master_key: None,
        build_type: "test".into(),
        package_type: None,
        analytics_endpoint: None,
        analytics_write_key: String::new(),
        default_command_timeout_ms: 5_000,
        cors_origins: vec![],
        dev_mode: true,
    }
}

/// Build a test `AppState` on an in-memory SQLite database.
///
/// - Dev-mode encryption key (no `REDISBOARD_MASTER_KEY` needed)
/// - Telemetry disabled; see [`test_state_with_telemetry`] for a live sink
/// - Redis connections open lazily, so tests that never touch browser
///   routes need no running server
pub async fn test_state() -> AppState {
    build_state(Telemetry::disabled, test_config()).await
}

/// Test state with telemetry forwarding to the given sink URL (wiremock).
pub async fn test_state_with_telemetry(endpoint: &str) -> AppState {
    let mut config = test_config();
    config.analytics_endpoint = Some(endpoint.to_owned());
    config.analytics_write_key = "test-write-key".into();

    let pool = pool::connect_in_memory().await.expect("sqlite in-memory");
    let provider = FeatureFlagProvider::new(TEST_ANONYMOUS_ID);
    let control = provider.control_info();
    let telemetry = Telemetry::spawn(
        pool.clone(),
        endpoint.to_owned(),
        config.analytics_write_key.clone(),
        TelemetryContext {
            anonymous_id: TEST_ANONYMOUS_ID.to_owned(),
            session_id: 1_700_000_000_000,
            app_version: "0.0.0-test".into(),
            build_type: config.build_type.clone(),
            control_number: control.control_number,
            control_group: control.control_group,
        },
    );

    assemble(pool, telemetry, provider, config)
}

async fn build_state(telemetry: fn() -> Telemetry, config: Config) -> AppState {
    let pool = pool::connect_in_memory().await.expect("sqlite in-memory");
    let provider = FeatureFlagProvider::new(TEST_ANONYMOUS_ID);
    assemble(pool, telemetry(), provider, config)
}

fn assemble(
    pool: sqlx::SqlitePool,
    telemetry: Telemetry,
    provider: FeatureFlagProvider,
    config: Config,
) -> AppState {
    AppState {
        pool,
        connections: Arc::new(ConnectionRegistry::new()),
        encryption: Arc::new(
            Encryption::from_config(None, true).expect("dev encryption"),
        ),
        telemetry,
        features: Arc::new(provider),
        session: Arc::new(Session {
            anonymous_id: TEST_ANONYMOUS_ID.to_owned(),
            session_id: 1_700_000_000_000,
            first_start: false,
        }),
        config: Arc::new(config),
    }
}

/// Build the full API router with the given state.
pub fn test_router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", axum::routing::get(|| async { "ok" }))
        .merge(redisboard::api::router())
        .with_state(state)
}

/// Send a GET request.
pub async fn get_json(app: &Router, path: &str) -> (StatusCode, Value) {
    let req = Request::builder()
        .method("GET")
        .uri(path)
        .body(Body::empty())
        .unwrap();
    send(app, req).await
}

/// Send a POST request with a JSON body.
pub async fn post_json(app: &Router, path: &str, body: Value) -> (StatusCode, Value) {
    send(app, json_request("POST", path, &body)).await
}

/// Send a PATCH request with a JSON body.
pub async fn patch_json(app: &Router, path: &str, body: Value) -> (StatusCode, Value) {
    send(app, json_request("PATCH", path, &body)).await
}

/// Send a PUT request with a JSON body.
pub async fn put_json(app: &Router, path: &str, body: Value) -> (StatusCode, Value) {
    send(app, json_request("PUT", path, &body)).await
}

/// Send a DELETE request without a body.
pub async fn delete_json(app: &Router, path: &str) -> (StatusCode, Value) {
    let req = Request::builder()
        .method("DELETE")
        .uri(path)
        .body(Body::empty())
        .unwrap();
    send(app, req).await
}

/// Send a DELETE request with a JSON body (bulk deletes).
pub async fn delete_body_json(app: &Router, path: &str, body: Value) -> (StatusCode, Value) {
    send(app, json_request("DELETE", path, &body)).await
}

fn json_request(method: &str, path: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(path)
        .header("Content-Type", "application/json")
        .body(Body::from(serde_json::to_string(body).unwrap()))
        .unwrap()
}

async fn send(app: &Router, req: Request<Body>) -> (StatusCode, Value) {
    let resp = app.clone().oneshot(req).await.unwrap();
    let status = resp.status();
    let body = body_json(resp).await;
    (status, body)
}

/// Extract JSON body from a response.
async fn body_json(resp: axum::http::Response<Body>) -> Value {
    let bytes = resp.into_body().collect().await.unwrap().to_bytes();
    if bytes.is_empty() {
        return Value::Null;
    }
    serde_json::from_slice(&bytes).unwrap_or(Value::Null)
}

/// Create a database profile. Returns its id.
pub async fn create_database(app: &Router, name: &str) -> String {
    let (status, body) = post_json(
        app,
        "/api/databases",
        serde_json::json!({
            "name": name,
            "host": "localhost",
            "port": 6379,
        }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "create database failed: {body}");
    body["id"].as_str().expect("database id").to_owned()
}
