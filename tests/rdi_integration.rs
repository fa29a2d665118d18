mod helpers;

use axum::http::StatusCode;
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use helpers::{delete_json, get_json, post_json, test_router, test_state};

async fn mock_login(server: &MockServer, token: &str) {
    Mock::given(method("POST"))
        .and(path("/api/v1/login"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "access_token": token })))
        .mount(server)
        .await;
}

async fn create_rdi(app: &axum::Router, url: &str) -> String {
    let (status, body) = post_json(
        app,
        "/api/rdi",
        json!({
            "name": "ingest",
            "url": url,
            "username": "admin",
            "password": "secret",
        }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    body["id"].as_str().unwrap().to_owned()
}

#[tokio::test]
async fn create_checks_connectivity_first() {
    let remote = MockServer::start().await;
    mock_login(&remote, "tok-1").await;

    let app = test_router(test_state().await);
    let id = create_rdi(&app, &remote.uri()).await;

    let (status, body) = get_json(&app, &format!("/api/rdi/{id}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "ingest");
    assert!(body.get("password").is_none(), "{body}");
}

#[tokio::test]
async fn create_records_remote_version() {
    let remote = MockServer::start().await;
    mock_login(&remote, "tok-v").await;
    Mock::given(method("GET"))
        .and(path("/api/v1/version"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "version": "1.4.2" })))
        .mount(&remote)
        .await;

    let app = test_router(test_state().await);
    let id = create_rdi(&app, &remote.uri()).await;

    let (status, body) = get_json(&app, &format!("/api/rdi/{id}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["version"], "1.4.2", "{body}");
}

#[tokio::test]
async fn connect_refreshes_stored_version() {
    let remote = MockServer::start().await;
    mock_login(&remote, "tok-v2").await;

    // No version endpoint at create time: the profile stores null.
    let app = test_router(test_state().await);
    let id = create_rdi(&app, &remote.uri()).await;
    let (_, body) = get_json(&app, &format!("/api/rdi/{id}")).await;
    assert!(body["version"].is_null(), "{body}");

    // Newer remotes answer with a bare string.
    Mock::given(method("GET"))
        .and(path("/api/v1/version"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!("1.5.0")))
        .mount(&remote)
        .await;

    let (status, _) = get_json(&app, &format!("/api/rdi/{id}/connect")).await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = get_json(&app, &format!("/api/rdi/{id}")).await;
    assert_eq!(body["version"], "1.5.0", "{body}");
}

#[tokio::test]
async fn create_against_dead_endpoint_is_failed_dependency() {
    let remote = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/login"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&remote)
        .await;

    let app = test_router(test_state().await);
    let (status, _) = post_json(
        &app,
        "/api/rdi",
        json!({ "name": "dead", "url": remote.uri(), "password": "wrong" }),
    )
    .await;
    assert_eq!(status, StatusCode::FAILED_DEPENDENCY);
}

#[tokio::test]
async fn get_pipeline_proxies_with_bearer_token() {
    let remote = MockServer::start().await;
    mock_login(&remote, "tok-abc").await;
    Mock::given(method("GET"))
        .and(path("/api/v1/pipeline"))
        .and(header("authorization", "Bearer tok-abc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "config": "sources: {}\n",
            "jobs": { "users": "source:\n  table: users\n" },
        })))
        .mount(&remote)
        .await;

    let app = test_router(test_state().await);
    let id = create_rdi(&app, &remote.uri()).await;

    let (status, body) = get_json(&app, &format!("/api/rdi/{id}/pipeline")).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["config"], "sources: {}\n");
    assert_eq!(body["jobs"]["users"], "source:\n  table: users\n");
}

#[tokio::test]
async fn deploy_validates_yaml_before_upload() {
    let remote = MockServer::start().await;
    mock_login(&remote, "tok-x").await;
    // No deploy mock mounted: reaching the remote would 404 and fail the
    // request with 424 instead of the expected 400.

    let app = test_router(test_state().await);
    let id = create_rdi(&app, &remote.uri()).await;

    let (status, body) = post_json(
        &app,
        &format!("/api/rdi/{id}/pipeline/deploy"),
        json!({ "config": "sources: [unclosed", "jobs": {} }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");
    assert!(body["fields"].is_array(), "{body}");
}

#[tokio::test]
async fn deploy_updates_last_deployment() {
    let remote = MockServer::start().await;
    mock_login(&remote, "tok-y").await;
    Mock::given(method("POST"))
        .and(path("/api/v1/pipeline/deploy"))
        .and(body_partial_json(json!({ "config": "sources: {}\n" })))
        .respond_with(ResponseTemplate::new(200))
        .mount(&remote)
        .await;

    let app = test_router(test_state().await);
    let id = create_rdi(&app, &remote.uri()).await;

    let (status, body) = post_json(
        &app,
        &format!("/api/rdi/{id}/pipeline/deploy"),
        json!({ "config": "sources: {}\n", "jobs": {} }),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");

    let (_, instance) = get_json(&app, &format!("/api/rdi/{id}")).await;
    assert!(instance["last_deployment"].is_string(), "{instance}");
}

#[tokio::test]
async fn expired_token_triggers_one_relogin() {
    let remote = MockServer::start().await;
    mock_login(&remote, "tok-fresh").await;

    // First status call hits a stale-token 401, the retry succeeds.
    Mock::given(method("GET"))
        .and(path("/api/v1/pipeline/status"))
        .respond_with(ResponseTemplate::new(401))
        .up_to_n_times(1)
        .mount(&remote)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v1/pipeline/status"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "components": {}, "pipelines": {} })),
        )
        .mount(&remote)
        .await;

    let app = test_router(test_state().await);
    let id = create_rdi(&app, &remote.uri()).await;

    let (status, body) = get_json(&app, &format!("/api/rdi/{id}/pipeline/status")).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert!(body["pipelines"].is_object());
}

#[tokio::test]
async fn invalid_url_rejected_up_front() {
    let app = test_router(test_state().await);
    let (status, _) = post_json(
        &app,
        "/api/rdi",
        json!({ "name": "bad url", "url": "not a url" }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn delete_then_404() {
    let remote = MockServer::start().await;
    mock_login(&remote, "tok-z").await;

    let app = test_router(test_state().await);
    let id = create_rdi(&app, &remote.uri()).await;

    let (status, _) = delete_json(&app, &format!("/api/rdi/{id}")).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = get_json(&app, &format!("/api/rdi/{id}")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
