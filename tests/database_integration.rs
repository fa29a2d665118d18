mod helpers;

use axum::http::StatusCode;
use serde_json::json;

use helpers::{
    create_database, delete_body_json, delete_json, get_json, patch_json, post_json, test_router,
    test_state,
};

#[tokio::test]
async fn create_database_returns_stored_profile() {
    let app = test_router(test_state().await);

    let (status, body) = post_json(
        &app,
        "/api/databases",
        json!({
            "name": "staging cache",
            "host": "cache.internal",
            "port": 6380,
            "db": 2,
            "username": "default",
            "password": "s3cret",
            "tls": true,
        }),
    )
    .await;

    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(body["name"], "staging cache");
    assert_eq!(body["host"], "cache.internal");
    assert_eq!(body["port"], 6380);
    assert_eq!(body["db"], 2);
    assert_eq!(body["tls"], true);
    assert_eq!(body["is_pre_setup"], false);
    assert_eq!(body["new_connection"], true);
    assert_eq!(body["compressor"], "NONE");
    // secrets never leave the API
    assert!(body.get("password").is_none(), "{body}");
}

#[tokio::test]
async fn duplicate_name_conflicts() {
    let app = test_router(test_state().await);
    create_database(&app, "primary").await;

    let (status, _) = post_json(
        &app,
        "/api/databases",
        json!({ "name": "primary", "host": "other.host", "port": 6379 }),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn invalid_port_rejected() {
    let app = test_router(test_state().await);

    let (status, _) = post_json(
        &app,
        "/api/databases",
        json!({ "name": "bad", "host": "localhost", "port": 0 }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = post_json(
        &app,
        "/api/databases",
        json!({ "name": "bad", "host": "localhost", "port": 70000 }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn invalid_db_index_rejected() {
    let app = test_router(test_state().await);
    let (status, _) = post_json(
        &app,
        "/api/databases",
        json!({ "name": "bad", "host": "localhost", "port": 6379, "db": 16 }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn unknown_database_is_404() {
    let app = test_router(test_state().await);
    let (status, _) = get_json(
        &app,
        "/api/databases/00000000-0000-0000-0000-00000000dead",
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn list_reports_total() {
    let app = test_router(test_state().await);
    create_database(&app, "one").await;
    create_database(&app, "two").await;

    let (status, body) = get_json(&app, "/api/databases").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 2);
    assert_eq!(body["items"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn patch_updates_fields_and_keeps_others() {
    let app = test_router(test_state().await);
    let id = create_database(&app, "before").await;

    let (status, body) = patch_json(
        &app,
        &format!("/api/databases/{id}"),
        json!({ "name": "after", "port": 7000 }),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["name"], "after");
    assert_eq!(body["port"], 7000);
    assert_eq!(body["host"], "localhost");
}

#[tokio::test]
async fn patch_to_taken_name_conflicts() {
    let app = test_router(test_state().await);
    create_database(&app, "taken").await;
    let id = create_database(&app, "renaming").await;

    let (status, _) = patch_json(
        &app,
        &format!("/api/databases/{id}"),
        json!({ "name": "taken" }),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn delete_then_404() {
    let app = test_router(test_state().await);
    let id = create_database(&app, "short lived").await;

    let (status, _) = delete_json(&app, &format!("/api/databases/{id}")).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = get_json(&app, &format!("/api/databases/{id}")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn bulk_delete_counts_existing_only() {
    let app = test_router(test_state().await);
    let a = create_database(&app, "bulk a").await;
    let b = create_database(&app, "bulk b").await;

    let (status, body) = delete_body_json(
        &app,
        "/api/databases",
        json!({ "ids": [a, b, "00000000-0000-0000-0000-00000000beef"] }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["affected"], 2);
}

#[tokio::test]
async fn clone_copies_profile_with_fresh_identity() {
    let app = test_router(test_state().await);

    let (_, source) = post_json(
        &app,
        "/api/databases",
        json!({
            "name": "source",
            "host": "cache.internal",
            "port": 6380,
            "db": 1,
            "tls": true,
        }),
    )
    .await;
    let source_id = source["id"].as_str().unwrap();

    let (status, cloned) =
        post_json(&app, &format!("/api/databases/clone/{source_id}"), json!({})).await;
    assert_eq!(status, StatusCode::CREATED, "{cloned}");
    assert_ne!(cloned["id"], source["id"]);
    assert_eq!(cloned["name"], "source (copy)");
    assert_eq!(cloned["host"], "cache.internal");
    assert_eq!(cloned["port"], 6380);
    assert_eq!(cloned["db"], 1);
    assert_eq!(cloned["tls"], true);
    assert_eq!(cloned["is_pre_setup"], false);
}

#[tokio::test]
async fn clone_applies_overrides() {
    let app = test_router(test_state().await);
    let id = create_database(&app, "override source").await;

    let (status, cloned) = post_json(
        &app,
        &format!("/api/databases/clone/{id}"),
        json!({ "name": "override target", "port": 6400 }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{cloned}");
    assert_eq!(cloned["name"], "override target");
    assert_eq!(cloned["port"], 6400);
    assert_eq!(cloned["host"], "localhost");
}

#[tokio::test]
async fn clone_with_taken_name_conflicts() {
    let app = test_router(test_state().await);
    let id = create_database(&app, "clash source").await;
    create_database(&app, "clash target").await;

    let (status, _) = post_json(
        &app,
        &format!("/api/databases/clone/{id}"),
        json!({ "name": "clash target" }),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn clone_with_used_certificate_name_is_bad_request() {
    let app = test_router(test_state().await);

    let pem = "-----BEGIN CERTIFICATE-----\nMIIB\n-----END CERTIFICATE-----";
    let (status, _) = post_json(
        &app,
        "/api/certificates/ca",
        json!({ "name": "shared-ca", "certificate": pem }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let id = create_database(&app, "cert clash source").await;
    let (status, body) = post_json(
        &app,
        &format!("/api/databases/clone/{id}"),
        json!({
            "name": "cert clash clone",
            "ca_cert": { "name": "shared-ca", "certificate": pem },
        }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");
    assert!(
        body["error"].as_str().unwrap_or("").contains("shared-ca"),
        "{body}"
    );
}

#[tokio::test]
async fn clone_of_unknown_database_is_404() {
    let app = test_router(test_state().await);
    let (status, _) = post_json(
        &app,
        "/api/databases/clone/00000000-0000-0000-0000-00000000dead",
        json!({}),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
