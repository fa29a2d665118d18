mod helpers;

use axum::http::StatusCode;
use serde_json::json;

use helpers::{create_database, post_json, test_router, test_state};

// The tokenizer and blocklist run before any connection is opened, so
// these rejections need no reachable Redis behind the profile.

#[tokio::test]
async fn blocked_command_is_bad_request() {
    let app = test_router(test_state().await);
    let id = create_database(&app, "cli target").await;

    let (status, body) = post_json(
        &app,
        &format!("/api/databases/{id}/cli"),
        json!({ "command": "MONITOR" }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");
    assert!(
        body["error"].as_str().unwrap().contains("MONITOR"),
        "{body}"
    );
}

#[tokio::test]
async fn blocklist_matches_any_casing() {
    let app = test_router(test_state().await);
    let id = create_database(&app, "cli casing").await;

    for line in ["subscribe news", "Psubscribe ch*", "SYNC"] {
        let (status, body) = post_json(
            &app,
            &format!("/api/databases/{id}/cli"),
            json!({ "command": line }),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{line}: {body}");
    }
}

#[tokio::test]
async fn empty_command_is_bad_request() {
    let app = test_router(test_state().await);
    let id = create_database(&app, "cli empty").await;

    for line in ["", "   "] {
        let (status, body) = post_json(
            &app,
            &format!("/api/databases/{id}/cli"),
            json!({ "command": line }),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{line:?}: {body}");
        assert_eq!(body["error"], "empty command", "{body}");
    }
}

#[tokio::test]
async fn unbalanced_quotes_are_bad_request() {
    let app = test_router(test_state().await);
    let id = create_database(&app, "cli quotes").await;

    let (status, body) = post_json(
        &app,
        &format!("/api/databases/{id}/cli"),
        json!({ "command": "SET greeting 'unterminated" }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");
}
