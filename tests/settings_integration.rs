mod helpers;

use axum::http::StatusCode;
use serde_json::json;

use helpers::{get_json, patch_json, test_router, test_state};

#[tokio::test]
async fn defaults_match_migration_seed() {
    let app = test_router(test_state().await);

    let (status, body) = get_json(&app, "/api/settings").await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["scan_threshold"], 10_000);
    assert_eq!(body["batch_size"], 5);
    assert!(body["agreements"].is_null());
}

#[tokio::test]
async fn patch_merges_agreements() {
    let app = test_router(test_state().await);

    let (status, body) = patch_json(
        &app,
        "/api/settings",
        json!({ "agreements": { "eula": true } }),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["agreements"]["eula"], true);

    // A later patch flips one consent without resending the rest.
    let (status, body) = patch_json(
        &app,
        "/api/settings",
        json!({ "agreements": { "analytics": true } }),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["agreements"]["eula"], true);
    assert_eq!(body["agreements"]["analytics"], true);
}

#[tokio::test]
async fn patch_keeps_unmentioned_fields() {
    let app = test_router(test_state().await);

    let (_, body) = patch_json(&app, "/api/settings", json!({ "theme": "DARK" })).await;
    assert_eq!(body["theme"], "DARK");
    assert_eq!(body["scan_threshold"], 10_000);

    let (_, body) = patch_json(&app, "/api/settings", json!({ "scan_threshold": 500 })).await;
    assert_eq!(body["theme"], "DARK");
    assert_eq!(body["scan_threshold"], 500);
}

#[tokio::test]
async fn invalid_values_rejected() {
    let app = test_router(test_state().await);

    let (status, _) = patch_json(&app, "/api/settings", json!({ "scan_threshold": 0 })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = patch_json(&app, "/api/settings", json!({ "batch_size": -3 })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = patch_json(&app, "/api/settings", json!({ "agreements": "yes" })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn server_info_reports_session_identity() {
    let app = test_router(test_state().await);

    let (status, body) = get_json(&app, "/api/info").await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["id"], helpers::TEST_ANONYMOUS_ID);
    assert_eq!(body["build_type"], "test");
    assert!(body["app_version"].is_string());
    assert!(body["control"]["control_number"].is_number());
}

#[tokio::test]
async fn features_endpoint_lists_builtin_flags() {
    let app = test_router(test_state().await);

    let (status, body) = get_json(&app, "/api/features").await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let features = body["features"].as_object().unwrap();
    assert!(features.contains_key("insightsRecommendations"));
    assert!(features.contains_key("liveRecommendations"));
    assert_eq!(features["redisDataIntegration"], true);
    assert!(body["control_number"].is_number());
}
