use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};

use crate::error::ApiError;
use crate::store::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/api/features", get(list_features))
}

async fn list_features(State(state): State<AppState>) -> Result<Json<serde_json::Value>, ApiError> {
    let control = state.features.control_info();
    Ok(Json(serde_json::json!({
        "features": state.features.evaluate_all(),
        "control_number": control.control_number,
        "control_group": control.control_group,
    })))
}
