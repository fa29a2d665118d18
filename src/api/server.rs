use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;

use crate::config::APP_VERSION;
use crate::error::ApiError;
use crate::features::ControlInfo;
use crate::store::AppState;

#[derive(Debug, Serialize)]
pub struct ServerInfoResponse {
    pub id: String,
    pub session_id: i64,
    pub app_version: &'static str,
    pub build_type: String,
    pub package_type: Option<String>,
    pub encryption_strategies: Vec<&'static str>,
    pub control: ControlInfo,
}

pub fn router() -> Router<AppState> {
    Router::new().route("/api/info", get(server_info))
}

async fn server_info(State(state): State<AppState>) -> Result<Json<ServerInfoResponse>, ApiError> {
    let encryption_strategies = if state.config.master_key.is_some() || state.config.dev_mode {
        vec!["PLAIN", "KEY"]
    } else {
        vec!["PLAIN"]
    };

    Ok(Json(ServerInfoResponse {
        id: state.session.anonymous_id.clone(),
        session_id: state.session.session_id,
        app_version: APP_VERSION,
        build_type: state.config.build_type.clone(),
        package_type: state.config.package_type.clone(),
        encryption_strategies,
        control: state.features.control_info(),
    }))
}
