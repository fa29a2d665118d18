use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;

use crate::error::ApiError;
use crate::store::AppState;
use crate::store::settings::{self, AppSettings};

#[derive(Debug, Default, Deserialize)]
pub struct UpdateSettingsRequest {
    pub agreements: Option<serde_json::Value>,
    pub scan_threshold: Option<i64>,
    pub batch_size: Option<i64>,
    pub theme: Option<String>,
}

pub fn router() -> Router<AppState> {
    Router::new().route("/api/settings", get(get_settings).patch(update_settings))
}

async fn get_settings(State(state): State<AppState>) -> Result<Json<AppSettings>, ApiError> {
    Ok(Json(settings::get_settings(&state.pool).await?))
}

#[tracing::instrument(skip(state, body), err)]
async fn update_settings(
    State(state): State<AppState>,
    Json(body): Json<UpdateSettingsRequest>,
) -> Result<Json<AppSettings>, ApiError> {
    if let Some(threshold) = body.scan_threshold
        && threshold < 1
    {
        return Err(ApiError::BadRequest(
            "scan_threshold must be a positive number".into(),
        ));
    }
    if let Some(batch) = body.batch_size
        && batch < 1
    {
        return Err(ApiError::BadRequest(
            "batch_size must be a positive number".into(),
        ));
    }
    if let Some(agreements) = &body.agreements
        && !agreements.is_object()
    {
        return Err(ApiError::BadRequest("agreements must be an object".into()));
    }

    // Agreements merge at the top level so a patch can flip one consent
    // without resending the rest.
    let agreements = match &body.agreements {
        None => None,
        Some(incoming) => {
            let mut merged = settings::get_settings(&state.pool)
                .await?
                .agreements
                .and_then(|v| v.as_object().cloned())
                .unwrap_or_default();
            if let Some(incoming) = incoming.as_object() {
                for (k, v) in incoming {
                    merged.insert(k.clone(), v.clone());
                }
            }
            Some(serde_json::Value::Object(merged).to_string())
        }
    };

    sqlx::query(
        r"
        UPDATE settings SET
            agreements = COALESCE(?, agreements),
            scan_threshold = COALESCE(?, scan_threshold),
            batch_size = COALESCE(?, batch_size),
            theme = COALESCE(?, theme)
        WHERE id = 1
        ",
    )
    .bind(&agreements)
    .bind(body.scan_threshold)
    .bind(body.batch_size)
    .bind(&body.theme)
    .execute(&state.pool)
    .await?;

    Ok(Json(settings::get_settings(&state.pool).await?))
}
