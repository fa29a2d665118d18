use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::post;
use axum::{Json, Router};
use fred::types::Value;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ApiError;
use crate::redis::client;
use crate::redis::command;
use crate::store::AppState;
use crate::validation;

#[derive(Debug, Deserialize)]
pub struct StringValueRequest {
    pub key_name: String,
    pub value: String,
}

#[derive(Debug, Deserialize)]
pub struct KeyNameRequest {
    pub key_name: String,
}

#[derive(Debug, Serialize)]
pub struct StringValueResponse {
    pub key_name: String,
    pub value: String,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/api/databases/{id}/string",
            post(create_string).patch(update_string),
        )
        .route("/api/databases/{id}/string/get", post(get_string))
}

#[tracing::instrument(skip(state, body), fields(%id), err)]
async fn create_string(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(body): Json<StringValueRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validation::check_key_name(&body.key_name)?;
    let (_, redis) = client::connect(&state, &id.to_string()).await?;

    let reply = redis
        .exec(
            "SET",
            vec![
                body.key_name.as_str().into(),
                body.value.as_str().into(),
                "NX".into(),
            ],
        )
        .await?;
    if matches!(reply, Value::Null) {
        return Err(ApiError::Conflict("key already exists".into()));
    }

    Ok((
        StatusCode::CREATED,
        Json(StringValueResponse {
            key_name: body.key_name,
            value: body.value,
        }),
    ))
}

async fn get_string(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(body): Json<KeyNameRequest>,
) -> Result<Json<StringValueResponse>, ApiError> {
    validation::check_key_name(&body.key_name)?;
    let (_, redis) = client::connect(&state, &id.to_string()).await?;

    let reply = redis
        .exec("GET", vec![body.key_name.as_str().into()])
        .await?;
    if matches!(reply, Value::Null) {
        return Err(ApiError::NotFound("key".into()));
    }

    Ok(Json(StringValueResponse {
        key_name: body.key_name,
        value: command::to_string(&reply),
    }))
}

#[tracing::instrument(skip(state, body), fields(%id), err)]
async fn update_string(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(body): Json<StringValueRequest>,
) -> Result<Json<StringValueResponse>, ApiError> {
    validation::check_key_name(&body.key_name)?;
    let (_, redis) = client::connect(&state, &id.to_string()).await?;

    // XX so an update never creates the key behind the browser's back.
    let reply = redis
        .exec(
            "SET",
            vec![
                body.key_name.as_str().into(),
                body.value.as_str().into(),
                "XX".into(),
            ],
        )
        .await?;
    if matches!(reply, Value::Null) {
        return Err(ApiError::NotFound("key".into()));
    }

    Ok(Json(StringValueResponse {
        key_name: body.key_name,
        value: body.value,
    }))
}
