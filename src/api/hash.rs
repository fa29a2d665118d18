use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::post;
use axum::{Json, Router};
use fred::types::Value;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ApiError;
use crate::redis::client::{self, InstanceClient};
use crate::redis::command;
use crate::store::AppState;
use crate::validation;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HashField {
    pub field: String,
    pub value: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateHashRequest {
    pub key_name: String,
    pub fields: Vec<HashField>,
}

#[derive(Debug, Deserialize)]
pub struct GetHashFieldsRequest {
    pub key_name: String,
    #[serde(default)]
    pub cursor: Option<String>,
    pub count: Option<i64>,
    #[serde(rename = "match")]
    pub pattern: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct HashFieldsPage {
    pub key_name: String,
    pub cursor: String,
    pub total: i64,
    pub fields: Vec<HashField>,
}

#[derive(Debug, Deserialize)]
pub struct DeleteHashFieldsRequest {
    pub key_name: String,
    pub fields: Vec<String>,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/api/databases/{id}/hash",
            post(create_hash).put(upsert_fields),
        )
        .route("/api/databases/{id}/hash/get", post(get_fields))
        .route(
            "/api/databases/{id}/hash/fields",
            axum::routing::delete(delete_fields),
        )
}

async fn key_exists(redis: &InstanceClient, key: &str) -> Result<bool, ApiError> {
    Ok(command::to_i64(&redis.exec("EXISTS", vec![key.into()]).await?)? > 0)
}

fn hset_args(key: &str, fields: &[HashField]) -> Vec<Value> {
    let mut args: Vec<Value> = Vec::with_capacity(1 + fields.len() * 2);
    args.push(key.into());
    for f in fields {
        args.push(f.field.as_str().into());
        args.push(f.value.as_str().into());
    }
    args
}

#[tracing::instrument(skip(state, body), fields(%id), err)]
async fn create_hash(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(body): Json<CreateHashRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validation::check_key_name(&body.key_name)?;
    if body.fields.is_empty() {
        return Err(ApiError::BadRequest("fields must not be empty".into()));
    }
    let (_, redis) = client::connect(&state, &id.to_string()).await?;

    if key_exists(&redis, &body.key_name).await? {
        return Err(ApiError::Conflict("key already exists".into()));
    }
    redis
        .exec("HSET", hset_args(&body.key_name, &body.fields))
        .await?;

    Ok((StatusCode::CREATED, Json(serde_json::json!({ "key_name": body.key_name }))))
}

async fn get_fields(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(body): Json<GetHashFieldsRequest>,
) -> Result<Json<HashFieldsPage>, ApiError> {
    validation::check_key_name(&body.key_name)?;
    let (_, redis) = client::connect(&state, &id.to_string()).await?;
    let key = body.key_name.as_str();

    if !key_exists(&redis, key).await? {
        return Err(ApiError::NotFound("key".into()));
    }

    let total = command::to_i64(&redis.exec("HLEN", vec![key.into()]).await?)?;

    let cursor = body.cursor.unwrap_or_else(|| "0".to_string());
    let count = body.count.unwrap_or(500).clamp(1, 10_000);
    let mut args: Vec<Value> = vec![
        key.into(),
        cursor.as_str().into(),
        "COUNT".into(),
        count.into(),
    ];
    if let Some(pattern) = &body.pattern {
        args.push("MATCH".into());
        args.push(pattern.as_str().into());
    }

    let reply = redis.exec("HSCAN", args).await?;
    let (next_cursor, flat) = command::into_scan_page(reply)?;

    let mut fields = Vec::with_capacity(flat.len() / 2);
    let mut iter = flat.into_iter();
    while let (Some(field), Some(value)) = (iter.next(), iter.next()) {
        fields.push(HashField {
            field: command::to_string(&field),
            value: command::to_string(&value),
        });
    }

    Ok(Json(HashFieldsPage {
        key_name: body.key_name,
        cursor: next_cursor,
        total,
        fields,
    }))
}

#[tracing::instrument(skip(state, body), fields(%id), err)]
async fn upsert_fields(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(body): Json<CreateHashRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    validation::check_key_name(&body.key_name)?;
    if body.fields.is_empty() {
        return Err(ApiError::BadRequest("fields must not be empty".into()));
    }
    let (_, redis) = client::connect(&state, &id.to_string()).await?;

    if !key_exists(&redis, &body.key_name).await? {
        return Err(ApiError::NotFound("key".into()));
    }
    redis
        .exec("HSET", hset_args(&body.key_name, &body.fields))
        .await?;

    Ok(Json(serde_json::json!({ "key_name": body.key_name })))
}

#[tracing::instrument(skip(state, body), fields(%id), err)]
async fn delete_fields(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(body): Json<DeleteHashFieldsRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    validation::check_key_name(&body.key_name)?;
    if body.fields.is_empty() {
        return Err(ApiError::BadRequest("fields must not be empty".into()));
    }
    let (_, redis) = client::connect(&state, &id.to_string()).await?;

    if !key_exists(&redis, &body.key_name).await? {
        return Err(ApiError::NotFound("key".into()));
    }

    let mut args: Vec<Value> = Vec::with_capacity(1 + body.fields.len());
    args.push(body.key_name.as_str().into());
    args.extend(body.fields.iter().map(|f| Value::from(f.as_str())));
    let affected = command::to_i64(&redis.exec("HDEL", args).await?)?;

    Ok(Json(serde_json::json!({ "affected": affected })))
}
