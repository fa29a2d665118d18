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

#[derive(Debug, Deserialize)]
pub struct SetMembersRequest {
    pub key_name: String,
    pub members: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct GetSetMembersRequest {
    pub key_name: String,
    #[serde(default)]
    pub cursor: Option<String>,
    pub count: Option<i64>,
    #[serde(rename = "match")]
    pub pattern: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SetMembersPage {
    pub key_name: String,
    pub cursor: String,
    pub total: i64,
    pub members: Vec<String>,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/api/databases/{id}/set",
            post(create_set).put(add_members),
        )
        .route("/api/databases/{id}/set/get", post(get_members))
        .route(
            "/api/databases/{id}/set/members",
            axum::routing::delete(remove_members),
        )
}

async fn key_exists(redis: &InstanceClient, key: &str) -> Result<bool, ApiError> {
    Ok(command::to_i64(&redis.exec("EXISTS", vec![key.into()]).await?)? > 0)
}

fn member_args(key: &str, members: &[String]) -> Vec<Value> {
    let mut args: Vec<Value> = Vec::with_capacity(1 + members.len());
    args.push(key.into());
    args.extend(members.iter().map(|m| Value::from(m.as_str())));
    args
}

#[tracing::instrument(skip(state, body), fields(%id), err)]
async fn create_set(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(body): Json<SetMembersRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validation::check_key_name(&body.key_name)?;
    if body.members.is_empty() {
        return Err(ApiError::BadRequest("members must not be empty".into()));
    }
    let (_, redis) = client::connect(&state, &id.to_string()).await?;

    if key_exists(&redis, &body.key_name).await? {
        return Err(ApiError::Conflict("key already exists".into()));
    }
    redis
        .exec("SADD", member_args(&body.key_name, &body.members))
        .await?;

    Ok((StatusCode::CREATED, Json(serde_json::json!({ "key_name": body.key_name }))))
}

async fn get_members(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(body): Json<GetSetMembersRequest>,
) -> Result<Json<SetMembersPage>, ApiError> {
    validation::check_key_name(&body.key_name)?;
    let (_, redis) = client::connect(&state, &id.to_string()).await?;
    let key = body.key_name.as_str();

    if !key_exists(&redis, key).await? {
        return Err(ApiError::NotFound("key".into()));
    }

    let total = command::to_i64(&redis.exec("SCARD", vec![key.into()]).await?)?;

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

    let reply = redis.exec("SSCAN", args).await?;
    let (next_cursor, raw) = command::into_scan_page(reply)?;
    let members = raw.iter().map(command::to_string).collect();

    Ok(Json(SetMembersPage {
        key_name: body.key_name,
        cursor: next_cursor,
        total,
        members,
    }))
}

#[tracing::instrument(skip(state, body), fields(%id), err)]
async fn add_members(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(body): Json<SetMembersRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    validation::check_key_name(&body.key_name)?;
    if body.members.is_empty() {
        return Err(ApiError::BadRequest("members must not be empty".into()));
    }
    let (_, redis) = client::connect(&state, &id.to_string()).await?;

    if !key_exists(&redis, &body.key_name).await? {
        return Err(ApiError::NotFound("key".into()));
    }
    let added = command::to_i64(
        &redis
            .exec("SADD", member_args(&body.key_name, &body.members))
            .await?,
    )?;

    Ok(Json(serde_json::json!({ "added": added })))
}

#[tracing::instrument(skip(state, body), fields(%id), err)]
async fn remove_members(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(body): Json<SetMembersRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    validation::check_key_name(&body.key_name)?;
    if body.members.is_empty() {
        return Err(ApiError::BadRequest("members must not be empty".into()));
    }
    let (_, redis) = client::connect(&state, &id.to_string()).await?;

    if !key_exists(&redis, &body.key_name).await? {
        return Err(ApiError::NotFound("key".into()));
    }
    let affected = command::to_i64(
        &redis
            .exec("SREM", member_args(&body.key_name, &body.members))
            .await?,
    )?;

    Ok(Json(serde_json::json!({ "affected": affected })))
}
