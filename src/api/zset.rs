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
pub struct ZSetMember {
    pub name: String,
    pub score: f64,
}

#[derive(Debug, Deserialize)]
pub struct ZSetMembersRequest {
    pub key_name: String,
    pub members: Vec<ZSetMember>,
}

#[derive(Debug, Deserialize)]
pub struct GetZSetMembersRequest {
    pub key_name: String,
    pub offset: Option<i64>,
    pub count: Option<i64>,
    /// "ASC" (default) or "DESC" by score.
    pub sort_order: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ZSetMembersPage {
    pub key_name: String,
    pub total: i64,
    pub members: Vec<ZSetMember>,
}

#[derive(Debug, Deserialize)]
pub struct RemoveZSetMembersRequest {
    pub key_name: String,
    pub members: Vec<String>,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/api/databases/{id}/zset",
            post(create_zset).put(upsert_members),
        )
        .route("/api/databases/{id}/zset/get", post(get_members))
        .route(
            "/api/databases/{id}/zset/members",
            axum::routing::delete(remove_members),
        )
}

async fn key_exists(redis: &InstanceClient, key: &str) -> Result<bool, ApiError> {
    Ok(command::to_i64(&redis.exec("EXISTS", vec![key.into()]).await?)? > 0)
}

fn zadd_args(key: &str, members: &[ZSetMember]) -> Vec<Value> {
    let mut args: Vec<Value> = Vec::with_capacity(1 + members.len() * 2);
    args.push(key.into());
    for m in members {
        args.push(m.score.to_string().as_str().into());
        args.push(m.name.as_str().into());
    }
    args
}

#[tracing::instrument(skip(state, body), fields(%id), err)]
async fn create_zset(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(body): Json<ZSetMembersRequest>,
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
        .exec("ZADD", zadd_args(&body.key_name, &body.members))
        .await?;

    Ok((StatusCode::CREATED, Json(serde_json::json!({ "key_name": body.key_name }))))
}

async fn get_members(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(body): Json<GetZSetMembersRequest>,
) -> Result<Json<ZSetMembersPage>, ApiError> {
    validation::check_key_name(&body.key_name)?;
    let (_, redis) = client::connect(&state, &id.to_string()).await?;
    let key = body.key_name.as_str();

    if !key_exists(&redis, key).await? {
        return Err(ApiError::NotFound("key".into()));
    }

    let total = command::to_i64(&redis.exec("ZCARD", vec![key.into()]).await?)?;

    let offset = body.offset.unwrap_or(0).max(0);
    let count = body.count.unwrap_or(500).clamp(1, 10_000);
    let start = offset;
    let stop = offset + count - 1;

    let desc = body
        .sort_order
        .as_deref()
        .is_some_and(|s| s.eq_ignore_ascii_case("DESC"));
    let cmd = if desc { "ZREVRANGE" } else { "ZRANGE" };

    let reply = redis
        .exec(
            cmd,
            vec![
                key.into(),
                start.into(),
                stop.into(),
                "WITHSCORES".into(),
            ],
        )
        .await?;
    let flat = command::into_array(reply)?;

    let mut members = Vec::with_capacity(flat.len() / 2);
    let mut iter = flat.into_iter();
    while let (Some(name), Some(score)) = (iter.next(), iter.next()) {
        let score = command::to_string(&score)
            .parse::<f64>()
            .map_err(|e| ApiError::BadRequest(format!("unexpected score in reply: {e}")))?;
        members.push(ZSetMember {
            name: command::to_string(&name),
            score,
        });
    }

    Ok(Json(ZSetMembersPage {
        key_name: body.key_name,
        total,
        members,
    }))
}

#[tracing::instrument(skip(state, body), fields(%id), err)]
async fn upsert_members(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(body): Json<ZSetMembersRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    validation::check_key_name(&body.key_name)?;
    if body.members.is_empty() {
        return Err(ApiError::BadRequest("members must not be empty".into()));
    }
    let (_, redis) = client::connect(&state, &id.to_string()).await?;

    if !key_exists(&redis, &body.key_name).await? {
        return Err(ApiError::NotFound("key".into()));
    }
    redis
        .exec("ZADD", zadd_args(&body.key_name, &body.members))
        .await?;

    Ok(Json(serde_json::json!({ "key_name": body.key_name })))
}

#[tracing::instrument(skip(state, body), fields(%id), err)]
async fn remove_members(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(body): Json<RemoveZSetMembersRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    validation::check_key_name(&body.key_name)?;
    if body.members.is_empty() {
        return Err(ApiError::BadRequest("members must not be empty".into()));
    }
    let (_, redis) = client::connect(&state, &id.to_string()).await?;

    if !key_exists(&redis, &body.key_name).await? {
        return Err(ApiError::NotFound("key".into()));
    }

    let mut args: Vec<Value> = Vec::with_capacity(1 + body.members.len());
    args.push(body.key_name.as_str().into());
    args.extend(body.members.iter().map(|m| Value::from(m.as_str())));
    let affected = command::to_i64(&redis.exec("ZREM", args).await?)?;

    Ok(Json(serde_json::json!({ "affected": affected })))
}
