use axum::extract::{Path, State};
use axum::routing::{patch, post};
use axum::{Json, Router};
use fred::types::Value;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ApiError;
use crate::redis::client;
use crate::redis::command;
use crate::store::AppState;
use crate::validation;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct ListKeysRequest {
    #[serde(default)]
    pub cursor: Option<String>,
    pub count: Option<i64>,
    #[serde(rename = "match")]
    pub pattern: Option<String>,
    #[serde(rename = "type")]
    pub type_filter: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct KeySummary {
    pub name: String,
    #[serde(rename = "type")]
    pub key_type: String,
    pub ttl: i64,
}

#[derive(Debug, Serialize)]
pub struct ListKeysResponse {
    pub cursor: String,
    pub total: i64,
    pub scanned: i64,
    pub keys: Vec<KeySummary>,
}

#[derive(Debug, Deserialize)]
pub struct KeyNameRequest {
    pub key_name: String,
}

#[derive(Debug, Serialize)]
pub struct KeyInfoResponse {
    pub name: String,
    #[serde(rename = "type")]
    pub key_type: String,
    pub ttl: i64,
    /// MEMORY USAGE in bytes; absent when the server does not report it.
    pub size: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct DeleteKeysRequest {
    pub key_names: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct RenameKeyRequest {
    pub key_name: String,
    pub new_key_name: String,
}

#[derive(Debug, Deserialize)]
pub struct KeyTtlRequest {
    pub key_name: String,
    /// `-1` removes the TTL.
    pub ttl: i64,
}

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/api/databases/{id}/keys",
            post(list_keys).delete(delete_keys),
        )
        .route("/api/databases/{id}/keys/info", post(key_info))
        .route("/api/databases/{id}/keys/name", patch(rename_key))
        .route("/api/databases/{id}/keys/ttl", patch(update_ttl))
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn list_keys(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(body): Json<ListKeysRequest>,
) -> Result<Json<ListKeysResponse>, ApiError> {
    let (_, redis) = client::connect(&state, &id.to_string()).await?;

    let cursor = body.cursor.unwrap_or_else(|| "0".to_string());
    let count = body.count.unwrap_or(500).clamp(1, 10_000);

    let mut args: Vec<Value> = vec![cursor.as_str().into(), "COUNT".into(), count.into()];
    if let Some(pattern) = &body.pattern {
        args.push("MATCH".into());
        args.push(pattern.as_str().into());
    }
    if let Some(type_filter) = &body.type_filter {
        args.push("TYPE".into());
        args.push(type_filter.as_str().into());
    }

    let reply = redis.exec("SCAN", args).await?;
    let (next_cursor, names) = command::into_scan_page(reply)?;

    let mut keys = Vec::with_capacity(names.len());
    for name in names {
        let name = command::to_string(&name);
        let key_type = command::to_string(
            &redis.exec("TYPE", vec![name.as_str().into()]).await?,
        );
        let ttl = command::to_i64(&redis.exec("TTL", vec![name.as_str().into()]).await?)?;
        keys.push(KeySummary {
            name,
            key_type,
            ttl,
        });
    }

    let total = command::to_i64(&redis.exec("DBSIZE", Vec::new()).await?)?;
    let scanned = i64::try_from(keys.len()).unwrap_or(i64::MAX);

    Ok(Json(ListKeysResponse {
        cursor: next_cursor,
        total,
        scanned,
        keys,
    }))
}

async fn key_info(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(body): Json<KeyNameRequest>,
) -> Result<Json<KeyInfoResponse>, ApiError> {
    validation::check_key_name(&body.key_name)?;
    let (_, redis) = client::connect(&state, &id.to_string()).await?;
    let key = body.key_name.as_str();

    let key_type = command::to_string(&redis.exec("TYPE", vec![key.into()]).await?);
    if key_type == "none" {
        return Err(ApiError::NotFound("key".into()));
    }
    let ttl = command::to_i64(&redis.exec("TTL", vec![key.into()]).await?)?;
    let size = redis
        .exec("MEMORY", vec!["USAGE".into(), key.into()])
        .await
        .ok()
        .and_then(|v| command::to_i64(&v).ok());

    Ok(Json(KeyInfoResponse {
        name: body.key_name,
        key_type,
        ttl,
        size,
    }))
}

#[tracing::instrument(skip(state, body), fields(%id), err)]
async fn delete_keys(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(body): Json<DeleteKeysRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    if body.key_names.is_empty() {
        return Err(ApiError::BadRequest("key_names must not be empty".into()));
    }
    let (_, redis) = client::connect(&state, &id.to_string()).await?;

    let args: Vec<Value> = body.key_names.iter().map(|k| k.as_str().into()).collect();
    let affected = command::to_i64(&redis.exec("DEL", args).await?)?;

    Ok(Json(serde_json::json!({ "affected": affected })))
}

#[tracing::instrument(skip(state, body), fields(%id), err)]
async fn rename_key(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(body): Json<RenameKeyRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    validation::check_key_name(&body.key_name)?;
    validation::check_key_name(&body.new_key_name)?;
    let (_, redis) = client::connect(&state, &id.to_string()).await?;

    let exists = command::to_i64(
        &redis
            .exec("EXISTS", vec![body.key_name.as_str().into()])
            .await?,
    )?;
    if exists == 0 {
        return Err(ApiError::NotFound("key".into()));
    }

    // RENAMENX answers 0 when the target name is taken.
    let renamed = command::to_i64(
        &redis
            .exec(
                "RENAMENX",
                vec![
                    body.key_name.as_str().into(),
                    body.new_key_name.as_str().into(),
                ],
            )
            .await?,
    )?;
    if renamed == 0 {
        return Err(ApiError::BadRequest(
            "a key with the new name already exists".into(),
        ));
    }

    Ok(Json(serde_json::json!({ "key_name": body.new_key_name })))
}

#[tracing::instrument(skip(state, body), fields(%id), err)]
async fn update_ttl(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(body): Json<KeyTtlRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    validation::check_key_name(&body.key_name)?;
    if body.ttl < -1 {
        return Err(ApiError::BadRequest("ttl must be -1 or a positive number".into()));
    }
    let (_, redis) = client::connect(&state, &id.to_string()).await?;
    let key = body.key_name.as_str();

    let applied = if body.ttl == -1 {
        let exists = command::to_i64(&redis.exec("EXISTS", vec![key.into()]).await?)?;
        if exists == 0 {
            return Err(ApiError::NotFound("key".into()));
        }
        redis.exec("PERSIST", vec![key.into()]).await?;
        -1
    } else {
        let set = command::to_i64(
            &redis
                .exec("EXPIRE", vec![key.into(), body.ttl.into()])
                .await?,
        )?;
        if set == 0 {
            return Err(ApiError::NotFound("key".into()));
        }
        body.ttl
    };

    Ok(Json(serde_json::json!({ "key_name": body.key_name, "ttl": applied })))
}
