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

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamField {
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StreamEntryInput {
    /// Entry id; defaults to `*` so the server generates one.
    pub id: Option<String>,
    pub fields: Vec<StreamField>,
}

#[derive(Debug, Deserialize)]
pub struct CreateStreamRequest {
    pub key_name: String,
    pub entries: Vec<StreamEntryInput>,
}

#[derive(Debug, Deserialize)]
pub struct AddEntriesRequest {
    pub key_name: String,
    pub entries: Vec<StreamEntryInput>,
}

#[derive(Debug, Deserialize)]
pub struct GetEntriesRequest {
    pub key_name: String,
    pub start: Option<String>,
    pub end: Option<String>,
    pub count: Option<i64>,
    /// "ASC" (default, XRANGE) or "DESC" (XREVRANGE).
    pub sort_order: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct StreamEntry {
    pub id: String,
    pub fields: Vec<StreamField>,
}

#[derive(Debug, Serialize)]
pub struct GetEntriesResponse {
    pub key_name: String,
    pub total: i64,
    pub last_generated_id: String,
    pub entries: Vec<StreamEntry>,
}

#[derive(Debug, Deserialize)]
pub struct DeleteEntriesRequest {
    pub key_name: String,
    pub entries: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct ConsumerGroupInput {
    pub name: String,
    /// Last-delivered entry id; defaults to `$`.
    pub last_delivered_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateGroupsRequest {
    pub key_name: String,
    pub consumer_groups: Vec<ConsumerGroupInput>,
}

#[derive(Debug, Deserialize)]
pub struct SetGroupIdRequest {
    pub key_name: String,
    pub name: String,
    pub last_delivered_id: String,
}

#[derive(Debug, Deserialize)]
pub struct DeleteGroupsRequest {
    pub key_name: String,
    pub consumer_groups: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct GroupRequest {
    pub key_name: String,
    pub group_name: String,
}

#[derive(Debug, Deserialize)]
pub struct DeleteConsumersRequest {
    pub key_name: String,
    pub group_name: String,
    pub consumer_names: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct PendingMessagesRequest {
    pub key_name: String,
    pub group_name: String,
    pub consumer_name: Option<String>,
    pub start: Option<String>,
    pub end: Option<String>,
    pub count: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct AckRequest {
    pub key_name: String,
    pub group_name: String,
    pub entries: Vec<String>,
}

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/databases/{id}/streams", post(create_stream))
        .route(
            "/api/databases/{id}/streams/entries",
            post(add_entries).delete(delete_entries),
        )
        .route("/api/databases/{id}/streams/entries/get", post(get_entries))
        .route(
            "/api/databases/{id}/streams/consumer-groups",
            post(create_groups).delete(delete_groups).patch(set_group_id),
        )
        .route(
            "/api/databases/{id}/streams/consumer-groups/get",
            post(list_groups),
        )
        .route(
            "/api/databases/{id}/streams/consumer-groups/consumers/get",
            post(list_consumers),
        )
        .route(
            "/api/databases/{id}/streams/consumer-groups/consumers",
            axum::routing::delete(delete_consumers),
        )
        .route(
            "/api/databases/{id}/streams/consumer-groups/consumers/pending-messages/get",
            post(pending_messages),
        )
        .route(
            "/api/databases/{id}/streams/consumer-groups/consumers/pending-messages/ack",
            post(ack_pending),
        )
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

async fn key_exists(redis: &InstanceClient, key: &str) -> Result<bool, ApiError> {
    Ok(command::to_i64(&redis.exec("EXISTS", vec![key.into()]).await?)? > 0)
}

/// One XADD per entry. No atomicity across entries beyond the command
/// itself; returns the ids the server generated, in input order.
async fn xadd_entries(
    redis: &InstanceClient,
    key: &str,
    entries: &[StreamEntryInput],
) -> Result<Vec<String>, ApiError> {
    let mut ids = Vec::with_capacity(entries.len());
    for entry in entries {
        if entry.fields.is_empty() {
            return Err(ApiError::BadRequest(
                "every entry needs at least one field".into(),
            ));
        }
        let mut args: Vec<Value> = Vec::with_capacity(2 + entry.fields.len() * 2);
        args.push(key.into());
        args.push(entry.id.as_deref().unwrap_or("*").into());
        for field in &entry.fields {
            args.push(field.name.as_str().into());
            args.push(field.value.as_str().into());
        }
        let reply = redis.exec("XADD", args).await?;
        ids.push(command::to_string(&reply));
    }
    Ok(ids)
}

/// XINFO-style rows are flat field/value arrays on RESP2 and maps on
/// RESP3; normalize either into a JSON object.
fn row_to_json(row: Value) -> serde_json::Value {
    match row {
        Value::Array(items) => {
            let mut obj = serde_json::Map::new();
            let mut iter = items.into_iter();
            while let (Some(k), Some(v)) = (iter.next(), iter.next()) {
                obj.insert(command::to_string(&k), command::into_json(v));
            }
            serde_json::Value::Object(obj)
        }
        other => command::into_json(other),
    }
}

fn info_rows_to_json(reply: Value) -> Result<serde_json::Value, ApiError> {
    let rows = command::into_array(reply)?;
    Ok(serde_json::Value::Array(
        rows.into_iter().map(row_to_json).collect(),
    ))
}

fn parse_entries(reply: Value) -> Result<Vec<StreamEntry>, ApiError> {
    let rows = command::into_array(reply)?;
    let mut entries = Vec::with_capacity(rows.len());
    for row in rows {
        let mut parts = command::into_array(row)?.into_iter();
        let id = parts
            .next()
            .map(|v| command::to_string(&v))
            .ok_or_else(|| ApiError::BadRequest("malformed stream entry".into()))?;
        let flat = match parts.next() {
            Some(v) => command::into_array(v)?,
            None => Vec::new(),
        };
        let mut fields = Vec::with_capacity(flat.len() / 2);
        let mut iter = flat.into_iter();
        while let (Some(name), Some(value)) = (iter.next(), iter.next()) {
            fields.push(StreamField {
                name: command::to_string(&name),
                value: command::to_string(&value),
            });
        }
        entries.push(StreamEntry { id, fields });
    }
    Ok(entries)
}

// ---------------------------------------------------------------------------
// Entry handlers
// ---------------------------------------------------------------------------

#[tracing::instrument(skip(state, body), fields(%id), err)]
async fn create_stream(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(body): Json<CreateStreamRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validation::check_key_name(&body.key_name)?;
    if body.entries.is_empty() {
        return Err(ApiError::BadRequest("entries must not be empty".into()));
    }
    let (_, redis) = client::connect(&state, &id.to_string()).await?;

    if key_exists(&redis, &body.key_name).await? {
        return Err(ApiError::Conflict("key already exists".into()));
    }
    let ids = xadd_entries(&redis, &body.key_name, &body.entries).await?;

    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({ "key_name": body.key_name, "entry_ids": ids })),
    ))
}

#[tracing::instrument(skip(state, body), fields(%id), err)]
async fn add_entries(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(body): Json<AddEntriesRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    validation::check_key_name(&body.key_name)?;
    if body.entries.is_empty() {
        return Err(ApiError::BadRequest("entries must not be empty".into()));
    }
    let (_, redis) = client::connect(&state, &id.to_string()).await?;

    if !key_exists(&redis, &body.key_name).await? {
        return Err(ApiError::NotFound("key".into()));
    }
    let ids = xadd_entries(&redis, &body.key_name, &body.entries).await?;

    Ok(Json(serde_json::json!({ "key_name": body.key_name, "entry_ids": ids })))
}

async fn get_entries(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(body): Json<GetEntriesRequest>,
) -> Result<Json<GetEntriesResponse>, ApiError> {
    validation::check_key_name(&body.key_name)?;
    let (_, redis) = client::connect(&state, &id.to_string()).await?;
    let key = body.key_name.as_str();

    if !key_exists(&redis, key).await? {
        return Err(ApiError::NotFound("key".into()));
    }

    let total = command::to_i64(&redis.exec("XLEN", vec![key.into()]).await?)?;

    let info = row_to_json(redis.exec("XINFO", vec!["STREAM".into(), key.into()]).await?);
    let last_generated_id = info
        .get("last-generated-id")
        .and_then(serde_json::Value::as_str)
        .unwrap_or("0-0")
        .to_owned();

    let desc = body
        .sort_order
        .as_deref()
        .is_some_and(|s| s.eq_ignore_ascii_case("DESC"));
    let count = body.count.unwrap_or(500).clamp(1, 10_000);
    let (cmd, first, second) = if desc {
        (
            "XREVRANGE",
            body.end.as_deref().unwrap_or("+"),
            body.start.as_deref().unwrap_or("-"),
        )
    } else {
        (
            "XRANGE",
            body.start.as_deref().unwrap_or("-"),
            body.end.as_deref().unwrap_or("+"),
        )
    };

    let reply = redis
        .exec(
            cmd,
            vec![
                key.into(),
                first.into(),
                second.into(),
                "COUNT".into(),
                count.into(),
            ],
        )
        .await?;
    let entries = parse_entries(reply)?;

    Ok(Json(GetEntriesResponse {
        key_name: body.key_name,
        total,
        last_generated_id,
        entries,
    }))
}

#[tracing::instrument(skip(state, body), fields(%id), err)]
async fn delete_entries(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(body): Json<DeleteEntriesRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    validation::check_key_name(&body.key_name)?;
    if body.entries.is_empty() {
        return Err(ApiError::BadRequest("entries must not be empty".into()));
    }
    let (_, redis) = client::connect(&state, &id.to_string()).await?;

    if !key_exists(&redis, &body.key_name).await? {
        return Err(ApiError::NotFound("key".into()));
    }

    let mut args: Vec<Value> = Vec::with_capacity(1 + body.entries.len());
    args.push(body.key_name.as_str().into());
    args.extend(body.entries.iter().map(|e| Value::from(e.as_str())));
    let affected = command::to_i64(&redis.exec("XDEL", args).await?)?;

    Ok(Json(serde_json::json!({ "affected": affected })))
}

// ---------------------------------------------------------------------------
// Consumer group handlers
// ---------------------------------------------------------------------------

async fn list_groups(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(body): Json<crate::api::keys::KeyNameRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    validation::check_key_name(&body.key_name)?;
    let (_, redis) = client::connect(&state, &id.to_string()).await?;

    if !key_exists(&redis, &body.key_name).await? {
        return Err(ApiError::NotFound("key".into()));
    }

    let reply = redis
        .exec("XINFO", vec!["GROUPS".into(), body.key_name.as_str().into()])
        .await?;
    Ok(Json(info_rows_to_json(reply)?))
}

#[tracing::instrument(skip(state, body), fields(%id), err)]
async fn create_groups(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(body): Json<CreateGroupsRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validation::check_key_name(&body.key_name)?;
    if body.consumer_groups.is_empty() {
        return Err(ApiError::BadRequest("consumer_groups must not be empty".into()));
    }
    let (_, redis) = client::connect(&state, &id.to_string()).await?;

    if !key_exists(&redis, &body.key_name).await? {
        return Err(ApiError::NotFound("key".into()));
    }

    for group in &body.consumer_groups {
        redis
            .exec(
                "XGROUP",
                vec![
                    "CREATE".into(),
                    body.key_name.as_str().into(),
                    group.name.as_str().into(),
                    group.last_delivered_id.as_deref().unwrap_or("$").into(),
                ],
            )
            .await?;
    }

    Ok((StatusCode::CREATED, Json(serde_json::json!({ "key_name": body.key_name }))))
}

#[tracing::instrument(skip(state, body), fields(%id), err)]
async fn set_group_id(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(body): Json<SetGroupIdRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    validation::check_key_name(&body.key_name)?;
    let (_, redis) = client::connect(&state, &id.to_string()).await?;

    redis
        .exec(
            "XGROUP",
            vec![
                "SETID".into(),
                body.key_name.as_str().into(),
                body.name.as_str().into(),
                body.last_delivered_id.as_str().into(),
            ],
        )
        .await?;

    Ok(Json(serde_json::json!({
        "key_name": body.key_name,
        "name": body.name,
        "last_delivered_id": body.last_delivered_id,
    })))
}

#[tracing::instrument(skip(state, body), fields(%id), err)]
async fn delete_groups(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(body): Json<DeleteGroupsRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    validation::check_key_name(&body.key_name)?;
    if body.consumer_groups.is_empty() {
        return Err(ApiError::BadRequest("consumer_groups must not be empty".into()));
    }
    let (_, redis) = client::connect(&state, &id.to_string()).await?;

    let mut affected = 0i64;
    for name in &body.consumer_groups {
        affected += command::to_i64(
            &redis
                .exec(
                    "XGROUP",
                    vec![
                        "DESTROY".into(),
                        body.key_name.as_str().into(),
                        name.as_str().into(),
                    ],
                )
                .await?,
        )?;
    }

    Ok(Json(serde_json::json!({ "affected": affected })))
}

async fn list_consumers(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(body): Json<GroupRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    validation::check_key_name(&body.key_name)?;
    let (_, redis) = client::connect(&state, &id.to_string()).await?;

    let reply = redis
        .exec(
            "XINFO",
            vec![
                "CONSUMERS".into(),
                body.key_name.as_str().into(),
                body.group_name.as_str().into(),
            ],
        )
        .await?;
    Ok(Json(info_rows_to_json(reply)?))
}

#[tracing::instrument(skip(state, body), fields(%id), err)]
async fn delete_consumers(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(body): Json<DeleteConsumersRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    validation::check_key_name(&body.key_name)?;
    if body.consumer_names.is_empty() {
        return Err(ApiError::BadRequest("consumer_names must not be empty".into()));
    }
    let (_, redis) = client::connect(&state, &id.to_string()).await?;

    for consumer in &body.consumer_names {
        redis
            .exec(
                "XGROUP",
                vec![
                    "DELCONSUMER".into(),
                    body.key_name.as_str().into(),
                    body.group_name.as_str().into(),
                    consumer.as_str().into(),
                ],
            )
            .await?;
    }

    Ok(Json(serde_json::json!({ "key_name": body.key_name })))
}

async fn pending_messages(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(body): Json<PendingMessagesRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    validation::check_key_name(&body.key_name)?;
    let (_, redis) = client::connect(&state, &id.to_string()).await?;

    let count = body.count.unwrap_or(500).clamp(1, 10_000);
    let mut args: Vec<Value> = vec![
        body.key_name.as_str().into(),
        body.group_name.as_str().into(),
        body.start.as_deref().unwrap_or("-").into(),
        body.end.as_deref().unwrap_or("+").into(),
        count.into(),
    ];
    if let Some(consumer) = &body.consumer_name {
        args.push(consumer.as_str().into());
    }

    let reply = redis.exec("XPENDING", args).await?;
    Ok(Json(command::into_json(reply)))
}

#[tracing::instrument(skip(state, body), fields(%id), err)]
async fn ack_pending(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(body): Json<AckRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    validation::check_key_name(&body.key_name)?;
    if body.entries.is_empty() {
        return Err(ApiError::BadRequest("entries must not be empty".into()));
    }
    let (_, redis) = client::connect(&state, &id.to_string()).await?;

    let mut args: Vec<Value> = Vec::with_capacity(2 + body.entries.len());
    args.push(body.key_name.as_str().into());
    args.push(body.group_name.as_str().into());
    args.extend(body.entries.iter().map(|e| Value::from(e.as_str())));
    let affected = command::to_i64(&redis.exec("XACK", args).await?)?;

    Ok(Json(serde_json::json!({ "affected": affected })))
}
