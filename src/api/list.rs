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

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ListEnd {
    Head,
    Tail,
}

#[derive(Debug, Deserialize)]
pub struct CreateListRequest {
    pub key_name: String,
    pub elements: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct GetListElementsRequest {
    pub key_name: String,
    pub offset: Option<i64>,
    pub count: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct ListElementsPage {
    pub key_name: String,
    pub total: i64,
    pub elements: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct PushElementsRequest {
    pub key_name: String,
    pub elements: Vec<String>,
    pub destination: ListEnd,
}

#[derive(Debug, Deserialize)]
pub struct SetElementRequest {
    pub key_name: String,
    pub index: i64,
    pub element: String,
}

#[derive(Debug, Deserialize)]
pub struct PopElementsRequest {
    pub key_name: String,
    pub count: Option<i64>,
    pub destination: ListEnd,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/api/databases/{id}/list",
            post(create_list).put(push_elements).patch(set_element),
        )
        .route("/api/databases/{id}/list/get", post(get_elements))
        .route(
            "/api/databases/{id}/list/elements",
            axum::routing::delete(pop_elements),
        )
}

async fn key_exists(redis: &InstanceClient, key: &str) -> Result<bool, ApiError> {
    Ok(command::to_i64(&redis.exec("EXISTS", vec![key.into()]).await?)? > 0)
}

fn push_args(key: &str, elements: &[String]) -> Vec<Value> {
    let mut args: Vec<Value> = Vec::with_capacity(1 + elements.len());
    args.push(key.into());
    args.extend(elements.iter().map(|e| Value::from(e.as_str())));
    args
}

#[tracing::instrument(skip(state, body), fields(%id), err)]
async fn create_list(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(body): Json<CreateListRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validation::check_key_name(&body.key_name)?;
    if body.elements.is_empty() {
        return Err(ApiError::BadRequest("elements must not be empty".into()));
    }
    let (_, redis) = client::connect(&state, &id.to_string()).await?;

    if key_exists(&redis, &body.key_name).await? {
        return Err(ApiError::Conflict("key already exists".into()));
    }
    redis
        .exec("RPUSH", push_args(&body.key_name, &body.elements))
        .await?;

    Ok((StatusCode::CREATED, Json(serde_json::json!({ "key_name": body.key_name }))))
}

async fn get_elements(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(body): Json<GetListElementsRequest>,
) -> Result<Json<ListElementsPage>, ApiError> {
    validation::check_key_name(&body.key_name)?;
    let (_, redis) = client::connect(&state, &id.to_string()).await?;
    let key = body.key_name.as_str();

    if !key_exists(&redis, key).await? {
        return Err(ApiError::NotFound("key".into()));
    }

    let total = command::to_i64(&redis.exec("LLEN", vec![key.into()]).await?)?;

    let offset = body.offset.unwrap_or(0).max(0);
    let count = body.count.unwrap_or(500).clamp(1, 10_000);
    let reply = redis
        .exec(
            "LRANGE",
            vec![key.into(), offset.into(), (offset + count - 1).into()],
        )
        .await?;
    let elements = command::into_array(reply)?
        .iter()
        .map(command::to_string)
        .collect();

    Ok(Json(ListElementsPage {
        key_name: body.key_name,
        total,
        elements,
    }))
}

#[tracing::instrument(skip(state, body), fields(%id), err)]
async fn push_elements(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(body): Json<PushElementsRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    validation::check_key_name(&body.key_name)?;
    if body.elements.is_empty() {
        return Err(ApiError::BadRequest("elements must not be empty".into()));
    }
    let (_, redis) = client::connect(&state, &id.to_string()).await?;

    if !key_exists(&redis, &body.key_name).await? {
        return Err(ApiError::NotFound("key".into()));
    }

    let cmd = match body.destination {
        ListEnd::Head => "LPUSH",
        ListEnd::Tail => "RPUSH",
    };
    let total = command::to_i64(
        &redis
            .exec(cmd, push_args(&body.key_name, &body.elements))
            .await?,
    )?;

    Ok(Json(serde_json::json!({ "key_name": body.key_name, "total": total })))
}

#[tracing::instrument(skip(state, body), fields(%id), err)]
async fn set_element(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(body): Json<SetElementRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    validation::check_key_name(&body.key_name)?;
    let (_, redis) = client::connect(&state, &id.to_string()).await?;

    if !key_exists(&redis, &body.key_name).await? {
        return Err(ApiError::NotFound("key".into()));
    }

    // An out-of-range index surfaces as the server's error message (400).
    redis
        .exec(
            "LSET",
            vec![
                body.key_name.as_str().into(),
                body.index.into(),
                body.element.as_str().into(),
            ],
        )
        .await?;

    Ok(Json(serde_json::json!({ "key_name": body.key_name, "index": body.index })))
}

#[tracing::instrument(skip(state, body), fields(%id), err)]
async fn pop_elements(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(body): Json<PopElementsRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    validation::check_key_name(&body.key_name)?;
    let (_, redis) = client::connect(&state, &id.to_string()).await?;

    if !key_exists(&redis, &body.key_name).await? {
        return Err(ApiError::NotFound("key".into()));
    }

    let count = body.count.unwrap_or(1).clamp(1, 10_000);
    let cmd = match body.destination {
        ListEnd::Head => "LPOP",
        ListEnd::Tail => "RPOP",
    };
    let reply = redis
        .exec(cmd, vec![body.key_name.as_str().into(), count.into()])
        .await?;

    let elements: Vec<String> = match reply {
        Value::Null => Vec::new(),
        other => command::into_array(other)?
            .iter()
            .map(command::to_string)
            .collect(),
    };

    Ok(Json(serde_json::json!({ "key_name": body.key_name, "elements": elements })))
}
