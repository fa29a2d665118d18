use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ApiError;
use crate::rdi::client::RdiClient;
use crate::rdi::{self, Pipeline, RdiInstance};
use crate::store::AppState;
use crate::telemetry::events;
use crate::validation;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct CreateRdiRequest {
    pub name: String,
    pub url: String,
    pub username: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateRdiRequest {
    pub name: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct DeleteRdiRequest {
    pub ids: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct RdiResponse {
    pub id: String,
    pub name: String,
    pub url: String,
    pub username: Option<String>,
    pub version: Option<String>,
    pub last_deployment: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl From<RdiInstance> for RdiResponse {
    fn from(instance: RdiInstance) -> Self {
        Self {
            id: instance.id,
            name: instance.name,
            url: instance.url,
            username: instance.username,
            version: instance.version,
            last_deployment: instance.last_deployment,
            created_at: instance.created_at,
        }
    }
}

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/rdi", get(list_rdi).post(create_rdi).delete(delete_many))
        .route("/api/rdi/{id}", get(get_rdi).patch(update_rdi).delete(delete_rdi))
        .route("/api/rdi/{id}/connect", get(connect_rdi))
        .route("/api/rdi/{id}/pipeline", get(get_pipeline))
        .route("/api/rdi/{id}/pipeline/deploy", post(deploy_pipeline))
        .route("/api/rdi/{id}/pipeline/status", get(pipeline_status))
        .route("/api/rdi/{id}/pipeline/strategies", get(strategies))
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

async fn client_for(state: &AppState, id: &str) -> Result<(RdiInstance, RdiClient), ApiError> {
    let instance = rdi::get_rdi(&state.pool, id).await?;
    let password = state
        .encryption
        .decrypt_opt(instance.password.as_deref())
        .map_err(ApiError::Internal)?;
    let client = RdiClient::new(&instance.url, instance.username.clone(), password)?;
    Ok((instance, client))
}

// ---------------------------------------------------------------------------
// CRUD handlers
// ---------------------------------------------------------------------------

async fn list_rdi(State(state): State<AppState>) -> Result<Json<Vec<RdiResponse>>, ApiError> {
    let rows =
        sqlx::query_as::<_, RdiInstance>("SELECT * FROM rdi_instance ORDER BY created_at DESC")
            .fetch_all(&state.pool)
            .await?;
    Ok(Json(rows.into_iter().map(RdiResponse::from).collect()))
}

#[tracing::instrument(skip(state, body), fields(name = %body.name), err)]
async fn create_rdi(
    State(state): State<AppState>,
    Json(body): Json<CreateRdiRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validation::check_display_name(&body.name)?;
    validation::check_url(&body.url)?;

    // Reject unreachable endpoints up front; a profile that never worked
    // is not worth storing.
    let client = RdiClient::new(&body.url, body.username.clone(), body.password.clone())?;
    client.test().await?;
    // Informational only; older remotes do not expose the endpoint.
    let version = client.version().await.ok().flatten();

    let password = state
        .encryption
        .encrypt_opt(body.password.as_deref())
        .map_err(ApiError::Internal)?;
    let id = Uuid::new_v4().to_string();

    sqlx::query(
        r"
        INSERT INTO rdi_instance (id, name, url, username, password, version, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        ",
    )
    .bind(&id)
    .bind(&body.name)
    .bind(&body.url)
    .bind(&body.username)
    .bind(&password)
    .bind(&version)
    .bind(Utc::now())
    .execute(&state.pool)
    .await?;

    let instance = rdi::get_rdi(&state.pool, &id).await?;
    Ok((StatusCode::CREATED, Json(RdiResponse::from(instance))))
}

async fn get_rdi(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<RdiResponse>, ApiError> {
    let instance = rdi::get_rdi(&state.pool, &id.to_string()).await?;
    Ok(Json(RdiResponse::from(instance)))
}

#[tracing::instrument(skip(state, body), fields(%id), err)]
async fn update_rdi(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(body): Json<UpdateRdiRequest>,
) -> Result<Json<RdiResponse>, ApiError> {
    let id = id.to_string();
    rdi::get_rdi(&state.pool, &id).await?;

    if let Some(name) = &body.name {
        validation::check_display_name(name)?;
    }
    let password = state
        .encryption
        .encrypt_opt(body.password.as_deref())
        .map_err(ApiError::Internal)?;

    sqlx::query(
        r"
        UPDATE rdi_instance SET
            name = COALESCE(?, name),
            username = COALESCE(?, username),
            password = COALESCE(?, password)
        WHERE id = ?
        ",
    )
    .bind(&body.name)
    .bind(&body.username)
    .bind(&password)
    .bind(&id)
    .execute(&state.pool)
    .await?;

    let instance = rdi::get_rdi(&state.pool, &id).await?;
    Ok(Json(RdiResponse::from(instance)))
}

#[tracing::instrument(skip(state), fields(%id), err)]
async fn delete_rdi(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let result = sqlx::query("DELETE FROM rdi_instance WHERE id = ?")
        .bind(id.to_string())
        .execute(&state.pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(ApiError::NotFound("rdi instance".into()));
    }
    Ok(Json(serde_json::json!({ "ok": true })))
}

#[tracing::instrument(skip(state, body), err)]
async fn delete_many(
    State(state): State<AppState>,
    Json(body): Json<DeleteRdiRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    if body.ids.is_empty() {
        return Err(ApiError::BadRequest("ids must not be empty".into()));
    }
    let mut affected = 0u64;
    for id in &body.ids {
        let result = sqlx::query("DELETE FROM rdi_instance WHERE id = ?")
            .bind(id)
            .execute(&state.pool)
            .await?;
        affected += result.rows_affected();
    }
    Ok(Json(serde_json::json!({ "affected": affected })))
}

// ---------------------------------------------------------------------------
// Pipeline proxy handlers
// ---------------------------------------------------------------------------

async fn connect_rdi(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let id = id.to_string();
    let (_, client) = client_for(&state, &id).await?;
    client.test().await?;

    // Refresh the stored version while we hold a working session.
    if let Ok(Some(version)) = client.version().await {
        sqlx::query("UPDATE rdi_instance SET version = ? WHERE id = ?")
            .bind(&version)
            .bind(&id)
            .execute(&state.pool)
            .await?;
    }

    Ok(Json(serde_json::json!({ "ok": true })))
}

async fn get_pipeline(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Pipeline>, ApiError> {
    let (_, client) = client_for(&state, &id.to_string()).await?;
    Ok(Json(client.get_pipeline().await?))
}

#[tracing::instrument(skip(state, body), fields(%id), err)]
async fn deploy_pipeline(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(body): Json<Pipeline>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let id = id.to_string();
    rdi::validate_pipeline(&body)?;

    let (_, client) = client_for(&state, &id).await?;
    client.deploy_pipeline(&body).await?;

    sqlx::query("UPDATE rdi_instance SET last_deployment = ? WHERE id = ?")
        .bind(Utc::now())
        .bind(&id)
        .execute(&state.pool)
        .await?;

    state.telemetry.track(
        events::RDI_PIPELINE_DEPLOYED,
        serde_json::json!({ "jobs": body.jobs.len() }),
    );

    Ok(Json(serde_json::json!({ "ok": true })))
}

async fn pipeline_status(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let (_, client) = client_for(&state, &id.to_string()).await?;
    Ok(Json(client.pipeline_status().await?))
}

async fn strategies(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let (_, client) = client_for(&state, &id.to_string()).await?;
    Ok(Json(client.strategies().await?))
}
