use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::error::ApiError;
use crate::store::AppState;
use crate::validation;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// List and get shape for both certificate kinds: name only, never the
/// PEM material.
#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct CertificateSummary {
    pub id: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct CreateCaCertRequest {
    pub name: String,
    pub certificate: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateClientCertRequest {
    pub name: String,
    pub certificate: String,
    pub key: String,
}

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/api/certificates/ca",
            get(list_ca_certs).post(create_ca_cert_handler),
        )
        .route(
            "/api/certificates/ca/{id}",
            get(get_ca_cert).delete(delete_ca_cert),
        )
        .route(
            "/api/certificates/client",
            get(list_client_certs).post(create_client_cert_handler),
        )
        .route(
            "/api/certificates/client/{id}",
            get(get_client_cert).delete(delete_client_cert),
        )
}

// ---------------------------------------------------------------------------
// Shared with the database handlers (inline certificate creation)
// ---------------------------------------------------------------------------

pub async fn ca_cert_exists(pool: &SqlitePool, id: &str) -> Result<(), ApiError> {
    let row: Option<(String,)> = sqlx::query_as("SELECT id FROM ca_certificate WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?;
    row.map(|_| ())
        .ok_or_else(|| ApiError::NotFound("ca certificate".into()))
}

pub async fn client_cert_exists(pool: &SqlitePool, id: &str) -> Result<(), ApiError> {
    let row: Option<(String,)> = sqlx::query_as("SELECT id FROM client_certificate WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?;
    row.map(|_| ())
        .ok_or_else(|| ApiError::NotFound("client certificate".into()))
}

/// Create a CA certificate, encrypting the PEM body. A duplicate name is a
/// 400 rather than a 409: inline creation happens inside database create
/// and clone requests, where the caller sent bad input.
pub async fn create_ca_cert(
    state: &AppState,
    name: &str,
    certificate: &str,
) -> Result<String, ApiError> {
    validation::check_display_name(name)?;
    validation::check_certificate_pem("certificate", certificate)?;

    let taken: Option<(String,)> = sqlx::query_as("SELECT id FROM ca_certificate WHERE name = ?")
        .bind(name)
        .fetch_optional(&state.pool)
        .await?;
    if taken.is_some() {
        return Err(ApiError::BadRequest(format!(
            "ca certificate with name '{name}' already exists"
        )));
    }

    let encrypted = state
        .encryption
        .encrypt(certificate.as_bytes())
        .map_err(ApiError::Internal)?;
    let id = Uuid::new_v4().to_string();

    sqlx::query("INSERT INTO ca_certificate (id, name, certificate, created_at) VALUES (?, ?, ?, ?)")
        .bind(&id)
        .bind(name)
        .bind(&encrypted)
        .bind(Utc::now())
        .execute(&state.pool)
        .await?;

    Ok(id)
}

pub async fn create_client_cert(
    state: &AppState,
    name: &str,
    certificate: &str,
    key: &str,
) -> Result<String, ApiError> {
    validation::check_display_name(name)?;
    validation::check_certificate_pem("certificate", certificate)?;
    validation::check_certificate_pem("key", key)?;

    let taken: Option<(String,)> =
        sqlx::query_as("SELECT id FROM client_certificate WHERE name = ?")
            .bind(name)
            .fetch_optional(&state.pool)
            .await?;
    if taken.is_some() {
        return Err(ApiError::BadRequest(format!(
            "client certificate with name '{name}' already exists"
        )));
    }

    let encrypted_cert = state
        .encryption
        .encrypt(certificate.as_bytes())
        .map_err(ApiError::Internal)?;
    let encrypted_key = state
        .encryption
        .encrypt(key.as_bytes())
        .map_err(ApiError::Internal)?;
    let id = Uuid::new_v4().to_string();

    sqlx::query(
        "INSERT INTO client_certificate (id, name, certificate, key, created_at) VALUES (?, ?, ?, ?, ?)",
    )
    .bind(&id)
    .bind(name)
    .bind(&encrypted_cert)
    .bind(&encrypted_key)
    .bind(Utc::now())
    .execute(&state.pool)
    .await?;

    Ok(id)
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn list_ca_certs(
    State(state): State<AppState>,
) -> Result<Json<Vec<CertificateSummary>>, ApiError> {
    let rows = sqlx::query_as::<_, CertificateSummary>(
        "SELECT id, name, created_at FROM ca_certificate ORDER BY name",
    )
    .fetch_all(&state.pool)
    .await?;
    Ok(Json(rows))
}

async fn get_ca_cert(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<CertificateSummary>, ApiError> {
    let row = sqlx::query_as::<_, CertificateSummary>(
        "SELECT id, name, created_at FROM ca_certificate WHERE id = ?",
    )
    .bind(id.to_string())
    .fetch_optional(&state.pool)
    .await?
    .ok_or_else(|| ApiError::NotFound("ca certificate".into()))?;
    Ok(Json(row))
}

#[tracing::instrument(skip(state, body), fields(name = %body.name), err)]
async fn create_ca_cert_handler(
    State(state): State<AppState>,
    Json(body): Json<CreateCaCertRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let id = create_ca_cert(&state, &body.name, &body.certificate).await?;
    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({ "id": id, "name": body.name })),
    ))
}

#[tracing::instrument(skip(state), fields(%id), err)]
async fn delete_ca_cert(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let result = sqlx::query("DELETE FROM ca_certificate WHERE id = ?")
        .bind(id.to_string())
        .execute(&state.pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(ApiError::NotFound("ca certificate".into()));
    }
    Ok(Json(serde_json::json!({ "ok": true })))
}

async fn list_client_certs(
    State(state): State<AppState>,
) -> Result<Json<Vec<CertificateSummary>>, ApiError> {
    let rows = sqlx::query_as::<_, CertificateSummary>(
        "SELECT id, name, created_at FROM client_certificate ORDER BY name",
    )
    .fetch_all(&state.pool)
    .await?;
    Ok(Json(rows))
}

async fn get_client_cert(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<CertificateSummary>, ApiError> {
    let row = sqlx::query_as::<_, CertificateSummary>(
        "SELECT id, name, created_at FROM client_certificate WHERE id = ?",
    )
    .bind(id.to_string())
    .fetch_optional(&state.pool)
    .await?
    .ok_or_else(|| ApiError::NotFound("client certificate".into()))?;
    Ok(Json(row))
}

#[tracing::instrument(skip(state, body), fields(name = %body.name), err)]
async fn create_client_cert_handler(
    State(state): State<AppState>,
    Json(body): Json<CreateClientCertRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let id = create_client_cert(&state, &body.name, &body.certificate, &body.key).await?;
    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({ "id": id, "name": body.name })),
    ))
}

#[tracing::instrument(skip(state), fields(%id), err)]
async fn delete_client_cert(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let result = sqlx::query("DELETE FROM client_certificate WHERE id = ?")
        .bind(id.to_string())
        .execute(&state.pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(ApiError::NotFound("client certificate".into()));
    }
    Ok(Json(serde_json::json!({ "ok": true })))
}
