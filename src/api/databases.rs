use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ApiError;
use crate::redis::client::{self, ConnectionSpec};
use crate::redis::{command, info};
use crate::store::AppState;
use crate::store::databases::{self, DatabaseInstance};
use crate::telemetry::events;
use crate::validation;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Reference an existing CA certificate by id, or create one inline.
#[derive(Debug, Clone, Deserialize)]
pub struct CaCertInput {
    pub id: Option<String>,
    pub name: Option<String>,
    pub certificate: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ClientCertInput {
    pub id: Option<String>,
    pub name: Option<String>,
    pub certificate: Option<String>,
    pub key: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateDatabaseRequest {
    pub name: String,
    pub host: String,
    pub port: i64,
    pub db: Option<i64>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub tls: Option<bool>,
    pub verify_server_cert: Option<bool>,
    pub timeout: Option<i64>,
    pub compressor: Option<String>,
    pub ca_cert: Option<CaCertInput>,
    pub client_cert: Option<ClientCertInput>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateDatabaseRequest {
    pub name: Option<String>,
    pub host: Option<String>,
    pub port: Option<i64>,
    pub db: Option<i64>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub tls: Option<bool>,
    pub verify_server_cert: Option<bool>,
    pub timeout: Option<i64>,
    pub compressor: Option<String>,
    pub ca_cert: Option<CaCertInput>,
    pub client_cert: Option<ClientCertInput>,
}

#[derive(Debug, Deserialize)]
pub struct DeleteDatabasesRequest {
    pub ids: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct TestConnectionRequest {
    pub host: String,
    pub port: i64,
    pub db: Option<i64>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub tls: Option<bool>,
    pub timeout: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct DatabaseResponse {
    pub id: String,
    pub host: String,
    pub port: i64,
    pub name: String,
    pub db: Option<i64>,
    pub username: Option<String>,
    pub tls: bool,
    pub verify_server_cert: bool,
    pub connection_type: String,
    pub timeout: i64,
    pub compressor: String,
    pub ca_cert_id: Option<String>,
    pub client_cert_id: Option<String>,
    pub is_pre_setup: bool,
    pub new_connection: bool,
    pub last_connection: Option<DateTime<Utc>>,
    pub name_from_provider: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<DatabaseInstance> for DatabaseResponse {
    fn from(instance: DatabaseInstance) -> Self {
        Self {
            id: instance.id,
            host: instance.host,
            port: instance.port,
            name: instance.name,
            db: instance.db,
            username: instance.username,
            tls: instance.tls,
            verify_server_cert: instance.verify_server_cert,
            connection_type: instance.connection_type,
            timeout: instance.timeout_ms,
            compressor: instance.compressor,
            ca_cert_id: instance.ca_cert_id,
            client_cert_id: instance.client_cert_id,
            is_pre_setup: instance.is_pre_setup,
            new_connection: instance.new_connection,
            last_connection: instance.last_connection,
            name_from_provider: instance.name_from_provider,
            created_at: instance.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ListResponse<T: Serialize> {
    pub items: Vec<T>,
    pub total: i64,
}

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/api/databases",
            get(list_databases)
                .post(create_database)
                .delete(delete_databases),
        )
        .route(
            "/api/databases/{id}",
            get(get_database)
                .patch(update_database)
                .delete(delete_database),
        )
        .route("/api/databases/clone/{id}", post(clone_database))
        .route("/api/databases/test", post(test_connection))
        .route("/api/databases/{id}/connect", get(connect_database))
        .route("/api/databases/{id}/overview", get(database_overview))
        .route("/api/databases/{id}/info", get(database_info))
}

// ---------------------------------------------------------------------------
// Certificate resolution
// ---------------------------------------------------------------------------

/// Resolve an optional CA certificate input into a stored certificate id.
/// Passing both an id and inline material is rejected; an inline
/// certificate with an already-used name is a 400.
async fn resolve_ca_cert(
    state: &AppState,
    input: Option<&CaCertInput>,
) -> Result<Option<String>, ApiError> {
    let Some(input) = input else { return Ok(None) };

    if input.id.is_some() && (input.name.is_some() || input.certificate.is_some()) {
        return Err(ApiError::BadRequest(
            "caCert must reference an existing certificate by id or provide name and certificate, not both".into(),
        ));
    }

    if let Some(id) = &input.id {
        crate::api::certificates::ca_cert_exists(&state.pool, id).await?;
        return Ok(Some(id.clone()));
    }

    let (Some(name), Some(certificate)) = (&input.name, &input.certificate) else {
        return Err(ApiError::BadRequest(
            "caCert requires both name and certificate".into(),
        ));
    };

    let id = crate::api::certificates::create_ca_cert(state, name, certificate).await?;
    Ok(Some(id))
}

async fn resolve_client_cert(
    state: &AppState,
    input: Option<&ClientCertInput>,
) -> Result<Option<String>, ApiError> {
    let Some(input) = input else { return Ok(None) };

    if input.id.is_some()
        && (input.name.is_some() || input.certificate.is_some() || input.key.is_some())
    {
        return Err(ApiError::BadRequest(
            "clientCert must reference an existing certificate by id or provide name, certificate and key, not both".into(),
        ));
    }

    if let Some(id) = &input.id {
        crate::api::certificates::client_cert_exists(&state.pool, id).await?;
        return Ok(Some(id.clone()));
    }

    let (Some(name), Some(certificate), Some(key)) = (&input.name, &input.certificate, &input.key)
    else {
        return Err(ApiError::BadRequest(
            "clientCert requires name, certificate and key".into(),
        ));
    };

    let id = crate::api::certificates::create_client_cert(state, name, certificate, key).await?;
    Ok(Some(id))
}

async fn check_name_free(state: &AppState, name: &str) -> Result<(), ApiError> {
    let in_use: Option<(String,)> =
        sqlx::query_as("SELECT id FROM database_instance WHERE name = ?")
            .bind(name)
            .fetch_optional(&state.pool)
            .await?;
    if in_use.is_some() {
        return Err(ApiError::Conflict("database name already in use".into()));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn list_databases(
    State(state): State<AppState>,
) -> Result<Json<ListResponse<DatabaseResponse>>, ApiError> {
    let rows = sqlx::query_as::<_, DatabaseInstance>(
        "SELECT * FROM database_instance ORDER BY created_at DESC",
    )
    .fetch_all(&state.pool)
    .await?;

    let total = i64::try_from(rows.len()).unwrap_or(i64::MAX);
    let items = rows.into_iter().map(DatabaseResponse::from).collect();
    Ok(Json(ListResponse { items, total }))
}

#[tracing::instrument(skip(state, body), fields(database_name = %body.name), err)]
async fn create_database(
    State(state): State<AppState>,
    Json(body): Json<CreateDatabaseRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validation::check_display_name(&body.name)?;
    validation::check_host(&body.host)?;
    validation::check_port(body.port)?;
    if let Some(db) = body.db {
        validation::check_db_index(db)?;
    }
    let compressor = body.compressor.as_deref().unwrap_or("NONE");
    validation::check_compressor(compressor)?;
    check_name_free(&state, &body.name).await?;

    let ca_cert_id = resolve_ca_cert(&state, body.ca_cert.as_ref()).await?;
    let client_cert_id = resolve_client_cert(&state, body.client_cert.as_ref()).await?;

    let password = state
        .encryption
        .encrypt_opt(body.password.as_deref())
        .map_err(ApiError::Internal)?;

    let id = Uuid::new_v4().to_string();
    let now = Utc::now();
    let tls = body.tls.unwrap_or(false);
    let timeout = body.timeout.unwrap_or(30_000);

    sqlx::query(
        r"
        INSERT INTO database_instance
            (id, host, port, name, db, username, password, tls, verify_server_cert,
             connection_type, timeout_ms, compressor, ca_cert_id, client_cert_id,
             is_pre_setup, new_connection, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, 'STANDALONE', ?, ?, ?, ?, 0, 1, ?)
        ",
    )
    .bind(&id)
    .bind(&body.host)
    .bind(body.port)
    .bind(&body.name)
    .bind(body.db)
    .bind(&body.username)
    .bind(&password)
    .bind(tls)
    .bind(body.verify_server_cert.unwrap_or(false))
    .bind(timeout)
    .bind(compressor)
    .bind(&ca_cert_id)
    .bind(&client_cert_id)
    .bind(now)
    .execute(&state.pool)
    .await?;

    state.telemetry.track(
        events::DATABASE_ADDED,
        serde_json::json!({ "tls": tls, "useCaCert": ca_cert_id.is_some() }),
    );

    let instance = databases::get_database(&state.pool, &id).await?;
    Ok((StatusCode::CREATED, Json(DatabaseResponse::from(instance))))
}

async fn get_database(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<DatabaseResponse>, ApiError> {
    let instance = databases::get_database(&state.pool, &id.to_string()).await?;
    Ok(Json(DatabaseResponse::from(instance)))
}

#[tracing::instrument(skip(state, body), fields(%id), err)]
async fn update_database(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(body): Json<UpdateDatabaseRequest>,
) -> Result<Json<DatabaseResponse>, ApiError> {
    let id = id.to_string();
    let existing = databases::get_database(&state.pool, &id).await?;

    if let Some(name) = &body.name {
        validation::check_display_name(name)?;
        if *name != existing.name {
            check_name_free(&state, name).await?;
        }
    }
    if let Some(host) = &body.host {
        validation::check_host(host)?;
    }
    if let Some(port) = body.port {
        validation::check_port(port)?;
    }
    if let Some(db) = body.db {
        validation::check_db_index(db)?;
    }
    if let Some(compressor) = &body.compressor {
        validation::check_compressor(compressor)?;
    }

    let ca_cert_id = resolve_ca_cert(&state, body.ca_cert.as_ref()).await?;
    let client_cert_id = resolve_client_cert(&state, body.client_cert.as_ref()).await?;

    let password = state
        .encryption
        .encrypt_opt(body.password.as_deref())
        .map_err(ApiError::Internal)?;

    sqlx::query(
        r"
        UPDATE database_instance SET
            name = COALESCE(?, name),
            host = COALESCE(?, host),
            port = COALESCE(?, port),
            db = COALESCE(?, db),
            username = COALESCE(?, username),
            password = COALESCE(?, password),
            tls = COALESCE(?, tls),
            verify_server_cert = COALESCE(?, verify_server_cert),
            timeout_ms = COALESCE(?, timeout_ms),
            compressor = COALESCE(?, compressor),
            ca_cert_id = COALESCE(?, ca_cert_id),
            client_cert_id = COALESCE(?, client_cert_id),
            new_connection = 1
        WHERE id = ?
        ",
    )
    .bind(&body.name)
    .bind(&body.host)
    .bind(body.port)
    .bind(body.db)
    .bind(&body.username)
    .bind(&password)
    .bind(body.tls)
    .bind(body.verify_server_cert)
    .bind(body.timeout)
    .bind(&body.compressor)
    .bind(&ca_cert_id)
    .bind(&client_cert_id)
    .bind(&id)
    .execute(&state.pool)
    .await?;

    // The pooled client was built from the old profile.
    state.connections.invalidate(&id).await;

    let instance = databases::get_database(&state.pool, &id).await?;
    Ok(Json(DatabaseResponse::from(instance)))
}

#[tracing::instrument(skip(state), fields(%id), err)]
async fn delete_database(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let id = id.to_string();
    databases::get_database(&state.pool, &id).await?;

    sqlx::query("DELETE FROM database_instance WHERE id = ?")
        .bind(&id)
        .execute(&state.pool)
        .await?;
    state.connections.invalidate(&id).await;

    state
        .telemetry
        .track(events::DATABASE_DELETED, serde_json::Value::Null);

    Ok(Json(serde_json::json!({ "ok": true })))
}

#[tracing::instrument(skip(state, body), err)]
async fn delete_databases(
    State(state): State<AppState>,
    Json(body): Json<DeleteDatabasesRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    if body.ids.is_empty() {
        return Err(ApiError::BadRequest("ids must not be empty".into()));
    }

    let mut affected = 0u64;
    for id in &body.ids {
        let result = sqlx::query("DELETE FROM database_instance WHERE id = ?")
            .bind(id)
            .execute(&state.pool)
            .await?;
        if result.rows_affected() > 0 {
            state.connections.invalidate(id).await;
            affected += 1;
        }
    }

    Ok(Json(serde_json::json!({ "affected": affected })))
}

#[tracing::instrument(skip(state, body), fields(%id), err)]
async fn clone_database(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(body): Json<UpdateDatabaseRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let source = databases::get_database(&state.pool, &id.to_string()).await?;

    let name = match body.name {
        Some(name) => {
            validation::check_display_name(&name)?;
            name
        }
        None => format!("{} (copy)", source.name),
    };
    check_name_free(&state, &name).await?;

    if let Some(host) = &body.host {
        validation::check_host(host)?;
    }
    if let Some(port) = body.port {
        validation::check_port(port)?;
    }
    if let Some(db) = body.db {
        validation::check_db_index(db)?;
    }
    if let Some(compressor) = &body.compressor {
        validation::check_compressor(compressor)?;
    }

    // Inline certificates with an already-used name fail with 400 here.
    let ca_cert_id = match body.ca_cert.as_ref() {
        Some(input) => resolve_ca_cert(&state, Some(input)).await?,
        None => source.ca_cert_id.clone(),
    };
    let client_cert_id = match body.client_cert.as_ref() {
        Some(input) => resolve_client_cert(&state, Some(input)).await?,
        None => source.client_cert_id.clone(),
    };

    let password = match body.password.as_deref() {
        Some(password) => state
            .encryption
            .encrypt_opt(Some(password))
            .map_err(ApiError::Internal)?,
        None => source.password.clone(),
    };

    let new_id = Uuid::new_v4().to_string();
    let now = Utc::now();

    sqlx::query(
        r"
        INSERT INTO database_instance
            (id, host, port, name, db, username, password, tls, verify_server_cert,
             connection_type, timeout_ms, compressor, ca_cert_id, client_cert_id,
             is_pre_setup, new_connection, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 0, 1, ?)
        ",
    )
    .bind(&new_id)
    .bind(body.host.as_deref().unwrap_or(&source.host))
    .bind(body.port.unwrap_or(source.port))
    .bind(&name)
    .bind(body.db.or(source.db))
    .bind(body.username.as_deref().or(source.username.as_deref()))
    .bind(&password)
    .bind(body.tls.unwrap_or(source.tls))
    .bind(body.verify_server_cert.unwrap_or(source.verify_server_cert))
    .bind(&source.connection_type)
    .bind(body.timeout.unwrap_or(source.timeout_ms))
    .bind(body.compressor.as_deref().unwrap_or(&source.compressor))
    .bind(&ca_cert_id)
    .bind(&client_cert_id)
    .bind(now)
    .execute(&state.pool)
    .await?;

    let instance = databases::get_database(&state.pool, &new_id).await?;
    Ok((StatusCode::CREATED, Json(DatabaseResponse::from(instance))))
}

#[tracing::instrument(skip(state, body), fields(host = %body.host, port = body.port), err)]
async fn test_connection(
    State(state): State<AppState>,
    Json(body): Json<TestConnectionRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    validation::check_host(&body.host)?;
    validation::check_port(body.port)?;
    if let Some(db) = body.db {
        validation::check_db_index(db)?;
    }

    let spec = ConnectionSpec {
        host: body.host,
        port: body.port,
        username: body.username,
        password: body.password,
        tls: body.tls.unwrap_or(false),
        db: body.db,
        timeout_ms: body
            .timeout
            .and_then(|t| u64::try_from(t).ok())
            .filter(|t| *t > 0)
            .unwrap_or(state.config.default_command_timeout_ms),
    };
    client::test_connection(&spec).await?;

    Ok(Json(serde_json::json!({ "ok": true })))
}

#[tracing::instrument(skip(state), fields(%id), err)]
async fn connect_database(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<info::DatabaseOverview>, ApiError> {
    let id = id.to_string();
    let (_, client) = client::connect(&state, &id).await?;

    client.exec("PING", Vec::new()).await?;
    databases::touch_last_connection(&state.pool, &id).await?;

    let raw = client.exec("INFO", Vec::new()).await?;
    Ok(Json(info::overview_from_info(&command::to_string(&raw))))
}

async fn database_overview(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<info::DatabaseOverview>, ApiError> {
    let (_, client) = client::connect(&state, &id.to_string()).await?;
    let raw = client.exec("INFO", Vec::new()).await?;
    Ok(Json(info::overview_from_info(&command::to_string(&raw))))
}

async fn database_info(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let (_, client) = client::connect(&state, &id.to_string()).await?;
    let raw = client.exec("INFO", Vec::new()).await?;
    let sections = info::parse_info(&command::to_string(&raw));
    Ok(Json(serde_json::json!(sections)))
}
