use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

use crate::error::ApiError;

/// A configured connection profile to a target Redis deployment.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct DatabaseInstance {
    pub id: String,
    pub host: String,
    pub port: i64,
    pub name: String,
    pub db: Option<i64>,
    pub username: Option<String>,
    /// Encrypted blob, never leaves the service.
    pub password: Option<Vec<u8>>,
    pub tls: bool,
    pub verify_server_cert: bool,
    pub connection_type: String,
    pub timeout_ms: i64,
    pub compressor: String,
    pub ca_cert_id: Option<String>,
    pub client_cert_id: Option<String>,
    pub is_pre_setup: bool,
    pub new_connection: bool,
    pub last_connection: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub name_from_provider: Option<String>,
}

pub async fn get_database(pool: &SqlitePool, id: &str) -> Result<DatabaseInstance, ApiError> {
    sqlx::query_as::<_, DatabaseInstance>("SELECT * FROM database_instance WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| ApiError::NotFound("database".into()))
}

pub async fn touch_last_connection(pool: &SqlitePool, id: &str) -> Result<(), ApiError> {
    sqlx::query("UPDATE database_instance SET last_connection = ?, new_connection = 0 WHERE id = ?")
        .bind(Utc::now())
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}
