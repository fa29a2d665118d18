pub mod client;

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;

use crate::error::ApiError;

/// A configured RDI (data-ingestion) endpoint.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct RdiInstance {
    pub id: String,
    pub name: String,
    pub url: String,
    pub username: Option<String>,
    /// Encrypted blob.
    pub password: Option<Vec<u8>>,
    pub version: Option<String>,
    pub last_deployment: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

pub async fn get_rdi(pool: &SqlitePool, id: &str) -> Result<RdiInstance, ApiError> {
    sqlx::query_as::<_, RdiInstance>("SELECT * FROM rdi_instance WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| ApiError::NotFound("rdi instance".into()))
}

/// Pipeline definition exchanged with the remote service: one config
/// document plus named job documents, all YAML.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pipeline {
    pub config: String,
    #[serde(default)]
    pub jobs: BTreeMap<String, String>,
}

/// Parse-check every YAML document before it is shipped to the remote
/// service. The remote rejects invalid YAML too, but with a much less
/// helpful message.
pub fn validate_pipeline(pipeline: &Pipeline) -> Result<(), ApiError> {
    let mut errors = Vec::new();

    if let Err(e) = serde_yaml::from_str::<serde_yaml::Value>(&pipeline.config) {
        errors.push(format!("config: {e}"));
    }
    for (name, body) in &pipeline.jobs {
        if let Err(e) = serde_yaml::from_str::<serde_yaml::Value>(body) {
            errors.push(format!("job {name}: {e}"));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ApiError::Validation(errors))
    }
}
