pub mod databases;
pub mod encryption;
pub mod pool;
pub mod server;
pub mod settings;

use std::sync::Arc;

use sqlx::SqlitePool;

use crate::config::Config;
use crate::features::FeatureFlagProvider;
use crate::redis::client::ConnectionRegistry;
use crate::telemetry::Telemetry;

/// Per-boot session identity derived from the persisted server info row.
#[derive(Debug, Clone)]
pub struct Session {
    /// Anonymous application id, equal to the `server_info` row id.
    pub anonymous_id: String,
    /// Boot timestamp in milliseconds.
    pub session_id: i64,
    pub first_start: bool,
}

#[derive(Clone)]
pub struct AppState {
    pub pool: SqlitePool,
    pub connections: Arc<ConnectionRegistry>,
    pub encryption: Arc<encryption::Encryption>,
    pub telemetry: Telemetry,
    pub features: Arc<FeatureFlagProvider>,
    pub session: Arc<Session>,
    pub config: Arc<Config>,
}
