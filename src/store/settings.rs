use serde::Serialize;
use sqlx::SqlitePool;

use crate::error::ApiError;

#[derive(Debug, Clone, Serialize)]
pub struct AppSettings {
    /// User agreements, e.g. `{"analytics": true, "eula": true}`.
    pub agreements: Option<serde_json::Value>,
    pub scan_threshold: i64,
    pub batch_size: i64,
    pub theme: Option<String>,
}

#[derive(Debug, sqlx::FromRow)]
struct SettingsRow {
    agreements: Option<String>,
    scan_threshold: i64,
    batch_size: i64,
    theme: Option<String>,
}

pub async fn get_settings(pool: &SqlitePool) -> Result<AppSettings, ApiError> {
    let row = sqlx::query_as::<_, SettingsRow>(
        "SELECT agreements, scan_threshold, batch_size, theme FROM settings WHERE id = 1",
    )
    .fetch_one(pool)
    .await?;

    let agreements = row
        .agreements
        .as_deref()
        .and_then(|a| serde_json::from_str(a).ok());

    Ok(AppSettings {
        agreements,
        scan_threshold: row.scan_threshold,
        batch_size: row.batch_size,
        theme: row.theme,
    })
}

/// Whether the user granted analytics consent. Any failure reads as "no".
pub async fn analytics_granted(pool: &SqlitePool) -> bool {
    match get_settings(pool).await {
        Ok(settings) => settings
            .agreements
            .as_ref()
            .and_then(|a| a.get("analytics"))
            .and_then(serde_json::Value::as_bool)
            .unwrap_or(false),
        Err(_) => false,
    }
}
