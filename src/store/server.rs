use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use uuid::Uuid;

/// Application identity. The row id doubles as the telemetry anonymous id.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ServerInfo {
    pub id: String,
    pub created_at: DateTime<Utc>,
}

/// Fetch the identity row, creating it on first boot.
/// Returns `(info, first_start)`.
pub async fn get_or_create(pool: &SqlitePool) -> anyhow::Result<(ServerInfo, bool)> {
    if let Some(existing) =
        sqlx::query_as::<_, ServerInfo>("SELECT id, created_at FROM server_info LIMIT 1")
            .fetch_optional(pool)
            .await?
    {
        return Ok((existing, false));
    }

    let info = ServerInfo {
        id: Uuid::new_v4().to_string(),
        created_at: Utc::now(),
    };
    sqlx::query("INSERT INTO server_info (id, created_at) VALUES (?, ?)")
        .bind(&info.id)
        .bind(info.created_at)
        .execute(pool)
        .await?;

    Ok((info, true))
}
