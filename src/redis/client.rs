use std::time::Duration;

use dashmap::DashMap;
use fred::interfaces::ClientLike;
use fred::types::Value;

use crate::error::ApiError;
use crate::store::AppState;
use crate::store::databases::{self, DatabaseInstance};
use crate::redis::command;

/// How long we give a brand new connection before declaring the target
/// unreachable.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

const POOL_SIZE: usize = 2;

/// Everything needed to open a connection, with the password already
/// decrypted. Built either from a stored profile or from an unsaved
/// config on the test endpoint.
#[derive(Debug, Clone)]
pub struct ConnectionSpec {
    pub host: String,
    pub port: i64,
    pub username: Option<String>,
    pub password: Option<String>,
    pub tls: bool,
    pub db: Option<i64>,
    pub timeout_ms: u64,
}

impl ConnectionSpec {
    /// `default_timeout_ms` applies when the profile carries no usable
    /// deadline of its own.
    pub fn from_instance(
        instance: &DatabaseInstance,
        password: Option<String>,
        default_timeout_ms: u64,
    ) -> Self {
        Self {
            host: instance.host.clone(),
            port: instance.port,
            username: instance.username.clone(),
            password,
            tls: instance.tls,
            db: instance.db,
            timeout_ms: u64::try_from(instance.timeout_ms)
                .ok()
                .filter(|t| *t > 0)
                .unwrap_or(default_timeout_ms),
        }
    }

    fn url(&self) -> Result<String, ApiError> {
        let scheme = if self.tls { "rediss" } else { "redis" };
        // Bare IPv6 literals need brackets inside a URL authority.
        let host = if self.host.contains(':') && !self.host.starts_with('[') {
            format!("[{}]", self.host)
        } else {
            self.host.clone()
        };
        let mut url = url::Url::parse(&format!("{scheme}://{host}:{}", self.port))
            .map_err(|e| ApiError::BadRequest(format!("invalid connection address: {e}")))?;
        if let Some(user) = &self.username {
            url.set_username(user)
                .map_err(|()| ApiError::BadRequest("invalid username".into()))?;
        }
        if let Some(pass) = &self.password {
            url.set_password(Some(pass))
                .map_err(|()| ApiError::BadRequest("invalid password".into()))?;
        }
        if let Some(db) = self.db {
            url.set_path(&format!("/{db}"));
        }
        Ok(url.into())
    }
}

/// A pooled client bound to one instance, carrying the profile's command
/// deadline.
pub struct InstanceClient {
    pool: fred::clients::Pool,
    timeout: Duration,
}

impl InstanceClient {
    pub async fn exec(&self, cmd: &str, args: Vec<Value>) -> Result<Value, ApiError> {
        command::exec(&self.pool, cmd, args, self.timeout).await
    }
}

/// One fred pool per configured instance, created lazily on first use and
/// dropped when the profile changes or is deleted.
#[derive(Default)]
pub struct ConnectionRegistry {
    clients: DashMap<String, fred::clients::Pool>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    async fn open(spec: &ConnectionSpec) -> Result<fred::clients::Pool, ApiError> {
        let url = spec.url()?;
        let config = fred::types::config::Config::from_url(&url)?;
        let pool = fred::clients::Pool::new(config, None, None, None, POOL_SIZE)?;

        match tokio::time::timeout(CONNECT_TIMEOUT, pool.init()).await {
            Ok(Ok(_)) => Ok(pool),
            Ok(Err(e)) => Err(ApiError::FailedDependency(format!(
                "could not connect to {}:{}: {e}",
                spec.host, spec.port
            ))),
            Err(_) => Err(ApiError::FailedDependency(format!(
                "connection to {}:{} timed out",
                spec.host, spec.port
            ))),
        }
    }

    pub async fn client_for(
        &self,
        instance_id: &str,
        spec: &ConnectionSpec,
    ) -> Result<fred::clients::Pool, ApiError> {
        if let Some(existing) = self.clients.get(instance_id) {
            return Ok(existing.clone());
        }

        let pool = Self::open(spec).await?;
        // A concurrent first request may have raced us; keep whichever
        // pool landed first.
        let entry = self
            .clients
            .entry(instance_id.to_owned())
            .or_insert_with(|| pool.clone());
        Ok(entry.clone())
    }

    /// Drop the pooled client for an instance (profile edited or removed).
    pub async fn invalidate(&self, instance_id: &str) {
        if let Some((_, pool)) = self.clients.remove(instance_id) {
            let _ = pool.quit().await;
        }
    }
}

/// Load the profile, decrypt its password, and return a ready client.
pub async fn connect(
    state: &AppState,
    instance_id: &str,
) -> Result<(DatabaseInstance, InstanceClient), ApiError> {
    let instance = databases::get_database(&state.pool, instance_id).await?;
    let password = state
        .encryption
        .decrypt_opt(instance.password.as_deref())
        .map_err(ApiError::Internal)?;
    let spec = ConnectionSpec::from_instance(
        &instance,
        password,
        state.config.default_command_timeout_ms,
    );
    let pool = state.connections.client_for(&instance.id, &spec).await?;
    let timeout = Duration::from_millis(spec.timeout_ms);
    Ok((instance, InstanceClient { pool, timeout }))
}

/// One-shot connection check for an unsaved config. Opens, pings, quits.
pub async fn test_connection(spec: &ConnectionSpec) -> Result<(), ApiError> {
    let pool = ConnectionRegistry::open(spec).await?;
    let result = command::exec(
        &pool,
        "PING",
        Vec::new(),
        Duration::from_millis(spec.timeout_ms),
    )
    .await;
    let _ = pool.quit().await;
    result.map(|_| ())
}
