use std::net::SocketAddr;
use std::sync::Arc;

use tokio::signal;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use redisboard::api;
use redisboard::config::{APP_VERSION, Config};
use redisboard::features::FeatureFlagProvider;
use redisboard::redis::client::ConnectionRegistry;
use redisboard::store::encryption::Encryption;
use redisboard::store::{self, AppState, Session};
use redisboard::telemetry::{Telemetry, TelemetryContext, events};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_env("REDISBOARD_LOG").unwrap_or_else(|_| "info".into()))
        .with(fmt::layer().json())
        .init();

    let cfg = Config::load();

    // Open SQLite and run migrations
    let pool = store::pool::connect(&cfg.database_path).await?;

    let encryption = Encryption::from_config(cfg.master_key.as_deref(), cfg.dev_mode)?;

    // The server_info row carries the anonymous id across restarts
    let (server, first_start) = store::server::get_or_create(&pool).await?;
    let session = Session {
        anonymous_id: server.id.clone(),
        session_id: chrono::Utc::now().timestamp_millis(),
        first_start,
    };

    let provider = FeatureFlagProvider::new(&session.anonymous_id);
    let control = provider.control_info();

    let telemetry = match &cfg.analytics_endpoint {
        Some(endpoint) => Telemetry::spawn(
            pool.clone(),
            endpoint.clone(),
            cfg.analytics_write_key.clone(),
            TelemetryContext {
                anonymous_id: session.anonymous_id.clone(),
                session_id: session.session_id,
                app_version: APP_VERSION.to_owned(),
                build_type: cfg.build_type.clone(),
                control_number: control.control_number,
                control_group: control.control_group.clone(),
            },
        ),
        None => Telemetry::disabled(),
    };

    let start_event = if first_start {
        events::APPLICATION_FIRST_START
    } else {
        events::APPLICATION_STARTED
    };
    telemetry.track_non_tracking(start_event, serde_json::Value::Null);

    let state = AppState {
        pool,
        connections: Arc::new(ConnectionRegistry::new()),
        encryption: Arc::new(encryption),
        telemetry,
        features: Arc::new(provider),
        session: Arc::new(session),
        config: Arc::new(cfg.clone()),
    };

    let cors = build_cors(&cfg.cors_origins)?;
    let app = axum::Router::new()
        .route("/healthz", axum::routing::get(|| async { "ok" }))
        .merge(api::router())
        .layer(TraceLayer::new_for_http())
        .layer(tower_http::limit::RequestBodyLimitLayer::new(10 * 1024 * 1024))
        .layer(cors)
        .with_state(state);

    let addr: SocketAddr = cfg.listen.parse()?;
    tracing::info!(%addr, version = APP_VERSION, control_number = control.control_number, "starting redisboard");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("redisboard stopped");
    Ok(())
}

fn build_cors(origins: &[String]) -> anyhow::Result<CorsLayer> {
    if origins.is_empty() {
        return Ok(CorsLayer::permissive());
    }
    let parsed = origins
        .iter()
        .map(|o| o.parse::<axum::http::HeaderValue>())
        .collect::<Result<Vec<_>, _>>()?;
    Ok(CorsLayer::new()
        .allow_origin(tower_http::cors::AllowOrigin::list(parsed))
        .allow_methods(tower_http::cors::Any)
        .allow_headers(tower_http::cors::Any))
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("shutdown signal received");
}
