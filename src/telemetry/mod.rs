//! Buffered fire-and-forget analytics forwarder.
//!
//! Events queue on an unbounded channel; a background task checks the
//! user's analytics agreement per event and posts to the configured sink.
//! Delivery failures are swallowed silently by design — telemetry must
//! never surface as an API error or block a request.

use std::sync::Arc;

use sqlx::SqlitePool;
use tokio::sync::mpsc;

use crate::store::settings;

/// Anonymous id reported for non-tracking events when consent is absent.
pub const NON_TRACKING_ANONYMOUS_ID: &str = "00000000-0000-0000-0000-000000000001";

pub mod events {
    pub const APPLICATION_FIRST_START: &str = "APPLICATION_FIRST_START";
    pub const APPLICATION_STARTED: &str = "APPLICATION_STARTED";
    pub const DATABASE_ADDED: &str = "CONFIG_DATABASES_DATABASE_ADDED";
    pub const DATABASE_DELETED: &str = "CONFIG_DATABASES_DATABASE_DELETED";
    pub const CLI_COMMAND_EXECUTED: &str = "CLI_COMMAND_EXECUTED";
    pub const RDI_PIPELINE_DEPLOYED: &str = "RDI_PIPELINE_DEPLOYED";
}

#[derive(Debug, Clone)]
pub struct TelemetryContext {
    pub anonymous_id: String,
    pub session_id: i64,
    pub app_version: String,
    pub build_type: String,
    pub control_number: f64,
    pub control_group: String,
}

#[derive(Debug)]
struct Event {
    name: String,
    data: serde_json::Value,
    /// Non-tracking events are delivered regardless of consent, but with
    /// the fixed non-tracking anonymous id when consent is absent.
    non_tracking: bool,
}

#[derive(Clone)]
pub struct Telemetry {
    tx: Option<mpsc::UnboundedSender<Event>>,
}

impl Telemetry {
    /// No-op handle used when no sink is configured.
    pub fn disabled() -> Self {
        Self { tx: None }
    }

    /// Spawn the forwarder task and return the shared handle.
    pub fn spawn(
        pool: SqlitePool,
        endpoint: String,
        write_key: String,
        context: TelemetryContext,
    ) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<Event>();
        let context = Arc::new(context);

        tokio::spawn(async move {
            let client = reqwest::Client::new();
            let url = format!("{}/v1/track", endpoint.trim_end_matches('/'));

            while let Some(event) = rx.recv().await {
                forward(&client, &url, &write_key, &pool, &context, event).await;
            }
        });

        Self { tx: Some(tx) }
    }

    pub fn track(&self, event: &str, data: serde_json::Value) {
        self.enqueue(event, data, false);
    }

    pub fn track_non_tracking(&self, event: &str, data: serde_json::Value) {
        self.enqueue(event, data, true);
    }

    fn enqueue(&self, event: &str, data: serde_json::Value, non_tracking: bool) {
        if let Some(tx) = &self.tx {
            let _ = tx.send(Event {
                name: event.to_owned(),
                data,
                non_tracking,
            });
        }
    }
}

async fn forward(
    client: &reqwest::Client,
    url: &str,
    write_key: &str,
    pool: &SqlitePool,
    context: &TelemetryContext,
    event: Event,
) {
    let granted = settings::analytics_granted(pool).await;
    if !granted && !event.non_tracking {
        return;
    }

    let anonymous_id = if granted {
        context.anonymous_id.as_str()
    } else {
        NON_TRACKING_ANONYMOUS_ID
    };

    let mut properties = match event.data {
        serde_json::Value::Object(map) => map,
        serde_json::Value::Null => serde_json::Map::new(),
        other => {
            let mut map = serde_json::Map::new();
            map.insert("value".into(), other);
            map
        }
    };
    properties.insert("anonymousId".into(), serde_json::json!(anonymous_id));
    properties.insert("appVersion".into(), serde_json::json!(context.app_version));
    properties.insert("buildType".into(), serde_json::json!(context.build_type));
    properties.insert(
        "controlNumber".into(),
        serde_json::json!(context.control_number),
    );
    properties.insert(
        "controlGroup".into(),
        serde_json::json!(context.control_group),
    );

    let body = serde_json::json!({
        "anonymousId": anonymous_id,
        "event": event.name,
        "integrations": { "Amplitude": { "session_id": context.session_id } },
        "context": {
            "traits": { "telemetry": if granted { "enabled" } else { "disabled" } },
        },
        "properties": properties,
    });

    // Fire and forget: failures are logged at debug and dropped.
    match client
        .post(url)
        .basic_auth(write_key, Some(""))
        .json(&body)
        .send()
        .await
    {
        Ok(resp) if !resp.status().is_success() => {
            tracing::debug!(status = %resp.status(), event = %event.name, "analytics sink rejected event");
        }
        Ok(_) => {}
        Err(e) => {
            tracing::debug!(error = %e, event = %event.name, "analytics delivery failed");
        }
    }
}
