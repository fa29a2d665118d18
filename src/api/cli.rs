//! Raw command execution for the CLI and workbench panes.
//!
//! One command line per request: tokenized shell-style, checked against a
//! blocklist of commands that only make sense on an interactive
//! connection, then executed through the shared raw-command seam.

use axum::extract::{Path, State};
use axum::routing::post;
use axum::{Json, Router};
use fred::types::Value;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ApiError;
use crate::redis::client;
use crate::redis::command;
use crate::store::AppState;
use crate::telemetry::events;

/// Commands that hold the connection open or change its mode; a pooled
/// request/response client cannot host them.
const BLOCKED_COMMANDS: &[&str] = &[
    "monitor",
    "subscribe",
    "psubscribe",
    "ssubscribe",
    "sync",
    "psync",
];

#[derive(Debug, Deserialize)]
pub struct CliRequest {
    pub command: String,
}

#[derive(Debug, Serialize)]
pub struct CliResponse {
    pub response: serde_json::Value,
    pub status: &'static str,
}

pub fn router() -> Router<AppState> {
    Router::new().route("/api/databases/{id}/cli", post(execute))
}

/// Shell-like tokenizer: whitespace-separated, single quotes literal,
/// double quotes with backslash escapes.
pub fn tokenize(line: &str) -> Result<Vec<String>, ApiError> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_token = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            c if c.is_whitespace() => {
                if in_token {
                    tokens.push(std::mem::take(&mut current));
                    in_token = false;
                }
            }
            '\'' => {
                in_token = true;
                loop {
                    match chars.next() {
                        Some('\'') => break,
                        Some(c) => current.push(c),
                        None => {
                            return Err(ApiError::BadRequest(
                                "unbalanced single quote in command".into(),
                            ));
                        }
                    }
                }
            }
            '"' => {
                in_token = true;
                loop {
                    match chars.next() {
                        Some('"') => break,
                        Some('\\') => match chars.next() {
                            Some('n') => current.push('\n'),
                            Some('r') => current.push('\r'),
                            Some('t') => current.push('\t'),
                            Some(c) => current.push(c),
                            None => {
                                return Err(ApiError::BadRequest(
                                    "dangling escape in command".into(),
                                ));
                            }
                        },
                        Some(c) => current.push(c),
                        None => {
                            return Err(ApiError::BadRequest(
                                "unbalanced double quote in command".into(),
                            ));
                        }
                    }
                }
            }
            c => {
                in_token = true;
                current.push(c);
            }
        }
    }
    if in_token {
        tokens.push(current);
    }

    Ok(tokens)
}

#[tracing::instrument(skip(state, body), fields(%id), err)]
async fn execute(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(body): Json<CliRequest>,
) -> Result<Json<CliResponse>, ApiError> {
    let tokens = tokenize(&body.command)?;
    let Some((cmd, args)) = tokens.split_first() else {
        return Err(ApiError::BadRequest("empty command".into()));
    };

    if BLOCKED_COMMANDS.contains(&cmd.to_ascii_lowercase().as_str()) {
        return Err(ApiError::BadRequest(format!(
            "command '{}' is not supported here",
            cmd.to_ascii_uppercase()
        )));
    }

    let (_, redis) = client::connect(&state, &id.to_string()).await?;
    let args: Vec<Value> = args.iter().map(|a| Value::from(a.as_str())).collect();

    let result = redis.exec(cmd, args).await;
    state.telemetry.track(
        events::CLI_COMMAND_EXECUTED,
        serde_json::json!({
            "command": cmd.to_ascii_uppercase(),
            "success": result.is_ok(),
        }),
    );
    let reply = result?;

    Ok(Json(CliResponse {
        response: command::into_json(reply),
        status: "success",
    }))
}
