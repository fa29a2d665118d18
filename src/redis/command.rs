//! Single raw-command seam over the fred client.
//!
//! Browser, CLI and overview handlers all issue commands through [`exec`]
//! and map replies with the `Value` helpers below. Every operation is a
//! direct command mapping; ordering and atomicity are delegated to the
//! server.

use std::time::Duration;

use fred::clients::Pool;
use fred::interfaces::ClientLike;
use fred::types::{CustomCommand, Value};

use crate::error::ApiError;

/// Issue one command with a deadline. A timeout reads as an unreachable
/// target (424), same as a transport failure.
pub async fn exec(
    pool: &Pool,
    cmd: &str,
    args: Vec<Value>,
    timeout: Duration,
) -> Result<Value, ApiError> {
    let command = CustomCommand::new(cmd.to_ascii_uppercase(), None, false);
    match tokio::time::timeout(timeout, pool.custom::<Value, _>(command, args)).await {
        Ok(reply) => Ok(reply?),
        Err(_) => Err(ApiError::FailedDependency(format!(
            "redis command {} timed out",
            cmd.to_ascii_uppercase()
        ))),
    }
}

pub fn to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.to_string(),
        Value::Bytes(b) => String::from_utf8_lossy(b).into_owned(),
        Value::Integer(i) => i.to_string(),
        Value::Double(d) => d.to_string(),
        Value::Boolean(b) => b.to_string(),
        Value::Null => String::new(),
        other => format!("{other:?}"),
    }
}

pub fn to_i64(value: &Value) -> Result<i64, ApiError> {
    match value {
        Value::Integer(i) => Ok(*i),
        Value::String(s) => s
            .parse::<i64>()
            .map_err(|_| ApiError::Internal(anyhow::anyhow!("expected integer reply, got {s}"))),
        other => Err(ApiError::Internal(anyhow::anyhow!(
            "expected integer reply, got {other:?}"
        ))),
    }
}

pub fn into_array(value: Value) -> Result<Vec<Value>, ApiError> {
    match value {
        Value::Array(items) => Ok(items),
        Value::Null => Ok(Vec::new()),
        other => Err(ApiError::Internal(anyhow::anyhow!(
            "expected array reply, got {other:?}"
        ))),
    }
}

/// Flatten a `[field, value, field, value, ...]` reply into pairs.
pub fn into_pairs(value: Value) -> Result<Vec<(String, String)>, ApiError> {
    let items = into_array(value)?;
    let mut pairs = Vec::with_capacity(items.len() / 2);
    let mut iter = items.into_iter();
    while let (Some(field), Some(val)) = (iter.next(), iter.next()) {
        pairs.push((to_string(&field), to_string(&val)));
    }
    Ok(pairs)
}

/// Split a SCAN-family reply `[cursor, [items...]]`.
pub fn into_scan_page(value: Value) -> Result<(String, Vec<Value>), ApiError> {
    let mut items = into_array(value)?;
    if items.len() != 2 {
        return Err(ApiError::Internal(anyhow::anyhow!(
            "malformed scan reply ({} elements)",
            items.len()
        )));
    }
    let members = into_array(items.remove(1))?;
    let cursor = to_string(&items.remove(0));
    Ok((cursor, members))
}

/// Render an arbitrary reply as JSON (CLI / workbench output).
pub fn into_json(value: Value) -> serde_json::Value {
    match value {
        Value::Null => serde_json::Value::Null,
        Value::Integer(i) => serde_json::json!(i),
        Value::Double(d) => serde_json::json!(d),
        Value::Boolean(b) => serde_json::json!(b),
        Value::String(s) => serde_json::json!(s.to_string()),
        Value::Bytes(b) => serde_json::json!(String::from_utf8_lossy(&b).into_owned()),
        Value::Array(items) => {
            serde_json::Value::Array(items.into_iter().map(into_json).collect())
        }
        Value::Map(map) => {
            let mut obj = serde_json::Map::new();
            for (key, val) in map.inner() {
                obj.insert(
                    String::from_utf8_lossy(key.as_bytes()).into_owned(),
                    into_json(val),
                );
            }
            serde_json::Value::Object(obj)
        }
        other => serde_json::json!(format!("{other:?}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pairs_from_flat_array() {
        let reply = Value::Array(vec![
            Value::from("field1"),
            Value::from("value1"),
            Value::from("field2"),
            Value::from("value2"),
        ]);
        let pairs = into_pairs(reply).unwrap();
        assert_eq!(
            pairs,
            vec![
                ("field1".to_string(), "value1".to_string()),
                ("field2".to_string(), "value2".to_string()),
            ]
        );
    }

    #[test]
    fn scan_page_splits_cursor_and_members() {
        let reply = Value::Array(vec![
            Value::from("42"),
            Value::Array(vec![Value::from("key:1"), Value::from("key:2")]),
        ]);
        let (cursor, members) = into_scan_page(reply).unwrap();
        assert_eq!(cursor, "42");
        assert_eq!(members.len(), 2);
    }

    #[test]
    fn scan_page_rejects_malformed_reply() {
        assert!(into_scan_page(Value::Array(vec![Value::from("0")])).is_err());
        assert!(into_scan_page(Value::Integer(3)).is_err());
    }

    #[test]
    fn null_reply_reads_as_empty_array() {
        assert!(into_array(Value::Null).unwrap().is_empty());
    }

    #[test]
    fn json_rendering_nested() {
        let reply = Value::Array(vec![
            Value::Integer(7),
            Value::from("ok"),
            Value::Array(vec![Value::Null]),
        ]);
        assert_eq!(into_json(reply), serde_json::json!([7, "ok", [null]]));
    }

    #[test]
    fn integer_coercion_from_bulk_string() {
        assert_eq!(to_i64(&Value::from("123")).unwrap(), 123);
        assert_eq!(to_i64(&Value::Integer(5)).unwrap(), 5);
        assert!(to_i64(&Value::Null).is_err());
    }
}
