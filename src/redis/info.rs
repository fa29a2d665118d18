//! Parser for the INFO command's text payload.

use std::collections::HashMap;

use serde::Serialize;

/// Parse INFO output into `section -> { key -> value }`.
/// Lines before the first `# Section` header land in an empty-string section.
pub fn parse_info(raw: &str) -> HashMap<String, HashMap<String, String>> {
    let mut sections: HashMap<String, HashMap<String, String>> = HashMap::new();
    let mut current = String::new();

    for line in raw.lines() {
        let line = line.trim_end_matches('\r');
        if line.is_empty() {
            continue;
        }
        if let Some(header) = line.strip_prefix('#') {
            current = header.trim().to_lowercase();
            sections.entry(current.clone()).or_default();
            continue;
        }
        if let Some((key, value)) = line.split_once(':') {
            sections
                .entry(current.clone())
                .or_default()
                .insert(key.to_owned(), value.to_owned());
        }
    }

    sections
}

/// Summary shown on the database overview panel.
#[derive(Debug, Clone, Serialize)]
pub struct DatabaseOverview {
    pub version: Option<String>,
    pub used_memory: Option<i64>,
    pub connected_clients: Option<i64>,
    pub total_keys: Option<i64>,
    pub uptime_in_seconds: Option<i64>,
}

pub fn overview_from_info(raw: &str) -> DatabaseOverview {
    let sections = parse_info(raw);

    let get = |section: &str, key: &str| -> Option<String> {
        sections.get(section).and_then(|s| s.get(key)).cloned()
    };
    let get_i64 =
        |section: &str, key: &str| -> Option<i64> { get(section, key)?.parse::<i64>().ok() };

    // Keyspace lines look like `db0:keys=12,expires=0,avg_ttl=0`; the total
    // is the sum over all logical databases.
    let total_keys = sections.get("keyspace").map(|keyspace| {
        keyspace
            .values()
            .filter_map(|line| {
                line.split(',')
                    .find_map(|part| part.strip_prefix("keys="))
                    .and_then(|n| n.parse::<i64>().ok())
            })
            .sum()
    });

    DatabaseOverview {
        version: get("server", "redis_version"),
        used_memory: get_i64("memory", "used_memory"),
        connected_clients: get_i64("clients", "connected_clients"),
        total_keys,
        uptime_in_seconds: get_i64("server", "uptime_in_seconds"),
    }
}
