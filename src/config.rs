use std::env;
use std::path::PathBuf;

pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Debug, Clone)]
pub struct Config {
    pub listen: String,
    pub database_path: PathBuf,
    pub master_key: Option<String>,
    pub build_type: String,
    pub package_type: Option<String>,
    /// Analytics sink base URL. Telemetry is disabled entirely when unset.
    pub analytics_endpoint: Option<String>,
    pub analytics_write_key: String,
    /// Per-command timeout used when a profile does not override it.
    pub default_command_timeout_ms: u64,
    pub cors_origins: Vec<String>,
    pub dev_mode: bool,
}

fn parse_cors_origins(s: &str) -> Vec<String> {
    s.split(',').map(|s| s.trim().to_owned()).collect()
}

impl Config {
    pub fn load() -> Self {
        Self {
            listen: env::var("REDISBOARD_LISTEN").unwrap_or_else(|_| "0.0.0.0:5540".into()),
            database_path: env::var("REDISBOARD_DB_PATH")
                .map_or_else(|_| PathBuf::from("redisboard.db"), PathBuf::from),
            master_key: env::var("REDISBOARD_MASTER_KEY").ok(),
            build_type: env::var("REDISBOARD_BUILD_TYPE").unwrap_or_else(|_| "docker".into()),
            package_type: env::var("REDISBOARD_PACKAGE_TYPE").ok(),
            analytics_endpoint: env::var("REDISBOARD_ANALYTICS_ENDPOINT").ok(),
            analytics_write_key: env::var("REDISBOARD_ANALYTICS_WRITE_KEY").unwrap_or_default(),
            default_command_timeout_ms: env::var("REDISBOARD_COMMAND_TIMEOUT_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(30_000),
            cors_origins: env::var("REDISBOARD_CORS_ORIGINS")
                .ok()
                .map_or_else(Vec::new, |v| parse_cors_origins(&v)),
            dev_mode: env::var("REDISBOARD_DEV").ok().is_some_and(|v| v == "true"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_cors_origins_single() {
        let result = parse_cors_origins("http://localhost:8080");
        assert_eq!(result, vec!["http://localhost:8080"]);
    }

    #[test]
    fn parse_cors_origins_multiple_with_spaces() {
        let result = parse_cors_origins("http://a.com, http://b.com , http://c.com");
        assert_eq!(result, vec!["http://a.com", "http://b.com", "http://c.com"]);
    }

    #[test]
    fn default_listen_port() {
        let config = Config::load();
        if env::var("REDISBOARD_LISTEN").is_err() {
            assert_eq!(config.listen, "0.0.0.0:5540");
        }
    }

    #[test]
    fn default_command_timeout() {
        let config = Config::load();
        if env::var("REDISBOARD_COMMAND_TIMEOUT_MS").is_err() {
            assert_eq!(config.default_command_timeout_ms, 30_000);
        }
    }
}
