use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Raw configuration as defined in a TOML file.
#[derive(Debug, Default, Clone, Deserialize, Serialize)]
#[serde(rename_all = "snake_case", deny_unknown_fields)]
pub struct FileConfig {
    #[serde(default)]
    pub server: FileServerConfig,
    #[serde(default)]
    pub database: FileDatabaseConfig,
    #[serde(default)]
    pub auth: FileAuthConfig,
    #[serde(default)]
    pub worker: FileWorkerConfig,
    #[serde(default)]
    pub realtime: FileRealtimeConfig,
    #[serde(default)]
    pub cors: FileCorsConfig,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct FileServerConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct FileDatabaseConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct FileAuthConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jwt_secret: Option<String>,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct FileWorkerConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    /// Humantime string, e.g. `"10s"`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout: Option<String>,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct FileRealtimeConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub heartbeat_interval: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outbound_buffer: Option<usize>,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct FileCorsConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allowed_origins: Option<Vec<String>>,
}

/// Environment-derived configuration values.
#[derive(Debug, Default, Clone)]
pub struct EnvConfig {
    pub config_path: Option<PathBuf>,
    pub server_host: Option<String>,
    pub server_port: Option<u16>,
    pub database_url: Option<String>,
    pub jwt_secret: Option<String>,
    pub worker_url: Option<String>,
    pub worker_timeout: Option<String>,
    pub heartbeat_interval: Option<String>,
    pub outbound_buffer: Option<usize>,
    pub cors_allowed_origins: Option<Vec<String>>,
}

impl EnvConfig {
    pub fn gather() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        Self {
            config_path: var("ARGUS_CONFIG").map(PathBuf::from),
            server_host: var("SERVER_HOST"),
            server_port: var("SERVER_PORT")
                .or_else(|| var("PORT"))
                .and_then(|s| s.parse().ok()),
            database_url: var("DATABASE_URL"),
            jwt_secret: var("JWT_SECRET"),
            worker_url: var("WORKER_URL"),
            worker_timeout: var("WORKER_TIMEOUT"),
            heartbeat_interval: var("HEARTBEAT_INTERVAL"),
            outbound_buffer: var("OUTBOUND_BUFFER").and_then(|s| s.parse().ok()),
            cors_allowed_origins: var("CORS_ALLOWED_ORIGINS").map(|raw| parse_csv(&raw)),
        }
    }
}

fn parse_csv(raw: &str) -> Vec<String> {
    raw.split(',')
        .filter_map(|part| {
            let trimmed = part.trim();
            if trimmed.is_empty() {
                None
            } else {
                Some(trimmed.to_string())
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    #[test]
    fn lookup_parses_typed_values() {
        let vars = HashMap::from([
            ("PORT", "9000"),
            ("OUTBOUND_BUFFER", "64"),
            ("CORS_ALLOWED_ORIGINS", "http://a.test, ,http://b.test"),
            ("DATABASE_URL", "  "),
        ]);
        let env = EnvConfig::from_lookup(|name| vars.get(name).map(|v| v.to_string()));

        assert_eq!(env.server_port, Some(9000));
        assert_eq!(env.outbound_buffer, Some(64));
        assert_eq!(
            env.cors_allowed_origins,
            Some(vec!["http://a.test".to_string(), "http://b.test".to_string()])
        );
        assert_eq!(env.database_url, None);
    }

    #[test]
    fn server_port_wins_over_port() {
        let vars = HashMap::from([("PORT", "9000"), ("SERVER_PORT", "9100")]);
        let env = EnvConfig::from_lookup(|name| vars.get(name).map(|v| v.to_string()));
        assert_eq!(env.server_port, Some(9100));
    }
}
