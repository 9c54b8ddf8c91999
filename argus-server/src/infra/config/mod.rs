pub mod loader;
pub mod sources;

use std::{path::PathBuf, time::Duration};

pub use loader::{ConfigLoad, ConfigLoadError, ConfigLoader};

pub const DEFAULT_JWT_SECRET: &str = "your-super-secret-jwt-key-change-in-production";
pub const DEFAULT_WORKER_URL: &str = "http://localhost:8080";

#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    pub worker: WorkerConfig,
    pub realtime: RealtimeConfig,
    pub cors: CorsConfig,
    pub metadata: ConfigMetadata,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Default)]
pub struct DatabaseConfig {
    /// In-memory stores are used when absent.
    pub url: Option<String>,
}

#[derive(Clone)]
pub struct AuthConfig {
    pub jwt_secret: String,
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("jwt_secret", &"<redacted>")
            .finish()
    }
}

impl AuthConfig {
    pub fn uses_default_secret(&self) -> bool {
        self.jwt_secret == DEFAULT_JWT_SECRET
    }
}

#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub base_url: String,
    pub timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct RealtimeConfig {
    pub heartbeat_interval: Duration,
    pub outbound_buffer: usize,
}

#[derive(Debug, Clone)]
pub struct CorsConfig {
    pub allowed_origins: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct ConfigMetadata {
    pub config_path: Option<PathBuf>,
    pub env_file_loaded: bool,
}

impl Config {
    /// Defaults for local development and tests.
    pub fn development() -> Self {
        Self {
            server: ServerConfig {
                host: "0.0.0.0".into(),
                port: 8000,
            },
            database: DatabaseConfig::default(),
            auth: AuthConfig {
                jwt_secret: DEFAULT_JWT_SECRET.into(),
            },
            worker: WorkerConfig {
                base_url: DEFAULT_WORKER_URL.into(),
                timeout: argus_core::lifecycle::DEFAULT_WORKER_TIMEOUT,
            },
            realtime: RealtimeConfig {
                heartbeat_interval: crate::infra::websocket::DEFAULT_HEARTBEAT_INTERVAL,
                outbound_buffer: crate::infra::websocket::DEFAULT_OUTBOUND_BUFFER,
            },
            cors: CorsConfig {
                allowed_origins: loader::default_cors_origins(),
            },
            metadata: ConfigMetadata::default(),
        }
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigWarning {
    pub message: String,
    pub hint: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct ConfigWarnings {
    pub items: Vec<ConfigWarning>,
}

impl ConfigWarnings {
    pub fn push<S: Into<String>>(&mut self, message: S) {
        self.items.push(ConfigWarning {
            message: message.into(),
            hint: None,
        });
    }

    pub fn push_with_hint<S: Into<String>, H: Into<String>>(&mut self, message: S, hint: H) {
        self.items.push(ConfigWarning {
            message: message.into(),
            hint: Some(hint.into()),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }
}
