use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};
use thiserror::Error;
use url::Url;

use super::{
    AuthConfig, Config, ConfigMetadata, ConfigWarnings, CorsConfig, DEFAULT_JWT_SECRET,
    DEFAULT_WORKER_URL, DatabaseConfig, RealtimeConfig, ServerConfig, WorkerConfig,
    sources::{EnvConfig, FileConfig},
};

const DEFAULT_CONFIG_LOCATIONS: [&str; 2] = ["argus.toml", "config/argus.toml"];

#[derive(Debug, Default, Clone)]
struct ConfigLoaderOptions {
    config_path: Option<PathBuf>,
    env_file: Option<PathBuf>,
}

/// Builds [`Config`] from environment variables, an optional TOML file, and
/// defaults, in that order of precedence.
#[derive(Debug, Default)]
pub struct ConfigLoader {
    options: ConfigLoaderOptions,
}

#[derive(Debug)]
pub struct ConfigLoad {
    pub config: Config,
    pub warnings: ConfigWarnings,
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.options.config_path = Some(path.into());
        self
    }

    pub fn with_env_file<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.options.env_file = Some(path.into());
        self
    }

    /// Load `.env` (or the file set with [`Self::with_env_file`]), then
    /// compose from the process environment. A missing env file is not an
    /// error.
    pub fn load(&self) -> Result<ConfigLoad, ConfigLoadError> {
        let env_file_loaded = match &self.options.env_file {
            Some(path) => dotenvy::from_path(path).map(|_| true).or_else(|err| match err {
                dotenvy::Error::Io(_) => Ok(false),
                _ => Err(err),
            })?,
            None => dotenvy::dotenv().map(|_| true).or_else(|err| match err {
                dotenvy::Error::Io(_) => Ok(false),
                _ => Err(err),
            })?,
        };

        let mut load = self.load_from(EnvConfig::gather())?;
        load.config.metadata.env_file_loaded = env_file_loaded;
        Ok(load)
    }

    /// Compose from an explicit environment snapshot.
    pub fn load_from(&self, env: EnvConfig) -> Result<ConfigLoad, ConfigLoadError> {
        let (file, config_path) = self.load_file_config(&env)?;
        self.compose_config(file, env, config_path)
    }

    fn load_file_config(
        &self,
        env: &EnvConfig,
    ) -> Result<(Option<FileConfig>, Option<PathBuf>), ConfigLoadError> {
        let (path, explicit) = match (&self.options.config_path, &env.config_path) {
            (Some(path), _) | (None, Some(path)) => (path.clone(), true),
            (None, None) => match DEFAULT_CONFIG_LOCATIONS
                .iter()
                .map(PathBuf::from)
                .find(|candidate| candidate.exists())
            {
                Some(path) => (path, false),
                None => return Ok((None, None)),
            },
        };

        if !path.exists() {
            if explicit {
                return Err(ConfigLoadError::MissingConfig { path });
            }
            return Ok((None, None));
        }

        let file = read_file_config(&path)?;
        Ok((Some(file), Some(path)))
    }

    fn compose_config(
        &self,
        file: Option<FileConfig>,
        env: EnvConfig,
        config_path: Option<PathBuf>,
    ) -> Result<ConfigLoad, ConfigLoadError> {
        let mut warnings = ConfigWarnings::default();
        let file_present = file.is_some();
        let FileConfig {
            server: file_server,
            database: file_database,
            auth: file_auth,
            worker: file_worker,
            realtime: file_realtime,
            cors: file_cors,
        } = file.unwrap_or_default();

        let server = ServerConfig {
            host: env
                .server_host
                .or(file_server.host)
                .unwrap_or_else(|| "0.0.0.0".to_string()),
            port: env.server_port.or(file_server.port).unwrap_or(8000),
        };

        let database = DatabaseConfig {
            url: match env
                .database_url
                .or(file_database.url)
                .filter(|url| !url.trim().is_empty())
            {
                Some(url) => Some(validate_database_url(url)?),
                None => None,
            },
        };

        let auth = AuthConfig {
            jwt_secret: env
                .jwt_secret
                .or(file_auth.jwt_secret)
                .unwrap_or_else(|| DEFAULT_JWT_SECRET.to_string()),
        };

        let base_url = env
            .worker_url
            .or(file_worker.base_url)
            .unwrap_or_else(|| DEFAULT_WORKER_URL.to_string());
        Url::parse(&base_url).map_err(|source| ConfigLoadError::InvalidWorkerUrl {
            url: base_url.clone(),
            source,
        })?;
        let worker = WorkerConfig {
            base_url,
            timeout: parse_duration(
                "worker.timeout",
                env.worker_timeout.or(file_worker.timeout),
                argus_core::lifecycle::DEFAULT_WORKER_TIMEOUT,
            )?,
        };

        let realtime = RealtimeConfig {
            heartbeat_interval: parse_duration(
                "realtime.heartbeat_interval",
                env.heartbeat_interval.or(file_realtime.heartbeat_interval),
                crate::infra::websocket::DEFAULT_HEARTBEAT_INTERVAL,
            )?,
            outbound_buffer: env
                .outbound_buffer
                .or(file_realtime.outbound_buffer)
                .unwrap_or(crate::infra::websocket::DEFAULT_OUTBOUND_BUFFER),
        };
        if realtime.heartbeat_interval.is_zero() {
            return Err(ConfigLoadError::ZeroDuration {
                field: "realtime.heartbeat_interval",
            });
        }
        if worker.timeout.is_zero() {
            return Err(ConfigLoadError::ZeroDuration {
                field: "worker.timeout",
            });
        }
        if realtime.outbound_buffer == 0 {
            return Err(ConfigLoadError::ZeroOutboundBuffer);
        }

        let cors = CorsConfig {
            allowed_origins: env
                .cors_allowed_origins
                .or(file_cors.allowed_origins)
                .unwrap_or_else(default_cors_origins),
        };

        if !file_present {
            warnings.push_with_hint(
                "No argus.toml detected; using environment variables and defaults",
                "Pass --config or set ARGUS_CONFIG to point at a configuration file",
            );
        }
        if auth.uses_default_secret() {
            warnings.push_with_hint(
                "JWT secret is the built-in default",
                "Set JWT_SECRET or auth.jwt_secret before exposing the server",
            );
        }
        if database.url.is_none() {
            warnings.push_with_hint(
                "No database configured; cameras and alerts are kept in memory",
                "Set DATABASE_URL or database.url to persist state",
            );
        }

        let config = Config {
            server,
            database,
            auth,
            worker,
            realtime,
            cors,
            metadata: ConfigMetadata {
                config_path,
                env_file_loaded: false,
            },
        };

        Ok(ConfigLoad { config, warnings })
    }
}

fn read_file_config(path: &Path) -> Result<FileConfig, ConfigLoadError> {
    let contents = fs::read_to_string(path).map_err(|err| ConfigLoadError::Io {
        path: path.to_path_buf(),
        source: err,
    })?;
    toml::from_str(&contents).map_err(|err| ConfigLoadError::Parse {
        path: path.to_path_buf(),
        source: err,
    })
}

fn validate_database_url(url: String) -> Result<String, ConfigLoadError> {
    let parsed =
        Url::parse(url.trim()).map_err(|source| ConfigLoadError::InvalidDatabaseUrl { source })?;
    match parsed.scheme() {
        "postgres" | "postgresql" => Ok(url.trim().to_string()),
        other => Err(ConfigLoadError::UnsupportedDatabaseScheme {
            scheme: other.to_string(),
        }),
    }
}

fn parse_duration(
    field: &'static str,
    raw: Option<String>,
    default: Duration,
) -> Result<Duration, ConfigLoadError> {
    match raw {
        Some(value) => humantime::parse_duration(value.trim()).map_err(|source| {
            ConfigLoadError::InvalidDuration {
                field,
                value,
                source,
            }
        }),
        None => Ok(default),
    }
}

pub(crate) fn default_cors_origins() -> Vec<String> {
    vec![
        "http://localhost:3000".to_string(),
        "http://localhost:5173".to_string(),
    ]
}

#[derive(Debug, Error)]
pub enum ConfigLoadError {
    #[error("configuration file missing: {}", path.display())]
    MissingConfig { path: PathBuf },
    #[error("failed to read configuration {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse configuration {}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("invalid database URL")]
    InvalidDatabaseUrl {
        #[source]
        source: url::ParseError,
    },
    #[error("unsupported database scheme '{scheme}'; only PostgreSQL is supported")]
    UnsupportedDatabaseScheme { scheme: String },
    #[error("invalid worker URL '{url}'")]
    InvalidWorkerUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },
    #[error("invalid duration '{value}' for {field}")]
    InvalidDuration {
        field: &'static str,
        value: String,
        #[source]
        source: humantime::DurationError,
    },
    #[error("{field} must be greater than zero")]
    ZeroDuration { field: &'static str },
    #[error("realtime.outbound_buffer must be greater than zero")]
    ZeroOutboundBuffer,
    #[error(transparent)]
    EnvFile(#[from] dotenvy::Error),
}
