//! API server configuration.
//!
//! ## Layers (later wins)
//! ```text
//! built-in defaults
//!     └── TOML file named by KOSH_CONFIG (optional)
//!             └── KOSH_* environment variables
//!                     └── validate()
//! ```
//!
//! | Key                   | Env var                    | Default          |
//! |-----------------------|----------------------------|------------------|
//! | `http_port`           | `KOSH_HTTP_PORT`           | 8080             |
//! | `bind_addr`           | `KOSH_BIND_ADDR`           | 0.0.0.0          |
//! | `database_path`       | `KOSH_DATABASE_PATH`       | ./kosh.db        |
//! | `db_max_connections`  | `KOSH_DB_MAX_CONNECTIONS`  | 8                |
//! | `busy_timeout_ms`     | `KOSH_BUSY_TIMEOUT_MS`     | 5000             |
//! | `retry_attempts`      | `KOSH_RETRY_ATTEMPTS`      | 5                |
//! | `retry_base_delay_ms` | `KOSH_RETRY_BASE_DELAY_MS` | 20               |

use std::collections::HashMap;
use std::env;
use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

use ::config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use tracing::info;

use kosh_db::{DbConfig, RetryPolicy};

const ENV_PREFIX: &str = "KOSH";
const CONFIG_PATH_VAR: &str = "KOSH_CONFIG";

/// Upper bound on pool size; SQLite has one writer regardless.
const MAX_POOL_SIZE: u32 = 64;
const MAX_RETRY_ATTEMPTS: u32 = 20;

/// API server configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiConfig {
    /// HTTP listen port
    pub http_port: u16,

    /// Interface to bind
    pub bind_addr: String,

    /// SQLite database file
    pub database_path: PathBuf,

    /// Pool size
    pub db_max_connections: u32,

    /// How long a writer waits on SQLite's lock
    pub busy_timeout_ms: u64,

    /// Attempts per write transaction, including the first
    pub retry_attempts: u32,

    /// Linear backoff step between attempts
    pub retry_base_delay_ms: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        ApiConfig {
            http_port: 8080,
            bind_addr: "0.0.0.0".to_string(),
            database_path: PathBuf::from("./kosh.db"),
            db_max_connections: 8,
            busy_timeout_ms: 5_000,
            retry_attempts: 5,
            retry_base_delay_ms: 20,
        }
    }
}

impl ApiConfig {
    /// Loads configuration from the process environment.
    pub fn load() -> Result<Self, ConfigError> {
        let file = env::var(CONFIG_PATH_VAR).ok().map(PathBuf::from);
        Self::load_from(file.as_deref(), None)
    }

    /// Loads configuration from an optional file and an environment map.
    ///
    /// `env_vars = None` reads the real process environment.
    pub fn load_from(
        file: Option<&Path>,
        env_vars: Option<HashMap<String, String>>,
    ) -> Result<Self, ConfigError> {
        let defaults = ApiConfig::default();

        let mut builder = Config::builder()
            .set_default("http_port", i64::from(defaults.http_port))?
            .set_default("bind_addr", defaults.bind_addr)?
            .set_default("database_path", defaults.database_path.display().to_string())?
            .set_default("db_max_connections", i64::from(defaults.db_max_connections))?
            .set_default("busy_timeout_ms", defaults.busy_timeout_ms)?
            .set_default("retry_attempts", i64::from(defaults.retry_attempts))?
            .set_default("retry_base_delay_ms", defaults.retry_base_delay_ms)?;

        if let Some(path) = file {
            info!(path = %path.display(), "Reading configuration file");
            builder = builder.add_source(File::from(path).format(FileFormat::Toml).required(true));
        }

        let config: ApiConfig = builder
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .try_parsing(true)
                    .source(env_vars),
            )
            .build()?
            .try_deserialize()?;

        config.validate()?;
        Ok(config)
    }

    /// Checks ranges that deserialization cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.http_port == 0 {
            return Err(ConfigError::invalid("http_port", "must not be 0"));
        }
        if self.bind_addr.parse::<IpAddr>().is_err() {
            return Err(ConfigError::invalid("bind_addr", "must be an IP address"));
        }
        if self.database_path.as_os_str().is_empty() {
            return Err(ConfigError::invalid("database_path", "must not be empty"));
        }
        if self.db_max_connections == 0 || self.db_max_connections > MAX_POOL_SIZE {
            return Err(ConfigError::invalid(
                "db_max_connections",
                format!("must be between 1 and {MAX_POOL_SIZE}"),
            ));
        }
        if self.retry_attempts == 0 || self.retry_attempts > MAX_RETRY_ATTEMPTS {
            return Err(ConfigError::invalid(
                "retry_attempts",
                format!("must be between 1 and {MAX_RETRY_ATTEMPTS}"),
            ));
        }
        Ok(())
    }

    /// Address to listen on.
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        let ip: IpAddr = self
            .bind_addr
            .parse()
            .map_err(|_| ConfigError::invalid("bind_addr", "must be an IP address"))?;
        Ok(SocketAddr::new(ip, self.http_port))
    }

    /// Database settings derived from this configuration.
    pub fn db_config(&self) -> DbConfig {
        DbConfig::new(&self.database_path)
            .max_connections(self.db_max_connections)
            .busy_timeout(Duration::from_millis(self.busy_timeout_ms))
            .retry(RetryPolicy::new(
                self.retry_attempts,
                Duration::from_millis(self.retry_base_delay_ms),
            ))
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] ::config::ConfigError),

    #[error("Invalid value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

impl ConfigError {
    fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        ConfigError::Invalid {
            field,
            reason: reason.into(),
        }
    }
}
