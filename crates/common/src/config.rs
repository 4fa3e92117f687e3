//! Application configuration.

use serde::Deserialize;

/// Application configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Server configuration.
    pub server: ServerConfig,
    /// Database configuration.
    #[serde(default)]
    pub database: Option<DatabaseConfig>,
    /// Data backend configuration.
    #[serde(default)]
    pub data: DataConfig,
    /// Feed configuration.
    #[serde(default)]
    pub feed: FeedConfig,
}

/// Server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Host to bind to.
    #[serde(default = "default_host")]
    pub host: String,
    /// Port to bind to.
    #[serde(default = "default_port")]
    pub port: u16,
}

/// Database connection configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// `PostgreSQL` connection URL.
    pub url: String,
    /// Maximum number of connections in the pool.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// Minimum number of connections in the pool.
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
}

/// Which backend serves the poll/vote store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataBackend {
    /// Durable Postgres store.
    Postgres,
    /// In-process fixture for local development.
    Memory,
}

/// Data backend selection.
#[derive(Debug, Clone, Deserialize)]
pub struct DataConfig {
    /// Backend to use. Defaults to Postgres.
    #[serde(default = "default_backend")]
    pub backend: DataBackend,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
        }
    }
}

/// Feed configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct FeedConfig {
    /// Hard cap on the feed page size.
    #[serde(default = "default_feed_max_limit")]
    pub max_limit: u64,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            max_limit: default_feed_max_limit(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

const fn default_port() -> u16 {
    3000
}

const fn default_max_connections() -> u32 {
    100
}

const fn default_min_connections() -> u32 {
    5
}

const fn default_backend() -> DataBackend {
    DataBackend::Postgres
}

const fn default_feed_max_limit() -> u64 {
    50
}

impl Config {
    /// Load configuration from files and environment variables.
    ///
    /// Configuration is loaded in the following order:
    /// 1. `config/default.toml`
    /// 2. `config/{environment}.toml` (based on `OPINE_ENV`)
    /// 3. Environment variables with `OPINE` prefix
    pub fn load() -> Result<Self, config::ConfigError> {
        // Pick up a local .env before reading OPINE_* variables.
        dotenvy::dotenv().ok();

        let env = std::env::var("OPINE_ENV").unwrap_or_else(|_| "development".to_string());

        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{env}")).required(false))
            .add_source(
                config::Environment::with_prefix("OPINE")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }
}
