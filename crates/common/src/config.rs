//! Application configuration.

use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// Application configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Database configuration.
    pub database: DatabaseConfig,
    /// Search index configuration.
    #[serde(default)]
    pub search: SearchConfig,
    /// Credential and token configuration.
    pub auth: AuthConfig,
}

/// Database connection configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Connection URL (`postgres://...` or `sqlite://...`).
    pub url: String,
    /// Maximum number of connections in the pool.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// Minimum number of connections in the pool.
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
}

/// Which search index implementation to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchBackendKind {
    /// In-process index, lost on restart.
    #[default]
    Memory,
    /// Meilisearch server.
    Meilisearch,
}

/// Search index configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct SearchConfig {
    /// Whether posts are mirrored into the index at all.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Index implementation.
    #[serde(default)]
    pub backend: SearchBackendKind,
    /// Meilisearch host URL (e.g., "<http://localhost:7700>").
    #[serde(default)]
    pub url: Option<String>,
    /// Meilisearch API key.
    #[serde(default)]
    pub api_key: Option<String>,
    /// Per-call timeout for index operations, in milliseconds.
    #[serde(default = "default_search_timeout_ms")]
    pub timeout_ms: u64,
    /// Rows fetched per page while rebuilding an index.
    #[serde(default = "default_reindex_batch_size")]
    pub reindex_batch_size: u64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            backend: SearchBackendKind::Memory,
            url: None,
            api_key: None,
            timeout_ms: default_search_timeout_ms(),
            reindex_batch_size: default_reindex_batch_size(),
        }
    }
}

impl SearchConfig {
    /// Timeout applied to every index call.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Credential and token configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    /// Secret used to sign password reset tokens.
    pub secret_key: String,
    /// Lifetime of a password reset token, in seconds.
    #[serde(default = "default_reset_token_ttl")]
    pub reset_token_ttl_secs: u64,
}

const fn default_max_connections() -> u32 {
    20
}

const fn default_min_connections() -> u32 {
    1
}

const fn default_true() -> bool {
    true
}

const fn default_search_timeout_ms() -> u64 {
    2_000
}

const fn default_reindex_batch_size() -> u64 {
    500
}

const fn default_reset_token_ttl() -> u64 {
    600
}

impl Config {
    /// Load configuration from files and environment variables.
    ///
    /// Configuration is loaded in the following order:
    /// 1. `config/default.toml`
    /// 2. `config/{environment}.toml` (based on `FLOCK_ENV`)
    /// 3. Environment variables with `FLOCK_` prefix
    pub fn load() -> Result<Self, config::ConfigError> {
        let env = std::env::var("FLOCK_ENV").unwrap_or_else(|_| "development".to_string());

        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{env}")).required(false))
            .add_source(
                config::Environment::with_prefix("FLOCK")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    /// Load configuration from a specific file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, config::ConfigError> {
        let config = config::Config::builder()
            .add_source(config::File::from(path.as_ref()))
            .add_source(
                config::Environment::with_prefix("FLOCK")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }
}
