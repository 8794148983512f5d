// crates/market-store-config/src/config.rs
// ============================================================================
// Module: Market Store Configuration
// Description: Configuration loading and validation for the market store.
// Purpose: Provide strict, fail-closed config parsing with hard limits.
// Dependencies: market-store-core, market-store-sqlite, serde, toml
// ============================================================================

//! ## Overview
//! Configuration is loaded from a TOML file with strict size and path limits.
//! Every section has defaults, so an empty file is a valid configuration.
//! Missing or invalid configuration fails closed.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::env;
use std::fs;
use std::path::Path;
use std::path::PathBuf;

use market_store_core::DEFAULT_MAX_CHUNK_ROWS;
use market_store_core::DatabaseOptions;
use market_store_core::ReferenceZone;
use market_store_sqlite::DEFAULT_BUSY_TIMEOUT_MS;
use market_store_sqlite::SqliteStoreConfig;
use market_store_sqlite::SqliteStoreMode;
use market_store_sqlite::SqliteSyncMode;
use market_store_sqlite::validate_store_path;
use serde::Deserialize;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default configuration filename when no path is specified.
const DEFAULT_CONFIG_NAME: &str = "market-store.toml";
/// Environment variable used to override the config path.
pub const CONFIG_ENV_VAR: &str = "MARKET_STORE_CONFIG";
/// Maximum configuration file size in bytes.
pub(crate) const MAX_CONFIG_FILE_SIZE: usize = 1024 * 1024;
/// Maximum length of a single path component.
const MAX_PATH_COMPONENT_LENGTH: usize = 255;
/// Maximum total path length.
const MAX_TOTAL_PATH_LENGTH: usize = 4096;
/// Default series store file.
const DEFAULT_STORE_PATH: &str = "market-store.sqlite";
/// Default reference zone.
const DEFAULT_TIMEZONE: &str = "+00:00";
/// Default tracing filter.
const DEFAULT_LOG_FILTER: &str = "info";
/// Upper bound for rows per insert statement.
pub const MAX_CHUNK_ROWS: usize = 10_000;
/// Upper bound for the `SQLite` busy timeout.
pub const MAX_BUSY_TIMEOUT_MS: u64 = 60_000;
/// Maximum length of the tracing filter directive.
const MAX_LOG_FILTER_LENGTH: usize = 1024;

// ============================================================================
// SECTION: Configuration Types
// ============================================================================

/// Market store configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MarketStoreConfig {
    /// Reference zone as a fixed UTC offset (`+08:00`).
    #[serde(default = "default_timezone")]
    pub timezone: String,
    /// Series store configuration.
    #[serde(default)]
    pub store: StoreConfig,
    /// Overview ledger configuration.
    #[serde(default)]
    pub ledger: LedgerConfig,
    /// Ingestion configuration.
    #[serde(default)]
    pub ingest: IngestConfig,
    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for MarketStoreConfig {
    fn default() -> Self {
        Self {
            timezone: default_timezone(),
            store: StoreConfig::default(),
            ledger: LedgerConfig::default(),
            ingest: IngestConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl MarketStoreConfig {
    /// Loads configuration from disk using the default resolution rules.
    ///
    /// The explicit path wins, then [`CONFIG_ENV_VAR`], then
    /// `market-store.toml` in the working directory.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when loading or validation fails.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let resolved = resolve_path(path)?;
        validate_path(&resolved)?;
        let bytes = fs::read(&resolved).map_err(|err| ConfigError::Io(err.to_string()))?;
        if bytes.len() > MAX_CONFIG_FILE_SIZE {
            return Err(ConfigError::Invalid("config file exceeds size limit".to_string()));
        }
        let content = std::str::from_utf8(&bytes)
            .map_err(|_| ConfigError::Invalid("config file must be utf-8".to_string()))?;
        let config: Self =
            toml::from_str(content).map_err(|err| ConfigError::Parse(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration for internal consistency.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when configuration is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.reference_zone()?;
        self.store.validate()?;
        self.ledger.validate()?;
        self.ingest.validate()?;
        self.logging.validate()?;
        Ok(())
    }

    /// Returns the parsed reference zone.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when `timezone` is not a fixed offset.
    pub fn reference_zone(&self) -> Result<ReferenceZone, ConfigError> {
        ReferenceZone::parse(self.timezone.trim())
            .map_err(|err| ConfigError::Invalid(format!("timezone: {err}")))
    }

    /// Returns orchestrator options derived from the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when `timezone` is invalid.
    pub fn database_options(&self) -> Result<DatabaseOptions, ConfigError> {
        Ok(DatabaseOptions {
            zone: self.reference_zone()?,
            max_chunk_rows: self.ingest.chunk_rows,
        })
    }

    /// Returns the `SQLite` settings of the keyed ledger, if configured.
    ///
    /// The ledger shares the store's pragmas and busy timeout.
    #[must_use]
    pub fn ledger_sqlite_config(&self) -> Option<SqliteStoreConfig> {
        match (self.ledger.backend, &self.ledger.path) {
            (LedgerBackend::Sqlite, Some(path)) => Some(SqliteStoreConfig {
                path: path.clone(),
                ..self.store.sqlite_config()
            }),
            _ => None,
        }
    }
}

/// Series store configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StoreConfig {
    /// `SQLite` database path.
    #[serde(default = "default_store_path")]
    pub path: PathBuf,
    /// Busy timeout in milliseconds.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
    /// `SQLite` journal mode.
    #[serde(default)]
    pub journal_mode: SqliteStoreMode,
    /// `SQLite` synchronous mode.
    #[serde(default)]
    pub sync_mode: SqliteSyncMode,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: default_store_path(),
            busy_timeout_ms: default_busy_timeout_ms(),
            journal_mode: SqliteStoreMode::default(),
            sync_mode: SqliteSyncMode::default(),
        }
    }
}

impl StoreConfig {
    /// Returns the `SQLite` settings of the series store.
    #[must_use]
    pub fn sqlite_config(&self) -> SqliteStoreConfig {
        SqliteStoreConfig {
            path: self.path.clone(),
            busy_timeout_ms: self.busy_timeout_ms,
            journal_mode: self.journal_mode,
            sync_mode: self.sync_mode,
        }
    }

    /// Validates series store configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        validate_store_path(&self.path).map_err(|err| ConfigError::Invalid(format!("store.path: {err}")))?;
        if self.busy_timeout_ms == 0 || self.busy_timeout_ms > MAX_BUSY_TIMEOUT_MS {
            return Err(ConfigError::Invalid(format!(
                "store.busy_timeout_ms must be between 1 and {MAX_BUSY_TIMEOUT_MS}"
            )));
        }
        Ok(())
    }
}

/// Overview ledger backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum LedgerBackend {
    /// Overviews kept as tags on the series tables.
    #[default]
    Tags,
    /// Overviews kept in a keyed `SQLite` table.
    Sqlite,
}

/// Overview ledger configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct LedgerConfig {
    /// Ledger backend.
    #[serde(default)]
    pub backend: LedgerBackend,
    /// `SQLite` path when using the sqlite backend.
    #[serde(default)]
    pub path: Option<PathBuf>,
}

impl LedgerConfig {
    /// Validates overview ledger configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        match self.backend {
            LedgerBackend::Tags => {
                if self.path.is_some() {
                    return Err(ConfigError::Invalid("tags ledger must not set path".to_string()));
                }
                Ok(())
            }
            LedgerBackend::Sqlite => {
                let path = self
                    .path
                    .as_ref()
                    .ok_or_else(|| ConfigError::Invalid("sqlite ledger requires path".to_string()))?;
                validate_store_path(path)
                    .map_err(|err| ConfigError::Invalid(format!("ledger.path: {err}")))
            }
        }
    }
}

/// Ingestion configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IngestConfig {
    /// Maximum rows per insert statement.
    #[serde(default = "default_chunk_rows")]
    pub chunk_rows: usize,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            chunk_rows: default_chunk_rows(),
        }
    }
}

impl IngestConfig {
    /// Validates ingestion configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.chunk_rows == 0 || self.chunk_rows > MAX_CHUNK_ROWS {
            return Err(ConfigError::Invalid(format!(
                "ingest.chunk_rows must be between 1 and {MAX_CHUNK_ROWS}"
            )));
        }
        Ok(())
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// Tracing filter directive (`info`, `market_store_core=debug`).
    #[serde(default = "default_log_filter")]
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: default_log_filter(),
        }
    }
}

impl LoggingConfig {
    /// Validates logging configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        let filter = self.filter.trim();
        if filter.is_empty() {
            return Err(ConfigError::Invalid("logging.filter must be non-empty".to_string()));
        }
        if filter.len() > MAX_LOG_FILTER_LENGTH {
            return Err(ConfigError::Invalid("logging.filter exceeds max length".to_string()));
        }
        Ok(())
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Configuration loading or validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// I/O failure while reading configuration.
    #[error("config io error: {0}")]
    Io(String),
    /// TOML parsing error.
    #[error("config parse error: {0}")]
    Parse(String),
    /// Invalid configuration data.
    #[error("invalid config: {0}")]
    Invalid(String),
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Resolves the config path from CLI or environment defaults.
fn resolve_path(path: Option<&Path>) -> Result<PathBuf, ConfigError> {
    if let Some(path) = path {
        return Ok(path.to_path_buf());
    }
    if let Ok(env_path) = env::var(CONFIG_ENV_VAR) {
        if env_path.len() > MAX_TOTAL_PATH_LENGTH {
            return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
        }
        return Ok(PathBuf::from(env_path));
    }
    Ok(PathBuf::from(DEFAULT_CONFIG_NAME))
}

/// Validates the resolved path against security limits.
fn validate_path(path: &Path) -> Result<(), ConfigError> {
    let text = path.to_string_lossy();
    if text.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
    }
    for component in path.components() {
        let value = component.as_os_str().to_string_lossy();
        if value.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(ConfigError::Invalid("config path component too long".to_string()));
        }
    }
    Ok(())
}

/// Default reference zone.
fn default_timezone() -> String {
    DEFAULT_TIMEZONE.to_string()
}

/// Default series store path.
fn default_store_path() -> PathBuf {
    PathBuf::from(DEFAULT_STORE_PATH)
}

/// Default busy timeout.
const fn default_busy_timeout_ms() -> u64 {
    DEFAULT_BUSY_TIMEOUT_MS
}

/// Default rows per insert statement.
const fn default_chunk_rows() -> usize {
    DEFAULT_MAX_CHUNK_ROWS
}

/// Default tracing filter.
fn default_log_filter() -> String {
    DEFAULT_LOG_FILTER.to_string()
}
