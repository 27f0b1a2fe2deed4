// crates/carledger-config/src/config.rs
// ============================================================================
// Module: Car Ledger Configuration
// Description: Configuration loading, validation, and assembly.
// Purpose: Provide strict, fail-closed config parsing with hard limits.
// Dependencies: carledger-core, carledger-store-sqlite, serde, toml
// ============================================================================

//! ## Overview
//! Configuration is loaded from a TOML file with strict size and path limits.
//! An explicitly named file must exist; when neither `--config` nor
//! `CARLEDGER_CONFIG` is given and `carledger.toml` is absent, defaults apply.
//! Invalid configuration fails closed.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::env;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;

use carledger_core::CarContract;
use carledger_core::ContractAuditSink;
use carledger_core::ContractConfig;
use carledger_core::FileAuditSink;
use carledger_core::InMemoryLedger;
use carledger_core::NoopAuditSink;
use carledger_core::SharedLedger;
use carledger_core::StderrAuditSink;
use carledger_core::validate_key;
use carledger_store_sqlite::DEFAULT_RANGE_BATCH_SIZE;
use carledger_store_sqlite::SqliteJournalMode;
use carledger_store_sqlite::SqliteLedger;
use carledger_store_sqlite::SqliteLedgerConfig;
use carledger_store_sqlite::SqliteSyncMode;
use serde::Deserialize;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default configuration filename when no path is specified.
pub const DEFAULT_CONFIG_NAME: &str = "carledger.toml";
/// Environment variable used to override the config path.
pub const CONFIG_ENV_VAR: &str = "CARLEDGER_CONFIG";
/// Maximum configuration file size in bytes.
const MAX_CONFIG_FILE_SIZE: usize = 1024 * 1024;
/// Maximum length of a single path component.
const MAX_PATH_COMPONENT_LENGTH: usize = 255;
/// Maximum total path length.
const MAX_TOTAL_PATH_LENGTH: usize = 4096;
/// Default `SQLite` busy timeout in milliseconds.
const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;
/// Maximum `SQLite` busy timeout in milliseconds.
const MAX_BUSY_TIMEOUT_MS: u64 = 60_000;
/// Maximum rows fetched per range-scan batch.
const MAX_RANGE_BATCH_SIZE: usize = 10_000;

// ============================================================================
// SECTION: Configuration Types
// ============================================================================

/// Car ledger configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CarLedgerConfig {
    /// Ledger backend configuration.
    #[serde(default)]
    pub ledger: LedgerConfig,
    /// Contract behavior configuration.
    #[serde(default)]
    pub contract: ContractConfig,
    /// Audit sink configuration.
    #[serde(default)]
    pub audit: AuditConfig,
}

impl CarLedgerConfig {
    /// Loads configuration from disk using the default resolution rules.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when loading or validation fails.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let (resolved, explicit) = resolve_path(path)?;
        validate_path(&resolved)?;
        if !explicit && !resolved.exists() {
            return Ok(Self::default());
        }
        let bytes = read_config_bytes(&resolved)?;
        let content = std::str::from_utf8(&bytes)
            .map_err(|_| ConfigError::Invalid("config file must be utf-8".to_string()))?;
        Self::from_toml(content)
    }

    /// Parses and validates configuration text.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when parsing or validation fails.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
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
        self.ledger.validate()?;
        validate_contract(&self.contract)?;
        self.audit.validate()?;
        Ok(())
    }

    /// Opens the configured ledger.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the ledger cannot be opened.
    pub fn build_ledger(&self) -> Result<SharedLedger, ConfigError> {
        let ledger = match self.ledger.ledger_type {
            LedgerType::Memory => SharedLedger::from_ledger(InMemoryLedger::new()),
            LedgerType::Sqlite => {
                let path = self.ledger.path.clone().ok_or_else(|| {
                    ConfigError::Invalid("sqlite ledger requires path".to_string())
                })?;
                let sqlite_config = SqliteLedgerConfig {
                    path,
                    busy_timeout_ms: self.ledger.busy_timeout_ms,
                    journal_mode: self.ledger.journal_mode,
                    sync_mode: self.ledger.sync_mode,
                    range_batch_size: self.ledger.range_batch_size,
                };
                let ledger = SqliteLedger::new(sqlite_config)
                    .map_err(|err| ConfigError::Init(err.to_string()))?;
                SharedLedger::from_ledger(ledger)
            }
        };
        Ok(ledger)
    }

    /// Opens the configured audit sink.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the audit file cannot be opened.
    pub fn build_audit_sink(&self) -> Result<Arc<dyn ContractAuditSink>, ConfigError> {
        let sink: Arc<dyn ContractAuditSink> = match self.audit.sink {
            AuditSinkType::None => Arc::new(NoopAuditSink),
            AuditSinkType::Stderr => Arc::new(StderrAuditSink),
            AuditSinkType::File => {
                let path = self.audit.path.as_deref().ok_or_else(|| {
                    ConfigError::Invalid("file audit sink requires path".to_string())
                })?;
                let sink =
                    FileAuditSink::new(path).map_err(|err| ConfigError::Init(err.to_string()))?;
                Arc::new(sink)
            }
        };
        Ok(sink)
    }

    /// Assembles a contract over the configured ledger and audit sink.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the ledger or audit sink cannot be opened.
    pub fn build_contract(&self) -> Result<CarContract<SharedLedger>, ConfigError> {
        let ledger = self.build_ledger()?;
        let audit = self.build_audit_sink()?;
        Ok(CarContract::with_config(ledger, self.contract.clone(), audit))
    }
}

/// Ledger backend configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LedgerConfig {
    /// Ledger backend type.
    #[serde(rename = "type", default)]
    pub ledger_type: LedgerType,
    /// `SQLite` database path when using the sqlite backend.
    #[serde(default)]
    pub path: Option<PathBuf>,
    /// Busy timeout in milliseconds.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
    /// `SQLite` journal mode.
    #[serde(default)]
    pub journal_mode: SqliteJournalMode,
    /// `SQLite` synchronous mode.
    #[serde(default)]
    pub sync_mode: SqliteSyncMode,
    /// Rows fetched per range-scan batch.
    #[serde(default = "default_range_batch_size")]
    pub range_batch_size: usize,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            ledger_type: LedgerType::default(),
            path: None,
            busy_timeout_ms: default_busy_timeout_ms(),
            journal_mode: SqliteJournalMode::default(),
            sync_mode: SqliteSyncMode::default(),
            range_batch_size: default_range_batch_size(),
        }
    }
}

impl LedgerConfig {
    /// Validates ledger configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.busy_timeout_ms > MAX_BUSY_TIMEOUT_MS {
            return Err(ConfigError::Invalid(format!(
                "ledger busy_timeout_ms must be at most {MAX_BUSY_TIMEOUT_MS}"
            )));
        }
        if self.range_batch_size == 0 || self.range_batch_size > MAX_RANGE_BATCH_SIZE {
            return Err(ConfigError::Invalid(format!(
                "ledger range_batch_size must be between 1 and {MAX_RANGE_BATCH_SIZE}"
            )));
        }
        match self.ledger_type {
            LedgerType::Memory => {
                if self.path.is_some() {
                    return Err(ConfigError::Invalid(
                        "memory ledger must not set path".to_string(),
                    ));
                }
                Ok(())
            }
            LedgerType::Sqlite => {
                let path = self.path.as_ref().ok_or_else(|| {
                    ConfigError::Invalid("sqlite ledger requires path".to_string())
                })?;
                validate_path_string("ledger.path", &path.to_string_lossy())
            }
        }
    }
}

/// Ledger backend type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum LedgerType {
    /// Use the in-memory ledger.
    #[default]
    Memory,
    /// Use the `SQLite`-backed durable ledger.
    Sqlite,
}

/// Audit sink configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuditConfig {
    /// Audit sink type.
    #[serde(default)]
    pub sink: AuditSinkType,
    /// Audit log path (JSON lines) for the file sink.
    #[serde(default)]
    pub path: Option<PathBuf>,
}

impl AuditConfig {
    /// Validates audit configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        match (self.sink, &self.path) {
            (AuditSinkType::File, None) => {
                Err(ConfigError::Invalid("file audit sink requires path".to_string()))
            }
            (AuditSinkType::File, Some(path)) => {
                validate_path_string("audit.path", &path.to_string_lossy())
            }
            (AuditSinkType::None | AuditSinkType::Stderr, Some(_)) => Err(ConfigError::Invalid(
                "audit path is only allowed for the file sink".to_string(),
            )),
            (AuditSinkType::None | AuditSinkType::Stderr, None) => Ok(()),
        }
    }
}

/// Audit sink type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AuditSinkType {
    /// Discard audit events.
    #[default]
    None,
    /// JSON lines on stderr.
    Stderr,
    /// JSON lines appended to a file.
    File,
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
    /// Configured component failed to open.
    #[error("config init error: {0}")]
    Init(String),
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Resolves the config path; the flag reports an explicit choice.
fn resolve_path(path: Option<&Path>) -> Result<(PathBuf, bool), ConfigError> {
    if let Some(path) = path {
        return Ok((path.to_path_buf(), true));
    }
    if let Ok(env_path) = env::var(CONFIG_ENV_VAR) {
        if env_path.len() > MAX_TOTAL_PATH_LENGTH {
            return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
        }
        return Ok((PathBuf::from(env_path), true));
    }
    Ok((PathBuf::from(DEFAULT_CONFIG_NAME), false))
}

/// Reads the config file without buffering past the size limit.
fn read_config_bytes(path: &Path) -> Result<Vec<u8>, ConfigError> {
    let too_large = || ConfigError::Invalid("config file exceeds size limit".to_string());
    let file = File::open(path).map_err(|err| ConfigError::Io(err.to_string()))?;
    let size = file.metadata().map_err(|err| ConfigError::Io(err.to_string()))?.len();
    let limit = u64::try_from(MAX_CONFIG_FILE_SIZE).map_err(|_| too_large())?;
    if size > limit {
        return Err(too_large());
    }
    let mut bytes = Vec::new();
    file.take(limit.saturating_add(1))
        .read_to_end(&mut bytes)
        .map_err(|err| ConfigError::Io(err.to_string()))?;
    if bytes.len() > MAX_CONFIG_FILE_SIZE {
        return Err(too_large());
    }
    Ok(bytes)
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

/// Validates a path string against length constraints.
fn validate_path_string(field: &str, value: &str) -> Result<(), ConfigError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ConfigError::Invalid(format!("{field} must be non-empty")));
    }
    if trimmed.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid(format!("{field} exceeds max length")));
    }
    for component in Path::new(trimmed).components() {
        if component.as_os_str().to_string_lossy().len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(ConfigError::Invalid(format!("{field} component too long")));
        }
    }
    Ok(())
}

/// Validates contract range bounds.
fn validate_contract(contract: &ContractConfig) -> Result<(), ConfigError> {
    for (field, value) in
        [("contract.range_start", &contract.range_start), ("contract.range_end", &contract.range_end)]
    {
        validate_key(value).map_err(|err| ConfigError::Invalid(format!("{field}: {err}")))?;
    }
    if contract.range_start >= contract.range_end {
        return Err(ConfigError::Invalid(
            "contract.range_start must sort before contract.range_end".to_string(),
        ));
    }
    Ok(())
}

/// Returns the default busy timeout for `SQLite` connections.
const fn default_busy_timeout_ms() -> u64 {
    DEFAULT_BUSY_TIMEOUT_MS
}

/// Returns the default range-scan batch size.
const fn default_range_batch_size() -> usize {
    DEFAULT_RANGE_BATCH_SIZE
}
