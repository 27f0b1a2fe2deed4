// crates/carledger-store-sqlite/src/store.rs
// ============================================================================
// Module: SQLite Ledger Store
// Description: Ledger adapter backed by SQLite WAL.
// Purpose: Persist values and validation parameters in separate tables.
// Dependencies: carledger-core, rusqlite, serde, thiserror
// ============================================================================

//! ## Overview
//! [`SqliteLedger`] stores world state in `world_state` and key-level
//! validation policies in `validation_parameters`, so writing a value never
//! touches the policy for the same key. Range scans are keyset-paginated:
//! each batch takes the connection lock, reads up to `range_batch_size` rows
//! past the last key seen, and releases the lock before yielding.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::VecDeque;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;

use carledger_core::Ledger;
use carledger_core::LedgerEntry;
use carledger_core::LedgerError;
use carledger_core::StateRangeIterator;
use carledger_core::validate_key;
use rusqlite::Connection;
use rusqlite::OpenFlags;
use rusqlite::OptionalExtension;
use rusqlite::params;
use serde::Deserialize;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// `SQLite` schema version for the ledger.
const SCHEMA_VERSION: i64 = 1;
/// Default busy timeout (ms).
const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;
/// Default number of rows fetched per range-scan batch.
pub const DEFAULT_RANGE_BATCH_SIZE: usize = 128;
/// Maximum length of a single path component.
const MAX_PATH_COMPONENT_LENGTH: usize = 255;
/// Maximum total path length.
const MAX_TOTAL_PATH_LENGTH: usize = 4096;
/// Maximum value or policy size accepted by the ledger.
pub const MAX_VALUE_BYTES: usize = 4 * 1024 * 1024;

// ============================================================================
// SECTION: Config
// ============================================================================

/// `SQLite` journal mode configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SqliteJournalMode {
    /// WAL journal mode.
    #[default]
    Wal,
    /// Delete journal mode.
    Delete,
}

impl SqliteJournalMode {
    /// Returns the `SQLite` pragma value.
    #[must_use]
    pub const fn pragma_value(self) -> &'static str {
        match self {
            Self::Wal => "wal",
            Self::Delete => "delete",
        }
    }
}

/// `SQLite` sync mode configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SqliteSyncMode {
    /// Full synchronous mode.
    #[default]
    Full,
    /// Normal synchronous mode.
    Normal,
}

impl SqliteSyncMode {
    /// Returns the `SQLite` pragma value.
    #[must_use]
    pub const fn pragma_value(self) -> &'static str {
        match self {
            Self::Full => "full",
            Self::Normal => "normal",
        }
    }
}

/// Configuration for the `SQLite` ledger.
#[derive(Debug, Clone, Deserialize)]
pub struct SqliteLedgerConfig {
    /// Path to the `SQLite` database file.
    pub path: PathBuf,
    /// Busy timeout in milliseconds.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
    /// `SQLite` journal mode.
    #[serde(default)]
    pub journal_mode: SqliteJournalMode,
    /// `SQLite` sync mode.
    #[serde(default)]
    pub sync_mode: SqliteSyncMode,
    /// Rows fetched per range-scan batch.
    #[serde(default = "default_range_batch_size")]
    pub range_batch_size: usize,
}

impl SqliteLedgerConfig {
    /// Creates a config for `path` with default tuning.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
            journal_mode: SqliteJournalMode::default(),
            sync_mode: SqliteSyncMode::default(),
            range_batch_size: DEFAULT_RANGE_BATCH_SIZE,
        }
    }
}

/// Returns the default busy timeout for `SQLite` connections.
const fn default_busy_timeout_ms() -> u64 {
    DEFAULT_BUSY_TIMEOUT_MS
}

/// Returns the default range-scan batch size.
const fn default_range_batch_size() -> usize {
    DEFAULT_RANGE_BATCH_SIZE
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// `SQLite` ledger errors.
#[derive(Debug, Error)]
pub enum SqliteLedgerError {
    /// Ledger I/O error.
    #[error("sqlite ledger io error: {0}")]
    Io(String),
    /// `SQLite` engine error.
    #[error("sqlite ledger db error: {0}")]
    Db(String),
    /// Stored data is inconsistent.
    #[error("sqlite ledger corruption: {0}")]
    Corrupt(String),
    /// Schema version mismatch.
    #[error("sqlite ledger version mismatch: {0}")]
    VersionMismatch(String),
    /// Invalid configuration or input.
    #[error("sqlite ledger invalid input: {0}")]
    Invalid(String),
    /// Value exceeded the size limit.
    #[error("sqlite ledger value too large: {actual_bytes} bytes (max {max_bytes})")]
    TooLarge {
        /// Maximum allowed bytes.
        max_bytes: usize,
        /// Actual size in bytes.
        actual_bytes: usize,
    },
}

impl From<SqliteLedgerError> for LedgerError {
    fn from(error: SqliteLedgerError) -> Self {
        match error {
            SqliteLedgerError::Io(message) => Self::Io(message),
            SqliteLedgerError::Db(message) | SqliteLedgerError::Invalid(message) => {
                Self::Store(message)
            }
            SqliteLedgerError::Corrupt(message) => Self::Corrupt(message),
            SqliteLedgerError::VersionMismatch(message) => Self::VersionMismatch(message),
            SqliteLedgerError::TooLarge {
                max_bytes,
                actual_bytes,
            } => Self::TooLarge {
                max_bytes,
                actual_bytes,
            },
        }
    }
}

impl From<rusqlite::Error> for SqliteLedgerError {
    fn from(error: rusqlite::Error) -> Self {
        Self::Db(error.to_string())
    }
}

// ============================================================================
// SECTION: Tables
// ============================================================================

/// Key-value tables managed by the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Table {
    /// World-state values.
    WorldState,
    /// Key-level validation policies.
    ValidationParameters,
}

impl Table {
    /// Query returning the stored length for a key.
    const fn length_sql(self) -> &'static str {
        match self {
            Self::WorldState => "SELECT length(value) FROM world_state WHERE key = ?1",
            Self::ValidationParameters => {
                "SELECT length(policy) FROM validation_parameters WHERE key = ?1"
            }
        }
    }

    /// Query returning the stored bytes for a key.
    const fn select_sql(self) -> &'static str {
        match self {
            Self::WorldState => "SELECT value FROM world_state WHERE key = ?1",
            Self::ValidationParameters => {
                "SELECT policy FROM validation_parameters WHERE key = ?1"
            }
        }
    }

    /// Upsert statement for a key.
    const fn upsert_sql(self) -> &'static str {
        match self {
            Self::WorldState => {
                "INSERT INTO world_state (key, value) VALUES (?1, ?2) ON CONFLICT(key) DO UPDATE \
                 SET value = excluded.value"
            }
            Self::ValidationParameters => {
                "INSERT INTO validation_parameters (key, policy) VALUES (?1, ?2) ON CONFLICT(key) \
                 DO UPDATE SET policy = excluded.policy"
            }
        }
    }
}

/// Keyset-paginated world-state range query.
const RANGE_BATCH_SQL: &str = "SELECT key, value FROM world_state WHERE key >= ?1 AND (?2 = '' \
                               OR key < ?2) AND (?3 IS NULL OR key > ?3) ORDER BY key LIMIT ?4";

// ============================================================================
// SECTION: Store
// ============================================================================

/// `SQLite`-backed ledger with WAL support.
#[derive(Clone)]
pub struct SqliteLedger {
    /// Ledger configuration.
    config: SqliteLedgerConfig,
    /// Shared `SQLite` connection guarded by a mutex.
    connection: Arc<Mutex<Connection>>,
}

impl SqliteLedger {
    /// Opens an `SQLite`-backed ledger, creating the schema when absent.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteLedgerError`] when the database cannot be opened or
    /// initialized, or the config is invalid.
    pub fn new(config: SqliteLedgerConfig) -> Result<Self, SqliteLedgerError> {
        if config.range_batch_size == 0 {
            return Err(SqliteLedgerError::Invalid(
                "range_batch_size must be greater than zero".to_string(),
            ));
        }
        validate_store_path(&config.path)?;
        ensure_parent_dir(&config.path)?;
        let mut connection = open_connection(&config)?;
        initialize_schema(&mut connection)?;
        Ok(Self {
            config,
            connection: Arc::new(Mutex::new(connection)),
        })
    }

    /// Returns the ledger configuration.
    #[must_use]
    pub const fn config(&self) -> &SqliteLedgerConfig {
        &self.config
    }

    /// Locks the shared connection.
    fn lock(&self) -> Result<MutexGuard<'_, Connection>, SqliteLedgerError> {
        self.connection.lock().map_err(|_| SqliteLedgerError::Db("mutex poisoned".to_string()))
    }

    /// Reads a key from `table`, enforcing the size limit before loading.
    fn read(&self, table: Table, key: &str) -> Result<Option<Vec<u8>>, SqliteLedgerError> {
        let guard = self.lock()?;
        let length: Option<i64> =
            guard.query_row(table.length_sql(), params![key], |row| row.get(0)).optional()?;
        let Some(length) = length else {
            return Ok(None);
        };
        let length = usize::try_from(length).map_err(|_| {
            SqliteLedgerError::Corrupt(format!("negative stored length for key {key}"))
        })?;
        if length > MAX_VALUE_BYTES {
            return Err(SqliteLedgerError::TooLarge {
                max_bytes: MAX_VALUE_BYTES,
                actual_bytes: length,
            });
        }
        let bytes: Vec<u8> = guard.query_row(table.select_sql(), params![key], |row| row.get(0))?;
        drop(guard);
        Ok(Some(bytes))
    }

    /// Writes a key into `table`, replacing any previous bytes.
    fn write(&self, table: Table, key: &str, bytes: &[u8]) -> Result<(), SqliteLedgerError> {
        if bytes.len() > MAX_VALUE_BYTES {
            return Err(SqliteLedgerError::TooLarge {
                max_bytes: MAX_VALUE_BYTES,
                actual_bytes: bytes.len(),
            });
        }
        let guard = self.lock()?;
        guard.execute(table.upsert_sql(), params![key, bytes])?;
        drop(guard);
        Ok(())
    }

    /// Fetches the next batch of a range scan.
    fn fetch_batch(
        &self,
        start: &str,
        end: &str,
        after: Option<&str>,
    ) -> Result<Vec<LedgerEntry>, SqliteLedgerError> {
        let limit = i64::try_from(self.config.range_batch_size)
            .map_err(|_| SqliteLedgerError::Invalid("range_batch_size too large".to_string()))?;
        let guard = self.lock()?;
        let mut statement = guard.prepare_cached(RANGE_BATCH_SQL)?;
        let rows = statement.query_map(params![start, end, after, limit], |row| {
            Ok(LedgerEntry {
                key: row.get(0)?,
                value: row.get(1)?,
            })
        })?;
        let mut entries = Vec::with_capacity(self.config.range_batch_size);
        for row in rows {
            let entry = row?;
            if entry.value.len() > MAX_VALUE_BYTES {
                return Err(SqliteLedgerError::TooLarge {
                    max_bytes: MAX_VALUE_BYTES,
                    actual_bytes: entry.value.len(),
                });
            }
            entries.push(entry);
        }
        Ok(entries)
    }
}

impl Ledger for SqliteLedger {
    fn get_state(&self, key: &str) -> Result<Option<Vec<u8>>, LedgerError> {
        validate_key(key)?;
        Ok(self.read(Table::WorldState, key)?)
    }

    fn put_state(&self, key: &str, value: &[u8]) -> Result<(), LedgerError> {
        validate_key(key)?;
        Ok(self.write(Table::WorldState, key, value)?)
    }

    fn get_state_by_range<'a>(
        &'a self,
        start: &str,
        end: &str,
    ) -> Result<StateRangeIterator<'a>, LedgerError> {
        Ok(Box::new(RangeScan {
            ledger: self,
            start: start.to_string(),
            end: end.to_string(),
            last_key: None,
            buffer: VecDeque::new(),
            exhausted: false,
        }))
    }

    fn get_validation_policy(&self, key: &str) -> Result<Option<Vec<u8>>, LedgerError> {
        validate_key(key)?;
        Ok(self.read(Table::ValidationParameters, key)?)
    }

    fn set_validation_policy(&self, key: &str, policy: &[u8]) -> Result<(), LedgerError> {
        validate_key(key)?;
        Ok(self.write(Table::ValidationParameters, key, policy)?)
    }
}

// ============================================================================
// SECTION: Range Scan
// ============================================================================

/// Lazy keyset-paginated scan over `world_state`.
struct RangeScan<'a> {
    /// Ledger the scan reads from.
    ledger: &'a SqliteLedger,
    /// Inclusive start key.
    start: String,
    /// Exclusive end key; empty means unbounded.
    end: String,
    /// Last key yielded from a fetched batch.
    last_key: Option<String>,
    /// Entries fetched but not yet yielded.
    buffer: VecDeque<LedgerEntry>,
    /// Set once a short batch or an error ends the scan.
    exhausted: bool,
}

impl Iterator for RangeScan<'_> {
    type Item = Result<LedgerEntry, LedgerError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.buffer.is_empty() && !self.exhausted {
            match self.ledger.fetch_batch(&self.start, &self.end, self.last_key.as_deref()) {
                Ok(batch) => {
                    if batch.len() < self.ledger.config.range_batch_size {
                        self.exhausted = true;
                    }
                    if let Some(entry) = batch.last() {
                        self.last_key = Some(entry.key.clone());
                    }
                    self.buffer.extend(batch);
                }
                Err(err) => {
                    self.exhausted = true;
                    return Some(Err(err.into()));
                }
            }
        }
        self.buffer.pop_front().map(Ok)
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Ensures the parent directory for the database exists.
fn ensure_parent_dir(path: &Path) -> Result<(), SqliteLedgerError> {
    let Some(parent) = path.parent() else {
        return Err(SqliteLedgerError::Io("ledger path missing parent directory".to_string()));
    };
    std::fs::create_dir_all(parent).map_err(|err| SqliteLedgerError::Io(err.to_string()))
}

/// Validates ledger paths for safety limits.
fn validate_store_path(path: &Path) -> Result<(), SqliteLedgerError> {
    let path_string = path.display().to_string();
    if path_string.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(SqliteLedgerError::Invalid("ledger path exceeds length limit".to_string()));
    }
    for component in path.components() {
        let name = component.as_os_str().to_string_lossy();
        if name.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(SqliteLedgerError::Invalid(
                "ledger path contains an overlong component".to_string(),
            ));
        }
    }
    if path.is_dir() {
        return Err(SqliteLedgerError::Invalid(
            "ledger path must be a file, not a directory".to_string(),
        ));
    }
    Ok(())
}

/// Opens an `SQLite` connection and applies pragmas.
fn open_connection(config: &SqliteLedgerConfig) -> Result<Connection, SqliteLedgerError> {
    let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
        | OpenFlags::SQLITE_OPEN_CREATE
        | OpenFlags::SQLITE_OPEN_FULL_MUTEX;
    let connection = Connection::open_with_flags(&config.path, flags)?;
    connection.execute_batch(&format!(
        "PRAGMA journal_mode = {}; PRAGMA synchronous = {};",
        config.journal_mode.pragma_value(),
        config.sync_mode.pragma_value()
    ))?;
    connection.busy_timeout(std::time::Duration::from_millis(config.busy_timeout_ms))?;
    Ok(connection)
}

/// Creates the schema or validates the existing version.
fn initialize_schema(connection: &mut Connection) -> Result<(), SqliteLedgerError> {
    let tx = connection.transaction()?;
    tx.execute_batch("CREATE TABLE IF NOT EXISTS ledger_meta (version INTEGER NOT NULL);")?;
    let version: Option<i64> = tx
        .query_row("SELECT version FROM ledger_meta LIMIT 1", params![], |row| row.get(0))
        .optional()?;
    match version {
        None => {
            tx.execute("INSERT INTO ledger_meta (version) VALUES (?1)", params![SCHEMA_VERSION])?;
            tx.execute_batch(
                "CREATE TABLE IF NOT EXISTS world_state (
                    key TEXT PRIMARY KEY,
                    value BLOB NOT NULL
                );
                CREATE TABLE IF NOT EXISTS validation_parameters (
                    key TEXT PRIMARY KEY,
                    policy BLOB NOT NULL
                );",
            )?;
        }
        Some(value) if value == SCHEMA_VERSION => {}
        Some(value) => {
            return Err(SqliteLedgerError::VersionMismatch(format!(
                "unsupported schema version: {value}"
            )));
        }
    }
    tx.commit()?;
    Ok(())
}
