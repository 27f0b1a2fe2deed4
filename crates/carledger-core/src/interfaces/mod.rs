// crates/carledger-core/src/interfaces/mod.rs
// ============================================================================
// Module: Car Ledger Interfaces
// Description: Host ledger capability consumed by the contract.
// Purpose: Define the key-value and validation-parameter surface of the host.
// Dependencies: serde, thiserror
// ============================================================================

//! ## Overview
//! The contract never owns storage. It reaches the host ledger through the
//! [`Ledger`] trait: point reads and writes, a lazy lexicographic range scan,
//! and a per-key validation-parameter side channel stored apart from values.
//! Each call is assumed to run inside the host's transaction boundary, so
//! implementations add no locking or retries of their own beyond what their
//! backing store needs.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

// ============================================================================
// SECTION: Entries
// ============================================================================

/// Key-value pair yielded by a range scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    /// Ledger key.
    pub key: String,
    /// Stored value bytes.
    pub value: Vec<u8>,
}

/// Lazy range-scan iterator; dropping it releases the scan.
pub type StateRangeIterator<'a> = Box<dyn Iterator<Item = Result<LedgerEntry, LedgerError>> + 'a>;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Ledger adapter errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LedgerError {
    /// Ledger I/O error.
    #[error("ledger io error: {0}")]
    Io(String),
    /// Ledger backend reported an error.
    #[error("ledger error: {0}")]
    Store(String),
    /// Stored data failed integrity checks.
    #[error("ledger corruption: {0}")]
    Corrupt(String),
    /// Stored schema version is incompatible.
    #[error("ledger version mismatch: {0}")]
    VersionMismatch(String),
    /// Key is not acceptable to the ledger.
    #[error("invalid key: {0}")]
    InvalidKey(String),
    /// Value exceeded the ledger size limit.
    #[error("value too large: {actual_bytes} bytes (max {max_bytes})")]
    TooLarge {
        /// Maximum allowed bytes.
        max_bytes: usize,
        /// Actual payload size in bytes.
        actual_bytes: usize,
    },
    /// No validation policy is set for the key.
    #[error("no validation parameter set for key {0}")]
    MissingPolicy(String),
}

// ============================================================================
// SECTION: Ledger
// ============================================================================

/// Host ledger capability.
pub trait Ledger {
    /// Reads the value stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError`] when the read fails.
    fn get_state(&self, key: &str) -> Result<Option<Vec<u8>>, LedgerError>;

    /// Writes `value` under `key`, overwriting any previous value.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError`] when the key is invalid or the write fails.
    fn put_state(&self, key: &str, value: &[u8]) -> Result<(), LedgerError>;

    /// Scans keys in `[start, end)` in bytewise order. An empty `end` is
    /// unbounded.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError`] when the scan cannot be opened.
    fn get_state_by_range<'a>(
        &'a self,
        start: &str,
        end: &str,
    ) -> Result<StateRangeIterator<'a>, LedgerError>;

    /// Reads the validation policy bytes set for `key`.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError`] when the read fails.
    fn get_validation_policy(&self, key: &str) -> Result<Option<Vec<u8>>, LedgerError>;

    /// Sets the validation policy bytes for `key`.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError`] when the key is invalid or the write fails.
    fn set_validation_policy(&self, key: &str, policy: &[u8]) -> Result<(), LedgerError>;
}

/// Validates a ledger key against the host's key rules.
///
/// # Errors
///
/// Returns [`LedgerError::InvalidKey`] for empty keys or keys in the reserved
/// composite-key namespace (leading NUL).
pub fn validate_key(key: &str) -> Result<(), LedgerError> {
    if key.is_empty() {
        return Err(LedgerError::InvalidKey("key must not be empty".to_string()));
    }
    if key.starts_with('\u{0}') {
        return Err(LedgerError::InvalidKey(
            "key must not start with the composite-key namespace".to_string(),
        ));
    }
    Ok(())
}

/// Returns true when `key` falls inside the half-open scan window.
#[must_use]
pub fn in_range(key: &str, start: &str, end: &str) -> bool {
    key >= start && (end.is_empty() || key < end)
}
