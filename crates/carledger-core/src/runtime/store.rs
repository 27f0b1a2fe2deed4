// crates/carledger-core/src/runtime/store.rs
// ============================================================================
// Module: Car Ledger In-Memory Store
// Description: In-memory ledger adapter and shared ledger wrapper.
// Purpose: Provide a deterministic ledger implementation without external deps.
// Dependencies: crate::interfaces
// ============================================================================

//! ## Overview
//! [`InMemoryLedger`] keeps world state and validation parameters in two
//! separate ordered maps, so policy entries survive value overwrites. Range
//! scans snapshot the matching window at open time.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;

use crate::interfaces::Ledger;
use crate::interfaces::LedgerEntry;
use crate::interfaces::LedgerError;
use crate::interfaces::StateRangeIterator;
use crate::interfaces::in_range;
use crate::interfaces::validate_key;

// ============================================================================
// SECTION: In-Memory Ledger
// ============================================================================

/// Ledger tables guarded together.
#[derive(Debug, Default)]
struct LedgerTables {
    /// Key to value bytes.
    world_state: BTreeMap<String, Vec<u8>>,
    /// Key to validation policy bytes.
    validation_parameters: BTreeMap<String, Vec<u8>>,
}

/// In-memory ledger for tests and local runs.
#[derive(Debug, Default, Clone)]
pub struct InMemoryLedger {
    /// Tables protected by a mutex.
    tables: Arc<Mutex<LedgerTables>>,
}

impl InMemoryLedger {
    /// Creates an empty in-memory ledger.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Locks the ledger tables.
    fn lock(&self) -> Result<MutexGuard<'_, LedgerTables>, LedgerError> {
        self.tables.lock().map_err(|_| LedgerError::Store("ledger mutex poisoned".to_string()))
    }
}

impl Ledger for InMemoryLedger {
    fn get_state(&self, key: &str) -> Result<Option<Vec<u8>>, LedgerError> {
        validate_key(key)?;
        Ok(self.lock()?.world_state.get(key).cloned())
    }

    fn put_state(&self, key: &str, value: &[u8]) -> Result<(), LedgerError> {
        validate_key(key)?;
        self.lock()?.world_state.insert(key.to_string(), value.to_vec());
        Ok(())
    }

    fn get_state_by_range<'a>(
        &'a self,
        start: &str,
        end: &str,
    ) -> Result<StateRangeIterator<'a>, LedgerError> {
        let entries: Vec<LedgerEntry> = {
            let guard = self.lock()?;
            guard
                .world_state
                .range(start.to_string() ..)
                .take_while(|(key, _)| in_range(key, start, end))
                .map(|(key, value)| LedgerEntry {
                    key: key.clone(),
                    value: value.clone(),
                })
                .collect()
        };
        Ok(Box::new(entries.into_iter().map(Ok)))
    }

    fn get_validation_policy(&self, key: &str) -> Result<Option<Vec<u8>>, LedgerError> {
        validate_key(key)?;
        Ok(self.lock()?.validation_parameters.get(key).cloned())
    }

    fn set_validation_policy(&self, key: &str, policy: &[u8]) -> Result<(), LedgerError> {
        validate_key(key)?;
        self.lock()?.validation_parameters.insert(key.to_string(), policy.to_vec());
        Ok(())
    }
}

// ============================================================================
// SECTION: Shared Ledger Wrapper
// ============================================================================

/// Shared ledger backed by an `Arc` trait object.
#[derive(Clone)]
pub struct SharedLedger {
    /// Inner ledger implementation.
    inner: Arc<dyn Ledger + Send + Sync>,
}

impl SharedLedger {
    /// Wraps a ledger in a shared, clonable wrapper.
    #[must_use]
    pub fn from_ledger(ledger: impl Ledger + Send + Sync + 'static) -> Self {
        Self {
            inner: Arc::new(ledger),
        }
    }

    /// Wraps an existing shared ledger.
    #[must_use]
    pub const fn new(ledger: Arc<dyn Ledger + Send + Sync>) -> Self {
        Self {
            inner: ledger,
        }
    }
}

impl Ledger for SharedLedger {
    fn get_state(&self, key: &str) -> Result<Option<Vec<u8>>, LedgerError> {
        self.inner.get_state(key)
    }

    fn put_state(&self, key: &str, value: &[u8]) -> Result<(), LedgerError> {
        self.inner.put_state(key, value)
    }

    fn get_state_by_range<'a>(
        &'a self,
        start: &str,
        end: &str,
    ) -> Result<StateRangeIterator<'a>, LedgerError> {
        self.inner.get_state_by_range(start, end)
    }

    fn get_validation_policy(&self, key: &str) -> Result<Option<Vec<u8>>, LedgerError> {
        self.inner.get_validation_policy(key)
    }

    fn set_validation_policy(&self, key: &str, policy: &[u8]) -> Result<(), LedgerError> {
        self.inner.set_validation_policy(key, policy)
    }
}
