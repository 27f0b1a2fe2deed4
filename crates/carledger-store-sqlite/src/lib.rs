// crates/carledger-store-sqlite/src/lib.rs
// ============================================================================
// Module: SQLite Ledger
// Description: Durable Ledger adapter using SQLite.
// Purpose: Persist world state and per-key validation policies on disk.
// Dependencies: carledger-core, rusqlite
// ============================================================================

//! ## Overview
//! This crate provides a SQLite-backed [`Ledger`] implementation with two
//! tables: one for world-state values and one for per-key validation
//! policies. Range scans page through keys in batches so no connection lock
//! is held while the caller consumes results.
//!
//! [`Ledger`]: carledger_core::Ledger

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod store;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use store::DEFAULT_RANGE_BATCH_SIZE;
pub use store::MAX_VALUE_BYTES;
pub use store::SqliteJournalMode;
pub use store::SqliteLedger;
pub use store::SqliteLedgerConfig;
pub use store::SqliteLedgerError;
pub use store::SqliteSyncMode;
