// crates/carledger-core/src/lib.rs
// ============================================================================
// Module: Car Ledger Core Library
// Description: Public API surface for the car ledger contract.
// Purpose: Expose core types, the ledger interface, and runtime helpers.
// Dependencies: crate::{core, interfaces, runtime}
// ============================================================================

//! ## Overview
//! The car ledger contract stores vehicle records in a key-value world state
//! and lets callers attach a validation policy to individual keys. The
//! contract never owns storage; hosts supply a [`Ledger`] implementation and
//! wrap each invocation in their own transaction.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod core;
pub mod interfaces;
pub mod runtime;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use self::core::*;

pub use interfaces::Ledger;
pub use interfaces::LedgerEntry;
pub use interfaces::LedgerError;
pub use interfaces::StateRangeIterator;
pub use interfaces::in_range;
pub use interfaces::validate_key;
pub use runtime::CarContract;
pub use runtime::ContractAuditSink;
pub use runtime::ContractConfig;
pub use runtime::ContractError;
pub use runtime::FileAuditSink;
pub use runtime::InMemoryLedger;
pub use runtime::Invocation;
pub use runtime::InvocationAuditEvent;
pub use runtime::InvocationOutcome;
pub use runtime::MalformedValueMode;
pub use runtime::MissingRecordMode;
pub use runtime::NoopAuditSink;
pub use runtime::Operation;
pub use runtime::RangeSkipAuditEvent;
pub use runtime::Response;
pub use runtime::SharedLedger;
pub use runtime::StderrAuditSink;
