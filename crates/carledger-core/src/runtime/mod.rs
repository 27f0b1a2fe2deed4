// crates/carledger-core/src/runtime/mod.rs
// ============================================================================
// Module: Car Ledger Runtime
// Description: Contract dispatcher, in-memory ledger, and audit sinks.
// Purpose: Execute contract invocations against a ledger capability.
// Dependencies: crate::{core, interfaces}
// ============================================================================

//! ## Overview
//! Runtime modules implement the contract operations, a reference in-memory
//! ledger, and the audit sinks that observe invocations.

// ============================================================================
// SECTION: Submodules
// ============================================================================

pub mod audit;
pub mod contract;
pub mod store;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use audit::ContractAuditSink;
pub use audit::FileAuditSink;
pub use audit::InvocationAuditEvent;
pub use audit::InvocationOutcome;
pub use audit::NoopAuditSink;
pub use audit::RangeSkipAuditEvent;
pub use audit::StderrAuditSink;
pub use contract::CarContract;
pub use contract::ContractConfig;
pub use contract::ContractError;
pub use contract::Invocation;
pub use contract::MalformedValueMode;
pub use contract::MissingRecordMode;
pub use contract::Operation;
pub use contract::Response;
pub use store::InMemoryLedger;
pub use store::SharedLedger;
