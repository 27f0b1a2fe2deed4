// crates/carledger-core/src/core/mod.rs
// ============================================================================
// Module: Car Ledger Core Types
// Description: Record model, policy codec, and transport encoding.
// Purpose: Provide the value types exchanged between contract and ledger.
// Dependencies: base64, prost, serde
// ============================================================================

//! ## Overview
//! Core types define the stored car record, the key-level validation policy
//! and its wire format, and the base64 transport used to pass policy bytes
//! through string arguments.

// ============================================================================
// SECTION: Submodules
// ============================================================================

pub mod endorsement;
pub mod policy;
pub mod record;
pub mod transport;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use endorsement::KeyEndorsementPolicy;
pub use policy::ACCEPT_ALL_POLICY_BYTES;
pub use policy::PolicyError;
pub use policy::REJECT_ALL_POLICY_BYTES;
pub use policy::ValidationPolicy;
pub use policy::describe;
pub use record::CarRecord;
pub use record::seed_records;
pub use transport::TransportError;
pub use transport::decode_transport;
pub use transport::encode_transport;
