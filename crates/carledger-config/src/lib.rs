// crates/carledger-config/src/lib.rs
// ============================================================================
// Module: Car Ledger Config Library
// Description: Config model, validation, and runtime assembly.
// Purpose: Single source of truth for carledger.toml semantics.
// Dependencies: carledger-core, carledger-store-sqlite, serde, toml
// ============================================================================

//! ## Overview
//! `carledger-config` defines the configuration model for the car ledger
//! tooling. It loads `carledger.toml` with strict, fail-closed validation and
//! assembles the configured ledger, audit sink, and contract.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod config;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use config::*;
