// crates/carledger-core/src/core/record.rs
// ============================================================================
// Module: Car Records
// Description: Car record model and its JSON serialization contract.
// Purpose: Provide the stored value shape for ledger entries.
// Dependencies: serde, serde_json
// ============================================================================

//! ## Overview
//! A [`CarRecord`] is the value stored under a caller-chosen ledger key. It has
//! no identity of its own. Serialization emits the fields in the fixed order
//! `make`, `model`, `colour`, `owner`, so stored bytes are stable across
//! writers.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Key prefix used by the seeded records.
pub const SEED_KEY_PREFIX: &str = "CAR";

// ============================================================================
// SECTION: Record
// ============================================================================

/// Vehicle ownership record.
///
/// Fields absent from stored JSON parse as empty strings; unknown fields are
/// ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CarRecord {
    /// Manufacturer.
    pub make: String,
    /// Model name.
    pub model: String,
    /// Paint colour.
    pub colour: String,
    /// Current owner.
    pub owner: String,
}

impl CarRecord {
    /// Creates a new record.
    #[must_use]
    pub fn new(
        make: impl Into<String>,
        model: impl Into<String>,
        colour: impl Into<String>,
        owner: impl Into<String>,
    ) -> Self {
        Self {
            make: make.into(),
            model: model.into(),
            colour: colour.into(),
            owner: owner.into(),
        }
    }

    /// Serializes the record to its canonical JSON bytes.
    ///
    /// # Errors
    ///
    /// Returns [`serde_json::Error`] when serialization fails.
    pub fn to_json_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    /// Parses a record from stored JSON bytes.
    ///
    /// # Errors
    ///
    /// Returns [`serde_json::Error`] when the bytes are not a JSON object or a
    /// present field is not a string.
    pub fn from_json_bytes(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }
}

// ============================================================================
// SECTION: Seed Data
// ============================================================================

/// Returns the fixed seed records in key order (`CAR0` through `CAR9`).
#[must_use]
pub fn seed_records() -> Vec<(String, CarRecord)> {
    [
        ("Toyota", "Prius", "blue", "Tomoko"),
        ("Ford", "Mustang", "red", "Brad"),
        ("Hyundai", "Tucson", "green", "Jin Soo"),
        ("Volkswagen", "Passat", "yellow", "Max"),
        ("Tesla", "S", "black", "Adriana"),
        ("Peugeot", "205", "purple", "Michel"),
        ("Chery", "S22L", "white", "Aarav"),
        ("Fiat", "Punto", "violet", "Pari"),
        ("Tata", "Nano", "indigo", "Valeria"),
        ("Holden", "Barina", "brown", "Shotaro"),
    ]
    .into_iter()
    .enumerate()
    .map(|(index, (make, model, colour, owner))| {
        (format!("{SEED_KEY_PREFIX}{index}"), CarRecord::new(make, model, colour, owner))
    })
    .collect()
}
