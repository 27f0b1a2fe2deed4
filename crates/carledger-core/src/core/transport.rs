// crates/carledger-core/src/core/transport.rs
// ============================================================================
// Module: Policy Transport Encoding
// Description: Base64 text encoding for binary policy bytes.
// Purpose: Carry policy bytes through string-only invocation arguments.
// Dependencies: base64, thiserror
// ============================================================================

//! ## Overview
//! Invocation arguments are strings, so policy bytes travel as standard,
//! padded base64. Decoding is strict: malformed text is reported, never
//! repaired.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use thiserror::Error;

/// Transport decoding errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TransportError {
    /// Text was not valid standard base64.
    #[error("illegal base64 data: {0}")]
    Decode(String),
}

/// Decodes transport text into policy bytes.
///
/// # Errors
///
/// Returns [`TransportError::Decode`] on non-alphabet characters, bad padding,
/// or non-canonical trailing bits.
pub fn decode_transport(text: &str) -> Result<Vec<u8>, TransportError> {
    STANDARD.decode(text).map_err(|err| TransportError::Decode(err.to_string()))
}

/// Encodes policy bytes as transport text.
#[must_use]
pub fn encode_transport(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}
