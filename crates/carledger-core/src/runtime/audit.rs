// crates/carledger-core/src/runtime/audit.rs
// ============================================================================
// Module: Contract Audit Logging
// Description: Structured audit events for contract invocations.
// Purpose: Emit JSON-line audit records without hard logging dependencies.
// Dependencies: serde, serde_json
// ============================================================================

//! ## Overview
//! Every invocation produces one [`InvocationAuditEvent`]. Sinks write events
//! as JSON lines so deployments can route them to any log pipeline. Argument
//! values other than the target key are never recorded.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs::OpenOptions;
use std::io;
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use serde::Serialize;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Invocation outcome classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InvocationOutcome {
    /// Operation succeeded.
    Success,
    /// Operation failed.
    Error,
}

/// Audit event for a single contract invocation.
#[derive(Debug, Clone, Serialize)]
pub struct InvocationAuditEvent {
    /// Event identifier.
    pub event: &'static str,
    /// Event timestamp (milliseconds since epoch).
    pub timestamp_ms: u128,
    /// Requested function name as received.
    pub operation: String,
    /// Target key when the operation has one.
    pub key: Option<String>,
    /// Number of arguments received.
    pub arg_count: usize,
    /// Invocation outcome.
    pub outcome: InvocationOutcome,
    /// Normalized error kind label.
    pub error_kind: Option<&'static str>,
    /// Response payload size in bytes.
    pub payload_bytes: usize,
}

/// Inputs required to construct an invocation audit event.
pub struct InvocationAuditEventParams {
    /// Requested function name as received.
    pub operation: String,
    /// Target key when the operation has one.
    pub key: Option<String>,
    /// Number of arguments received.
    pub arg_count: usize,
    /// Invocation outcome.
    pub outcome: InvocationOutcome,
    /// Normalized error kind label.
    pub error_kind: Option<&'static str>,
    /// Response payload size in bytes.
    pub payload_bytes: usize,
}

/// Audit event for a stored value skipped by a range query.
#[derive(Debug, Clone, Serialize)]
pub struct RangeSkipAuditEvent {
    /// Event identifier.
    pub event: &'static str,
    /// Event timestamp (milliseconds since epoch).
    pub timestamp_ms: u128,
    /// Key whose value was skipped.
    pub key: String,
    /// Parse failure reason.
    pub reason: String,
}

impl InvocationAuditEvent {
    /// Creates a new audit event with a consistent timestamp.
    #[must_use]
    pub fn new(params: InvocationAuditEventParams) -> Self {
        Self {
            event: "contract_invocation",
            timestamp_ms: now_millis(),
            operation: params.operation,
            key: params.key,
            arg_count: params.arg_count,
            outcome: params.outcome,
            error_kind: params.error_kind,
            payload_bytes: params.payload_bytes,
        }
    }
}

impl RangeSkipAuditEvent {
    /// Creates a new range skip event with a consistent timestamp.
    #[must_use]
    pub fn new(key: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            event: "range_value_skipped",
            timestamp_ms: now_millis(),
            key: key.into(),
            reason: reason.into(),
        }
    }
}

/// Returns the current unix epoch in milliseconds.
fn now_millis() -> u128 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis()
}

// ============================================================================
// SECTION: Trait
// ============================================================================

/// Audit sink for contract events.
pub trait ContractAuditSink: Send + Sync {
    /// Record an invocation event.
    fn record(&self, event: &InvocationAuditEvent);

    /// Record a skipped range value.
    fn record_range_skip(&self, _event: &RangeSkipAuditEvent) {}
}

/// Audit sink that discards events.
pub struct NoopAuditSink;

impl ContractAuditSink for NoopAuditSink {
    fn record(&self, _event: &InvocationAuditEvent) {}
}

/// Audit sink that logs JSON lines to stderr.
pub struct StderrAuditSink;

impl ContractAuditSink for StderrAuditSink {
    fn record(&self, event: &InvocationAuditEvent) {
        if let Ok(payload) = serde_json::to_string(event) {
            let _ = writeln!(std::io::stderr(), "{payload}");
        }
    }

    fn record_range_skip(&self, event: &RangeSkipAuditEvent) {
        if let Ok(payload) = serde_json::to_string(event) {
            let _ = writeln!(std::io::stderr(), "{payload}");
        }
    }
}

/// Audit sink that logs JSON lines to a file.
pub struct FileAuditSink {
    /// File handle used for append-only logging.
    file: Mutex<std::fs::File>,
}

impl FileAuditSink {
    /// Opens the audit log file in append mode.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened.
    pub fn new(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            file: Mutex::new(file),
        })
    }

    /// Appends one serialized event.
    fn append<T: Serialize>(&self, event: &T) {
        if let Ok(payload) = serde_json::to_string(event)
            && let Ok(mut file) = self.file.lock()
        {
            let _ = writeln!(file, "{payload}");
            let _ = file.flush();
        }
    }
}

impl ContractAuditSink for FileAuditSink {
    fn record(&self, event: &InvocationAuditEvent) {
        self.append(event);
    }

    fn record_range_skip(&self, event: &RangeSkipAuditEvent) {
        self.append(event);
    }
}
