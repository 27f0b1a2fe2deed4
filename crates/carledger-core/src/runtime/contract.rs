// crates/carledger-core/src/runtime/contract.rs
// ============================================================================
// Module: Car Contract
// Description: Operation dispatcher and handlers for car records and key policies.
// Purpose: Execute invocations against an injected ledger capability.
// Dependencies: crate::{core, interfaces, runtime::audit}, serde, serde_json, thiserror
// ============================================================================

//! ## Overview
//! [`CarContract`] maps an invocation (function name plus string arguments)
//! onto one of the contract operations. Every handler checks its argument
//! count before touching the ledger. Failures are returned as values; nothing
//! is retried and nothing is rolled back here, so multi-write operations are
//! only as atomic as the host transaction that wraps the invocation.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::Deserialize;
use serde::Serialize;
use serde_json::value::RawValue;
use thiserror::Error;

use crate::core::policy::ValidationPolicy;
use crate::core::record::CarRecord;
use crate::core::record::seed_records;
use crate::core::transport::TransportError;
use crate::core::transport::decode_transport;
use crate::interfaces::Ledger;
use crate::interfaces::LedgerError;
use crate::runtime::audit::ContractAuditSink;
use crate::runtime::audit::InvocationAuditEvent;
use crate::runtime::audit::InvocationAuditEventParams;
use crate::runtime::audit::InvocationOutcome;
use crate::runtime::audit::NoopAuditSink;
use crate::runtime::audit::RangeSkipAuditEvent;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default inclusive start key for record range queries.
pub const DEFAULT_RANGE_START: &str = "CAR0";
/// Default exclusive end key for record range queries.
pub const DEFAULT_RANGE_END: &str = "CAR999";
/// Response status for successful invocations.
pub const STATUS_OK: i32 = 200;
/// Response status for failed invocations.
pub const STATUS_ERROR: i32 = 500;

// ============================================================================
// SECTION: Operations
// ============================================================================

/// Contract operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    /// Writes the ten seed records.
    SeedLedger,
    /// Writes a record under a key.
    CreateRecord,
    /// Reads the raw bytes stored under a key.
    QueryRecord,
    /// Lists records in the configured key range.
    QueryAllRecords,
    /// Replaces the owner of a stored record.
    ChangeOwner,
    /// Sets the accept-all policy on a key.
    AcceptAll,
    /// Sets the reject-all policy on a key.
    RejectAll,
    /// Sets a caller-supplied policy on a key.
    SetPolicy,
    /// Reads the policy set on a key.
    GetPolicy,
    /// Writes a record and then sets its policy.
    CreateRecordWithPolicy,
}

impl Operation {
    /// All operations in dispatch-table order.
    pub const ALL: [Self; 10] = [
        Self::SeedLedger,
        Self::CreateRecord,
        Self::QueryRecord,
        Self::QueryAllRecords,
        Self::ChangeOwner,
        Self::AcceptAll,
        Self::RejectAll,
        Self::SetPolicy,
        Self::GetPolicy,
        Self::CreateRecordWithPolicy,
    ];

    /// Returns the canonical function name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::SeedLedger => "seedLedger",
            Self::CreateRecord => "createRecord",
            Self::QueryRecord => "queryRecord",
            Self::QueryAllRecords => "queryAllRecords",
            Self::ChangeOwner => "changeOwner",
            Self::AcceptAll => "acceptAll",
            Self::RejectAll => "rejectAll",
            Self::SetPolicy => "setPolicy",
            Self::GetPolicy => "getPolicy",
            Self::CreateRecordWithPolicy => "createRecordWithPolicy",
        }
    }

    /// Returns the legacy function name accepted as an alias, if any.
    #[must_use]
    pub const fn legacy_name(self) -> Option<&'static str> {
        match self {
            Self::SeedLedger => Some("initLedger"),
            Self::CreateRecord => Some("createCar"),
            Self::QueryRecord => Some("queryCar"),
            Self::QueryAllRecords => Some("queryAllCars"),
            Self::ChangeOwner => Some("changeCarOwner"),
            Self::CreateRecordWithPolicy => Some("keyValueWithPolicy"),
            Self::AcceptAll | Self::RejectAll | Self::SetPolicy | Self::GetPolicy => None,
        }
    }

    /// Returns the exact number of arguments the operation takes.
    #[must_use]
    pub const fn arity(self) -> usize {
        match self {
            Self::SeedLedger | Self::QueryAllRecords => 0,
            Self::QueryRecord | Self::AcceptAll | Self::RejectAll | Self::GetPolicy => 1,
            Self::ChangeOwner | Self::SetPolicy => 2,
            Self::CreateRecord => 5,
            Self::CreateRecordWithPolicy => 6,
        }
    }

    /// Returns true when the first argument is a ledger key.
    #[must_use]
    pub const fn is_keyed(self) -> bool {
        !matches!(self, Self::SeedLedger | Self::QueryAllRecords)
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Operation {
    type Err = ContractError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|operation| {
                operation.as_str() == value || operation.legacy_name() == Some(value)
            })
            .ok_or_else(|| ContractError::UnknownOperation(value.to_string()))
    }
}

// ============================================================================
// SECTION: Config
// ============================================================================

/// Handling of absent or unparseable records when changing owners.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingRecordMode {
    /// Fail with `RecordNotFound` or `MalformedRecord`.
    #[default]
    Fail,
    /// Start from an empty record and store it with the new owner.
    ZeroFill,
}

/// Handling of stored values that are not JSON during range queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MalformedValueMode {
    /// Fail the whole query.
    #[default]
    Reject,
    /// Omit the entry and emit an audit event.
    Skip,
}

/// Contract behavior configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractConfig {
    /// Owner-change handling for absent or malformed records.
    #[serde(default)]
    pub missing_record: MissingRecordMode,
    /// Range-query handling for non-JSON values.
    #[serde(default)]
    pub malformed_range_value: MalformedValueMode,
    /// Inclusive start key for `queryAllRecords`.
    #[serde(default = "default_range_start")]
    pub range_start: String,
    /// Exclusive end key for `queryAllRecords`.
    #[serde(default = "default_range_end")]
    pub range_end: String,
}

impl Default for ContractConfig {
    fn default() -> Self {
        Self {
            missing_record: MissingRecordMode::default(),
            malformed_range_value: MalformedValueMode::default(),
            range_start: default_range_start(),
            range_end: default_range_end(),
        }
    }
}

/// Returns the default range start key.
fn default_range_start() -> String {
    DEFAULT_RANGE_START.to_string()
}

/// Returns the default range end key.
fn default_range_end() -> String {
    DEFAULT_RANGE_END.to_string()
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Contract operation errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ContractError {
    /// Wrong number of arguments.
    #[error("incorrect number of arguments for {operation}: expecting {expected}, got {actual}")]
    Arity {
        /// Invoked operation.
        operation: Operation,
        /// Declared arity.
        expected: usize,
        /// Received argument count.
        actual: usize,
    },
    /// Function name is not a contract operation.
    #[error("invalid contract function name: {0}")]
    UnknownOperation(String),
    /// Policy transport text is not valid base64.
    #[error(transparent)]
    Decode(#[from] TransportError),
    /// Ledger adapter failure.
    #[error(transparent)]
    Ledger(#[from] LedgerError),
    /// No record stored under the key.
    #[error("record not found: {0}")]
    RecordNotFound(String),
    /// Stored value is not a valid record.
    #[error("malformed record under {key}: {reason}")]
    MalformedRecord {
        /// Ledger key.
        key: String,
        /// Parse failure reason.
        reason: String,
    },
    /// Response or record serialization failed.
    #[error("serialization failed: {0}")]
    Serialization(String),
}

impl ContractError {
    /// Returns a stable label for audit events.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Arity {
                ..
            } => "arity",
            Self::UnknownOperation(_) => "unknown_operation",
            Self::Decode(_) => "decode",
            Self::Ledger(_) => "ledger",
            Self::RecordNotFound(_) => "record_not_found",
            Self::MalformedRecord {
                ..
            } => "malformed_record",
            Self::Serialization(_) => "serialization",
        }
    }
}

impl From<serde_json::Error> for ContractError {
    fn from(error: serde_json::Error) -> Self {
        Self::Serialization(error.to_string())
    }
}

// ============================================================================
// SECTION: Invocation Types
// ============================================================================

/// Function name plus positional string arguments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Invocation {
    /// Requested function name.
    pub function: String,
    /// Positional arguments.
    #[serde(default)]
    pub args: Vec<String>,
}

impl Invocation {
    /// Creates an invocation.
    #[must_use]
    pub fn new<I, S>(function: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            function: function.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }
}

/// Invocation response returned to the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    /// `STATUS_OK` or `STATUS_ERROR`.
    pub status: i32,
    /// Payload bytes (empty on failure).
    pub payload: Vec<u8>,
    /// Error message (empty on success).
    pub message: String,
}

impl Response {
    /// Builds a success response.
    #[must_use]
    pub const fn success(payload: Vec<u8>) -> Self {
        Self {
            status: STATUS_OK,
            payload,
            message: String::new(),
        }
    }

    /// Builds a failure response.
    #[must_use]
    pub const fn error(message: String) -> Self {
        Self {
            status: STATUS_ERROR,
            payload: Vec::new(),
            message,
        }
    }

    /// Returns true for success responses.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.status == STATUS_OK
    }
}

/// Range query element; the record is spliced in as raw JSON.
#[derive(Serialize)]
struct RangeRecord {
    /// Ledger key.
    #[serde(rename = "Key")]
    key: String,
    /// Stored record JSON.
    #[serde(rename = "Record")]
    record: Box<RawValue>,
}

// ============================================================================
// SECTION: Contract
// ============================================================================

/// Car record contract bound to a ledger.
pub struct CarContract<L> {
    /// Host ledger capability.
    ledger: L,
    /// Behavior configuration.
    config: ContractConfig,
    /// Audit sink for invocation events.
    audit: Arc<dyn ContractAuditSink>,
}

impl<L: Ledger> CarContract<L> {
    /// Creates a contract with default configuration and no audit output.
    #[must_use]
    pub fn new(ledger: L) -> Self {
        Self::with_config(ledger, ContractConfig::default(), Arc::new(NoopAuditSink))
    }

    /// Creates a contract with explicit configuration and audit sink.
    #[must_use]
    pub fn with_config(
        ledger: L,
        config: ContractConfig,
        audit: Arc<dyn ContractAuditSink>,
    ) -> Self {
        Self {
            ledger,
            config,
            audit,
        }
    }

    /// Returns the underlying ledger.
    #[must_use]
    pub const fn ledger(&self) -> &L {
        &self.ledger
    }

    /// Returns the active configuration.
    #[must_use]
    pub const fn config(&self) -> &ContractConfig {
        &self.config
    }

    /// Executes an invocation and records an audit event.
    #[must_use]
    pub fn invoke(&self, invocation: &Invocation) -> Response {
        let result = self.dispatch(&invocation.function, &invocation.args);
        let key = invocation
            .function
            .parse::<Operation>()
            .ok()
            .filter(|operation| operation.is_keyed())
            .and_then(|_| invocation.args.first().cloned());
        let (response, error_kind) = match result {
            Ok(payload) => (Response::success(payload), None),
            Err(err) => (Response::error(err.to_string()), Some(err.kind())),
        };
        self.audit.record(&InvocationAuditEvent::new(InvocationAuditEventParams {
            operation: invocation.function.clone(),
            key,
            arg_count: invocation.args.len(),
            outcome: if response.is_success() {
                InvocationOutcome::Success
            } else {
                InvocationOutcome::Error
            },
            error_kind,
            payload_bytes: response.payload.len(),
        }));
        response
    }

    /// Routes a function name and arguments to the matching handler.
    ///
    /// # Errors
    ///
    /// Returns [`ContractError`] when the function is unknown, the argument
    /// count is wrong, or the handler fails.
    pub fn dispatch(&self, function: &str, args: &[String]) -> Result<Vec<u8>, ContractError> {
        let operation: Operation = function.parse()?;
        check_arity(operation, args)?;
        match (operation, args) {
            (Operation::SeedLedger, []) => self.seed_ledger().map(|()| Vec::new()),
            (Operation::CreateRecord, [key, make, model, colour, owner]) => self
                .create_record(key, &CarRecord::new(make, model, colour, owner))
                .map(|()| Vec::new()),
            (Operation::QueryRecord, [key]) => self.query_record(key),
            (Operation::QueryAllRecords, []) => self.query_all_records(),
            (Operation::ChangeOwner, [key, owner]) => {
                self.change_owner(key, owner).map(|()| Vec::new())
            }
            (Operation::AcceptAll, [key]) => self
                .set_validation_policy(key, &ValidationPolicy::AcceptAll)
                .map(|()| Vec::new()),
            (Operation::RejectAll, [key]) => self
                .set_validation_policy(key, &ValidationPolicy::RejectAll)
                .map(|()| Vec::new()),
            (Operation::SetPolicy, [key, policy]) => {
                let policy = ValidationPolicy::from_transport(policy)?;
                self.set_validation_policy(key, &policy).map(|()| Vec::new())
            }
            (Operation::GetPolicy, [key]) => {
                self.get_validation_policy(key).map(|policy| policy.to_transport().into_bytes())
            }
            (Operation::CreateRecordWithPolicy, [key, policy, make, model, colour, owner]) => self
                .create_record_with_policy(key, policy, &CarRecord::new(make, model, colour, owner))
                .map(|()| Vec::new()),
            (operation, args) => Err(arity_error(operation, args)),
        }
    }

    /// Writes the seed records under `CAR0` through `CAR9` in index order.
    ///
    /// # Errors
    ///
    /// Returns [`ContractError`] on the first failed write.
    pub fn seed_ledger(&self) -> Result<(), ContractError> {
        for (key, record) in seed_records() {
            self.create_record(&key, &record)?;
        }
        Ok(())
    }

    /// Serializes `record` and stores it under `key`, overwriting.
    ///
    /// # Errors
    ///
    /// Returns [`ContractError`] when serialization or the write fails.
    pub fn create_record(&self, key: &str, record: &CarRecord) -> Result<(), ContractError> {
        let bytes = record.to_json_bytes()?;
        self.ledger.put_state(key, &bytes)?;
        Ok(())
    }

    /// Returns the raw bytes stored under `key`; absent keys yield empty bytes.
    ///
    /// # Errors
    ///
    /// Returns [`ContractError::Ledger`] when the read fails.
    pub fn query_record(&self, key: &str) -> Result<Vec<u8>, ContractError> {
        Ok(self.ledger.get_state(key)?.unwrap_or_default())
    }

    /// Builds a JSON array of `{"Key", "Record"}` objects over the configured
    /// key range, in scan order.
    ///
    /// # Errors
    ///
    /// Returns [`ContractError`] when the scan fails or, in reject mode, when a
    /// stored value is not JSON.
    pub fn query_all_records(&self) -> Result<Vec<u8>, ContractError> {
        let entries =
            self.ledger.get_state_by_range(&self.config.range_start, &self.config.range_end)?;
        let mut results = Vec::new();
        for entry in entries {
            let entry = entry?;
            match serde_json::from_slice::<Box<RawValue>>(&entry.value) {
                Ok(record) => results.push(RangeRecord {
                    key: entry.key,
                    record,
                }),
                Err(err) => match self.config.malformed_range_value {
                    MalformedValueMode::Reject => {
                        return Err(ContractError::MalformedRecord {
                            key: entry.key,
                            reason: err.to_string(),
                        });
                    }
                    MalformedValueMode::Skip => {
                        self.audit
                            .record_range_skip(&RangeSkipAuditEvent::new(entry.key, err.to_string()));
                    }
                },
            }
        }
        Ok(serde_json::to_vec(&results)?)
    }

    /// Replaces the owner of the record stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns [`ContractError`] when the ledger fails or, in fail mode, when
    /// the record is absent or malformed.
    pub fn change_owner(&self, key: &str, owner: &str) -> Result<(), ContractError> {
        let mode = self.config.missing_record;
        let mut record = match self.ledger.get_state(key)? {
            Some(bytes) => match CarRecord::from_json_bytes(&bytes) {
                Ok(record) => record,
                Err(_) if mode == MissingRecordMode::ZeroFill => CarRecord::default(),
                Err(err) => {
                    return Err(ContractError::MalformedRecord {
                        key: key.to_string(),
                        reason: err.to_string(),
                    });
                }
            },
            None if mode == MissingRecordMode::ZeroFill => CarRecord::default(),
            None => return Err(ContractError::RecordNotFound(key.to_string())),
        };
        owner.clone_into(&mut record.owner);
        self.create_record(key, &record)
    }

    /// Sets the validation policy for `key`.
    ///
    /// # Errors
    ///
    /// Returns [`ContractError::Ledger`] when the write fails.
    pub fn set_validation_policy(
        &self,
        key: &str,
        policy: &ValidationPolicy,
    ) -> Result<(), ContractError> {
        self.ledger.set_validation_policy(key, policy.as_bytes())?;
        Ok(())
    }

    /// Reads the validation policy for `key`.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::MissingPolicy`] when no policy is set, or the
    /// ledger error when the read fails.
    pub fn get_validation_policy(&self, key: &str) -> Result<ValidationPolicy, ContractError> {
        let bytes = self
            .ledger
            .get_validation_policy(key)?
            .ok_or_else(|| LedgerError::MissingPolicy(key.to_string()))?;
        Ok(ValidationPolicy::from_bytes(bytes))
    }

    /// Writes `record` under `key`, then decodes and sets its policy.
    ///
    /// The record write is not undone when the policy step fails.
    ///
    /// # Errors
    ///
    /// Returns [`ContractError`] when the write, the decode, or the policy
    /// write fails.
    pub fn create_record_with_policy(
        &self,
        key: &str,
        policy_text: &str,
        record: &CarRecord,
    ) -> Result<(), ContractError> {
        self.create_record(key, record)?;
        let policy = decode_transport(policy_text)?;
        self.ledger.set_validation_policy(key, &policy)?;
        Ok(())
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Fails when `args` does not match the operation's arity.
fn check_arity(operation: Operation, args: &[String]) -> Result<(), ContractError> {
    if args.len() == operation.arity() {
        Ok(())
    } else {
        Err(arity_error(operation, args))
    }
}

/// Builds the arity error for an operation.
const fn arity_error(operation: Operation, args: &[String]) -> ContractError {
    ContractError::Arity {
        operation,
        expected: operation.arity(),
        actual: args.len(),
    }
}
