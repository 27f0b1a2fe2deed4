// crates/carledger-core/tests/contract.rs
// ============================================================================
// Module: Car Contract Tests
// Description: Operation-level tests for the car contract dispatcher.
// Purpose: Validate record storage, policy handling, arity, and range queries.
// Dependencies: carledger-core, serde_json
// ============================================================================
//! ## Overview
//! Drives the contract through `dispatch` and `invoke` against the in-memory
//! ledger and checks the resulting world state and validation parameters.

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only output and panic-based assertions are permitted."
)]

use std::sync::Arc;
use std::sync::Mutex;

use carledger_core::CarContract;
use carledger_core::CarRecord;
use carledger_core::ContractAuditSink;
use carledger_core::ContractConfig;
use carledger_core::ContractError;
use carledger_core::InMemoryLedger;
use carledger_core::Invocation;
use carledger_core::InvocationAuditEvent;
use carledger_core::InvocationOutcome;
use carledger_core::Ledger;
use carledger_core::LedgerError;
use carledger_core::MalformedValueMode;
use carledger_core::MissingRecordMode;
use carledger_core::Operation;
use carledger_core::RangeSkipAuditEvent;
use carledger_core::ValidationPolicy;
use carledger_core::seed_records;
use serde_json::Value;

// ============================================================================
// SECTION: Helpers
// ============================================================================

const ACCEPT_ALL_TEXT: &str = "EggSBggBEgIIABoLEgkKB0hvbmVNU1A=";
const REJECT_ALL_TEXT: &str = "EgQSAggB";

#[derive(Default)]
struct RecordingSink {
    invocations: Mutex<Vec<InvocationAuditEvent>>,
    skips: Mutex<Vec<RangeSkipAuditEvent>>,
}

impl ContractAuditSink for RecordingSink {
    fn record(&self, event: &InvocationAuditEvent) {
        self.invocations.lock().unwrap().push(event.clone());
    }

    fn record_range_skip(&self, event: &RangeSkipAuditEvent) {
        self.skips.lock().unwrap().push(event.clone());
    }
}

fn args(values: &[&str]) -> Vec<String> {
    values.iter().map(|value| (*value).to_string()).collect()
}

fn contract() -> CarContract<InMemoryLedger> {
    CarContract::new(InMemoryLedger::new())
}

fn contract_with(config: ContractConfig) -> (CarContract<InMemoryLedger>, Arc<RecordingSink>) {
    let sink = Arc::new(RecordingSink::default());
    let contract = CarContract::with_config(InMemoryLedger::new(), config, sink.clone());
    (contract, sink)
}

fn range_keys(payload: &[u8]) -> Vec<String> {
    let value: Value = serde_json::from_slice(payload).unwrap();
    value
        .as_array()
        .unwrap()
        .iter()
        .map(|entry| entry["Key"].as_str().unwrap().to_string())
        .collect()
}

fn text(payload: Vec<u8>) -> String {
    String::from_utf8(payload).unwrap()
}

// ============================================================================
// SECTION: Records
// ============================================================================

/// Verifies seeding stores the ten fixed records under `CAR0..CAR9`.
#[test]
fn seed_ledger_writes_fixed_records() {
    let contract = contract();
    assert!(contract.dispatch("seedLedger", &[]).unwrap().is_empty());

    let first = contract.dispatch("queryRecord", &args(&["CAR0"])).unwrap();
    assert_eq!(text(first), r#"{"make":"Toyota","model":"Prius","colour":"blue","owner":"Tomoko"}"#);

    let listed = contract.dispatch("queryAllRecords", &[]).unwrap();
    let expected: Vec<String> = seed_records().into_iter().map(|(key, _)| key).collect();
    assert_eq!(range_keys(&listed), expected);

    let value: Value = serde_json::from_slice(&listed).unwrap();
    let entries = value.as_array().unwrap();
    assert_eq!(entries.len(), 10);
    for (entry, (key, record)) in entries.iter().zip(seed_records()) {
        assert_eq!(entry["Key"], Value::String(key.clone()));
        let listed_record: CarRecord = serde_json::from_value(entry["Record"].clone()).unwrap();
        assert_eq!(listed_record, record, "record mismatch at {key}");
    }
}

/// Verifies the range output splices stored JSON under `Key` and `Record`.
#[test]
fn query_all_records_output_shape() {
    let contract = contract();
    contract.dispatch("createRecord", &args(&["CAR1", "Ford", "Mustang", "red", "Brad"])).unwrap();
    let listed = text(contract.dispatch("queryAllRecords", &[]).unwrap());
    assert_eq!(
        listed,
        r#"[{"Key":"CAR1","Record":{"make":"Ford","model":"Mustang","colour":"red","owner":"Brad"}}]"#
    );
}

/// Verifies an empty range produces an empty JSON array.
#[test]
fn query_all_records_empty_range() {
    let contract = contract();
    assert_eq!(text(contract.dispatch("queryAllRecords", &[]).unwrap()), "[]");
}

/// Verifies a second create overwrites the first.
#[test]
fn create_record_overwrites_existing_value() {
    let contract = contract();
    contract.dispatch("createRecord", &args(&["CAR3", "Fiat", "Punto", "violet", "Pari"])).unwrap();
    contract.dispatch("createRecord", &args(&["CAR3", "Tata", "Nano", "indigo", "Valeria"])).unwrap();
    let stored = contract.dispatch("queryRecord", &args(&["CAR3"])).unwrap();
    assert_eq!(text(stored), r#"{"make":"Tata","model":"Nano","colour":"indigo","owner":"Valeria"}"#);
}

/// Verifies querying an absent key yields an empty payload.
#[test]
fn query_record_absent_key_is_empty() {
    let contract = contract();
    assert!(contract.dispatch("queryRecord", &args(&["CAR42"])).unwrap().is_empty());
}

/// Verifies owner changes keep the other fields.
#[test]
fn change_owner_replaces_owner_only() {
    let contract = contract();
    contract.dispatch("seedLedger", &[]).unwrap();
    contract.dispatch("changeOwner", &args(&["CAR4", "Dave"])).unwrap();
    let stored = contract.dispatch("queryRecord", &args(&["CAR4"])).unwrap();
    assert_eq!(text(stored), r#"{"make":"Tesla","model":"S","colour":"black","owner":"Dave"}"#);
}

/// Verifies the default mode refuses to change the owner of an absent record.
#[test]
fn change_owner_absent_record_fails_by_default() {
    let contract = contract();
    let err = contract.dispatch("changeOwner", &args(&["CAR7", "Dave"])).unwrap_err();
    assert_eq!(err, ContractError::RecordNotFound("CAR7".to_string()));
    assert!(contract.ledger().get_state("CAR7").unwrap().is_none());
}

/// Verifies the default mode refuses to overwrite a malformed record.
#[test]
fn change_owner_malformed_record_fails_by_default() {
    let contract = contract();
    contract.ledger().put_state("CAR7", b"garbage").unwrap();
    let err = contract.dispatch("changeOwner", &args(&["CAR7", "Dave"])).unwrap_err();
    assert!(matches!(err, ContractError::MalformedRecord { ref key, .. } if key == "CAR7"));
    assert_eq!(contract.ledger().get_state("CAR7").unwrap(), Some(b"garbage".to_vec()));
}

/// Verifies zero-fill mode writes a record holding only the owner.
#[test]
fn change_owner_zero_fill_creates_record() {
    let (contract, _) = contract_with(ContractConfig {
        missing_record: MissingRecordMode::ZeroFill,
        ..ContractConfig::default()
    });
    contract.dispatch("changeOwner", &args(&["CAR7", "Dave"])).unwrap();
    contract.ledger().put_state("CAR8", b"garbage").unwrap();
    contract.dispatch("changeOwner", &args(&["CAR8", "Erin"])).unwrap();

    let stored = contract.dispatch("queryRecord", &args(&["CAR7"])).unwrap();
    assert_eq!(text(stored), r#"{"make":"","model":"","colour":"","owner":"Dave"}"#);
    let stored = contract.dispatch("queryRecord", &args(&["CAR8"])).unwrap();
    assert_eq!(text(stored), r#"{"make":"","model":"","colour":"","owner":"Erin"}"#);
}

/// Verifies a stored record missing a field keeps the fields it has.
#[test]
fn change_owner_keeps_fields_of_partial_record() {
    let partial: &[u8] = br#"{"make":"Toyota","model":"Prius","owner":"Tomoko"}"#;
    for mode in [MissingRecordMode::Fail, MissingRecordMode::ZeroFill] {
        let (contract, _) = contract_with(ContractConfig {
            missing_record: mode,
            ..ContractConfig::default()
        });
        contract.ledger().put_state("CAR1", partial).unwrap();
        contract.dispatch("changeOwner", &args(&["CAR1", "Dave"])).unwrap();
        let stored = contract.dispatch("queryRecord", &args(&["CAR1"])).unwrap();
        assert_eq!(text(stored), r#"{"make":"Toyota","model":"Prius","colour":"","owner":"Dave"}"#);
    }
}

// ============================================================================
// SECTION: Policies
// ============================================================================

/// Verifies accept-all and reject-all round-trip through getPolicy.
#[test]
fn canonical_policies_round_trip() {
    let contract = contract();
    contract.dispatch("acceptAll", &args(&["CAR0"])).unwrap();
    contract.dispatch("rejectAll", &args(&["CAR1"])).unwrap();

    assert_eq!(text(contract.dispatch("getPolicy", &args(&["CAR0"])).unwrap()), ACCEPT_ALL_TEXT);
    assert_eq!(text(contract.dispatch("getPolicy", &args(&["CAR1"])).unwrap()), REJECT_ALL_TEXT);
    assert_eq!(contract.get_validation_policy("CAR0").unwrap(), ValidationPolicy::AcceptAll);
    assert_eq!(contract.get_validation_policy("CAR1").unwrap(), ValidationPolicy::RejectAll);
}

/// Verifies custom policy bytes are stored opaquely.
#[test]
fn custom_policy_round_trip() {
    let contract = contract();
    contract.dispatch("setPolicy", &args(&["CAR0", "AQID"])).unwrap();
    assert_eq!(contract.ledger().get_validation_policy("CAR0").unwrap(), Some(vec![1, 2, 3]));
    assert_eq!(text(contract.dispatch("getPolicy", &args(&["CAR0"])).unwrap()), "AQID");
}

/// Verifies setting a policy leaves the stored value untouched.
#[test]
fn policy_is_independent_of_value() {
    let contract = contract();
    contract.dispatch("seedLedger", &[]).unwrap();
    let before = contract.dispatch("queryRecord", &args(&["CAR2"])).unwrap();
    contract.dispatch("rejectAll", &args(&["CAR2"])).unwrap();
    assert_eq!(contract.dispatch("queryRecord", &args(&["CAR2"])).unwrap(), before);

    contract.dispatch("changeOwner", &args(&["CAR2", "Dave"])).unwrap();
    assert_eq!(text(contract.dispatch("getPolicy", &args(&["CAR2"])).unwrap()), REJECT_ALL_TEXT);
}

/// Verifies getPolicy reports keys without a policy.
#[test]
fn get_policy_missing_fails() {
    let contract = contract();
    let err = contract.dispatch("getPolicy", &args(&["CAR0"])).unwrap_err();
    assert_eq!(err, ContractError::Ledger(LedgerError::MissingPolicy("CAR0".to_string())));
}

/// Verifies invalid transport text fails before any write.
#[test]
fn set_policy_rejects_invalid_transport() {
    let contract = contract();
    let err = contract.dispatch("setPolicy", &args(&["CAR0", "not-base64!!"])).unwrap_err();
    assert!(matches!(err, ContractError::Decode(_)));
    assert!(contract.ledger().get_validation_policy("CAR0").unwrap().is_none());
}

/// Verifies the record write survives a failed policy decode.
#[test]
fn create_record_with_policy_partial_failure_keeps_record() {
    let contract = contract();
    let err = contract
        .dispatch(
            "createRecordWithPolicy",
            &args(&["CAR5", "not-base64!!", "Toyota", "Prius", "blue", "Tomoko"]),
        )
        .unwrap_err();
    assert!(matches!(err, ContractError::Decode(_)));
    let stored = contract.dispatch("queryRecord", &args(&["CAR5"])).unwrap();
    assert_eq!(text(stored), r#"{"make":"Toyota","model":"Prius","colour":"blue","owner":"Tomoko"}"#);
    let err = contract.dispatch("getPolicy", &args(&["CAR5"])).unwrap_err();
    assert_eq!(err, ContractError::Ledger(LedgerError::MissingPolicy("CAR5".to_string())));
}

/// Verifies the combined operation stores both value and policy.
#[test]
fn create_record_with_policy_sets_both() {
    let contract = contract();
    contract
        .dispatch(
            "createRecordWithPolicy",
            &args(&["CAR6", REJECT_ALL_TEXT, "Chery", "S22L", "white", "Aarav"]),
        )
        .unwrap();
    assert!(contract.ledger().get_state("CAR6").unwrap().is_some());
    assert_eq!(contract.get_validation_policy("CAR6").unwrap(), ValidationPolicy::RejectAll);
}

// ============================================================================
// SECTION: Dispatch
// ============================================================================

/// Verifies every operation rejects a wrong argument count without writing.
#[test]
fn arity_mismatch_never_mutates() {
    let contract = contract();
    for operation in Operation::ALL {
        let wrong = vec!["CAR0".to_string(); operation.arity() + 1];
        let err = contract.dispatch(operation.as_str(), &wrong).unwrap_err();
        assert_eq!(
            err,
            ContractError::Arity {
                operation,
                expected: operation.arity(),
                actual: operation.arity() + 1,
            }
        );
    }
    assert!(contract.ledger().get_state("CAR0").unwrap().is_none());
    assert!(contract.ledger().get_validation_policy("CAR0").unwrap().is_none());
    assert_eq!(text(contract.dispatch("queryAllRecords", &[]).unwrap()), "[]");
}

/// Verifies every operation with arguments rejects one too few without writing.
#[test]
fn arity_shortfall_never_mutates() {
    let contract = contract();
    for operation in Operation::ALL.into_iter().filter(|operation| operation.arity() > 0) {
        let short = vec!["CAR0".to_string(); operation.arity() - 1];
        let err = contract.dispatch(operation.as_str(), &short).unwrap_err();
        assert_eq!(
            err,
            ContractError::Arity {
                operation,
                expected: operation.arity(),
                actual: operation.arity() - 1,
            }
        );
    }
    let err = contract
        .dispatch(
            "createRecordWithPolicy",
            &args(&["CAR0", ACCEPT_ALL_TEXT, "Toyota", "Prius", "blue"]),
        )
        .unwrap_err();
    assert!(matches!(err, ContractError::Arity { expected: 6, actual: 5, .. }));
    assert!(contract.ledger().get_state("CAR0").unwrap().is_none());
    assert!(contract.ledger().get_validation_policy("CAR0").unwrap().is_none());
    assert_eq!(text(contract.dispatch("queryAllRecords", &[]).unwrap()), "[]");
}

/// Verifies the arity message names the expected count.
#[test]
fn arity_message_names_expected_count() {
    let contract = contract();
    let err = contract.dispatch("createRecord", &args(&["CAR0", "a", "b", "c"])).unwrap_err();
    assert_eq!(
        err.to_string(),
        "incorrect number of arguments for createRecord: expecting 5, got 4"
    );
}

/// Verifies unknown names are rejected.
#[test]
fn unknown_operation_rejected() {
    let contract = contract();
    let err = contract.dispatch("deleteRecord", &args(&["CAR0"])).unwrap_err();
    assert_eq!(err, ContractError::UnknownOperation("deleteRecord".to_string()));
    assert_eq!(err.kind(), "unknown_operation");
}

/// Verifies legacy function names dispatch to the same handlers.
#[test]
fn legacy_names_are_aliases() {
    let contract = contract();
    contract.dispatch("initLedger", &[]).unwrap();
    contract.dispatch("createCar", &args(&["CAR10", "Fiat", "Uno", "grey", "Luca"])).unwrap();
    contract.dispatch("changeCarOwner", &args(&["CAR10", "Sofia"])).unwrap();
    let stored = text(contract.dispatch("queryCar", &args(&["CAR10"])).unwrap());
    assert!(stored.contains(r#""owner":"Sofia""#));
    assert_eq!(range_keys(&contract.dispatch("queryAllCars", &[]).unwrap()).len(), 11);
    assert_eq!("keyValueWithPolicy".parse::<Operation>().unwrap(), Operation::CreateRecordWithPolicy);
}

/// Verifies invoke maps results to status codes and audits each call.
#[test]
fn invoke_maps_status_and_audits() {
    let (contract, sink) = contract_with(ContractConfig::default());
    let ok = contract.invoke(&Invocation::new("acceptAll", ["CAR0"]));
    assert!(ok.is_success());
    assert!(ok.payload.is_empty());

    let failed = contract.invoke(&Invocation::new("getPolicy", ["CAR9"]));
    assert_eq!(failed.status, 500);
    assert_eq!(failed.message, "no validation parameter set for key CAR9");

    let events = sink.invocations.lock().unwrap();
    assert_eq!(events.len(), 2);
    assert_eq!(events[0].operation, "acceptAll");
    assert_eq!(events[0].key.as_deref(), Some("CAR0"));
    assert_eq!(events[0].outcome, InvocationOutcome::Success);
    assert_eq!(events[1].outcome, InvocationOutcome::Error);
    assert_eq!(events[1].error_kind, Some("ledger"));
}

// ============================================================================
// SECTION: Range Queries
// ============================================================================

/// Verifies the default window is byte-ordered with an exclusive end.
#[test]
fn range_bounds_follow_byte_order() {
    let contract = contract();
    for key in ["CAR10", "CAR2", "CARA", "CAR1000", "CAR999", "CAR0", "CAQ9", "car1"] {
        contract.dispatch("createRecord", &args(&[key, "m", "m", "c", "o"])).unwrap();
    }
    let listed = contract.dispatch("queryAllRecords", &[]).unwrap();
    assert_eq!(range_keys(&listed), vec!["CAR0", "CAR10", "CAR1000", "CAR2"]);
}

/// Verifies configured range bounds replace the defaults.
#[test]
fn range_bounds_are_configurable() {
    let (contract, _) = contract_with(ContractConfig {
        range_start: "CAR3".to_string(),
        range_end: "CAR6".to_string(),
        ..ContractConfig::default()
    });
    contract.dispatch("seedLedger", &[]).unwrap();
    let listed = contract.dispatch("queryAllRecords", &[]).unwrap();
    assert_eq!(range_keys(&listed), vec!["CAR3", "CAR4", "CAR5"]);
}

/// Verifies non-JSON values fail the range query in reject mode.
#[test]
fn malformed_range_value_rejected_by_default() {
    let contract = contract();
    contract.dispatch("seedLedger", &[]).unwrap();
    contract.ledger().put_state("CAR5", b"\xff not json").unwrap();
    let err = contract.dispatch("queryAllRecords", &[]).unwrap_err();
    assert!(matches!(err, ContractError::MalformedRecord { ref key, .. } if key == "CAR5"));
}

/// Verifies skip mode drops non-JSON values and audits them.
#[test]
fn malformed_range_value_skipped_when_configured() {
    let (contract, sink) = contract_with(ContractConfig {
        malformed_range_value: MalformedValueMode::Skip,
        ..ContractConfig::default()
    });
    contract.dispatch("seedLedger", &[]).unwrap();
    contract.ledger().put_state("CAR5", b"not json").unwrap();
    let listed = contract.dispatch("queryAllRecords", &[]).unwrap();
    let keys = range_keys(&listed);
    assert_eq!(keys.len(), 9);
    assert!(!keys.contains(&"CAR5".to_string()));

    let skips = sink.skips.lock().unwrap();
    assert_eq!(skips.len(), 1);
    assert_eq!(skips[0].key, "CAR5");
}

/// Verifies invalid keys surface as ledger errors.
#[test]
fn invalid_keys_rejected() {
    let contract = contract();
    let err = contract.dispatch("acceptAll", &args(&[""])).unwrap_err();
    assert!(matches!(err, ContractError::Ledger(LedgerError::InvalidKey(_))));
    let err = contract.dispatch("queryRecord", &args(&["\u{0}CAR0"])).unwrap_err();
    assert!(matches!(err, ContractError::Ledger(LedgerError::InvalidKey(_))));
}
