//! Config loading and assembly tests for carledger-config.
// crates/carledger-config/tests/loading.rs
// =============================================================================
// Module: Config Loading Tests
// Description: Validate file loading limits and runtime assembly.
// Purpose: Ensure configured ledgers and audit sinks open as described.
// =============================================================================

use std::fs;

use carledger_config::CarLedgerConfig;
use carledger_core::Ledger;
use tempfile::TempDir;

mod common;

use common::TestResult;
use common::assert_invalid;

#[test]
fn explicit_missing_file_is_io_error() -> TestResult {
    let dir = TempDir::new().map_err(|err| err.to_string())?;
    let path = dir.path().join("absent.toml");
    assert_invalid(CarLedgerConfig::load(Some(&path)), "config io error")
}

#[test]
fn oversize_file_rejected() -> TestResult {
    let dir = TempDir::new().map_err(|err| err.to_string())?;
    let path = dir.path().join("big.toml");
    fs::write(&path, "#".repeat(1024 * 1024 + 1)).map_err(|err| err.to_string())?;
    assert_invalid(CarLedgerConfig::load(Some(&path)), "exceeds size limit")
}

#[test]
fn huge_file_rejected_from_metadata() -> TestResult {
    let dir = TempDir::new().map_err(|err| err.to_string())?;
    let path = dir.path().join("huge.toml");
    let file = fs::File::create(&path).map_err(|err| err.to_string())?;
    file.set_len(1024 * 1024 * 1024).map_err(|err| err.to_string())?;
    assert_invalid(CarLedgerConfig::load(Some(&path)), "exceeds size limit")
}

#[test]
fn file_at_size_limit_is_read() -> TestResult {
    let dir = TempDir::new().map_err(|err| err.to_string())?;
    let path = dir.path().join("full.toml");
    fs::write(&path, "#".repeat(1024 * 1024)).map_err(|err| err.to_string())?;
    CarLedgerConfig::load(Some(&path)).map(|_| ()).map_err(|err| err.to_string())
}

#[test]
fn non_utf8_file_rejected() -> TestResult {
    let dir = TempDir::new().map_err(|err| err.to_string())?;
    let path = dir.path().join("bad.toml");
    fs::write(&path, [0xff, 0xfe, 0x00]).map_err(|err| err.to_string())?;
    assert_invalid(CarLedgerConfig::load(Some(&path)), "must be utf-8")
}

#[test]
fn load_validates_contents() -> TestResult {
    let dir = TempDir::new().map_err(|err| err.to_string())?;
    let path = dir.path().join("carledger.toml");
    fs::write(&path, "[audit]\nsink = \"file\"\n").map_err(|err| err.to_string())?;
    assert_invalid(CarLedgerConfig::load(Some(&path)), "file audit sink requires path")
}

#[test]
fn sqlite_config_builds_durable_contract() -> TestResult {
    let dir = TempDir::new().map_err(|err| err.to_string())?;
    let db = dir.path().join("state").join("ledger.db");
    let audit = dir.path().join("audit.jsonl");
    let path = dir.path().join("carledger.toml");
    let toml = format!(
        "[ledger]\ntype = \"sqlite\"\npath = {db:?}\n\n[audit]\nsink = \"file\"\npath = {audit:?}\n",
        db = db.to_string_lossy(),
        audit = audit.to_string_lossy(),
    );
    fs::write(&path, toml).map_err(|err| err.to_string())?;
    let config = CarLedgerConfig::load(Some(&path)).map_err(|err| err.to_string())?;

    let contract = config.build_contract().map_err(|err| err.to_string())?;
    contract.dispatch("seedLedger", &[]).map_err(|err| err.to_string())?;
    drop(contract);

    let reopened = config.build_ledger().map_err(|err| err.to_string())?;
    let stored = reopened.get_state("CAR9").map_err(|err| err.to_string())?;
    if stored.is_none() {
        return Err("seeded record missing after reopen".to_string());
    }
    if !db.exists() {
        return Err("sqlite database not created".to_string());
    }
    Ok(())
}

#[test]
fn memory_config_builds_fresh_ledgers() -> TestResult {
    let config = CarLedgerConfig::default();
    let first = config.build_ledger().map_err(|err| err.to_string())?;
    first.put_state("CAR0", b"{}").map_err(|err| err.to_string())?;
    let second = config.build_ledger().map_err(|err| err.to_string())?;
    if second.get_state("CAR0").map_err(|err| err.to_string())?.is_some() {
        return Err("memory ledgers should not share state".to_string());
    }
    Ok(())
}
