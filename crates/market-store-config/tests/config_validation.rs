//! Config defaults and validation tests for market-store-config.
// crates/market-store-config/tests/config_validation.rs
// =============================================================================
// Module: Config Defaults and Validation Tests
// Description: Validate defaults and every section's constraints.
// Purpose: Ensure an empty config is usable and bad values fail closed.
// =============================================================================

#![allow(
    clippy::use_debug,
    reason = "Test failure messages include debug output of the loaded config."
)]

use std::path::PathBuf;

use market_store_config::ConfigError;
use market_store_config::LedgerBackend;
use market_store_config::MAX_BUSY_TIMEOUT_MS;
use market_store_config::MAX_CHUNK_ROWS;
use market_store_config::MarketStoreConfig;
use market_store_config::config_toml_example;
use market_store_core::DEFAULT_MAX_CHUNK_ROWS;
use market_store_core::ReferenceZone;

type TestResult = Result<(), String>;

fn minimal_config() -> Result<MarketStoreConfig, String> {
    toml::from_str("").map_err(|err: toml::de::Error| err.to_string())
}

fn assert_invalid(result: Result<(), ConfigError>, needle: &str) -> TestResult {
    match result {
        Err(error) => {
            let message = error.to_string();
            if message.contains(needle) {
                Ok(())
            } else {
                Err(format!("error {message} did not contain {needle}"))
            }
        }
        Ok(()) => Err("expected invalid config".to_string()),
    }
}

#[test]
fn default_config_validates() -> TestResult {
    let config = minimal_config()?;
    config.validate().map_err(|err| err.to_string())?;
    if config != MarketStoreConfig::default() {
        return Err("empty file should equal the default config".to_string());
    }
    let options = config.database_options().map_err(|err| err.to_string())?;
    if options.zone != ReferenceZone::UTC || options.max_chunk_rows != DEFAULT_MAX_CHUNK_ROWS {
        return Err(format!("unexpected default options: {options:?}"));
    }
    if config.ledger_sqlite_config().is_some() {
        return Err("tags ledger should not produce sqlite settings".to_string());
    }
    Ok(())
}

#[test]
fn example_config_validates() -> TestResult {
    let config: MarketStoreConfig =
        toml::from_str(&config_toml_example()).map_err(|err| err.to_string())?;
    config.validate().map_err(|err| err.to_string())?;
    let ledger = config.ledger_sqlite_config().ok_or("example should use the sqlite ledger")?;
    if ledger.path != PathBuf::from("market-overview.sqlite")
        || ledger.journal_mode != config.store.journal_mode
    {
        return Err(format!("unexpected ledger settings: {ledger:?}"));
    }
    Ok(())
}

#[test]
fn timezone_must_be_fixed_offset() -> TestResult {
    let mut config = minimal_config()?;
    for zone in ["Asia/Shanghai", "+8", "08:00", ""] {
        config.timezone = zone.to_string();
        assert_invalid(config.validate(), "timezone")?;
    }
    config.timezone = "+08:00".to_string();
    config.validate().map_err(|err| err.to_string())?;
    Ok(())
}

#[test]
fn tags_ledger_rejects_path() -> TestResult {
    let mut config = minimal_config()?;
    config.ledger.path = Some(PathBuf::from("ledger.sqlite"));
    assert_invalid(config.validate(), "tags ledger must not set path")?;
    Ok(())
}

#[test]
fn sqlite_ledger_requires_path() -> TestResult {
    let mut config = minimal_config()?;
    config.ledger.backend = LedgerBackend::Sqlite;
    assert_invalid(config.validate(), "sqlite ledger requires path")?;
    config.ledger.path = Some(PathBuf::new());
    assert_invalid(config.validate(), "ledger.path")?;
    Ok(())
}

#[test]
fn store_path_must_not_be_empty() -> TestResult {
    let mut config = minimal_config()?;
    config.store.path = PathBuf::new();
    assert_invalid(config.validate(), "store.path")?;
    Ok(())
}

#[test]
fn busy_timeout_bounds() -> TestResult {
    let mut config = minimal_config()?;
    config.store.busy_timeout_ms = 0;
    assert_invalid(config.validate(), "store.busy_timeout_ms")?;
    config.store.busy_timeout_ms = MAX_BUSY_TIMEOUT_MS + 1;
    assert_invalid(config.validate(), "store.busy_timeout_ms")?;
    config.store.busy_timeout_ms = MAX_BUSY_TIMEOUT_MS;
    config.validate().map_err(|err| err.to_string())?;
    Ok(())
}

#[test]
fn chunk_rows_bounds() -> TestResult {
    let mut config = minimal_config()?;
    config.ingest.chunk_rows = 0;
    assert_invalid(config.validate(), "ingest.chunk_rows")?;
    config.ingest.chunk_rows = MAX_CHUNK_ROWS + 1;
    assert_invalid(config.validate(), "ingest.chunk_rows")?;
    config.ingest.chunk_rows = 1;
    config.validate().map_err(|err| err.to_string())?;
    Ok(())
}

#[test]
fn logging_filter_must_be_set() -> TestResult {
    let mut config = minimal_config()?;
    config.logging.filter = "   ".to_string();
    assert_invalid(config.validate(), "logging.filter must be non-empty")?;
    config.logging.filter = "x".repeat(2_000);
    assert_invalid(config.validate(), "logging.filter exceeds max length")?;
    Ok(())
}
