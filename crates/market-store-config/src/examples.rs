// crates/market-store-config/src/examples.rs
// ============================================================================
// Module: Config Examples
// Description: Canonical example configuration payload.
// Purpose: Deterministic starting point for new deployments.
// Dependencies: std
// ============================================================================

//! ## Overview
//! Canonical example for `market-store.toml`. Every key is shown with its
//! default, except the ledger which demonstrates the keyed `SQLite` backend.

/// Returns a canonical example `market-store.toml` configuration.
#[must_use]
pub fn config_toml_example() -> String {
    String::from(
        r#"# Reference zone applied to loaded timestamps and overviews.
timezone = "+08:00"

[store]
path = "market-store.sqlite"
busy_timeout_ms = 5000
journal_mode = "wal"
sync_mode = "full"

[ledger]
# "tags" keeps overviews on the series tables; "sqlite" uses a keyed table.
backend = "sqlite"
path = "market-overview.sqlite"

[ingest]
chunk_rows = 1000

[logging]
filter = "info"
"#,
    )
}
