// crates/market-store-sqlite/src/lib.rs
// ============================================================================
// Module: Market Store SQLite Library
// Description: SQLite backends for the series store and overview ledger.
// Purpose: Expose durable, file-backed implementations of the core traits.
// Dependencies: crate::{connection, ledger, store}
// ============================================================================

//! ## Overview
//! [`SqliteSeriesStore`] emulates templates and tagged tables on `SQLite`;
//! [`SqliteOverviewLedger`] is a keyed overview ledger kept in its own file
//! (or the same file, under separate tables). Both validate the store path and
//! reject files written with an incompatible schema version.

// ============================================================================
// SECTION: Modules
// ============================================================================

mod connection;
mod ledger;
mod store;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use connection::DEFAULT_BUSY_TIMEOUT_MS;
pub use connection::SqliteStoreConfig;
pub use connection::SqliteStoreError;
pub use connection::SqliteStoreMode;
pub use connection::SqliteSyncMode;
pub use connection::validate_store_path;
pub use ledger::SqliteOverviewLedger;
pub use store::SqliteSeriesStore;
