// crates/market-store-core/src/lib.rs
// ============================================================================
// Module: Market Store Core Library
// Description: Public API surface for the market store core.
// Purpose: Expose core types, store interfaces, and the ingestion runtime.
// Dependencies: crate::{core, interfaces, runtime}
// ============================================================================

//! ## Overview
//! Market store core persists OHLCV bars and order-book ticks into per-series
//! tables of a tag-partitioned time-series store and keeps a
//! `{start, end, count}` overview per series without rescanning the series on
//! every write. Stores and overview ledgers plug in through the traits in
//! [`interfaces`].

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod core;
pub mod interfaces;
pub mod runtime;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use self::core::*;

pub use interfaces::LedgerError;
pub use interfaces::OverviewLedger;
pub use interfaces::OverviewTags;
pub use interfaces::Row;
pub use interfaces::SeriesStore;
pub use interfaces::Statement;
pub use interfaces::StoreError;
pub use interfaces::Value;
pub use runtime::ChunkedWriter;
pub use runtime::CodecError;
pub use runtime::DEFAULT_MAX_CHUNK_ROWS;
pub use runtime::DatabaseOptions;
pub use runtime::InMemoryOverviewLedger;
pub use runtime::InMemorySeriesStore;
pub use runtime::IngestError;
pub use runtime::MarketDatabase;
pub use runtime::RowCodec;
pub use runtime::SaveReceipt;
pub use runtime::SeriesLocks;
pub use runtime::SharedOverviewLedger;
pub use runtime::TableCatalog;
pub use runtime::TagOverviewLedger;
pub use runtime::WriteError;
pub use runtime::select_strategy;
