// crates/market-store-core/src/runtime/mod.rs
// ============================================================================
// Module: Market Store Runtime
// Description: Codec, catalog, writer, ledgers, and ingestion orchestrator.
// Purpose: Persist batches and maintain series overviews over store interfaces.
// Dependencies: crate::{core, interfaces}, thiserror, tracing
// ============================================================================

//! ## Overview
//! Runtime modules implement the ingestion path on top of the
//! [`crate::interfaces::SeriesStore`] and [`crate::interfaces::OverviewLedger`]
//! contracts. Backend crates only implement those contracts; every overview
//! decision is made here.

// ============================================================================
// SECTION: Submodules
// ============================================================================

pub mod catalog;
pub mod codec;
pub mod ingest;
pub mod ledger;
pub mod locks;
pub mod store;
pub mod writer;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use catalog::TableCatalog;
pub use codec::CodecError;
pub use codec::RowCodec;
pub use ingest::DatabaseOptions;
pub use ingest::IngestError;
pub use ingest::MarketDatabase;
pub use ingest::SaveReceipt;
pub use ingest::select_strategy;
pub use ledger::TagOverviewLedger;
pub use locks::SeriesLocks;
pub use store::InMemoryOverviewLedger;
pub use store::InMemorySeriesStore;
pub use store::SharedOverviewLedger;
pub use writer::ChunkedWriter;
pub use writer::DEFAULT_MAX_CHUNK_ROWS;
pub use writer::WriteError;
