// crates/market-store-core/src/core/mod.rs
// ============================================================================
// Module: Market Store Core Types
// Description: Canonical series identity, record, template, and overview types.
// Purpose: Provide stable, serializable types shared by every store backend.
// Dependencies: serde, time
// ============================================================================

//! ## Overview
//! Core types define what a series is, what is stored in it, and how its
//! overview is summarized. They carry no I/O and are the source of truth for
//! the store interfaces and runtime.

// ============================================================================
// SECTION: Submodules
// ============================================================================

pub mod identifiers;
pub mod overview;
pub mod records;
pub mod template;
pub mod time;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use identifiers::Exchange;
pub use identifiers::Interval;
pub use identifiers::KeyError;
pub use identifiers::MAX_SYMBOL_LENGTH;
pub use identifiers::RecordKind;
pub use identifiers::SeriesKey;
pub use identifiers::TableName;
pub use overview::BatchBounds;
pub use overview::OverviewUpdate;
pub use overview::SeriesOverview;
pub use overview::WriteMode;
pub use records::BOOK_DEPTH;
pub use records::Bar;
pub use records::Tick;
pub use template::BAR_COLUMNS;
pub use template::Column;
pub use template::ColumnType;
pub use template::TICK_COLUMNS;
pub use template::TIMESTAMP_COLUMN;
pub use self::time::ReferenceZone;
pub use self::time::TimeError;
pub use self::time::to_unix_millis;
