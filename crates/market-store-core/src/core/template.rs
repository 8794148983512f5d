// crates/market-store-core/src/core/template.rs
// ============================================================================
// Module: Market Store Templates
// Description: Fixed column sets shared by every physical table of one kind.
// Purpose: Give codecs and store backends one canonical column layout.
// Dependencies: crate::core::identifiers
// ============================================================================

//! ## Overview
//! Each [`RecordKind`] has one template: an ordered list of data columns.
//! Row codecs map records positionally onto these columns and store
//! backends render DDL from them. Series-identifying tags and overview tags
//! are declared separately because they live per table, not per row.

// ============================================================================
// SECTION: Imports
// ============================================================================

use crate::core::identifiers::RecordKind;

// ============================================================================
// SECTION: Column Types
// ============================================================================

/// Storage type of a template column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    /// Epoch-millisecond timestamp.
    Timestamp,
    /// Double-precision float.
    Double,
    /// UTF-8 text.
    Text,
}

/// One template column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Column {
    /// Column name.
    pub name: &'static str,
    /// Column storage type.
    pub column_type: ColumnType,
}

/// Shorthand constructor for const column tables.
const fn column(name: &'static str, column_type: ColumnType) -> Column {
    Column {
        name,
        column_type,
    }
}

// ============================================================================
// SECTION: Templates
// ============================================================================

/// Name of the primary timestamp column in every template.
pub const TIMESTAMP_COLUMN: &str = "datetime";

/// Bar template columns.
pub const BAR_COLUMNS: [Column; 8] = [
    column(TIMESTAMP_COLUMN, ColumnType::Timestamp),
    column("volume", ColumnType::Double),
    column("turnover", ColumnType::Double),
    column("open_interest", ColumnType::Double),
    column("open_price", ColumnType::Double),
    column("high_price", ColumnType::Double),
    column("low_price", ColumnType::Double),
    column("close_price", ColumnType::Double),
];

/// Tick template columns.
pub const TICK_COLUMNS: [Column; 34] = [
    column(TIMESTAMP_COLUMN, ColumnType::Timestamp),
    column("name", ColumnType::Text),
    column("volume", ColumnType::Double),
    column("turnover", ColumnType::Double),
    column("open_interest", ColumnType::Double),
    column("last_price", ColumnType::Double),
    column("last_volume", ColumnType::Double),
    column("limit_up", ColumnType::Double),
    column("limit_down", ColumnType::Double),
    column("open_price", ColumnType::Double),
    column("high_price", ColumnType::Double),
    column("low_price", ColumnType::Double),
    column("pre_close", ColumnType::Double),
    column("bid_price_1", ColumnType::Double),
    column("bid_price_2", ColumnType::Double),
    column("bid_price_3", ColumnType::Double),
    column("bid_price_4", ColumnType::Double),
    column("bid_price_5", ColumnType::Double),
    column("ask_price_1", ColumnType::Double),
    column("ask_price_2", ColumnType::Double),
    column("ask_price_3", ColumnType::Double),
    column("ask_price_4", ColumnType::Double),
    column("ask_price_5", ColumnType::Double),
    column("bid_volume_1", ColumnType::Double),
    column("bid_volume_2", ColumnType::Double),
    column("bid_volume_3", ColumnType::Double),
    column("bid_volume_4", ColumnType::Double),
    column("bid_volume_5", ColumnType::Double),
    column("ask_volume_1", ColumnType::Double),
    column("ask_volume_2", ColumnType::Double),
    column("ask_volume_3", ColumnType::Double),
    column("ask_volume_4", ColumnType::Double),
    column("ask_volume_5", ColumnType::Double),
    column("localtime", ColumnType::Timestamp),
];

impl RecordKind {
    /// Returns the template columns for this record kind.
    #[must_use]
    pub const fn columns(self) -> &'static [Column] {
        match self {
            Self::Bar => &BAR_COLUMNS,
            Self::Tick => &TICK_COLUMNS,
        }
    }

    /// Returns the template (super-table) name for this record kind.
    #[must_use]
    pub const fn template_name(self) -> &'static str {
        match self {
            Self::Bar => "s_bar",
            Self::Tick => "s_tick",
        }
    }
}
