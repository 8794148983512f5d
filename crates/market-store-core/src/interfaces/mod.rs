// crates/market-store-core/src/interfaces/mod.rs
// ============================================================================
// Module: Market Store Interfaces
// Description: Backend-agnostic store and overview-ledger contracts.
// Purpose: Define the narrow surfaces the ingestion runtime consumes.
// Dependencies: crate::core, thiserror
// ============================================================================

//! ## Overview
//! The runtime talks to two collaborators:
//! - a [`SeriesStore`], the tag-partitioned time-series store, through typed
//!   [`Statement`]s that backends render into parameterized queries of their
//!   own dialect;
//! - an [`OverviewLedger`], which stores one [`SeriesOverview`] per series.
//!
//! Implementations do not retry; retry policy belongs to the driver.

// ============================================================================
// SECTION: Imports
// ============================================================================

use thiserror::Error;

use crate::core::RecordKind;
use crate::core::SeriesKey;
use crate::core::SeriesOverview;
use crate::core::TableName;

// ============================================================================
// SECTION: Values and Rows
// ============================================================================

/// A single bound or returned column value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// SQL NULL.
    Null,
    /// Signed integer.
    Integer(i64),
    /// Double-precision float.
    Double(f64),
    /// UTF-8 text.
    Text(String),
    /// Unix epoch milliseconds.
    Timestamp(i64),
}

/// One row of column values in template or result order.
pub type Row = Vec<Value>;

/// Overview values kept as tags on a physical table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OverviewTags {
    /// Earliest timestamp (epoch milliseconds).
    pub start: i64,
    /// Latest timestamp (epoch milliseconds).
    pub end: i64,
    /// Row count.
    pub count: u64,
}

// ============================================================================
// SECTION: Statements
// ============================================================================

/// Typed store statement; backends bind every value as a parameter.
///
/// Result shapes for [`SeriesStore::query`]:
/// - `SelectOverviewTags`: one row `[start, end, count]`; `start`/`end` are
///   `Timestamp` or `Null` (never set), `count` is `Integer`.
/// - `SelectTemplateOverviews`: one row per table of the kind,
///   `[symbol, exchange, interval, start, end, count]`, `interval` `Null`
///   for ticks, ordered by table identifier.
/// - `SelectRange`: template rows with `start <= datetime <= end`, ascending.
/// - `CountRows`: one row `[Integer]`.
#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    /// Creates the shared template for a record kind if absent.
    CreateTemplate {
        /// Template record kind.
        kind: RecordKind,
    },
    /// Creates a physical table from its template if absent, tagged with the
    /// series key; overview tags start zeroed and are never reset.
    CreateTable {
        /// Physical table identifier.
        table: TableName,
        /// Series identity written as tags.
        key: SeriesKey,
    },
    /// Inserts rows into a physical table as one write unit.
    Insert {
        /// Physical table identifier.
        table: TableName,
        /// Rows in template column order.
        rows: Vec<Row>,
    },
    /// Overwrites the overview tags of a physical table.
    SetOverviewTags {
        /// Physical table identifier.
        table: TableName,
        /// New overview tag values.
        tags: OverviewTags,
    },
    /// Reads the overview tags of a physical table.
    SelectOverviewTags {
        /// Physical table identifier.
        table: TableName,
    },
    /// Reads identity and overview tags of every table of a template.
    SelectTemplateOverviews {
        /// Template record kind.
        kind: RecordKind,
    },
    /// Reads rows in an inclusive timestamp range.
    SelectRange {
        /// Physical table identifier.
        table: TableName,
        /// Inclusive lower bound (epoch milliseconds).
        start: i64,
        /// Inclusive upper bound (epoch milliseconds).
        end: i64,
    },
    /// Counts rows in a physical table.
    CountRows {
        /// Physical table identifier.
        table: TableName,
    },
    /// Drops a physical table together with its tags.
    DropTable {
        /// Physical table identifier.
        table: TableName,
    },
}

impl Statement {
    /// Returns a stable label for logs and errors.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::CreateTemplate {
                ..
            } => "create_template",
            Self::CreateTable {
                ..
            } => "create_table",
            Self::Insert {
                ..
            } => "insert",
            Self::SetOverviewTags {
                ..
            } => "set_overview_tags",
            Self::SelectOverviewTags {
                ..
            } => "select_overview_tags",
            Self::SelectTemplateOverviews {
                ..
            } => "select_template_overviews",
            Self::SelectRange {
                ..
            } => "select_range",
            Self::CountRows {
                ..
            } => "count_rows",
            Self::DropTable {
                ..
            } => "drop_table",
        }
    }

    /// Returns true for statements that produce rows.
    #[must_use]
    pub const fn is_query(&self) -> bool {
        matches!(
            self,
            Self::SelectOverviewTags { .. }
                | Self::SelectTemplateOverviews { .. }
                | Self::SelectRange { .. }
                | Self::CountRows { .. }
        )
    }
}

// ============================================================================
// SECTION: Series Store
// ============================================================================

/// Series store errors.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Connectivity or authentication failure.
    #[error("store unavailable: {0}")]
    Unavailable(String),
    /// Existing schema is incompatible with the requested template.
    #[error("schema conflict: {0}")]
    SchemaConflict(String),
    /// Physical table does not exist.
    #[error("table not found: {0}")]
    TableNotFound(String),
    /// Statement rejected by the store.
    #[error("statement rejected: {0}")]
    Statement(String),
    /// Stored data is inconsistent.
    #[error("store corruption: {0}")]
    Corrupt(String),
    /// Invalid input to the store.
    #[error("store invalid data: {0}")]
    Invalid(String),
}

/// Tag-partitioned time-series store.
pub trait SeriesStore {
    /// Executes a statement that produces no rows.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the statement fails.
    fn execute(&self, statement: &Statement) -> Result<(), StoreError>;

    /// Executes a statement and returns its rows in store order.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the statement fails.
    fn query(&self, statement: &Statement) -> Result<Vec<Row>, StoreError>;
}

// ============================================================================
// SECTION: Overview Ledger
// ============================================================================

/// Overview ledger errors.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// Backing store unavailable.
    #[error("ledger unavailable: {0}")]
    Unavailable(String),
    /// Stored overview is inconsistent.
    #[error("ledger corruption: {0}")]
    Corrupt(String),
    /// Invalid ledger input.
    #[error("ledger invalid data: {0}")]
    Invalid(String),
}

impl From<StoreError> for LedgerError {
    fn from(error: StoreError) -> Self {
        match error {
            StoreError::Unavailable(message) => Self::Unavailable(message),
            StoreError::Corrupt(message) => Self::Corrupt(message),
            StoreError::SchemaConflict(message)
            | StoreError::TableNotFound(message)
            | StoreError::Statement(message)
            | StoreError::Invalid(message) => Self::Invalid(message),
        }
    }
}

/// Storage for per-series overviews.
///
/// The ledger stores values only; it does not know which update strategy
/// produced them. Read-modify-write sequences are not atomic here.
pub trait OverviewLedger {
    /// Reads the overview of a series; `None` when absent or empty.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError`] when the backend fails.
    fn read(&self, key: &SeriesKey) -> Result<Option<SeriesOverview>, LedgerError>;

    /// Writes the overview of a series, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError`] when the backend fails.
    fn write(&self, overview: &SeriesOverview) -> Result<(), LedgerError>;

    /// Removes the overview of a series; absent entries are not an error.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError`] when the backend fails.
    fn delete(&self, key: &SeriesKey) -> Result<(), LedgerError>;

    /// Lists every non-empty overview of a record kind.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError`] when the backend fails.
    fn list(&self, kind: RecordKind) -> Result<Vec<SeriesOverview>, LedgerError>;
}
