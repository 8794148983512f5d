// crates/market-store-core/src/core/overview.rs
// ============================================================================
// Module: Market Store Series Overview
// Description: Per-series {start, end, count} summary and its update rules.
// Purpose: Compute overview updates without rescanning stored series.
// Dependencies: serde, time, crate::core::identifiers
// ============================================================================

//! ## Overview
//! A [`SeriesOverview`] summarizes one series. It is updated after every
//! write using one of three strategies:
//! - Initialize: the batch bounds and batch size become the overview.
//! - Append-extend: the end is extended and the batch size added to the
//!   count. The caller's forward-only claim is trusted, so re-delivered rows
//!   overcount.
//! - Reconcile: the bounds are widened to cover the batch and the count is
//!   replaced by a recount of the physical table.
//!
//! The functions here are pure; which strategy applies is decided by the
//! ingestion orchestrator.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Serialize;
use time::OffsetDateTime;

use crate::core::identifiers::SeriesKey;

// ============================================================================
// SECTION: Write Mode
// ============================================================================

/// Caller-declared delivery mode for a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WriteMode {
    /// General batch; may backfill or overlap stored data.
    #[default]
    Backfill,
    /// Forward-only continuation of a live stream.
    Stream,
}

/// Overview update strategy applied after a write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OverviewUpdate {
    /// Overview derived from the batch alone.
    Initialize,
    /// End extended and count incremented by the batch size.
    AppendExtend,
    /// Bounds widened and count recounted from the store.
    Reconcile,
}

impl OverviewUpdate {
    /// Returns a stable label for logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Initialize => "initialize",
            Self::AppendExtend => "append_extend",
            Self::Reconcile => "reconcile",
        }
    }
}

// ============================================================================
// SECTION: Batch Bounds
// ============================================================================

/// Timestamp bounds and size of a non-empty batch.
///
/// # Invariants
/// - `min <= max` and `len >= 1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchBounds {
    /// Earliest timestamp in the batch.
    pub min: OffsetDateTime,
    /// Latest timestamp in the batch.
    pub max: OffsetDateTime,
    /// Number of records in the batch.
    pub len: u64,
}

impl BatchBounds {
    /// Scans timestamps for their bounds; returns `None` for an empty input.
    pub fn from_timestamps<I>(timestamps: I) -> Option<Self>
    where
        I: IntoIterator<Item = OffsetDateTime>,
    {
        let mut iter = timestamps.into_iter();
        let first = iter.next()?;
        let mut bounds = Self {
            min: first,
            max: first,
            len: 1,
        };
        for timestamp in iter {
            bounds.min = bounds.min.min(timestamp);
            bounds.max = bounds.max.max(timestamp);
            bounds.len = bounds.len.saturating_add(1);
        }
        Some(bounds)
    }
}

// ============================================================================
// SECTION: Series Overview
// ============================================================================

/// Summary of one series.
///
/// # Invariants
/// - `start <= end` whenever `count > 0`.
/// - `count == 0` is equivalent to an absent overview.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SeriesOverview {
    /// Series identity.
    #[serde(flatten)]
    pub key: SeriesKey,
    /// Earliest stored timestamp.
    #[serde(with = "time::serde::rfc3339")]
    pub start: OffsetDateTime,
    /// Latest stored timestamp.
    #[serde(with = "time::serde::rfc3339")]
    pub end: OffsetDateTime,
    /// Stored row count.
    pub count: u64,
}

impl SeriesOverview {
    /// Builds the first overview of a series from its first batch.
    #[must_use]
    pub fn initialize(key: SeriesKey, bounds: &BatchBounds) -> Self {
        Self {
            key,
            start: bounds.min,
            end: bounds.max,
            count: bounds.len,
        }
    }

    /// Extends the overview with a forward-only batch.
    #[must_use]
    pub fn append_extend(&self, bounds: &BatchBounds) -> Self {
        Self {
            key: self.key.clone(),
            start: self.start,
            end: self.end.max(bounds.max),
            count: self.count.saturating_add(bounds.len),
        }
    }

    /// Widens the bounds to cover the batch and adopts an authoritative count.
    #[must_use]
    pub fn reconcile(&self, bounds: &BatchBounds, stored_count: u64) -> Self {
        Self {
            key: self.key.clone(),
            start: self.start.min(bounds.min),
            end: self.end.max(bounds.max),
            count: stored_count,
        }
    }

    /// Returns true when the overview describes no rows.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.count == 0
    }
}
