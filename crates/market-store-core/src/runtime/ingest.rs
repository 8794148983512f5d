// crates/market-store-core/src/runtime/ingest.rs
// ============================================================================
// Module: Market Store Ingestion Orchestrator
// Description: Save, load, and delete coordination for series.
// Purpose: Drive catalog, writer, and ledger and pick overview strategies.
// Dependencies: crate::core, crate::interfaces, crate::runtime, serde, thiserror, tracing
// ============================================================================

//! ## Overview
//! [`MarketDatabase`] is the entry point for ingestion. A save validates the
//! batch before any I/O, provisions the series table, writes rows in chunks,
//! and then updates the overview:
//! - Initialize when the ledger has no (or an empty) overview.
//! - Append-extend when the caller declares [`WriteMode::Stream`].
//! - Reconcile otherwise, recounting the physical table.
//!
//! Saves and deletes hold the series lock for their whole duration, so
//! overview updates of one series never interleave within a process.
//! A failed write leaves the overview untouched; the next Reconcile save
//! restores the count from the store.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::PoisonError;

use serde::Serialize;
use thiserror::Error;
use time::OffsetDateTime;
use tracing::info;
use tracing::warn;

use crate::core::Bar;
use crate::core::BatchBounds;
use crate::core::KeyError;
use crate::core::OverviewUpdate;
use crate::core::RecordKind;
use crate::core::ReferenceZone;
use crate::core::SeriesKey;
use crate::core::SeriesOverview;
use crate::core::TableName;
use crate::core::Tick;
use crate::core::TimeError;
use crate::core::WriteMode;
use crate::core::to_unix_millis;
use crate::interfaces::LedgerError;
use crate::interfaces::OverviewLedger;
use crate::interfaces::Row;
use crate::interfaces::SeriesStore;
use crate::interfaces::Statement;
use crate::interfaces::StoreError;
use crate::interfaces::Value;
use crate::runtime::catalog::TableCatalog;
use crate::runtime::codec::CodecError;
use crate::runtime::codec::RowCodec;
use crate::runtime::locks::SeriesLocks;
use crate::runtime::writer::ChunkedWriter;
use crate::runtime::writer::DEFAULT_MAX_CHUNK_ROWS;
use crate::runtime::writer::WriteError;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Ingestion errors.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Error)]
pub enum IngestError {
    /// Batch rejected before any I/O.
    #[error("malformed batch: {0}")]
    MalformedBatch(String),
    /// Record identity failed validation.
    #[error(transparent)]
    InvalidKey(#[from] KeyError),
    /// Record timestamp could not be normalized.
    #[error(transparent)]
    Timestamp(#[from] TimeError),
    /// Series store failure.
    #[error(transparent)]
    Store(#[from] StoreError),
    /// Overview ledger failure.
    #[error(transparent)]
    Ledger(#[from] LedgerError),
    /// Stored row could not be decoded.
    #[error(transparent)]
    Codec(#[from] CodecError),
    /// A chunk failed after earlier chunks committed; the overview was not
    /// updated.
    #[error(
        "partial write to {table}: {committed_chunks} chunks ({committed_rows} rows) committed \
         before failure: {source}"
    )]
    PartialWriteFailure {
        /// Target table.
        table: String,
        /// Chunks committed before the failure.
        committed_chunks: usize,
        /// Rows committed before the failure.
        committed_rows: usize,
        /// Failure of the aborting chunk.
        source: StoreError,
    },
    /// Requested record kind does not match the series key.
    #[error("series {key} holds {actual} records, not {requested}")]
    KindMismatch {
        /// Series key.
        key: String,
        /// Record kind of the series.
        actual: RecordKind,
        /// Record kind requested by the caller.
        requested: RecordKind,
    },
}

impl From<WriteError> for IngestError {
    fn from(error: WriteError) -> Self {
        match error {
            WriteError::Store(source) => Self::Store(source),
            WriteError::Partial {
                table,
                committed_chunks,
                committed_rows,
                source,
            } => Self::PartialWriteFailure {
                table,
                committed_chunks,
                committed_rows,
                source,
            },
        }
    }
}

// ============================================================================
// SECTION: Options and Receipts
// ============================================================================

/// Orchestrator options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DatabaseOptions {
    /// Zone timestamps are normalized to.
    pub zone: ReferenceZone,
    /// Maximum rows per insert statement.
    pub max_chunk_rows: usize,
}

impl Default for DatabaseOptions {
    fn default() -> Self {
        Self {
            zone: ReferenceZone::UTC,
            max_chunk_rows: DEFAULT_MAX_CHUNK_ROWS,
        }
    }
}

/// Outcome of a completed save.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SaveReceipt {
    /// Physical table written.
    pub table: TableName,
    /// Rows written by this save.
    pub rows_written: usize,
    /// Overview strategy applied.
    pub strategy: OverviewUpdate,
    /// Overview after the save.
    pub overview: SeriesOverview,
}

// ============================================================================
// SECTION: Strategy Selection
// ============================================================================

/// Picks the overview update strategy for a write.
#[must_use]
pub fn select_strategy(existing: Option<&SeriesOverview>, mode: WriteMode) -> OverviewUpdate {
    match (existing, mode) {
        (None, _) => OverviewUpdate::Initialize,
        (Some(overview), _) if overview.is_empty() => OverviewUpdate::Initialize,
        (Some(_), WriteMode::Stream) => OverviewUpdate::AppendExtend,
        (Some(_), WriteMode::Backfill) => OverviewUpdate::Reconcile,
    }
}

// ============================================================================
// SECTION: Market Database
// ============================================================================

/// Ingestion orchestrator over a series store and an overview ledger.
pub struct MarketDatabase<S, L> {
    /// Series store.
    store: S,
    /// Overview ledger.
    ledger: L,
    /// Table provisioning.
    catalog: TableCatalog,
    /// Chunked insert path.
    writer: ChunkedWriter,
    /// Zone timestamps are normalized to.
    zone: ReferenceZone,
    /// Per-series locks.
    locks: SeriesLocks,
}

impl<S, L> MarketDatabase<S, L>
where
    S: SeriesStore,
    L: OverviewLedger,
{
    /// Opens the database and ensures both templates exist.
    ///
    /// # Errors
    ///
    /// Returns [`IngestError::Store`] when template creation fails.
    pub fn open(store: S, ledger: L, options: DatabaseOptions) -> Result<Self, IngestError> {
        let catalog = TableCatalog;
        catalog.ensure_templates(&store)?;
        Ok(Self {
            store,
            ledger,
            catalog,
            writer: ChunkedWriter::new(options.max_chunk_rows),
            zone: options.zone,
            locks: SeriesLocks::new(),
        })
    }

    /// Returns the series store.
    #[must_use]
    pub const fn store(&self) -> &S {
        &self.store
    }

    /// Returns the overview ledger.
    #[must_use]
    pub const fn ledger(&self) -> &L {
        &self.ledger
    }

    /// Returns the per-series lock map.
    #[must_use]
    pub const fn locks(&self) -> &SeriesLocks {
        &self.locks
    }

    /// Returns the reference zone.
    #[must_use]
    pub const fn zone(&self) -> ReferenceZone {
        self.zone
    }

    /// Saves a single-series batch and updates its overview.
    ///
    /// # Errors
    ///
    /// Returns [`IngestError::MalformedBatch`] for an empty or mixed-series
    /// batch or one carrying a NaN or infinite value (before any I/O), [`IngestError::PartialWriteFailure`] when a
    /// later chunk fails, or the failing component's error.
    pub fn save<R>(&self, records: &[R], mode: WriteMode) -> Result<SaveReceipt, IngestError>
    where
        R: RowCodec,
    {
        let (key, bounds, rows) = self.validate_batch(records)?;
        let handle = self.locks.handle(&key);
        let _guard = handle.lock().unwrap_or_else(PoisonError::into_inner);

        let table = self.catalog.ensure_table(&self.store, &key)?;
        let rows_written = match self.writer.write(&self.store, &table, &rows) {
            Ok(written) => written,
            Err(err) => {
                warn!(table = %table, error = %err, "batch write failed; overview not updated");
                return Err(err.into());
            }
        };

        let existing = self.ledger.read(&key)?;
        let strategy = select_strategy(existing.as_ref(), mode);
        let overview = match (strategy, existing) {
            (OverviewUpdate::AppendExtend, Some(current)) => current.append_extend(&bounds),
            (OverviewUpdate::Reconcile, Some(current)) => {
                current.reconcile(&bounds, self.count_rows(&table)?)
            }
            _ => SeriesOverview::initialize(key, &bounds),
        };
        self.ledger.write(&overview)?;

        info!(
            table = %table,
            rows = rows_written,
            strategy = strategy.as_str(),
            count = overview.count,
            "saved batch"
        );
        Ok(SaveReceipt {
            table,
            rows_written,
            strategy,
            overview,
        })
    }

    /// Saves a batch of bars.
    ///
    /// # Errors
    ///
    /// See [`MarketDatabase::save`].
    pub fn save_bars(&self, bars: &[Bar], mode: WriteMode) -> Result<SaveReceipt, IngestError> {
        self.save(bars, mode)
    }

    /// Saves a batch of ticks.
    ///
    /// # Errors
    ///
    /// See [`MarketDatabase::save`].
    pub fn save_ticks(&self, ticks: &[Tick], mode: WriteMode) -> Result<SaveReceipt, IngestError> {
        self.save(ticks, mode)
    }

    /// Loads records with `start <= datetime <= end` in ascending order.
    ///
    /// A series without a table loads as empty.
    ///
    /// # Errors
    ///
    /// Returns [`IngestError::KindMismatch`] when `R` does not match the key,
    /// or a store/codec error.
    pub fn load<R>(
        &self,
        key: &SeriesKey,
        start: OffsetDateTime,
        end: OffsetDateTime,
    ) -> Result<Vec<R>, IngestError>
    where
        R: RowCodec,
    {
        if key.kind() != R::KIND {
            return Err(IngestError::KindMismatch {
                key: key.to_string(),
                actual: key.kind(),
                requested: R::KIND,
            });
        }
        let statement = Statement::SelectRange {
            table: key.table_name(),
            start: to_unix_millis(start),
            end: to_unix_millis(end),
        };
        let rows = match self.store.query(&statement) {
            Ok(rows) => rows,
            Err(StoreError::TableNotFound(_)) => return Ok(Vec::new()),
            Err(err) => return Err(err.into()),
        };
        rows.iter()
            .map(|row| R::decode(row, key, self.zone).map_err(IngestError::from))
            .collect()
    }

    /// Loads bars of a bar series.
    ///
    /// # Errors
    ///
    /// See [`MarketDatabase::load`].
    pub fn load_bars(
        &self,
        key: &SeriesKey,
        start: OffsetDateTime,
        end: OffsetDateTime,
    ) -> Result<Vec<Bar>, IngestError> {
        self.load(key, start, end)
    }

    /// Loads ticks of a tick series.
    ///
    /// # Errors
    ///
    /// See [`MarketDatabase::load`].
    pub fn load_ticks(
        &self,
        key: &SeriesKey,
        start: OffsetDateTime,
        end: OffsetDateTime,
    ) -> Result<Vec<Tick>, IngestError> {
        self.load(key, start, end)
    }

    /// Drops a series and its overview; returns the pre-deletion row count.
    ///
    /// The table is dropped before the ledger entry is removed. A series
    /// without a table deletes zero rows and still clears its ledger entry.
    ///
    /// # Errors
    ///
    /// Returns [`IngestError::Store`] or [`IngestError::Ledger`] on failure.
    pub fn delete_series(&self, key: &SeriesKey) -> Result<u64, IngestError> {
        let handle = self.locks.handle(key);
        let guard = handle.lock().unwrap_or_else(PoisonError::into_inner);
        let result = self.delete_locked(key);
        drop(guard);
        if result.is_ok() {
            self.locks.release(key, handle);
        }
        result
    }

    /// Deletes a series while its lock is held.
    fn delete_locked(&self, key: &SeriesKey) -> Result<u64, IngestError> {
        let table = key.table_name();
        let deleted = match self.count_rows(&table) {
            Ok(count) => {
                match self.store.execute(&Statement::DropTable {
                    table: table.clone(),
                }) {
                    Ok(()) | Err(StoreError::TableNotFound(_)) => {}
                    Err(err) => return Err(err.into()),
                }
                count
            }
            Err(StoreError::TableNotFound(_)) => 0,
            Err(err) => return Err(err.into()),
        };
        self.ledger.delete(key)?;
        info!(table = %table, rows = deleted, "deleted series");
        Ok(deleted)
    }

    /// Reads the overview of one series.
    ///
    /// # Errors
    ///
    /// Returns [`IngestError::Ledger`] when the ledger fails.
    pub fn overview(&self, key: &SeriesKey) -> Result<Option<SeriesOverview>, IngestError> {
        Ok(self.ledger.read(key)?)
    }

    /// Lists the overviews of every series of a record kind.
    ///
    /// # Errors
    ///
    /// Returns [`IngestError::Ledger`] when the ledger fails.
    pub fn overviews(&self, kind: RecordKind) -> Result<Vec<SeriesOverview>, IngestError> {
        Ok(self.ledger.list(kind)?)
    }

    /// Checks a batch and returns its series key, bounds at storage precision,
    /// and encoded rows.
    fn validate_batch<R>(&self, records: &[R]) -> Result<(SeriesKey, BatchBounds, Vec<Row>), IngestError>
    where
        R: RowCodec,
    {
        let Some(first) = records.first() else {
            return Err(IngestError::MalformedBatch("batch is empty".to_string()));
        };
        let key = first.series_key()?;
        let columns = R::KIND.columns();
        let mut timestamps = Vec::with_capacity(records.len());
        let mut rows = Vec::with_capacity(records.len());
        for (index, record) in records.iter().enumerate() {
            let record_key = record.series_key()?;
            if record_key != key {
                return Err(IngestError::MalformedBatch(format!(
                    "record {index} belongs to {record_key}, batch belongs to {key}"
                )));
            }
            let row = record.encode();
            let non_finite = row.iter().zip(columns).find(|(value, _)| match value {
                Value::Double(value) => !value.is_finite(),
                _ => false,
            });
            if let Some((_, column)) = non_finite {
                return Err(IngestError::MalformedBatch(format!(
                    "record {index} has a non-finite {}",
                    column.name
                )));
            }
            timestamps.push(self.zone.truncate(record.timestamp())?);
            rows.push(row);
        }
        let bounds = BatchBounds::from_timestamps(timestamps)
            .ok_or_else(|| IngestError::MalformedBatch("batch is empty".to_string()))?;
        Ok((key, bounds, rows))
    }

    /// Counts the rows of a physical table.
    fn count_rows(&self, table: &TableName) -> Result<u64, StoreError> {
        let rows = self.store.query(&Statement::CountRows {
            table: table.clone(),
        })?;
        match rows.first().map(Vec::as_slice) {
            Some([Value::Integer(count)]) => u64::try_from(*count)
                .map_err(|_| StoreError::Corrupt(format!("negative row count for {table}"))),
            _ => Err(StoreError::Corrupt(format!("unexpected count result for {table}"))),
        }
    }
}
