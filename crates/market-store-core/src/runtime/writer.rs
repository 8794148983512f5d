// crates/market-store-core/src/runtime/writer.rs
// ============================================================================
// Module: Market Store Chunked Writer
// Description: Bounded multi-row inserts into a physical table.
// Purpose: Split large batches into ordered insert statements of limited size.
// Dependencies: crate::core, crate::interfaces, thiserror, tracing
// ============================================================================

//! ## Overview
//! [`ChunkedWriter`] is the only runtime component on the store's write path.
//! Rows are emitted in caller order, at most `max_chunk_rows` per statement,
//! with the final partial chunk always flushed. The first failing chunk aborts
//! the call. Chunks already written stay committed; [`WriteError::Partial`]
//! reports how far the write got.

// ============================================================================
// SECTION: Imports
// ============================================================================

use thiserror::Error;
use tracing::debug;

use crate::core::TableName;
use crate::interfaces::Row;
use crate::interfaces::SeriesStore;
use crate::interfaces::Statement;
use crate::interfaces::StoreError;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default maximum rows per insert statement.
pub const DEFAULT_MAX_CHUNK_ROWS: usize = 1000;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Chunked write errors.
#[derive(Debug, Error)]
pub enum WriteError {
    /// The first chunk failed; nothing was committed.
    #[error(transparent)]
    Store(#[from] StoreError),
    /// A later chunk failed after earlier chunks committed.
    #[error(
        "write to {table} failed after {committed_chunks} chunks ({committed_rows} rows): {source}"
    )]
    Partial {
        /// Target table.
        table: String,
        /// Chunks committed before the failure.
        committed_chunks: usize,
        /// Rows committed before the failure.
        committed_rows: usize,
        /// Failure of the aborting chunk.
        source: StoreError,
    },
}

// ============================================================================
// SECTION: Writer
// ============================================================================

/// Splits rows into bounded insert statements.
///
/// # Invariants
/// - `max_chunk_rows >= 1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkedWriter {
    /// Maximum rows per insert statement.
    max_chunk_rows: usize,
}

impl Default for ChunkedWriter {
    fn default() -> Self {
        Self {
            max_chunk_rows: DEFAULT_MAX_CHUNK_ROWS,
        }
    }
}

impl ChunkedWriter {
    /// Creates a writer; a zero chunk size is raised to one.
    #[must_use]
    pub fn new(max_chunk_rows: usize) -> Self {
        Self {
            max_chunk_rows: max_chunk_rows.max(1),
        }
    }

    /// Returns the maximum rows per insert statement.
    #[must_use]
    pub const fn max_chunk_rows(&self) -> usize {
        self.max_chunk_rows
    }

    /// Writes rows in ordered chunks and returns the number written.
    ///
    /// # Errors
    ///
    /// Returns [`WriteError::Store`] when the first chunk fails and
    /// [`WriteError::Partial`] when a later chunk fails.
    pub fn write<S>(&self, store: &S, table: &TableName, rows: &[Row]) -> Result<usize, WriteError>
    where
        S: SeriesStore + ?Sized,
    {
        let mut committed_chunks = 0usize;
        let mut committed_rows = 0usize;
        for chunk in rows.chunks(self.max_chunk_rows) {
            debug!(table = %table, chunk = committed_chunks, rows = chunk.len(), "writing chunk");
            let statement = Statement::Insert {
                table: table.clone(),
                rows: chunk.to_vec(),
            };
            if let Err(source) = store.execute(&statement) {
                if committed_chunks == 0 {
                    return Err(WriteError::Store(source));
                }
                return Err(WriteError::Partial {
                    table: table.to_string(),
                    committed_chunks,
                    committed_rows,
                    source,
                });
            }
            committed_chunks += 1;
            committed_rows += chunk.len();
        }
        Ok(committed_rows)
    }
}
