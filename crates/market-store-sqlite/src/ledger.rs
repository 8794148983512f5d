// crates/market-store-sqlite/src/ledger.rs
// ============================================================================
// Module: SQLite Overview Ledger
// Description: Keyed overview ledger persisted in an SQLite file.
// Purpose: Keep series overviews in a store separate from the series data.
// Dependencies: market-store-core, rusqlite, tracing
// ============================================================================

//! ## Overview
//! One row per ledger key (`{symbol}_{exchange}[_{interval}]`). Overviews
//! with a zero count read as absent and are left out of listings. Deleting
//! the entry of a series is independent of dropping its table.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::str::FromStr;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;

use market_store_core::Exchange;
use market_store_core::Interval;
use market_store_core::LedgerError;
use market_store_core::OverviewLedger;
use market_store_core::RecordKind;
use market_store_core::ReferenceZone;
use market_store_core::SeriesKey;
use market_store_core::SeriesOverview;
use market_store_core::to_unix_millis;
use rusqlite::Connection;
use rusqlite::OptionalExtension;
use rusqlite::params;
use tracing::debug;
use tracing::info;

use crate::connection::SqliteStoreConfig;
use crate::connection::SqliteStoreError;
use crate::connection::db_error;
use crate::connection::open_database;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Ledger schema version.
const SCHEMA_VERSION: i64 = 1;
/// Metadata table of the ledger.
const META_TABLE: &str = "ledger_meta";
/// Overview table schema.
const LEDGER_SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS series_overview (
        ledger_key TEXT PRIMARY KEY NOT NULL,
        kind TEXT NOT NULL,
        symbol TEXT NOT NULL,
        exchange TEXT NOT NULL,
        interval_ TEXT,
        start_time INTEGER NOT NULL,
        end_time INTEGER NOT NULL,
        count_ INTEGER NOT NULL
    );
    CREATE INDEX IF NOT EXISTS series_overview_by_kind ON series_overview (kind, ledger_key);
";

// ============================================================================
// SECTION: Ledger
// ============================================================================

/// `SQLite`-backed keyed overview ledger.
#[derive(Clone)]
pub struct SqliteOverviewLedger {
    /// Shared connection guarded by a mutex.
    connection: Arc<Mutex<Connection>>,
    /// Zone used for decoded timestamps.
    zone: ReferenceZone,
}

impl SqliteOverviewLedger {
    /// Opens (or creates) a ledger file.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError`] when the path is invalid, the file cannot
    /// be opened, or its schema version is incompatible.
    pub fn open(config: &SqliteStoreConfig, zone: ReferenceZone) -> Result<Self, SqliteStoreError> {
        let connection = open_database(config, META_TABLE, SCHEMA_VERSION)?;
        connection.execute_batch(LEDGER_SCHEMA).map_err(|err| db_error(&err))?;
        info!(path = %config.path.display(), "opened sqlite overview ledger");
        Ok(Self {
            connection: Arc::new(Mutex::new(connection)),
            zone,
        })
    }

    /// Locks the shared connection.
    fn lock(&self) -> Result<MutexGuard<'_, Connection>, SqliteStoreError> {
        self.connection
            .lock()
            .map_err(|_| SqliteStoreError::Unavailable("sqlite connection mutex poisoned".to_string()))
    }

    /// Builds an overview from stored columns; zero count means absent.
    fn decode(
        &self,
        key: SeriesKey,
        start: i64,
        end: i64,
        count: i64,
    ) -> Result<Option<SeriesOverview>, LedgerError> {
        let count = u64::try_from(count)
            .map_err(|_| LedgerError::Corrupt(format!("negative overview count for {key}")))?;
        if count == 0 {
            return Ok(None);
        }
        let start =
            self.zone.from_unix_millis(start).map_err(|err| LedgerError::Corrupt(err.to_string()))?;
        let end = self.zone.from_unix_millis(end).map_err(|err| LedgerError::Corrupt(err.to_string()))?;
        Ok(Some(SeriesOverview {
            key,
            start,
            end,
            count,
        }))
    }
}

impl OverviewLedger for SqliteOverviewLedger {
    fn read(&self, key: &SeriesKey) -> Result<Option<SeriesOverview>, LedgerError> {
        let connection = self.lock()?;
        let stored: Option<(i64, i64, i64)> = connection
            .query_row(
                "SELECT start_time, end_time, count_ FROM series_overview WHERE ledger_key = ?1",
                params![key.ledger_key()],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .optional()
            .map_err(|err| db_error(&err))?;
        match stored {
            Some((start, end, count)) => self.decode(key.clone(), start, end, count),
            None => Ok(None),
        }
    }

    fn write(&self, overview: &SeriesOverview) -> Result<(), LedgerError> {
        let count = i64::try_from(overview.count)
            .map_err(|_| LedgerError::Invalid(format!("overview count overflow for {}", overview.key)))?;
        let key = &overview.key;
        let connection = self.lock()?;
        connection
            .execute(
                "INSERT OR REPLACE INTO series_overview
                 (ledger_key, kind, symbol, exchange, interval_, start_time, end_time, count_)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    key.ledger_key(),
                    key.kind().as_str(),
                    key.symbol(),
                    key.exchange().as_str(),
                    key.interval().map(Interval::as_str),
                    to_unix_millis(overview.start),
                    to_unix_millis(overview.end),
                    count,
                ],
            )
            .map_err(|err| db_error(&err))?;
        debug!(series = %key, count = overview.count, "wrote sqlite overview");
        Ok(())
    }

    fn delete(&self, key: &SeriesKey) -> Result<(), LedgerError> {
        let connection = self.lock()?;
        connection
            .execute("DELETE FROM series_overview WHERE ledger_key = ?1", params![key.ledger_key()])
            .map_err(|err| db_error(&err))?;
        Ok(())
    }

    fn list(&self, kind: RecordKind) -> Result<Vec<SeriesOverview>, LedgerError> {
        let connection = self.lock()?;
        let mut select = connection
            .prepare(
                "SELECT symbol, exchange, interval_, start_time, end_time, count_
                 FROM series_overview WHERE kind = ?1 AND count_ > 0 ORDER BY ledger_key",
            )
            .map_err(|err| db_error(&err))?;
        let rows = select
            .query_map(params![kind.as_str()], |row| {
                Ok(StoredOverview {
                    symbol: row.get(0)?,
                    exchange: row.get(1)?,
                    interval: row.get(2)?,
                    start: row.get(3)?,
                    end: row.get(4)?,
                    count: row.get(5)?,
                })
            })
            .map_err(|err| db_error(&err))?
            .collect::<Result<Vec<_>, _>>()
            .map_err(|err| db_error(&err))?;

        let mut overviews = Vec::with_capacity(rows.len());
        for stored in rows {
            let key = stored.key()?;
            if let Some(overview) = self.decode(key, stored.start, stored.end, stored.count)? {
                overviews.push(overview);
            }
        }
        Ok(overviews)
    }
}

// ============================================================================
// SECTION: Stored Rows
// ============================================================================

/// Raw columns of one ledger row.
struct StoredOverview {
    /// Symbol column.
    symbol: String,
    /// Exchange column.
    exchange: String,
    /// Interval column; NULL for tick series.
    interval: Option<String>,
    /// Start column (epoch milliseconds).
    start: i64,
    /// End column (epoch milliseconds).
    end: i64,
    /// Count column.
    count: i64,
}

impl StoredOverview {
    /// Rebuilds the series key from identity columns.
    fn key(&self) -> Result<SeriesKey, LedgerError> {
        let exchange =
            Exchange::from_str(&self.exchange).map_err(|err| LedgerError::Corrupt(err.to_string()))?;
        let interval = self
            .interval
            .as_deref()
            .map(Interval::from_str)
            .transpose()
            .map_err(|err| LedgerError::Corrupt(err.to_string()))?;
        SeriesKey::new(self.symbol.clone(), exchange, interval)
            .map_err(|err| LedgerError::Corrupt(err.to_string()))
    }
}
