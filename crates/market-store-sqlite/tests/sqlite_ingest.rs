// crates/market-store-sqlite/tests/sqlite_ingest.rs
// ============================================================================
// Module: SQLite Ingestion Tests
// Description: Orchestrator scenarios over the SQLite store and ledger.
// Purpose: Validate overview maintenance and durability on a real file.
// Dependencies: market-store-core, market-store-sqlite, tempfile, time
// ============================================================================

//! ## Overview
//! Runs [`MarketDatabase`] on `SQLite` with both overview ledger flavours:
//! tags on the series tables and the keyed `series_overview` table.

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only assertions and helpers are permitted."
)]

use std::path::Path;
use std::sync::Arc;
use std::thread;

use market_store_core::Bar;
use market_store_core::DatabaseOptions;
use market_store_core::Exchange;
use market_store_core::IngestError;
use market_store_core::Interval;
use market_store_core::LedgerError;
use market_store_core::MarketDatabase;
use market_store_core::OverviewLedger;
use market_store_core::OverviewUpdate;
use market_store_core::RecordKind;
use market_store_core::ReferenceZone;
use market_store_core::SeriesKey;
use market_store_core::SeriesOverview;
use market_store_core::TagOverviewLedger;
use market_store_core::Tick;
use market_store_core::WriteMode;
use market_store_sqlite::SqliteOverviewLedger;
use market_store_sqlite::SqliteSeriesStore;
use market_store_sqlite::SqliteStoreConfig;
use market_store_sqlite::SqliteStoreError;
use rusqlite::Connection;
use rusqlite::params;
use tempfile::TempDir;
use time::Duration;
use time::OffsetDateTime;
use time::macros::datetime;
use time::macros::offset;

// ============================================================================
// SECTION: Fixtures
// ============================================================================

type TagDatabase = MarketDatabase<SqliteSeriesStore, TagOverviewLedger<SqliteSeriesStore>>;
type KeyedDatabase = MarketDatabase<SqliteSeriesStore, SqliteOverviewLedger>;

fn tag_database(path: &Path, options: DatabaseOptions) -> TagDatabase {
    let store = SqliteSeriesStore::open(SqliteStoreConfig::new(path)).unwrap();
    let ledger = TagOverviewLedger::new(store.clone(), options.zone);
    MarketDatabase::open(store, ledger, options).unwrap()
}

fn keyed_database(dir: &Path) -> KeyedDatabase {
    let store = SqliteSeriesStore::open(SqliteStoreConfig::new(dir.join("series.sqlite"))).unwrap();
    let ledger =
        SqliteOverviewLedger::open(&SqliteStoreConfig::new(dir.join("ledger.sqlite")), ReferenceZone::UTC)
            .unwrap();
    MarketDatabase::open(store, ledger, DatabaseOptions::default()).unwrap()
}

fn minute(offset_minutes: i64) -> OffsetDateTime {
    datetime!(2024-05-06 01:30 UTC) + Duration::minutes(offset_minutes)
}

fn bars(minutes: impl IntoIterator<Item = i64>) -> Vec<Bar> {
    minutes
        .into_iter()
        .map(|offset_minutes| {
            let mut bar = Bar::new("IF2406", Exchange::Cffex, Interval::Minute, minute(offset_minutes));
            bar.open_price = 3_598.2;
            bar.high_price = 3_604.0;
            bar.low_price = 3_597.4;
            bar.close_price = 3_601.6;
            bar.volume = 120.0;
            bar
        })
        .collect()
}

fn bar_key() -> SeriesKey {
    SeriesKey::bar("IF2406", Exchange::Cffex, Interval::Minute).unwrap()
}

// ============================================================================
// SECTION: Overview Maintenance
// ============================================================================

#[test]
fn sqlite_stream_then_backfill_keeps_overview_exact() {
    let temp = TempDir::new().unwrap();
    let db = tag_database(&temp.path().join("market.sqlite"), DatabaseOptions {
        max_chunk_rows: 128,
        ..DatabaseOptions::default()
    });

    let receipt = db.save_bars(&bars(0 .. 500), WriteMode::Backfill).unwrap();
    assert_eq!(receipt.strategy, OverviewUpdate::Initialize);
    assert_eq!(receipt.overview.count, 500);

    let receipt = db.save_bars(&bars(500 .. 510), WriteMode::Stream).unwrap();
    assert_eq!(receipt.strategy, OverviewUpdate::AppendExtend);
    assert_eq!(receipt.overview.count, 510);

    let receipt = db.save_bars(&bars(-5 .. 0), WriteMode::Backfill).unwrap();
    assert_eq!(receipt.strategy, OverviewUpdate::Reconcile);
    assert_eq!(receipt.overview, SeriesOverview {
        key: bar_key(),
        start: minute(-5),
        end: minute(509),
        count: 515,
    });
}

#[test]
fn sqlite_backfill_overlap_counts_distinct_rows() {
    let temp = TempDir::new().unwrap();
    let db = keyed_database(temp.path());
    db.save_bars(&bars(0 .. 100), WriteMode::Backfill).unwrap();
    let receipt = db.save_bars(&bars(50 .. 150), WriteMode::Backfill).unwrap();
    assert_eq!(receipt.overview.count, 150);
    assert_eq!(db.load_bars(&bar_key(), minute(0), minute(149)).unwrap().len(), 150);
}

#[test]
fn sqlite_load_applies_reference_zone() {
    let temp = TempDir::new().unwrap();
    let zone = ReferenceZone::new(offset!(+8));
    let db = tag_database(&temp.path().join("market.sqlite"), DatabaseOptions {
        zone,
        ..DatabaseOptions::default()
    });
    let saved = bars(0 .. 3);
    db.save_bars(&saved, WriteMode::Stream).unwrap();

    let loaded = db.load_bars(&bar_key(), minute(0), minute(2)).unwrap();
    assert_eq!(loaded.len(), 3);
    for (loaded, saved) in loaded.iter().zip(&saved) {
        assert_eq!(loaded.datetime, saved.datetime);
        assert_eq!(loaded.datetime.offset(), offset!(+8));
        assert_eq!(loaded.close_price, saved.close_price);
    }
    let overview = db.overview(&bar_key()).unwrap().unwrap();
    assert_eq!(overview.start.offset(), offset!(+8));
}

#[test]
fn sqlite_ticks_round_trip() {
    let temp = TempDir::new().unwrap();
    let db = keyed_database(temp.path());
    let mut tick = Tick::new("600036", Exchange::Sse, datetime!(2024-05-06 01:30:00.500 UTC));
    tick.name = "CMB".to_string();
    tick.last_price = 35.12;
    tick.bid_prices = [35.11, 35.10, 35.09, 35.08, 35.07];
    tick.ask_volumes = [100.0, 200.0, 300.0, 400.0, 500.0];
    tick.localtime = Some(datetime!(2024-05-06 01:30:00.730 UTC));
    db.save_ticks(std::slice::from_ref(&tick), WriteMode::Stream).unwrap();

    let key = SeriesKey::tick("600036", Exchange::Sse).unwrap();
    let loaded = db.load_ticks(&key, tick.datetime, tick.datetime).unwrap();
    assert_eq!(loaded, vec![tick]);
}

#[test]
fn sqlite_series_differing_only_by_case_are_distinct() {
    let temp = TempDir::new().unwrap();
    let db = tag_database(&temp.path().join("market.sqlite"), DatabaseOptions::default());
    let lower = Bar::new("btcusdt", Exchange::Binance, Interval::Minute, minute(0));
    let mut upper = Bar::new("BTCUSDT", Exchange::Binance, Interval::Minute, minute(0));
    upper.close_price = 64_000.0;
    let upper_later = Bar::new("BTCUSDT", Exchange::Binance, Interval::Minute, minute(1));

    assert_eq!(db.save_bars(std::slice::from_ref(&lower), WriteMode::Backfill).unwrap().overview.count, 1);
    let receipt = db.save_bars(&[upper.clone(), upper_later], WriteMode::Backfill).unwrap();
    assert_eq!(receipt.overview.count, 2);

    let lower_key = SeriesKey::bar("btcusdt", Exchange::Binance, Interval::Minute).unwrap();
    let upper_key = SeriesKey::bar("BTCUSDT", Exchange::Binance, Interval::Minute).unwrap();
    assert_eq!(db.load_bars(&lower_key, minute(0), minute(5)).unwrap(), vec![lower]);
    assert_eq!(db.load_bars(&upper_key, minute(0), minute(0)).unwrap(), vec![upper]);
    assert_eq!(db.overviews(RecordKind::Bar).unwrap().len(), 2);

    assert_eq!(db.delete_series(&upper_key).unwrap(), 2);
    assert_eq!(db.overview(&lower_key).unwrap().unwrap().count, 1);
}

#[test]
fn sqlite_rejects_non_finite_values_before_writing() {
    let temp = TempDir::new().unwrap();
    let db = keyed_database(temp.path());
    let mut tick = Tick::new("600036", Exchange::Sse, datetime!(2024-05-06 01:30 UTC));
    tick.pre_close = f64::NAN;
    let err = db.save_ticks(&[tick], WriteMode::Stream).unwrap_err();
    assert!(matches!(err, IngestError::MalformedBatch(ref message) if message.contains("pre_close")), "{err}");

    let key = SeriesKey::tick("600036", Exchange::Sse).unwrap();
    assert!(db.overview(&key).unwrap().is_none());
    let loaded = db
        .load_ticks(&key, datetime!(2024-05-06 00:00 UTC), datetime!(2024-05-07 00:00 UTC))
        .unwrap();
    assert!(loaded.is_empty());
}

// ============================================================================
// SECTION: Durability and Deletion
// ============================================================================

#[test]
fn sqlite_overview_survives_reopen() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("market.sqlite");
    {
        let db = tag_database(&path, DatabaseOptions::default());
        db.save_bars(&bars(0 .. 20), WriteMode::Stream).unwrap();
    }
    let db = tag_database(&path, DatabaseOptions::default());
    let overview = db.overview(&bar_key()).unwrap().unwrap();
    assert_eq!(overview.count, 20);
    let receipt = db.save_bars(&bars(20 .. 25), WriteMode::Stream).unwrap();
    assert_eq!(receipt.strategy, OverviewUpdate::AppendExtend);
    assert_eq!(receipt.overview.count, 25);
}

#[test]
fn sqlite_delete_series_clears_both_stores() {
    let temp = TempDir::new().unwrap();
    let db = keyed_database(temp.path());
    db.save_bars(&bars(0 .. 30), WriteMode::Stream).unwrap();

    assert_eq!(db.delete_series(&bar_key()).unwrap(), 30);
    assert!(db.overview(&bar_key()).unwrap().is_none());
    assert!(db.load_bars(&bar_key(), minute(0), minute(30)).unwrap().is_empty());
    assert!(db.overviews(RecordKind::Bar).unwrap().is_empty());
    assert_eq!(db.delete_series(&bar_key()).unwrap(), 0);
}

#[test]
fn sqlite_concurrent_stream_saves_keep_exact_count() {
    let temp = TempDir::new().unwrap();
    let db = Arc::new(keyed_database(temp.path()));
    db.save_bars(&bars(0 .. 1), WriteMode::Stream).unwrap();

    let mut handles = Vec::new();
    for worker in 0 .. 4_i64 {
        let db = Arc::clone(&db);
        handles.push(thread::spawn(move || {
            for step in 0 .. 10_i64 {
                let offset_minutes = 1 + worker * 10 + step;
                db.save_bars(&bars([offset_minutes]), WriteMode::Stream).unwrap();
            }
        }));
    }
    for handle in handles {
        handle.join().unwrap();
    }

    let overview = db.overview(&bar_key()).unwrap().unwrap();
    assert_eq!(overview.count, 41);
    assert_eq!(overview.end, minute(40));
}

// ============================================================================
// SECTION: Keyed Ledger
// ============================================================================

#[test]
fn sqlite_ledger_keyed_semantics() {
    let temp = TempDir::new().unwrap();
    let ledger =
        SqliteOverviewLedger::open(&SqliteStoreConfig::new(temp.path().join("ledger.sqlite")), ReferenceZone::UTC)
            .unwrap();
    let tick = SeriesKey::tick("IF2406", Exchange::Cffex).unwrap();
    assert!(ledger.read(&bar_key()).unwrap().is_none());

    let overview = SeriesOverview {
        key: bar_key(),
        start: minute(0),
        end: minute(59),
        count: 60,
    };
    ledger.write(&overview).unwrap();
    ledger
        .write(&SeriesOverview {
            key: tick.clone(),
            count: 0,
            ..overview.clone()
        })
        .unwrap();
    assert_eq!(ledger.read(&bar_key()).unwrap(), Some(overview.clone()));
    assert!(ledger.read(&tick).unwrap().is_none());
    assert_eq!(ledger.list(RecordKind::Bar).unwrap(), vec![overview]);
    assert!(ledger.list(RecordKind::Tick).unwrap().is_empty());

    ledger.delete(&bar_key()).unwrap();
    ledger.delete(&bar_key()).unwrap();
    assert!(ledger.read(&bar_key()).unwrap().is_none());
}

#[test]
fn sqlite_ledger_reports_corrupt_rows() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("ledger.sqlite");
    let ledger = SqliteOverviewLedger::open(&SqliteStoreConfig::new(&path), ReferenceZone::UTC).unwrap();
    let conn = Connection::open(&path).unwrap();
    conn.execute(
        "INSERT INTO series_overview
         (ledger_key, kind, symbol, exchange, interval_, start_time, end_time, count_)
         VALUES ('IF2406_NOWHERE_1m', 'bar', 'IF2406', 'NOWHERE', '1m', 0, 0, 3)",
        params![],
    )
    .unwrap();
    drop(conn);

    let err = ledger.list(RecordKind::Bar).unwrap_err();
    assert!(matches!(err, LedgerError::Corrupt(_)));
}

#[test]
fn sqlite_ledger_rejects_unknown_schema_version() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("ledger.sqlite");
    let conn = Connection::open(&path).unwrap();
    conn.execute_batch("CREATE TABLE ledger_meta (version INTEGER NOT NULL);").unwrap();
    conn.execute("INSERT INTO ledger_meta (version) VALUES (?1)", params![42_i64]).unwrap();
    drop(conn);

    let Err(err) = SqliteOverviewLedger::open(&SqliteStoreConfig::new(&path), ReferenceZone::UTC) else {
        panic!("expected schema mismatch to fail");
    };
    assert!(matches!(err, SqliteStoreError::VersionMismatch(_)));
}

#[test]
fn sqlite_store_and_ledger_share_one_file() {
    let temp = TempDir::new().unwrap();
    let config = SqliteStoreConfig::new(temp.path().join("market.sqlite"));
    let store = SqliteSeriesStore::open(config.clone()).unwrap();
    let ledger = SqliteOverviewLedger::open(&config, ReferenceZone::UTC).unwrap();
    let db = MarketDatabase::open(store, ledger, DatabaseOptions::default()).unwrap();
    db.save_bars(&bars(0 .. 5), WriteMode::Backfill).unwrap();
    assert_eq!(db.overview(&bar_key()).unwrap().map(|overview| overview.count), Some(5));
}
