// crates/market-store-core/tests/ingest.rs
// ============================================================================
// Module: Ingestion Orchestrator Tests
// Description: End-to-end save/load/delete scenarios over in-memory backends.
// Purpose: Validate overview strategies, batch validation, and delete ordering.
// Dependencies: market-store-core, time
// ============================================================================

//! ## Overview
//! Drives [`MarketDatabase`] against the in-memory store with both the
//! tag-backed and the keyed overview ledger.

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
    reason = "Test-only output and panic-based assertions are permitted."
)]

use std::sync::Arc;
use std::sync::Mutex;
use std::thread;

use market_store_core::Bar;
use market_store_core::DatabaseOptions;
use market_store_core::Exchange;
use market_store_core::InMemoryOverviewLedger;
use market_store_core::InMemorySeriesStore;
use market_store_core::IngestError;
use market_store_core::Interval;
use market_store_core::MarketDatabase;
use market_store_core::OverviewLedger;
use market_store_core::OverviewUpdate;
use market_store_core::RecordKind;
use market_store_core::ReferenceZone;
use market_store_core::Row;
use market_store_core::SeriesKey;
use market_store_core::SeriesLocks;
use market_store_core::SeriesStore;
use market_store_core::SharedOverviewLedger;
use market_store_core::Statement;
use market_store_core::StoreError;
use market_store_core::TagOverviewLedger;
use market_store_core::Tick;
use market_store_core::WriteMode;
use time::Duration;
use time::OffsetDateTime;
use time::macros::datetime;
use time::macros::offset;

// ============================================================================
// SECTION: Fixtures
// ============================================================================

type TagDatabase = MarketDatabase<InMemorySeriesStore, TagOverviewLedger<InMemorySeriesStore>>;

fn tag_database() -> TagDatabase {
    let store = InMemorySeriesStore::new();
    let ledger = TagOverviewLedger::new(store.clone(), ReferenceZone::UTC);
    MarketDatabase::open(store, ledger, DatabaseOptions::default()).unwrap()
}

fn keyed_database() -> MarketDatabase<InMemorySeriesStore, InMemoryOverviewLedger> {
    MarketDatabase::open(
        InMemorySeriesStore::new(),
        InMemoryOverviewLedger::new(),
        DatabaseOptions::default(),
    )
    .unwrap()
}

fn base_time() -> OffsetDateTime {
    datetime!(2024-01-02 09:30 UTC)
}

fn minute(offset_minutes: i64) -> OffsetDateTime {
    base_time() + Duration::minutes(offset_minutes)
}

fn bars(symbol: &str, minutes: impl IntoIterator<Item = i64>) -> Vec<Bar> {
    minutes
        .into_iter()
        .map(|offset_minutes| {
            let mut bar = Bar::new(symbol, Exchange::Cffex, Interval::Minute, minute(offset_minutes));
            bar.close_price = 3600.0 + f64::from(i32::try_from(offset_minutes).unwrap());
            bar.volume = 10.0;
            bar
        })
        .collect()
}

fn bar_key(symbol: &str) -> SeriesKey {
    SeriesKey::bar(symbol, Exchange::Cffex, Interval::Minute).unwrap()
}

/// Store wrapper counting every statement and failing inserts on demand.
#[derive(Clone, Default)]
struct RecordingStore {
    inner: InMemorySeriesStore,
    statements: Arc<Mutex<usize>>,
    inserts: Arc<Mutex<usize>>,
    fail_insert_at: Arc<Mutex<Option<usize>>>,
}

impl RecordingStore {
    fn statement_count(&self) -> usize {
        *self.statements.lock().unwrap()
    }

    fn fail_insert_at(&self, chunk: Option<usize>) {
        *self.inserts.lock().unwrap() = 0;
        *self.fail_insert_at.lock().unwrap() = chunk;
    }
}

impl SeriesStore for RecordingStore {
    fn execute(&self, statement: &Statement) -> Result<(), StoreError> {
        *self.statements.lock().unwrap() += 1;
        if matches!(statement, Statement::Insert { .. }) {
            let mut inserts = self.inserts.lock().unwrap();
            if *self.fail_insert_at.lock().unwrap() == Some(*inserts) {
                return Err(StoreError::Unavailable("write timeout".to_string()));
            }
            *inserts += 1;
        }
        self.inner.execute(statement)
    }

    fn query(&self, statement: &Statement) -> Result<Vec<Row>, StoreError> {
        *self.statements.lock().unwrap() += 1;
        self.inner.query(statement)
    }
}

// ============================================================================
// SECTION: Overview Strategies
// ============================================================================

/// Verifies the 500 + 10 streamed + 5 backfilled bar scenario.
#[test]
fn initialize_append_reconcile_scenario() {
    let db = tag_database();
    let key = bar_key("IF2406");

    let receipt = db.save_bars(&bars("IF2406", 0 .. 500), WriteMode::Backfill).unwrap();
    assert_eq!(receipt.strategy, OverviewUpdate::Initialize);
    assert_eq!(receipt.rows_written, 500);
    let overview = db.overview(&key).unwrap().unwrap();
    assert_eq!((overview.start, overview.end, overview.count), (minute(0), minute(499), 500));

    let receipt = db.save_bars(&bars("IF2406", 500 .. 510), WriteMode::Stream).unwrap();
    assert_eq!(receipt.strategy, OverviewUpdate::AppendExtend);
    let overview = db.overview(&key).unwrap().unwrap();
    assert_eq!((overview.start, overview.end, overview.count), (minute(0), minute(509), 510));

    let receipt = db.save_bars(&bars("IF2406", -5 .. 0), WriteMode::Backfill).unwrap();
    assert_eq!(receipt.strategy, OverviewUpdate::Reconcile);
    let overview = db.overview(&key).unwrap().unwrap();
    assert_eq!((overview.start, overview.end, overview.count), (minute(-5), minute(509), 515));

    let loaded = db.load_bars(&key, minute(-10), minute(600)).unwrap();
    assert_eq!(loaded.len(), 515);
    assert!(loaded.windows(2).all(|pair| pair[0].datetime < pair[1].datetime));
}

/// Verifies Reconcile recounts instead of adding overlapping batch sizes.
#[test]
fn reconcile_counts_upserted_duplicates_once() {
    let db = keyed_database();
    let key = bar_key("IC2406");
    db.save_bars(&bars("IC2406", 0 .. 100), WriteMode::Backfill).unwrap();
    let receipt = db.save_bars(&bars("IC2406", 50 .. 150), WriteMode::Backfill).unwrap();
    assert_eq!(receipt.strategy, OverviewUpdate::Reconcile);
    let overview = db.overview(&key).unwrap().unwrap();
    assert_eq!((overview.start, overview.end, overview.count), (minute(0), minute(149), 150));
}

/// Verifies Append-extend trusts the caller and overcounts re-delivered rows.
#[test]
fn append_extend_trusts_caller_ordering() {
    let db = keyed_database();
    let key = bar_key("IH2406");
    db.save_bars(&bars("IH2406", 0 .. 10), WriteMode::Stream).unwrap();
    let receipt = db.save_bars(&bars("IH2406", 5 .. 10), WriteMode::Stream).unwrap();
    assert_eq!(receipt.strategy, OverviewUpdate::AppendExtend);
    let overview = db.overview(&key).unwrap().unwrap();
    assert_eq!((overview.end, overview.count), (minute(9), 15));
}

/// Verifies unordered backfill batches use their true bounds.
#[test]
fn initialize_uses_batch_min_and_max() {
    let db = keyed_database();
    let receipt = db.save_bars(&bars("IM2406", [7, 2, 9, 4]), WriteMode::Backfill).unwrap();
    assert_eq!(receipt.overview.start, minute(2));
    assert_eq!(receipt.overview.end, minute(9));
    assert_eq!(receipt.overview.count, 4);
}

// ============================================================================
// SECTION: Batch Validation
// ============================================================================

/// Verifies empty and mixed-series batches are rejected before any I/O.
#[test]
fn malformed_batches_perform_no_io() {
    let store = RecordingStore::default();
    let db = MarketDatabase::open(store.clone(), InMemoryOverviewLedger::new(), DatabaseOptions::default())
        .unwrap();
    let baseline = store.statement_count();

    let err = db.save_bars(&[], WriteMode::Backfill).unwrap_err();
    assert!(matches!(err, IngestError::MalformedBatch(_)));

    let mut mixed = bars("IF2406", 0 .. 3);
    mixed.extend(bars("IC2406", 3 .. 4));
    let err = db.save_bars(&mixed, WriteMode::Backfill).unwrap_err();
    assert!(matches!(err, IngestError::MalformedBatch(_)));

    let mut other_interval = bars("IF2406", 0 .. 2);
    other_interval[1].interval = Interval::Hour;
    let err = db.save_bars(&other_interval, WriteMode::Stream).unwrap_err();
    assert!(matches!(err, IngestError::MalformedBatch(_)));

    let err = db.save_bars(&bars("bad symbol", 0 .. 1), WriteMode::Backfill).unwrap_err();
    assert!(matches!(err, IngestError::InvalidKey(_)));

    for value in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
        let mut batch = bars("IF2406", 0 .. 3);
        batch[2].high_price = value;
        let err = db.save_bars(&batch, WriteMode::Backfill).unwrap_err();
        assert!(
            matches!(err, IngestError::MalformedBatch(ref message) if message == "record 2 has a non-finite high_price"),
            "{err}"
        );
    }

    assert_eq!(store.statement_count(), baseline);
}

/// Verifies overview bounds use the millisecond timestamps rows are stored with.
#[test]
fn overview_bounds_match_stored_precision() {
    let fraction = Duration::microseconds(500);
    let shifted = MarketDatabase::open(
        InMemorySeriesStore::new(),
        InMemoryOverviewLedger::new(),
        DatabaseOptions {
            zone: ReferenceZone::new(offset!(+8)),
            ..DatabaseOptions::default()
        },
    )
    .unwrap();
    for db in [keyed_database(), shifted] {
        let key = bar_key("IF2406");
        let first = Bar::new("IF2406", Exchange::Cffex, Interval::Minute, minute(0) + fraction);
        let receipt = db.save_bars(&[first], WriteMode::Backfill).unwrap();
        let loaded = db.load_bars(&key, minute(0), minute(0)).unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(receipt.overview.start, loaded[0].datetime);
        assert_eq!(receipt.overview.start, minute(0));
        assert_eq!(receipt.overview.start.offset(), db.zone().offset());

        let later = Bar::new("IF2406", Exchange::Cffex, Interval::Minute, minute(1) + fraction);
        let receipt = db.save_bars(&[later], WriteMode::Stream).unwrap();
        assert_eq!(receipt.strategy, OverviewUpdate::AppendExtend);
        assert_eq!(receipt.overview.end, minute(1));
        assert_eq!(db.overview(&key).unwrap().unwrap(), receipt.overview);
    }
}

/// Verifies loading with the wrong record kind is rejected.
#[test]
fn load_rejects_kind_mismatch() {
    let db = keyed_database();
    let err = db.load_ticks(&bar_key("IF2406"), minute(0), minute(1)).unwrap_err();
    assert!(matches!(
        err,
        IngestError::KindMismatch {
            actual: RecordKind::Bar,
            requested: RecordKind::Tick,
            ..
        }
    ));
}

// ============================================================================
// SECTION: Load and Delete
// ============================================================================

/// Verifies ticks round-trip through save and load.
#[test]
fn tick_save_load_roundtrip() {
    let db = tag_database();
    let mut ticks = Vec::new();
    for second in 0 .. 20 {
        let mut tick = Tick::new("rb2410", Exchange::Shfe, base_time() + Duration::seconds(second));
        tick.last_price = 3650.0 + f64::from(i32::try_from(second).unwrap());
        tick.bid_prices[0] = tick.last_price - 1.0;
        tick.ask_prices[0] = tick.last_price + 1.0;
        tick.localtime = Some(tick.datetime + Duration::milliseconds(40));
        ticks.push(tick);
    }
    db.save_ticks(&ticks, WriteMode::Stream).unwrap();

    let key = SeriesKey::tick("rb2410", Exchange::Shfe).unwrap();
    let loaded = db.load_ticks(&key, base_time(), base_time() + Duration::seconds(19)).unwrap();
    assert_eq!(loaded, ticks);

    let window = db
        .load_ticks(&key, base_time() + Duration::seconds(5), base_time() + Duration::seconds(9))
        .unwrap();
    assert_eq!(window.len(), 5);
    assert_eq!(window[0].datetime, base_time() + Duration::seconds(5));
}

/// Verifies loads are expressed in the configured reference zone.
#[test]
fn load_returns_reference_zone_timestamps() {
    let store = InMemorySeriesStore::new();
    let options = DatabaseOptions {
        zone: ReferenceZone::new(offset!(+8)),
        ..DatabaseOptions::default()
    };
    let db = MarketDatabase::open(store, InMemoryOverviewLedger::new(), options).unwrap();
    db.save_bars(&bars("IF2406", 0 .. 3), WriteMode::Backfill).unwrap();
    let loaded = db.load_bars(&bar_key("IF2406"), minute(0), minute(2)).unwrap();
    assert_eq!(loaded.len(), 3);
    assert!(loaded.iter().all(|bar| bar.datetime.offset() == offset!(+8)));
    assert_eq!(loaded[0].datetime, minute(0));
}

/// Verifies loading a series that was never saved returns nothing.
#[test]
fn load_missing_series_is_empty() {
    let db = tag_database();
    let loaded = db.load_bars(&bar_key("IF2499"), minute(0), minute(10)).unwrap();
    assert!(loaded.is_empty());
}

/// Verifies delete returns the prior count and clears table and overview.
#[test]
fn delete_series_drops_table_and_overview() {
    let db = keyed_database();
    let key = bar_key("IF2406");
    db.save_bars(&bars("IF2406", 0 .. 42), WriteMode::Backfill).unwrap();
    assert_eq!(db.delete_series(&key).unwrap(), 42);
    assert!(db.overview(&key).unwrap().is_none());
    assert!(db.store().table_names().unwrap().is_empty());
    assert_eq!(db.delete_series(&key).unwrap(), 0);

    let receipt = db.save_bars(&bars("IF2406", 0 .. 3), WriteMode::Stream).unwrap();
    assert_eq!(receipt.strategy, OverviewUpdate::Initialize);
    assert_eq!(receipt.overview.count, 3);
}

/// Verifies delete clears a ledger entry whose table is already gone.
#[test]
fn delete_clears_dangling_ledger_entry() {
    let db = keyed_database();
    let key = bar_key("IF2406");
    db.save_bars(&bars("IF2406", 0 .. 5), WriteMode::Backfill).unwrap();
    db.store()
        .execute(&Statement::DropTable {
            table: key.table_name(),
        })
        .unwrap();
    assert!(db.overview(&key).unwrap().is_some());
    assert_eq!(db.delete_series(&key).unwrap(), 0);
    assert!(db.overview(&key).unwrap().is_none());
}

// ============================================================================
// SECTION: Failures and Concurrency
// ============================================================================

/// Verifies a partial write leaves the overview stale until a Reconcile heals it.
#[test]
fn partial_write_is_healed_by_reconcile() {
    let store = RecordingStore::default();
    let options = DatabaseOptions {
        max_chunk_rows: 10,
        ..DatabaseOptions::default()
    };
    let db = MarketDatabase::open(store.clone(), InMemoryOverviewLedger::new(), options).unwrap();
    let key = bar_key("IF2406");
    db.save_bars(&bars("IF2406", 0 .. 10), WriteMode::Backfill).unwrap();

    store.fail_insert_at(Some(2));
    let err = db.save_bars(&bars("IF2406", 10 .. 40), WriteMode::Stream).unwrap_err();
    match err {
        IngestError::PartialWriteFailure {
            committed_chunks,
            committed_rows,
            ..
        } => assert_eq!((committed_chunks, committed_rows), (2, 20)),
        other => panic!("expected partial write failure, got {other}"),
    }
    let stale = db.overview(&key).unwrap().unwrap();
    assert_eq!((stale.end, stale.count), (minute(9), 10));

    store.fail_insert_at(None);
    let receipt = db.save_bars(&bars("IF2406", 40 .. 41), WriteMode::Backfill).unwrap();
    assert_eq!(receipt.strategy, OverviewUpdate::Reconcile);
    assert_eq!(receipt.overview.count, 31);
    assert_eq!(receipt.overview.end, minute(40));
}

/// Verifies concurrent stream saves to one series do not lose updates.
#[test]
fn concurrent_saves_to_one_series_are_serialized() {
    let db = Arc::new(keyed_database());
    let key = bar_key("IF2406");
    db.save_bars(&bars("IF2406", 0 .. 1), WriteMode::Backfill).unwrap();

    let workers: Vec<_> = (0 .. 8)
        .map(|worker| {
            let db = Arc::clone(&db);
            thread::spawn(move || {
                let first = 1 + worker * 25;
                db.save_bars(&bars("IF2406", first .. first + 25), WriteMode::Stream).unwrap();
            })
        })
        .collect();
    for worker in workers {
        worker.join().unwrap();
    }

    let overview = db.overview(&key).unwrap().unwrap();
    assert_eq!(overview.count, 201);
    assert_eq!(overview.end, minute(200));
}

/// Verifies deleting a series releases its lock entry.
#[test]
fn delete_series_releases_lock_entry() {
    let db = keyed_database();
    db.save_bars(&bars("IF2406", 0 .. 2), WriteMode::Backfill).unwrap();
    db.save_bars(&bars("IC2406", 0 .. 2), WriteMode::Backfill).unwrap();
    assert_eq!(db.locks().len(), 2);

    db.delete_series(&bar_key("IF2406")).unwrap();
    assert_eq!(db.locks().len(), 1);
    db.delete_series(&bar_key("IC2406")).unwrap();
    assert!(db.locks().is_empty());
    db.delete_series(&bar_key("IH2406")).unwrap();
    assert!(db.locks().is_empty());
}

/// Verifies a lock entry someone else still holds survives release.
#[test]
fn series_lock_release_keeps_shared_entries() {
    let locks = SeriesLocks::new();
    let key = bar_key("IF2406");
    let held = locks.handle(&key);
    let waiting = locks.handle(&key);
    assert!(Arc::ptr_eq(&held, &waiting));

    locks.release(&key, held);
    assert_eq!(locks.len(), 1);
    assert!(Arc::ptr_eq(&waiting, &locks.handle(&key)));

    locks.release(&key, waiting);
    assert!(locks.is_empty());
}

// ============================================================================
// SECTION: Overview Listing
// ============================================================================

/// Verifies overviews are listed per record kind for both ledger backends.
#[test]
fn overviews_list_each_kind() {
    let tag = tag_database();
    let keyed = MarketDatabase::open(
        InMemorySeriesStore::new(),
        SharedOverviewLedger::from_ledger(InMemoryOverviewLedger::new()),
        DatabaseOptions::default(),
    )
    .unwrap();

    for symbol in ["IF2406", "IC2406"] {
        tag.save_bars(&bars(symbol, 0 .. 3), WriteMode::Backfill).unwrap();
        keyed.save_bars(&bars(symbol, 0 .. 3), WriteMode::Backfill).unwrap();
    }
    let tick = Tick::new("rb2410", Exchange::Shfe, base_time());
    tag.save_ticks(std::slice::from_ref(&tick), WriteMode::Backfill).unwrap();
    keyed.save_ticks(std::slice::from_ref(&tick), WriteMode::Backfill).unwrap();

    for listed in [tag.overviews(RecordKind::Bar).unwrap(), keyed.overviews(RecordKind::Bar).unwrap()] {
        let symbols: Vec<&str> = listed.iter().map(|overview| overview.key.symbol()).collect();
        assert_eq!(symbols, vec!["IC2406", "IF2406"]);
        assert!(listed.iter().all(|overview| overview.count == 3));
    }
    let ticks = tag.overviews(RecordKind::Tick).unwrap();
    assert_eq!(ticks.len(), 1);
    assert_eq!(ticks[0].key.interval(), None);
    assert_eq!(keyed.ledger().list(RecordKind::Tick).unwrap().len(), 1);
}

/// Verifies a provisioned but never-written table has no overview.
#[test]
fn fresh_table_reads_as_absent_overview() {
    let db = tag_database();
    let key = bar_key("IF2406");
    market_store_core::TableCatalog.ensure_table(db.store(), &key).unwrap();
    assert!(db.overview(&key).unwrap().is_none());
    assert!(db.overviews(RecordKind::Bar).unwrap().is_empty());
}
