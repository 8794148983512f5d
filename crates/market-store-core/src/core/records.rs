// crates/market-store-core/src/core/records.rs
// ============================================================================
// Module: Market Store Records
// Description: Bar and tick domain records.
// Purpose: Define the records accepted by ingestion and returned by loads.
// Dependencies: serde, time, crate::core::identifiers
// ============================================================================

//! ## Overview
//! Records carry their own series identity (symbol, exchange and, for bars,
//! interval) so a batch's [`SeriesKey`] can be derived from its contents.
//! Prices and volumes are `f64` to match the template's DOUBLE columns.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use time::OffsetDateTime;

use crate::core::identifiers::Exchange;
use crate::core::identifiers::Interval;
use crate::core::identifiers::KeyError;
use crate::core::identifiers::SeriesKey;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Number of order-book levels carried by a tick.
pub const BOOK_DEPTH: usize = 5;

// ============================================================================
// SECTION: Bar
// ============================================================================

/// OHLCV bar for one interval.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    /// Instrument symbol.
    pub symbol: String,
    /// Trading venue.
    pub exchange: Exchange,
    /// Bar granularity.
    pub interval: Interval,
    /// Bar open time.
    #[serde(with = "time::serde::rfc3339")]
    pub datetime: OffsetDateTime,
    /// Traded volume.
    pub volume: f64,
    /// Traded notional.
    pub turnover: f64,
    /// Open interest at bar close.
    pub open_interest: f64,
    /// Open price.
    pub open_price: f64,
    /// High price.
    pub high_price: f64,
    /// Low price.
    pub low_price: f64,
    /// Close price.
    pub close_price: f64,
}

impl Bar {
    /// Creates a bar with zeroed prices and volumes.
    #[must_use]
    pub fn new(
        symbol: impl Into<String>,
        exchange: Exchange,
        interval: Interval,
        datetime: OffsetDateTime,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            exchange,
            interval,
            datetime,
            volume: 0.0,
            turnover: 0.0,
            open_interest: 0.0,
            open_price: 0.0,
            high_price: 0.0,
            low_price: 0.0,
            close_price: 0.0,
        }
    }

    /// Returns the series key this bar belongs to.
    ///
    /// # Errors
    ///
    /// Returns [`KeyError`] when the symbol fails validation.
    pub fn series_key(&self) -> Result<SeriesKey, KeyError> {
        SeriesKey::bar(self.symbol.clone(), self.exchange, self.interval)
    }
}

// ============================================================================
// SECTION: Tick
// ============================================================================

/// Order-book tick snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tick {
    /// Instrument symbol.
    pub symbol: String,
    /// Trading venue.
    pub exchange: Exchange,
    /// Exchange timestamp.
    #[serde(with = "time::serde::rfc3339")]
    pub datetime: OffsetDateTime,
    /// Instrument display name.
    #[serde(default)]
    pub name: String,
    /// Cumulative volume.
    pub volume: f64,
    /// Cumulative turnover.
    pub turnover: f64,
    /// Open interest.
    pub open_interest: f64,
    /// Last traded price.
    pub last_price: f64,
    /// Last traded volume.
    pub last_volume: f64,
    /// Upper price limit.
    pub limit_up: f64,
    /// Lower price limit.
    pub limit_down: f64,
    /// Session open price.
    pub open_price: f64,
    /// Session high price.
    pub high_price: f64,
    /// Session low price.
    pub low_price: f64,
    /// Previous close price.
    pub pre_close: f64,
    /// Bid prices, best first.
    pub bid_prices: [f64; BOOK_DEPTH],
    /// Ask prices, best first.
    pub ask_prices: [f64; BOOK_DEPTH],
    /// Bid volumes, best first.
    pub bid_volumes: [f64; BOOK_DEPTH],
    /// Ask volumes, best first.
    pub ask_volumes: [f64; BOOK_DEPTH],
    /// Local capture time, when the source recorded one.
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub localtime: Option<OffsetDateTime>,
}

impl Tick {
    /// Creates a tick with zeroed prices, volumes and book levels.
    #[must_use]
    pub fn new(symbol: impl Into<String>, exchange: Exchange, datetime: OffsetDateTime) -> Self {
        Self {
            symbol: symbol.into(),
            exchange,
            datetime,
            name: String::new(),
            volume: 0.0,
            turnover: 0.0,
            open_interest: 0.0,
            last_price: 0.0,
            last_volume: 0.0,
            limit_up: 0.0,
            limit_down: 0.0,
            open_price: 0.0,
            high_price: 0.0,
            low_price: 0.0,
            pre_close: 0.0,
            bid_prices: [0.0; BOOK_DEPTH],
            ask_prices: [0.0; BOOK_DEPTH],
            bid_volumes: [0.0; BOOK_DEPTH],
            ask_volumes: [0.0; BOOK_DEPTH],
            localtime: None,
        }
    }

    /// Returns the series key this tick belongs to.
    ///
    /// # Errors
    ///
    /// Returns [`KeyError`] when the symbol fails validation.
    pub fn series_key(&self) -> Result<SeriesKey, KeyError> {
        SeriesKey::tick(self.symbol.clone(), self.exchange)
    }
}
