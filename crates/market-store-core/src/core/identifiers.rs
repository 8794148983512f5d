// crates/market-store-core/src/core/identifiers.rs
// ============================================================================
// Module: Market Store Identifiers
// Description: Series keys, venue and interval tokens, and table identifiers.
// Purpose: Provide strongly typed, validated identifiers with stable wire forms.
// Dependencies: serde, thiserror
// ============================================================================

//! ## Overview
//! A [`SeriesKey`] identifies one physical series: a symbol traded on an
//! [`Exchange`], plus an [`Interval`] for bar series. The record kind is
//! derived from the key, so a bar key and a tick key for the same
//! instrument never collide. Physical table identifiers and keyed-ledger keys
//! are pure functions of the key and are injective because the exchange and
//! interval tokens are fixed and never contain the separator.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;
use std::str::FromStr;

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Maximum symbol length in bytes (width of the template's symbol tag).
pub const MAX_SYMBOL_LENGTH: usize = 20;
/// Separator used when joining key components into identifiers.
pub const KEY_SEPARATOR: &str = "_";

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Series key validation errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KeyError {
    /// Symbol failed validation.
    #[error("invalid symbol: {0}")]
    InvalidSymbol(String),
    /// Unknown exchange token.
    #[error("unknown exchange: {0}")]
    UnknownExchange(String),
    /// Unknown interval token.
    #[error("unknown interval: {0}")]
    UnknownInterval(String),
    /// Unknown record kind token.
    #[error("unknown record kind: {0}")]
    UnknownKind(String),
}

// ============================================================================
// SECTION: Record Kind
// ============================================================================

/// Kind of record stored in a series; selects the physical template.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    /// OHLCV bar records.
    Bar,
    /// Order-book tick records.
    Tick,
}

impl RecordKind {
    /// Returns the stable token used in table identifiers.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Bar => "bar",
            Self::Tick => "tick",
        }
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RecordKind {
    type Err = KeyError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "bar" => Ok(Self::Bar),
            "tick" => Ok(Self::Tick),
            other => Err(KeyError::UnknownKind(other.to_string())),
        }
    }
}

// ============================================================================
// SECTION: Exchange
// ============================================================================

/// Trading venue token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Exchange {
    /// China Financial Futures Exchange.
    Cffex,
    /// Shanghai Futures Exchange.
    Shfe,
    /// Zhengzhou Commodity Exchange.
    Czce,
    /// Dalian Commodity Exchange.
    Dce,
    /// Shanghai International Energy Exchange.
    Ine,
    /// Guangzhou Futures Exchange.
    Gfex,
    /// Shanghai Stock Exchange.
    Sse,
    /// Shenzhen Stock Exchange.
    Szse,
    /// Beijing Stock Exchange.
    Bse,
    /// Shanghai Gold Exchange.
    Sge,
    /// China Foreign Exchange Trade System.
    Cfets,
    /// Smart routing venue.
    Smart,
    /// New York Stock Exchange.
    Nyse,
    /// Nasdaq.
    Nasdaq,
    /// NYSE Arca.
    Arca,
    /// Chicago Mercantile Exchange.
    Cme,
    /// Chicago Board of Trade.
    Cbot,
    /// Commodity Exchange.
    Comex,
    /// New York Mercantile Exchange.
    Nymex,
    /// Intercontinental Exchange.
    Ice,
    /// Stock Exchange of Hong Kong.
    Sehk,
    /// Hong Kong Futures Exchange.
    Hkfe,
    /// Singapore Exchange.
    Sgx,
    /// Eurex.
    Eurex,
    /// London Metal Exchange.
    Lme,
    /// Binance.
    Binance,
    /// OKX.
    Okx,
    /// Locally generated data.
    Local,
}

impl Exchange {
    /// All known exchange tokens.
    pub const ALL: [Self; 28] = [
        Self::Cffex,
        Self::Shfe,
        Self::Czce,
        Self::Dce,
        Self::Ine,
        Self::Gfex,
        Self::Sse,
        Self::Szse,
        Self::Bse,
        Self::Sge,
        Self::Cfets,
        Self::Smart,
        Self::Nyse,
        Self::Nasdaq,
        Self::Arca,
        Self::Cme,
        Self::Cbot,
        Self::Comex,
        Self::Nymex,
        Self::Ice,
        Self::Sehk,
        Self::Hkfe,
        Self::Sgx,
        Self::Eurex,
        Self::Lme,
        Self::Binance,
        Self::Okx,
        Self::Local,
    ];

    /// Returns the stable venue token.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Cffex => "CFFEX",
            Self::Shfe => "SHFE",
            Self::Czce => "CZCE",
            Self::Dce => "DCE",
            Self::Ine => "INE",
            Self::Gfex => "GFEX",
            Self::Sse => "SSE",
            Self::Szse => "SZSE",
            Self::Bse => "BSE",
            Self::Sge => "SGE",
            Self::Cfets => "CFETS",
            Self::Smart => "SMART",
            Self::Nyse => "NYSE",
            Self::Nasdaq => "NASDAQ",
            Self::Arca => "ARCA",
            Self::Cme => "CME",
            Self::Cbot => "CBOT",
            Self::Comex => "COMEX",
            Self::Nymex => "NYMEX",
            Self::Ice => "ICE",
            Self::Sehk => "SEHK",
            Self::Hkfe => "HKFE",
            Self::Sgx => "SGX",
            Self::Eurex => "EUREX",
            Self::Lme => "LME",
            Self::Binance => "BINANCE",
            Self::Okx => "OKX",
            Self::Local => "LOCAL",
        }
    }
}

impl fmt::Display for Exchange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Exchange {
    type Err = KeyError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|exchange| exchange.as_str() == value)
            .ok_or_else(|| KeyError::UnknownExchange(value.to_string()))
    }
}

// ============================================================================
// SECTION: Interval
// ============================================================================

/// Bar granularity token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Interval {
    /// One-minute bars.
    #[serde(rename = "1m")]
    Minute,
    /// One-hour bars.
    #[serde(rename = "1h")]
    Hour,
    /// Daily bars.
    #[serde(rename = "1d")]
    Daily,
    /// Weekly bars.
    #[serde(rename = "1w")]
    Weekly,
}

impl Interval {
    /// All known interval tokens.
    pub const ALL: [Self; 4] = [Self::Minute, Self::Hour, Self::Daily, Self::Weekly];

    /// Returns the stable interval token.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Minute => "1m",
            Self::Hour => "1h",
            Self::Daily => "1d",
            Self::Weekly => "1w",
        }
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Interval {
    type Err = KeyError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|interval| interval.as_str() == value)
            .ok_or_else(|| KeyError::UnknownInterval(value.to_string()))
    }
}

// ============================================================================
// SECTION: Series Key
// ============================================================================

/// Identity of one physical series.
///
/// # Invariants
/// - `symbol` is non-empty, at most [`MAX_SYMBOL_LENGTH`] bytes, and limited to
///   `[A-Za-z0-9_.-]`.
/// - Bar series carry an interval; tick series never do.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct SeriesKey {
    /// Instrument symbol.
    symbol: String,
    /// Trading venue.
    exchange: Exchange,
    /// Bar granularity (absent for tick series).
    #[serde(skip_serializing_if = "Option::is_none")]
    interval: Option<Interval>,
}

impl SeriesKey {
    /// Creates a series key, validating the symbol.
    ///
    /// # Errors
    ///
    /// Returns [`KeyError::InvalidSymbol`] when the symbol fails validation.
    pub fn new(
        symbol: impl Into<String>,
        exchange: Exchange,
        interval: Option<Interval>,
    ) -> Result<Self, KeyError> {
        let symbol = symbol.into();
        validate_symbol(&symbol)?;
        Ok(Self {
            symbol,
            exchange,
            interval,
        })
    }

    /// Creates a bar series key.
    ///
    /// # Errors
    ///
    /// Returns [`KeyError::InvalidSymbol`] when the symbol fails validation.
    pub fn bar(
        symbol: impl Into<String>,
        exchange: Exchange,
        interval: Interval,
    ) -> Result<Self, KeyError> {
        Self::new(symbol, exchange, Some(interval))
    }

    /// Creates a tick series key.
    ///
    /// # Errors
    ///
    /// Returns [`KeyError::InvalidSymbol`] when the symbol fails validation.
    pub fn tick(symbol: impl Into<String>, exchange: Exchange) -> Result<Self, KeyError> {
        Self::new(symbol, exchange, None)
    }

    /// Returns the instrument symbol.
    #[must_use]
    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    /// Returns the trading venue.
    #[must_use]
    pub const fn exchange(&self) -> Exchange {
        self.exchange
    }

    /// Returns the bar interval, if any.
    #[must_use]
    pub const fn interval(&self) -> Option<Interval> {
        self.interval
    }

    /// Returns the record kind stored in this series.
    #[must_use]
    pub const fn kind(&self) -> RecordKind {
        if self.interval.is_some() { RecordKind::Bar } else { RecordKind::Tick }
    }

    /// Returns the physical table identifier for this series.
    #[must_use]
    pub fn table_name(&self) -> TableName {
        TableName(format!("{}{KEY_SEPARATOR}{}", self.kind().as_str(), self.ledger_key()))
    }

    /// Returns the key used by external keyed ledgers.
    #[must_use]
    pub fn ledger_key(&self) -> String {
        match self.interval {
            Some(interval) => format!(
                "{}{KEY_SEPARATOR}{}{KEY_SEPARATOR}{}",
                self.symbol,
                self.exchange.as_str(),
                interval.as_str()
            ),
            None => format!("{}{KEY_SEPARATOR}{}", self.symbol, self.exchange.as_str()),
        }
    }
}

impl fmt::Display for SeriesKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.ledger_key())
    }
}

/// Validates a symbol against the template tag constraints.
fn validate_symbol(symbol: &str) -> Result<(), KeyError> {
    if symbol.is_empty() {
        return Err(KeyError::InvalidSymbol("symbol must not be empty".to_string()));
    }
    if symbol.len() > MAX_SYMBOL_LENGTH {
        return Err(KeyError::InvalidSymbol(format!(
            "symbol exceeds {MAX_SYMBOL_LENGTH} bytes: {symbol}"
        )));
    }
    if !symbol.chars().all(|ch| ch.is_ascii_alphanumeric() || matches!(ch, '_' | '.' | '-')) {
        return Err(KeyError::InvalidSymbol(format!("symbol has unsupported characters: {symbol}")));
    }
    Ok(())
}

// ============================================================================
// SECTION: Table Name
// ============================================================================

/// Physical table identifier derived from a [`SeriesKey`].
///
/// # Invariants
/// - Only constructed from a validated key, so it contains `[A-Za-z0-9_.-]` only.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct TableName(String);

impl TableName {
    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TableName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}
