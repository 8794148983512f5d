// crates/market-store-core/src/runtime/codec.rs
// ============================================================================
// Module: Market Store Record Codec
// Description: Positional mapping between records and template rows.
// Purpose: Encode bars/ticks into store rows and decode rows back into records.
// Dependencies: crate::core, crate::interfaces, thiserror, time
// ============================================================================

//! ## Overview
//! Encoding is total: every record maps onto its template columns in order.
//! Decoding validates arity and column types and restores the series
//! identity from the caller-supplied [`SeriesKey`], because rows carry data
//! columns only. Decoded timestamps are expressed in the [`ReferenceZone`].
//!
//! A tick without a local capture time is stored with its exchange timestamp
//! in the `localtime` column; a NULL `localtime` read back from the store is
//! filled the same way.

// ============================================================================
// SECTION: Imports
// ============================================================================

use thiserror::Error;
use time::OffsetDateTime;

use crate::core::BOOK_DEPTH;
use crate::core::Bar;
use crate::core::KeyError;
use crate::core::RecordKind;
use crate::core::ReferenceZone;
use crate::core::SeriesKey;
use crate::core::Tick;
use crate::core::TimeError;
use crate::core::to_unix_millis;
use crate::interfaces::Row;
use crate::interfaces::Value;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Row codec errors.
#[derive(Debug, Error)]
pub enum CodecError {
    /// Row has the wrong number of columns.
    #[error("row arity mismatch: expected {expected} columns, got {actual}")]
    Arity {
        /// Template column count.
        expected: usize,
        /// Row column count.
        actual: usize,
    },
    /// Column holds a value of the wrong type.
    #[error("column {column} expected {expected}")]
    Type {
        /// Column name.
        column: &'static str,
        /// Expected value type.
        expected: &'static str,
    },
    /// Stored timestamp is not representable.
    #[error("column {column}: {source}")]
    Timestamp {
        /// Column name.
        column: &'static str,
        /// Underlying conversion error.
        source: TimeError,
    },
    /// Series context does not match the record kind.
    #[error("series {key} cannot hold {kind} records")]
    Context {
        /// Series key supplied for decoding.
        key: String,
        /// Record kind being decoded.
        kind: RecordKind,
    },
}

// ============================================================================
// SECTION: Codec Trait
// ============================================================================

/// Record types that map onto a template row.
pub trait RowCodec: Sized {
    /// Template the record is stored under.
    const KIND: RecordKind;

    /// Returns the series key this record belongs to.
    ///
    /// # Errors
    ///
    /// Returns [`KeyError`] when the record's identity fails validation.
    fn series_key(&self) -> Result<SeriesKey, KeyError>;

    /// Returns the record's primary timestamp.
    fn timestamp(&self) -> OffsetDateTime;

    /// Encodes the record in template column order.
    fn encode(&self) -> Row;

    /// Decodes a template row within a known series.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError`] when the row does not match the template.
    fn decode(row: &[Value], key: &SeriesKey, zone: ReferenceZone) -> Result<Self, CodecError>;
}

// ============================================================================
// SECTION: Bar Codec
// ============================================================================

impl RowCodec for Bar {
    const KIND: RecordKind = RecordKind::Bar;

    fn series_key(&self) -> Result<SeriesKey, KeyError> {
        Self::series_key(self)
    }

    fn timestamp(&self) -> OffsetDateTime {
        self.datetime
    }

    fn encode(&self) -> Row {
        vec![
            Value::Timestamp(to_unix_millis(self.datetime)),
            Value::Double(self.volume),
            Value::Double(self.turnover),
            Value::Double(self.open_interest),
            Value::Double(self.open_price),
            Value::Double(self.high_price),
            Value::Double(self.low_price),
            Value::Double(self.close_price),
        ]
    }

    fn decode(row: &[Value], key: &SeriesKey, zone: ReferenceZone) -> Result<Self, CodecError> {
        let Some(interval) = key.interval() else {
            return Err(CodecError::Context {
                key: key.to_string(),
                kind: Self::KIND,
            });
        };
        let reader = RowReader::new(row, Self::KIND)?;
        Ok(Self {
            symbol: key.symbol().to_string(),
            exchange: key.exchange(),
            interval,
            datetime: reader.timestamp(0, zone)?,
            volume: reader.double(1)?,
            turnover: reader.double(2)?,
            open_interest: reader.double(3)?,
            open_price: reader.double(4)?,
            high_price: reader.double(5)?,
            low_price: reader.double(6)?,
            close_price: reader.double(7)?,
        })
    }
}

// ============================================================================
// SECTION: Tick Codec
// ============================================================================

/// Column index of the first bid price in the tick template.
const TICK_BID_PRICE_OFFSET: usize = 13;
/// Column index of the first ask price in the tick template.
const TICK_ASK_PRICE_OFFSET: usize = TICK_BID_PRICE_OFFSET + BOOK_DEPTH;
/// Column index of the first bid volume in the tick template.
const TICK_BID_VOLUME_OFFSET: usize = TICK_ASK_PRICE_OFFSET + BOOK_DEPTH;
/// Column index of the first ask volume in the tick template.
const TICK_ASK_VOLUME_OFFSET: usize = TICK_BID_VOLUME_OFFSET + BOOK_DEPTH;
/// Column index of the local capture time in the tick template.
const TICK_LOCALTIME_INDEX: usize = TICK_ASK_VOLUME_OFFSET + BOOK_DEPTH;

impl RowCodec for Tick {
    const KIND: RecordKind = RecordKind::Tick;

    fn series_key(&self) -> Result<SeriesKey, KeyError> {
        Self::series_key(self)
    }

    fn timestamp(&self) -> OffsetDateTime {
        self.datetime
    }

    fn encode(&self) -> Row {
        let localtime = self.localtime.unwrap_or(self.datetime);
        let mut row = Vec::with_capacity(RecordKind::Tick.columns().len());
        row.push(Value::Timestamp(to_unix_millis(self.datetime)));
        row.push(Value::Text(self.name.clone()));
        for value in [
            self.volume,
            self.turnover,
            self.open_interest,
            self.last_price,
            self.last_volume,
            self.limit_up,
            self.limit_down,
            self.open_price,
            self.high_price,
            self.low_price,
            self.pre_close,
        ] {
            row.push(Value::Double(value));
        }
        for levels in [&self.bid_prices, &self.ask_prices, &self.bid_volumes, &self.ask_volumes] {
            row.extend(levels.iter().copied().map(Value::Double));
        }
        row.push(Value::Timestamp(to_unix_millis(localtime)));
        row
    }

    fn decode(row: &[Value], key: &SeriesKey, zone: ReferenceZone) -> Result<Self, CodecError> {
        if key.interval().is_some() {
            return Err(CodecError::Context {
                key: key.to_string(),
                kind: Self::KIND,
            });
        }
        let reader = RowReader::new(row, Self::KIND)?;
        let datetime = reader.timestamp(0, zone)?;
        let localtime = reader.optional_timestamp(TICK_LOCALTIME_INDEX, zone)?.unwrap_or(datetime);
        Ok(Self {
            symbol: key.symbol().to_string(),
            exchange: key.exchange(),
            datetime,
            name: reader.text(1)?,
            volume: reader.double(2)?,
            turnover: reader.double(3)?,
            open_interest: reader.double(4)?,
            last_price: reader.double(5)?,
            last_volume: reader.double(6)?,
            limit_up: reader.double(7)?,
            limit_down: reader.double(8)?,
            open_price: reader.double(9)?,
            high_price: reader.double(10)?,
            low_price: reader.double(11)?,
            pre_close: reader.double(12)?,
            bid_prices: reader.levels(TICK_BID_PRICE_OFFSET)?,
            ask_prices: reader.levels(TICK_ASK_PRICE_OFFSET)?,
            bid_volumes: reader.levels(TICK_BID_VOLUME_OFFSET)?,
            ask_volumes: reader.levels(TICK_ASK_VOLUME_OFFSET)?,
            localtime: Some(localtime),
        })
    }
}

// ============================================================================
// SECTION: Row Reader
// ============================================================================

/// Typed accessor over a row whose arity matches a template.
struct RowReader<'a> {
    /// Row values.
    row: &'a [Value],
    /// Template the row belongs to.
    kind: RecordKind,
}

impl<'a> RowReader<'a> {
    /// Checks arity against the template.
    fn new(row: &'a [Value], kind: RecordKind) -> Result<Self, CodecError> {
        let expected = kind.columns().len();
        if row.len() != expected {
            return Err(CodecError::Arity {
                expected,
                actual: row.len(),
            });
        }
        Ok(Self {
            row,
            kind,
        })
    }

    /// Returns the template column name at an index.
    fn column(&self, index: usize) -> &'static str {
        self.kind.columns().get(index).map_or("?", |column| column.name)
    }

    /// Returns the value at an index.
    fn value(&self, index: usize) -> &Value {
        self.row.get(index).unwrap_or(&Value::Null)
    }

    /// Reads a DOUBLE column.
    fn double(&self, index: usize) -> Result<f64, CodecError> {
        match self.value(index) {
            Value::Double(value) => Ok(*value),
            _ => Err(CodecError::Type {
                column: self.column(index),
                expected: "double",
            }),
        }
    }

    /// Reads a text column; NULL decodes as an empty string.
    fn text(&self, index: usize) -> Result<String, CodecError> {
        match self.value(index) {
            Value::Text(value) => Ok(value.clone()),
            Value::Null => Ok(String::new()),
            _ => Err(CodecError::Type {
                column: self.column(index),
                expected: "text",
            }),
        }
    }

    /// Reads a non-null timestamp column.
    fn timestamp(&self, index: usize, zone: ReferenceZone) -> Result<OffsetDateTime, CodecError> {
        self.optional_timestamp(index, zone)?.ok_or(CodecError::Type {
            column: self.column(index),
            expected: "timestamp",
        })
    }

    /// Reads a nullable timestamp column.
    fn optional_timestamp(
        &self,
        index: usize,
        zone: ReferenceZone,
    ) -> Result<Option<OffsetDateTime>, CodecError> {
        match self.value(index) {
            Value::Timestamp(millis) => zone.from_unix_millis(*millis).map(Some).map_err(|source| {
                CodecError::Timestamp {
                    column: self.column(index),
                    source,
                }
            }),
            Value::Null => Ok(None),
            _ => Err(CodecError::Type {
                column: self.column(index),
                expected: "timestamp",
            }),
        }
    }

    /// Reads [`BOOK_DEPTH`] consecutive DOUBLE columns.
    fn levels(&self, offset: usize) -> Result<[f64; BOOK_DEPTH], CodecError> {
        let mut levels = [0.0; BOOK_DEPTH];
        for (level, slot) in levels.iter_mut().enumerate() {
            *slot = self.double(offset + level)?;
        }
        Ok(levels)
    }
}
