// crates/market-store-core/src/core/time.rs
// ============================================================================
// Module: Market Store Time Model
// Description: Reference time zone normalization and storage timestamp encoding.
// Purpose: Keep every stored and compared timestamp in one reference offset.
// Dependencies: time, thiserror
// ============================================================================

//! ## Overview
//! Records arrive with arbitrary UTC offsets. Before a timestamp is written,
//! compared, or folded into an overview it is normalized to the configured
//! [`ReferenceZone`]. The store keeps timestamps as unix epoch milliseconds,
//! so sub-millisecond precision is truncated on write, and overview bounds
//! are truncated the same way.

// ============================================================================
// SECTION: Imports
// ============================================================================

use thiserror::Error;
use time::OffsetDateTime;
use time::UtcOffset;
use time::macros::format_description;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Timestamp conversion errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TimeError {
    /// Epoch value outside the representable range.
    #[error("timestamp out of range: {0} ms")]
    OutOfRange(i64),
    /// Offset string could not be parsed.
    #[error("invalid utc offset: {0}")]
    InvalidOffset(String),
}

// ============================================================================
// SECTION: Reference Zone
// ============================================================================

/// Fixed UTC offset every stored timestamp is normalized to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReferenceZone(UtcOffset);

impl ReferenceZone {
    /// UTC reference zone.
    pub const UTC: Self = Self(UtcOffset::UTC);

    /// Creates a reference zone from an offset.
    #[must_use]
    pub const fn new(offset: UtcOffset) -> Self {
        Self(offset)
    }

    /// Parses an offset in `+HH:MM` / `-HH:MM` form.
    ///
    /// # Errors
    ///
    /// Returns [`TimeError::InvalidOffset`] when the value is malformed.
    pub fn parse(value: &str) -> Result<Self, TimeError> {
        let format = format_description!("[offset_hour sign:mandatory]:[offset_minute]");
        UtcOffset::parse(value, format)
            .map(Self)
            .map_err(|_| TimeError::InvalidOffset(value.to_string()))
    }

    /// Returns the underlying offset.
    #[must_use]
    pub const fn offset(self) -> UtcOffset {
        self.0
    }

    /// Converts a timestamp into the reference offset at storage precision,
    /// dropping everything below the millisecond.
    ///
    /// # Errors
    ///
    /// Returns [`TimeError::OutOfRange`] when the converted value is not representable.
    pub fn truncate(self, value: OffsetDateTime) -> Result<OffsetDateTime, TimeError> {
        self.from_unix_millis(to_unix_millis(value))
    }

    /// Decodes stored epoch milliseconds into the reference offset.
    ///
    /// # Errors
    ///
    /// Returns [`TimeError::OutOfRange`] when the value is not representable.
    pub fn from_unix_millis(self, millis: i64) -> Result<OffsetDateTime, TimeError> {
        let nanos = i128::from(millis) * 1_000_000;
        let utc = OffsetDateTime::from_unix_timestamp_nanos(nanos)
            .map_err(|_| TimeError::OutOfRange(millis))?;
        utc.checked_to_offset(self.0).ok_or(TimeError::OutOfRange(millis))
    }
}

/// Encodes a timestamp as unix epoch milliseconds (sub-millisecond truncated).
#[must_use]
pub fn to_unix_millis(value: OffsetDateTime) -> i64 {
    value.unix_timestamp().saturating_mul(1_000).saturating_add(i64::from(value.millisecond()))
}
