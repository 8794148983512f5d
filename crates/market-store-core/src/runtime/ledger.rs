// crates/market-store-core/src/runtime/ledger.rs
// ============================================================================
// Module: Market Store Tag Overview Ledger
// Description: Overview ledger backed by tags on the physical tables.
// Purpose: Keep each series overview next to its data in the series store.
// Dependencies: crate::core, crate::interfaces
// ============================================================================

//! ## Overview
//! [`TagOverviewLedger`] stores `{start, end, count}` as tags of the series'
//! physical table. Tags are zeroed when the table is created and disappear
//! when it is dropped, so [`OverviewLedger::delete`] has nothing to do and a
//! missing table reads as an absent overview.
//!
//! Security posture: tag rows come from the store and are validated before
//! being turned into keys and timestamps.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::str::FromStr;

use crate::core::Exchange;
use crate::core::Interval;
use crate::core::RecordKind;
use crate::core::ReferenceZone;
use crate::core::SeriesKey;
use crate::core::SeriesOverview;
use crate::core::to_unix_millis;
use crate::interfaces::LedgerError;
use crate::interfaces::OverviewLedger;
use crate::interfaces::OverviewTags;
use crate::interfaces::SeriesStore;
use crate::interfaces::Statement;
use crate::interfaces::StoreError;
use crate::interfaces::Value;

// ============================================================================
// SECTION: Tag Ledger
// ============================================================================

/// Overview ledger kept in physical-table tags.
#[derive(Debug, Clone)]
pub struct TagOverviewLedger<S> {
    /// Series store holding the tags.
    store: S,
    /// Zone used for decoded timestamps.
    zone: ReferenceZone,
}

impl<S> TagOverviewLedger<S>
where
    S: SeriesStore,
{
    /// Creates a tag ledger over a series store.
    #[must_use]
    pub const fn new(store: S, zone: ReferenceZone) -> Self {
        Self {
            store,
            zone,
        }
    }
}

impl<S> OverviewLedger for TagOverviewLedger<S>
where
    S: SeriesStore,
{
    fn read(&self, key: &SeriesKey) -> Result<Option<SeriesOverview>, LedgerError> {
        let statement = Statement::SelectOverviewTags {
            table: key.table_name(),
        };
        let rows = match self.store.query(&statement) {
            Ok(rows) => rows,
            Err(StoreError::TableNotFound(_)) => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        let Some(row) = rows.first() else {
            return Ok(None);
        };
        match row.as_slice() {
            [start, end, count] => decode_overview(key.clone(), start, end, count, self.zone),
            _ => Err(LedgerError::Corrupt(format!(
                "overview tags of {} have {} columns",
                key.table_name(),
                row.len()
            ))),
        }
    }

    fn write(&self, overview: &SeriesOverview) -> Result<(), LedgerError> {
        let statement = Statement::SetOverviewTags {
            table: overview.key.table_name(),
            tags: OverviewTags {
                start: to_unix_millis(overview.start),
                end: to_unix_millis(overview.end),
                count: overview.count,
            },
        };
        self.store.execute(&statement).map_err(LedgerError::from)
    }

    fn delete(&self, _key: &SeriesKey) -> Result<(), LedgerError> {
        Ok(())
    }

    fn list(&self, kind: RecordKind) -> Result<Vec<SeriesOverview>, LedgerError> {
        let rows = self.store.query(&Statement::SelectTemplateOverviews {
            kind,
        })?;
        let mut overviews = Vec::with_capacity(rows.len());
        for row in &rows {
            let [symbol, exchange, interval, start, end, count] = row.as_slice() else {
                return Err(LedgerError::Corrupt(format!(
                    "template overview row has {} columns",
                    row.len()
                )));
            };
            let key = decode_key(symbol, exchange, interval)?;
            if let Some(overview) = decode_overview(key, start, end, count, self.zone)? {
                overviews.push(overview);
            }
        }
        Ok(overviews)
    }
}

// ============================================================================
// SECTION: Tag Decoding
// ============================================================================

/// Rebuilds a series key from identity tags.
fn decode_key(symbol: &Value, exchange: &Value, interval: &Value) -> Result<SeriesKey, LedgerError> {
    let Value::Text(symbol) = symbol else {
        return Err(LedgerError::Corrupt("symbol tag is not text".to_string()));
    };
    let Value::Text(exchange) = exchange else {
        return Err(LedgerError::Corrupt("exchange tag is not text".to_string()));
    };
    let exchange = Exchange::from_str(exchange).map_err(|err| LedgerError::Corrupt(err.to_string()))?;
    let interval = match interval {
        Value::Null => None,
        Value::Text(interval) => {
            Some(Interval::from_str(interval).map_err(|err| LedgerError::Corrupt(err.to_string()))?)
        }
        _ => return Err(LedgerError::Corrupt("interval tag is not text".to_string())),
    };
    SeriesKey::new(symbol.clone(), exchange, interval)
        .map_err(|err| LedgerError::Corrupt(err.to_string()))
}

/// Rebuilds an overview from overview tags; zero count means absent.
fn decode_overview(
    key: SeriesKey,
    start: &Value,
    end: &Value,
    count: &Value,
    zone: ReferenceZone,
) -> Result<Option<SeriesOverview>, LedgerError> {
    let count = match count {
        Value::Integer(count) => u64::try_from(*count)
            .map_err(|_| LedgerError::Corrupt(format!("negative count tag on {key}")))?,
        Value::Null => 0,
        _ => return Err(LedgerError::Corrupt(format!("count tag of {key} is not an integer"))),
    };
    if count == 0 {
        return Ok(None);
    }
    let (Value::Timestamp(start), Value::Timestamp(end)) = (start, end) else {
        return Err(LedgerError::Corrupt(format!("bound tags of {key} are not timestamps")));
    };
    let start = zone.from_unix_millis(*start).map_err(|err| LedgerError::Corrupt(err.to_string()))?;
    let end = zone.from_unix_millis(*end).map_err(|err| LedgerError::Corrupt(err.to_string()))?;
    Ok(Some(SeriesOverview {
        key,
        start,
        end,
        count,
    }))
}
