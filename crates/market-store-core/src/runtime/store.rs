// crates/market-store-core/src/runtime/store.rs
// ============================================================================
// Module: Market Store In-Memory Backends
// Description: In-memory series store and overview ledgers.
// Purpose: Provide deterministic backends for tests and local demos.
// Dependencies: crate::core, crate::interfaces
// ============================================================================

//! ## Overview
//! [`InMemorySeriesStore`] emulates a tag-partitioned store: templates must
//! exist before tables are created from them, each table keeps its identity
//! and overview tags, and rows are keyed by timestamp so a duplicate
//! timestamp replaces the stored row. [`InMemoryOverviewLedger`] is a keyed
//! ledger, and [`SharedOverviewLedger`] lets callers pick a ledger backend at
//! runtime. None of these are intended for production use.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;

use crate::core::RecordKind;
use crate::core::SeriesKey;
use crate::core::SeriesOverview;
use crate::core::TableName;
use crate::interfaces::LedgerError;
use crate::interfaces::OverviewLedger;
use crate::interfaces::OverviewTags;
use crate::interfaces::Row;
use crate::interfaces::SeriesStore;
use crate::interfaces::Statement;
use crate::interfaces::StoreError;
use crate::interfaces::Value;

// ============================================================================
// SECTION: In-Memory Series Store
// ============================================================================

/// One emulated physical table.
#[derive(Debug, Clone)]
struct MemoryTable {
    /// Identity tags.
    key: SeriesKey,
    /// Overview tags; `None` until first set.
    tags: Option<OverviewTags>,
    /// Rows keyed by timestamp (epoch milliseconds).
    rows: BTreeMap<i64, Row>,
}

/// Store contents guarded by one mutex.
#[derive(Debug, Default)]
struct MemoryState {
    /// Created templates.
    templates: BTreeSet<RecordKind>,
    /// Physical tables by identifier.
    tables: BTreeMap<String, MemoryTable>,
}

/// In-memory tag-partitioned series store for tests and examples.
#[derive(Debug, Default, Clone)]
pub struct InMemorySeriesStore {
    /// Shared store contents.
    state: Arc<Mutex<MemoryState>>,
}

impl InMemorySeriesStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the identifiers of all physical tables.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Unavailable`] when the store mutex is poisoned.
    pub fn table_names(&self) -> Result<Vec<String>, StoreError> {
        Ok(self.lock()?.tables.keys().cloned().collect())
    }

    /// Locks the store contents.
    fn lock(&self) -> Result<MutexGuard<'_, MemoryState>, StoreError> {
        self.state
            .lock()
            .map_err(|_| StoreError::Unavailable("series store mutex poisoned".to_string()))
    }
}

impl SeriesStore for InMemorySeriesStore {
    fn execute(&self, statement: &Statement) -> Result<(), StoreError> {
        let mut state = self.lock()?;
        match statement {
            Statement::CreateTemplate {
                kind,
            } => {
                state.templates.insert(*kind);
                Ok(())
            }
            Statement::CreateTable {
                table,
                key,
            } => create_table(&mut state, table, key),
            Statement::Insert {
                table,
                rows,
            } => insert_rows(table_mut(&mut state, table)?, rows),
            Statement::SetOverviewTags {
                table,
                tags,
            } => {
                table_mut(&mut state, table)?.tags = Some(*tags);
                Ok(())
            }
            Statement::DropTable {
                table,
            } => state
                .tables
                .remove(table.as_str())
                .map(|_| ())
                .ok_or_else(|| StoreError::TableNotFound(table.to_string())),
            _ => Err(StoreError::Statement(format!(
                "{} returns rows and cannot be executed",
                statement.label()
            ))),
        }
    }

    fn query(&self, statement: &Statement) -> Result<Vec<Row>, StoreError> {
        let state = self.lock()?;
        match statement {
            Statement::SelectOverviewTags {
                table,
            } => Ok(vec![tag_values(table_ref(&state, table)?)?]),
            Statement::SelectTemplateOverviews {
                kind,
            } => {
                let mut rows = Vec::new();
                for table in state.tables.values().filter(|table| table.key.kind() == *kind) {
                    let mut row = vec![
                        Value::Text(table.key.symbol().to_string()),
                        Value::Text(table.key.exchange().as_str().to_string()),
                        table
                            .key
                            .interval()
                            .map_or(Value::Null, |interval| Value::Text(interval.as_str().to_string())),
                    ];
                    row.extend(tag_values(table)?);
                    rows.push(row);
                }
                Ok(rows)
            }
            Statement::SelectRange {
                table,
                start,
                end,
            } => {
                let table = table_ref(&state, table)?;
                if start > end {
                    return Ok(Vec::new());
                }
                Ok(table.rows.range(*start ..= *end).map(|(_, row)| row.clone()).collect())
            }
            Statement::CountRows {
                table,
            } => {
                let count = i64::try_from(table_ref(&state, table)?.rows.len())
                    .map_err(|_| StoreError::Corrupt("row count overflow".to_string()))?;
                Ok(vec![vec![Value::Integer(count)]])
            }
            _ => Err(StoreError::Statement(format!(
                "{} returns no rows and cannot be queried",
                statement.label()
            ))),
        }
    }
}

/// Creates a table if absent; an existing identifier must carry the same key.
fn create_table(state: &mut MemoryState, table: &TableName, key: &SeriesKey) -> Result<(), StoreError> {
    let kind = key.kind();
    if !state.templates.contains(&kind) {
        return Err(StoreError::Statement(format!(
            "template {} does not exist",
            kind.template_name()
        )));
    }
    if let Some(existing) = state.tables.get(table.as_str()) {
        if existing.key != *key {
            return Err(StoreError::SchemaConflict(format!(
                "table {table} already exists for series {}",
                existing.key
            )));
        }
        return Ok(());
    }
    state.tables.insert(
        table.to_string(),
        MemoryTable {
            key: key.clone(),
            tags: None,
            rows: BTreeMap::new(),
        },
    );
    Ok(())
}

/// Validates every row, then upserts them by timestamp.
fn insert_rows(table: &mut MemoryTable, rows: &[Row]) -> Result<(), StoreError> {
    let arity = table.key.kind().columns().len();
    let mut keyed = Vec::with_capacity(rows.len());
    for row in rows {
        if row.len() != arity {
            return Err(StoreError::Invalid(format!(
                "row has {} columns, template has {arity}",
                row.len()
            )));
        }
        let Some(Value::Timestamp(timestamp)) = row.first() else {
            return Err(StoreError::Invalid("row does not start with a timestamp".to_string()));
        };
        keyed.push((*timestamp, row.clone()));
    }
    table.rows.extend(keyed);
    Ok(())
}

/// Looks up a table for reading.
fn table_ref<'a>(state: &'a MemoryState, table: &TableName) -> Result<&'a MemoryTable, StoreError> {
    state.tables.get(table.as_str()).ok_or_else(|| StoreError::TableNotFound(table.to_string()))
}

/// Looks up a table for writing.
fn table_mut<'a>(
    state: &'a mut MemoryState,
    table: &TableName,
) -> Result<&'a mut MemoryTable, StoreError> {
    state.tables.get_mut(table.as_str()).ok_or_else(|| StoreError::TableNotFound(table.to_string()))
}

/// Renders overview tags as `[start, end, count]`.
fn tag_values(table: &MemoryTable) -> Result<Row, StoreError> {
    let Some(tags) = table.tags else {
        return Ok(vec![Value::Null, Value::Null, Value::Integer(0)]);
    };
    let count = i64::try_from(tags.count)
        .map_err(|_| StoreError::Corrupt(format!("count tag overflow on {}", table.key)))?;
    Ok(vec![Value::Timestamp(tags.start), Value::Timestamp(tags.end), Value::Integer(count)])
}

// ============================================================================
// SECTION: In-Memory Overview Ledger
// ============================================================================

/// Keyed in-memory overview ledger for tests and examples.
#[derive(Debug, Default, Clone)]
pub struct InMemoryOverviewLedger {
    /// Overviews by ledger key.
    entries: Arc<Mutex<BTreeMap<String, SeriesOverview>>>,
}

impl InMemoryOverviewLedger {
    /// Creates an empty ledger.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Locks the ledger entries.
    fn lock(&self) -> Result<MutexGuard<'_, BTreeMap<String, SeriesOverview>>, LedgerError> {
        self.entries
            .lock()
            .map_err(|_| LedgerError::Unavailable("overview ledger mutex poisoned".to_string()))
    }
}

impl OverviewLedger for InMemoryOverviewLedger {
    fn read(&self, key: &SeriesKey) -> Result<Option<SeriesOverview>, LedgerError> {
        Ok(self.lock()?.get(&key.ledger_key()).filter(|overview| !overview.is_empty()).cloned())
    }

    fn write(&self, overview: &SeriesOverview) -> Result<(), LedgerError> {
        self.lock()?.insert(overview.key.ledger_key(), overview.clone());
        Ok(())
    }

    fn delete(&self, key: &SeriesKey) -> Result<(), LedgerError> {
        self.lock()?.remove(&key.ledger_key());
        Ok(())
    }

    fn list(&self, kind: RecordKind) -> Result<Vec<SeriesOverview>, LedgerError> {
        Ok(self
            .lock()?
            .values()
            .filter(|overview| overview.key.kind() == kind && !overview.is_empty())
            .cloned()
            .collect())
    }
}

// ============================================================================
// SECTION: Shared Ledger Wrapper
// ============================================================================

/// Shared overview ledger backed by an `Arc` trait object.
#[derive(Clone)]
pub struct SharedOverviewLedger {
    /// Inner ledger implementation.
    inner: Arc<dyn OverviewLedger + Send + Sync>,
}

impl SharedOverviewLedger {
    /// Wraps an overview ledger in a shared, clonable wrapper.
    #[must_use]
    pub fn from_ledger(ledger: impl OverviewLedger + Send + Sync + 'static) -> Self {
        Self {
            inner: Arc::new(ledger),
        }
    }

    /// Wraps an existing shared ledger.
    #[must_use]
    pub const fn new(ledger: Arc<dyn OverviewLedger + Send + Sync>) -> Self {
        Self {
            inner: ledger,
        }
    }
}

impl OverviewLedger for SharedOverviewLedger {
    fn read(&self, key: &SeriesKey) -> Result<Option<SeriesOverview>, LedgerError> {
        self.inner.read(key)
    }

    fn write(&self, overview: &SeriesOverview) -> Result<(), LedgerError> {
        self.inner.write(overview)
    }

    fn delete(&self, key: &SeriesKey) -> Result<(), LedgerError> {
        self.inner.delete(key)
    }

    fn list(&self, kind: RecordKind) -> Result<Vec<SeriesOverview>, LedgerError> {
        self.inner.list(kind)
    }
}
