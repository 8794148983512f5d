// crates/market-store-sqlite/src/store.rs
// ============================================================================
// Module: SQLite Series Store
// Description: Tag-partitioned series store emulated on SQLite.
// Purpose: Render typed statements into parameterized SQLite queries.
// Dependencies: market-store-core, rusqlite, tracing
// ============================================================================

//! ## Overview
//! SQLite has no super tables, so templates are emulated:
//! - `series_templates` records which templates exist;
//! - `series_tags` holds one row per physical table with its identity tags
//!   and overview tags;
//! - each series gets its own table whose columns follow the template, keyed
//!   by `datetime` so a duplicate timestamp replaces the stored row.
//!
//! Series table names are case-sensitive while `SQLite` identifiers are not,
//! so `series_tags` maps each table name to a physical identifier. The
//! physical identifier equals the table name unless another identifier
//! already differs from it only by case; then a numeric suffix is added.
//!
//! Every value is bound as a parameter. Table identifiers come only from
//! validated series keys and are quoted.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::str::FromStr;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;

use market_store_core::Column;
use market_store_core::ColumnType;
use market_store_core::Interval;
use market_store_core::OverviewTags;
use market_store_core::RecordKind;
use market_store_core::Row;
use market_store_core::SeriesKey;
use market_store_core::SeriesStore;
use market_store_core::Statement;
use market_store_core::StoreError;
use market_store_core::TIMESTAMP_COLUMN;
use market_store_core::TableName;
use market_store_core::Value;
use rusqlite::Connection;
use rusqlite::OptionalExtension;
use rusqlite::params;
use rusqlite::params_from_iter;
use rusqlite::types::Value as SqlValue;
use tracing::debug;
use tracing::info;

use crate::connection::SqliteStoreConfig;
use crate::connection::SqliteStoreError;
use crate::connection::db_error;
use crate::connection::open_database;
use crate::connection::quote_identifier;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Series store schema version.
const SCHEMA_VERSION: i64 = 1;
/// Metadata table of the series store.
const META_TABLE: &str = "store_meta";
/// Template and tag registry schema.
const REGISTRY_SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS series_templates (
        kind TEXT PRIMARY KEY NOT NULL
    );
    CREATE TABLE IF NOT EXISTS series_tags (
        table_name TEXT PRIMARY KEY NOT NULL,
        physical_name TEXT NOT NULL UNIQUE COLLATE NOCASE,
        kind TEXT NOT NULL,
        symbol TEXT NOT NULL,
        exchange TEXT NOT NULL,
        interval_ TEXT,
        start_time INTEGER,
        end_time INTEGER,
        count_ INTEGER NOT NULL DEFAULT 0
    );
    CREATE INDEX IF NOT EXISTS series_tags_by_kind ON series_tags (kind, table_name);
";

// ============================================================================
// SECTION: Store
// ============================================================================

/// `SQLite`-backed series store.
///
/// # Invariants
/// - `SQLite` connection access is serialized through a mutex.
/// - Every series table has exactly one `series_tags` row.
/// - Physical identifiers are unique without regard to case.
#[derive(Clone)]
pub struct SqliteSeriesStore {
    /// Store configuration.
    config: SqliteStoreConfig,
    /// Shared connection guarded by a mutex.
    connection: Arc<Mutex<Connection>>,
}

impl SqliteSeriesStore {
    /// Opens (or creates) a series store.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError`] when the path is invalid, the file cannot
    /// be opened, or its schema version is incompatible.
    pub fn open(config: SqliteStoreConfig) -> Result<Self, SqliteStoreError> {
        let connection = open_database(&config, META_TABLE, SCHEMA_VERSION)?;
        connection.execute_batch(REGISTRY_SCHEMA).map_err(|err| db_error(&err))?;
        info!(path = %config.path.display(), "opened sqlite series store");
        Ok(Self {
            config,
            connection: Arc::new(Mutex::new(connection)),
        })
    }

    /// Returns the store configuration.
    #[must_use]
    pub const fn config(&self) -> &SqliteStoreConfig {
        &self.config
    }

    /// Locks the shared connection.
    fn lock(&self) -> Result<MutexGuard<'_, Connection>, SqliteStoreError> {
        self.connection
            .lock()
            .map_err(|_| SqliteStoreError::Unavailable("sqlite connection mutex poisoned".to_string()))
    }
}

impl SeriesStore for SqliteSeriesStore {
    fn execute(&self, statement: &Statement) -> Result<(), StoreError> {
        debug!(statement = statement.label(), "sqlite execute");
        let mut connection = self.lock()?;
        let result = match statement {
            Statement::CreateTemplate {
                kind,
            } => create_template(&connection, *kind),
            Statement::CreateTable {
                table,
                key,
            } => create_table(&mut connection, table, key),
            Statement::Insert {
                table,
                rows,
            } => insert_rows(&mut connection, table, rows),
            Statement::SetOverviewTags {
                table,
                tags,
            } => set_overview_tags(&connection, table, *tags),
            Statement::DropTable {
                table,
            } => drop_table(&mut connection, table),
            _ => {
                return Err(StoreError::Statement(format!(
                    "{} returns rows and cannot be executed",
                    statement.label()
                )));
            }
        };
        result.map_err(StoreError::from)
    }

    fn query(&self, statement: &Statement) -> Result<Vec<Row>, StoreError> {
        debug!(statement = statement.label(), "sqlite query");
        let connection = self.lock()?;
        let result = match statement {
            Statement::SelectOverviewTags {
                table,
            } => select_overview_tags(&connection, table).map(|row| vec![row]),
            Statement::SelectTemplateOverviews {
                kind,
            } => select_template_overviews(&connection, *kind),
            Statement::SelectRange {
                table,
                start,
                end,
            } => select_range(&connection, table, *start, *end),
            Statement::CountRows {
                table,
            } => count_rows(&connection, table).map(|count| vec![vec![Value::Integer(count)]]),
            _ => {
                return Err(StoreError::Statement(format!(
                    "{} returns no rows and cannot be queried",
                    statement.label()
                )));
            }
        };
        result.map_err(StoreError::from)
    }
}

// ============================================================================
// SECTION: Statement Rendering
// ============================================================================

/// Registers a template.
fn create_template(connection: &Connection, kind: RecordKind) -> Result<(), SqliteStoreError> {
    connection
        .execute("INSERT OR IGNORE INTO series_templates (kind) VALUES (?1)", params![kind.as_str()])
        .map_err(|err| db_error(&err))?;
    Ok(())
}

/// Creates and registers a series table unless it already exists for the key.
fn create_table(
    connection: &mut Connection,
    table: &TableName,
    key: &SeriesKey,
) -> Result<(), SqliteStoreError> {
    let kind = key.kind();
    let tx = connection.transaction().map_err(|err| db_error(&err))?;
    let template: Option<String> = tx
        .query_row("SELECT kind FROM series_templates WHERE kind = ?1", params![kind.as_str()], |row| {
            row.get(0)
        })
        .optional()
        .map_err(|err| db_error(&err))?;
    if template.is_none() {
        return Err(SqliteStoreError::Db(format!(
            "template {} does not exist",
            kind.template_name()
        )));
    }

    let existing: Option<(String, String, String, Option<String>)> = tx
        .query_row(
            "SELECT kind, symbol, exchange, interval_ FROM series_tags WHERE table_name = ?1",
            params![table.as_str()],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
        )
        .optional()
        .map_err(|err| db_error(&err))?;
    if let Some((existing_kind, symbol, exchange, interval)) = existing {
        let same_series = existing_kind == kind.as_str()
            && symbol == key.symbol()
            && exchange == key.exchange().as_str()
            && interval.as_deref() == key.interval().map(Interval::as_str);
        if !same_series {
            return Err(SqliteStoreError::Conflict(format!(
                "table {table} is registered for another series"
            )));
        }
        return Ok(());
    }

    let unregistered: bool = tx
        .query_row(
            "SELECT EXISTS (SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1)
               AND NOT EXISTS (SELECT 1 FROM series_tags WHERE physical_name = ?1)",
            params![table.as_str()],
            |row| row.get(0),
        )
        .map_err(|err| db_error(&err))?;
    if unregistered {
        return Err(SqliteStoreError::Conflict(format!(
            "table {table} exists outside the series registry"
        )));
    }

    let physical = free_physical_name(&tx, table)?;
    tx.execute_batch(&create_table_sql(&physical, kind)).map_err(|err| db_error(&err))?;
    tx.execute(
        "INSERT INTO series_tags (table_name, physical_name, kind, symbol, exchange, interval_, count_)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, 0)",
        params![
            table.as_str(),
            physical,
            kind.as_str(),
            key.symbol(),
            key.exchange().as_str(),
            key.interval().map(Interval::as_str),
        ],
    )
    .map_err(|err| db_error(&err))?;
    tx.commit().map_err(|err| db_error(&err))?;
    debug!(table = %table, physical = %physical, "created sqlite series table");
    Ok(())
}

/// Upserts rows in one transaction through a reused prepared statement.
fn insert_rows(
    connection: &mut Connection,
    table: &TableName,
    rows: &[Row],
) -> Result<(), SqliteStoreError> {
    let (kind, physical) = registered_table(connection, table)?;
    let columns = kind.columns();
    let names: Vec<String> = columns.iter().map(|column| quote_identifier(column.name)).collect();
    let placeholders: Vec<String> = (1 ..= columns.len()).map(|index| format!("?{index}")).collect();
    let sql = format!(
        "INSERT OR REPLACE INTO {} ({}) VALUES ({})",
        quote_identifier(&physical),
        names.join(", "),
        placeholders.join(", ")
    );

    let tx = connection.transaction().map_err(|err| db_error(&err))?;
    {
        let mut insert = tx.prepare(&sql).map_err(|err| db_error(&err))?;
        for row in rows {
            if row.len() != columns.len() {
                return Err(SqliteStoreError::Invalid(format!(
                    "row has {} columns, template has {}",
                    row.len(),
                    columns.len()
                )));
            }
            insert.execute(params_from_iter(row.iter().map(bind_value))).map_err(|err| db_error(&err))?;
        }
    }
    tx.commit().map_err(|err| db_error(&err))
}

/// Overwrites the overview tags of a table.
fn set_overview_tags(
    connection: &Connection,
    table: &TableName,
    tags: OverviewTags,
) -> Result<(), SqliteStoreError> {
    let count = i64::try_from(tags.count)
        .map_err(|_| SqliteStoreError::Invalid(format!("count tag overflow on {table}")))?;
    let changed = connection
        .execute(
            "UPDATE series_tags SET start_time = ?1, end_time = ?2, count_ = ?3 WHERE table_name = ?4",
            params![tags.start, tags.end, count, table.as_str()],
        )
        .map_err(|err| db_error(&err))?;
    if changed == 0 {
        return Err(SqliteStoreError::MissingTable(table.to_string()));
    }
    Ok(())
}

/// Drops a table and its tag row.
fn drop_table(connection: &mut Connection, table: &TableName) -> Result<(), SqliteStoreError> {
    let tx = connection.transaction().map_err(|err| db_error(&err))?;
    let (_, physical) = registered_table(&tx, table)?;
    tx.execute("DELETE FROM series_tags WHERE table_name = ?1", params![table.as_str()])
        .map_err(|err| db_error(&err))?;
    tx.execute_batch(&format!("DROP TABLE IF EXISTS {};", quote_identifier(&physical)))
        .map_err(|err| db_error(&err))?;
    tx.commit().map_err(|err| db_error(&err))
}

/// Reads `[start, end, count]` tags of a table.
fn select_overview_tags(connection: &Connection, table: &TableName) -> Result<Row, SqliteStoreError> {
    let tags: Option<(Option<i64>, Option<i64>, i64)> = connection
        .query_row(
            "SELECT start_time, end_time, count_ FROM series_tags WHERE table_name = ?1",
            params![table.as_str()],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
        )
        .optional()
        .map_err(|err| db_error(&err))?;
    let Some((start, end, count)) = tags else {
        return Err(SqliteStoreError::MissingTable(table.to_string()));
    };
    Ok(vec![timestamp_or_null(start), timestamp_or_null(end), Value::Integer(count)])
}

/// Reads identity and overview tags of every table of a template.
fn select_template_overviews(
    connection: &Connection,
    kind: RecordKind,
) -> Result<Vec<Row>, SqliteStoreError> {
    let mut select = connection
        .prepare(
            "SELECT symbol, exchange, interval_, start_time, end_time, count_
             FROM series_tags WHERE kind = ?1 ORDER BY table_name",
        )
        .map_err(|err| db_error(&err))?;
    let rows = select
        .query_map(params![kind.as_str()], |row| {
            let interval: Option<String> = row.get(2)?;
            Ok(vec![
                Value::Text(row.get(0)?),
                Value::Text(row.get(1)?),
                interval.map_or(Value::Null, Value::Text),
                timestamp_or_null(row.get(3)?),
                timestamp_or_null(row.get(4)?),
                Value::Integer(row.get(5)?),
            ])
        })
        .map_err(|err| db_error(&err))?;
    rows.collect::<Result<Vec<_>, _>>().map_err(|err| db_error(&err))
}

/// Reads rows with `start <= datetime <= end` in ascending order.
fn select_range(
    connection: &Connection,
    table: &TableName,
    start: i64,
    end: i64,
) -> Result<Vec<Row>, SqliteStoreError> {
    let (kind, physical) = registered_table(connection, table)?;
    let columns = kind.columns();
    let names: Vec<String> = columns.iter().map(|column| quote_identifier(column.name)).collect();
    let timestamp = quote_identifier(TIMESTAMP_COLUMN);
    let sql = format!(
        "SELECT {} FROM {} WHERE {timestamp} BETWEEN ?1 AND ?2 ORDER BY {timestamp} ASC",
        names.join(", "),
        quote_identifier(&physical),
    );
    let mut select = connection.prepare(&sql).map_err(|err| db_error(&err))?;
    let raw_rows = select
        .query_map(params![start, end], |row| {
            (0 .. columns.len()).map(|index| row.get::<_, SqlValue>(index)).collect::<Result<Vec<_>, _>>()
        })
        .map_err(|err| db_error(&err))?
        .collect::<Result<Vec<_>, _>>()
        .map_err(|err| db_error(&err))?;
    raw_rows
        .into_iter()
        .map(|raw| raw.into_iter().zip(columns).map(|(value, column)| read_value(column, value)).collect())
        .collect()
}

/// Counts rows of a registered table.
fn count_rows(connection: &Connection, table: &TableName) -> Result<i64, SqliteStoreError> {
    let (_, physical) = registered_table(connection, table)?;
    connection
        .query_row(&format!("SELECT COUNT(*) FROM {}", quote_identifier(&physical)), params![], |row| {
            row.get(0)
        })
        .map_err(|err| db_error(&err))
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Returns the template kind and physical identifier of a registered table.
fn registered_table(
    connection: &Connection,
    table: &TableName,
) -> Result<(RecordKind, String), SqliteStoreError> {
    let registered: Option<(String, String)> = connection
        .query_row(
            "SELECT kind, physical_name FROM series_tags WHERE table_name = ?1",
            params![table.as_str()],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .optional()
        .map_err(|err| db_error(&err))?;
    let Some((kind, physical)) = registered else {
        return Err(SqliteStoreError::MissingTable(table.to_string()));
    };
    let kind = RecordKind::from_str(&kind).map_err(|err| SqliteStoreError::Corrupt(err.to_string()))?;
    Ok((kind, physical))
}

/// Picks the first identifier in `table`, `table_2`, `table_3`, ... that no
/// schema object uses under case-insensitive comparison.
fn free_physical_name(connection: &Connection, table: &TableName) -> Result<String, SqliteStoreError> {
    let mut candidate = table.as_str().to_string();
    let mut suffix: u64 = 1;
    loop {
        let taken: bool = connection
            .query_row(
                "SELECT EXISTS (SELECT 1 FROM sqlite_master WHERE name = ?1 COLLATE NOCASE)
                    OR EXISTS (SELECT 1 FROM series_tags WHERE physical_name = ?1)",
                params![candidate],
                |row| row.get(0),
            )
            .map_err(|err| db_error(&err))?;
        if !taken {
            return Ok(candidate);
        }
        suffix = suffix.saturating_add(1);
        candidate = format!("{table}_{suffix}");
    }
}

/// Renders the DDL of a series table from its template.
fn create_table_sql(physical: &str, kind: RecordKind) -> String {
    let columns: Vec<String> = kind
        .columns()
        .iter()
        .map(|column| {
            if column.name == TIMESTAMP_COLUMN {
                format!("{} INTEGER PRIMARY KEY NOT NULL", quote_identifier(column.name))
            } else {
                format!("{} {}", quote_identifier(column.name), sql_type(column.column_type))
            }
        })
        .collect();
    format!("CREATE TABLE {} ({});", quote_identifier(physical), columns.join(", "))
}

/// Maps a template column type to an `SQLite` type.
const fn sql_type(column_type: ColumnType) -> &'static str {
    match column_type {
        ColumnType::Timestamp => "INTEGER",
        ColumnType::Double => "REAL",
        ColumnType::Text => "TEXT",
    }
}

/// Converts a statement value into an `SQLite` value.
fn bind_value(value: &Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Integer(value) | Value::Timestamp(value) => SqlValue::Integer(*value),
        Value::Double(value) => SqlValue::Real(*value),
        Value::Text(value) => SqlValue::Text(value.clone()),
    }
}

/// Converts a stored `SQLite` value into a template-typed value.
fn read_value(column: &Column, value: SqlValue) -> Result<Value, SqliteStoreError> {
    match (column.column_type, value) {
        (_, SqlValue::Null) => Ok(Value::Null),
        (ColumnType::Timestamp, SqlValue::Integer(value)) => Ok(Value::Timestamp(value)),
        (ColumnType::Double, SqlValue::Real(value)) => Ok(Value::Double(value)),
        (ColumnType::Text, SqlValue::Text(value)) => Ok(Value::Text(value)),
        _ => Err(SqliteStoreError::Corrupt(format!(
            "column {} has an unexpected storage class",
            column.name
        ))),
    }
}

/// Wraps an optional tag timestamp.
fn timestamp_or_null(value: Option<i64>) -> Value {
    value.map_or(Value::Null, Value::Timestamp)
}
