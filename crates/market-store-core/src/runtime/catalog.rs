// crates/market-store-core/src/runtime/catalog.rs
// ============================================================================
// Module: Market Store Table Catalog
// Description: Template and per-series table provisioning.
// Purpose: Create shared templates once and physical tables lazily per series.
// Dependencies: crate::core, crate::interfaces, tracing
// ============================================================================

//! ## Overview
//! The catalog issues create-if-absent statements only. Table identifiers
//! come from [`SeriesKey::table_name`], which is deterministic and injective
//! over validated keys, so calling [`TableCatalog::ensure_table`] on every
//! write is safe. Zeroed overview tags are set by the store at creation and
//! are never touched again by the catalog.

// ============================================================================
// SECTION: Imports
// ============================================================================

use tracing::debug;

use crate::core::RecordKind;
use crate::core::SeriesKey;
use crate::core::TableName;
use crate::interfaces::SeriesStore;
use crate::interfaces::Statement;
use crate::interfaces::StoreError;

// ============================================================================
// SECTION: Table Catalog
// ============================================================================

/// Stateless provisioning of templates and physical tables.
#[derive(Debug, Clone, Copy, Default)]
pub struct TableCatalog;

impl TableCatalog {
    /// Creates the bar and tick templates if absent.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when template creation fails.
    pub fn ensure_templates<S>(self, store: &S) -> Result<(), StoreError>
    where
        S: SeriesStore + ?Sized,
    {
        for kind in [RecordKind::Bar, RecordKind::Tick] {
            debug!(template = kind.template_name(), "ensuring template");
            store.execute(&Statement::CreateTemplate {
                kind,
            })?;
        }
        Ok(())
    }

    /// Creates the physical table of a series if absent and returns its name.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::SchemaConflict`] when the identifier is taken by
    /// a table of another template, or any other store failure.
    pub fn ensure_table<S>(self, store: &S, key: &SeriesKey) -> Result<TableName, StoreError>
    where
        S: SeriesStore + ?Sized,
    {
        let table = key.table_name();
        debug!(table = %table, "ensuring series table");
        store.execute(&Statement::CreateTable {
            table: table.clone(),
            key: key.clone(),
        })?;
        Ok(table)
    }
}
