// crates/market-store-core/src/runtime/locks.rs
// ============================================================================
// Module: Market Store Series Locks
// Description: Per-series mutual exclusion within one process.
// Purpose: Serialize overview read-modify-write sequences per series key.
// Dependencies: crate::core
// ============================================================================

//! ## Overview
//! The overview update is read, compute, write. Two saves to the same series
//! interleaving that sequence would lose one update, so the orchestrator
//! holds the series lock across the whole save. Locks of different series
//! are independent. Writers in other processes are not covered.
//!
//! Entries are created on first use and kept for live series; deleting a
//! series releases its entry.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::PoisonError;

use crate::core::SeriesKey;

// ============================================================================
// SECTION: Series Locks
// ============================================================================

/// Lazily populated map of one mutex per series key.
#[derive(Debug, Default)]
pub struct SeriesLocks {
    /// Lock handles by ledger key.
    handles: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl SeriesLocks {
    /// Creates an empty lock map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the lock handle of a series, creating it on first use.
    ///
    /// The guarded value is `()`, so a poisoned lock carries no broken state
    /// and is recovered rather than reported.
    #[must_use]
    pub fn handle(&self, key: &SeriesKey) -> Arc<Mutex<()>> {
        let mut handles = self.handles.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(handles.entry(key.ledger_key()).or_default())
    }

    /// Drops the map entry of a series once nobody else holds its handle.
    ///
    /// Call after the guard of `handle` is released. An entry another thread
    /// still holds or waits on is kept, so that thread and later callers keep
    /// sharing one mutex.
    pub fn release(&self, key: &SeriesKey, handle: Arc<Mutex<()>>) {
        let mut handles = self.handles.lock().unwrap_or_else(PoisonError::into_inner);
        if Arc::strong_count(&handle) <= 2 {
            handles.remove(&key.ledger_key());
        }
    }

    /// Returns the number of series with a live lock entry.
    #[must_use]
    pub fn len(&self) -> usize {
        self.handles.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Returns true when no series has a live lock entry.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
