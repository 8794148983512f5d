// crates/market-store-config/src/lib.rs
// ============================================================================
// Module: Market Store Config Library
// Description: Canonical config model, loading, and validation.
// Purpose: Single source of truth for market-store.toml semantics.
// Dependencies: market-store-core, market-store-sqlite, serde, toml
// ============================================================================

//! ## Overview
//! `market-store-config` defines the configuration model for the market
//! store binary: reference zone, `SQLite` store settings, overview ledger
//! backend, ingestion chunking, and logging filter. Validation is strict and
//! fails closed.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod config;
pub mod examples;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use config::*;
pub use examples::config_toml_example;
