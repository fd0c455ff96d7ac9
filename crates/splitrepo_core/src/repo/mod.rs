//! Repository layer: data sources, their registry and record persistence.
//!
//! # Responsibility
//! - Own SQLite access details behind data source and repository APIs.
//! - Split collection-bound statements through the query spliterator.
//!
//! # Invariants
//! - Repository writes enforce `NewRecord::validate()` before persistence.
//! - Every data source is migrated before it is registered.

pub mod datasource;
pub mod record_repo;
pub mod registry;
