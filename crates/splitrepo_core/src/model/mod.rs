//! Domain records stored through the repository layer.
//!
//! # Invariants
//! - Every stored record is identified by a positive integer `RecordId`.
//! - Write inputs are validated before any SQL runs.

pub mod record;
