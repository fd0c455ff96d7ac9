//! Partition planner.
//!
//! # Invariants
//! - Partitions are consecutive, order-preserving and hold at most
//!   `max_size` elements each.
//! - Every task gets its own copy of the base arguments with only the split
//!   key rebound.
//! - An empty collection plans no tasks at all.

use crate::spliterator::task::Task;
use crate::spliterator::value::{ArgValue, Arguments};
use std::num::NonZeroUsize;
use std::sync::Arc;

/// Splits `collection` into tasks of at most `max_size` elements.
///
/// A collection that already fits produces a single task bound to the whole
/// collection. No upper bound is placed on the number of tasks.
pub fn plan(
    split_key: &str,
    collection: &[ArgValue],
    max_size: NonZeroUsize,
    base_arguments: &Arguments,
    query: &str,
) -> Vec<Task> {
    if collection.is_empty() {
        return Vec::new();
    }

    let query: Arc<str> = Arc::from(query);
    collection
        .chunks(max_size.get())
        .enumerate()
        .map(|(index, chunk)| {
            let mut arguments = base_arguments.clone();
            arguments.insert(split_key.to_string(), ArgValue::List(chunk.to_vec()));
            Task::new(index, Arc::clone(&query), arguments)
        })
        .collect()
}

/// Number of tasks `plan` produces for a collection of `len` elements.
pub fn partition_count(len: usize, max_size: NonZeroUsize) -> usize {
    len.div_ceil(max_size.get())
}
