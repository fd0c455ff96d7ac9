//! Bounded parallel query/update partitioner.
//!
//! # Responsibility
//! - Split one logical query or update over a large collection into bounded
//!   partitions.
//! - Run partitions concurrently on a shared work-stealing pool.
//! - Recombine partial results deterministically: ordered concatenation for
//!   reads, summation for writes.
//!
//! # Invariants
//! - Small collections take a single synchronous task and never touch the
//!   pool.
//! - Merge order is submission order unless a comparator is set.
//! - A failing partition fails the whole call; siblings are not cancelled.

pub mod builder;
pub mod context;
pub mod env;
pub mod planner;
pub mod scheduler;
pub mod task;
pub mod value;

pub use builder::QuerySpliterator;
pub use context::ExecContext;
pub use env::{effective_parallelism, EnvStatus, SpliteratorEnv};
pub use planner::{partition_count, plan};
pub use scheduler::{merge_queries, merge_updates, Comparator};
pub use task::{FindMany, Task, UpdateMany};
pub use value::{ArgValue, Arguments};
