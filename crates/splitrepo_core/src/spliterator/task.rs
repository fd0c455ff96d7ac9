//! Partition tasks and the store callbacks they run against.

use crate::error::RepoResult;
use crate::spliterator::context::ExecContext;
use crate::spliterator::value::Arguments;
use std::sync::Arc;

/// Store read callback invoked once per partition in query mode.
pub trait FindMany<R>: Sync {
    fn on_query(&self, ctx: &ExecContext, query: &str, arguments: &Arguments)
        -> RepoResult<Vec<R>>;
}

/// Store write callback invoked once per partition in update mode.
pub trait UpdateMany: Sync {
    fn on_update(&self, ctx: &ExecContext, query: &str, arguments: &Arguments)
        -> RepoResult<usize>;
}

impl<R, F> FindMany<R> for F
where
    F: Fn(&ExecContext, &str, &Arguments) -> RepoResult<Vec<R>> + Sync,
{
    fn on_query(
        &self,
        ctx: &ExecContext,
        query: &str,
        arguments: &Arguments,
    ) -> RepoResult<Vec<R>> {
        self(ctx, query, arguments)
    }
}

impl<F> UpdateMany for F
where
    F: Fn(&ExecContext, &str, &Arguments) -> RepoResult<usize> + Sync,
{
    fn on_update(
        &self,
        ctx: &ExecContext,
        query: &str,
        arguments: &Arguments,
    ) -> RepoResult<usize> {
        self(ctx, query, arguments)
    }
}

/// One deferred unit of work bound to a single partition.
///
/// Owns its argument copy; the query text is shared between siblings.
#[derive(Debug, Clone, PartialEq)]
pub struct Task {
    index: usize,
    query: Arc<str>,
    arguments: Arguments,
}

impl Task {
    pub(crate) fn new(index: usize, query: Arc<str>, arguments: Arguments) -> Self {
        Self {
            index,
            query,
            arguments,
        }
    }

    /// Position of this partition in submission order.
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn arguments(&self) -> &Arguments {
        &self.arguments
    }

    /// Runs the task as a read and consumes it.
    pub fn fetch<R, C>(self, ctx: &ExecContext, callback: &C) -> RepoResult<Vec<R>>
    where
        C: FindMany<R> + ?Sized,
    {
        callback.on_query(ctx, &self.query, &self.arguments)
    }

    /// Runs the task as a write and consumes it.
    pub fn apply<C>(self, ctx: &ExecContext, callback: &C) -> RepoResult<usize>
    where
        C: UpdateMany + ?Sized,
    {
        callback.on_update(ctx, &self.query, &self.arguments)
    }
}
