//! Fluent partition-and-run builder.
//!
//! ```ignore
//! let records: Vec<Record> = QuerySpliterator::of(&env)
//!     .query("SELECT id, name FROM records WHERE id IN (:ids) ORDER BY id ASC")
//!     .split_by("ids", ids, 100)
//!     .find_many(&store_read)?;
//! ```

use crate::error::{RepoError, RepoResult};
use crate::spliterator::context::ExecContext;
use crate::spliterator::env::SpliteratorEnv;
use crate::spliterator::planner::plan;
use crate::spliterator::scheduler::{merge_queries, Comparator};
use crate::spliterator::task::{FindMany, Task, UpdateMany};
use crate::spliterator::value::{ArgValue, Arguments};
use log::{debug, info, warn};
use std::cmp::Ordering;
use std::num::NonZeroUsize;
use std::time::Instant;

struct SplitSpec {
    key: String,
    values: Vec<ArgValue>,
    max_size: usize,
}

/// Builder for one logical query or update over a possibly large collection.
///
/// Collections that fit in one partition run directly on the calling thread;
/// larger ones are fanned out through the [`SpliteratorEnv`]. A comparator set
/// with [`sort_by`](Self::sort_by) orders the result on both paths, including
/// single-partition runs.
pub struct QuerySpliterator<'e, R> {
    env: &'e SpliteratorEnv,
    query: Option<String>,
    arguments: Arguments,
    split: Option<SplitSpec>,
    comparator: Option<Box<Comparator<R>>>,
    context: Option<ExecContext>,
}

impl<'e, R> QuerySpliterator<'e, R> {
    /// Starts a read builder producing records of type `R`.
    pub fn of(env: &'e SpliteratorEnv) -> Self {
        Self {
            env,
            query: None,
            arguments: Arguments::new(),
            split: None,
            comparator: None,
            context: None,
        }
    }

    pub fn query(mut self, query: impl Into<String>) -> Self {
        self.query = Some(query.into());
        self
    }

    pub fn arg(mut self, key: impl Into<String>, value: impl Into<ArgValue>) -> Self {
        self.arguments.insert(key.into(), value.into());
        self
    }

    pub fn args<K, V, I>(mut self, arguments: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<ArgValue>,
    {
        self.arguments.extend(
            arguments
                .into_iter()
                .map(|(key, value)| (key.into(), value.into())),
        );
        self
    }

    /// Declares the argument to partition and the largest partition size.
    pub fn split_by<I, T>(mut self, key: impl Into<String>, values: I, max_size: usize) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<ArgValue>,
    {
        self.split = Some(SplitSpec {
            key: key.into(),
            values: values.into_iter().map(Into::into).collect(),
            max_size,
        });
        self
    }

    /// Sorts the merged result; overrides partition order.
    pub fn sort_by<F>(mut self, compare: F) -> Self
    where
        F: Fn(&R, &R) -> Ordering + Send + Sync + 'static,
    {
        self.comparator = Some(Box::new(compare));
        self
    }

    /// Runs under the caller's context instead of a generated one.
    pub fn context(mut self, context: ExecContext) -> Self {
        self.context = Some(context);
        self
    }

    pub fn correlation_id(self, correlation_id: impl Into<String>) -> Self {
        self.context(ExecContext::new(correlation_id))
    }

    /// Executes the read through `callback` and merges partition results.
    pub fn find_many<C>(self, callback: &C) -> RepoResult<Vec<R>>
    where
        R: Send,
        C: FindMany<R> + ?Sized,
    {
        let comparator = self.comparator;
        let env = self.env;
        let prepared = Prepared::new(self.query, self.arguments, self.split, self.context)?;
        let ctx = prepared.ctx;
        let partitions = prepared.tasks.len();

        match partitions {
            0 => Ok(Vec::new()),
            1 => {
                let records = prepared
                    .tasks
                    .into_iter()
                    .map(|task| task.fetch::<R, C>(&ctx, callback))
                    .collect();
                merge_queries(records, comparator.as_deref())
            }
            _ => {
                let started_at = Instant::now();
                info!(
                    "event=spliterator_query module=spliterator status=start {ctx} partitions={partitions}"
                );
                let records =
                    env.submit_queries(&ctx, prepared.tasks, callback, comparator.as_deref())?;
                info!(
                    "event=spliterator_query module=spliterator status=ok {ctx} partitions={partitions} rows={} duration_ms={}",
                    records.len(),
                    started_at.elapsed().as_millis()
                );
                Ok(records)
            }
        }
    }

    /// Executes the write through `callback` and sums affected rows.
    pub fn execute_update<C>(self, callback: &C) -> RepoResult<usize>
    where
        C: UpdateMany + ?Sized,
    {
        let env = self.env;
        let prepared = Prepared::new(self.query, self.arguments, self.split, self.context)?;
        let ctx = prepared.ctx;
        let partitions = prepared.tasks.len();

        match partitions {
            0 => Ok(0),
            1 => prepared
                .tasks
                .into_iter()
                .try_fold(0_usize, |total, task| {
                    task.apply(&ctx, callback).map(|affected| total + affected)
                }),
            _ => {
                let started_at = Instant::now();
                info!(
                    "event=spliterator_update module=spliterator status=start {ctx} partitions={partitions}"
                );
                let affected = env.submit_updates(&ctx, prepared.tasks, callback)?;
                info!(
                    "event=spliterator_update module=spliterator status=ok {ctx} partitions={partitions} affected={affected} duration_ms={}",
                    started_at.elapsed().as_millis()
                );
                Ok(affected)
            }
        }
    }
}

impl<'e> QuerySpliterator<'e, ()> {
    /// Starts a builder for a split update.
    pub fn for_update(env: &'e SpliteratorEnv) -> Self {
        Self::of(env)
    }
}

struct Prepared {
    ctx: ExecContext,
    tasks: Vec<Task>,
}

impl Prepared {
    fn new(
        query: Option<String>,
        arguments: Arguments,
        split: Option<SplitSpec>,
        context: Option<ExecContext>,
    ) -> RepoResult<Self> {
        let query = query
            .filter(|query| !query.trim().is_empty())
            .ok_or_else(|| RepoError::InvalidRequest("query text is not set".to_string()))?;
        let split = split.ok_or_else(|| {
            RepoError::InvalidRequest("split key and collection are not set".to_string())
        })?;
        if split.key.trim().is_empty() {
            return Err(RepoError::InvalidRequest(
                "split key cannot be empty".to_string(),
            ));
        }
        let max_size = NonZeroUsize::new(split.max_size).ok_or_else(|| {
            RepoError::InvalidRequest("max partition size must be larger than zero".to_string())
        })?;

        let ctx = context.unwrap_or_else(ExecContext::generate);
        if arguments.contains_key(&split.key) {
            warn!(
                "event=spliterator_plan module=spliterator status=warn {ctx} reason=split_key_overrides_argument key={}",
                split.key
            );
        }

        let tasks = plan(&split.key, &split.values, max_size, &arguments, &query);
        debug!(
            "event=spliterator_plan module=spliterator status=ok {ctx} elements={} max_size={} partitions={}",
            split.values.len(),
            max_size,
            tasks.len()
        );
        Ok(Self { ctx, tasks })
    }
}

#[cfg(test)]
mod tests {
    use super::QuerySpliterator;
    use crate::error::{RepoError, RepoResult};
    use crate::spliterator::context::ExecContext;
    use crate::spliterator::env::SpliteratorEnv;
    use crate::spliterator::value::Arguments;

    fn echo(_: &ExecContext, _: &str, arguments: &Arguments) -> RepoResult<Vec<i64>> {
        Ok(arguments["ids"]
            .as_list()
            .unwrap_or(&[])
            .iter()
            .filter_map(|value| value.as_i64())
            .collect())
    }

    #[test]
    fn missing_query_is_invalid_request() {
        let env = SpliteratorEnv::new();
        let err = QuerySpliterator::<i64>::of(&env)
            .split_by("ids", vec![1_i64], 10)
            .find_many(&echo)
            .expect_err("query text is required");
        assert!(matches!(err, RepoError::InvalidRequest(_)));
    }

    #[test]
    fn missing_split_is_invalid_request() {
        let env = SpliteratorEnv::new();
        let err = QuerySpliterator::<i64>::of(&env)
            .query("SELECT 1")
            .find_many(&echo)
            .expect_err("split declaration is required");
        assert!(matches!(err, RepoError::InvalidRequest(_)));
    }

    #[test]
    fn zero_max_size_is_invalid_request() {
        let env = SpliteratorEnv::new();
        let err = QuerySpliterator::<i64>::of(&env)
            .query("SELECT 1")
            .split_by("ids", vec![1_i64], 0)
            .find_many(&echo)
            .expect_err("zero partition size is rejected");
        assert!(matches!(err, RepoError::InvalidRequest(_)));
    }

    #[test]
    fn single_partition_runs_without_environment() {
        let env = SpliteratorEnv::new();
        let records = QuerySpliterator::<i64>::of(&env)
            .query("SELECT id FROM records WHERE id IN (:ids)")
            .split_by("ids", vec![3_i64, 1, 2], 10)
            .find_many(&echo)
            .expect("small collections bypass the pool");
        assert_eq!(records, vec![3, 1, 2]);
    }

    #[test]
    fn single_partition_still_applies_comparator() {
        let env = SpliteratorEnv::new();
        let records = QuerySpliterator::<i64>::of(&env)
            .query("SELECT id FROM records WHERE id IN (:ids)")
            .split_by("ids", vec![3_i64, 1, 2], 10)
            .sort_by(|left: &i64, right: &i64| left.cmp(right))
            .find_many(&echo)
            .expect("small collections bypass the pool");
        assert_eq!(records, vec![1, 2, 3]);
    }

    #[test]
    fn multiple_partitions_require_running_environment() {
        let env = SpliteratorEnv::new();
        let err = QuerySpliterator::<i64>::of(&env)
            .query("SELECT id FROM records WHERE id IN (:ids)")
            .split_by("ids", vec![1_i64, 2, 3], 1)
            .find_many(&echo)
            .expect_err("split path needs the pool");
        assert!(matches!(err, RepoError::NotInitialized));
    }
}
