//! Fan-out/fan-in over the shared worker pool.
//!
//! # Responsibility
//! - Spawn every partition task onto the pool at once.
//! - Join partial results in submission order and merge them.
//!
//! # Invariants
//! - Merge order is submission order, never completion order.
//! - The first failing partition (in submission order) fails the whole call;
//!   siblings run to completion and their results are dropped.
//! - Zero or one task never touches the pool.

use crate::error::{RepoError, RepoResult};
use crate::logging::panic_message;
use crate::spliterator::context::ExecContext;
use crate::spliterator::task::{FindMany, Task, UpdateMany};
use log::{error, trace, warn};
use rayon::ThreadPool;
use std::cmp::Ordering;
use std::panic::{self, AssertUnwindSafe};

/// Ordering applied to merged query results.
pub type Comparator<R> = dyn Fn(&R, &R) -> Ordering + Send + Sync;

/// Runs read tasks and concatenates their records.
pub(crate) fn run_queries<R, C>(
    pool: &ThreadPool,
    ctx: &ExecContext,
    tasks: Vec<Task>,
    callback: &C,
    comparator: Option<&Comparator<R>>,
) -> RepoResult<Vec<R>>
where
    R: Send,
    C: FindMany<R> + ?Sized,
{
    let partials = fan_out(pool, ctx, tasks, |task, unit_ctx| {
        task.fetch::<R, C>(unit_ctx, callback)
    });
    merge_queries(partials, comparator).inspect_err(|err| {
        warn!("event=spliterator_merge module=spliterator status=error mode=query {ctx} error={err}");
    })
}

/// Runs write tasks and sums their affected-row counts.
pub(crate) fn run_updates<C>(
    pool: &ThreadPool,
    ctx: &ExecContext,
    tasks: Vec<Task>,
    callback: &C,
) -> RepoResult<usize>
where
    C: UpdateMany + ?Sized,
{
    let partials = fan_out(pool, ctx, tasks, |task, unit_ctx| {
        task.apply(unit_ctx, callback)
    });
    merge_updates(partials).inspect_err(|err| {
        warn!("event=spliterator_merge module=spliterator status=error mode=update {ctx} error={err}");
    })
}

/// Concatenates partial record lists in the given order, then applies the
/// comparator when one is set.
pub fn merge_queries<R>(
    partials: Vec<RepoResult<Vec<R>>>,
    comparator: Option<&Comparator<R>>,
) -> RepoResult<Vec<R>> {
    let mut merged = Vec::new();
    for partial in partials {
        merged.extend(partial?);
    }
    if let Some(compare) = comparator {
        merged.sort_by(|left, right| compare(left, right));
    }
    Ok(merged)
}

/// Sums partial affected-row counts.
pub fn merge_updates(partials: Vec<RepoResult<usize>>) -> RepoResult<usize> {
    partials
        .into_iter()
        .try_fold(0_usize, |total, partial| partial.map(|count| total + count))
}

fn fan_out<T, F>(
    pool: &ThreadPool,
    ctx: &ExecContext,
    tasks: Vec<Task>,
    run: F,
) -> Vec<RepoResult<T>>
where
    T: Send,
    F: Fn(Task, &ExecContext) -> RepoResult<T> + Sync,
{
    if tasks.len() <= 1 {
        return tasks
            .into_iter()
            .map(|task| run_unit(ctx, task, &run))
            .collect();
    }

    let mut slots: Vec<Option<RepoResult<T>>> = Vec::with_capacity(tasks.len());
    slots.resize_with(tasks.len(), || None);

    pool.scope(|scope| {
        let run = &run;
        for (task, slot) in tasks.into_iter().zip(slots.iter_mut()) {
            scope.spawn(move |_| {
                *slot = Some(run_unit(ctx, task, run));
            });
        }
    });

    slots
        .into_iter()
        .enumerate()
        .map(|(index, slot)| {
            slot.unwrap_or_else(|| {
                Err(RepoError::TaskPanicked {
                    partition: index,
                    message: "partition finished without a result".to_string(),
                })
            })
        })
        .collect()
}

fn run_unit<T, F>(ctx: &ExecContext, task: Task, run: &F) -> RepoResult<T>
where
    F: Fn(Task, &ExecContext) -> RepoResult<T>,
{
    let partition = task.index();
    let unit_ctx = ctx.for_partition(partition);
    trace!(
        "event=spliterator_unit module=spliterator status=start {unit_ctx} worker={}",
        std::thread::current().name().unwrap_or("caller")
    );

    match panic::catch_unwind(AssertUnwindSafe(|| run(task, &unit_ctx))) {
        Ok(result) => result,
        Err(payload) => {
            let message = panic_message(payload.as_ref());
            error!(
                "event=spliterator_unit module=spliterator status=error {unit_ctx} error_code=task_panicked payload={message}"
            );
            Err(RepoError::TaskPanicked { partition, message })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{fan_out, merge_queries, merge_updates, Comparator};
    use crate::error::RepoError;
    use crate::spliterator::context::ExecContext;
    use crate::spliterator::planner::plan;
    use crate::spliterator::value::{ArgValue, Arguments};
    use std::num::NonZeroUsize;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;
    use std::time::Duration;

    fn pool(threads: usize) -> rayon::ThreadPool {
        rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build()
            .expect("test pool should build")
    }

    #[test]
    fn query_merge_concatenates_in_submission_order() {
        let merged = merge_queries(vec![Ok(vec![1, 2]), Ok(vec![]), Ok(vec![3])], None)
            .expect("merge should succeed");
        assert_eq!(merged, vec![1, 2, 3]);
    }

    #[test]
    fn query_merge_sorts_with_comparator() {
        let descending: &Comparator<i32> = &|left: &i32, right: &i32| right.cmp(left);
        let merged = merge_queries(vec![Ok(vec![1, 5]), Ok(vec![3, 9])], Some(descending))
            .expect("merge should succeed");
        assert_eq!(merged, vec![9, 5, 3, 1]);
    }

    #[test]
    fn update_merge_sums_counts() {
        assert_eq!(merge_updates(vec![Ok(3), Ok(5), Ok(0)]).expect("sum"), 8);
        assert_eq!(merge_updates(Vec::new()).expect("empty sum"), 0);
    }

    #[test]
    fn merge_reports_first_failure_in_submission_order() {
        let err = merge_updates(vec![
            Ok(1),
            Err(RepoError::InvalidData("first".to_string())),
            Err(RepoError::InvalidData("second".to_string())),
        ])
        .expect_err("merge should fail");
        assert!(matches!(err, RepoError::InvalidData(message) if message == "first"));
    }

    #[test]
    fn fan_out_preserves_order_when_completion_order_differs() {
        let collection: Vec<ArgValue> = (0..8).map(ArgValue::Integer).collect();
        let tasks = plan(
            "ids",
            &collection,
            NonZeroUsize::new(1).expect("positive"),
            &Arguments::new(),
            "q",
        );
        let ctx = ExecContext::new("order");

        let results = fan_out(&pool(4), &ctx, tasks, |task, unit_ctx| {
            let index = task.index();
            thread::sleep(Duration::from_millis(((8 - index) * 5) as u64));
            assert_eq!(unit_ctx.partition(), Some(index));
            Ok(index)
        });

        let order: Vec<usize> = results.into_iter().map(|r| r.expect("ok")).collect();
        assert_eq!(order, (0..8).collect::<Vec<_>>());
    }

    #[test]
    fn siblings_run_to_completion_when_one_fails() {
        let collection: Vec<ArgValue> = (0..6).map(ArgValue::Integer).collect();
        let tasks = plan(
            "ids",
            &collection,
            NonZeroUsize::new(1).expect("positive"),
            &Arguments::new(),
            "q",
        );
        let finished = AtomicUsize::new(0);

        let results = fan_out(&pool(3), &ExecContext::new("fail"), tasks, |task, _| {
            if task.index() == 0 {
                return Err(RepoError::InvalidData("boom".to_string()));
            }
            thread::sleep(Duration::from_millis(10));
            finished.fetch_add(1, Ordering::SeqCst);
            Ok(1_usize)
        });

        assert_eq!(finished.load(Ordering::SeqCst), 5);
        assert!(matches!(merge_updates(results), Err(RepoError::InvalidData(_))));
    }

    #[test]
    fn panicking_unit_becomes_task_error() {
        let collection: Vec<ArgValue> = (0..2).map(ArgValue::Integer).collect();
        let tasks = plan(
            "ids",
            &collection,
            NonZeroUsize::new(1).expect("positive"),
            &Arguments::new(),
            "q",
        );

        let results = fan_out(&pool(2), &ExecContext::new("panic"), tasks, |task, _| {
            if task.index() == 1 {
                panic!("store exploded");
            }
            Ok(1_usize)
        });

        let err = merge_updates(results).expect_err("panic should fail the merge");
        assert!(matches!(
            err,
            RepoError::TaskPanicked { partition: 1, ref message } if message.contains("store exploded")
        ));
    }
}
