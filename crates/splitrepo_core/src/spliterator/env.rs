//! Execution environment owning the shared worker pool.
//!
//! # Responsibility
//! - Build the work-stealing pool from `query-spliterator` configuration.
//! - Route multi-partition operations onto that pool.
//! - Drain in-flight work for a bounded time on close, then release the pool.
//!
//! # Invariants
//! - `worker-size` outside `1..=MAX_WORKER_SIZE` is rejected before any
//!   pool exists.
//! - Effective parallelism is `max(worker-size, hardware threads)`.
//! - Submissions before setup or after close fail with `NotInitialized`.
//! - A close timeout is logged and never retried.

use crate::config::SpliteratorConfig;
use crate::error::{ConfigError, RepoError, RepoResult};
use crate::logging::panic_message;
use crate::spliterator::context::ExecContext;
use crate::spliterator::scheduler::{self, Comparator};
use crate::spliterator::task::{FindMany, Task, UpdateMany};
use log::{error, info, warn};
use rayon::{ThreadPool, ThreadPoolBuilder};
use std::num::NonZeroUsize;
use std::sync::{Arc, Condvar, Mutex, RwLock};
use std::time::{Duration, Instant};

/// Largest accepted `worker-size`.
pub const MAX_WORKER_SIZE: i64 = 32767;

/// Observable lifecycle state of a [`SpliteratorEnv`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvStatus {
    Uninitialized,
    Running,
    Closed,
}

enum EnvState {
    Uninitialized,
    Running(RunningPool),
    Closed,
}

struct RunningPool {
    pool: Arc<ThreadPool>,
    parallelism: usize,
    shutdown_timeout: Duration,
}

/// Owner of the worker pool used by split queries and updates.
///
/// Constructed explicitly and shared by reference; the hosting application
/// calls [`setup`](Self::setup) at start and [`close`](Self::close) at stop.
pub struct SpliteratorEnv {
    state: RwLock<EnvState>,
    in_flight: InFlight,
}

impl Default for SpliteratorEnv {
    fn default() -> Self {
        Self::new()
    }
}

impl SpliteratorEnv {
    /// Creates an uninitialized environment.
    pub fn new() -> Self {
        Self {
            state: RwLock::new(EnvState::Uninitialized),
            in_flight: InFlight::default(),
        }
    }

    /// Creates an environment and sets it up in one step.
    pub fn started(config: &SpliteratorConfig) -> RepoResult<Self> {
        let env = Self::new();
        env.setup(config)?;
        Ok(env)
    }

    /// Builds the worker pool.
    ///
    /// Calling this while already running keeps the existing pool. Calling it
    /// after [`close`](Self::close) builds a fresh pool.
    ///
    /// # Errors
    /// - `ConfigError::InvalidWorkerSize` when `worker-size` is not in
    ///   `1..=MAX_WORKER_SIZE`.
    /// - `PoolUnavailable` when worker threads cannot be spawned.
    pub fn setup(&self, config: &SpliteratorConfig) -> RepoResult<()> {
        let parallelism = effective_parallelism(config.worker_size, hardware_threads())?;
        let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());

        if let EnvState::Running(running) = &*state {
            info!(
                "event=spliterator_setup module=spliterator status=skipped reason=already_running parallelism={}",
                running.parallelism
            );
            return Ok(());
        }

        let pool = ThreadPoolBuilder::new()
            .num_threads(parallelism)
            .thread_name(|index| format!("worker-{index}"))
            .panic_handler(|payload| {
                error!(
                    "event=worker_panic module=spliterator status=error worker={} payload={}",
                    std::thread::current().name().unwrap_or("N/A"),
                    panic_message(payload.as_ref())
                );
            })
            .build()
            .map_err(|err| RepoError::PoolUnavailable(err.to_string()))?;

        info!(
            "event=spliterator_setup module=spliterator status=ok worker_size={} parallelism={}",
            config.worker_size, parallelism
        );
        *state = EnvState::Running(RunningPool {
            pool: Arc::new(pool),
            parallelism,
            shutdown_timeout: config.shutdown_timeout(),
        });
        Ok(())
    }

    pub fn status(&self) -> EnvStatus {
        match &*self.state.read().unwrap_or_else(|e| e.into_inner()) {
            EnvState::Uninitialized => EnvStatus::Uninitialized,
            EnvState::Running(_) => EnvStatus::Running,
            EnvState::Closed => EnvStatus::Closed,
        }
    }

    /// Worker count of the running pool.
    pub fn parallelism(&self) -> Option<usize> {
        match &*self.state.read().unwrap_or_else(|e| e.into_inner()) {
            EnvState::Running(running) => Some(running.parallelism),
            EnvState::Uninitialized | EnvState::Closed => None,
        }
    }

    /// Runs read tasks on the pool and merges them in submission order.
    pub fn submit_queries<R, C>(
        &self,
        ctx: &ExecContext,
        tasks: Vec<Task>,
        callback: &C,
        comparator: Option<&Comparator<R>>,
    ) -> RepoResult<Vec<R>>
    where
        R: Send,
        C: FindMany<R> + ?Sized,
    {
        let (pool, _guard) = self.acquire()?;
        scheduler::run_queries(&pool, ctx, tasks, callback, comparator)
    }

    /// Runs write tasks on the pool and sums their affected-row counts.
    pub fn submit_updates<C>(
        &self,
        ctx: &ExecContext,
        tasks: Vec<Task>,
        callback: &C,
    ) -> RepoResult<usize>
    where
        C: UpdateMany + ?Sized,
    {
        let (pool, _guard) = self.acquire()?;
        scheduler::run_updates(&pool, ctx, tasks, callback)
    }

    /// Stops accepting work, waits up to the shutdown timeout for in-flight
    /// operations, then drops the pool handle.
    ///
    /// Operations still running after the timeout keep their own pool
    /// reference and finish on it.
    pub fn close(&self) {
        let running = {
            let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());
            match std::mem::replace(&mut *state, EnvState::Closed) {
                EnvState::Running(running) => running,
                previous => {
                    *state = previous;
                    return;
                }
            }
        };

        let started_at = Instant::now();
        info!("event=spliterator_close module=spliterator status=start");
        match self.in_flight.wait_drained(running.shutdown_timeout) {
            0 => info!(
                "event=spliterator_close module=spliterator status=ok duration_ms={}",
                started_at.elapsed().as_millis()
            ),
            remaining => warn!(
                "event=spliterator_close module=spliterator status=timeout in_flight={} timeout_ms={}",
                remaining,
                running.shutdown_timeout.as_millis()
            ),
        }
        drop(running);
    }

    #[cfg(test)]
    pub(crate) fn spawn_detached<F>(&self, job: F) -> RepoResult<()>
    where
        F: FnOnce() + Send + 'static,
    {
        let (pool, _guard) = self.acquire()?;
        pool.spawn(job);
        Ok(())
    }

    fn acquire(&self) -> RepoResult<(Arc<ThreadPool>, InFlightGuard<'_>)> {
        let state = self.state.read().unwrap_or_else(|e| e.into_inner());
        match &*state {
            EnvState::Running(running) => {
                Ok((Arc::clone(&running.pool), self.in_flight.enter()))
            }
            EnvState::Uninitialized | EnvState::Closed => Err(RepoError::NotInitialized),
        }
    }
}

/// Worker count used for a configured `worker-size`.
///
/// Takes the larger of the configured value and the hardware thread count,
/// so a small configured value is ignored on hosts with more cores.
pub fn effective_parallelism(
    worker_size: i64,
    hardware_threads: usize,
) -> Result<usize, ConfigError> {
    if !(1..=MAX_WORKER_SIZE).contains(&worker_size) {
        return Err(ConfigError::InvalidWorkerSize(worker_size));
    }
    let configured = usize::try_from(worker_size)
        .map_err(|_| ConfigError::InvalidWorkerSize(worker_size))?;
    Ok(configured.max(hardware_threads))
}

fn hardware_threads() -> usize {
    std::thread::available_parallelism().map_or(1, NonZeroUsize::get)
}

#[derive(Default)]
struct InFlight {
    count: Mutex<usize>,
    drained: Condvar,
}

impl InFlight {
    fn enter(&self) -> InFlightGuard<'_> {
        *self.count.lock().unwrap_or_else(|e| e.into_inner()) += 1;
        InFlightGuard { in_flight: self }
    }

    /// Returns the number of operations still running when the wait ended.
    fn wait_drained(&self, timeout: Duration) -> usize {
        let count = self.count.lock().unwrap_or_else(|e| e.into_inner());
        let (count, _timeout) = self
            .drained
            .wait_timeout_while(count, timeout, |count| *count > 0)
            .unwrap_or_else(|e| e.into_inner());
        *count
    }
}

struct InFlightGuard<'a> {
    in_flight: &'a InFlight,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        let mut count = self
            .in_flight
            .count
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        *count = count.saturating_sub(1);
        if *count == 0 {
            self.in_flight.drained.notify_all();
        }
    }
}
