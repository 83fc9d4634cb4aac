// src/executor/mod.rs

//! Bounded-concurrency task executor.
//!
//! - [`queue`] holds the priority queue of admitted tasks.
//! - [`core`] is the synchronous state machine (admission, dispatch
//!   decisions, counters, shutdown draining).
//! - [`runner`] runs one dispatched task body against its timeout.
//! - [`task`] defines `TaskSpec`, the deferred `TaskHandle` and `TaskResult`.
//! - [`parallel`] contains the rolling-window helpers that bypass the queue.
//!
//! [`TaskExecutor`] is the async shell: it keeps the core behind a mutex,
//! runs the dispatch loop after every enqueue and every completion, and
//! spawns the runners.

pub mod core;
pub mod parallel;
pub mod queue;
pub mod runner;
pub mod task;

use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::oneshot;
use tracing::{debug, info};

use crate::errors::{FlowdagError, ParallelError, Result, ScheduleError, TaskError};
use crate::executor::core::ExecutorCore;
use crate::executor::queue::QueuedTask;
use crate::executor::runner::{run_task, TaskPayload};

pub use self::core::ExecutorStatus;
pub use self::task::{TaskHandle, TaskResult, TaskSpec};

/// How often `shutdown(true)` re-checks the active count.
pub const SHUTDOWN_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Construction parameters for a [`TaskExecutor`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecutorConfig {
    /// Maximum number of tasks running at once.
    pub max_concurrent: usize,
    /// Maximum number of tasks waiting in the queue.
    pub max_queue_size: usize,
    /// Number of distinct priorities; valid priorities are `0..priority_levels`.
    pub priority_levels: u32,
    /// Timeout for tasks that do not specify their own.
    pub default_timeout: Duration,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            max_concurrent: 4,
            max_queue_size: 1000,
            priority_levels: 5,
            default_timeout: Duration::from_secs(30),
        }
    }
}

impl ExecutorConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_concurrent == 0 {
            return Err(FlowdagError::ConfigError(
                "max_concurrent must be >= 1 (got 0)".to_string(),
            ));
        }
        if self.max_queue_size == 0 {
            return Err(FlowdagError::ConfigError(
                "max_queue_size must be >= 1 (got 0)".to_string(),
            ));
        }
        if self.priority_levels == 0 {
            return Err(FlowdagError::ConfigError(
                "priority_levels must be >= 1 (got 0)".to_string(),
            ));
        }
        if self.default_timeout.is_zero() {
            return Err(FlowdagError::ConfigError(
                "default_timeout must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

type SharedCore<T> = Mutex<ExecutorCore<TaskPayload<T>>>;

/// Priority-ordered executor that runs at most `max_concurrent` tasks at once.
///
/// Cloning is cheap; clones share the same queue and counters. All methods
/// that dispatch work must be called from within a Tokio runtime.
pub struct TaskExecutor<T> {
    core: Arc<SharedCore<T>>,
}

impl<T> Clone for TaskExecutor<T> {
    fn clone(&self) -> Self {
        Self {
            core: Arc::clone(&self.core),
        }
    }
}

impl<T> std::fmt::Debug for TaskExecutor<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskExecutor")
            .field("status", &lock(&self.core).status())
            .finish_non_exhaustive()
    }
}

impl<T: Send + 'static> TaskExecutor<T> {
    pub fn new(config: ExecutorConfig) -> Result<Self> {
        config.validate()?;
        info!(
            max_concurrent = config.max_concurrent,
            max_queue_size = config.max_queue_size,
            priority_levels = config.priority_levels,
            default_timeout_ms = config.default_timeout.as_millis() as u64,
            "task executor created"
        );
        Ok(Self {
            core: Arc::new(Mutex::new(ExecutorCore::new(config))),
        })
    }

    pub fn config(&self) -> ExecutorConfig {
        *lock(&self.core).config()
    }

    /// Enqueue a task and return its deferred result.
    ///
    /// Fails immediately, without enqueuing, if the queue is full or the
    /// executor is shutting down.
    pub fn schedule(
        &self,
        spec: TaskSpec<T>,
    ) -> std::result::Result<TaskHandle<T>, ScheduleError> {
        let TaskSpec {
            id,
            priority,
            timeout,
            work,
        } = spec;

        let (reply, rx) = oneshot::channel();
        lock(&self.core).admit(id.clone(), priority, timeout, TaskPayload { work, reply })?;
        pump(&self.core);

        Ok(TaskHandle::new(id, rx))
    }

    /// Schedule every task and wait for all of them.
    ///
    /// Never fails as a whole: each entry gets its own [`TaskResult`], in
    /// input order. Admission failures show up as [`TaskError::Rejected`].
    pub async fn schedule_all(&self, specs: Vec<TaskSpec<T>>) -> Vec<TaskResult<T>> {
        let pending: Vec<_> = specs
            .into_iter()
            .map(|spec| {
                let id = spec.id.clone();
                self.schedule(spec).map_err(|source| (id, source))
            })
            .collect();

        let mut results = Vec::with_capacity(pending.len());
        for entry in pending {
            let result = match entry {
                Ok(handle) => handle.report().await,
                Err((id, source)) => TaskResult {
                    outcome: Err(TaskError::Rejected {
                        id: id.clone(),
                        source,
                    }),
                    id,
                    duration: Duration::ZERO,
                },
            };
            results.push(result);
        }
        results
    }

    pub fn status(&self) -> ExecutorStatus {
        lock(&self.core).status()
    }

    pub fn is_shutting_down(&self) -> bool {
        lock(&self.core).is_shutting_down()
    }

    /// Stop admitting work and drop everything still queued.
    ///
    /// Handles of dropped tasks resolve to [`TaskError::Abandoned`]. Running
    /// tasks are never interrupted; with `wait_for_active` this call returns
    /// only once they have all finished.
    pub async fn shutdown(&self, wait_for_active: bool) {
        let dropped = lock(&self.core).begin_shutdown();
        for task in dropped {
            debug!(task = %task.id, "abandoning queued task");
        }

        if wait_for_active {
            loop {
                let active = lock(&self.core).active_count();
                if active == 0 {
                    break;
                }
                debug!(active, "waiting for active tasks to finish");
                tokio::time::sleep(SHUTDOWN_POLL_INTERVAL).await;
            }
        }

        info!("executor shutdown complete");
    }

    fn resolve_limit(&self, max_concurrent: Option<usize>) -> usize {
        max_concurrent.unwrap_or_else(|| self.config().max_concurrent)
    }

    /// See [`parallel::execute_in_parallel`]. `None` uses the executor's
    /// `max_concurrent`.
    pub async fn execute_in_parallel<U, F, Fut>(
        &self,
        works: Vec<F>,
        max_concurrent: Option<usize>,
    ) -> std::result::Result<Vec<U>, ParallelError<U>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = anyhow::Result<U>> + Send + 'static,
        U: Send + 'static,
    {
        parallel::execute_in_parallel(works, self.resolve_limit(max_concurrent)).await
    }

    /// See [`parallel::execute_with_concurrency_control`].
    pub async fn execute_with_concurrency_control<I, U, F, Fut>(
        &self,
        items: Vec<I>,
        f: F,
        max_concurrent: Option<usize>,
    ) -> std::result::Result<Vec<U>, ParallelError<U>>
    where
        F: Fn(I) -> Fut,
        Fut: Future<Output = anyhow::Result<U>> + Send + 'static,
        U: Send + 'static,
    {
        parallel::execute_with_concurrency_control(items, f, self.resolve_limit(max_concurrent))
            .await
    }

    /// See [`parallel::map_in_parallel`].
    pub async fn map_in_parallel<I, U, F, Fut>(
        &self,
        items: Vec<I>,
        f: F,
        max_concurrent: Option<usize>,
    ) -> std::result::Result<Vec<U>, ParallelError<U>>
    where
        F: Fn(usize, I) -> Fut,
        Fut: Future<Output = anyhow::Result<U>> + Send + 'static,
        U: Send + 'static,
    {
        parallel::map_in_parallel(items, f, self.resolve_limit(max_concurrent)).await
    }

    /// See [`parallel::process_batches`].
    pub async fn process_batches<I, U, F, Fut>(
        &self,
        items: Vec<I>,
        processor: F,
        batch_size: usize,
        max_concurrent_batches: usize,
    ) -> std::result::Result<Vec<U>, ParallelError<U>>
    where
        F: Fn(Vec<I>) -> Fut,
        Fut: Future<Output = anyhow::Result<Vec<U>>> + Send + 'static,
        U: Send + 'static,
    {
        parallel::process_batches(items, processor, batch_size, max_concurrent_batches).await
    }
}

fn lock<T>(core: &SharedCore<T>) -> MutexGuard<'_, ExecutorCore<TaskPayload<T>>> {
    // The core is never left half-updated by a panic, so a poisoned lock is
    // still consistent.
    core.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Dispatch loop: start queued tasks while slots are free.
///
/// Runs after every enqueue and every completion. All core mutation happens
/// under the lock, and the lock is never held across an `.await`.
fn pump<T: Send + 'static>(core: &Arc<SharedCore<T>>) {
    let mut guard = lock(core);
    while let Some(task) = guard.next_dispatch() {
        let core = Arc::clone(core);
        tokio::spawn(async move {
            let QueuedTask {
                id,
                timeout,
                payload: TaskPayload { work, reply },
                ..
            } = task;

            let settlement = run_task(id.clone(), timeout, work).await;
            lock(&core).finish(settlement.outcome.is_ok(), settlement.elapsed);

            if reply.send(settlement).is_err() {
                debug!(task = %id, "task handle dropped; discarding result");
            }

            pump(&core);
        });
    }
}
