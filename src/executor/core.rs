// src/executor/core.rs

//! Pure executor state machine.
//!
//! `ExecutorCore` owns the pending queue and every counter of the executor.
//! It decides *whether* a task may be admitted and *which* task runs next,
//! but never spawns anything itself: the async shell in
//! [`TaskExecutor`](super::TaskExecutor) holds it behind a mutex and acts on
//! its decisions.
//!
//! Keeping this free of Tokio types means the concurrency bound and the
//! dispatch order can be tested deterministically (see the property tests).

use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::errors::ScheduleError;
use crate::executor::queue::{PendingQueue, QueuedTask};
use crate::executor::ExecutorConfig;
use crate::types::{clamp_priority, TaskId};

/// Point-in-time snapshot of executor counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ExecutorStatus {
    /// Tasks currently holding a concurrency slot.
    pub active_count: usize,
    /// Tasks admitted but not yet dispatched.
    pub queue_size: usize,
    pub completed_count: u64,
    /// Failed tasks, timeouts included.
    pub failed_count: u64,
    /// Mean run time over completed and failed tasks.
    pub average_task_time: Duration,
    /// Tasks ever admitted into the queue.
    pub total_scheduled: u64,
    /// Admission attempts refused (queue full or shutting down).
    pub rejected_count: u64,
}

/// Synchronous executor bookkeeping.
#[derive(Debug)]
pub struct ExecutorCore<P> {
    config: ExecutorConfig,
    queue: PendingQueue<P>,
    next_seq: u64,
    active: usize,
    completed: u64,
    failed: u64,
    rejected: u64,
    total_scheduled: u64,
    total_task_time: Duration,
    shutting_down: bool,
}

impl<P> ExecutorCore<P> {
    pub fn new(config: ExecutorConfig) -> Self {
        Self {
            queue: PendingQueue::new(config.max_queue_size),
            config,
            next_seq: 0,
            active: 0,
            completed: 0,
            failed: 0,
            rejected: 0,
            total_scheduled: 0,
            total_task_time: Duration::ZERO,
            shutting_down: false,
        }
    }

    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    pub fn active_count(&self) -> usize {
        self.active
    }

    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_shutting_down(&self) -> bool {
        self.shutting_down
    }

    /// Admit a task into the queue.
    ///
    /// Fails without enqueuing when the executor is shutting down or the
    /// queue already holds `max_queue_size` entries. On success returns the
    /// clamped priority the task was queued with.
    pub fn admit(
        &mut self,
        id: TaskId,
        priority: i32,
        timeout: Option<Duration>,
        payload: P,
    ) -> Result<u32, ScheduleError> {
        if self.shutting_down {
            self.rejected += 1;
            warn!(task = %id, "rejecting task: executor is shutting down");
            return Err(ScheduleError::ShuttingDown);
        }

        if self.queue.is_full() {
            self.rejected += 1;
            warn!(
                task = %id,
                max_queue_size = self.queue.capacity(),
                "rejecting task: queue is full"
            );
            return Err(ScheduleError::QueueFull {
                max_queue_size: self.queue.capacity(),
            });
        }

        let priority = clamp_priority(priority, self.config.priority_levels);
        let timeout = timeout.unwrap_or(self.config.default_timeout);
        let seq = self.next_seq;
        self.next_seq += 1;
        self.total_scheduled += 1;

        debug!(
            task = %id,
            priority,
            seq,
            timeout_ms = timeout.as_millis() as u64,
            queue_size = self.queue.len() + 1,
            "task queued"
        );

        self.queue.push(QueuedTask {
            id,
            priority,
            seq,
            enqueued_at: Instant::now(),
            timeout,
            payload,
        });

        Ok(priority)
    }

    /// Take the next task to run, if a slot is free.
    ///
    /// Returns `None` while shutting down, when every slot is taken, or when
    /// the queue is empty. A returned task already counts as active.
    pub fn next_dispatch(&mut self) -> Option<QueuedTask<P>> {
        if self.shutting_down || self.active >= self.config.max_concurrent {
            return None;
        }

        let task = self.queue.pop()?;
        self.active += 1;

        debug!(
            task = %task.id,
            priority = task.priority,
            waited_ms = task.waited().as_millis() as u64,
            active = self.active,
            "dispatching task"
        );

        Some(task)
    }

    /// Release the slot held by a finished task and record its outcome.
    pub fn finish(&mut self, success: bool, elapsed: Duration) {
        self.active = self.active.saturating_sub(1);
        self.total_task_time += elapsed;
        if success {
            self.completed += 1;
        } else {
            self.failed += 1;
        }
    }

    /// Stop admitting and dispatching, and hand back everything still queued.
    pub fn begin_shutdown(&mut self) -> Vec<QueuedTask<P>> {
        self.shutting_down = true;
        let dropped = self.queue.drain();
        info!(
            dropped = dropped.len(),
            active = self.active,
            "executor shutting down"
        );
        dropped
    }

    pub fn status(&self) -> ExecutorStatus {
        let average_task_time = mean_duration(self.total_task_time, self.completed + self.failed);

        ExecutorStatus {
            active_count: self.active,
            queue_size: self.queue.len(),
            completed_count: self.completed,
            failed_count: self.failed,
            average_task_time,
            total_scheduled: self.total_scheduled,
            rejected_count: self.rejected,
        }
    }
}

/// `total / count` without narrowing `count`; zero when nothing finished.
fn mean_duration(total: Duration, count: u64) -> Duration {
    if count == 0 {
        return Duration::ZERO;
    }
    let nanos = total.as_nanos() / u128::from(count);
    Duration::from_nanos(u64::try_from(nanos).unwrap_or(u64::MAX))
}
