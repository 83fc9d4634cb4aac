// src/executor/task.rs

//! Caller-facing task types: what goes into the executor and what comes back.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use tokio::sync::oneshot;

use crate::errors::TaskError;
use crate::types::{work, TaskId, Work};

/// A task waiting to be handed to [`TaskExecutor::schedule`](super::TaskExecutor::schedule).
pub struct TaskSpec<T> {
    pub id: TaskId,
    /// Clamped into `[0, priority_levels - 1]` at admission.
    pub priority: i32,
    /// `None` means the executor's default timeout.
    pub timeout: Option<Duration>,
    pub work: Work<T>,
}

impl<T> TaskSpec<T> {
    pub fn new<F, Fut>(id: impl Into<TaskId>, f: F) -> Self
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<T>> + Send + 'static,
        T: 'static,
    {
        Self::from_work(id, work(f))
    }

    pub fn from_work(id: impl Into<TaskId>, work: Work<T>) -> Self {
        Self {
            id: id.into(),
            priority: 0,
            timeout: None,
            work,
        }
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

impl<T> std::fmt::Debug for TaskSpec<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskSpec")
            .field("id", &self.id)
            .field("priority", &self.priority)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

/// What the runner sends back through a task's reply channel.
#[derive(Debug)]
pub(crate) struct Settlement<T> {
    pub outcome: Result<T, TaskError>,
    pub elapsed: Duration,
}

/// Deferred result of a scheduled task.
///
/// Resolves once the task has run (or timed out). If the executor shuts down
/// while the task is still queued, the handle resolves to
/// [`TaskError::Abandoned`] instead of hanging forever.
#[derive(Debug)]
pub struct TaskHandle<T> {
    id: TaskId,
    rx: oneshot::Receiver<Settlement<T>>,
}

impl<T> Unpin for TaskHandle<T> {}

impl<T> TaskHandle<T> {
    pub(crate) fn new(id: TaskId, rx: oneshot::Receiver<Settlement<T>>) -> Self {
        Self { id, rx }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Wait for the task and return its outcome together with its run time.
    pub async fn report(self) -> TaskResult<T> {
        let Self { id, rx } = self;
        match rx.await {
            Ok(settled) => TaskResult {
                id,
                outcome: settled.outcome,
                duration: settled.elapsed,
            },
            Err(_) => TaskResult {
                outcome: Err(TaskError::Abandoned { id: id.clone() }),
                id,
                duration: Duration::ZERO,
            },
        }
    }
}

impl<T> Future for TaskHandle<T> {
    type Output = Result<T, TaskError>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        match Pin::new(&mut this.rx).poll(cx) {
            Poll::Ready(Ok(settled)) => Poll::Ready(settled.outcome),
            Poll::Ready(Err(_)) => Poll::Ready(Err(TaskError::Abandoned {
                id: this.id.clone(),
            })),
            Poll::Pending => Poll::Pending,
        }
    }
}

/// Per-item outcome of [`TaskExecutor::schedule_all`](super::TaskExecutor::schedule_all).
#[derive(Debug)]
pub struct TaskResult<T> {
    pub id: TaskId,
    pub outcome: Result<T, TaskError>,
    /// Run time of the task body; zero when it never ran.
    pub duration: Duration,
}

impl<T> TaskResult<T> {
    pub fn is_success(&self) -> bool {
        self.outcome.is_ok()
    }

    pub fn result(&self) -> Option<&T> {
        self.outcome.as_ref().ok()
    }

    pub fn error(&self) -> Option<&TaskError> {
        self.outcome.as_ref().err()
    }
}
