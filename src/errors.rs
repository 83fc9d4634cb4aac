// src/errors.rs

//! Crate-wide error types and aliases.
//!
//! Only admission errors ([`ScheduleError`]) and graph validation errors
//! ([`GraphError`]) are ever returned as `Err` from the scheduling APIs.
//! Everything that goes wrong *inside* a task or a workflow step is captured
//! as data ([`TaskError`], [`StepError`]) on that item's own result.

use std::time::Duration;

use thiserror::Error;

use crate::types::{StepId, TaskId};

#[derive(Error, Debug)]
pub enum FlowdagError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, FlowdagError>;

/// Raised synchronously by `TaskExecutor::schedule`; the task is never enqueued.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ScheduleError {
    #[error("task queue is full ({max_queue_size} entries)")]
    QueueFull { max_queue_size: usize },

    #[error("executor is shutting down")]
    ShuttingDown,
}

/// Failure of a single scheduled task, delivered through its own handle.
#[derive(Error, Debug)]
pub enum TaskError {
    #[error("task '{id}' failed: {source:#}")]
    Failed {
        id: TaskId,
        #[source]
        source: anyhow::Error,
    },

    /// The timer won the race. The task body was not stopped.
    #[error("task '{id}' timed out after {}ms", timeout.as_millis())]
    Timeout { id: TaskId, timeout: Duration },

    #[error("task '{id}' panicked: {message}")]
    Panicked { id: TaskId, message: String },

    /// The task was still queued when the executor shut down.
    #[error("task '{id}' was abandoned before it was dispatched")]
    Abandoned { id: TaskId },

    #[error("task '{id}' was rejected: {source}")]
    Rejected {
        id: TaskId,
        #[source]
        source: ScheduleError,
    },
}

impl TaskError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, TaskError::Timeout { .. })
    }

    pub fn is_abandoned(&self) -> bool {
        matches!(self, TaskError::Abandoned { .. })
    }
}

/// One failed position inside a parallel helper call.
///
/// `index` is the item position for `execute_in_parallel` and the map
/// helpers, and the batch position for `process_batches`.
#[derive(Error, Debug)]
#[error("operation #{index} failed: {error}")]
pub struct IndexedError {
    pub index: usize,
    #[source]
    pub error: TaskError,
}

/// Aggregate failure of a parallel helper.
///
/// `results` has one slot per position; slots of failed positions are `None`.
#[derive(Error, Debug)]
#[error("{} of {} parallel operations failed", errors.len(), results.len())]
pub struct ParallelError<U> {
    pub results: Vec<Option<U>>,
    pub errors: Vec<IndexedError>,
}

/// Malformed workflow graph. Detected before any step runs.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GraphError {
    #[error("duplicate workflow step id '{0}'")]
    DuplicateStep(StepId),

    #[error("step '{step}' depends on unknown step '{dependency}'")]
    UnknownDependency { step: StepId, dependency: StepId },

    #[error("circular dependency detected: {}", path.join(" -> "))]
    Cycle { path: Vec<StepId> },
}

/// Why a workflow step did not complete.
#[derive(Error, Debug)]
pub enum StepError {
    #[error(transparent)]
    Task(#[from] TaskError),

    #[error("blocked by failed dependency")]
    BlockedByDependency,

    #[error("skipped due to previous failure")]
    SkippedAfterFailure,
}
