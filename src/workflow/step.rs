// src/workflow/step.rs

//! Workflow step definition and per-run status.

use std::future::Future;
use std::time::Duration;

use crate::types::{work, StepId, Work};

/// One node of a workflow: a unit of work plus the steps it waits for.
pub struct WorkflowStep<T> {
    pub id: StepId,
    /// Display name, used in logs. Defaults to the id.
    pub name: String,
    /// Steps that must complete successfully before this one may start.
    pub dependencies: Vec<StepId>,
    pub priority: i32,
    /// `None` falls back to the workflow default, then the executor default.
    pub timeout: Option<Duration>,
    pub work: Work<T>,
}

impl<T> WorkflowStep<T> {
    pub fn new<F, Fut>(id: impl Into<StepId>, f: F) -> Self
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<T>> + Send + 'static,
        T: 'static,
    {
        Self::from_work(id, work(f))
    }

    pub fn from_work(id: impl Into<StepId>, work: Work<T>) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            dependencies: Vec::new(),
            priority: 0,
            timeout: None,
            work,
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn depends_on(mut self, dependency: impl Into<StepId>) -> Self {
        self.dependencies.push(dependency.into());
        self
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

impl<T> std::fmt::Debug for WorkflowStep<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkflowStep")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("dependencies", &self.dependencies)
            .field("priority", &self.priority)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

/// Per-run state of a step.
///
/// `Pending -> Running -> {Completed | Failed}`, or `Pending -> Skipped` when
/// an ancestor failed or fail-fast aborted the run. "Ready" is not stored: a
/// pending step is ready once all of its dependencies are `Completed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Skipped,
}

impl StepStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            StepStatus::Completed | StepStatus::Failed | StepStatus::Skipped
        )
    }
}
