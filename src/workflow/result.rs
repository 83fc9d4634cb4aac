// src/workflow/result.rs

use std::collections::BTreeMap;
use std::time::Duration;

use crate::errors::StepError;
use crate::types::StepId;
use crate::workflow::step::StepStatus;

/// Final outcome of one workflow step.
#[derive(Debug)]
pub struct StepOutcome<T> {
    pub status: StepStatus,
    /// Run time of the step body; zero for skipped steps.
    pub duration: Duration,
    pub result: Option<T>,
    pub error: Option<StepError>,
}

impl<T> StepOutcome<T> {
    pub fn success(&self) -> bool {
        self.status == StepStatus::Completed
    }
}

/// Aggregate outcome of a workflow run.
#[derive(Debug)]
pub struct WorkflowResult<T> {
    /// True iff every step completed.
    pub success: bool,
    pub steps: BTreeMap<StepId, StepOutcome<T>>,
    /// Wall-clock time of the whole run.
    pub duration: Duration,
    /// Number of parallel rounds submitted to the executor.
    pub rounds: usize,
}

impl<T> WorkflowResult<T> {
    pub fn step(&self, id: &str) -> Option<&StepOutcome<T>> {
        self.steps.get(id)
    }

    pub fn status_of(&self, id: &str) -> Option<StepStatus> {
        self.steps.get(id).map(|o| o.status)
    }

    /// Ids of steps with the given status, in id order.
    pub fn steps_with_status(&self, status: StepStatus) -> Vec<&str> {
        self.steps
            .iter()
            .filter(|(_, o)| o.status == status)
            .map(|(id, _)| id.as_str())
            .collect()
    }
}
