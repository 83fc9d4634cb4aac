// src/workflow/distributor.rs

use std::time::{Duration, Instant};

use tracing::{info, warn};

use crate::errors::{GraphError, StepError};
use crate::executor::TaskExecutor;
use crate::types::StepId;
use crate::workflow::graph::StepGraph;
use crate::workflow::result::WorkflowResult;
use crate::workflow::state::RunState;
use crate::workflow::step::{StepStatus, WorkflowStep};

/// Failure policy and defaults for a [`WorkflowDistributor`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WorkflowConfig {
    /// Abort all unstarted steps as soon as any round has a failure.
    pub fail_fast: bool,
    /// Timeout for steps that do not set their own. `None` defers to the
    /// executor's default.
    pub default_timeout: Option<Duration>,
}

/// Runs dependency-linked steps on a [`TaskExecutor`], one round at a time.
///
/// Each round submits every step whose dependencies have all completed, waits
/// for the whole round, then recomputes the ready set. Cancellation is the
/// executor's business: shutting the executor down makes the remaining steps
/// fail with an admission or abandonment error.
pub struct WorkflowDistributor<T> {
    executor: TaskExecutor<T>,
    config: WorkflowConfig,
}

impl<T> Clone for WorkflowDistributor<T> {
    fn clone(&self) -> Self {
        Self {
            executor: self.executor.clone(),
            config: self.config,
        }
    }
}

impl<T> std::fmt::Debug for WorkflowDistributor<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkflowDistributor")
            .field("executor", &self.executor)
            .field("config", &self.config)
            .finish()
    }
}

impl<T: Send + 'static> WorkflowDistributor<T> {
    pub fn new(executor: TaskExecutor<T>, config: WorkflowConfig) -> Self {
        Self { executor, config }
    }

    pub fn executor(&self) -> &TaskExecutor<T> {
        &self.executor
    }

    pub fn config(&self) -> WorkflowConfig {
        self.config
    }

    /// Validate `steps` and return the rounds they would run in if nothing
    /// failed. Does not run anything.
    pub fn plan(steps: &[WorkflowStep<T>]) -> Result<Vec<Vec<StepId>>, GraphError> {
        Ok(build_graph(steps)?.levels())
    }

    /// Run a workflow to completion.
    ///
    /// Returns `Err` only for a malformed graph, before any step starts.
    /// Step failures are reported in the returned [`WorkflowResult`].
    pub async fn execute(
        &self,
        steps: Vec<WorkflowStep<T>>,
    ) -> Result<WorkflowResult<T>, GraphError> {
        let started = Instant::now();

        let graph = match build_graph(&steps) {
            Ok(graph) => graph,
            Err(err) => {
                warn!(error = %err, "rejecting workflow: invalid dependency graph");
                return Err(err);
            }
        };

        info!(
            steps = graph.len(),
            fail_fast = self.config.fail_fast,
            "workflow started"
        );

        let mut state = RunState::new(graph, steps);
        let mut rounds = 0;

        while state.has_outstanding() {
            let ready = state.ready_steps();

            if ready.is_empty() {
                let blocked = state.skip_outstanding(|| StepError::BlockedByDependency);
                warn!(?blocked, "remaining steps are blocked by failed dependencies");
                break;
            }

            rounds += 1;
            info!(round = rounds, steps = ?ready, "starting workflow round");

            let specs = state.start_round(&ready, self.config.default_timeout);
            let results = self.executor.schedule_all(specs).await;

            let mut round_failed = false;
            for result in results {
                if !state.record(result) {
                    round_failed = true;
                }
            }

            if round_failed && self.config.fail_fast {
                let skipped = state.skip_outstanding(|| StepError::SkippedAfterFailure);
                warn!(round = rounds, ?skipped, "fail-fast: skipping remaining steps");
                break;
            }
        }

        let steps = state.into_outcomes();
        let success = steps.values().all(|o| o.status == StepStatus::Completed);
        let duration = started.elapsed();

        info!(
            success,
            rounds,
            elapsed_ms = duration.as_millis() as u64,
            "workflow finished"
        );

        Ok(WorkflowResult {
            success,
            steps,
            duration,
            rounds,
        })
    }
}

fn build_graph<T>(steps: &[WorkflowStep<T>]) -> Result<StepGraph, GraphError> {
    StepGraph::build(
        steps
            .iter()
            .map(|s| (s.id.as_str(), s.dependencies.as_slice())),
    )
}
