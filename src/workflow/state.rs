// src/workflow/state.rs

//! Per-run step state for the workflow distributor.

use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use tracing::{debug, warn};

use crate::errors::StepError;
use crate::executor::{TaskResult, TaskSpec};
use crate::types::StepId;
use crate::workflow::graph::StepGraph;
use crate::workflow::result::StepOutcome;
use crate::workflow::step::{StepStatus, WorkflowStep};

/// Tracks every step of one workflow run.
///
/// Each step's outcome is written exactly once: either when its task result
/// comes back, or when it is skipped.
pub struct RunState<T> {
    graph: StepGraph,
    status: HashMap<StepId, StepStatus>,
    /// Steps that have not been submitted yet.
    unstarted: HashMap<StepId, WorkflowStep<T>>,
    outcomes: BTreeMap<StepId, StepOutcome<T>>,
}

impl<T> RunState<T> {
    pub fn new(graph: StepGraph, steps: Vec<WorkflowStep<T>>) -> Self {
        let status = steps
            .iter()
            .map(|s| (s.id.clone(), StepStatus::Pending))
            .collect();
        let unstarted = steps.into_iter().map(|s| (s.id.clone(), s)).collect();

        Self {
            graph,
            status,
            unstarted,
            outcomes: BTreeMap::new(),
        }
    }

    pub fn status_of(&self, id: &str) -> Option<StepStatus> {
        self.status.get(id).copied()
    }

    /// Whether any step still lacks a terminal status.
    pub fn has_outstanding(&self) -> bool {
        self.status.values().any(|s| !s.is_terminal())
    }

    /// Pending steps whose dependencies have all completed.
    ///
    /// Ordered by priority (highest first), then input order.
    pub fn ready_steps(&self) -> Vec<StepId> {
        let mut ready: Vec<(i32, StepId)> = self
            .graph
            .steps()
            .filter(|id| self.status_of(id) == Some(StepStatus::Pending))
            .filter(|id| {
                self.graph
                    .dependencies_of(id)
                    .iter()
                    .all(|dep| self.status_of(dep) == Some(StepStatus::Completed))
            })
            .map(|id| {
                let priority = self.unstarted.get(id).map(|s| s.priority).unwrap_or(0);
                (priority, id.to_string())
            })
            .collect();

        // Stable sort keeps input order among equal priorities.
        ready.sort_by(|a, b| b.0.cmp(&a.0));
        ready.into_iter().map(|(_, id)| id).collect()
    }

    /// Mark the given steps `Running` and turn them into executor tasks.
    pub fn start_round(
        &mut self,
        ready: &[StepId],
        default_timeout: Option<Duration>,
    ) -> Vec<TaskSpec<T>> {
        let mut specs = Vec::with_capacity(ready.len());

        for id in ready {
            let Some(step) = self.unstarted.remove(id) else {
                warn!(step = %id, "ready step has no work left; ignoring");
                continue;
            };

            debug!(
                step = %step.id,
                name = %step.name,
                priority = step.priority,
                "dependencies satisfied; marking Running"
            );
            self.status.insert(step.id.clone(), StepStatus::Running);

            let mut spec = TaskSpec::from_work(step.id, step.work).with_priority(step.priority);
            if let Some(timeout) = step.timeout.or(default_timeout) {
                spec = spec.with_timeout(timeout);
            }
            specs.push(spec);
        }

        specs
    }

    /// Record a finished step. Returns `true` if it completed successfully.
    pub fn record(&mut self, result: TaskResult<T>) -> bool {
        let TaskResult {
            id,
            outcome,
            duration,
        } = result;

        let (status, value, error) = match outcome {
            Ok(value) => (StepStatus::Completed, Some(value), None),
            Err(err) => {
                if err.is_abandoned() {
                    warn!(step = %id, "workflow step abandoned by executor shutdown");
                } else {
                    warn!(step = %id, error = %err, "workflow step failed");
                }
                (StepStatus::Failed, None, Some(StepError::Task(err)))
            }
        };

        self.status.insert(id.clone(), status);
        self.outcomes.insert(
            id,
            StepOutcome {
                status,
                duration,
                result: value,
                error,
            },
        );

        status == StepStatus::Completed
    }

    /// Mark every non-terminal step `Skipped` with the given reason.
    ///
    /// Returns the ids that were skipped, in input order.
    pub fn skip_outstanding(&mut self, reason: impl Fn() -> StepError) -> Vec<StepId> {
        let outstanding: Vec<StepId> = self
            .graph
            .steps()
            .filter(|id| self.status_of(id).is_some_and(|s| !s.is_terminal()))
            .map(|id| id.to_string())
            .collect();

        for id in &outstanding {
            self.unstarted.remove(id);
            self.status.insert(id.clone(), StepStatus::Skipped);
            self.outcomes.insert(
                id.clone(),
                StepOutcome {
                    status: StepStatus::Skipped,
                    duration: Duration::ZERO,
                    result: None,
                    error: Some(reason()),
                },
            );
        }

        outstanding
    }

    pub fn into_outcomes(self) -> BTreeMap<StepId, StepOutcome<T>> {
        self.outcomes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn step(id: &str, deps: &[&str], priority: i32) -> WorkflowStep<u32> {
        let mut s = WorkflowStep::new(id, || async { anyhow::Ok(1) }).with_priority(priority);
        for d in deps {
            s = s.depends_on(*d);
        }
        s
    }

    fn state(steps: Vec<WorkflowStep<u32>>) -> RunState<u32> {
        let graph = StepGraph::build(
            steps
                .iter()
                .map(|s| (s.id.as_str(), s.dependencies.as_slice())),
        )
        .unwrap();
        RunState::new(graph, steps)
    }

    fn ok(id: &str) -> TaskResult<u32> {
        TaskResult {
            id: id.to_string(),
            outcome: Ok(1),
            duration: Duration::from_millis(1),
        }
    }

    fn failed(id: &str) -> TaskResult<u32> {
        TaskResult {
            id: id.to_string(),
            outcome: Err(crate::errors::TaskError::Failed {
                id: id.to_string(),
                source: anyhow::anyhow!("boom"),
            }),
            duration: Duration::from_millis(1),
        }
    }

    #[test]
    fn ready_set_follows_completions() {
        let mut st = state(vec![
            step("A", &[], 0),
            step("B", &["A"], 0),
            step("C", &["A"], 0),
            step("D", &["B", "C"], 0),
        ]);

        assert_eq!(st.ready_steps(), vec!["A"]);
        st.start_round(&["A".to_string()], None);
        assert!(st.ready_steps().is_empty());

        assert!(st.record(ok("A")));
        assert_eq!(st.ready_steps(), vec!["B", "C"]);

        let ready = st.ready_steps();
        st.start_round(&ready, None);
        st.record(ok("B"));
        assert!(st.ready_steps().is_empty(), "D must wait for C");
        st.record(ok("C"));
        assert_eq!(st.ready_steps(), vec!["D"]);
    }

    #[test]
    fn ready_steps_are_ordered_by_priority() {
        let st = state(vec![step("low", &[], 0), step("high", &[], 3), step("mid", &[], 1)]);
        assert_eq!(st.ready_steps(), vec!["high", "mid", "low"]);
    }

    #[test]
    fn failed_dependency_leaves_dependents_unready() {
        let mut st = state(vec![step("A", &[], 0), step("B", &["A"], 0)]);
        st.start_round(&["A".to_string()], None);
        assert!(!st.record(failed("A")));

        assert!(st.ready_steps().is_empty());
        assert!(st.has_outstanding());

        let skipped = st.skip_outstanding(|| StepError::BlockedByDependency);
        assert_eq!(skipped, vec!["B"]);
        assert!(!st.has_outstanding());

        let outcomes = st.into_outcomes();
        assert_eq!(outcomes["A"].status, StepStatus::Failed);
        assert_eq!(outcomes["B"].status, StepStatus::Skipped);
        assert!(matches!(
            outcomes["B"].error,
            Some(StepError::BlockedByDependency)
        ));
    }

    #[test]
    fn step_timeout_overrides_default() {
        let mut st = state(vec![
            step("A", &[], 0).with_timeout(Duration::from_secs(1)),
            step("B", &[], 0),
        ]);
        let ready = st.ready_steps();
        let specs = st.start_round(&ready, Some(Duration::from_secs(9)));
        assert_eq!(specs[0].timeout, Some(Duration::from_secs(1)));
        assert_eq!(specs[1].timeout, Some(Duration::from_secs(9)));
    }
}
