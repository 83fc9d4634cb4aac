// tests/property_core.rs

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use flowdag::errors::{GraphError, ScheduleError};
use flowdag::executor::core::ExecutorCore;
use flowdag::executor::ExecutorConfig;
use flowdag::types::{clamp_priority, StepId};
use flowdag::workflow::StepGraph;
use proptest::prelude::*;

#[derive(Debug, Clone)]
enum Op {
    Admit(i32),
    Dispatch,
    Finish(bool),
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        (-3i32..10).prop_map(Op::Admit),
        Just(Op::Dispatch),
        any::<bool>().prop_map(Op::Finish),
    ]
}

fn config(max_concurrent: usize, max_queue_size: usize, priority_levels: u32) -> ExecutorConfig {
    ExecutorConfig {
        max_concurrent,
        max_queue_size,
        priority_levels,
        default_timeout: Duration::from_secs(1),
    }
}

// Acyclic by construction: step i may only depend on steps 0..i.
fn dag_strategy(max_steps: usize) -> impl Strategy<Value = Vec<(StepId, Vec<StepId>)>> {
    (1..=max_steps).prop_flat_map(|n| {
        proptest::collection::vec(proptest::collection::vec(any::<usize>(), 0..4), n).prop_map(
            |raw| {
                raw.into_iter()
                    .enumerate()
                    .map(|(i, picks)| {
                        let deps: HashSet<usize> = if i == 0 {
                            HashSet::new()
                        } else {
                            picks.into_iter().map(|p| p % i).collect()
                        };
                        let mut deps: Vec<StepId> =
                            deps.into_iter().map(|d| format!("s{d}")).collect();
                        deps.sort();
                        (format!("s{i}"), deps)
                    })
                    .collect()
            },
        )
    })
}

fn build(spec: &[(StepId, Vec<StepId>)]) -> Result<StepGraph, GraphError> {
    StepGraph::build(spec.iter().map(|(id, deps)| (id.as_str(), deps.as_slice())))
}

proptest! {
    #[test]
    fn core_never_exceeds_its_limits(
        max_concurrent in 1usize..4,
        max_queue_size in 1usize..6,
        ops in proptest::collection::vec(op_strategy(), 0..60),
    ) {
        let mut core: ExecutorCore<()> =
            ExecutorCore::new(config(max_concurrent, max_queue_size, 5));
        let mut admitted = 0u64;
        let mut rejected = 0u64;
        let mut running = 0usize;
        let mut finished = 0u64;

        for (n, op) in ops.into_iter().enumerate() {
            match op {
                Op::Admit(priority) => {
                    match core.admit(format!("t{n}"), priority, None, ()) {
                        Ok(level) => {
                            prop_assert!(level < 5);
                            admitted += 1;
                        }
                        Err(ScheduleError::QueueFull { max_queue_size: cap }) => {
                            prop_assert_eq!(cap, max_queue_size);
                            rejected += 1;
                        }
                        Err(other) => prop_assert!(false, "unexpected {:?}", other),
                    }
                }
                Op::Dispatch => {
                    if core.next_dispatch().is_some() {
                        running += 1;
                    }
                }
                Op::Finish(success) => {
                    if running > 0 {
                        core.finish(success, Duration::from_millis(1));
                        running -= 1;
                        finished += 1;
                    }
                }
            }

            let status = core.status();
            prop_assert!(status.active_count <= max_concurrent);
            prop_assert!(status.queue_size <= max_queue_size);
            prop_assert_eq!(status.active_count, running);
            prop_assert_eq!(status.total_scheduled, admitted);
            prop_assert_eq!(status.rejected_count, rejected);
            prop_assert_eq!(status.completed_count + status.failed_count, finished);
        }
    }

    #[test]
    fn dispatch_order_is_priority_then_fifo(
        priorities in proptest::collection::vec(-2i32..8, 0..30),
        levels in 1u32..6,
    ) {
        let mut core: ExecutorCore<()> =
            ExecutorCore::new(config(1, priorities.len().max(1), levels));

        for (i, &p) in priorities.iter().enumerate() {
            let name = format!("t{i}");
            prop_assert!(core.admit(name, p, None, ()).is_ok());
        }

        let mut dispatched = Vec::new();
        while let Some(task) = core.next_dispatch() {
            dispatched.push(task.id);
            core.finish(true, Duration::ZERO);
        }

        let mut expected: Vec<(u32, usize)> = priorities
            .iter()
            .enumerate()
            .map(|(i, &p)| (clamp_priority(p, levels), i))
            .collect();
        expected.sort_by(|a, b| b.0.cmp(&a.0).then(a.1.cmp(&b.1)));
        let expected: Vec<String> = expected.into_iter().map(|(_, i)| format!("t{i}")).collect();

        prop_assert_eq!(dispatched, expected);
    }

    #[test]
    fn shutdown_drops_everything_queued(
        queued in 0usize..10,
    ) {
        let mut core: ExecutorCore<()> = ExecutorCore::new(config(1, 16, 5));
        for i in 0..=queued {
            let name = format!("t{i}");
            prop_assert!(core.admit(name, 0, None, ()).is_ok());
        }
        prop_assert!(core.next_dispatch().is_some());

        let dropped = core.begin_shutdown();
        prop_assert_eq!(dropped.len(), queued);
        prop_assert_eq!(core.queue_len(), 0);
        prop_assert!(core.next_dispatch().is_none());
        prop_assert_eq!(
            core.admit("late".to_string(), 0, None, ()),
            Err(ScheduleError::ShuttingDown)
        );
    }

    #[test]
    fn acyclic_graphs_build_and_levels_respect_dependencies(spec in dag_strategy(12)) {
        let graph = build(&spec);
        prop_assert!(graph.is_ok());
        let graph = graph.unwrap();

        let levels = graph.levels();
        let mut level_of: HashMap<&str, usize> = HashMap::new();
        for (n, level) in levels.iter().enumerate() {
            prop_assert!(!level.is_empty());
            for id in level {
                prop_assert!(level_of.insert(id.as_str(), n).is_none(), "{} listed twice", id);
            }
        }
        prop_assert_eq!(level_of.len(), spec.len());

        for (id, deps) in &spec {
            for dep in deps {
                prop_assert!(level_of[dep.as_str()] < level_of[id.as_str()]);
                prop_assert!(graph.dependents_of(dep).contains(id));
            }
        }
    }

    #[test]
    fn self_dependency_is_always_a_cycle(spec in dag_strategy(10), pick in any::<usize>()) {
        let mut spec = spec;
        // A self-dependency is the smallest possible cycle.
        let target = pick % spec.len();
        let target_id = spec[target].0.clone();
        spec[target].1.push(target_id);

        match build(&spec) {
            Err(GraphError::Cycle { path }) => {
                prop_assert!(path.len() >= 2);
                prop_assert_eq!(path.first(), path.last());
            }
            other => prop_assert!(false, "expected a cycle, got {:?}", other.map(|g| g.len())),
        }
    }
}
