// src/config/validate.rs

use petgraph::algo::{astar, toposort};
use petgraph::graphmap::DiGraphMap;
use petgraph::Direction;

use crate::config::model::{ConfigFile, RawConfigFile};
use crate::errors::{FlowdagError, GraphError, Result};

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = FlowdagError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        validate_raw_config(&raw)?;
        Ok(ConfigFile::new_unchecked(raw.executor, raw.workflow, raw.step))
    }
}

fn validate_raw_config(cfg: &RawConfigFile) -> Result<()> {
    ensure_has_steps(cfg)?;
    validate_executor_section(cfg)?;
    validate_step_dependencies(cfg)?;
    validate_dag(cfg)?;
    Ok(())
}

fn ensure_has_steps(cfg: &RawConfigFile) -> Result<()> {
    if cfg.step.is_empty() {
        return Err(FlowdagError::ConfigError(
            "config must contain at least one [step.<id>] section".to_string(),
        ));
    }
    Ok(())
}

fn validate_executor_section(cfg: &RawConfigFile) -> Result<()> {
    cfg.executor.to_executor_config().validate()?;

    if cfg.workflow.default_timeout_ms == Some(0) {
        return Err(FlowdagError::ConfigError(
            "[workflow].default_timeout_ms must be > 0".to_string(),
        ));
    }

    for (id, step) in cfg.step.iter() {
        if step.timeout_ms == Some(0) {
            return Err(FlowdagError::ConfigError(format!(
                "step '{}' has timeout_ms = 0",
                id
            )));
        }
    }

    Ok(())
}

fn validate_step_dependencies(cfg: &RawConfigFile) -> Result<()> {
    for (id, step) in cfg.step.iter() {
        for dep in step.after.iter() {
            if !cfg.step.contains_key(dep) {
                return Err(FlowdagError::ConfigError(format!(
                    "step '{}' has unknown dependency '{}' in `after`",
                    id, dep
                )));
            }
            if dep == id {
                return Err(FlowdagError::ConfigError(format!(
                    "step '{}' cannot depend on itself in `after`",
                    id
                )));
            }
        }
    }
    Ok(())
}

fn validate_dag(cfg: &RawConfigFile) -> Result<()> {
    // Edge direction: dep -> step. For
    //   [step.B]
    //   after = ["A"]
    // we add edge A -> B.
    let mut graph: DiGraphMap<&str, ()> = DiGraphMap::new();

    for id in cfg.step.keys() {
        graph.add_node(id.as_str());
    }

    for (id, step) in cfg.step.iter() {
        for dep in step.after.iter() {
            graph.add_edge(dep.as_str(), id.as_str(), ());
        }
    }

    // A topological sort will fail if there is a cycle.
    match toposort(&graph, None) {
        Ok(_order) => Ok(()),
        Err(cycle) => {
            let start = cycle.node_id();
            match cycle_through(&graph, start) {
                Some(path) => Err(GraphError::Cycle { path }.into()),
                None => Err(FlowdagError::ConfigError(format!(
                    "dependency cycle detected involving step '{start}'"
                ))),
            }
        }
    }
}

/// The full loop through `start`, following `after` (so each step is
/// followed by one of its dependencies) and ending back at `start`.
fn cycle_through<'a>(graph: &DiGraphMap<&'a str, ()>, start: &'a str) -> Option<Vec<String>> {
    graph
        .neighbors_directed(start, Direction::Outgoing)
        .find_map(|next| {
            astar(graph, next, |n| n == start, |_| 1usize, |_| 0).map(|(_, nodes)| nodes)
        })
        .map(|forward| {
            // `forward` runs next -> ... -> start along dep -> step edges.
            let mut path: Vec<String> = std::iter::once(start)
                .chain(forward)
                .map(str::to_string)
                .collect();
            path.reverse();
            path
        })
}
