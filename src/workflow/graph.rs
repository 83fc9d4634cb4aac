// src/workflow/graph.rs

use std::collections::{HashMap, HashSet};

use crate::errors::GraphError;
use crate::types::StepId;

/// Internal node structure: stores immediate deps and dependents.
#[derive(Debug, Clone)]
struct StepNode {
    /// Steps that must complete before this one can run.
    deps: Vec<StepId>,
    /// Steps that depend on this one.
    dependents: Vec<StepId>,
}

/// Validated dependency graph of a workflow, keyed by step id.
///
/// Construction fails on duplicate ids, dependencies on unknown steps, and
/// cycles, so a `StepGraph` value is always a DAG. Step order is the order
/// the steps were given in.
#[derive(Debug, Clone)]
pub struct StepGraph {
    order: Vec<StepId>,
    nodes: HashMap<StepId, StepNode>,
}

impl StepGraph {
    /// Build and validate a graph from `(id, dependencies)` pairs.
    pub fn build<'a, I>(steps: I) -> Result<Self, GraphError>
    where
        I: IntoIterator<Item = (&'a str, &'a [StepId])>,
    {
        let mut order = Vec::new();
        let mut nodes: HashMap<StepId, StepNode> = HashMap::new();

        // First pass: create nodes with their dependency lists.
        for (id, deps) in steps {
            if nodes.contains_key(id) {
                return Err(GraphError::DuplicateStep(id.to_string()));
            }
            order.push(id.to_string());
            nodes.insert(
                id.to_string(),
                StepNode {
                    deps: deps.to_vec(),
                    dependents: Vec::new(),
                },
            );
        }

        // Second pass: check references and populate dependents.
        for id in &order {
            let deps = nodes.get(id).map(|n| n.deps.clone()).unwrap_or_default();
            for dep in deps {
                match nodes.get_mut(&dep) {
                    Some(dep_node) => dep_node.dependents.push(id.clone()),
                    None => {
                        return Err(GraphError::UnknownDependency {
                            step: id.clone(),
                            dependency: dep,
                        });
                    }
                }
            }
        }

        let graph = Self { order, nodes };
        graph.detect_cycle()?;
        Ok(graph)
    }

    /// All step ids, in input order.
    pub fn steps(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(|s| s.as_str())
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn dependencies_of(&self, id: &str) -> &[StepId] {
        self.nodes
            .get(id)
            .map(|n| n.deps.as_slice())
            .unwrap_or(&[])
    }

    pub fn dependents_of(&self, id: &str) -> &[StepId] {
        self.nodes
            .get(id)
            .map(|n| n.dependents.as_slice())
            .unwrap_or(&[])
    }

    /// Static level decomposition: level `n` holds the steps whose deepest
    /// dependency chain has length `n`. These are the rounds a run would
    /// take if every step succeeded.
    pub fn levels(&self) -> Vec<Vec<StepId>> {
        let mut remaining: HashMap<&str, usize> = self
            .order
            .iter()
            .map(|id| (id.as_str(), self.dependencies_of(id).len()))
            .collect();

        let mut levels = Vec::new();
        while !remaining.is_empty() {
            let level: Vec<StepId> = self
                .order
                .iter()
                .filter(|id| remaining.get(id.as_str()) == Some(&0))
                .cloned()
                .collect();

            // Cannot happen for a validated graph.
            if level.is_empty() {
                break;
            }

            for id in &level {
                remaining.remove(id.as_str());
                for dependent in self.dependents_of(id) {
                    if let Some(count) = remaining.get_mut(dependent.as_str()) {
                        *count -= 1;
                    }
                }
            }
            levels.push(level);
        }

        levels
    }

    /// Depth-first search from every node with a `visited` set and a separate
    /// recursion stack. Reaching a node that is still on the stack means a
    /// cycle; a node that was fully explored and popped is not one.
    fn detect_cycle(&self) -> Result<(), GraphError> {
        let mut visited: HashSet<&str> = HashSet::new();
        let mut on_stack: HashSet<&str> = HashSet::new();
        let mut path: Vec<&str> = Vec::new();

        for id in &self.order {
            if !visited.contains(id.as_str()) {
                self.visit(id, &mut visited, &mut on_stack, &mut path)?;
            }
        }
        Ok(())
    }

    fn visit<'a>(
        &'a self,
        id: &'a str,
        visited: &mut HashSet<&'a str>,
        on_stack: &mut HashSet<&'a str>,
        path: &mut Vec<&'a str>,
    ) -> Result<(), GraphError> {
        visited.insert(id);
        on_stack.insert(id);
        path.push(id);

        for dep in self.dependencies_of(id) {
            let dep = dep.as_str();
            if on_stack.contains(dep) {
                let start = path.iter().position(|p| *p == dep).unwrap_or(0);
                let mut cycle: Vec<StepId> = path[start..].iter().map(|s| s.to_string()).collect();
                cycle.push(dep.to_string());
                return Err(GraphError::Cycle { path: cycle });
            }
            if !visited.contains(dep) {
                self.visit(dep, visited, on_stack, path)?;
            }
        }

        on_stack.remove(id);
        path.pop();
        Ok(())
    }
}
