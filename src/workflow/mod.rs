// src/workflow/mod.rs

//! Dependency-aware workflow orchestration on top of the task executor.
//!
//! - [`step`] defines `WorkflowStep` and the per-step status machine.
//! - [`graph`] validates the dependency graph (duplicates, unknown
//!   dependencies, cycles) and computes static execution levels.
//! - [`state`] tracks step status during one run.
//! - [`result`] holds the per-step and aggregate outcomes.
//! - [`distributor`] contains the round loop and the failure policy.

pub mod distributor;
pub mod graph;
pub mod result;
pub mod state;
pub mod step;

pub use distributor::{WorkflowConfig, WorkflowDistributor};
pub use graph::StepGraph;
pub use result::{StepOutcome, WorkflowResult};
pub use step::{StepStatus, WorkflowStep};
