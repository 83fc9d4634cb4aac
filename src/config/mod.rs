// src/config/mod.rs

//! Configuration loading and validation for flowdag.
//!
//! - `model.rs`: the TOML-backed data model.
//! - `loader.rs`: reading a config from disk or a string.
//! - `validate.rs`: semantic checks (limits, dependencies, acyclicity).

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{default_config_path, load_and_validate, load_from_path, parse_str};
pub use model::{ConfigFile, ExecutorSection, RawConfigFile, StepConfig, WorkflowSection};
