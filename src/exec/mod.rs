// src/exec/mod.rs

//! Process execution for config-defined steps.
//!
//! The library core is generic over task bodies; this module supplies the
//! concrete body the `flowdag` binary uses: a shell command run with
//! `tokio::process::Command`.

pub mod command;

pub use command::{run_shell, shell_step, steps_from_config, CommandOutput};
