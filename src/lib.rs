// src/lib.rs

pub mod cli;
pub mod config;
pub mod errors;
pub mod exec;
pub mod executor;
pub mod logging;
pub mod types;
pub mod workflow;

use anyhow::Result;
use tracing::{info, warn};

use crate::cli::CliArgs;
use crate::config::load_and_validate;
use crate::config::model::ConfigFile;
use crate::exec::{steps_from_config, CommandOutput};
use crate::executor::{ExecutorConfig, TaskExecutor};
use crate::types::StepId;
use crate::workflow::{StepStatus, WorkflowConfig, WorkflowDistributor, WorkflowResult};

pub use crate::executor::{ExecutorStatus, TaskHandle, TaskResult, TaskSpec};
pub use crate::workflow::{StepOutcome, WorkflowStep};

/// High-level entry point used by `main.rs`.
///
/// Loads the config, applies CLI overrides, and runs the workflow of shell
/// steps it describes. Returns whether every step completed.
pub async fn run(args: CliArgs) -> Result<bool> {
    let cfg = load_and_validate(&args.config)?;

    let mut executor_config = cfg.executor_config();
    if let Some(n) = args.max_concurrent {
        executor_config.max_concurrent = n;
    }

    let mut workflow_config = cfg.workflow_config();
    if args.fail_fast {
        workflow_config.fail_fast = true;
    }

    let steps = steps_from_config(&cfg);

    if args.dry_run {
        let plan = WorkflowDistributor::<CommandOutput>::plan(&steps)?;
        print_dry_run(&cfg, &plan, executor_config, workflow_config);
        return Ok(true);
    }

    let executor = TaskExecutor::new(executor_config)?;
    let distributor = WorkflowDistributor::new(executor.clone(), workflow_config);

    // Ctrl-C → stop dispatching; running steps finish on their own.
    {
        let executor = executor.clone();
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                eprintln!("failed to listen for Ctrl+C: {e}");
                return;
            }
            warn!("interrupt received; shutting down executor");
            executor.shutdown(false).await;
        });
    }

    let result = distributor.execute(steps).await?;
    executor.shutdown(true).await;

    info!(status = ?executor.status(), "executor drained");
    print_summary(&result);

    Ok(result.success)
}

/// Dry-run output: settings, steps, and the round plan.
fn print_dry_run(
    cfg: &ConfigFile,
    plan: &[Vec<StepId>],
    executor: ExecutorConfig,
    workflow: WorkflowConfig,
) {
    println!("flowdag dry-run");
    println!("  executor.max_concurrent = {}", executor.max_concurrent);
    println!("  executor.max_queue_size = {}", executor.max_queue_size);
    println!("  executor.priority_levels = {}", executor.priority_levels);
    println!(
        "  executor.default_timeout = {}ms",
        executor.default_timeout.as_millis()
    );
    println!("  workflow.fail_fast = {}", workflow.fail_fast);
    println!();

    println!("steps ({}):", cfg.step.len());
    for (id, step) in cfg.step.iter() {
        println!("  - {id}");
        if let Some(ref name) = step.name {
            println!("      name: {name}");
        }
        println!("      cmd: {}", step.cmd);
        if !step.after.is_empty() {
            println!("      after: {:?}", step.after);
        }
        if step.priority != 0 {
            println!("      priority: {}", step.priority);
        }
        if let Some(ms) = step.timeout_ms {
            println!("      timeout: {ms}ms");
        }
    }
    println!();

    println!("plan ({} rounds):", plan.len());
    for (i, round) in plan.iter().enumerate() {
        println!("  {}: {}", i + 1, round.join(", "));
    }
}

fn print_summary(result: &WorkflowResult<CommandOutput>) {
    println!(
        "workflow {} in {}ms ({} rounds)",
        if result.success { "succeeded" } else { "failed" },
        result.duration.as_millis(),
        result.rounds
    );

    for (id, outcome) in result.steps.iter() {
        let tag = match outcome.status {
            StepStatus::Completed => "ok",
            StepStatus::Failed => "FAILED",
            StepStatus::Skipped => "skipped",
            StepStatus::Pending | StepStatus::Running => "?",
        };
        match &outcome.error {
            Some(err) => println!(
                "  [{tag}] {id} ({}ms): {err}",
                outcome.duration.as_millis()
            ),
            None => println!("  [{tag}] {id} ({}ms)", outcome.duration.as_millis()),
        }
    }
}
