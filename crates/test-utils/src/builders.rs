#![allow(dead_code)]

use std::collections::BTreeMap;
use std::future::Future;
use std::time::Duration;

use flowdag::config::{ConfigFile, ExecutorSection, RawConfigFile, StepConfig, WorkflowSection};
use flowdag::executor::{ExecutorConfig, TaskExecutor};
use flowdag::WorkflowStep;

/// Builder for `ConfigFile` to simplify test setup.
pub struct ConfigFileBuilder {
    config: RawConfigFile,
}

impl ConfigFileBuilder {
    pub fn new() -> Self {
        Self {
            config: RawConfigFile {
                executor: ExecutorSection::default(),
                workflow: WorkflowSection::default(),
                step: BTreeMap::new(),
            },
        }
    }

    pub fn with_step(mut self, id: &str, step: StepConfig) -> Self {
        self.config.step.insert(id.to_string(), step);
        self
    }

    pub fn max_concurrent(mut self, n: usize) -> Self {
        self.config.executor.max_concurrent = n;
        self
    }

    pub fn fail_fast(mut self, val: bool) -> Self {
        self.config.workflow.fail_fast = val;
        self
    }

    pub fn raw(self) -> RawConfigFile {
        self.config
    }

    pub fn build(self) -> ConfigFile {
        ConfigFile::try_from(self.config).expect("Failed to build valid config from builder")
    }
}

impl Default for ConfigFileBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for `StepConfig`.
pub struct StepConfigBuilder {
    step: StepConfig,
}

impl StepConfigBuilder {
    pub fn new(cmd: &str) -> Self {
        Self {
            step: StepConfig {
                cmd: cmd.to_string(),
                name: None,
                after: vec![],
                priority: 0,
                timeout_ms: None,
            },
        }
    }

    pub fn after(mut self, dep: &str) -> Self {
        self.step.after.push(dep.to_string());
        self
    }

    pub fn name(mut self, name: &str) -> Self {
        self.step.name = Some(name.to_string());
        self
    }

    pub fn priority(mut self, priority: i32) -> Self {
        self.step.priority = priority;
        self
    }

    pub fn timeout_ms(mut self, ms: u64) -> Self {
        self.step.timeout_ms = Some(ms);
        self
    }

    pub fn build(self) -> StepConfig {
        self.step
    }
}

/// Executor with the given concurrency and otherwise roomy limits.
pub fn executor<T: Send + 'static>(max_concurrent: usize) -> TaskExecutor<T> {
    TaskExecutor::new(ExecutorConfig {
        max_concurrent,
        max_queue_size: 100,
        priority_levels: 5,
        default_timeout: Duration::from_secs(5),
    })
    .expect("valid executor config")
}

/// A step that sleeps for `ms` milliseconds and returns its own id.
pub fn sleeping_step(id: &str, ms: u64) -> WorkflowStep<String> {
    let value = id.to_string();
    WorkflowStep::new(id, move || async move {
        tokio::time::sleep(Duration::from_millis(ms)).await;
        anyhow::Ok(value)
    })
}

/// A step that fails immediately.
pub fn failing_step(id: &str) -> WorkflowStep<String> {
    let msg = format!("{id} exploded");
    WorkflowStep::new(id, move || async move { Err(anyhow::anyhow!(msg)) })
}

/// A step built from an arbitrary async closure.
pub fn step_fn<F, Fut>(id: &str, f: F) -> WorkflowStep<String>
where
    F: FnOnce() -> Fut + Send + 'static,
    Fut: Future<Output = anyhow::Result<String>> + Send + 'static,
{
    WorkflowStep::new(id, f)
}
