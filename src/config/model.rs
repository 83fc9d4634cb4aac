// src/config/model.rs

use std::collections::BTreeMap;
use std::time::Duration;

use serde::Deserialize;

use crate::executor::ExecutorConfig;
use crate::workflow::WorkflowConfig;

/// Raw configuration exactly as deserialized from TOML.
///
/// ```toml
/// [executor]
/// max_concurrent = 4
/// max_queue_size = 1000
/// priority_levels = 5
/// default_timeout_ms = 30000
///
/// [workflow]
/// fail_fast = false
///
/// [step.build]
/// cmd = "make build"
/// after = ["fetch"]
/// priority = 2
/// ```
///
/// All sections except `[step.<id>]` are optional. Use
/// [`ConfigFile::try_from`] to get a validated config.
#[derive(Debug, Clone, Deserialize)]
pub struct RawConfigFile {
    #[serde(default)]
    pub executor: ExecutorSection,

    #[serde(default)]
    pub workflow: WorkflowSection,

    /// All steps from `[step.<id>]`, keyed by step id.
    #[serde(default)]
    pub step: BTreeMap<String, StepConfig>,
}

/// Validated configuration. Only constructible through validation.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    pub executor: ExecutorSection,
    pub workflow: WorkflowSection,
    pub step: BTreeMap<String, StepConfig>,
}

impl ConfigFile {
    pub(crate) fn new_unchecked(
        executor: ExecutorSection,
        workflow: WorkflowSection,
        step: BTreeMap<String, StepConfig>,
    ) -> Self {
        Self {
            executor,
            workflow,
            step,
        }
    }

    pub fn executor_config(&self) -> ExecutorConfig {
        self.executor.to_executor_config()
    }

    pub fn workflow_config(&self) -> WorkflowConfig {
        self.workflow.to_workflow_config()
    }
}

/// `[executor]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct ExecutorSection {
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,

    #[serde(default = "default_max_queue_size")]
    pub max_queue_size: usize,

    #[serde(default = "default_priority_levels")]
    pub priority_levels: u32,

    #[serde(default = "default_timeout_ms")]
    pub default_timeout_ms: u64,
}

fn default_max_concurrent() -> usize {
    ExecutorConfig::default().max_concurrent
}

fn default_max_queue_size() -> usize {
    ExecutorConfig::default().max_queue_size
}

fn default_priority_levels() -> u32 {
    ExecutorConfig::default().priority_levels
}

fn default_timeout_ms() -> u64 {
    ExecutorConfig::default().default_timeout.as_millis() as u64
}

impl Default for ExecutorSection {
    fn default() -> Self {
        Self {
            max_concurrent: default_max_concurrent(),
            max_queue_size: default_max_queue_size(),
            priority_levels: default_priority_levels(),
            default_timeout_ms: default_timeout_ms(),
        }
    }
}

impl ExecutorSection {
    pub fn to_executor_config(&self) -> ExecutorConfig {
        ExecutorConfig {
            max_concurrent: self.max_concurrent,
            max_queue_size: self.max_queue_size,
            priority_levels: self.priority_levels,
            default_timeout: Duration::from_millis(self.default_timeout_ms),
        }
    }
}

/// `[workflow]` section.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct WorkflowSection {
    /// Skip every remaining step once any round has a failure.
    #[serde(default)]
    pub fail_fast: bool,

    /// Timeout for steps without `timeout_ms`; falls back to
    /// `[executor].default_timeout_ms` when absent.
    #[serde(default)]
    pub default_timeout_ms: Option<u64>,
}

impl WorkflowSection {
    pub fn to_workflow_config(&self) -> WorkflowConfig {
        WorkflowConfig {
            fail_fast: self.fail_fast,
            default_timeout: self.default_timeout_ms.map(Duration::from_millis),
        }
    }
}

/// `[step.<id>]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct StepConfig {
    /// Shell command to run.
    pub cmd: String,

    /// Display name; defaults to the step id.
    #[serde(default)]
    pub name: Option<String>,

    /// Steps that must complete successfully first.
    #[serde(default)]
    pub after: Vec<String>,

    /// Higher runs sooner when slots are contended.
    #[serde(default)]
    pub priority: i32,

    #[serde(default)]
    pub timeout_ms: Option<u64>,
}

impl StepConfig {
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }
}
