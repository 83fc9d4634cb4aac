// src/logging.rs

//! Subscriber setup for the `flowdag` binary.
//!
//! The filter comes from `--log-level` when given, otherwise from the
//! `FLOWDAG_LOG` directives (anything `EnvFilter` accepts, such as
//! `warn,flowdag::workflow=debug`), otherwise `info`. Output goes to stderr;
//! stdout carries only the plan or run summary.

use anyhow::{Context, Result};
use tracing_subscriber::{fmt, EnvFilter};

use crate::cli::LogLevel;

pub const LOG_ENV_VAR: &str = "FLOWDAG_LOG";

pub fn init_logging(cli_level: Option<LogLevel>) -> Result<()> {
    let filter = build_filter(cli_level, std::env::var(LOG_ENV_VAR).ok().as_deref())?;

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| anyhow::anyhow!("failed to install tracing subscriber: {e}"))
}

/// The CLI flag wins over the environment; an unparsable environment value
/// is an error rather than silently ignored.
fn build_filter(cli_level: Option<LogLevel>, env: Option<&str>) -> Result<EnvFilter> {
    if let Some(level) = cli_level {
        return Ok(EnvFilter::new(level.as_directive()));
    }

    match env.map(str::trim).filter(|s| !s.is_empty()) {
        Some(directives) => EnvFilter::try_new(directives)
            .with_context(|| format!("invalid {LOG_ENV_VAR} value '{directives}'")),
        None => Ok(EnvFilter::new("info")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_level_overrides_environment() {
        let filter = build_filter(Some(LogLevel::Trace), Some("error")).unwrap();
        assert_eq!(filter.to_string(), "trace");
    }

    #[test]
    fn environment_accepts_per_module_directives() {
        let filter = build_filter(None, Some("warn,flowdag::workflow=debug")).unwrap();
        let rendered = filter.to_string();
        assert!(rendered.contains("flowdag::workflow=debug"), "{rendered}");
        assert!(rendered.contains("warn"), "{rendered}");
    }

    #[test]
    fn defaults_to_info() {
        assert_eq!(build_filter(None, None).unwrap().to_string(), "info");
        assert_eq!(build_filter(None, Some("  ")).unwrap().to_string(), "info");
    }

    #[test]
    fn garbage_environment_value_is_rejected() {
        assert!(build_filter(None, Some("flowdag=loudest")).is_err());
    }
}
