// src/exec/command.rs

//! Shell-command step bodies.

use std::process::Stdio;

use anyhow::{bail, Context, Result};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::config::model::{ConfigFile, StepConfig};
use crate::workflow::WorkflowStep;

/// What a successful shell step produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    pub exit_code: i32,
    pub stdout: Vec<String>,
}

/// Run `cmd` through the platform shell, capturing stdout line by line.
///
/// A non-zero exit status is an error. Stderr lines are logged at debug.
/// Output that is not valid UTF-8 is decoded lossily; only the exit status
/// decides success.
pub async fn run_shell(step: &str, cmd: &str) -> Result<CommandOutput> {
    info!(step = %step, cmd = %cmd, "starting step process");

    let mut command = if cfg!(windows) {
        let mut c = Command::new("cmd");
        c.arg("/C").arg(cmd);
        c
    } else {
        let mut c = Command::new("sh");
        c.arg("-c").arg(cmd);
        c
    };

    command
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let mut child = command
        .spawn()
        .with_context(|| format!("spawning process for step '{step}'"))?;

    // Always consume stderr so buffers don't fill.
    if let Some(stderr) = child.stderr.take() {
        let step_name = step.to_string();
        tokio::spawn(async move {
            let mut lines = BufReader::new(stderr).split(b'\n');
            while let Ok(Some(raw)) = lines.next_segment().await {
                debug!(step = %step_name, "stderr: {}", decode_line(&raw));
            }
        });
    }

    let mut stdout_lines = Vec::new();
    if let Some(stdout) = child.stdout.take() {
        let mut lines = BufReader::new(stdout).split(b'\n');
        loop {
            match lines.next_segment().await {
                Ok(Some(raw)) => {
                    let line = decode_line(&raw);
                    debug!(step = %step, "stdout: {}", line);
                    stdout_lines.push(line);
                }
                Ok(None) => break,
                Err(e) => {
                    warn!(step = %step, error = %e, "stopped reading stdout");
                    break;
                }
            }
        }
    }

    let status = child
        .wait()
        .await
        .with_context(|| format!("waiting for process of step '{step}'"))?;
    let exit_code = status.code().unwrap_or(-1);

    info!(
        step = %step,
        exit_code,
        success = status.success(),
        "step process exited"
    );

    if !status.success() {
        bail!("command `{cmd}` exited with code {exit_code}");
    }

    Ok(CommandOutput {
        exit_code,
        stdout: stdout_lines,
    })
}

/// One output line without its terminator, invalid UTF-8 replaced.
fn decode_line(raw: &[u8]) -> String {
    let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
    String::from_utf8_lossy(raw).into_owned()
}

/// Build a workflow step that runs the configured shell command.
pub fn shell_step(id: &str, cfg: &StepConfig) -> WorkflowStep<CommandOutput> {
    let step_id = id.to_string();
    let cmd = cfg.cmd.clone();

    let mut step = WorkflowStep::new(id, move || async move { run_shell(&step_id, &cmd).await })
        .named(cfg.name.clone().unwrap_or_else(|| id.to_string()))
        .with_priority(cfg.priority);

    for dep in &cfg.after {
        step = step.depends_on(dep.clone());
    }
    if let Some(timeout) = cfg.timeout() {
        step = step.with_timeout(timeout);
    }

    step
}

/// One shell step per `[step.<id>]` section, in id order.
pub fn steps_from_config(cfg: &ConfigFile) -> Vec<WorkflowStep<CommandOutput>> {
    cfg.step
        .iter()
        .map(|(id, step)| shell_step(id, step))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_line_is_lossy_and_strips_carriage_return() {
        assert_eq!(decode_line(b"plain"), "plain");
        assert_eq!(decode_line(b"dos\r"), "dos");
        assert_eq!(decode_line(&[b'a', 0xFF, b'b']), "a\u{FFFD}b");
    }
}
