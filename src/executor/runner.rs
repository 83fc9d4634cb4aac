// src/executor/runner.rs

//! Runs a single dispatched task body against its timeout.

use std::any::Any;
use std::time::{Duration, Instant};

use tokio::sync::oneshot;
use tokio::task::JoinError;
use tracing::{debug, info, warn};

use crate::errors::TaskError;
use crate::executor::task::Settlement;
use crate::types::{TaskId, Work};

/// Payload the executor queues alongside the scheduling metadata.
pub(crate) struct TaskPayload<T> {
    pub work: Work<T>,
    pub reply: oneshot::Sender<Settlement<T>>,
}

impl<T> std::fmt::Debug for TaskPayload<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskPayload").finish_non_exhaustive()
    }
}

/// Run one task body and turn whatever happens into a [`Settlement`].
///
/// The body runs in its own Tokio task so that it can be raced against the
/// timer. When the timer wins, the join handle is dropped: the body is
/// detached and keeps running, and whatever it eventually produces is
/// discarded.
pub(crate) async fn run_task<T>(id: TaskId, timeout: Duration, work: Work<T>) -> Settlement<T>
where
    T: Send + 'static,
{
    let started = Instant::now();
    debug!(task = %id, timeout_ms = timeout.as_millis() as u64, "starting task body");

    let body = tokio::spawn(work());

    let outcome = match tokio::time::timeout(timeout, body).await {
        Ok(Ok(Ok(value))) => Ok(value),
        Ok(Ok(Err(source))) => Err(TaskError::Failed {
            id: id.clone(),
            source,
        }),
        Ok(Err(join_err)) => Err(TaskError::Panicked {
            id: id.clone(),
            message: join_error_message(join_err),
        }),
        Err(_elapsed) => {
            warn!(
                task = %id,
                timeout_ms = timeout.as_millis() as u64,
                "task timed out; body left running in the background"
            );
            Err(TaskError::Timeout {
                id: id.clone(),
                timeout,
            })
        }
    };

    let elapsed = started.elapsed();
    match &outcome {
        Ok(_) => info!(
            task = %id,
            elapsed_ms = elapsed.as_millis() as u64,
            "task completed"
        ),
        Err(err) => warn!(
            task = %id,
            elapsed_ms = elapsed.as_millis() as u64,
            error = %err,
            "task failed"
        ),
    }

    Settlement { outcome, elapsed }
}

/// Human-readable description of why a spawned body did not return.
pub(crate) fn join_error_message(err: JoinError) -> String {
    if err.is_panic() {
        panic_payload_message(err.into_panic())
    } else {
        "task body was cancelled".to_string()
    }
}

fn panic_payload_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
