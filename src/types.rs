// src/types.rs

//! Small shared types used by both the executor and the workflow layer.

use std::future::Future;
use std::pin::Pin;

/// Caller-assigned task identifier. Used for bookkeeping and logging only.
pub type TaskId = String;

/// Workflow step identifier, unique within one workflow run.
pub type StepId = String;

/// Boxed future produced by a task body.
pub type BoxedTaskFuture<T> = Pin<Box<dyn Future<Output = anyhow::Result<T>> + Send>>;

/// A unit of work: a zero-argument function producing the task future.
///
/// The body is only invoked when the task is dispatched, never at enqueue time.
pub type Work<T> = Box<dyn FnOnce() -> BoxedTaskFuture<T> + Send>;

/// Box a closure into a [`Work`] value.
pub fn work<T, F, Fut>(f: F) -> Work<T>
where
    F: FnOnce() -> Fut + Send + 'static,
    Fut: Future<Output = anyhow::Result<T>> + Send + 'static,
{
    Box::new(move || Box::pin(f()) as BoxedTaskFuture<T>)
}

/// Clamp a caller-supplied priority into `[0, levels - 1]`.
///
/// Higher values are scheduled sooner.
pub fn clamp_priority(priority: i32, levels: u32) -> u32 {
    let max = levels.saturating_sub(1) as i64;
    (priority as i64).clamp(0, max) as u32
}
