// src/executor/parallel.rs

//! Rolling-window parallel helpers.
//!
//! These do not go through the executor queue. Each helper starts position
//! `i` only after position `i - limit` has settled, so at most `limit`
//! operations are in flight and output order always matches input order,
//! whatever order things finish in.
//!
//! A failing position never stops the others: every position is started and
//! awaited, and the aggregate [`ParallelError`] carries all partial results.

use std::future::Future;

use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::errors::{IndexedError, ParallelError, TaskError};
use crate::executor::runner::join_error_message;

type Window<U> = (Vec<Option<U>>, Vec<IndexedError>);

/// Run `works` with at most `max_concurrent` in flight.
pub async fn execute_in_parallel<U, F, Fut>(
    works: Vec<F>,
    max_concurrent: usize,
) -> Result<Vec<U>, ParallelError<U>>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = anyhow::Result<U>> + Send + 'static,
    U: Send + 'static,
{
    let (results, errors) = run_window(works, max_concurrent, "parallel").await;
    into_outcome(results, errors)
}

/// Apply `f` to each item with bounded concurrency.
pub async fn execute_with_concurrency_control<I, U, F, Fut>(
    items: Vec<I>,
    f: F,
    max_concurrent: usize,
) -> Result<Vec<U>, ParallelError<U>>
where
    F: Fn(I) -> Fut,
    Fut: Future<Output = anyhow::Result<U>> + Send + 'static,
    U: Send + 'static,
{
    let f = &f;
    let works: Vec<_> = items.into_iter().map(|item| move || f(item)).collect();
    execute_in_parallel(works, max_concurrent).await
}

/// Like [`execute_with_concurrency_control`], but `f` also receives the
/// item's index.
pub async fn map_in_parallel<I, U, F, Fut>(
    items: Vec<I>,
    f: F,
    max_concurrent: usize,
) -> Result<Vec<U>, ParallelError<U>>
where
    F: Fn(usize, I) -> Fut,
    Fut: Future<Output = anyhow::Result<U>> + Send + 'static,
    U: Send + 'static,
{
    let f = &f;
    let works: Vec<_> = items
        .into_iter()
        .enumerate()
        .map(|(index, item)| move || f(index, item))
        .collect();
    execute_in_parallel(works, max_concurrent).await
}

/// Split `items` into batches of `batch_size`, run `processor` on each batch
/// with at most `max_concurrent_batches` in flight, and flatten the outputs
/// in batch order.
///
/// If a batch fails, every item of that batch maps to `None` in the
/// flattened `results` of the error, while all other batches keep their
/// values. Error indices refer to batches, not items.
pub async fn process_batches<I, U, F, Fut>(
    items: Vec<I>,
    processor: F,
    batch_size: usize,
    max_concurrent_batches: usize,
) -> Result<Vec<U>, ParallelError<U>>
where
    F: Fn(Vec<I>) -> Fut,
    Fut: Future<Output = anyhow::Result<Vec<U>>> + Send + 'static,
    U: Send + 'static,
{
    if items.is_empty() {
        return Ok(Vec::new());
    }

    let batches = partition(items, batch_size);
    let sizes: Vec<usize> = batches.iter().map(Vec::len).collect();
    debug!(
        batches = batches.len(),
        batch_size,
        max_concurrent_batches,
        "processing batches"
    );

    let processor = &processor;
    let works: Vec<_> = batches
        .into_iter()
        .map(|batch| move || processor(batch))
        .collect();

    let (batch_results, errors) = run_window(works, max_concurrent_batches, "batch").await;

    let mut flat = Vec::with_capacity(sizes.iter().sum());
    for (slot, size) in batch_results.into_iter().zip(sizes) {
        match slot {
            Some(values) => flat.extend(values.into_iter().map(Some)),
            None => flat.extend(std::iter::repeat_with(|| None).take(size)),
        }
    }

    into_outcome(flat, errors)
}

/// Split into consecutive chunks of `batch_size` (the last may be short).
///
/// A `batch_size` of zero is treated as one.
pub fn partition<I>(items: Vec<I>, batch_size: usize) -> Vec<Vec<I>> {
    let size = batch_size.max(1);
    let mut batches = Vec::with_capacity(items.len().div_ceil(size));
    let mut current = Vec::with_capacity(size);

    for item in items {
        current.push(item);
        if current.len() == size {
            batches.push(std::mem::replace(&mut current, Vec::with_capacity(size)));
        }
    }
    if !current.is_empty() {
        batches.push(current);
    }

    batches
}

async fn run_window<U, F, Fut>(works: Vec<F>, max_concurrent: usize, label: &str) -> Window<U>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = anyhow::Result<U>> + Send + 'static,
    U: Send + 'static,
{
    let limit = max_concurrent.max(1);
    let total = works.len();

    let mut handles: Vec<Option<JoinHandle<anyhow::Result<U>>>> = Vec::with_capacity(total);
    let mut results: Vec<Option<U>> = std::iter::repeat_with(|| None).take(total).collect();
    let mut errors = Vec::new();

    for (index, work) in works.into_iter().enumerate() {
        if index >= limit {
            let oldest = index - limit;
            if let Some(handle) = handles[oldest].take() {
                settle(label, oldest, handle, &mut results, &mut errors).await;
            }
        }
        handles.push(Some(tokio::spawn(work())));
    }

    for (index, slot) in handles.iter_mut().enumerate() {
        if let Some(handle) = slot.take() {
            settle(label, index, handle, &mut results, &mut errors).await;
        }
    }

    if !errors.is_empty() {
        warn!(
            label,
            failed = errors.len(),
            total,
            "parallel operations finished with failures"
        );
    }

    (results, errors)
}

async fn settle<U>(
    label: &str,
    index: usize,
    handle: JoinHandle<anyhow::Result<U>>,
    results: &mut [Option<U>],
    errors: &mut Vec<IndexedError>,
) {
    let id = format!("{label}-{index}");
    match handle.await {
        Ok(Ok(value)) => results[index] = Some(value),
        Ok(Err(source)) => errors.push(IndexedError {
            index,
            error: TaskError::Failed { id, source },
        }),
        Err(join_err) => errors.push(IndexedError {
            index,
            error: TaskError::Panicked {
                id,
                message: join_error_message(join_err),
            },
        }),
    }
}

fn into_outcome<U>(
    results: Vec<Option<U>>,
    errors: Vec<IndexedError>,
) -> Result<Vec<U>, ParallelError<U>> {
    if errors.is_empty() {
        Ok(results.into_iter().flatten().collect())
    } else {
        Err(ParallelError { results, errors })
    }
}
