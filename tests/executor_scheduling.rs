// tests/executor_scheduling.rs

use std::error::Error;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use flowdag::errors::{ScheduleError, TaskError};
use flowdag::executor::{ExecutorConfig, TaskExecutor, TaskSpec};
use flowdag_test_utils::builders::executor;
use flowdag_test_utils::trackers::{ConcurrencyTracker, Gate, OrderRecorder};
use flowdag_test_utils::{init_tracing, with_timeout};

type TestResult = Result<(), Box<dyn Error>>;

/// A task that records its id, then waits for the gate.
fn gated(id: &str, gate: &Gate, order: &OrderRecorder) -> TaskSpec<String> {
    let (id_owned, gate, order) = (id.to_string(), gate.clone(), order.clone());
    TaskSpec::new(id, move || async move {
        order.record(&id_owned);
        gate.wait().await;
        anyhow::Ok(id_owned)
    })
}

#[tokio::test]
async fn never_runs_more_than_max_concurrent_tasks() -> TestResult {
    init_tracing();
    let executor = executor::<usize>(2);
    let tracker = ConcurrencyTracker::new();

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let tracker = tracker.clone();
            executor.schedule(TaskSpec::new(format!("t{i}"), move || async move {
                let _guard = tracker.enter();
                tokio::time::sleep(Duration::from_millis(30)).await;
                anyhow::Ok(i)
            }))
        })
        .collect::<Result<_, _>>()?;

    let mut values = Vec::new();
    for handle in handles {
        values.push(with_timeout(handle).await?);
    }

    assert_eq!(values, (0..8).collect::<Vec<_>>());
    assert_eq!(tracker.peak(), 2);
    assert_eq!(tracker.current(), 0);
    Ok(())
}

#[tokio::test]
async fn higher_priority_runs_first_and_ties_are_fifo() -> TestResult {
    init_tracing();
    let executor = executor::<String>(1);
    let gate = Gate::new();
    let order = OrderRecorder::new();

    // Occupies the only slot so everything below has to queue.
    let blocker = executor.schedule(gated("blocker", &gate, &order))?;

    let queued = vec![
        executor.schedule(gated("low", &gate, &order).with_priority(0))?,
        executor.schedule(gated("high-1", &gate, &order).with_priority(3))?,
        executor.schedule(gated("high-2", &gate, &order).with_priority(3))?,
        executor.schedule(gated("mid", &gate, &order).with_priority(1))?,
    ];
    assert_eq!(executor.status().queue_size, 4);

    gate.open();
    with_timeout(blocker).await?;
    for handle in queued {
        with_timeout(handle).await?;
    }

    assert_eq!(
        order.snapshot(),
        vec!["blocker", "high-1", "high-2", "mid", "low"]
    );
    Ok(())
}

#[tokio::test]
async fn out_of_range_priorities_are_clamped() -> TestResult {
    init_tracing();
    let executor = executor::<String>(1);
    let gate = Gate::new();
    let order = OrderRecorder::new();

    let blocker = executor.schedule(gated("blocker", &gate, &order))?;
    // 99 clamps to the top level (4) and -7 to zero; 4 was queued first.
    let a = executor.schedule(gated("top", &gate, &order).with_priority(4))?;
    let b = executor.schedule(gated("huge", &gate, &order).with_priority(99))?;
    let c = executor.schedule(gated("negative", &gate, &order).with_priority(-7))?;
    let d = executor.schedule(gated("zero", &gate, &order).with_priority(0))?;

    gate.open();
    for handle in [blocker, a, b, c, d] {
        with_timeout(handle).await?;
    }

    assert_eq!(
        order.snapshot(),
        vec!["blocker", "top", "huge", "negative", "zero"]
    );
    Ok(())
}

#[tokio::test]
async fn timeout_settles_handle_but_body_keeps_running() -> TestResult {
    init_tracing();
    let executor = executor::<()>(1);
    let finished = Arc::new(AtomicBool::new(false));

    let flag = Arc::clone(&finished);
    let handle = executor.schedule(
        TaskSpec::new("slow", move || async move {
            tokio::time::sleep(Duration::from_millis(200)).await;
            flag.store(true, Ordering::SeqCst);
            anyhow::Ok(())
        })
        .with_timeout(Duration::from_millis(20)),
    )?;

    let err = with_timeout(handle).await.unwrap_err();
    assert!(err.is_timeout(), "expected timeout, got {err:?}");
    assert!(!finished.load(Ordering::SeqCst));

    // The slot was released when the timer fired.
    let status = executor.status();
    assert_eq!(status.active_count, 0);
    assert_eq!(status.failed_count, 1);

    tokio::time::sleep(Duration::from_millis(400)).await;
    assert!(finished.load(Ordering::SeqCst), "detached body should finish");
    Ok(())
}

#[tokio::test]
async fn failing_and_panicking_bodies_are_reported_on_their_handles() -> TestResult {
    init_tracing();
    let executor = executor::<u8>(2);

    let failing = executor.schedule(TaskSpec::new("fails", || async {
        Err::<u8, _>(anyhow::anyhow!("disk on fire"))
    }))?;
    let panicking = executor.schedule(TaskSpec::new("panics", || async {
        if true {
            panic!("boom");
        }
        anyhow::Ok(0u8)
    }))?;
    let fine = executor.schedule(TaskSpec::new("fine", || async { anyhow::Ok(7u8) }))?;

    match with_timeout(failing).await {
        Err(TaskError::Failed { id, source }) => {
            assert_eq!(id, "fails");
            assert!(source.to_string().contains("disk on fire"));
        }
        other => panic!("expected Failed, got {other:?}"),
    }

    match with_timeout(panicking).await {
        Err(TaskError::Panicked { id, message }) => {
            assert_eq!(id, "panics");
            assert!(message.contains("boom"));
        }
        other => panic!("expected Panicked, got {other:?}"),
    }

    assert_eq!(with_timeout(fine).await?, 7);

    let status = executor.status();
    assert_eq!(status.completed_count, 1);
    assert_eq!(status.failed_count, 2);
    assert_eq!(status.total_scheduled, 3);
    Ok(())
}

#[tokio::test]
async fn full_queue_rejects_without_enqueuing() -> TestResult {
    init_tracing();
    let executor = TaskExecutor::<String>::new(ExecutorConfig {
        max_concurrent: 1,
        max_queue_size: 2,
        ..ExecutorConfig::default()
    })?;
    let gate = Gate::new();
    let order = OrderRecorder::new();

    let running = executor.schedule(gated("running", &gate, &order))?;
    let q1 = executor.schedule(gated("q1", &gate, &order))?;
    let q2 = executor.schedule(gated("q2", &gate, &order))?;

    let err = executor
        .schedule(gated("overflow", &gate, &order))
        .unwrap_err();
    assert_eq!(err, ScheduleError::QueueFull { max_queue_size: 2 });

    let status = executor.status();
    assert_eq!(status.queue_size, 2);
    assert_eq!(status.rejected_count, 1);
    assert_eq!(status.total_scheduled, 3);

    gate.open();
    for handle in [running, q1, q2] {
        with_timeout(handle).await?;
    }
    assert!(!order.snapshot().contains(&"overflow".to_string()));
    Ok(())
}

#[tokio::test]
async fn schedule_all_keeps_input_order_and_isolates_failures() -> TestResult {
    init_tracing();
    let executor = executor::<u32>(3);

    let specs = vec![
        TaskSpec::new("slow", || async {
            tokio::time::sleep(Duration::from_millis(40)).await;
            anyhow::Ok(1)
        }),
        TaskSpec::new("broken", || async { Err::<u32, _>(anyhow::anyhow!("nope")) }),
        TaskSpec::new("fast", || async { anyhow::Ok(3) }),
    ];

    let results = with_timeout(executor.schedule_all(specs)).await;
    let ids: Vec<&str> = results.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(ids, vec!["slow", "broken", "fast"]);

    assert_eq!(results[0].result(), Some(&1));
    assert!(!results[1].is_success());
    assert!(matches!(results[1].error(), Some(TaskError::Failed { .. })));
    assert_eq!(results[2].result(), Some(&3));
    assert!(results[0].duration >= Duration::from_millis(40));
    Ok(())
}

#[tokio::test]
async fn status_reports_average_task_time() -> TestResult {
    init_tracing();
    let executor = executor::<()>(2);

    let specs = (0..2)
        .map(|i| {
            TaskSpec::new(format!("sleep-{i}"), || async {
                tokio::time::sleep(Duration::from_millis(30)).await;
                anyhow::Ok(())
            })
        })
        .collect();
    with_timeout(executor.schedule_all(specs)).await;

    let status = executor.status();
    assert_eq!(status.completed_count, 2);
    assert_eq!(status.active_count, 0);
    assert_eq!(status.queue_size, 0);
    assert!(status.average_task_time >= Duration::from_millis(30));
    Ok(())
}

#[test]
fn zero_limits_are_rejected_at_construction() {
    let config = ExecutorConfig {
        max_concurrent: 0,
        ..ExecutorConfig::default()
    };
    assert!(TaskExecutor::<()>::new(config).is_err());

    let config = ExecutorConfig {
        priority_levels: 0,
        ..ExecutorConfig::default()
    };
    assert!(TaskExecutor::<()>::new(config).is_err());
}
