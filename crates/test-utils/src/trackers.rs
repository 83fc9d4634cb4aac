//! Instruments for observing what the executor actually did.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::watch;

/// Tracks how many instrumented tasks are inside their body right now, and
/// the highest number ever observed.
#[derive(Debug, Clone, Default)]
pub struct ConcurrencyTracker {
    current: Arc<AtomicUsize>,
    peak: Arc<AtomicUsize>,
}

impl ConcurrencyTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark a body as running until the returned guard is dropped.
    pub fn enter(&self) -> TrackerGuard {
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        TrackerGuard {
            current: Arc::clone(&self.current),
        }
    }

    pub fn current(&self) -> usize {
        self.current.load(Ordering::SeqCst)
    }

    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

pub struct TrackerGuard {
    current: Arc<AtomicUsize>,
}

impl Drop for TrackerGuard {
    fn drop(&mut self) {
        self.current.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Records ids in the order bodies started (or finished).
#[derive(Debug, Clone, Default)]
pub struct OrderRecorder {
    seen: Arc<Mutex<Vec<String>>>,
}

impl OrderRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, id: &str) {
        self.seen.lock().unwrap().push(id.to_string());
    }

    pub fn snapshot(&self) -> Vec<String> {
        self.seen.lock().unwrap().clone()
    }
}

/// A latch that holds task bodies until the test opens it.
#[derive(Debug, Clone)]
pub struct Gate {
    tx: Arc<watch::Sender<bool>>,
    rx: watch::Receiver<bool>,
}

impl Gate {
    pub fn new() -> Self {
        let (tx, rx) = watch::channel(false);
        Self {
            tx: Arc::new(tx),
            rx,
        }
    }

    pub fn open(&self) {
        self.tx.send_replace(true);
    }

    pub async fn wait(&self) {
        let mut rx = self.rx.clone();
        let _ = rx.wait_for(|open| *open).await;
    }
}

impl Default for Gate {
    fn default() -> Self {
        Self::new()
    }
}
