// src/executor/queue.rs

//! Bounded priority queue of tasks waiting for a concurrency slot.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::time::{Duration, Instant};

use crate::types::TaskId;

/// A task sitting in the queue, waiting to be dispatched.
///
/// `P` is the payload carried alongside the scheduling metadata (the work and
/// its reply channel in production, anything in tests).
#[derive(Debug)]
pub struct QueuedTask<P> {
    pub id: TaskId,
    /// Already clamped into `[0, priority_levels - 1]`.
    pub priority: u32,
    /// Monotonic enqueue sequence number; tie-break for equal priority.
    pub seq: u64,
    pub enqueued_at: Instant,
    pub timeout: Duration,
    pub payload: P,
}

impl<P> QueuedTask<P> {
    /// How long this task has been waiting.
    pub fn waited(&self) -> Duration {
        self.enqueued_at.elapsed()
    }
}

impl<P> PartialEq for QueuedTask<P> {
    fn eq(&self, other: &Self) -> bool {
        self.priority == other.priority && self.seq == other.seq
    }
}

impl<P> Eq for QueuedTask<P> {}

impl<P> PartialOrd for QueuedTask<P> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<P> Ord for QueuedTask<P> {
    /// Max-heap order: higher priority first, then earlier enqueue first.
    fn cmp(&self, other: &Self) -> Ordering {
        self.priority
            .cmp(&other.priority)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

/// Priority queue ordered by `(priority desc, enqueue order asc)`.
#[derive(Debug)]
pub struct PendingQueue<P> {
    heap: BinaryHeap<QueuedTask<P>>,
    capacity: usize,
}

impl<P> PendingQueue<P> {
    pub fn new(capacity: usize) -> Self {
        Self {
            heap: BinaryHeap::new(),
            capacity,
        }
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.heap.len() >= self.capacity
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Push a task. The caller is responsible for checking [`is_full`](Self::is_full).
    pub fn push(&mut self, task: QueuedTask<P>) {
        self.heap.push(task);
    }

    /// Remove the task that should run next.
    pub fn pop(&mut self) -> Option<QueuedTask<P>> {
        self.heap.pop()
    }

    /// Remove every queued task, in dispatch order.
    pub fn drain(&mut self) -> Vec<QueuedTask<P>> {
        let mut drained = Vec::with_capacity(self.heap.len());
        while let Some(task) = self.heap.pop() {
            drained.push(task);
        }
        drained
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn queued(id: &str, priority: u32, seq: u64) -> QueuedTask<()> {
        QueuedTask {
            id: id.to_string(),
            priority,
            seq,
            enqueued_at: Instant::now(),
            timeout: Duration::from_secs(1),
            payload: (),
        }
    }

    #[test]
    fn pops_highest_priority_first_then_fifo() {
        let mut q = PendingQueue::new(10);
        q.push(queued("low-1", 0, 0));
        q.push(queued("high-1", 2, 1));
        q.push(queued("low-2", 0, 2));
        q.push(queued("high-2", 2, 3));
        q.push(queued("mid", 1, 4));

        let order: Vec<String> = q.drain().into_iter().map(|t| t.id).collect();
        assert_eq!(order, vec!["high-1", "high-2", "mid", "low-1", "low-2"]);
        assert!(q.is_empty());
    }

    #[test]
    fn reports_full_at_capacity() {
        let mut q = PendingQueue::new(2);
        assert!(!q.is_full());
        q.push(queued("a", 0, 0));
        q.push(queued("b", 0, 1));
        assert!(q.is_full());
        assert_eq!(q.len(), 2);
        q.pop();
        assert!(!q.is_full());
    }
}
