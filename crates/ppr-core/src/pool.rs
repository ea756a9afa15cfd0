//! Bounded-concurrency task pool.
//!
//! Keeps a FIFO of pending tasks and a set of in-flight tasks. `fill` starts
//! pending tasks until the in-flight set reaches the limit; `next_settled`
//! waits for whichever in-flight task finishes first, freeing a slot. No
//! scheduler thread is involved: tasks progress while the owner awaits.

use std::collections::VecDeque;
use std::future::Future;

use futures::future::BoxFuture;
use futures::stream::{FuturesUnordered, StreamExt};

/// Bounded pool of futures.
pub struct WorkerPool<'a, T> {
    limit: usize,
    pending: VecDeque<BoxFuture<'a, T>>,
    in_flight: FuturesUnordered<BoxFuture<'a, T>>,
}

impl<'a, T> WorkerPool<'a, T> {
    /// Create a pool running at most `limit` tasks at once (minimum 1).
    pub fn new(limit: usize) -> Self {
        Self {
            limit: limit.max(1),
            pending: VecDeque::new(),
            in_flight: FuturesUnordered::new(),
        }
    }

    /// Queue a task.
    pub fn push<F>(&mut self, task: F)
    where
        F: Future<Output = T> + Send + 'a,
    {
        self.pending.push_back(Box::pin(task));
    }

    /// Start pending tasks until the limit is reached. Returns how many started.
    pub fn fill(&mut self) -> usize {
        let mut started = 0;
        while self.in_flight.len() < self.limit {
            let Some(task) = self.pending.pop_front() else {
                break;
            };
            self.in_flight.push(task);
            started += 1;
        }
        started
    }

    /// Wait for the first in-flight task to settle.
    ///
    /// Returns `None` when nothing is in flight.
    pub async fn next_settled(&mut self) -> Option<T> {
        self.in_flight.next().await
    }

    /// Fill free slots, then wait for the first task to settle.
    pub async fn next(&mut self) -> Option<T> {
        self.fill();
        self.next_settled().await
    }

    /// Run every queued task and collect outputs in completion order.
    pub async fn run_all(mut self) -> Vec<T> {
        let mut outputs = Vec::with_capacity(self.pending.len());
        while let Some(output) = self.next().await {
            outputs.push(output);
        }
        outputs
    }

    /// Concurrency limit.
    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Tasks waiting for a slot.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Tasks currently running.
    pub fn in_flight_len(&self) -> usize {
        self.in_flight.len()
    }

    /// Whether no task is pending or running.
    pub fn is_idle(&self) -> bool {
        self.pending.is_empty() && self.in_flight.is_empty()
    }
}
