//! Per-owner and per-batch in-flight caps layered on top of the queue.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use pane_scheduler_core::{Job, JobId};

use crate::priority_queue::PriorityQueue;

/// Prevents a single owner or batch from monopolizing the worker pool.
///
/// A cap of `0` disables that dimension entirely. The gate never reorders
/// the underlying queue — it only skips a head-of-line job whose admission
/// would violate a cap, leaving it in place for a later pass.
pub struct FairnessGate {
    max_per_owner: usize,
    max_per_batch: usize,
    in_flight_by_owner: Mutex<HashMap<String, usize>>,
    in_flight_by_batch: Mutex<HashMap<JobId, usize>>,
}

impl FairnessGate {
    /// Creates a gate with the given per-owner and per-batch caps.
    pub fn new(max_per_owner: usize, max_per_batch: usize) -> Self {
        Self {
            max_per_owner,
            max_per_batch,
            in_flight_by_owner: Mutex::new(HashMap::new()),
            in_flight_by_batch: Mutex::new(HashMap::new()),
        }
    }

    /// Pops the next queue-order job whose owner and batch counters are
    /// below their caps. Equivalent to `try_dequeue_with(queue, |_| true)`.
    pub fn try_dequeue(&self, queue: &PriorityQueue) -> Option<Arc<Job>> {
        self.try_dequeue_with(queue, |_| true)
    }

    /// Like [`FairnessGate::try_dequeue`], but additionally requires
    /// `category_ok` to hold. The worker loop uses this to fold in a
    /// concurrency-cap check without a separate pop/put-back round trip.
    pub fn try_dequeue_with(
        &self,
        queue: &PriorityQueue,
        category_ok: impl Fn(&Job) -> bool,
    ) -> Option<Arc<Job>> {
        let job = queue.try_dequeue_matching(|job| self.admits(job) && category_ok(job))?;
        self.mark_dispatched(&job);
        Some(job)
    }

    fn admits(&self, job: &Job) -> bool {
        let owner_ok = self.max_per_owner == 0 || {
            let counts = self.in_flight_by_owner.lock().unwrap();
            counts.get(&job.owner).copied().unwrap_or(0) < self.max_per_owner
        };

        let batch_ok = self.max_per_batch == 0
            || match &job.batch_id {
                None => true,
                Some(batch_id) => {
                    let counts = self.in_flight_by_batch.lock().unwrap();
                    counts.get(batch_id).copied().unwrap_or(0) < self.max_per_batch
                }
            };

        owner_ok && batch_ok
    }

    fn mark_dispatched(&self, job: &Job) {
        *self
            .in_flight_by_owner
            .lock()
            .unwrap()
            .entry(job.owner.clone())
            .or_insert(0) += 1;

        if let Some(batch_id) = &job.batch_id {
            *self
                .in_flight_by_batch
                .lock()
                .unwrap()
                .entry(batch_id.clone())
                .or_insert(0) += 1;
        }
    }

    /// Releases the counters taken at dispatch time. Call on every terminal
    /// outcome: completed, failed-after-retries-exhausted, or cancelled.
    pub fn mark_complete(&self, job: &Job) {
        let mut owner_counts = self.in_flight_by_owner.lock().unwrap();
        if let Some(count) = owner_counts.get_mut(&job.owner) {
            *count = count.saturating_sub(1);
            if *count == 0 {
                owner_counts.remove(&job.owner);
            }
        }
        drop(owner_counts);

        if let Some(batch_id) = &job.batch_id {
            let mut batch_counts = self.in_flight_by_batch.lock().unwrap();
            if let Some(count) = batch_counts.get_mut(batch_id) {
                *count = count.saturating_sub(1);
                if *count == 0 {
                    batch_counts.remove(batch_id);
                }
            }
        }
    }

    /// Current in-flight count for one owner, for stats/tests.
    pub fn in_flight_for_owner(&self, owner: &str) -> usize {
        self.in_flight_by_owner
            .lock()
            .unwrap()
            .get(owner)
            .copied()
            .unwrap_or(0)
    }
}
