//! Ordered store of pending jobs.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use pane_scheduler_core::{Job, JobId, JobSnapshot, Priority};

/// Total order key: `(priority, created_at, id)`. `id` only breaks ties
/// between jobs admitted at the exact same instant, keeping ordering
/// reproducible under a paused test clock.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
struct QueueKey(Priority, Instant, JobId);

#[derive(Default)]
struct Inner {
    by_key: BTreeMap<QueueKey, Arc<Job>>,
    by_id: HashMap<JobId, QueueKey>,
}

/// Pending-job store keyed by priority then submission order.
///
/// All mutating operations take `&self`; a single internal mutex makes the
/// queue safe to share across worker threads without an external lock.
pub struct PriorityQueue {
    inner: Mutex<Inner>,
}

impl Default for PriorityQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl PriorityQueue {
    /// Creates an empty queue.
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
        }
    }

    /// Admits a job, stamping `created_at` if this is its first enqueue.
    pub fn enqueue(&self, job: Arc<Job>, now: Instant) {
        job.mark_created(now);
        let created_at = job.created_at().unwrap_or(now);
        let key = QueueKey(job.priority, created_at, job.id.clone());

        let mut inner = self.inner.lock().unwrap();
        inner.by_id.insert(job.id.clone(), key.clone());
        inner.by_key.insert(key, job);
    }

    /// Pops the highest-priority, earliest job.
    pub fn dequeue(&self) -> Option<Arc<Job>> {
        self.try_dequeue_matching(|_| true)
    }

    /// Pops the first job in queue order for which `predicate` returns
    /// true, leaving every job ahead of it (that failed the predicate) in
    /// place. The head-of-line-avoidance primitive the fairness gate and
    /// worker loop's category-cap scan both compose on top of.
    pub fn try_dequeue_matching(&self, mut predicate: impl FnMut(&Job) -> bool) -> Option<Arc<Job>> {
        let mut inner = self.inner.lock().unwrap();
        let key = inner
            .by_key
            .iter()
            .find(|(_, job)| predicate(job))
            .map(|(key, _)| key.clone())?;
        let job = inner.by_key.remove(&key);
        inner.by_id.remove(&key.2);
        job
    }

    /// Removes a specific job by id, wherever it sits in the order.
    pub fn remove(&self, id: &JobId) -> Option<Arc<Job>> {
        let mut inner = self.inner.lock().unwrap();
        let key = inner.by_id.remove(id)?;
        inner.by_key.remove(&key)
    }

    /// Removes and returns every queued job owned by `owner`.
    pub fn cancel_owner(&self, owner: &str, now: Instant) -> Vec<Arc<Job>> {
        self.cancel_matching(now, |job| job.owner == owner)
    }

    /// Removes and returns every queued job in batch `batch_id`.
    pub fn cancel_batch(&self, batch_id: &JobId, now: Instant) -> Vec<Arc<Job>> {
        self.cancel_matching(now, |job| job.batch_id.as_ref() == Some(batch_id))
    }

    fn cancel_matching(&self, now: Instant, predicate: impl Fn(&Job) -> bool) -> Vec<Arc<Job>> {
        let mut inner = self.inner.lock().unwrap();
        let matching_keys: Vec<QueueKey> = inner
            .by_key
            .iter()
            .filter(|(_, job)| predicate(job))
            .map(|(key, _)| key.clone())
            .collect();

        let mut removed = Vec::with_capacity(matching_keys.len());
        for key in matching_keys {
            if let Some(job) = inner.by_key.remove(&key) {
                inner.by_id.remove(&key.2);
                job.cancel(now);
                removed.push(job);
            }
        }
        removed
    }

    /// Number of jobs currently queued.
    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().by_key.len()
    }

    /// Whether the queue currently holds no jobs.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshots of every queued job, in queue order.
    pub fn list_all(&self) -> Vec<JobSnapshot> {
        self.inner
            .lock()
            .unwrap()
            .by_key
            .values()
            .map(|job| job.snapshot())
            .collect()
    }

    /// Number of jobs strictly ahead of `priority` in queue order —
    /// used by `estimate_eta`.
    pub fn count_ahead_of(&self, priority: Priority, created_at: Instant) -> usize {
        let probe = QueueKey(priority, created_at, JobId::new(""));
        self.inner.lock().unwrap().by_key.range(..probe).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pane_scheduler_core::JobKind;
    use std::time::Duration;

    fn job(owner: &str, priority: Priority) -> Arc<Job> {
        Job::builder(JobKind::AgentLaunch, owner)
            .priority(priority)
            .build()
    }

    #[test]
    fn dequeue_returns_highest_priority_first() {
        let queue = PriorityQueue::new();
        let now = Instant::now();
        queue.enqueue(job("a", Priority::Low), now);
        queue.enqueue(job("b", Priority::Urgent), now + Duration::from_millis(1));
        queue.enqueue(job("c", Priority::Normal), now + Duration::from_millis(2));

        let first = queue.dequeue().unwrap();
        assert_eq!(first.priority, Priority::Urgent);
    }

    #[test]
    fn ties_break_on_created_at_then_id() {
        let queue = PriorityQueue::new();
        let now = Instant::now();
        let first = Job::builder(JobKind::AgentLaunch, "a")
            .id("first")
            .priority(Priority::Normal)
            .build();
        let second = Job::builder(JobKind::AgentLaunch, "a")
            .id("second")
            .priority(Priority::Normal)
            .build();

        queue.enqueue(second.clone(), now);
        queue.enqueue(first.clone(), now);

        // Both stamped at the same instant; insertion order into the
        // BTreeMap still resolves deterministically via job id.
        let popped = queue.dequeue().unwrap();
        assert_eq!(popped.id, first.id);
    }

    #[test]
    fn remove_pulls_a_specific_job() {
        let queue = PriorityQueue::new();
        let now = Instant::now();
        let target = job("a", Priority::Normal);
        queue.enqueue(target.clone(), now);
        queue.enqueue(job("b", Priority::High), now);

        let removed = queue.remove(&target.id).unwrap();
        assert_eq!(removed.id, target.id);
        assert_eq!(queue.len(), 1);
        assert!(queue.remove(&target.id).is_none());
    }

    #[test]
    fn cancel_owner_removes_and_cancels_all_matches() {
        let queue = PriorityQueue::new();
        let now = Instant::now();
        queue.enqueue(job("alice", Priority::Normal), now);
        queue.enqueue(job("alice", Priority::High), now);
        queue.enqueue(job("bob", Priority::High), now);

        let cancelled = queue.cancel_owner("alice", now);
        assert_eq!(cancelled.len(), 2);
        assert!(cancelled
            .iter()
            .all(|j| j.status() == pane_scheduler_core::JobStatus::Cancelled));
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn try_dequeue_matching_skips_ineligible_head() {
        let queue = PriorityQueue::new();
        let now = Instant::now();
        queue.enqueue(job("capped", Priority::Urgent), now);
        queue.enqueue(job("open", Priority::Normal), now + Duration::from_millis(1));

        let popped = queue.try_dequeue_matching(|j| j.owner == "open").unwrap();
        assert_eq!(popped.owner, "open");
        // The skipped urgent job is still in the queue, untouched.
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.dequeue().unwrap().owner, "capped");
    }

    #[test]
    fn removing_unknown_id_returns_none() {
        let queue = PriorityQueue::new();
        assert!(queue.remove(&JobId::new("ghost")).is_none());
    }
}
