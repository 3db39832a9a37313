//! A bounded ring of recently finished job snapshots, for `get_job` lookups
//! and stats after a job leaves the running/scheduled tables.

use std::collections::VecDeque;
use std::sync::Mutex;

use pane_scheduler_core::{JobId, JobSnapshot};

pub struct CompletedRing {
    max: usize,
    inner: Mutex<VecDeque<JobSnapshot>>,
}

impl CompletedRing {
    pub fn new(max: usize) -> Self {
        Self {
            max,
            inner: Mutex::new(VecDeque::new()),
        }
    }

    /// Appends a snapshot, evicting the oldest entry if the ring is full.
    /// A `max` of zero disables retention entirely.
    pub fn push(&self, snapshot: JobSnapshot) {
        if self.max == 0 {
            return;
        }
        let mut inner = self.inner.lock().unwrap();
        if inner.len() >= self.max {
            inner.pop_front();
        }
        inner.push_back(snapshot);
    }

    pub fn get(&self, id: &JobId) -> Option<JobSnapshot> {
        self.inner.lock().unwrap().iter().find(|s| &s.id == id).cloned()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pane_scheduler_core::{Job, JobKind};

    fn snap(id: &str) -> JobSnapshot {
        Job::builder(JobKind::AgentLaunch, "alice").id(id).build().snapshot()
    }

    #[test]
    fn evicts_oldest_once_full() {
        let ring = CompletedRing::new(2);
        ring.push(snap("a"));
        ring.push(snap("b"));
        ring.push(snap("c"));
        assert_eq!(ring.len(), 2);
        assert!(ring.get(&JobId::new("a")).is_none());
        assert!(ring.get(&JobId::new("c")).is_some());
    }

    #[test]
    fn zero_capacity_retains_nothing() {
        let ring = CompletedRing::new(0);
        ring.push(snap("a"));
        assert!(ring.is_empty());
    }
}
