//! The scheduler's own pause/resume state, shared between the public
//! `Scheduler::pause`/`resume` API and the backoff controller's global
//! pause trip.
//!
//! Built and handed to `BackoffControllerBuilder::pause_control` before the
//! `Scheduler` itself exists, so tripping a pause never needs a back
//! reference to the scheduler it's pausing.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use pane_scheduler_backoff::PauseControl;
use pane_scheduler_core::{Clock, EventListeners, SchedulerEvent};
use tokio::sync::Notify;

pub struct PauseHandle {
    paused: AtomicBool,
    notify: Notify,
    clock: Arc<dyn Clock>,
    listeners: EventListeners<SchedulerEvent>,
}

impl PauseHandle {
    pub fn new(clock: Arc<dyn Clock>, listeners: EventListeners<SchedulerEvent>) -> Self {
        Self {
            paused: AtomicBool::new(false),
            notify: Notify::new(),
            clock,
            listeners,
        }
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }

    /// Resolves once a resume happens, or immediately if not currently
    /// paused. Workers `select!` this against the submission-notify signal
    /// so a resume wakes every idling worker.
    pub async fn notified(&self) {
        self.notify.notified().await
    }
}

impl PauseControl for PauseHandle {
    fn pause(&self) {
        self.paused.store(true, Ordering::SeqCst);
        self.listeners.emit(&SchedulerEvent::GuardrailTriggered {
            timestamp: self.clock.now(),
            reason: "backoff consecutive-failure threshold reached".to_string(),
            blocked: true,
        });
    }

    fn resume(&self) {
        self.paused.store(false, Ordering::SeqCst);
        self.notify.notify_waiters();
        self.listeners.emit(&SchedulerEvent::GuardrailTriggered {
            timestamp: self.clock.now(),
            reason: "backoff pause ended".to_string(),
            blocked: false,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pane_scheduler_core::SystemClock;

    #[test]
    fn pause_then_resume_toggles_state() {
        let handle = PauseHandle::new(Arc::new(SystemClock), EventListeners::new());
        assert!(!handle.is_paused());
        handle.pause();
        assert!(handle.is_paused());
        handle.resume();
        assert!(!handle.is_paused());
    }
}
