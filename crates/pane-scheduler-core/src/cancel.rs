//! Cooperative cancellation scope.
//!
//! Every job owns one of these. The universal suspension pattern used
//! throughout the scheduler is "wait on timer OR cancellation, whichever
//! comes first" (per the design notes); [`CancellationScope::race`] is the
//! shared implementation of that pattern so every blocking primitive
//! (rate-limiter waits, backoff delays, executor calls) honors it the same
//! way.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;

/// A cancellable scope handed to the executor for one job invocation.
#[derive(Clone)]
pub struct CancellationScope {
    inner: Arc<Inner>,
}

struct Inner {
    cancelled: AtomicBool,
    notify: Notify,
}

/// The outcome of racing a future against cancellation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RaceOutcome<T> {
    /// The inner future completed first.
    Completed(T),
    /// The scope was cancelled before the future completed.
    Cancelled,
}

impl Default for CancellationScope {
    fn default() -> Self {
        Self::new()
    }
}

impl CancellationScope {
    /// Creates a new, not-yet-cancelled scope.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                cancelled: AtomicBool::new(false),
                notify: Notify::new(),
            }),
        }
    }

    /// Marks the scope cancelled and wakes every waiter.
    pub fn cancel(&self) {
        self.inner.cancelled.store(true, Ordering::SeqCst);
        self.inner.notify.notify_waiters();
    }

    /// Returns whether the scope has been cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::SeqCst)
    }

    /// Resolves once the scope is cancelled. A no-op future if already
    /// cancelled.
    pub async fn cancelled(&self) {
        loop {
            if self.is_cancelled() {
                return;
            }
            let notified = self.inner.notify.notified();
            tokio::pin!(notified);
            // Re-check after registering interest to avoid a lost wakeup if
            // cancel() ran between the check above and subscribing.
            if self.is_cancelled() {
                return;
            }
            notified.await;
        }
    }

    /// Sleeps for `duration`, returning early with [`RaceOutcome::Cancelled`]
    /// if the scope is cancelled first.
    pub async fn sleep(&self, duration: Duration) -> RaceOutcome<()> {
        self.race(tokio::time::sleep(duration)).await
    }

    /// Races an arbitrary future against cancellation.
    pub async fn race<F, T>(&self, future: F) -> RaceOutcome<T>
    where
        F: Future<Output = T>,
    {
        tokio::select! {
            biased;
            _ = self.cancelled() => RaceOutcome::Cancelled,
            value = future => RaceOutcome::Completed(value),
        }
    }
}

impl<T> RaceOutcome<T> {
    /// Returns true if the race ended in cancellation.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, RaceOutcome::Cancelled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn sleep_completes_without_cancellation() {
        let scope = CancellationScope::new();
        let outcome = scope.sleep(Duration::from_millis(5)).await;
        assert!(!outcome.is_cancelled());
    }

    #[tokio::test]
    async fn sleep_is_interrupted_by_cancellation() {
        let scope = CancellationScope::new();
        let scope2 = scope.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(2)).await;
            scope2.cancel();
        });

        let outcome = scope.sleep(Duration::from_secs(30)).await;
        assert!(outcome.is_cancelled());
    }

    #[tokio::test]
    async fn already_cancelled_scope_resolves_immediately() {
        let scope = CancellationScope::new();
        scope.cancel();
        let outcome = scope.sleep(Duration::from_secs(30)).await;
        assert!(outcome.is_cancelled());
    }

    #[tokio::test]
    async fn clones_share_state() {
        let scope = CancellationScope::new();
        let clone = scope.clone();
        clone.cancel();
        assert!(scope.is_cancelled());
    }
}
