//! Scaffolding shared by the end-to-end scheduler scenarios.

use std::sync::Arc;
use std::time::{Duration, Instant};

use pane_scheduler::{Clock, JobId, Scheduler};

/// Bridges [`Clock`] to tokio's paused/auto-advancing virtual timeline.
///
/// Every subsystem reads time through `Clock::now`, while
/// `CancellationScope::sleep` and friends go through `tokio::time::sleep`
/// directly. Under `#[tokio::test(start_paused = true)]` those two clocks
/// only agree if `now()` is also sourced from tokio's virtual instant —
/// otherwise the business-logic math stays pinned near real wall time
/// while sleeps jump forward, and a test scenario spins instead of
/// resolving in one auto-advance.
pub struct TokioClock;

impl Clock for TokioClock {
    fn now(&self) -> Instant {
        tokio::time::Instant::now().into_std()
    }
}

/// Polls `predicate` until it's true or `timeout` elapses, yielding to the
/// runtime between checks so spawned worker tasks get to run.
pub async fn wait_until(mut predicate: impl FnMut() -> bool, timeout: Duration) -> bool {
    let step = Duration::from_millis(10);
    let mut waited = Duration::ZERO;
    loop {
        if predicate() {
            return true;
        }
        if waited >= timeout {
            return false;
        }
        tokio::time::sleep(step).await;
        waited += step;
    }
}

/// Waits for every job in `ids` to reach a terminal status.
pub async fn wait_all_terminal(scheduler: &Arc<Scheduler>, ids: &[JobId], timeout: Duration) -> bool {
    wait_until(
        || {
            ids.iter()
                .all(|id| scheduler.get_job(id).map(|s| s.status.is_terminal()).unwrap_or(false))
        },
        timeout,
    )
    .await
}
