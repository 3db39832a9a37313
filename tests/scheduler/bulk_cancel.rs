//! Scenario 5 from spec.md §8: cancelling every job for one owner leaves
//! earlier completions untouched and terminates the rest.

use std::sync::Arc;
use std::time::Duration;

use pane_scheduler::{Executor, FnExecutor, JobKind, RateLimiterConfigBuilder, Scheduler, SchedulerConfigBuilder};

use super::support::{wait_all_terminal, wait_until, TokioClock};

#[tokio::test(start_paused = true)]
async fn cancel_owner_stops_everything_still_queued() {
    let config = SchedulerConfigBuilder::new()
        .max_concurrent(1)
        .global_rate_limit(RateLimiterConfigBuilder::new().rate(0.1).capacity(1.0).build())
        .build();

    let executor = FnExecutor::new(|_scope, _job| async { Ok(()) });
    let scheduler = Scheduler::builder(config, Arc::new(executor))
        .clock(Arc::new(TokioClock))
        .build();
    scheduler.start().await.unwrap();

    let mut ids = Vec::new();
    for _ in 0..5 {
        let job = scheduler.job_builder(JobKind::AgentLaunch, "A").build();
        ids.push(scheduler.submit(job).unwrap());
    }

    assert!(wait_until(|| scheduler.stats().total_completed >= 1, Duration::from_secs(2)).await);

    let cancelled = scheduler.cancel_owner("A");
    assert_eq!(cancelled, 4);

    assert!(wait_all_terminal(&scheduler, &ids, Duration::from_secs(2)).await);

    let stats = scheduler.stats();
    assert_eq!(stats.total_completed, 1);
    assert_eq!(stats.total_cancelled, 4);
    assert_eq!(stats.running_len, 0);

    scheduler.stop(Duration::from_secs(1)).await;
}
