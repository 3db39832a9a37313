//! Scenario 1 from spec.md §8: a small global bucket with a minimum
//! inter-op gap paces dispatch across more jobs than fit in one burst.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use pane_scheduler::{Executor, FnExecutor, JobKind, RateLimiterConfigBuilder, Scheduler, SchedulerConfigBuilder};

use super::support::{wait_all_terminal, TokioClock};

#[tokio::test(start_paused = true)]
async fn paced_spawn_respects_rate_and_min_gap() {
    let config = SchedulerConfigBuilder::new()
        .max_concurrent(2)
        .global_rate_limit(
            RateLimiterConfigBuilder::new()
                .rate(2.0)
                .capacity(2.0)
                .min_gap(Duration::from_millis(300))
                .build(),
        )
        .build();

    let entries: Arc<Mutex<Vec<tokio::time::Instant>>> = Arc::new(Mutex::new(Vec::new()));
    let entries2 = entries.clone();
    let executor = FnExecutor::new(move |_scope, _job| {
        let entries = entries2.clone();
        async move {
            entries.lock().unwrap().push(tokio::time::Instant::now());
            tokio::time::sleep(Duration::from_millis(50)).await;
            Ok(())
        }
    });

    let scheduler = Scheduler::builder(config, Arc::new(executor))
        .clock(Arc::new(TokioClock))
        .build();
    scheduler.start().await.unwrap();

    let start = tokio::time::Instant::now();
    let mut ids = Vec::new();
    for _ in 0..12 {
        let job = scheduler.job_builder(JobKind::AgentLaunch, "alice").build();
        ids.push(scheduler.submit(job).unwrap());
    }

    assert!(wait_all_terminal(&scheduler, &ids, Duration::from_secs(30)).await);
    let elapsed = start.elapsed();

    let stats = scheduler.stats();
    assert_eq!(stats.total_completed, 12);
    assert!(elapsed >= Duration::from_secs(5), "elapsed too short: {:?}", elapsed);

    let mut timestamps = entries.lock().unwrap().clone();
    timestamps.sort();
    assert_eq!(timestamps.len(), 12);
    for window in timestamps[2..].windows(2) {
        let gap = window[1].saturating_duration_since(window[0]);
        assert!(
            gap >= Duration::from_millis(300),
            "gap between executor entries {:?} under min_gap",
            gap
        );
    }

    scheduler.stop(Duration::from_secs(1)).await;
}
