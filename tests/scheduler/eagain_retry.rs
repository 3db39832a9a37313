//! Scenario 2 from spec.md §8: a classified resource error retries with a
//! growing, jittered delay and eventually succeeds.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use pane_scheduler::{
    BackoffConfigBuilder, Executor, FnExecutor, JobKind, JobStatus, Scheduler, SchedulerConfigBuilder,
};

use super::support::{wait_all_terminal, TokioClock};

#[tokio::test(start_paused = true)]
async fn resource_temporarily_unavailable_retries_then_succeeds() {
    let config = SchedulerConfigBuilder::new()
        .max_concurrent(1)
        .backoff(
            BackoffConfigBuilder::new()
                .initial_delay(Duration::from_millis(100))
                .multiplier(2.0)
                .jitter(0.1)
                .max_delay(Duration::from_secs(10))
                .build(),
        )
        .build();

    let attempts: Arc<Mutex<Vec<tokio::time::Instant>>> = Arc::new(Mutex::new(Vec::new()));
    let attempts2 = attempts.clone();
    let executor = FnExecutor::new(move |_scope, job| {
        let attempts = attempts2.clone();
        async move {
            attempts.lock().unwrap().push(tokio::time::Instant::now());
            if job.retry_count() < 3 {
                job.set_metadata("exit_code", 11i64);
                job.set_metadata("stderr_tail", "resource temporarily unavailable");
                Err("spawn failed: resource temporarily unavailable".into())
            } else {
                Ok(())
            }
        }
    });

    let scheduler = Scheduler::builder(config, Arc::new(executor))
        .clock(Arc::new(TokioClock))
        .build();
    scheduler.start().await.unwrap();

    let job = scheduler
        .job_builder(JobKind::AgentLaunch, "alice")
        .max_retries(5)
        .build();
    let id = scheduler.submit(job).unwrap();

    assert!(wait_all_terminal(&scheduler, std::slice::from_ref(&id), Duration::from_secs(10)).await);

    let snapshot = scheduler.get_job(&id).unwrap();
    assert_eq!(snapshot.status, JobStatus::Completed);
    assert_eq!(snapshot.retry_count, 3);

    let mut timestamps = attempts.lock().unwrap().clone();
    timestamps.sort();
    assert_eq!(timestamps.len(), 4);
    let deltas: Vec<Duration> = timestamps
        .windows(2)
        .map(|w| w[1].saturating_duration_since(w[0]))
        .collect();
    for (delta, expected_ms) in deltas.iter().zip([100u64, 200, 400]) {
        let lo = Duration::from_millis((expected_ms as f64 * 0.85) as u64);
        let hi = Duration::from_millis((expected_ms as f64 * 1.3) as u64);
        assert!(*delta >= lo && *delta <= hi, "delta {:?} not within expected ~{}ms", delta, expected_ms);
    }

    assert_eq!(scheduler.stats().backoff.consecutive_resource_failures, 0);

    scheduler.stop(Duration::from_secs(1)).await;
}
