//! Scenario 4 from spec.md §8: two back-to-back resource failures on
//! distinct jobs trip the global dispatch pause; it lifts automatically
//! and queued work resumes.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use pane_scheduler::{BackoffConfigBuilder, Executor, FnExecutor, JobKind, Scheduler, SchedulerConfigBuilder};

use super::support::{wait_all_terminal, TokioClock};

#[tokio::test(start_paused = true)]
async fn two_consecutive_resource_failures_trip_and_then_release_the_pause() {
    let config = SchedulerConfigBuilder::new()
        .max_concurrent(2)
        .backoff(
            BackoffConfigBuilder::new()
                .initial_delay(Duration::from_millis(50))
                .jitter(0.0)
                .consecutive_failures_threshold(2)
                .pause_queue_on_backoff(true)
                .build(),
        )
        .build();

    let executor = FnExecutor::new(move |_scope, job| async move {
        if job.retry_count() == 0 {
            job.set_metadata("exit_code", 137i64);
            job.set_metadata("stderr_tail", "out of memory");
            Err("spawn failed: out of memory".into())
        } else {
            Ok(())
        }
    });

    let guardrail_events: Arc<Mutex<Vec<(String, bool)>>> = Arc::new(Mutex::new(Vec::new()));
    let guardrail_events2 = guardrail_events.clone();

    let scheduler = Scheduler::builder(config, Arc::new(executor))
        .clock(Arc::new(TokioClock))
        .on_guardrail_triggered(move |reason, blocked| {
            guardrail_events2.lock().unwrap().push((reason.to_string(), blocked));
        })
        .build();
    scheduler.start().await.unwrap();

    let job_a = scheduler
        .job_builder(JobKind::AgentLaunch, "alice")
        .max_retries(1)
        .build();
    let job_b = scheduler
        .job_builder(JobKind::AgentLaunch, "bob")
        .max_retries(1)
        .build();
    let id_a = scheduler.submit(job_a).unwrap();
    let id_b = scheduler.submit(job_b).unwrap();

    assert!(wait_all_terminal(&scheduler, &[id_a, id_b], Duration::from_secs(10)).await);

    let stats = scheduler.stats();
    assert_eq!(stats.total_completed, 2);
    assert!(!stats.backoff.in_global_pause);

    let events = guardrail_events.lock().unwrap().clone();
    assert!(events.iter().any(|(_, blocked)| *blocked), "pause never tripped");
    assert!(events.iter().any(|(_, blocked)| !*blocked), "pause never released");

    scheduler.stop(Duration::from_secs(1)).await;
}
