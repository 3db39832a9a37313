//! Scenario 3 from spec.md §8: an OOM-classified failure on the first
//! attempt, success on the second.

use std::sync::Arc;
use std::time::Duration;

use pane_scheduler::{Executor, FnExecutor, JobKind, JobStatus, ResourceErrorKind, Scheduler, SchedulerConfigBuilder};

use super::support::{wait_all_terminal, TokioClock};

#[tokio::test(start_paused = true)]
async fn out_of_memory_retries_once_then_succeeds() {
    let config = SchedulerConfigBuilder::new().max_concurrent(1).build();

    let executor = FnExecutor::new(move |_scope, job| async move {
        if job.retry_count() == 0 {
            job.set_metadata("exit_code", 137i64);
            job.set_metadata("stderr_tail", "out of memory");
            Err("spawn failed: out of memory".into())
        } else {
            Ok(())
        }
    });

    let scheduler = Scheduler::builder(config, Arc::new(executor))
        .clock(Arc::new(TokioClock))
        .build();
    scheduler.start().await.unwrap();

    let job = scheduler
        .job_builder(JobKind::AgentLaunch, "alice")
        .max_retries(3)
        .build();
    let id = scheduler.submit(job).unwrap();

    assert!(wait_all_terminal(&scheduler, std::slice::from_ref(&id), Duration::from_secs(5)).await);

    let snapshot = scheduler.get_job(&id).unwrap();
    assert_eq!(snapshot.status, JobStatus::Completed);
    assert_eq!(snapshot.retry_count, 1);
    assert_eq!(
        scheduler.stats().backoff.last_reason,
        Some(ResourceErrorKind::OutOfMemory)
    );

    scheduler.stop(Duration::from_secs(1)).await;
}
