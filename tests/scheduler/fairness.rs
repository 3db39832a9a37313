//! Scenario 6 from spec.md §8: with a per-owner in-flight cap, dispatch
//! stays roughly round-robin across owners instead of draining one owner's
//! backlog before ever touching the others.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use pane_scheduler::{Executor, FnExecutor, JobId, JobKind, RateLimiterConfigBuilder, Scheduler, SchedulerConfigBuilder};

use super::support::{wait_all_terminal, TokioClock};

#[tokio::test(start_paused = true)]
async fn per_owner_cap_keeps_dispatch_roughly_round_robin() {
    let config = SchedulerConfigBuilder::new()
        .max_concurrent(3)
        .max_per_owner(2)
        .global_rate_limit(RateLimiterConfigBuilder::new().rate(1000.0).capacity(1000.0).build())
        .build();

    let executor = FnExecutor::new(|_scope, _job| async {
        tokio::time::sleep(Duration::from_millis(5)).await;
        Ok(())
    });

    let owner_by_id: Arc<Mutex<HashMap<JobId, String>>> = Arc::new(Mutex::new(HashMap::new()));
    let started_order: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
    let owner_by_id2 = owner_by_id.clone();
    let started_order2 = started_order.clone();

    let scheduler = Scheduler::builder(config, Arc::new(executor))
        .clock(Arc::new(TokioClock))
        .on_started(move |job_id| {
            if let Some(owner) = owner_by_id2.lock().unwrap().get(job_id).cloned() {
                started_order2.lock().unwrap().push(owner);
            }
        })
        .build();
    scheduler.start().await.unwrap();

    let owners = ["alice", "bob", "carol"];
    let mut ids = Vec::new();
    for i in 0..24 {
        let owner = owners[i % owners.len()];
        let job = scheduler.job_builder(JobKind::AgentLaunch, owner).build();
        owner_by_id.lock().unwrap().insert(job.id.clone(), owner.to_string());
        ids.push(scheduler.submit(job).unwrap());
    }

    assert!(wait_all_terminal(&scheduler, &ids, Duration::from_secs(10)).await);
    assert_eq!(scheduler.stats().total_completed, 24);

    let order = started_order.lock().unwrap().clone();
    assert_eq!(order.len(), 24);
    for window in order.windows(6) {
        let mut counts: HashMap<&str, usize> = HashMap::new();
        for owner in window {
            *counts.entry(owner.as_str()).or_insert(0) += 1;
        }
        let max_count = counts.values().copied().max().unwrap_or(0);
        assert!(
            max_count <= 3,
            "owner dominated a 6-start window: {:?} ({:?})",
            window,
            counts
        );
    }

    scheduler.stop(Duration::from_secs(1)).await;
}
