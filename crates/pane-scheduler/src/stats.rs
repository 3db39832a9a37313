//! A consistent, point-in-time snapshot of everything the scheduler and
//! its subsystems are doing, for the `stats()` external interface.

use std::collections::HashMap;
use std::time::Duration;

use pane_scheduler_backoff::BackoffStats;
use pane_scheduler_caps::CategoryStats;
use pane_scheduler_ratelimiter::RateLimiterStats;

/// Headroom guard status, flattened out of `HeadroomDecision` for
/// serialization (the decision type itself isn't `Serialize`).
#[derive(Debug, Clone, serde::Serialize)]
pub struct HeadroomStatus {
    pub enabled: bool,
    pub blocked: bool,
    pub reason: Option<String>,
}

/// Everything the scheduler knows about its own state and every subsystem
/// it composes, captured under one call so the numbers are mutually
/// consistent.
#[derive(Debug, Clone, serde::Serialize)]
pub struct SchedulerStats {
    pub total_submitted: u64,
    pub total_completed: u64,
    pub total_failed: u64,
    pub total_retried: u64,
    pub total_cancelled: u64,
    pub queue_len: usize,
    pub scheduled_len: usize,
    pub running_len: usize,
    pub paused: bool,
    #[serde(skip)]
    pub uptime: Duration,
    #[serde(skip)]
    pub oldest_queued_age: Duration,
    pub global_rate_limiter: RateLimiterStats,
    pub per_category_rate_limiters: HashMap<String, RateLimiterStats>,
    pub concurrency_caps: HashMap<String, CategoryStats>,
    pub backoff: BackoffStats,
    pub headroom: HeadroomStatus,
}
