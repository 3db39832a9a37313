//! Top-level scheduler configuration, composing every subsystem's config.

use std::collections::HashMap;
use std::time::Duration;

use pane_scheduler_backoff::BackoffConfig;
use pane_scheduler_caps::CapsConfig;
use pane_scheduler_headroom::HeadroomConfig;
use pane_scheduler_ratelimiter::RateLimiterConfig;

/// Every tuning knob the scheduler and its subsystems expose.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct SchedulerConfig {
    /// Number of worker tasks running concurrently (the pool's width).
    pub max_concurrent: usize,
    /// The single bucket every dispatched job draws from, regardless of
    /// category.
    pub global_rate_limit: RateLimiterConfig,
    /// Template a category's limiter is built from when it has no entry in
    /// `per_category_rate_limits`.
    pub default_category_rate_limit: RateLimiterConfig,
    /// Per-category rate-limit overrides.
    pub per_category_rate_limits: HashMap<String, RateLimiterConfig>,
    /// Template a category's concurrency cap uses when it has no entry in
    /// `per_category_concurrency_caps`.
    pub concurrency_caps: CapsConfig,
    /// Per-category concurrency-cap overrides.
    pub per_category_concurrency_caps: HashMap<String, CapsConfig>,
    /// Maximum jobs from one owner running at once. Zero disables the cap.
    pub max_per_owner: usize,
    /// Maximum jobs from one batch running at once. Zero disables the cap.
    pub max_per_batch: usize,
    /// Error classification and jittered-backoff tuning.
    pub backoff: BackoffConfig,
    /// Resource-headroom probing and the dispatch gate it drives.
    pub headroom: HeadroomConfig,
    /// Size of the ring of recently finished jobs kept for `get_job`/stats
    /// lookups after completion.
    pub max_completed: usize,
    /// Queue length at or above which `on_backpressure` fires. Zero
    /// disables the hook.
    pub backpressure_threshold: usize,
    /// Retry ceiling applied to a job submitted via [`crate::Scheduler::job_builder`]
    /// that doesn't set its own `max_retries`.
    pub default_retries: usize,
    /// Retry delay applied the same way, for non-resource errors.
    pub default_retry_delay: Duration,
    /// How often an idle worker re-polls the queue/headroom/pause state
    /// absent a wakeup notification.
    pub idle_poll_interval: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        SchedulerConfigBuilder::new().build()
    }
}

/// Builds a [`SchedulerConfig`].
pub struct SchedulerConfigBuilder {
    max_concurrent: usize,
    global_rate_limit: RateLimiterConfig,
    default_category_rate_limit: RateLimiterConfig,
    per_category_rate_limits: HashMap<String, RateLimiterConfig>,
    concurrency_caps: CapsConfig,
    per_category_concurrency_caps: HashMap<String, CapsConfig>,
    max_per_owner: usize,
    max_per_batch: usize,
    backoff: BackoffConfig,
    headroom: HeadroomConfig,
    max_completed: usize,
    backpressure_threshold: usize,
    default_retries: usize,
    default_retry_delay: Duration,
    idle_poll_interval: Duration,
}

impl SchedulerConfigBuilder {
    /// Starts a builder: 4 workers, a 10/s global bucket, no per-category
    /// overrides, fairness and headroom disabled, 256-entry completed ring,
    /// no backpressure hook, no default retries.
    pub fn new() -> Self {
        Self {
            max_concurrent: 4,
            global_rate_limit: RateLimiterConfig::default(),
            default_category_rate_limit: RateLimiterConfig::default(),
            per_category_rate_limits: HashMap::new(),
            concurrency_caps: CapsConfig::default(),
            per_category_concurrency_caps: HashMap::new(),
            max_per_owner: 0,
            max_per_batch: 0,
            backoff: BackoffConfig::default(),
            headroom: HeadroomConfig::default(),
            max_completed: 256,
            backpressure_threshold: 0,
            default_retries: 0,
            default_retry_delay: Duration::from_millis(500),
            idle_poll_interval: Duration::from_millis(100),
        }
    }

    pub fn max_concurrent(mut self, max_concurrent: usize) -> Self {
        self.max_concurrent = max_concurrent.max(1);
        self
    }

    pub fn global_rate_limit(mut self, config: RateLimiterConfig) -> Self {
        self.global_rate_limit = config;
        self
    }

    pub fn default_category_rate_limit(mut self, config: RateLimiterConfig) -> Self {
        self.default_category_rate_limit = config;
        self
    }

    pub fn per_category_rate_limit(mut self, category: impl Into<String>, config: RateLimiterConfig) -> Self {
        self.per_category_rate_limits.insert(category.into(), config);
        self
    }

    pub fn concurrency_caps(mut self, config: CapsConfig) -> Self {
        self.concurrency_caps = config;
        self
    }

    pub fn per_category_concurrency_cap(mut self, category: impl Into<String>, config: CapsConfig) -> Self {
        self.per_category_concurrency_caps.insert(category.into(), config);
        self
    }

    pub fn max_per_owner(mut self, max_per_owner: usize) -> Self {
        self.max_per_owner = max_per_owner;
        self
    }

    pub fn max_per_batch(mut self, max_per_batch: usize) -> Self {
        self.max_per_batch = max_per_batch;
        self
    }

    pub fn backoff(mut self, config: BackoffConfig) -> Self {
        self.backoff = config;
        self
    }

    pub fn headroom(mut self, config: HeadroomConfig) -> Self {
        self.headroom = config;
        self
    }

    pub fn max_completed(mut self, max_completed: usize) -> Self {
        self.max_completed = max_completed;
        self
    }

    pub fn backpressure_threshold(mut self, threshold: usize) -> Self {
        self.backpressure_threshold = threshold;
        self
    }

    pub fn default_retries(mut self, default_retries: usize) -> Self {
        self.default_retries = default_retries;
        self
    }

    pub fn default_retry_delay(mut self, delay: Duration) -> Self {
        self.default_retry_delay = delay;
        self
    }

    pub fn idle_poll_interval(mut self, interval: Duration) -> Self {
        self.idle_poll_interval = interval;
        self
    }

    pub fn build(self) -> SchedulerConfig {
        SchedulerConfig {
            max_concurrent: self.max_concurrent,
            global_rate_limit: self.global_rate_limit,
            default_category_rate_limit: self.default_category_rate_limit,
            per_category_rate_limits: self.per_category_rate_limits,
            concurrency_caps: self.concurrency_caps,
            per_category_concurrency_caps: self.per_category_concurrency_caps,
            max_per_owner: self.max_per_owner,
            max_per_batch: self.max_per_batch,
            backoff: self.backoff,
            headroom: self.headroom,
            max_completed: self.max_completed,
            backpressure_threshold: self.backpressure_threshold,
            default_retries: self.default_retries,
            default_retry_delay: self.default_retry_delay,
            idle_poll_interval: self.idle_poll_interval,
        }
    }
}

impl Default for SchedulerConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
