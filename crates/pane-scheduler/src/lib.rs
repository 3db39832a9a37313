//! Worker pool that paces creation of pane-hosted agent processes: a
//! priority+fairness queue feeding workers gated by token-bucket rate
//! limits, per-category concurrency caps with failure cooldowns, a
//! resource-headroom guard, and error-classified jittered backoff with an
//! optional global pause.
//!
//! Composes [`pane_scheduler_core`], [`pane_scheduler_queue`],
//! [`pane_scheduler_ratelimiter`], [`pane_scheduler_caps`],
//! [`pane_scheduler_headroom`], and [`pane_scheduler_backoff`] behind one
//! [`Scheduler`] entry point; none of those crates need to be depended on
//! directly to use it, though their config and stats types are re-exported
//! here for callers who want to build or inspect them.

mod completed;
mod config;
mod executor;
mod pause;
mod scheduler;
mod stats;

pub use completed::CompletedRing;
pub use config::{SchedulerConfig, SchedulerConfigBuilder};
pub use executor::{Executor, FnExecutor};
pub use scheduler::{Scheduler, SchedulerBuilder};
pub use stats::{HeadroomStatus, SchedulerStats};

pub use pane_scheduler_backoff::{
    BackoffConfig, BackoffConfigBuilder, BackoffStats, ClassifiedError, ClassifyInput,
    ErrorClassifier, ErrorClassifierBuilder, FnPauseControl, NoopPauseControl, PauseControl,
    ResourceErrorKind, RetryBudget, TokenBucketBudget,
};
pub use pane_scheduler_caps::{CapsConfig, CapsConfigBuilder, CategoryStats};
pub use pane_scheduler_core::{
    BoxError, CancellationScope, Clock, Job, JobBuilder, JobId, JobKind, JobSnapshot, JobStatus,
    Jitter, Priority, RaceOutcome, SchedulerError, SchedulerEvent, SeededJitter, SystemClock,
    SystemJitter,
};
pub use pane_scheduler_headroom::{
    HeadroomConfig, HeadroomConfigBuilder, HeadroomDecision, ProbeReading, ResourceProbe,
};
pub use pane_scheduler_ratelimiter::{RateLimiterConfig, RateLimiterConfigBuilder, RateLimiterStats};
