//! Composes the interval function, the (already-classified) error, and the
//! optional global pause into the one decision the worker loop needs:
//! retry or not, and if so, after how long.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use pane_scheduler_core::{Jitter, SystemJitter};

use crate::budget::RetryBudget;
use crate::classifier::{ClassifiedError, ResourceErrorKind};
use crate::interval::{ExponentialBackoff, ExponentialRandomBackoff, IntervalFunction};
use crate::pause::{NoopPauseControl, PauseControl};
use crate::BackoffConfig;

/// A job is owned by `pane-scheduler-core`; the controller only needs the
/// two facts it decides on, so it takes them by value rather than naming
/// the `Job` type and creating a dependency cycle.
pub struct RetryContext {
    /// Attempts already made (0 before the first run).
    pub retry_count: usize,
    /// Whether another attempt is still allowed under the job's own
    /// `max_retries`.
    pub can_retry: bool,
    /// The job's configured fallback delay, used for non-resource errors.
    pub base_retry_delay: Duration,
}

/// The outcome of [`BackoffController::handle_error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffDecision {
    pub should_retry: bool,
    pub delay: Duration,
}

impl BackoffDecision {
    fn no_retry() -> Self {
        Self {
            should_retry: false,
            delay: Duration::ZERO,
        }
    }
}

/// A consistent snapshot of the controller's global state, for `stats()`.
#[derive(Debug, Clone, serde::Serialize)]
pub struct BackoffStats {
    pub total_retries: u64,
    pub consecutive_resource_failures: u64,
    pub in_global_pause: bool,
    #[serde(skip)]
    pub pause_remaining: Duration,
    pub last_reason: Option<ResourceErrorKind>,
}

/// Per-job delay calculation plus the cross-job consecutive-failure
/// counter that can trip a scheduler-wide pause.
///
/// Held behind an `Arc` by its owner: tripping a pause schedules a
/// delayed auto-resume task that needs to outlive the call that created
/// it, so the controller must be cheaply shareable with that task.
pub struct BackoffController {
    config: BackoffConfig,
    interval: ExponentialRandomBackoff,
    pause: Arc<dyn PauseControl>,
    budget: Option<Arc<dyn RetryBudget>>,
    consecutive_resource_failures: AtomicU64,
    in_global_pause: AtomicBool,
    pause_until: Mutex<Option<Instant>>,
    last_reason: Mutex<Option<ResourceErrorKind>>,
    pause_generation: AtomicU64,
    total_retries: AtomicU64,
}

impl BackoffController {
    /// Starts a builder.
    pub fn builder(config: BackoffConfig) -> BackoffControllerBuilder {
        BackoffControllerBuilder::new(config)
    }

    /// Decides whether `job` should retry and, if so, after how long.
    ///
    /// `classified` is the output of `ErrorClassifier::classify` for this
    /// attempt's failure, or `None` for an unclassified error. See
    /// spec.md §4.8 for the branch table this mirrors.
    pub fn handle_error(
        self: &Arc<Self>,
        job: &RetryContext,
        classified: Option<ClassifiedError>,
        now: Instant,
    ) -> BackoffDecision {
        match classified {
            Some(classified) if classified.retryable && job.can_retry && self.consume_budget() => {
                let delay = self.interval.interval(job.retry_count);
                *self.last_reason.lock().unwrap() = Some(classified.kind);
                self.total_retries.fetch_add(1, Ordering::SeqCst);
                let failures = self.consecutive_resource_failures.fetch_add(1, Ordering::SeqCst) + 1;

                if self.config.pause_queue_on_backoff
                    && failures >= self.config.consecutive_failures_threshold as u64
                {
                    self.trip_global_pause(now, delay);
                }

                BackoffDecision {
                    should_retry: true,
                    delay,
                }
            }
            Some(_) => BackoffDecision::no_retry(),
            None if job.can_retry => {
                self.total_retries.fetch_add(1, Ordering::SeqCst);
                BackoffDecision {
                    should_retry: true,
                    delay: job.base_retry_delay,
                }
            }
            None => BackoffDecision::no_retry(),
        }
    }

    /// Resets the consecutive-failure counter and, if a global pause is in
    /// effect, ends it immediately rather than waiting for the scheduled
    /// auto-resume.
    pub fn record_success(&self) {
        self.consecutive_resource_failures.store(0, Ordering::SeqCst);
        if let Some(budget) = &self.budget {
            budget.deposit();
        }
        if self.in_global_pause.swap(false, Ordering::SeqCst) {
            *self.pause_until.lock().unwrap() = None;
            self.pause_generation.fetch_add(1, Ordering::SeqCst);
            self.pause.resume();
        }
    }

    /// A consistent snapshot of the controller's counters.
    pub fn stats(&self, now: Instant) -> BackoffStats {
        let pause_until = *self.pause_until.lock().unwrap();
        BackoffStats {
            total_retries: self.total_retries.load(Ordering::SeqCst),
            consecutive_resource_failures: self.consecutive_resource_failures.load(Ordering::SeqCst),
            in_global_pause: self.in_global_pause.load(Ordering::SeqCst),
            pause_remaining: pause_until
                .map(|until| until.saturating_duration_since(now))
                .unwrap_or(Duration::ZERO),
            last_reason: *self.last_reason.lock().unwrap(),
        }
    }

    /// Whether a global pause is currently in effect.
    pub fn in_global_pause(&self) -> bool {
        self.in_global_pause.load(Ordering::SeqCst)
    }

    fn consume_budget(&self) -> bool {
        match &self.budget {
            Some(budget) => budget.try_consume(),
            None => true,
        }
    }

    fn trip_global_pause(self: &Arc<Self>, now: Instant, delay: Duration) {
        self.in_global_pause.store(true, Ordering::SeqCst);
        *self.pause_until.lock().unwrap() = Some(now + delay);
        let generation = self.pause_generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.pause.pause();

        let controller = Arc::clone(self);
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            controller.auto_resume(generation);
        });
    }

    /// Ends the pause started at `generation`, unless a more recent pause
    /// (or an intervening `record_success`) has already superseded it.
    fn auto_resume(&self, generation: u64) {
        if self.pause_generation.load(Ordering::SeqCst) != generation {
            return;
        }
        if self.in_global_pause.swap(false, Ordering::SeqCst) {
            *self.pause_until.lock().unwrap() = None;
            self.pause.resume();
        }
    }
}

/// Builds a [`BackoffController`]. Always returns an `Arc` since the
/// controller must be shareable with its own auto-resume tasks.
pub struct BackoffControllerBuilder {
    config: BackoffConfig,
    jitter_source: Arc<dyn Jitter>,
    pause: Arc<dyn PauseControl>,
    budget: Option<Arc<dyn RetryBudget>>,
}

impl BackoffControllerBuilder {
    fn new(config: BackoffConfig) -> Self {
        Self {
            config,
            jitter_source: Arc::new(SystemJitter),
            pause: Arc::new(NoopPauseControl),
            budget: None,
        }
    }

    /// Overrides the jitter source. Tests should inject a `SeededJitter`
    /// for reproducible delay sequences.
    pub fn jitter_source(mut self, jitter_source: Arc<dyn Jitter>) -> Self {
        self.jitter_source = jitter_source;
        self
    }

    /// Wires the controller to the owning scheduler's pause/resume. A
    /// controller built without this call is a no-op on pause trip.
    pub fn pause_control(mut self, pause: Arc<dyn PauseControl>) -> Self {
        self.pause = pause;
        self
    }

    /// Adds a global retry-budget guard on top of each job's own
    /// `max_retries`. Omitted by default: no budget beyond per-job limits.
    pub fn retry_budget(mut self, budget: Arc<dyn RetryBudget>) -> Self {
        self.budget = Some(budget);
        self
    }

    /// Finalizes the controller.
    pub fn build(self) -> Arc<BackoffController> {
        let interval = ExponentialRandomBackoff::new(
            ExponentialBackoff::new(self.config.initial_delay, self.config.multiplier, self.config.max_delay),
            self.config.jitter,
            self.jitter_source,
        );

        Arc::new(BackoffController {
            config: self.config,
            interval,
            pause: self.pause,
            budget: self.budget,
            consecutive_resource_failures: AtomicU64::new(0),
            in_global_pause: AtomicBool::new(false),
            pause_until: Mutex::new(None),
            last_reason: Mutex::new(None),
            pause_generation: AtomicU64::new(0),
            total_retries: AtomicU64::new(0),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::budget::TokenBucketBudget;
    use crate::classifier::ResourceErrorKind;
    use crate::config::BackoffConfigBuilder;
    use pane_scheduler_core::SeededJitter;
    use std::sync::atomic::AtomicUsize;

    fn ctx(retry_count: usize, max_retries: usize) -> RetryContext {
        RetryContext {
            retry_count,
            can_retry: retry_count < max_retries,
            base_retry_delay: Duration::from_millis(250),
        }
    }

    fn resource_error(kind: ResourceErrorKind) -> Option<ClassifiedError> {
        Some(ClassifiedError { kind, retryable: true })
    }

    #[test]
    fn resource_error_grants_retry_with_scaled_delay() {
        let controller = BackoffController::builder(
            BackoffConfigBuilder::new()
                .initial_delay(Duration::from_millis(100))
                .multiplier(2.0)
                .jitter(0.0)
                .max_delay(Duration::from_secs(10))
                .build(),
        )
        .build();

        let now = Instant::now();
        let decision = controller.handle_error(
            &ctx(0, 5),
            resource_error(ResourceErrorKind::OutOfMemory),
            now,
        );
        assert!(decision.should_retry);
        assert_eq!(decision.delay, Duration::from_millis(100));

        let decision2 = controller.handle_error(
            &ctx(1, 5),
            resource_error(ResourceErrorKind::OutOfMemory),
            now,
        );
        assert_eq!(decision2.delay, Duration::from_millis(200));
    }

    #[test]
    fn retries_exhausted_denies_even_a_resource_error() {
        let controller = BackoffController::builder(BackoffConfigBuilder::new().build()).build();
        let decision = controller.handle_error(
            &ctx(5, 5),
            resource_error(ResourceErrorKind::OutOfMemory),
            Instant::now(),
        );
        assert!(!decision.should_retry);
        assert_eq!(decision.delay, Duration::ZERO);
    }

    #[test]
    fn non_resource_error_uses_the_jobs_base_delay() {
        let controller = BackoffController::builder(BackoffConfigBuilder::new().build()).build();
        let decision = controller.handle_error(&ctx(0, 3), None, Instant::now());
        assert!(decision.should_retry);
        assert_eq!(decision.delay, Duration::from_millis(250));
    }

    #[test]
    fn non_resource_error_does_not_advance_consecutive_failures() {
        let controller = BackoffController::builder(BackoffConfigBuilder::new().build()).build();
        controller.handle_error(&ctx(0, 3), None, Instant::now());
        assert_eq!(controller.stats(Instant::now()).consecutive_resource_failures, 0);
    }

    #[test]
    fn success_resets_consecutive_failures() {
        let controller = BackoffController::builder(BackoffConfigBuilder::new().build()).build();
        controller.handle_error(
            &ctx(0, 5),
            resource_error(ResourceErrorKind::RateLimited),
            Instant::now(),
        );
        assert_eq!(controller.stats(Instant::now()).consecutive_resource_failures, 1);
        controller.record_success();
        assert_eq!(controller.stats(Instant::now()).consecutive_resource_failures, 0);
    }

    #[tokio::test]
    async fn threshold_trips_global_pause_and_calls_pause_control() {
        let pauses = Arc::new(AtomicUsize::new(0));
        let resumes = Arc::new(AtomicUsize::new(0));
        let p = pauses.clone();
        let r = resumes.clone();

        let controller = BackoffController::builder(
            BackoffConfigBuilder::new()
                .consecutive_failures_threshold(2)
                .pause_queue_on_backoff(true)
                .initial_delay(Duration::from_millis(5))
                .jitter(0.0)
                .build(),
        )
        .pause_control(Arc::new(crate::pause::FnPauseControl::new(
            move || {
                p.fetch_add(1, Ordering::SeqCst);
            },
            move || {
                r.fetch_add(1, Ordering::SeqCst);
            },
        )))
        .build();

        let now = Instant::now();
        controller.handle_error(&ctx(0, 5), resource_error(ResourceErrorKind::OutOfMemory), now);
        assert!(!controller.in_global_pause());
        controller.handle_error(&ctx(1, 5), resource_error(ResourceErrorKind::OutOfMemory), now);
        assert!(controller.in_global_pause());
        assert_eq!(pauses.load(Ordering::SeqCst), 1);

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!controller.in_global_pause());
        assert_eq!(resumes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn retry_budget_exhaustion_denies_retry_even_for_a_resource_error() {
        let controller = BackoffController::builder(BackoffConfigBuilder::new().build())
            .retry_budget(Arc::new(TokenBucketBudget::new(0, 0, 1)))
            .build();
        let decision = controller.handle_error(
            &ctx(0, 5),
            resource_error(ResourceErrorKind::OutOfMemory),
            Instant::now(),
        );
        assert!(!decision.should_retry);
    }

    #[test]
    fn jitter_source_is_honored() {
        let controller = BackoffController::builder(
            BackoffConfigBuilder::new()
                .initial_delay(Duration::from_millis(100))
                .jitter(0.5)
                .build(),
        )
        .jitter_source(Arc::new(SeededJitter::new(99)))
        .build();
        let decision = controller.handle_error(
            &ctx(0, 3),
            resource_error(ResourceErrorKind::OutOfMemory),
            Instant::now(),
        );
        assert!(decision.delay >= Duration::from_millis(50));
        assert!(decision.delay <= Duration::from_millis(150));
    }
}
