use std::time::Duration;

/// Tuning knobs for [`crate::BackoffController`].
///
/// `max_retries` is deliberately absent here: retry eligibility is a
/// per-job property (`Job::max_retries`/`can_retry()`); the scheduler's
/// `default_retries` config option is what fills it in when a submitted
/// job leaves it unset. Duplicating a ceiling here would give two
/// disagreeing sources of truth for the same question.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct BackoffConfig {
    /// Base delay scaled by `multiplier^attempt`.
    pub initial_delay: Duration,
    /// Ceiling the exponential schedule saturates at.
    pub max_delay: Duration,
    /// Growth factor applied per attempt.
    pub multiplier: f64,
    /// Symmetric jitter fraction in `[0, 1]`; the computed delay is scaled
    /// by a uniform factor in `[1 - jitter, 1 + jitter]`.
    pub jitter: f64,
    /// Consecutive resource failures (across all jobs) required to trip a
    /// global dispatch pause, when `pause_queue_on_backoff` is set.
    pub consecutive_failures_threshold: u32,
    /// Whether reaching the consecutive-failure threshold pauses the
    /// whole scheduler until the tripping job's backoff delay elapses.
    pub pause_queue_on_backoff: bool,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        BackoffConfigBuilder::new().build()
    }
}

/// Builds a [`BackoffConfig`].
pub struct BackoffConfigBuilder {
    initial_delay: Duration,
    max_delay: Duration,
    multiplier: f64,
    jitter: f64,
    consecutive_failures_threshold: u32,
    pause_queue_on_backoff: bool,
}

impl BackoffConfigBuilder {
    /// Starts a builder: 500ms initial delay doubling up to 30s, 10%
    /// jitter, a threshold of 5 consecutive failures, pause disabled.
    pub fn new() -> Self {
        Self {
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
            multiplier: 2.0,
            jitter: 0.1,
            consecutive_failures_threshold: 5,
            pause_queue_on_backoff: false,
        }
    }

    pub fn initial_delay(mut self, initial_delay: Duration) -> Self {
        self.initial_delay = initial_delay;
        self
    }

    pub fn max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = max_delay;
        self
    }

    pub fn multiplier(mut self, multiplier: f64) -> Self {
        self.multiplier = multiplier;
        self
    }

    pub fn jitter(mut self, jitter: f64) -> Self {
        self.jitter = jitter.clamp(0.0, 1.0);
        self
    }

    pub fn consecutive_failures_threshold(mut self, threshold: u32) -> Self {
        self.consecutive_failures_threshold = threshold.max(1);
        self
    }

    pub fn pause_queue_on_backoff(mut self, pause: bool) -> Self {
        self.pause_queue_on_backoff = pause;
        self
    }

    pub fn build(self) -> BackoffConfig {
        BackoffConfig {
            initial_delay: self.initial_delay,
            max_delay: self.max_delay,
            multiplier: self.multiplier,
            jitter: self.jitter,
            consecutive_failures_threshold: self.consecutive_failures_threshold,
            pause_queue_on_backoff: self.pause_queue_on_backoff,
        }
    }
}

impl Default for BackoffConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
