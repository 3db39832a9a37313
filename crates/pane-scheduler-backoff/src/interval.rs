//! Delay calculators. Separated from [`crate::BackoffController`] so the
//! formula can be swapped or tested in isolation.

use std::sync::Arc;
use std::time::Duration;

use pane_scheduler_core::Jitter;

/// Computes the base delay before the `attempt`-th retry (0-indexed: the
/// delay before the *first* retry is `interval(0)`).
pub trait IntervalFunction: Send + Sync {
    fn interval(&self, attempt: usize) -> Duration;
}

/// Always the same delay.
pub struct FixedInterval {
    delay: Duration,
}

impl FixedInterval {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }
}

impl IntervalFunction for FixedInterval {
    fn interval(&self, _attempt: usize) -> Duration {
        self.delay
    }
}

/// `min(max_delay, initial_delay * multiplier^attempt)`, unjittered.
pub struct ExponentialBackoff {
    initial_delay: Duration,
    multiplier: f64,
    max_delay: Duration,
}

impl ExponentialBackoff {
    pub fn new(initial_delay: Duration, multiplier: f64, max_delay: Duration) -> Self {
        Self {
            initial_delay,
            multiplier,
            max_delay,
        }
    }
}

impl IntervalFunction for ExponentialBackoff {
    fn interval(&self, attempt: usize) -> Duration {
        let factor = self.multiplier.powi(attempt as i32);
        let secs = self.initial_delay.as_secs_f64() * factor;
        Duration::from_secs_f64(secs.max(0.0)).min(self.max_delay)
    }
}

/// Wraps an [`ExponentialBackoff`] with symmetric jitter: the base delay is
/// multiplied by a uniform random factor in `[1 - jitter, 1 + jitter]`.
pub struct ExponentialRandomBackoff {
    inner: ExponentialBackoff,
    jitter: f64,
    jitter_source: Arc<dyn Jitter>,
}

impl ExponentialRandomBackoff {
    pub fn new(inner: ExponentialBackoff, jitter: f64, jitter_source: Arc<dyn Jitter>) -> Self {
        Self {
            inner,
            jitter: jitter.clamp(0.0, 1.0),
            jitter_source,
        }
    }
}

impl IntervalFunction for ExponentialRandomBackoff {
    fn interval(&self, attempt: usize) -> Duration {
        let base = self.inner.interval(attempt);
        if self.jitter <= 0.0 {
            return base;
        }
        let factor = self.jitter_source.sample(1.0 - self.jitter, 1.0 + self.jitter);
        Duration::from_secs_f64((base.as_secs_f64() * factor).max(0.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pane_scheduler_core::SeededJitter;

    #[test]
    fn fixed_interval_never_changes() {
        let interval = FixedInterval::new(Duration::from_millis(100));
        assert_eq!(interval.interval(0), interval.interval(9));
    }

    #[test]
    fn exponential_backoff_grows_then_saturates() {
        let interval = ExponentialBackoff::new(Duration::from_millis(100), 2.0, Duration::from_secs(1));
        assert_eq!(interval.interval(0), Duration::from_millis(100));
        assert_eq!(interval.interval(1), Duration::from_millis(200));
        assert_eq!(interval.interval(2), Duration::from_millis(400));
        assert_eq!(interval.interval(10), Duration::from_secs(1));
    }

    #[test]
    fn jittered_backoff_stays_within_bounds() {
        let jitter_source = Arc::new(SeededJitter::new(1));
        let interval = ExponentialRandomBackoff::new(
            ExponentialBackoff::new(Duration::from_millis(100), 2.0, Duration::from_secs(10)),
            0.2,
            jitter_source,
        );
        for attempt in 0..5 {
            let base = Duration::from_millis(100) * 2u32.pow(attempt as u32);
            let delay = interval.interval(attempt);
            assert!(delay.as_secs_f64() >= base.as_secs_f64() * 0.8 - 0.001);
            assert!(delay.as_secs_f64() <= base.as_secs_f64() * 1.2 + 0.001);
        }
    }

    #[test]
    fn zero_jitter_is_deterministic() {
        let jitter_source = Arc::new(SeededJitter::new(7));
        let interval = ExponentialRandomBackoff::new(
            ExponentialBackoff::new(Duration::from_millis(50), 3.0, Duration::from_secs(5)),
            0.0,
            jitter_source,
        );
        assert_eq!(interval.interval(2), Duration::from_millis(450));
    }
}
