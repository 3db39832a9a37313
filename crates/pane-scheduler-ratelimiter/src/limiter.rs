//! Token-bucket rate limiter.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use pane_scheduler_core::{CancellationScope, Clock, RaceOutcome};

use crate::config::RateLimiterConfig;

struct State {
    tokens: f64,
    last_refill_at: Instant,
    last_op_at: Option<Instant>,
}

#[derive(Default)]
struct Counters {
    granted: AtomicU64,
    waited: AtomicU64,
    cancelled: AtomicU64,
    total_wait_nanos: AtomicU64,
    max_wait_nanos: AtomicU64,
}

/// Outcome of a [`RateLimiter::wait`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    /// A token was granted.
    Granted,
    /// The caller's cancellation scope fired before a token was available.
    Cancelled,
}

/// A point-in-time snapshot of a limiter's counters, for `stats()`.
#[derive(Debug, Clone, serde::Serialize)]
pub struct RateLimiterStats {
    pub granted: u64,
    pub waited: u64,
    pub cancelled: u64,
    #[serde(skip)]
    pub avg_wait: Duration,
    #[serde(skip)]
    pub max_wait: Duration,
    pub current_tokens: f64,
}

/// Token bucket with a minimum inter-operation gap.
///
/// `wait()` is the cooperative, cancellation-aware primary operation;
/// `try_acquire()` is its non-blocking sibling.
pub struct RateLimiter {
    config: RateLimiterConfig,
    clock: Arc<dyn Clock>,
    state: Mutex<State>,
    counters: Counters,
}

impl RateLimiter {
    /// Creates a limiter starting with a full bucket.
    pub fn new(config: RateLimiterConfig, clock: Arc<dyn Clock>) -> Self {
        let now = clock.now();
        let capacity = config.capacity;
        Self {
            config,
            clock,
            state: Mutex::new(State {
                tokens: capacity,
                last_refill_at: now,
                last_op_at: None,
            }),
            counters: Counters::default(),
        }
    }

    /// Waits until a token is available, or until `scope` is cancelled.
    pub async fn wait(&self, scope: &CancellationScope) -> WaitOutcome {
        loop {
            let now = self.clock.now();
            let sleep_for = {
                let mut state = self.state.lock().unwrap();
                self.refill_locked(&mut state, now);

                let gap_remaining = self.gap_remaining_locked(&state, now);
                if gap_remaining > Duration::ZERO {
                    Some(gap_remaining)
                } else if state.tokens >= 1.0 {
                    state.tokens -= 1.0;
                    state.last_op_at = Some(now);
                    None
                } else {
                    let deficit = 1.0 - state.tokens;
                    Some(Duration::from_secs_f64((deficit / self.config.rate).max(0.0)))
                }
            };

            let Some(sleep_for) = sleep_for else {
                self.counters.granted.fetch_add(1, Ordering::Relaxed);
                return WaitOutcome::Granted;
            };

            self.counters.waited.fetch_add(1, Ordering::Relaxed);
            self.record_wait(sleep_for);

            match scope.sleep(sleep_for).await {
                RaceOutcome::Cancelled => {
                    self.counters.cancelled.fetch_add(1, Ordering::Relaxed);
                    return WaitOutcome::Cancelled;
                }
                RaceOutcome::Completed(()) => continue,
            }
        }
    }

    /// Attempts to acquire a token without sleeping.
    pub fn try_acquire(&self) -> bool {
        let now = self.clock.now();
        let mut state = self.state.lock().unwrap();
        self.refill_locked(&mut state, now);

        if self.gap_remaining_locked(&state, now) > Duration::ZERO {
            return false;
        }

        if state.tokens >= 1.0 {
            state.tokens -= 1.0;
            state.last_op_at = Some(now);
            self.counters.granted.fetch_add(1, Ordering::Relaxed);
            true
        } else {
            false
        }
    }

    /// The larger of the min-gap residual and the token-deficit wait,
    /// without mutating any state.
    pub fn time_until_next_token(&self) -> Duration {
        let now = self.clock.now();
        let mut state = self.state.lock().unwrap();
        self.refill_locked(&mut state, now);

        let gap_remaining = self.gap_remaining_locked(&state, now);
        if state.tokens >= 1.0 {
            gap_remaining
        } else {
            let deficit = 1.0 - state.tokens;
            let token_wait = Duration::from_secs_f64((deficit / self.config.rate).max(0.0));
            gap_remaining.max(token_wait)
        }
    }

    /// A consistent snapshot of this limiter's counters, under one lock
    /// acquisition.
    pub fn stats(&self) -> RateLimiterStats {
        let state = self.state.lock().unwrap();
        let granted = self.counters.granted.load(Ordering::Relaxed);
        let waited = self.counters.waited.load(Ordering::Relaxed);
        let total_wait = Duration::from_nanos(self.counters.total_wait_nanos.load(Ordering::Relaxed));
        let avg_wait = if waited > 0 {
            total_wait / waited as u32
        } else {
            Duration::ZERO
        };

        RateLimiterStats {
            granted,
            waited,
            cancelled: self.counters.cancelled.load(Ordering::Relaxed),
            avg_wait,
            max_wait: Duration::from_nanos(self.counters.max_wait_nanos.load(Ordering::Relaxed)),
            current_tokens: state.tokens,
        }
    }

    fn refill_locked(&self, state: &mut State, now: Instant) {
        let elapsed = now.saturating_duration_since(state.last_refill_at);
        let refill = elapsed.as_secs_f64() * self.config.rate;
        state.tokens = (state.tokens + refill).min(self.config.capacity);
        state.last_refill_at = now;
    }

    fn gap_remaining_locked(&self, state: &State, now: Instant) -> Duration {
        if self.config.min_gap.is_zero() {
            return Duration::ZERO;
        }
        match state.last_op_at {
            None => Duration::ZERO,
            Some(last) => self
                .config
                .min_gap
                .saturating_sub(now.saturating_duration_since(last)),
        }
    }

    fn record_wait(&self, wait: Duration) {
        let nanos = wait.as_nanos().min(u64::MAX as u128) as u64;
        self.counters.total_wait_nanos.fetch_add(nanos, Ordering::Relaxed);
        self.counters.max_wait_nanos.fetch_max(nanos, Ordering::Relaxed);
    }
}
