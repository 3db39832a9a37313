//! An optional global ceiling on retries, independent of any one job's
//! `max_retries`. Guards against a flood of otherwise-individually-legal
//! retries overwhelming a recovering resource.

use std::sync::atomic::{AtomicI64, Ordering};

/// A global retry budget `BackoffController` may consult before granting
/// a retry. Not required: a controller built without one imposes no
/// global ceiling beyond each job's own `max_retries`.
pub trait RetryBudget: Send + Sync {
    /// Attempts to spend one unit of budget for a retry. `false` means the
    /// budget is exhausted and the retry should be denied.
    fn try_consume(&self) -> bool;
    /// Deposits budget back, called on every successful attempt.
    fn deposit(&self);
}

/// A token-bucket-shaped budget: `try_consume` withdraws one token (never
/// going below a configurable floor), `deposit` credits one back up to a
/// ceiling. Unlike the rate limiter's bucket this has no time-based
/// refill — it only grows from successes, so a sustained failure run
/// depletes it permanently until something succeeds.
pub struct TokenBucketBudget {
    balance: AtomicI64,
    min_balance: i64,
    max_balance: i64,
    deposit_amount: i64,
}

impl TokenBucketBudget {
    /// Creates a budget starting at `max_balance`, able to go as low as
    /// `min_balance` (typically 0 or negative to allow a short burst past
    /// exhaustion), crediting `deposit_amount` per success.
    pub fn new(max_balance: i64, min_balance: i64, deposit_amount: i64) -> Self {
        Self {
            balance: AtomicI64::new(max_balance),
            min_balance,
            max_balance,
            deposit_amount,
        }
    }

    /// Current balance, for stats.
    pub fn balance(&self) -> i64 {
        self.balance.load(Ordering::Relaxed)
    }
}

impl RetryBudget for TokenBucketBudget {
    fn try_consume(&self) -> bool {
        let mut current = self.balance.load(Ordering::Relaxed);
        loop {
            if current <= self.min_balance {
                return false;
            }
            match self.balance.compare_exchange_weak(
                current,
                current - 1,
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => return true,
                Err(observed) => current = observed,
            }
        }
    }

    fn deposit(&self) {
        let mut current = self.balance.load(Ordering::Relaxed);
        loop {
            let next = (current + self.deposit_amount).min(self.max_balance);
            match self.balance.compare_exchange_weak(
                current,
                next,
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => return,
                Err(observed) => current = observed,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exhausts_then_recovers_via_deposit() {
        let budget = TokenBucketBudget::new(2, 0, 1);
        assert!(budget.try_consume());
        assert!(budget.try_consume());
        assert!(!budget.try_consume());
        budget.deposit();
        assert!(budget.try_consume());
    }

    #[test]
    fn deposit_never_exceeds_max_balance() {
        let budget = TokenBucketBudget::new(1, 0, 5);
        budget.deposit();
        assert_eq!(budget.balance(), 1);
    }

    #[test]
    fn negative_floor_allows_a_short_burst_past_zero() {
        let budget = TokenBucketBudget::new(1, -2, 1);
        assert!(budget.try_consume());
        assert!(budget.try_consume());
        assert!(budget.try_consume());
        assert!(!budget.try_consume());
    }
}
