//! Per-category concurrency caps with failure-driven cooldowns.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::config::CapsConfig;

struct CategoryState {
    config: CapsConfig,
    in_use: usize,
    failure_streak: u32,
    cooldown_until: Option<Instant>,
}

impl CategoryState {
    fn new(config: CapsConfig) -> Self {
        Self {
            config,
            in_use: 0,
            failure_streak: 0,
            cooldown_until: None,
        }
    }

    /// `limit - cooldown_penalty(failure_streak)`, bounded to at least 1 so
    /// a category is never fully wedged shut by its own failure history.
    fn effective_limit(&self) -> usize {
        let penalty = (self.failure_streak as usize).min(self.config.limit.saturating_sub(1));
        (self.config.limit - penalty).max(1)
    }

    fn in_cooldown(&self, now: Instant) -> bool {
        self.cooldown_until.is_some_and(|until| now < until)
    }
}

/// A snapshot of one category's cap state, for `stats()`.
#[derive(Debug, Clone, serde::Serialize)]
pub struct CategoryStats {
    pub limit: usize,
    pub effective_limit: usize,
    pub in_use: usize,
    pub failure_streak: u32,
    #[serde(skip)]
    pub cooldown_remaining: Duration,
}

/// Live in-use counters and failure-driven cooldowns, one set per category.
///
/// Caps are advisory: the scheduler only attempts acquisition once a job
/// has already cleared every other admission gate.
pub struct ConcurrencyCaps {
    default_config: CapsConfig,
    overrides: HashMap<String, CapsConfig>,
    categories: Mutex<HashMap<String, CategoryState>>,
}

impl ConcurrencyCaps {
    /// Creates a cap set using `default_config` as the template for any
    /// category without an explicit override.
    pub fn new(default_config: CapsConfig) -> Self {
        Self {
            default_config,
            overrides: HashMap::new(),
            categories: Mutex::new(HashMap::new()),
        }
    }

    /// Registers a per-category override.
    pub fn with_override(mut self, category: impl Into<String>, config: CapsConfig) -> Self {
        self.overrides.insert(category.into(), config);
        self
    }

    /// Succeeds iff `in_use < effective_limit` and the category isn't in
    /// cooldown. Increments `in_use` on success.
    pub fn try_acquire(&self, category: &str, now: Instant) -> bool {
        let mut categories = self.categories.lock().unwrap();
        let state = self.entry(&mut categories, category);

        if state.in_cooldown(now) {
            return false;
        }
        if state.in_use >= state.effective_limit() {
            return false;
        }
        state.in_use += 1;
        true
    }

    /// Releases a previously acquired slot.
    pub fn release(&self, category: &str) {
        let mut categories = self.categories.lock().unwrap();
        if let Some(state) = categories.get_mut(category) {
            state.in_use = state.in_use.saturating_sub(1);
        }
    }

    /// Extends the category's cooldown and grows its failure streak.
    /// `cooldown_until = now + min(max_cooldown, base_cooldown * 2^(streak - 1))`.
    pub fn record_failure(&self, category: &str, now: Instant) {
        let mut categories = self.categories.lock().unwrap();
        let state = self.entry(&mut categories, category);

        state.failure_streak = state.failure_streak.saturating_add(1);
        let exponent = state.failure_streak.saturating_sub(1).min(32);
        let scaled = state.config.base_cooldown.saturating_mul(1u32 << exponent);
        let cooldown = scaled.min(state.config.max_cooldown);
        state.cooldown_until = Some(now + cooldown);
    }

    /// Resets the failure streak. Does not clear an in-progress cooldown
    /// early; the cooldown already committed to runs its course.
    pub fn record_success(&self, category: &str) {
        let mut categories = self.categories.lock().unwrap();
        if let Some(state) = categories.get_mut(category) {
            state.failure_streak = 0;
        }
    }

    /// The category's current effective limit.
    pub fn effective_limit(&self, category: &str) -> usize {
        let mut categories = self.categories.lock().unwrap();
        self.entry(&mut categories, category).effective_limit()
    }

    /// Current in-use count for one category.
    pub fn in_use(&self, category: &str) -> usize {
        self.categories
            .lock()
            .unwrap()
            .get(category)
            .map(|s| s.in_use)
            .unwrap_or(0)
    }

    /// Total in-use count across every category, for top-level stats.
    pub fn total_in_use(&self) -> usize {
        self.categories.lock().unwrap().values().map(|s| s.in_use).sum()
    }

    /// A consistent snapshot of every category touched so far.
    pub fn stats(&self, now: Instant) -> HashMap<String, CategoryStats> {
        self.categories
            .lock()
            .unwrap()
            .iter()
            .map(|(category, state)| {
                let cooldown_remaining = state
                    .cooldown_until
                    .map(|until| until.saturating_duration_since(now))
                    .unwrap_or(Duration::ZERO);
                (
                    category.clone(),
                    CategoryStats {
                        limit: state.config.limit,
                        effective_limit: state.effective_limit(),
                        in_use: state.in_use,
                        failure_streak: state.failure_streak,
                        cooldown_remaining,
                    },
                )
            })
            .collect()
    }

    fn entry<'a>(
        &self,
        categories: &'a mut HashMap<String, CategoryState>,
        category: &str,
    ) -> &'a mut CategoryState {
        categories.entry(category.to_string()).or_insert_with(|| {
            let config = self
                .overrides
                .get(category)
                .cloned()
                .unwrap_or_else(|| self.default_config.clone());
            CategoryState::new(config)
        })
    }
}
