//! Composes one [`RateLimiter`] per job category.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use pane_scheduler_core::Clock;

use crate::config::RateLimiterConfig;
use crate::limiter::RateLimiter;

/// Lazily creates and caches one [`RateLimiter`] per category, falling
/// back to a shared default template for categories with no override.
pub struct PerCategoryLimiter {
    default_config: RateLimiterConfig,
    overrides: HashMap<String, RateLimiterConfig>,
    clock: Arc<dyn Clock>,
    limiters: RwLock<HashMap<String, Arc<RateLimiter>>>,
}

impl PerCategoryLimiter {
    /// Creates a composition with `default_config` as the template for any
    /// category without an explicit override.
    pub fn new(default_config: RateLimiterConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            default_config,
            overrides: HashMap::new(),
            clock,
            limiters: RwLock::new(HashMap::new()),
        }
    }

    /// Registers a per-category override, taking effect for limiters
    /// created after this call (existing cached limiters are unaffected).
    pub fn with_override(mut self, category: impl Into<String>, config: RateLimiterConfig) -> Self {
        self.overrides.insert(category.into(), config);
        self
    }

    /// Returns the limiter for `category`, creating it under a write lock
    /// on first use.
    pub fn get(&self, category: &str) -> Arc<RateLimiter> {
        if let Some(limiter) = self.limiters.read().unwrap().get(category) {
            return limiter.clone();
        }

        let mut limiters = self.limiters.write().unwrap();
        if let Some(limiter) = limiters.get(category) {
            return limiter.clone();
        }

        let config = self
            .overrides
            .get(category)
            .cloned()
            .unwrap_or_else(|| self.default_config.clone());
        let limiter = Arc::new(RateLimiter::new(config, self.clock.clone()));
        limiters.insert(category.to_string(), limiter.clone());
        limiter
    }

    /// Categories with a materialized limiter so far, for stats reporting.
    pub fn known_categories(&self) -> Vec<String> {
        self.limiters.read().unwrap().keys().cloned().collect()
    }
}
