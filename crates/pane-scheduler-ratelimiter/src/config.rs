use std::time::Duration;

/// Parameters for one token bucket.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct RateLimiterConfig {
    /// Tokens added per second.
    pub rate: f64,
    /// Maximum tokens the bucket can hold.
    pub capacity: f64,
    /// Minimum spacing enforced between two granted operations,
    /// independent of token availability. Zero disables the gap check.
    pub min_gap: Duration,
}

impl Default for RateLimiterConfig {
    fn default() -> Self {
        RateLimiterConfigBuilder::new().build()
    }
}

/// Builds a [`RateLimiterConfig`].
pub struct RateLimiterConfigBuilder {
    rate: f64,
    capacity: f64,
    min_gap: Duration,
}

impl RateLimiterConfigBuilder {
    /// Starts a builder with sensible defaults: 10 tokens/sec, capacity 10,
    /// no minimum gap.
    pub fn new() -> Self {
        Self {
            rate: 10.0,
            capacity: 10.0,
            min_gap: Duration::ZERO,
        }
    }

    /// Sets the refill rate in tokens per second.
    pub fn rate(mut self, rate: f64) -> Self {
        self.rate = rate;
        self
    }

    /// Sets the bucket's maximum token capacity.
    pub fn capacity(mut self, capacity: f64) -> Self {
        self.capacity = capacity;
        self
    }

    /// Sets the minimum spacing between granted operations.
    pub fn min_gap(mut self, min_gap: Duration) -> Self {
        self.min_gap = min_gap;
        self
    }

    /// Finalizes the configuration.
    pub fn build(self) -> RateLimiterConfig {
        RateLimiterConfig {
            rate: self.rate,
            capacity: self.capacity,
            min_gap: self.min_gap,
        }
    }
}

impl Default for RateLimiterConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
