use std::time::Duration;

/// Per-category concurrency cap parameters.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct CapsConfig {
    /// Maximum concurrently in-use slots before any cooldown penalty.
    pub limit: usize,
    /// Cooldown length after the first consecutive failure.
    pub base_cooldown: Duration,
    /// Ceiling the exponential cooldown schedule saturates at.
    pub max_cooldown: Duration,
}

impl Default for CapsConfig {
    fn default() -> Self {
        CapsConfigBuilder::new().build()
    }
}

/// Builds a [`CapsConfig`].
pub struct CapsConfigBuilder {
    limit: usize,
    base_cooldown: Duration,
    max_cooldown: Duration,
}

impl CapsConfigBuilder {
    /// Starts a builder with a limit of 4, a 1s base cooldown doubling up
    /// to a 5 minute ceiling.
    pub fn new() -> Self {
        Self {
            limit: 4,
            base_cooldown: Duration::from_secs(1),
            max_cooldown: Duration::from_secs(300),
        }
    }

    /// Sets the concurrency limit.
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    /// Sets the cooldown applied after a single failure.
    pub fn base_cooldown(mut self, base_cooldown: Duration) -> Self {
        self.base_cooldown = base_cooldown;
        self
    }

    /// Sets the ceiling the cooldown schedule saturates at.
    pub fn max_cooldown(mut self, max_cooldown: Duration) -> Self {
        self.max_cooldown = max_cooldown;
        self
    }

    /// Finalizes the configuration.
    pub fn build(self) -> CapsConfig {
        CapsConfig {
            limit: self.limit,
            base_cooldown: self.base_cooldown,
            max_cooldown: self.max_cooldown,
        }
    }
}

impl Default for CapsConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
