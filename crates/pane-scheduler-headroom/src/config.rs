use std::time::Duration;

/// Tuning knobs for [`crate::HeadroomGuard`].
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct HeadroomConfig {
    /// When false, `check_headroom()` always allows and no probe runs.
    pub enabled: bool,
    /// Hard threshold: usage/limit at or above this blocks dispatch.
    pub threshold: f64,
    /// Soft threshold: usage/limit at or above this emits a warning hook
    /// but still allows dispatch.
    pub warn_threshold: f64,
    /// Minimum absolute headroom (`limit - usage`) required to allow
    /// dispatch, independent of the ratio thresholds.
    pub min_headroom: f64,
    /// How often the guard is expected to be polled proactively outside
    /// the dispatch path (informational; the guard itself is read-driven).
    pub recheck_interval: Duration,
    /// How long a probe reading is considered fresh before it's resampled.
    pub cache_ttl: Duration,
}

impl Default for HeadroomConfig {
    fn default() -> Self {
        HeadroomConfigBuilder::new().build()
    }
}

/// Builds a [`HeadroomConfig`].
pub struct HeadroomConfigBuilder {
    enabled: bool,
    threshold: f64,
    warn_threshold: f64,
    min_headroom: f64,
    recheck_interval: Duration,
    cache_ttl: Duration,
}

impl HeadroomConfigBuilder {
    /// Starts a builder: disabled by default (no probes configured is a
    /// common case and should never surprise a caller by blocking).
    pub fn new() -> Self {
        Self {
            enabled: false,
            threshold: 0.95,
            warn_threshold: 0.85,
            min_headroom: 1.0,
            recheck_interval: Duration::from_secs(5),
            cache_ttl: Duration::from_millis(500),
        }
    }

    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn warn_threshold(mut self, warn_threshold: f64) -> Self {
        self.warn_threshold = warn_threshold;
        self
    }

    pub fn min_headroom(mut self, min_headroom: f64) -> Self {
        self.min_headroom = min_headroom;
        self
    }

    pub fn recheck_interval(mut self, recheck_interval: Duration) -> Self {
        self.recheck_interval = recheck_interval;
        self
    }

    pub fn cache_ttl(mut self, cache_ttl: Duration) -> Self {
        self.cache_ttl = cache_ttl;
        self
    }

    pub fn build(self) -> HeadroomConfig {
        HeadroomConfig {
            enabled: self.enabled,
            threshold: self.threshold,
            warn_threshold: self.warn_threshold,
            min_headroom: self.min_headroom,
            recheck_interval: self.recheck_interval,
            cache_ttl: self.cache_ttl,
        }
    }
}

impl Default for HeadroomConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
