//! Resource-headroom probing and the dispatch gate it drives.

use std::sync::{Arc, Mutex};
use std::time::Instant;

use crate::config::HeadroomConfig;

/// One probe's reading: how much of a resource exists, how much is in
/// use, and a label identifying the probe for diagnostics.
#[derive(Debug, Clone, PartialEq)]
pub struct ProbeReading {
    pub limit: f64,
    pub usage: f64,
    pub source: String,
}

/// A resource probe: a function returning the current `(limit, usage,
/// source_tag)` for one dimension of "spawn capacity" (open file
/// descriptors, process table slots, memory, ...).
pub type ResourceProbe = Arc<dyn Fn() -> ProbeReading + Send + Sync>;

/// The result of [`HeadroomGuard::check_headroom`].
#[derive(Debug, Clone, PartialEq)]
pub struct HeadroomDecision {
    pub allowed: bool,
    pub reason: Option<String>,
    pub source: Option<String>,
}

impl HeadroomDecision {
    fn allowed() -> Self {
        Self {
            allowed: true,
            reason: None,
            source: None,
        }
    }
}

struct GuardState {
    cached: Option<(ProbeReading, Instant)>,
    blocked: bool,
    block_reason: Option<String>,
    last_check_at: Option<Instant>,
}

/// Gates worker dispatch on host-reported spawn capacity.
///
/// Disabled (the default) or probe-less guards always allow dispatch, so
/// wiring one in accidentally with no probes registered is harmless.
pub struct HeadroomGuard {
    config: HeadroomConfig,
    probes: Vec<ResourceProbe>,
    state: Mutex<GuardState>,
    on_blocked: Option<Arc<dyn Fn(&str) + Send + Sync>>,
    on_unblocked: Option<Arc<dyn Fn() + Send + Sync>>,
}

impl HeadroomGuard {
    /// Starts a builder.
    pub fn builder(config: HeadroomConfig) -> HeadroomGuardBuilder {
        HeadroomGuardBuilder::new(config)
    }

    /// Evaluates whether dispatch should proceed right now.
    ///
    /// When disabled or no probes are registered, always allows. Otherwise
    /// samples (or reuses a cached sample from) the tightest-limit probe
    /// and compares against the configured thresholds.
    pub fn check_headroom(&self, now: Instant) -> HeadroomDecision {
        if !self.config.enabled || self.probes.is_empty() {
            return HeadroomDecision::allowed();
        }

        let mut state = self.state.lock().unwrap();
        state.last_check_at = Some(now);

        let reading = match &state.cached {
            Some((reading, sampled_at))
                if now.saturating_duration_since(*sampled_at) < self.config.cache_ttl =>
            {
                reading.clone()
            }
            _ => {
                let reading = self.sample_tightest();
                state.cached = Some((reading.clone(), now));
                reading
            }
        };

        let usage_ratio = if reading.limit > 0.0 {
            reading.usage / reading.limit
        } else {
            1.0
        };
        let headroom = reading.limit - reading.usage;

        let hard_blocked = usage_ratio >= self.config.threshold || headroom < self.config.min_headroom;

        let decision = if hard_blocked {
            HeadroomDecision {
                allowed: false,
                reason: Some(format!(
                    "{} reports {:.1}% usage ({:.1} headroom remaining)",
                    reading.source, usage_ratio * 100.0, headroom
                )),
                source: Some(reading.source.clone()),
            }
        } else if usage_ratio >= self.config.warn_threshold {
            HeadroomDecision {
                allowed: true,
                reason: Some(format!(
                    "{} approaching headroom limit ({:.1}% usage)",
                    reading.source, usage_ratio * 100.0
                )),
                source: Some(reading.source.clone()),
            }
        } else {
            HeadroomDecision {
                allowed: true,
                reason: None,
                source: Some(reading.source.clone()),
            }
        };

        self.apply_transition(&mut state, &decision);
        decision
    }

    fn apply_transition(&self, state: &mut GuardState, decision: &HeadroomDecision) {
        if !decision.allowed && !state.blocked {
            state.blocked = true;
            state.block_reason = decision.reason.clone();
            if let Some(on_blocked) = &self.on_blocked {
                on_blocked(decision.reason.as_deref().unwrap_or("headroom exhausted"));
            }
        } else if decision.allowed && state.blocked {
            state.blocked = false;
            state.block_reason = None;
            if let Some(on_unblocked) = &self.on_unblocked {
                on_unblocked();
            }
        }
    }

    fn sample_tightest(&self) -> ProbeReading {
        self.probes
            .iter()
            .map(|probe| probe())
            .min_by(|a, b| a.limit.partial_cmp(&b.limit).unwrap_or(std::cmp::Ordering::Equal))
            .expect("probes checked non-empty by caller")
    }

    /// Whether the guard is currently blocking dispatch.
    pub fn is_blocked(&self) -> bool {
        self.state.lock().unwrap().blocked
    }

    /// The reason given for the current block, if any.
    pub fn block_reason(&self) -> Option<String> {
        self.state.lock().unwrap().block_reason.clone()
    }
}

/// Builds a [`HeadroomGuard`].
pub struct HeadroomGuardBuilder {
    config: HeadroomConfig,
    probes: Vec<ResourceProbe>,
    on_blocked: Option<Arc<dyn Fn(&str) + Send + Sync>>,
    on_unblocked: Option<Arc<dyn Fn() + Send + Sync>>,
}

impl HeadroomGuardBuilder {
    fn new(config: HeadroomConfig) -> Self {
        Self {
            config,
            probes: Vec::new(),
            on_blocked: None,
            on_unblocked: None,
        }
    }

    /// Registers a resource probe. Order doesn't matter: the tightest
    /// limit wins regardless of registration order.
    pub fn probe(mut self, probe: impl Fn() -> ProbeReading + Send + Sync + 'static) -> Self {
        self.probes.push(Arc::new(probe));
        self
    }

    /// Registers the hook fired when the guard transitions into blocking.
    pub fn on_blocked(mut self, f: impl Fn(&str) + Send + Sync + 'static) -> Self {
        self.on_blocked = Some(Arc::new(f));
        self
    }

    /// Registers the hook fired when the guard releases a block.
    pub fn on_unblocked(mut self, f: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_unblocked = Some(Arc::new(f));
        self
    }

    /// Finalizes the guard.
    pub fn build(self) -> HeadroomGuard {
        HeadroomGuard {
            config: self.config,
            probes: self.probes,
            state: Mutex::new(GuardState {
                cached: None,
                blocked: false,
                block_reason: None,
                last_check_at: None,
            }),
            on_blocked: self.on_blocked,
            on_unblocked: self.on_unblocked,
        }
    }
}
