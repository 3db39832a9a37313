//! Per-category concurrency caps with failure-driven cooldowns.

mod caps;
mod config;

pub use caps::{CategoryStats, ConcurrencyCaps};
pub use config::{CapsConfig, CapsConfigBuilder};
