//! Token-bucket rate limiting, global and per-category.

mod config;
mod limiter;
mod per_category;

pub use config::{RateLimiterConfig, RateLimiterConfigBuilder};
pub use limiter::{RateLimiter, RateLimiterStats, WaitOutcome};
pub use per_category::PerCategoryLimiter;
