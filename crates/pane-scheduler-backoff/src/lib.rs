//! Error classification and jittered exponential backoff with an optional
//! global pause, for the pane-scheduler worker pool.

mod budget;
mod classifier;
mod config;
mod controller;
mod interval;
mod pause;

pub use budget::{RetryBudget, TokenBucketBudget};
pub use classifier::{ClassifiedError, ClassifyInput, ErrorClassifier, ErrorClassifierBuilder, ResourceErrorKind};
pub use config::{BackoffConfig, BackoffConfigBuilder};
pub use controller::{BackoffController, BackoffControllerBuilder, BackoffDecision, BackoffStats, RetryContext};
pub use interval::{ExponentialBackoff, ExponentialRandomBackoff, FixedInterval, IntervalFunction};
pub use pause::{FnPauseControl, NoopPauseControl, PauseControl};
