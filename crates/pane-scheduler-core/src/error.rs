//! Shared error types for the scheduler.
//!
//! The scheduler has one real boundary — the injected executor — so unlike
//! a composable middleware stack it does not need a generic
//! `ResilienceError<E>` wrapper; a fixed operational enum covers every
//! synchronous failure the public API can return.

use thiserror::Error;

use crate::JobId;

/// Errors returned synchronously by the scheduler's public API.
///
/// These are never retried by the scheduler itself — per spec, submission
/// errors are surfaced immediately to the caller.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SchedulerError {
    /// `submit`/`submit_batch` was called before `start()` or after `stop()`.
    #[error("scheduler is not started")]
    NotStarted,

    /// `start()` was called on an already-running scheduler.
    #[error("scheduler is already started")]
    AlreadyStarted,

    /// A lookup (`get_job`, `cancel`, `estimate_eta`) referenced an id that
    /// is neither queued, running, nor in the recently-completed ring.
    #[error("job {0} is unknown")]
    UnknownJob(JobId),

    /// A batch submission failed partway through; all jobs already admitted
    /// for this batch were cancelled before returning.
    #[error("batch submission failed: {0}")]
    BatchFailed(String),
}

/// Boxed error type produced by the injected executor.
///
/// Matches the `Box<dyn Error + Send + Sync>` convention used throughout
/// the teacher's middleware stack for opaque inner-service errors.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;
