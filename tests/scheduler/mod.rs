//! End-to-end scenarios: each spins up a full [`pane_scheduler::Scheduler`]
//! against an in-process [`pane_scheduler::Executor`] and a paused tokio
//! clock, exercising the same timing knobs a production deployment would
//! tune (rate limits, concurrency caps, backoff, fairness).

pub mod support;

mod bulk_cancel;
mod eagain_retry;
mod fairness;
mod global_pause_trip;
mod oom_then_success;
mod paced_spawn;
