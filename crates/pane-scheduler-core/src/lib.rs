//! Core infrastructure shared by every pane-scheduler crate: the job model,
//! cooperative cancellation, the event system, the clock/jitter injection
//! points, and the scheduler's synchronous error type.

mod cancel;
mod clock;
mod error;
mod events;
mod job;

pub use cancel::{CancellationScope, RaceOutcome};
pub use clock::{Clock, Jitter, SeededJitter, SystemClock, SystemJitter};
pub use error::{BoxError, SchedulerError};
pub use events::{
    BoxedEventListener, EventListener, EventListeners, FnListener, ResilienceEvent, SchedulerEvent,
};
pub use job::{Job, JobBuilder, JobId, JobKind, JobSnapshot, JobStatus, MetadataValue, Priority};
