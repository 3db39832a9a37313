//! Event system for the scheduler.
//!
//! Mirrors the resilience-pattern event system: a single [`ResilienceEvent`]
//! trait, a panic-isolated listener collection, and a function-based
//! listener adapter so hook closures can be registered without naming a type.

#[cfg(feature = "tracing")]
use std::any::Any;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::JobId;

/// Trait for events emitted by the scheduler.
pub trait ResilienceEvent: Send + Sync + fmt::Debug {
    /// Returns the type of event (e.g. "enqueued", "completed").
    fn event_type(&self) -> &'static str;

    /// Returns when this event occurred.
    fn timestamp(&self) -> Instant;
}

/// Trait for listening to scheduler events.
pub trait EventListener<E: ResilienceEvent>: Send + Sync {
    /// Called when an event occurs.
    fn on_event(&self, event: &E);
}

/// Type alias for boxed event listeners.
pub type BoxedEventListener<E> = Arc<dyn EventListener<E>>;

/// A collection of event listeners.
#[derive(Clone)]
pub struct EventListeners<E: ResilienceEvent> {
    listeners: Vec<BoxedEventListener<E>>,
}

impl<E: ResilienceEvent> EventListeners<E> {
    /// Creates a new empty event listener collection.
    pub fn new() -> Self {
        Self {
            listeners: Vec::new(),
        }
    }

    /// Adds a listener to the collection.
    pub fn add<L>(&mut self, listener: L)
    where
        L: EventListener<E> + 'static,
    {
        self.listeners.push(Arc::new(listener));
    }

    /// Emits an event to all registered listeners.
    ///
    /// A panicking listener is caught so it cannot prevent the remaining
    /// listeners from observing the event.
    pub fn emit(&self, event: &E) {
        for (index, listener) in self.listeners.iter().enumerate() {
            let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                listener.on_event(event);
            }));

            if let Err(_panic_payload) = result {
                #[cfg(feature = "tracing")]
                log_listener_panic(index, event, _panic_payload.as_ref());

                #[cfg(feature = "metrics")]
                record_listener_panic_metric(event);

                #[cfg(not(feature = "tracing"))]
                let _ = index;

                #[cfg(not(any(feature = "tracing", feature = "metrics")))]
                let _ = _panic_payload;
            }
        }
    }

    /// Returns true if there are no listeners.
    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    /// Returns the number of listeners.
    pub fn len(&self) -> usize {
        self.listeners.len()
    }
}

impl<E: ResilienceEvent> Default for EventListeners<E> {
    fn default() -> Self {
        Self::new()
    }
}

/// A simple function-based event listener.
pub struct FnListener<E, F>
where
    F: Fn(&E) + Send + Sync,
{
    f: F,
    _phantom: std::marker::PhantomData<E>,
}

impl<E, F> FnListener<E, F>
where
    F: Fn(&E) + Send + Sync,
{
    /// Creates a new function-based listener.
    pub fn new(f: F) -> Self {
        Self {
            f,
            _phantom: std::marker::PhantomData,
        }
    }
}

impl<E, F> EventListener<E> for FnListener<E, F>
where
    E: ResilienceEvent,
    F: Fn(&E) + Send + Sync,
{
    fn on_event(&self, event: &E) {
        (self.f)(event)
    }
}

#[cfg(feature = "tracing")]
fn log_listener_panic<E: ResilienceEvent>(
    index: usize,
    event: &E,
    panic_payload: &(dyn Any + Send),
) {
    let panic_message = panic_payload
        .downcast_ref::<&'static str>()
        .map(|s| (*s).to_string())
        .or_else(|| panic_payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "non-string panic payload".to_string());

    tracing::warn!(
        listener_index = index,
        event_type = event.event_type(),
        panic_message = %panic_message,
        "scheduler event listener panicked"
    );
}

#[cfg(feature = "metrics")]
fn record_listener_panic_metric<E: ResilienceEvent>(event: &E) {
    let event_type_label = event.event_type().to_string();
    metrics::counter!(
        "pane_scheduler_event_listener_panics_total",
        "event_type" => event_type_label
    )
    .increment(1);
}

/// Events emitted over the lifetime of a job.
#[derive(Debug, Clone)]
pub enum SchedulerEvent {
    /// A job was accepted into the queue.
    Enqueued { job_id: JobId, timestamp: Instant },
    /// A job transitioned to `running`.
    Started { job_id: JobId, timestamp: Instant },
    /// A job completed successfully.
    Completed {
        job_id: JobId,
        timestamp: Instant,
        attempts: usize,
    },
    /// A job failed after exhausting its retries.
    Failed {
        job_id: JobId,
        timestamp: Instant,
        attempts: usize,
        reason: String,
    },
    /// A job failed an attempt and will be retried after `delay`.
    Retrying {
        job_id: JobId,
        timestamp: Instant,
        attempt: usize,
        delay: Duration,
    },
    /// A job was cancelled before or during execution.
    Cancelled { job_id: JobId, timestamp: Instant },
    /// The queue length crossed the configured backpressure threshold.
    Backpressure {
        timestamp: Instant,
        queue_len: usize,
        projected_wait: Duration,
    },
    /// A guardrail (headroom or global backoff pause) tripped or released.
    GuardrailTriggered {
        timestamp: Instant,
        reason: String,
        blocked: bool,
    },
}

impl ResilienceEvent for SchedulerEvent {
    fn event_type(&self) -> &'static str {
        match self {
            SchedulerEvent::Enqueued { .. } => "enqueued",
            SchedulerEvent::Started { .. } => "started",
            SchedulerEvent::Completed { .. } => "completed",
            SchedulerEvent::Failed { .. } => "failed",
            SchedulerEvent::Retrying { .. } => "retrying",
            SchedulerEvent::Cancelled { .. } => "cancelled",
            SchedulerEvent::Backpressure { .. } => "backpressure",
            SchedulerEvent::GuardrailTriggered { .. } => "guardrail_triggered",
        }
    }

    fn timestamp(&self) -> Instant {
        match self {
            SchedulerEvent::Enqueued { timestamp, .. }
            | SchedulerEvent::Started { timestamp, .. }
            | SchedulerEvent::Completed { timestamp, .. }
            | SchedulerEvent::Failed { timestamp, .. }
            | SchedulerEvent::Retrying { timestamp, .. }
            | SchedulerEvent::Cancelled { timestamp, .. }
            | SchedulerEvent::Backpressure { timestamp, .. }
            | SchedulerEvent::GuardrailTriggered { timestamp, .. } => *timestamp,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_event_listeners() {
        let counter = Arc::new(AtomicUsize::new(0));
        let counter_clone = Arc::clone(&counter);

        let mut listeners: EventListeners<SchedulerEvent> = EventListeners::new();
        listeners.add(FnListener::new(move |_event: &SchedulerEvent| {
            counter_clone.fetch_add(1, Ordering::SeqCst);
        }));

        listeners.emit(&SchedulerEvent::Started {
            job_id: JobId::new("j1"),
            timestamp: Instant::now(),
        });

        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert_eq!(listeners.len(), 1);
        assert!(!listeners.is_empty());
    }

    #[test]
    fn test_panicking_listener_does_not_block_others() {
        let counter = Arc::new(AtomicUsize::new(0));
        let counter_clone = Arc::clone(&counter);

        let mut listeners: EventListeners<SchedulerEvent> = EventListeners::new();
        listeners.add(FnListener::new(|_event: &SchedulerEvent| {
            panic!("boom");
        }));
        listeners.add(FnListener::new(move |_event: &SchedulerEvent| {
            counter_clone.fetch_add(1, Ordering::SeqCst);
        }));

        listeners.emit(&SchedulerEvent::Cancelled {
            job_id: JobId::new("j2"),
            timestamp: Instant::now(),
        });

        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }
}
