//! The narrow interface `BackoffController` uses to ask the scheduler to
//! stop and resume dispatch, without holding a reference back to it.
//!
//! Mirrors the teacher's health-trigger pattern: a one-way, minimal trait
//! injected at construction time rather than a full back-pointer, so the
//! backoff controller never needs to know it's talking to a `Scheduler`.

/// Something that can be told to pause or resume dispatch.
pub trait PauseControl: Send + Sync {
    /// Stop dispatching new work.
    fn pause(&self);
    /// Resume dispatching.
    fn resume(&self);
}

/// Adapts two closures into a [`PauseControl`].
pub struct FnPauseControl<P, R>
where
    P: Fn() + Send + Sync,
    R: Fn() + Send + Sync,
{
    on_pause: P,
    on_resume: R,
}

impl<P, R> FnPauseControl<P, R>
where
    P: Fn() + Send + Sync,
    R: Fn() + Send + Sync,
{
    pub fn new(on_pause: P, on_resume: R) -> Self {
        Self { on_pause, on_resume }
    }
}

impl<P, R> PauseControl for FnPauseControl<P, R>
where
    P: Fn() + Send + Sync,
    R: Fn() + Send + Sync,
{
    fn pause(&self) {
        (self.on_pause)()
    }

    fn resume(&self) {
        (self.on_resume)()
    }
}

/// A [`PauseControl`] that does nothing. The default for a
/// `BackoffController` built without an owning scheduler, e.g. in unit
/// tests that exercise the controller in isolation.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopPauseControl;

impl PauseControl for NoopPauseControl {
    fn pause(&self) {}
    fn resume(&self) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn fn_pause_control_invokes_the_right_closure() {
        let pauses = Arc::new(AtomicUsize::new(0));
        let resumes = Arc::new(AtomicUsize::new(0));
        let p = pauses.clone();
        let r = resumes.clone();
        let control = FnPauseControl::new(
            move || {
                p.fetch_add(1, Ordering::SeqCst);
            },
            move || {
                r.fetch_add(1, Ordering::SeqCst);
            },
        );
        control.pause();
        control.pause();
        control.resume();
        assert_eq!(pauses.load(Ordering::SeqCst), 2);
        assert_eq!(resumes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn noop_pause_control_does_nothing() {
        let control = NoopPauseControl;
        control.pause();
        control.resume();
    }
}
