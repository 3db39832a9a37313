//! The one real boundary the scheduler crosses: actually spawning the
//! pane-hosted process for a job.

use std::sync::Arc;

use futures::future::BoxFuture;
use pane_scheduler_core::{BoxError, CancellationScope, Job};

/// Performs the side effect a job represents.
///
/// Implementations must respect `scope` and return promptly once it's
/// cancelled, rather than running the attempt to completion regardless.
/// Diagnostic context for the error classifier (`exit_code`, `stderr_tail`)
/// should be attached via [`Job::set_metadata`] before returning `Err`.
pub trait Executor: Send + Sync + 'static {
    /// Runs one attempt at `job`. Any `Err` is treated as a failed attempt
    /// and handed to the backoff controller; `Ok(())` is a completion.
    fn execute(&self, scope: CancellationScope, job: Arc<Job>) -> BoxFuture<'static, Result<(), BoxError>>;
}

/// Adapts a closure into an [`Executor`], mirroring `tower::service_fn` for
/// callers who don't want to name a type.
pub struct FnExecutor<F> {
    f: F,
}

impl<F> FnExecutor<F> {
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

impl<F, Fut> Executor for FnExecutor<F>
where
    F: Fn(CancellationScope, Arc<Job>) -> Fut + Send + Sync + 'static,
    Fut: std::future::Future<Output = Result<(), BoxError>> + Send + 'static,
{
    fn execute(&self, scope: CancellationScope, job: Arc<Job>) -> BoxFuture<'static, Result<(), BoxError>> {
        Box::pin((self.f)(scope, job))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pane_scheduler_core::JobKind;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn fn_executor_runs_the_closure() {
        let calls = Arc::new(AtomicUsize::new(0));
        let calls2 = calls.clone();
        let executor = FnExecutor::new(move |_scope, _job| {
            let calls = calls2.clone();
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        });

        let job = Job::builder(JobKind::AgentLaunch, "alice").build();
        let result = executor.execute(job.cancellation_scope(), job).await;
        assert!(result.is_ok());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
