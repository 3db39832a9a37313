//! The worker pool: admission, pacing, dispatch, and the outcome handling
//! that feeds back into every gate a job passed through to get there.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::Notify;
use tokio::task::JoinHandle;

use pane_scheduler_backoff::{
    BackoffController, ClassifyInput, ErrorClassifier, RetryBudget, RetryContext,
};
use pane_scheduler_caps::ConcurrencyCaps;
use pane_scheduler_core::{
    Clock, EventListener, EventListeners, FnListener, Job, JobBuilder, JobId, JobKind, JobSnapshot,
    JobStatus, Jitter, SchedulerError, SchedulerEvent, SystemClock,
};
use pane_scheduler_headroom::{HeadroomGuard, HeadroomGuardBuilder, ProbeReading};
use pane_scheduler_queue::{FairnessGate, PriorityQueue};
use pane_scheduler_ratelimiter::{PerCategoryLimiter, RateLimiter, WaitOutcome};

use crate::completed::CompletedRing;
use crate::config::SchedulerConfig;
use crate::executor::Executor;
use crate::pause::PauseHandle;
use crate::stats::{HeadroomStatus, SchedulerStats};

#[derive(Default)]
struct Counters {
    submitted: AtomicU64,
    completed: AtomicU64,
    failed: AtomicU64,
    retried: AtomicU64,
    cancelled: AtomicU64,
}

enum DispatchOutcome {
    Dispatched,
    NoWork,
}

/// The worker pool: a priority+fairness queue feeding `max_concurrent`
/// workers, each gated by rate limits, concurrency caps, and headroom
/// before it's allowed to invoke the executor, with failures routed
/// through error classification and jittered backoff.
pub struct Scheduler {
    config: SchedulerConfig,
    clock: Arc<dyn Clock>,
    executor: Arc<dyn Executor>,
    queue: Arc<PriorityQueue>,
    fairness: Arc<FairnessGate>,
    global_limiter: Arc<RateLimiter>,
    category_limiters: Arc<PerCategoryLimiter>,
    caps: Arc<ConcurrencyCaps>,
    headroom: Arc<HeadroomGuard>,
    classifier: Arc<ErrorClassifier>,
    backoff: Arc<BackoffController>,
    hooks: EventListeners<SchedulerEvent>,
    scheduled: Mutex<HashMap<JobId, Arc<Job>>>,
    running: Mutex<HashMap<JobId, Arc<Job>>>,
    completed: CompletedRing,
    pause_handle: Arc<PauseHandle>,
    started: AtomicBool,
    notify: Notify,
    worker_handles: Mutex<Vec<JoinHandle<()>>>,
    started_at: Mutex<Option<std::time::Instant>>,
    counters: Counters,
}

impl Scheduler {
    /// Starts a builder. `executor` is invoked once per attempt for every
    /// job that clears admission.
    pub fn builder(config: SchedulerConfig, executor: Arc<dyn Executor>) -> SchedulerBuilder {
        SchedulerBuilder::new(config, executor)
    }

    /// A [`JobBuilder`] pre-seeded with this scheduler's `default_retries`
    /// and `default_retry_delay`, for callers who want the configured
    /// fallback rather than spelling it out on every job. Still overridable
    /// by calling `.max_retries(..)`/`.base_retry_delay(..)` again before
    /// `build()`.
    pub fn job_builder(&self, kind: JobKind, owner: impl Into<String>) -> JobBuilder {
        JobBuilder::new(kind, owner)
            .max_retries(self.config.default_retries)
            .base_retry_delay(self.config.default_retry_delay)
    }

    /// Accepts a job into the queue. Fails if the scheduler isn't running.
    pub fn submit(&self, job: Arc<Job>) -> Result<JobId, SchedulerError> {
        if !self.started.load(Ordering::SeqCst) {
            return Err(SchedulerError::NotStarted);
        }

        let now = self.clock.now();
        self.queue.enqueue(job.clone(), now);
        self.counters.submitted.fetch_add(1, Ordering::SeqCst);
        self.hooks.emit(&SchedulerEvent::Enqueued {
            job_id: job.id.clone(),
            timestamp: now,
        });
        self.notify.notify_one();

        let queue_len = self.queue.len();
        if self.config.backpressure_threshold > 0 && queue_len >= self.config.backpressure_threshold {
            let projected_wait = self.estimate_eta(&job.id).unwrap_or_default();
            self.hooks.emit(&SchedulerEvent::Backpressure {
                timestamp: now,
                queue_len,
                projected_wait,
            });
        }

        Ok(job.id.clone())
    }

    /// Submits every builder under one new batch id. On any submission
    /// error, already-submitted members of this batch are cancelled before
    /// returning the error.
    pub fn submit_batch(&self, builders: Vec<JobBuilder>) -> Result<Vec<JobId>, SchedulerError> {
        if !self.started.load(Ordering::SeqCst) {
            return Err(SchedulerError::NotStarted);
        }

        let batch_id = JobId::generate();
        let mut submitted = Vec::with_capacity(builders.len());
        for builder in builders {
            let job = builder.batch_id(batch_id.as_str()).build();
            match self.submit(job) {
                Ok(id) => submitted.push(id),
                Err(err) => {
                    self.cancel_batch(&batch_id);
                    return Err(SchedulerError::BatchFailed(err.to_string()));
                }
            }
        }
        Ok(submitted)
    }

    /// Cancels one job by id, wherever it currently sits. Returns `false`
    /// if the id is unknown (already completed and evicted from the
    /// completed ring, or never submitted).
    pub fn cancel(&self, id: &JobId) -> bool {
        let now = self.clock.now();

        if let Some(job) = self.queue.remove(id) {
            job.cancel(now);
            self.counters.cancelled.fetch_add(1, Ordering::SeqCst);
            self.hooks.emit(&SchedulerEvent::Cancelled {
                job_id: id.clone(),
                timestamp: now,
            });
            self.finalize(&job);
            return true;
        }

        if let Some(job) = self.scheduled.lock().unwrap().get(id).cloned() {
            // The dispatch/rate-limiter-wait path observes this and decides
            // terminal-cancel vs. requeue once its own wait unblocks.
            job.cancel(now);
            return true;
        }

        if let Some(job) = self.running.lock().unwrap().get(id).cloned() {
            job.request_cancel();
            return true;
        }

        false
    }

    /// Cancels every job owned by `owner`, queued or in flight. Returns the
    /// number of jobs affected.
    pub fn cancel_owner(&self, owner: &str) -> usize {
        let now = self.clock.now();
        let removed = self.queue.cancel_owner(owner, now);
        let mut count = removed.len();
        for job in &removed {
            self.counters.cancelled.fetch_add(1, Ordering::SeqCst);
            self.hooks.emit(&SchedulerEvent::Cancelled {
                job_id: job.id.clone(),
                timestamp: now,
            });
            self.finalize(job);
        }

        for job in self.scheduled.lock().unwrap().values() {
            if job.owner == owner {
                job.cancel(now);
                count += 1;
            }
        }
        for job in self.running.lock().unwrap().values() {
            if job.owner == owner {
                job.request_cancel();
                count += 1;
            }
        }
        count
    }

    /// Cancels every job in `batch_id`, queued or in flight.
    pub fn cancel_batch(&self, batch_id: &JobId) -> usize {
        let now = self.clock.now();
        let removed = self.queue.cancel_batch(batch_id, now);
        let mut count = removed.len();
        for job in &removed {
            self.counters.cancelled.fetch_add(1, Ordering::SeqCst);
            self.hooks.emit(&SchedulerEvent::Cancelled {
                job_id: job.id.clone(),
                timestamp: now,
            });
            self.finalize(job);
        }

        for job in self.scheduled.lock().unwrap().values() {
            if job.batch_id.as_ref() == Some(batch_id) {
                job.cancel(now);
                count += 1;
            }
        }
        for job in self.running.lock().unwrap().values() {
            if job.batch_id.as_ref() == Some(batch_id) {
                job.request_cancel();
                count += 1;
            }
        }
        count
    }

    /// Looks up a job wherever it currently lives: queued, scheduled,
    /// running, or in the recently-completed ring.
    pub fn get_job(&self, id: &JobId) -> Option<JobSnapshot> {
        if let Some(snapshot) = self.queue.list_all().into_iter().find(|s| &s.id == id) {
            return Some(snapshot);
        }
        if let Some(job) = self.scheduled.lock().unwrap().get(id) {
            return Some(job.snapshot());
        }
        if let Some(job) = self.running.lock().unwrap().get(id) {
            return Some(job.snapshot());
        }
        self.completed.get(id)
    }

    /// Stops dispatching new work. Jobs already running continue; workers
    /// idle until `resume()`.
    pub fn pause(&self) {
        self.pause_handle.pause();
    }

    /// Resumes dispatch and wakes every idling worker.
    pub fn resume(&self) {
        self.pause_handle.resume();
    }

    /// Whether dispatch is currently paused, by manual call or a tripped
    /// backoff guardrail.
    pub fn is_paused(&self) -> bool {
        self.pause_handle.is_paused()
    }

    /// Spawns `max_concurrent` worker tasks. Fails if already started.
    pub async fn start(self: &Arc<Self>) -> Result<(), SchedulerError> {
        if self.started.swap(true, Ordering::SeqCst) {
            return Err(SchedulerError::AlreadyStarted);
        }

        *self.started_at.lock().unwrap() = Some(self.clock.now());

        let mut handles = self.worker_handles.lock().unwrap();
        for _ in 0..self.config.max_concurrent {
            let scheduler = Arc::clone(self);
            handles.push(tokio::spawn(async move {
                scheduler.worker_loop().await;
            }));
        }
        Ok(())
    }

    /// Stops accepting new dispatch and waits for running jobs to finish,
    /// cancelling any still running after `grace`. Returns once every
    /// worker task has exited.
    pub async fn stop(self: &Arc<Self>, grace: Duration) {
        self.started.store(false, Ordering::SeqCst);
        self.notify.notify_waiters();

        let deadline = tokio::time::sleep(grace);
        tokio::pin!(deadline);
        loop {
            if self.running.lock().unwrap().is_empty() && self.scheduled.lock().unwrap().is_empty() {
                break;
            }
            tokio::select! {
                _ = &mut deadline => {
                    for job in self.running.lock().unwrap().values() {
                        job.request_cancel();
                    }
                    for job in self.scheduled.lock().unwrap().values() {
                        job.request_cancel();
                    }
                    break;
                }
                _ = tokio::time::sleep(Duration::from_millis(10)) => {}
            }
        }

        let handles: Vec<_> = self.worker_handles.lock().unwrap().drain(..).collect();
        for handle in handles {
            let _ = handle.await;
        }
    }

    /// A best-effort projection of how long a queued job has left to wait,
    /// based on how many jobs sit ahead of it and the tighter of its
    /// category's and the global limiter's current pace. Not a guarantee:
    /// priority changes, cancellations, and cap cooldowns all shift it.
    pub fn estimate_eta(&self, id: &JobId) -> Option<Duration> {
        let snapshot = self.queue.list_all().into_iter().find(|s| &s.id == id)?;
        let created_at = snapshot.created_at?;
        let ahead = self.queue.count_ahead_of(snapshot.priority, created_at);

        let category = snapshot.category.as_deref().unwrap_or("");
        let category_limiter = self.category_limiters.get(category);
        let per_dispatch_wait = category_limiter
            .time_until_next_token()
            .max(self.global_limiter.time_until_next_token());

        let waves = (ahead / self.config.max_concurrent.max(1)) as u32 + 1;
        Some(per_dispatch_wait * waves)
    }

    /// A consistent snapshot of scheduler and subsystem state.
    pub fn stats(&self) -> SchedulerStats {
        let now = self.clock.now();
        let uptime = self
            .started_at
            .lock()
            .unwrap()
            .map(|at| now.saturating_duration_since(at))
            .unwrap_or_default();

        let queued = self.queue.list_all();
        let oldest_queued_age = queued
            .iter()
            .filter_map(|s| s.created_at)
            .map(|created| now.saturating_duration_since(created))
            .max()
            .unwrap_or_default();

        let mut per_category_rate_limiters = HashMap::new();
        for category in self.category_limiters.known_categories() {
            let stats = self.category_limiters.get(&category).stats();
            per_category_rate_limiters.insert(category, stats);
        }

        SchedulerStats {
            total_submitted: self.counters.submitted.load(Ordering::SeqCst),
            total_completed: self.counters.completed.load(Ordering::SeqCst),
            total_failed: self.counters.failed.load(Ordering::SeqCst),
            total_retried: self.counters.retried.load(Ordering::SeqCst),
            total_cancelled: self.counters.cancelled.load(Ordering::SeqCst),
            queue_len: queued.len(),
            scheduled_len: self.scheduled.lock().unwrap().len(),
            running_len: self.running.lock().unwrap().len(),
            paused: self.is_paused(),
            uptime,
            oldest_queued_age,
            global_rate_limiter: self.global_limiter.stats(),
            per_category_rate_limiters,
            concurrency_caps: self.caps.stats(now),
            backoff: self.backoff.stats(now),
            headroom: HeadroomStatus {
                enabled: self.config.headroom.enabled,
                blocked: self.headroom.is_blocked(),
                reason: self.headroom.block_reason(),
            },
        }
    }

    async fn worker_loop(self: Arc<Self>) {
        loop {
            if !self.started.load(Ordering::SeqCst) {
                return;
            }

            match self.try_dispatch_one().await {
                DispatchOutcome::Dispatched => continue,
                DispatchOutcome::NoWork => {
                    let notified = self.notify.notified();
                    tokio::pin!(notified);
                    let resumed = self.pause_handle.notified();
                    tokio::pin!(resumed);
                    tokio::select! {
                        _ = &mut notified => {}
                        _ = &mut resumed => {}
                        _ = tokio::time::sleep(self.config.idle_poll_interval) => {}
                    }
                }
            }
        }
    }

    async fn try_dispatch_one(self: &Arc<Self>) -> DispatchOutcome {
        let now = self.clock.now();

        if self.pause_handle.is_paused() {
            return DispatchOutcome::NoWork;
        }
        if !self.headroom.check_headroom(now).allowed {
            return DispatchOutcome::NoWork;
        }

        let caps = Arc::clone(&self.caps);
        let job = self
            .fairness
            .try_dequeue_with(&self.queue, |job| {
                let category = job.category.as_deref().unwrap_or("");
                caps.try_acquire(category, now)
            });

        let Some(job) = job else {
            return DispatchOutcome::NoWork;
        };

        self.run_job(job).await;
        DispatchOutcome::Dispatched
    }

    async fn run_job(self: &Arc<Self>, job: Arc<Job>) {
        let category = job.category.clone().unwrap_or_default();
        let now = self.clock.now();
        job.set_status(JobStatus::Scheduled, now);
        self.scheduled.lock().unwrap().insert(job.id.clone(), job.clone());

        let scope = job.cancellation_scope();

        let category_limiter = self.category_limiters.get(&category);
        if category_limiter.wait(&scope).await == WaitOutcome::Cancelled {
            self.scheduled.lock().unwrap().remove(&job.id);
            self.caps.release(&category);
            self.on_pre_run_cancel(&job).await;
            return;
        }
        if self.global_limiter.wait(&scope).await == WaitOutcome::Cancelled {
            self.scheduled.lock().unwrap().remove(&job.id);
            self.caps.release(&category);
            self.on_pre_run_cancel(&job).await;
            return;
        }

        self.scheduled.lock().unwrap().remove(&job.id);

        let now = self.clock.now();
        job.set_status(JobStatus::Running, now);
        self.running.lock().unwrap().insert(job.id.clone(), job.clone());
        self.hooks.emit(&SchedulerEvent::Started {
            job_id: job.id.clone(),
            timestamp: now,
        });

        let result = self.executor.execute(scope.clone(), job.clone()).await;

        self.running.lock().unwrap().remove(&job.id);
        self.fairness.mark_complete(&job);
        self.caps.release(&category);

        if scope.is_cancelled() {
            let now = self.clock.now();
            job.set_status(JobStatus::Cancelled, now);
            self.counters.cancelled.fetch_add(1, Ordering::SeqCst);
            self.hooks.emit(&SchedulerEvent::Cancelled {
                job_id: job.id.clone(),
                timestamp: now,
            });
            self.finalize(&job);
            return;
        }

        match result {
            Ok(()) => self.on_success(&job, &category),
            Err(err) => self.on_failure(&job, &category, err, scope).await,
        }
    }

    async fn on_pre_run_cancel(self: &Arc<Self>, job: &Arc<Job>) {
        let now = self.clock.now();
        if job.status() == JobStatus::Cancelled {
            self.fairness.mark_complete(job);
            self.counters.cancelled.fetch_add(1, Ordering::SeqCst);
            self.hooks.emit(&SchedulerEvent::Cancelled {
                job_id: job.id.clone(),
                timestamp: now,
            });
            self.finalize(job);
        } else {
            // Cancelled as part of a blanket stop()/shutdown sweep rather
            // than an explicit per-job cancel: never silently drop it.
            job.set_status(JobStatus::Pending, now);
            self.queue.enqueue(job.clone(), job.created_at().unwrap_or(now));
            self.fairness.mark_complete(job);
            self.notify.notify_one();
        }
    }

    fn on_success(self: &Arc<Self>, job: &Arc<Job>, category: &str) {
        let now = self.clock.now();
        job.set_status(JobStatus::Completed, now);
        self.backoff.record_success();
        self.caps.record_success(category);
        self.counters.completed.fetch_add(1, Ordering::SeqCst);
        self.hooks.emit(&SchedulerEvent::Completed {
            job_id: job.id.clone(),
            timestamp: now,
            attempts: job.retry_count() + 1,
        });
        self.finalize(job);
    }

    async fn on_failure(
        self: &Arc<Self>,
        job: &Arc<Job>,
        category: &str,
        err: pane_scheduler_core::BoxError,
        scope: pane_scheduler_core::CancellationScope,
    ) {
        let now = self.clock.now();
        let message = err.to_string();
        let stderr = job.metadata_str("stderr_tail");
        let input = ClassifyInput {
            io_error_kind: None,
            exit_code: job.metadata_int("exit_code"),
            message: Some(&message),
            stderr: stderr.as_deref(),
        };
        let classified = self.classifier.classify(&input);
        if classified.is_some() {
            self.caps.record_failure(category, now);
        }

        let ctx = RetryContext {
            retry_count: job.retry_count(),
            can_retry: job.can_retry(),
            base_retry_delay: job.base_retry_delay,
        };
        let decision = self.backoff.handle_error(&ctx, classified, now);
        job.set_last_error(message.clone());

        if decision.should_retry {
            let attempt = job.increment_retry();
            self.counters.retried.fetch_add(1, Ordering::SeqCst);
            job.set_status(JobStatus::Retrying, now);
            self.hooks.emit(&SchedulerEvent::Retrying {
                job_id: job.id.clone(),
                timestamp: now,
                attempt,
                delay: decision.delay,
            });

            match scope.sleep(decision.delay).await {
                pane_scheduler_core::RaceOutcome::Cancelled => {
                    let now = self.clock.now();
                    job.set_status(JobStatus::Cancelled, now);
                    self.counters.cancelled.fetch_add(1, Ordering::SeqCst);
                    self.hooks.emit(&SchedulerEvent::Cancelled {
                        job_id: job.id.clone(),
                        timestamp: now,
                    });
                    self.finalize(job);
                }
                pane_scheduler_core::RaceOutcome::Completed(()) => {
                    let now = self.clock.now();
                    job.set_status(JobStatus::Pending, now);
                    self.queue.enqueue(job.clone(), job.created_at().unwrap_or(now));
                    self.notify.notify_one();
                }
            }
        } else {
            job.set_status(JobStatus::Failed, now);
            self.counters.failed.fetch_add(1, Ordering::SeqCst);
            self.hooks.emit(&SchedulerEvent::Failed {
                job_id: job.id.clone(),
                timestamp: now,
                attempts: job.retry_count() + 1,
                reason: message,
            });
            self.finalize(job);
        }
    }

    fn finalize(self: &Arc<Self>, job: &Arc<Job>) {
        self.completed.push(job.snapshot());
        if let Some(callback) = job.take_callback() {
            callback(job.snapshot());
        }
    }
}

/// Builds a [`Scheduler`].
pub struct SchedulerBuilder {
    config: SchedulerConfig,
    executor: Arc<dyn Executor>,
    clock: Arc<dyn Clock>,
    jitter_source: Option<Arc<dyn Jitter>>,
    retry_budget: Option<Arc<dyn RetryBudget>>,
    classifier: Option<ErrorClassifier>,
    headroom_builder: HeadroomGuardBuilder,
    listeners: EventListeners<SchedulerEvent>,
}

impl SchedulerBuilder {
    fn new(config: SchedulerConfig, executor: Arc<dyn Executor>) -> Self {
        let headroom_builder = HeadroomGuard::builder(config.headroom.clone());
        Self {
            config,
            executor,
            clock: Arc::new(SystemClock),
            jitter_source: None,
            retry_budget: None,
            classifier: None,
            headroom_builder,
            listeners: EventListeners::new(),
        }
    }

    /// Overrides the clock. Tests should inject a deterministic one.
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Overrides the backoff jitter source.
    pub fn jitter_source(mut self, jitter_source: Arc<dyn Jitter>) -> Self {
        self.jitter_source = Some(jitter_source);
        self
    }

    /// Adds a global retry-budget guard on top of each job's `max_retries`.
    pub fn retry_budget(mut self, budget: Arc<dyn RetryBudget>) -> Self {
        self.retry_budget = Some(budget);
        self
    }

    /// Overrides the default error classification rule table.
    pub fn error_classifier(mut self, classifier: ErrorClassifier) -> Self {
        self.classifier = Some(classifier);
        self
    }

    /// Registers a resource probe feeding the headroom guard. Order doesn't
    /// matter: the tightest limit wins.
    pub fn probe(mut self, probe: impl Fn() -> ProbeReading + Send + Sync + 'static) -> Self {
        self.headroom_builder = self.headroom_builder.probe(probe);
        self
    }

    /// Registers a raw listener for the full [`SchedulerEvent`] stream, for
    /// callers who want more than the named hooks below.
    pub fn add_listener<L>(mut self, listener: L) -> Self
    where
        L: EventListener<SchedulerEvent> + 'static,
    {
        self.listeners.add(listener);
        self
    }

    /// Fires when a job is accepted into the queue.
    pub fn on_enqueued(mut self, f: impl Fn(&JobId) + Send + Sync + 'static) -> Self {
        self.listeners.add(FnListener::new(move |event: &SchedulerEvent| {
            if let SchedulerEvent::Enqueued { job_id, .. } = event {
                f(job_id);
            }
        }));
        self
    }

    /// Fires when a job transitions to running.
    pub fn on_started(mut self, f: impl Fn(&JobId) + Send + Sync + 'static) -> Self {
        self.listeners.add(FnListener::new(move |event: &SchedulerEvent| {
            if let SchedulerEvent::Started { job_id, .. } = event {
                f(job_id);
            }
        }));
        self
    }

    /// Fires when a job completes successfully.
    pub fn on_completed(mut self, f: impl Fn(&JobId, usize) + Send + Sync + 'static) -> Self {
        self.listeners.add(FnListener::new(move |event: &SchedulerEvent| {
            if let SchedulerEvent::Completed { job_id, attempts, .. } = event {
                f(job_id, *attempts);
            }
        }));
        self
    }

    /// Fires when a job fails after exhausting its retries.
    pub fn on_failed(mut self, f: impl Fn(&JobId, &str) + Send + Sync + 'static) -> Self {
        self.listeners.add(FnListener::new(move |event: &SchedulerEvent| {
            if let SchedulerEvent::Failed { job_id, reason, .. } = event {
                f(job_id, reason);
            }
        }));
        self
    }

    /// Fires when a job's attempt failed and a retry is scheduled.
    pub fn on_retrying(mut self, f: impl Fn(&JobId, usize, Duration) + Send + Sync + 'static) -> Self {
        self.listeners.add(FnListener::new(move |event: &SchedulerEvent| {
            if let SchedulerEvent::Retrying { job_id, attempt, delay, .. } = event {
                f(job_id, *attempt, *delay);
            }
        }));
        self
    }

    /// Fires when the queue length crosses `backpressure_threshold`.
    pub fn on_backpressure(mut self, f: impl Fn(usize, Duration) + Send + Sync + 'static) -> Self {
        self.listeners.add(FnListener::new(move |event: &SchedulerEvent| {
            if let SchedulerEvent::Backpressure { queue_len, projected_wait, .. } = event {
                f(*queue_len, *projected_wait);
            }
        }));
        self
    }

    /// Fires when a guardrail (headroom or the backoff global pause) trips
    /// or releases.
    pub fn on_guardrail_triggered(mut self, f: impl Fn(&str, bool) + Send + Sync + 'static) -> Self {
        self.listeners.add(FnListener::new(move |event: &SchedulerEvent| {
            if let SchedulerEvent::GuardrailTriggered { reason, blocked, .. } = event {
                f(reason, *blocked);
            }
        }));
        self
    }

    /// Finalizes the scheduler. Not yet dispatching: call `start()`.
    pub fn build(self) -> Arc<Scheduler> {
        let clock = self.clock;
        let listeners = self.listeners;
        let pause_handle = Arc::new(PauseHandle::new(clock.clone(), listeners.clone()));

        let listeners_blocked = listeners.clone();
        let clock_blocked = clock.clone();
        let listeners_unblocked = listeners.clone();
        let clock_unblocked = clock.clone();
        let headroom = Arc::new(
            self.headroom_builder
                .on_blocked(move |reason| {
                    listeners_blocked.emit(&SchedulerEvent::GuardrailTriggered {
                        timestamp: clock_blocked.now(),
                        reason: reason.to_string(),
                        blocked: true,
                    });
                })
                .on_unblocked(move || {
                    listeners_unblocked.emit(&SchedulerEvent::GuardrailTriggered {
                        timestamp: clock_unblocked.now(),
                        reason: "headroom recovered".to_string(),
                        blocked: false,
                    });
                })
                .build(),
        );

        let queue = Arc::new(PriorityQueue::new());
        let fairness = Arc::new(FairnessGate::new(self.config.max_per_owner, self.config.max_per_batch));

        let global_limiter = Arc::new(RateLimiter::new(self.config.global_rate_limit.clone(), clock.clone()));
        let mut per_category_limiter =
            PerCategoryLimiter::new(self.config.default_category_rate_limit.clone(), clock.clone());
        for (category, cfg) in &self.config.per_category_rate_limits {
            per_category_limiter = per_category_limiter.with_override(category.clone(), cfg.clone());
        }
        let category_limiters = Arc::new(per_category_limiter);

        let mut caps = ConcurrencyCaps::new(self.config.concurrency_caps.clone());
        for (category, cfg) in &self.config.per_category_concurrency_caps {
            caps = caps.with_override(category.clone(), cfg.clone());
        }
        let caps = Arc::new(caps);

        let classifier = Arc::new(self.classifier.unwrap_or_default());

        let mut backoff_builder = BackoffController::builder(self.config.backoff.clone())
            .pause_control(Arc::clone(&pause_handle) as Arc<dyn pane_scheduler_backoff::PauseControl>);
        if let Some(jitter) = self.jitter_source {
            backoff_builder = backoff_builder.jitter_source(jitter);
        }
        if let Some(budget) = self.retry_budget {
            backoff_builder = backoff_builder.retry_budget(budget);
        }
        let backoff = backoff_builder.build();
        let max_completed = self.config.max_completed;

        Arc::new(Scheduler {
            config: self.config,
            clock,
            executor: self.executor,
            queue,
            fairness,
            global_limiter,
            category_limiters,
            caps,
            headroom,
            classifier,
            backoff,
            hooks: listeners,
            scheduled: Mutex::new(HashMap::new()),
            running: Mutex::new(HashMap::new()),
            completed: CompletedRing::new(max_completed),
            pause_handle,
            started: AtomicBool::new(false),
            notify: Notify::new(),
            worker_handles: Mutex::new(Vec::new()),
            started_at: Mutex::new(None),
            counters: Counters::default(),
        })
    }
}
