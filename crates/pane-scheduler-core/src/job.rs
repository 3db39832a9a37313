//! The job model: identity, priority, status, and the mutable record a
//! submitted unit of work carries through the scheduler.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crate::cancel::CancellationScope;

/// Global counter backing [`JobId::generate`]. Combined with the process id
/// so ids stay unique across restarts without pulling in a uuid dependency.
static ID_COUNTER: AtomicUsize = AtomicUsize::new(0);

/// Opaque job identifier.
///
/// Cheap to clone (an `Arc<str>` under the hood) since every event and log
/// line carries one.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct JobId(Arc<str>);

impl JobId {
    /// Wraps an externally supplied id, e.g. one a caller wants to
    /// correlate with its own tracking.
    pub fn new(id: impl Into<String>) -> Self {
        Self(Arc::from(id.into()))
    }

    /// Generates a fresh id. Used by the scheduler when a submitted job
    /// arrives with no caller-supplied id.
    pub fn generate() -> Self {
        let n = ID_COUNTER.fetch_add(1, Ordering::Relaxed);
        Self(Arc::from(format!("job-{}-{:x}", std::process::id(), n)))
    }

    /// Returns the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl serde::Serialize for JobId {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> serde::Deserialize<'de> for JobId {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(JobId::new(s))
    }
}

/// What kind of pane-hosting operation a job represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum JobKind {
    /// Creating a brand new session.
    SessionCreate,
    /// Splitting an existing pane to host a new one.
    PaneSplit,
    /// Launching an agent process inside an already-existing pane.
    AgentLaunch,
}

/// Scheduling priority. Lower-numbered variants run first; ties break on
/// submission order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "kebab-case")]
#[repr(u8)]
pub enum Priority {
    Urgent = 0,
    High = 1,
    Normal = 2,
    Low = 3,
}

impl Default for Priority {
    fn default() -> Self {
        Priority::Normal
    }
}

/// Lifecycle state of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum JobStatus {
    /// Accepted, waiting for a queue slot.
    Pending,
    /// Dequeued and passed every admission gate; about to run.
    Scheduled,
    /// Executing.
    Running,
    /// An attempt failed and a retry is scheduled.
    Retrying,
    /// Finished successfully. Terminal.
    Completed,
    /// Exhausted retries, or failed with a non-retryable error. Terminal.
    Failed,
    /// Cancelled before or during execution. Terminal.
    Cancelled,
}

impl JobStatus {
    /// Returns true for the three states a job never leaves once reached.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled
        )
    }
}

/// A metadata value attached to a job, used to pass diagnostic context
/// (exit codes, stderr fragments) from the executor back to the error
/// classifier and into snapshots.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(untagged)]
pub enum MetadataValue {
    Text(String),
    Integer(i64),
}

impl From<String> for MetadataValue {
    fn from(value: String) -> Self {
        MetadataValue::Text(value)
    }
}

impl From<&str> for MetadataValue {
    fn from(value: &str) -> Self {
        MetadataValue::Text(value.to_string())
    }
}

impl From<i64> for MetadataValue {
    fn from(value: i64) -> Self {
        MetadataValue::Integer(value)
    }
}

#[derive(Debug, Clone, Default)]
struct Timing {
    created_at: Option<Instant>,
    scheduled_at: Option<Instant>,
    started_at: Option<Instant>,
    completed_at: Option<Instant>,
}

/// A read-only, detached copy of a job's state for reporting and hooks.
///
/// Strips the completion callback and the live cancellation scope; neither
/// makes sense outside the job's owning record.
#[derive(Debug, Clone, serde::Serialize)]
pub struct JobSnapshot {
    pub id: JobId,
    pub batch_id: Option<JobId>,
    pub parent_id: Option<JobId>,
    pub kind: JobKind,
    pub owner: String,
    pub category: Option<String>,
    pub priority: Priority,
    pub status: JobStatus,
    pub retry_count: usize,
    pub max_retries: usize,
    #[serde(skip)]
    pub created_at: Option<Instant>,
    #[serde(skip)]
    pub scheduled_at: Option<Instant>,
    #[serde(skip)]
    pub started_at: Option<Instant>,
    #[serde(skip)]
    pub completed_at: Option<Instant>,
    pub last_error: Option<String>,
}

/// A unit of work submitted to the scheduler.
///
/// Always held behind an `Arc` once built: the queue, the in-flight table,
/// and the caller's own handle all share the same record rather than
/// copying it around.
pub struct Job {
    pub id: JobId,
    pub batch_id: Option<JobId>,
    pub parent_id: Option<JobId>,
    pub kind: JobKind,
    pub owner: String,
    pub category: Option<String>,
    pub priority: Priority,
    pub max_retries: usize,
    pub base_retry_delay: Duration,
    retry_count: AtomicUsize,
    status: Mutex<JobStatus>,
    timing: Mutex<Timing>,
    metadata: Mutex<HashMap<String, MetadataValue>>,
    last_error: Mutex<Option<String>>,
    #[allow(clippy::type_complexity)]
    callback: Mutex<Option<Box<dyn FnOnce(JobSnapshot) + Send>>>,
    cancel_scope: CancellationScope,
}

impl fmt::Debug for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Job")
            .field("id", &self.id)
            .field("owner", &self.owner)
            .field("kind", &self.kind)
            .field("priority", &self.priority)
            .field("status", &self.status())
            .finish()
    }
}

impl Job {
    /// Starts building a job. See [`JobBuilder`] for the full set of knobs.
    pub fn builder(kind: JobKind, owner: impl Into<String>) -> JobBuilder {
        JobBuilder::new(kind, owner)
    }

    /// Current lifecycle state.
    pub fn status(&self) -> JobStatus {
        *self.status.lock().unwrap()
    }

    /// Transitions to `new`, stamping the matching timing field. A no-op if
    /// the job is already in a terminal state: terminal states are sticky.
    pub fn set_status(&self, new: JobStatus, now: Instant) {
        {
            let mut status = self.status.lock().unwrap();
            if status.is_terminal() {
                return;
            }
            *status = new;
        }

        let mut timing = self.timing.lock().unwrap();
        match new {
            JobStatus::Pending | JobStatus::Retrying => {}
            JobStatus::Scheduled => timing.scheduled_at = Some(now),
            JobStatus::Running => timing.started_at = Some(now),
            JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled => {
                timing.completed_at.get_or_insert(now);
            }
        }
    }

    /// Stamps `created_at` the first time the scheduler admits this job.
    /// Idempotent: a second call is a no-op.
    pub fn mark_created(&self, now: Instant) {
        let mut timing = self.timing.lock().unwrap();
        timing.created_at.get_or_insert(now);
    }

    /// Returns `created_at`, if the job has been admitted by the scheduler
    /// (via [`Job::mark_created`]). Used by the queue's tie-break ordering.
    pub fn created_at(&self) -> Option<Instant> {
        self.timing.lock().unwrap().created_at
    }

    /// Cancels the job if it hasn't started running yet.
    ///
    /// Returns `false` if the job was already running or already terminal,
    /// in which case the caller should fall back to [`Job::request_cancel`]
    /// to ask a running execution to stop cooperatively.
    pub fn cancel(&self, now: Instant) -> bool {
        {
            let mut status = self.status.lock().unwrap();
            if !matches!(*status, JobStatus::Pending | JobStatus::Scheduled) {
                return false;
            }
            *status = JobStatus::Cancelled;
        }
        self.timing.lock().unwrap().completed_at.get_or_insert(now);
        self.cancel_scope.cancel();
        true
    }

    /// Signals the cancellation scope regardless of current status. Used to
    /// interrupt a running job; the executor observes this via its scope
    /// and is responsible for the eventual status transition.
    pub fn request_cancel(&self) {
        self.cancel_scope.cancel();
    }

    /// Returns the job's cancellation scope, handed to the executor for the
    /// duration of one attempt.
    pub fn cancellation_scope(&self) -> CancellationScope {
        self.cancel_scope.clone()
    }

    /// Number of attempts already made (0 before the first run).
    pub fn retry_count(&self) -> usize {
        self.retry_count.load(Ordering::SeqCst)
    }

    /// Whether another attempt is still allowed under `max_retries`.
    pub fn can_retry(&self) -> bool {
        self.retry_count() < self.max_retries
    }

    /// Records that another attempt has been made, returning the new count.
    pub fn increment_retry(&self) -> usize {
        self.retry_count.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Attaches a metadata value (e.g. `exit_code`, `stderr_tail`) an
    /// executor reports alongside a failure.
    pub fn set_metadata(&self, key: impl Into<String>, value: impl Into<MetadataValue>) {
        self.metadata.lock().unwrap().insert(key.into(), value.into());
    }

    /// Reads back a text metadata value.
    pub fn metadata_str(&self, key: &str) -> Option<String> {
        match self.metadata.lock().unwrap().get(key) {
            Some(MetadataValue::Text(s)) => Some(s.clone()),
            _ => None,
        }
    }

    /// Reads back an integer metadata value.
    pub fn metadata_int(&self, key: &str) -> Option<i64> {
        match self.metadata.lock().unwrap().get(key) {
            Some(MetadataValue::Integer(n)) => Some(*n),
            _ => None,
        }
    }

    /// Records the most recent failure reason, surfaced in snapshots and
    /// the terminal `Failed` event.
    pub fn set_last_error(&self, err: impl Into<String>) {
        *self.last_error.lock().unwrap() = Some(err.into());
    }

    /// Most recent failure reason, if any.
    pub fn last_error(&self) -> Option<String> {
        self.last_error.lock().unwrap().clone()
    }

    /// Takes the completion callback, if one was registered. Callers run it
    /// at most once, after the job reaches a terminal state.
    #[allow(clippy::type_complexity)]
    pub fn take_callback(&self) -> Option<Box<dyn FnOnce(JobSnapshot) + Send>> {
        self.callback.lock().unwrap().take()
    }

    /// A detached, cloneable snapshot of current state.
    pub fn snapshot(&self) -> JobSnapshot {
        let timing = self.timing.lock().unwrap().clone();
        JobSnapshot {
            id: self.id.clone(),
            batch_id: self.batch_id.clone(),
            parent_id: self.parent_id.clone(),
            kind: self.kind,
            owner: self.owner.clone(),
            category: self.category.clone(),
            priority: self.priority,
            status: self.status(),
            retry_count: self.retry_count(),
            max_retries: self.max_retries,
            created_at: timing.created_at,
            scheduled_at: timing.scheduled_at,
            started_at: timing.started_at,
            completed_at: timing.completed_at,
            last_error: self.last_error(),
        }
    }
}

/// Builds a [`Job`]. Mirrors the config-builder pattern used throughout the
/// workspace: every knob has a sensible default, `build()` is infallible.
pub struct JobBuilder {
    id: Option<JobId>,
    batch_id: Option<JobId>,
    parent_id: Option<JobId>,
    kind: JobKind,
    owner: String,
    category: Option<String>,
    metadata: HashMap<String, MetadataValue>,
    priority: Priority,
    max_retries: usize,
    base_retry_delay: Duration,
    #[allow(clippy::type_complexity)]
    callback: Option<Box<dyn FnOnce(JobSnapshot) + Send>>,
}

impl JobBuilder {
    /// Starts a builder for a job of the given kind, owned by `owner`.
    pub fn new(kind: JobKind, owner: impl Into<String>) -> Self {
        Self {
            id: None,
            batch_id: None,
            parent_id: None,
            kind,
            owner: owner.into(),
            category: None,
            metadata: HashMap::new(),
            priority: Priority::default(),
            max_retries: 0,
            base_retry_delay: Duration::from_millis(500),
            callback: None,
        }
    }

    /// Supplies a caller-chosen id instead of an auto-generated one.
    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(JobId::new(id.into()));
        self
    }

    /// Groups this job under a batch id for `cancel_batch`/eta purposes.
    pub fn batch_id(mut self, batch_id: impl Into<String>) -> Self {
        self.batch_id = Some(JobId::new(batch_id.into()));
        self
    }

    /// Records a parent job id, e.g. a pane split caused by a session create.
    pub fn parent_id(mut self, parent_id: impl Into<String>) -> Self {
        self.parent_id = Some(JobId::new(parent_id.into()));
        self
    }

    /// Assigns the rate-limit/concurrency-cap category. Defaults to the
    /// job kind's name if never set.
    pub fn category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    /// Attaches a metadata value at construction time.
    pub fn metadata(mut self, key: impl Into<String>, value: impl Into<MetadataValue>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Sets the scheduling priority. Defaults to [`Priority::Normal`].
    pub fn priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    /// Sets the maximum number of retry attempts. Defaults to 0 (no retry).
    pub fn max_retries(mut self, max_retries: usize) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Sets the base delay the backoff controller scales from. Defaults to
    /// 500ms.
    pub fn base_retry_delay(mut self, delay: Duration) -> Self {
        self.base_retry_delay = delay;
        self
    }

    /// Registers a callback invoked once, after the job reaches a terminal
    /// state, with a snapshot of its final state.
    pub fn on_complete(mut self, f: impl FnOnce(JobSnapshot) + Send + 'static) -> Self {
        self.callback = Some(Box::new(f));
        self
    }

    /// Finalizes the job. The category defaults to the job kind's
    /// kebab-case name if never set explicitly.
    pub fn build(self) -> Arc<Job> {
        let category = self.category.unwrap_or_else(|| match self.kind {
            JobKind::SessionCreate => "session-create".to_string(),
            JobKind::PaneSplit => "pane-split".to_string(),
            JobKind::AgentLaunch => "agent-launch".to_string(),
        });

        Arc::new(Job {
            id: self.id.unwrap_or_else(JobId::generate),
            batch_id: self.batch_id,
            parent_id: self.parent_id,
            kind: self.kind,
            owner: self.owner,
            category: Some(category),
            priority: self.priority,
            max_retries: self.max_retries,
            base_retry_delay: self.base_retry_delay,
            retry_count: AtomicUsize::new(0),
            status: Mutex::new(JobStatus::Pending),
            timing: Mutex::new(Timing::default()),
            metadata: Mutex::new(self.metadata),
            last_error: Mutex::new(None),
            callback: Mutex::new(self.callback),
            cancel_scope: CancellationScope::new(),
        })
    }
}
