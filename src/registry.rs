//! Named task definitions on top of the [`Scheduler`].
//!
//! A [`TaskDef`] carries identity metadata, a schedule, a [`RetryCfg`] and the
//! `skip_if_running` policy. [`TaskRegistry::register`] only stores it;
//! [`TaskRegistry::start`] turns it into a scheduler job.
//!
//! Each scheduler fire hands the task body to its own tokio task and returns
//! right away, so the schedule keeps its cadence even when a body is slow.
//! With `skip_if_running` (the default) a fire that finds the previous body
//! still running is recorded as a skip instead of starting a second copy.
//! The body itself runs under a span, with the retry policy's timeout and
//! backoff applied, and every outcome is reported to the [`Observability`]
//! collaborators and folded into [`TaskState`].

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use log::{debug, info, Level};
use tokio::time::Instant;

use crate::clock::Clock;
use crate::cron::CronSpec;
use crate::errors::TaskclockError;
use crate::events::{EventBus, SchedulerEvent};
use crate::job::{job_fn, join_result, JobConfig, JobFn, JobState, Schedule};
use crate::observe::{Observability, Span};
use crate::retry::RetryCfg;
use crate::scheduler::{Scheduler, WeakScheduler};
use crate::Result;

/// A named, schedulable unit of work.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use taskclock::{RetryCfg, TaskDef};
///
/// let def = TaskDef::every("eod-pnl", Duration::from_secs(300), || async {
///     // attribute P&L ...
///     Ok(())
/// })
/// .with_name("End of day P&L")
/// .with_tags(&["pnl", "critical"])
/// .with_retry(RetryCfg::with_retries(3).timeout(Duration::from_secs(30)));
///
/// assert!(def.enabled);
/// assert!(def.skip_if_running);
/// ```
#[derive(Clone)]
pub struct TaskDef {
    pub id: String,
    pub name: String,
    pub desc: Option<String>,
    pub tags: Vec<String>,
    /// Disabled tasks are skipped by `start_all` and refused by `start`.
    pub enabled: bool,
    pub schedule: Schedule,
    pub repeat: Option<u64>,
    pub immediate: bool,
    pub retry: RetryCfg,
    /// Suppress a fire while the previous body is still running.
    pub skip_if_running: bool,
    run: JobFn,
}

impl TaskDef {
    /// Creates a definition with default metadata (`name = id`, enabled,
    /// skip-if-running, no retries).
    pub fn new<F, Fut>(id: impl Into<String>, schedule: Schedule, func: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        let id = id.into();
        TaskDef {
            name: id.clone(),
            id,
            desc: None,
            tags: Vec::new(),
            enabled: true,
            schedule,
            repeat: None,
            immediate: false,
            retry: RetryCfg::default(),
            skip_if_running: true,
            run: job_fn(func),
        }
    }

    pub fn every<F, Fut>(id: impl Into<String>, interval: Duration, func: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        Self::new(id, Schedule::Every(interval), func)
    }

    pub fn at<F, Fut>(id: impl Into<String>, at: DateTime<Utc>, func: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        Self::new(id, Schedule::Once(at), func)
    }

    pub fn cron<F, Fut>(id: impl Into<String>, spec: CronSpec, func: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        Self::new(id, Schedule::Cron(spec), func)
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_desc(mut self, desc: impl Into<String>) -> Self {
        self.desc = Some(desc.into());
        self
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        let tag = tag.into();
        if !self.tags.contains(&tag) {
            self.tags.push(tag);
        }
        self
    }

    pub fn with_tags(self, tags: &[&str]) -> Self {
        tags.iter().fold(self, |def, tag| def.with_tag(*tag))
    }

    pub fn with_retry(mut self, retry: RetryCfg) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_repeat(mut self, repeat: u64) -> Self {
        self.repeat = Some(repeat);
        self
    }

    pub fn immediately(mut self) -> Self {
        self.immediate = true;
        self
    }

    pub fn skip_if_running(mut self, skip: bool) -> Self {
        self.skip_if_running = skip;
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }

    /// The backing scheduler job. `repeat` is left to the registry, which
    /// counts launched bodies rather than fires.
    fn job_config(&self) -> JobConfig {
        JobConfig {
            id: Some(job_id_for(&self.id)),
            schedule: self.schedule.clone(),
            repeat: None,
            immediate: self.immediate,
            interval_mode: None,
        }
    }
}

impl fmt::Debug for TaskDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskDef")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("tags", &self.tags)
            .field("enabled", &self.enabled)
            .field("schedule", &self.schedule)
            .field("retry", &self.retry)
            .field("skip_if_running", &self.skip_if_running)
            .finish()
    }
}

fn job_id_for(task_id: &str) -> String {
    format!("task:{}", task_id)
}

/// Lifecycle status of a registered task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskStatus {
    /// Registered but never started.
    Registered,
    /// Waiting for its next fire.
    Scheduled,
    /// A body is executing.
    Running,
    /// Paused through the registry.
    Paused,
    /// Its schedule is exhausted (repeat cap or one-shot).
    Finished,
    /// Cancelled through the registry.
    Cancelled,
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskStatus::Registered => write!(f, "registered"),
            TaskStatus::Scheduled => write!(f, "scheduled"),
            TaskStatus::Running => write!(f, "running"),
            TaskStatus::Paused => write!(f, "paused"),
            TaskStatus::Finished => write!(f, "finished"),
            TaskStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Read-only view of a task, computed on demand.
#[derive(Debug, Clone)]
pub struct TaskState {
    pub id: String,
    pub name: String,
    pub status: TaskStatus,
    /// Finished executions, successful or not.
    pub runs: u64,
    /// Executions that failed after exhausting their retries.
    pub failures: u64,
    /// Fires suppressed by `skip_if_running`.
    pub skips: u64,
    pub last_error: Option<String>,
    pub last_run: Option<DateTime<Utc>>,
    pub next_run: Option<DateTime<Utc>>,
    pub tags: Vec<String>,
}

/// Reference to the scheduler job backing a started task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskHandle {
    pub task_id: String,
    pub job_id: String,
}

/// Per-task execution state shared between the registry and the wrapper the
/// scheduler invokes.
struct TaskRuntime {
    id: String,
    name: String,
    job_id: String,
    run: JobFn,
    retry: RetryCfg,
    skip_if_running: bool,
    repeat: Option<u64>,
    /// Bodies launched by scheduled fires since the last start.
    launched: AtomicU64,
    running: AtomicUsize,
    runs: AtomicU64,
    failures: AtomicU64,
    skips: AtomicU64,
    last_error: Mutex<Option<String>>,
    last_run: Mutex<Option<DateTime<Utc>>>,
    observability: Observability,
    events: EventBus,
    clock: Arc<dyn Clock>,
    scheduler: WeakScheduler,
}

impl TaskRuntime {
    fn meta(&self) -> Vec<(&'static str, String)> {
        vec![("task.id", self.id.clone()), ("task.name", self.name.clone())]
    }

    /// Launches one execution unless skip-if-running suppresses it.
    ///
    /// Only `scheduled` launches count toward `repeat`; the launch that
    /// reaches the cap retires the scheduler job.
    fn dispatch(self: &Arc<Self>, scheduled: bool) -> bool {
        if self.skip_if_running {
            if self
                .running
                .compare_exchange(0, 1, Ordering::SeqCst, Ordering::SeqCst)
                .is_err()
            {
                self.record_skip();
                return false;
            }
        } else {
            self.running.fetch_add(1, Ordering::SeqCst);
        }

        if scheduled {
            let launched = self.launched.fetch_add(1, Ordering::SeqCst) + 1;
            if matches!(self.repeat, Some(cap) if launched >= cap) {
                self.retire();
            }
        }

        let runtime = Arc::clone(self);
        tokio::spawn(async move {
            runtime.execute().await;
            runtime.running.fetch_sub(1, Ordering::SeqCst);
        });
        true
    }

    fn retire(&self) {
        if let Some(scheduler) = self.scheduler.upgrade() {
            scheduler.retire(&self.job_id);
            debug!("Task '{}' launched its last run", self.id);
        }
    }

    fn record_skip(&self) {
        self.skips.fetch_add(1, Ordering::SeqCst);
        self.observability.metrics.inc("task.skipped");
        self.observability
            .logger
            .log("task still running, fire skipped", Level::Debug, &self.meta());
        self.events.publish(SchedulerEvent::TaskSkipped {
            task_id: self.id.clone(),
            task_name: self.name.clone(),
            timestamp: self.clock.now(),
        });
    }

    async fn execute(&self) {
        let obs = &self.observability;
        let started_at = self.clock.now();
        *lock(&self.last_run) = Some(started_at);

        let mut span = obs.tracer.start_span("task.run", &self.meta());
        self.events.publish(SchedulerEvent::TaskStarting {
            task_id: self.id.clone(),
            task_name: self.name.clone(),
            timestamp: started_at,
        });

        let started = Instant::now();
        let (attempts, result) = self.run_with_retry(&mut *span).await;
        let elapsed = started.elapsed();

        obs.metrics.observe("task.duration_ms", elapsed.as_secs_f64() * 1000.0);
        obs.metrics.inc("task.runs");
        self.runs.fetch_add(1, Ordering::SeqCst);
        span.set_attr("task.attempts", &attempts.to_string());

        let mut meta = self.meta();
        meta.push(("attempts", attempts.to_string()));
        meta.push(("duration_ms", elapsed.as_millis().to_string()));

        match result {
            Ok(()) => {
                *lock(&self.last_error) = None;
                obs.logger.log("task completed", Level::Info, &meta);
                self.events.publish(SchedulerEvent::TaskCompleted {
                    task_id: self.id.clone(),
                    task_name: self.name.clone(),
                    timestamp: self.clock.now(),
                    duration_ms: elapsed.as_millis() as u64,
                    attempts,
                });
            }
            Err(e) => {
                self.failures.fetch_add(1, Ordering::SeqCst);
                obs.metrics.inc("task.errors");
                span.record_error(&e);
                meta.push(("error", e.to_string()));
                obs.logger.log("task failed", Level::Error, &meta);
                *lock(&self.last_error) = Some(e.to_string());
                self.events.publish(SchedulerEvent::TaskFailed {
                    task_id: self.id.clone(),
                    task_name: self.name.clone(),
                    timestamp: self.clock.now(),
                    error: e.to_string(),
                    attempts,
                });
            }
        }

        span.end();
    }

    /// Runs attempts until one succeeds or the retry budget is spent.
    /// Returns the number of attempts made and the final outcome.
    async fn run_with_retry(&self, span: &mut dyn Span) -> (u32, Result<()>) {
        let mut attempt: u32 = 0;
        let mut prev = Duration::ZERO;

        loop {
            let err = match self.attempt().await {
                Ok(()) => return (attempt + 1, Ok(())),
                Err(e) => e,
            };
            if attempt >= self.retry.retries {
                return (attempt + 1, Err(err));
            }

            let delay = self.retry.delay(attempt, prev);
            prev = delay;
            attempt += 1;

            span.set_attr("task.last_attempt_error", &err.to_string());
            self.observability.metrics.inc("task.retries");
            let mut meta = self.meta();
            meta.push(("attempt", attempt.to_string()));
            meta.push(("delay_ms", delay.as_millis().to_string()));
            meta.push(("error", err.to_string()));
            self.observability
                .logger
                .log("task attempt failed, retrying", Level::Warn, &meta);
            self.events.publish(SchedulerEvent::TaskRetrying {
                task_id: self.id.clone(),
                task_name: self.name.clone(),
                timestamp: self.clock.now(),
                attempt,
                delay_ms: delay.as_millis() as u64,
            });

            tokio::time::sleep(delay).await;
        }
    }

    /// One invocation of the body, bounded by the retry policy's timeout.
    async fn attempt(&self) -> Result<()> {
        let mut handle = tokio::spawn((self.run)());
        let Some(limit) = self.retry.timeout else {
            return join_result(handle.await);
        };

        match tokio::time::timeout(limit, &mut handle).await {
            Ok(joined) => join_result(joined),
            Err(_) => {
                handle.abort();
                self.observability.metrics.inc("task.timeouts");
                self.events.publish(SchedulerEvent::TaskTimedOut {
                    task_id: self.id.clone(),
                    task_name: self.name.clone(),
                    timestamp: self.clock.now(),
                    timeout_duration_ms: limit.as_millis() as u64,
                });
                Err(TaskclockError::TaskTimeout(format!(
                    "Task '{}' timed out after {:?}",
                    self.name, limit
                )))
            }
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

struct TaskEntry {
    def: TaskDef,
    runtime: Arc<TaskRuntime>,
    handle: Option<TaskHandle>,
    cancelled: bool,
}

/// Registry of named tasks backed by a [`Scheduler`].
///
/// Construct it explicitly and pass it to whoever needs it; there is no
/// global instance.
///
/// # Examples
///
/// ```no_run
/// use std::time::Duration;
/// use taskclock::{Observability, Scheduler, TaskDef, TaskRegistry};
///
/// #[tokio::main]
/// async fn main() -> taskclock::Result<()> {
///     let registry = TaskRegistry::new(Scheduler::new(), Observability::default());
///
///     registry
///         .register(TaskDef::every("refresh-curves", Duration::from_secs(60), || async {
///             Ok(())
///         }))?
///         .register(TaskDef::every("rebalance", Duration::from_secs(3600), || async {
///             Ok(())
///         }))?;
///
///     registry.start_all()?;
///     for task in registry.list() {
///         println!("{} is {}", task.id, task.status);
///     }
///     Ok(())
/// }
/// ```
pub struct TaskRegistry {
    scheduler: Scheduler,
    observability: Observability,
    tasks: Mutex<HashMap<String, TaskEntry>>,
}

impl TaskRegistry {
    pub fn new(scheduler: Scheduler, observability: Observability) -> Self {
        TaskRegistry {
            scheduler,
            observability,
            tasks: Mutex::new(HashMap::new()),
        }
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    pub fn observability(&self) -> &Observability {
        &self.observability
    }

    fn lock_tasks(&self) -> MutexGuard<'_, HashMap<String, TaskEntry>> {
        lock(&self.tasks)
    }

    /// Stores a definition without scheduling it.
    ///
    /// # Errors
    ///
    /// Returns [`TaskclockError::Config`] if the id is empty or already
    /// registered, or if the schedule is invalid.
    pub fn register(&self, def: TaskDef) -> Result<&Self> {
        if def.id.trim().is_empty() {
            return Err(TaskclockError::Config("task id must not be empty".to_string()));
        }
        JobConfig {
            repeat: def.repeat,
            ..def.job_config()
        }
        .validate()?;

        let mut tasks = self.lock_tasks();
        if tasks.contains_key(&def.id) {
            return Err(TaskclockError::Config(format!(
                "task '{}' is already registered",
                def.id
            )));
        }

        let runtime = Arc::new(TaskRuntime {
            id: def.id.clone(),
            name: def.name.clone(),
            job_id: job_id_for(&def.id),
            run: Arc::clone(&def.run),
            retry: def.retry.clone(),
            skip_if_running: def.skip_if_running,
            repeat: def.repeat,
            launched: AtomicU64::new(0),
            running: AtomicUsize::new(0),
            runs: AtomicU64::new(0),
            failures: AtomicU64::new(0),
            skips: AtomicU64::new(0),
            last_error: Mutex::new(None),
            last_run: Mutex::new(None),
            observability: self.observability.clone(),
            events: self.scheduler.event_bus().clone(),
            clock: Arc::clone(self.scheduler.clock()),
            scheduler: self.scheduler.downgrade(),
        });

        debug!("Registered task '{}' ({})", def.id, def.schedule);
        tasks.insert(
            def.id.clone(),
            TaskEntry {
                def,
                runtime,
                handle: None,
                cancelled: false,
            },
        );
        Ok(self)
    }

    /// Schedules a registered task.
    ///
    /// Starting a task that is already live returns its existing handle.
    /// A cancelled or finished task is scheduled afresh.
    ///
    /// # Errors
    ///
    /// [`TaskclockError::TaskNotFound`] for an unknown id,
    /// [`TaskclockError::Config`] for a disabled task, and whatever
    /// [`Scheduler::add_job`] reports.
    pub fn start(&self, id: &str) -> Result<TaskHandle> {
        let mut tasks = self.lock_tasks();
        let entry = tasks
            .get_mut(id)
            .ok_or_else(|| TaskclockError::TaskNotFound(id.to_string()))?;
        self.start_entry(entry)
    }

    fn start_entry(&self, entry: &mut TaskEntry) -> Result<TaskHandle> {
        if !entry.def.enabled {
            return Err(TaskclockError::Config(format!(
                "task '{}' is disabled",
                entry.def.id
            )));
        }
        if let Some(handle) = &entry.handle {
            if self.scheduler.get(&handle.job_id).is_some() {
                return Ok(handle.clone());
            }
        }

        let runtime = Arc::clone(&entry.runtime);
        runtime.launched.store(0, Ordering::SeqCst);
        let dispatch = job_fn(move || {
            let runtime = Arc::clone(&runtime);
            async move {
                runtime.dispatch(true);
                Ok(())
            }
        });

        let job_id = self.scheduler.add_job(dispatch, entry.def.job_config())?;
        let handle = TaskHandle {
            task_id: entry.def.id.clone(),
            job_id,
        };
        entry.handle = Some(handle.clone());
        entry.cancelled = false;

        info!("Started task '{}' ({})", entry.def.id, entry.def.schedule);
        Ok(handle)
    }

    /// Starts every enabled task that has not been started yet.
    pub fn start_all(&self) -> Result<Vec<TaskHandle>> {
        let mut tasks = self.lock_tasks();
        let mut ids: Vec<String> = tasks
            .values()
            .filter(|e| e.def.enabled && e.handle.is_none() && !e.cancelled)
            .map(|e| e.def.id.clone())
            .collect();
        ids.sort();

        let mut handles = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(entry) = tasks.get_mut(&id) {
                handles.push(self.start_entry(entry)?);
            }
        }
        Ok(handles)
    }

    /// Runs a task once right now, outside its schedule.
    ///
    /// Returns `Ok(false)` when skip-if-running suppressed the run.
    pub fn trigger(&self, id: &str) -> Result<bool> {
        tokio::runtime::Handle::try_current().map_err(|_| {
            TaskclockError::Scheduler("tasks can only be triggered inside a tokio runtime".to_string())
        })?;
        let runtime = {
            let tasks = self.lock_tasks();
            let entry = tasks
                .get(id)
                .ok_or_else(|| TaskclockError::TaskNotFound(id.to_string()))?;
            Arc::clone(&entry.runtime)
        };
        Ok(runtime.dispatch(false))
    }

    /// Pauses a started task. Returns `false` if the task is unknown or not live.
    pub fn pause(&self, id: &str) -> bool {
        self.job_id(id)
            .map_or(false, |job_id| self.scheduler.pause(&job_id))
    }

    /// Resumes a paused task. Returns `false` if the task is unknown or not live.
    pub fn resume(&self, id: &str) -> bool {
        self.job_id(id)
            .map_or(false, |job_id| self.scheduler.resume(&job_id))
    }

    /// Removes the task's scheduler job. A body already running finishes.
    /// Returns `false` if the task is unknown or was never started.
    pub fn cancel(&self, id: &str) -> bool {
        let mut tasks = self.lock_tasks();
        match tasks.get_mut(id) {
            Some(entry) => self.cancel_entry(entry),
            None => false,
        }
    }

    fn cancel_entry(&self, entry: &mut TaskEntry) -> bool {
        let Some(handle) = entry.handle.take() else {
            return false;
        };
        self.scheduler.remove(&handle.job_id);
        entry.cancelled = true;

        info!("Cancelled task '{}'", entry.def.id);
        self.scheduler
            .event_bus()
            .publish(SchedulerEvent::TaskCancelled {
                task_id: entry.def.id.clone(),
                task_name: entry.def.name.clone(),
                timestamp: self.scheduler.clock().now(),
            });
        true
    }

    /// Cancels every started task.
    pub fn cancel_all(&self) {
        let mut tasks = self.lock_tasks();
        for entry in tasks.values_mut() {
            self.cancel_entry(entry);
        }
    }

    /// Cancels the task if needed and forgets its definition.
    pub fn remove(&self, id: &str) -> bool {
        let mut tasks = self.lock_tasks();
        match tasks.get_mut(id) {
            Some(entry) => {
                self.cancel_entry(entry);
                tasks.remove(id);
                debug!("Removed task '{}'", id);
                true
            }
            None => false,
        }
    }

    /// State of every task, ordered by id.
    pub fn list(&self) -> Vec<TaskState> {
        let tasks = self.lock_tasks();
        let mut states: Vec<TaskState> = tasks.values().map(|e| self.state_of(e)).collect();
        states.sort_by(|a, b| a.id.cmp(&b.id));
        states
    }

    pub fn get(&self, id: &str) -> Option<TaskState> {
        self.lock_tasks().get(id).map(|e| self.state_of(e))
    }

    /// State of every task carrying `tag`, ordered by id.
    pub fn with_tag(&self, tag: &str) -> Vec<TaskState> {
        let tasks = self.lock_tasks();
        let mut states: Vec<TaskState> = tasks
            .values()
            .filter(|e| e.def.has_tag(tag))
            .map(|e| self.state_of(e))
            .collect();
        states.sort_by(|a, b| a.id.cmp(&b.id));
        states
    }

    pub fn len(&self) -> usize {
        self.lock_tasks().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn job_id(&self, id: &str) -> Option<String> {
        self.lock_tasks()
            .get(id)
            .and_then(|e| e.handle.as_ref().map(|h| h.job_id.clone()))
    }

    fn state_of(&self, entry: &TaskEntry) -> TaskState {
        let runtime = &entry.runtime;
        let job = entry
            .handle
            .as_ref()
            .and_then(|h| self.scheduler.get(&h.job_id));
        let running = runtime.running.load(Ordering::SeqCst) > 0;

        let status = if entry.cancelled {
            TaskStatus::Cancelled
        } else if running {
            TaskStatus::Running
        } else {
            match (&entry.handle, &job) {
                (None, _) => TaskStatus::Registered,
                (Some(_), None) => TaskStatus::Finished,
                (Some(_), Some(job)) if job.state == JobState::Paused => TaskStatus::Paused,
                (Some(_), Some(_)) => TaskStatus::Scheduled,
            }
        };

        TaskState {
            id: entry.def.id.clone(),
            name: entry.def.name.clone(),
            status,
            runs: runtime.runs.load(Ordering::SeqCst),
            failures: runtime.failures.load(Ordering::SeqCst),
            skips: runtime.skips.load(Ordering::SeqCst),
            last_error: lock(&runtime.last_error).clone(),
            last_run: *lock(&runtime.last_run),
            next_run: job.and_then(|j| j.next_run),
            tags: entry.def.tags.clone(),
        }
    }
}

impl fmt::Debug for TaskRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskRegistry")
            .field("tasks", &self.len())
            .finish()
    }
}
