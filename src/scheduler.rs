//! Timer-driven job scheduler.
//!
//! This module provides the [`Scheduler`] type. Every job owns at most one
//! armed timer (a sleeping tokio task). When the timer fires the job body is
//! executed, and only after it settles is the next timer armed, so a job never
//! overlaps with itself. Jobs do not wait on each other.
//!
//! Lifecycle per job:
//!
//! ```text
//! add ──► scheduled ──► running ──► scheduled ...
//!             │  ▲          │
//!       pause │  │ resume   └──► removed (repeat cap / one-shot / remove)
//!             ▼  │
//!           paused
//! ```
//!
//! A cron job whose spec has no match within the search horizon stays listed
//! as [`JobState::Dormant`] with no timer.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;

use chrono::{DateTime, Utc};
use log::{debug, info, trace, warn};
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use uuid::Uuid;

use crate::clock::{Clock, SystemClock};
use crate::cron::{next_cron_within, CronSpec, CRON_SEARCH_HORIZON_MINUTES};
use crate::errors::TaskclockError;
use crate::events::{EventBus, RemovalReason, SchedulerEvent};
use crate::job::{
    job_fn, run_isolated, IntervalMode, JobConfig, JobFn, JobInfo, JobState, Schedule,
};
use crate::Result;

/// Configuration options for the scheduler.
///
/// # Examples
///
/// ```
/// use taskclock::{IntervalMode, SchedulerConfig};
/// use std::time::Duration;
///
/// let config = SchedulerConfig {
///     interval_mode: IntervalMode::FixedRate,
///     shutdown_grace_period: Duration::from_secs(10),
///     ..SchedulerConfig::default()
/// };
/// ```
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Spacing policy for `Every` jobs that do not override it.
    /// Default: [`IntervalMode::FixedDelay`]
    pub interval_mode: IntervalMode,

    /// How many minutes ahead a cron job searches for its next match.
    /// Default: 525_600 (one year)
    pub cron_horizon_minutes: u32,

    /// How long [`Scheduler::shutdown`] waits for in-flight executions.
    /// Default: 30s
    pub shutdown_grace_period: Duration,

    /// Buffer size of the event bus. Default: 1000
    pub event_capacity: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        SchedulerConfig {
            interval_mode: IntervalMode::FixedDelay,
            cron_horizon_minutes: CRON_SEARCH_HORIZON_MINUTES,
            shutdown_grace_period: Duration::from_secs(30),
            event_capacity: 1000,
        }
    }
}

/// What caused an execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Trigger {
    Immediate,
    Timer,
}

struct JobEntry {
    /// Distinguishes this record from a later job added under the same id.
    instance: u64,
    func: JobFn,
    config: JobConfig,
    runs: u64,
    last_run: Option<DateTime<Utc>>,
    next_run: Option<DateTime<Utc>>,
    active: bool,
    running: bool,
    dormant: bool,
    /// Bumped on every arm/cancel; a timer only fires if its epoch is current.
    epoch: u64,
    timer: Option<JoinHandle<()>>,
    /// Last scheduled fire, for fixed-rate spacing.
    rate_anchor: Option<Instant>,
    /// Wall-clock instant the last timer fire was due at.
    last_due: Option<DateTime<Utc>>,
}

impl JobEntry {
    fn cancel_timer(&mut self) {
        self.epoch += 1;
        self.next_run = None;
        if let Some(handle) = self.timer.take() {
            handle.abort();
        }
    }

    fn state(&self) -> JobState {
        if self.running {
            JobState::Running
        } else if !self.active {
            JobState::Paused
        } else if self.dormant {
            JobState::Dormant
        } else {
            JobState::Scheduled
        }
    }

    fn info(&self, id: &str) -> JobInfo {
        JobInfo {
            id: id.to_string(),
            config: self.config.clone(),
            runs: self.runs,
            last_run: self.last_run,
            next_run: self.next_run,
            active: self.active,
            state: self.state(),
        }
    }

    fn exhausted(&self, trigger: Trigger) -> bool {
        let capped = matches!(self.config.repeat, Some(cap) if self.runs >= cap);
        let one_shot_done =
            trigger == Trigger::Timer && matches!(self.config.schedule, Schedule::Once(_));
        capped || one_shot_done
    }
}

struct SchedulerInner {
    jobs: Mutex<HashMap<String, JobEntry>>,
    config: SchedulerConfig,
    clock: Arc<dyn Clock>,
    event_bus: EventBus,
    instances: AtomicU64,
    in_flight: AtomicUsize,
    idle: Notify,
}

/// Owns the job table and one timer per job.
///
/// `Scheduler` is cheap to clone; clones share the same job table. All
/// operations except [`shutdown`](Scheduler::shutdown) are synchronous, but
/// adding a job requires a running tokio runtime.
///
/// # Examples
///
/// ```no_run
/// use std::time::Duration;
/// use taskclock::{JobConfig, Scheduler};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let scheduler = Scheduler::new();
///
///     let id = scheduler.add(
///         || async {
///             println!("recomputing margin");
///             Ok(())
///         },
///         JobConfig::every(Duration::from_secs(1)).with_repeat(3),
///     )?;
///
///     tokio::time::sleep(Duration::from_secs(4)).await;
///     assert!(scheduler.get(&id).is_none());
///
///     scheduler.shutdown().await;
///     Ok(())
/// }
/// ```
#[derive(Clone)]
pub struct Scheduler {
    inner: Arc<SchedulerInner>,
}

impl Scheduler {
    /// Creates a new scheduler with default configuration.
    pub fn new() -> Self {
        Self::with_config(SchedulerConfig::default())
    }

    /// Creates a new scheduler with custom configuration.
    pub fn with_config(config: SchedulerConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Creates a scheduler that reads "now" from `clock`.
    pub fn with_clock(config: SchedulerConfig, clock: Arc<dyn Clock>) -> Self {
        let event_bus = EventBus::with_capacity(config.event_capacity);
        Scheduler {
            inner: Arc::new(SchedulerInner {
                jobs: Mutex::new(HashMap::new()),
                config,
                clock,
                event_bus,
                instances: AtomicU64::new(0),
                in_flight: AtomicUsize::new(0),
                idle: Notify::new(),
            }),
        }
    }

    /// Returns a reference to the event bus.
    pub fn event_bus(&self) -> &EventBus {
        &self.inner.event_bus
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.inner.config
    }

    /// The clock the scheduler reads "now" from.
    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.inner.clock
    }

    /// Adds a job and arms its first timer.
    ///
    /// Returns the job id (the configured one, or a generated UUID). The job is
    /// visible in [`list`](Scheduler::list) as soon as this returns. Adding a
    /// job under an id that already exists replaces the old job.
    ///
    /// # Errors
    ///
    /// Returns [`TaskclockError::Config`] for an invalid configuration and
    /// [`TaskclockError::Scheduler`] when called outside a tokio runtime.
    pub fn add<F, Fut>(&self, func: F, config: JobConfig) -> Result<String>
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = Result<()>> + Send + 'static,
    {
        self.add_job(job_fn(func), config)
    }

    /// Adds a job whose function is already a [`JobFn`].
    pub fn add_job(&self, func: JobFn, config: JobConfig) -> Result<String> {
        config.validate()?;
        tokio::runtime::Handle::try_current().map_err(|_| {
            TaskclockError::Scheduler("jobs can only be added inside a tokio runtime".to_string())
        })?;

        let id = config
            .id
            .clone()
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        let immediate = config.immediate;
        let schedule = config.schedule.to_string();
        let now = self.inner.clock.now();

        let mut entry = JobEntry {
            instance: self.inner.instances.fetch_add(1, Ordering::Relaxed),
            func,
            config,
            runs: 0,
            last_run: None,
            next_run: None,
            active: true,
            running: false,
            dormant: false,
            epoch: 0,
            timer: None,
            rate_anchor: None,
            last_due: None,
        };

        {
            let mut jobs = self.inner.lock_jobs();
            if let Some(mut old) = jobs.remove(&id) {
                warn!("Replacing existing job '{}'", id);
                old.cancel_timer();
                self.inner.publish_removed(&id, RemovalReason::Replaced);
            }

            if immediate {
                entry.running = true;
                let func = Arc::clone(&entry.func);
                let instance = entry.instance;
                let inner = Arc::clone(&self.inner);
                let job_id = id.clone();
                tokio::spawn(async move {
                    inner.execute(job_id, instance, func, Trigger::Immediate).await;
                });
            } else {
                self.inner.arm(&id, &mut entry, now);
            }
            jobs.insert(id.clone(), entry);
        }

        debug!("Added job '{}' ({})", id, schedule);
        self.inner.event_bus.publish(SchedulerEvent::JobAdded {
            job_id: id.clone(),
            timestamp: now,
        });

        Ok(id)
    }

    /// Adds a job that fires every `interval`.
    pub fn every<F, Fut>(&self, func: F, interval: Duration) -> Result<String>
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = Result<()>> + Send + 'static,
    {
        self.add(func, JobConfig::every(interval))
    }

    /// Adds a job that fires once at `at`.
    pub fn at<F, Fut>(&self, func: F, at: DateTime<Utc>) -> Result<String>
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = Result<()>> + Send + 'static,
    {
        self.add(func, JobConfig::once(at))
    }

    /// Adds a job that fires on every minute matching `spec`.
    pub fn cron<F, Fut>(&self, func: F, spec: CronSpec) -> Result<String>
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = Result<()>> + Send + 'static,
    {
        self.add(func, JobConfig::cron(spec))
    }

    /// Cancels the job's timer and deletes it.
    ///
    /// An execution already in flight runs to completion. Returns `false` if
    /// the id is unknown.
    pub fn remove(&self, id: &str) -> bool {
        self.inner.remove_job(id, RemovalReason::Explicit)
    }

    /// Removes a job whose owner decided its schedule is used up.
    pub(crate) fn retire(&self, id: &str) -> bool {
        self.inner.remove_job(id, RemovalReason::Exhausted)
    }

    pub(crate) fn downgrade(&self) -> WeakScheduler {
        WeakScheduler {
            inner: Arc::downgrade(&self.inner),
        }
    }

    /// Cancels the job's timer but keeps its record and counters.
    ///
    /// Pausing an already paused job has no effect. Returns `false` if the id
    /// is unknown.
    pub fn pause(&self, id: &str) -> bool {
        let mut jobs = self.inner.lock_jobs();
        let Some(entry) = jobs.get_mut(id) else {
            return false;
        };
        if entry.active {
            entry.active = false;
            entry.cancel_timer();
            drop(jobs);
            debug!("Paused job '{}'", id);
            self.inner.event_bus.publish(SchedulerEvent::JobPaused {
                job_id: id.to_string(),
                timestamp: self.inner.clock.now(),
            });
        }
        true
    }

    /// Re-activates a paused job and arms it from now.
    ///
    /// The original phase is not preserved: an interval job waits a full
    /// interval from the resume, a past one-shot fires right away. If the job
    /// is still finishing an execution, the timer is armed when it completes.
    /// Returns `false` if the id is unknown.
    pub fn resume(&self, id: &str) -> bool {
        let now = self.inner.clock.now();
        let mut jobs = self.inner.lock_jobs();
        let Some(entry) = jobs.get_mut(id) else {
            return false;
        };
        if !entry.active {
            entry.active = true;
            entry.rate_anchor = None;
            if !entry.running {
                self.inner.arm(id, entry, now);
            }
            drop(jobs);
            debug!("Resumed job '{}'", id);
            self.inner.event_bus.publish(SchedulerEvent::JobResumed {
                job_id: id.to_string(),
                timestamp: now,
            });
        }
        true
    }

    /// Cancels every timer and empties the job table.
    pub fn clear(&self) {
        let drained: Vec<(String, JobEntry)> = self.inner.lock_jobs().drain().collect();
        for (id, mut entry) in drained {
            entry.cancel_timer();
            self.inner.publish_removed(&id, RemovalReason::Cleared);
        }
        info!("Scheduler cleared");
    }

    /// Clears the scheduler and waits for in-flight executions to finish, up
    /// to the configured grace period.
    pub async fn shutdown(&self) {
        self.clear();

        let grace = self.inner.config.shutdown_grace_period;
        let wait = async {
            loop {
                let notified = self.inner.idle.notified();
                if self.inner.in_flight.load(Ordering::SeqCst) == 0 {
                    break;
                }
                notified.await;
            }
        };
        if tokio::time::timeout(grace, wait).await.is_err() {
            warn!(
                "{} job execution(s) still running after {:?} grace period",
                self.inner.in_flight.load(Ordering::SeqCst),
                grace
            );
        }
        info!("Scheduler shut down");
    }

    /// Snapshot of every job.
    pub fn list(&self) -> Vec<JobInfo> {
        self.inner
            .lock_jobs()
            .iter()
            .map(|(id, entry)| entry.info(id))
            .collect()
    }

    /// Snapshot of one job.
    pub fn get(&self, id: &str) -> Option<JobInfo> {
        self.inner.lock_jobs().get(id).map(|entry| entry.info(id))
    }

    pub fn len(&self) -> usize {
        self.inner.lock_jobs().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of job bodies currently executing.
    pub fn in_flight(&self) -> usize {
        self.inner.in_flight.load(Ordering::SeqCst)
    }
}

/// Non-owning reference to a [`Scheduler`], held by job bodies that reach
/// back into the scheduler running them.
#[derive(Clone)]
pub(crate) struct WeakScheduler {
    inner: Weak<SchedulerInner>,
}

impl WeakScheduler {
    pub(crate) fn upgrade(&self) -> Option<Scheduler> {
        self.inner.upgrade().map(|inner| Scheduler { inner })
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl SchedulerInner {
    fn lock_jobs(&self) -> MutexGuard<'_, HashMap<String, JobEntry>> {
        self.jobs.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn remove_job(&self, id: &str, reason: RemovalReason) -> bool {
        let removed = self.lock_jobs().remove(id);
        match removed {
            Some(mut entry) => {
                entry.cancel_timer();
                debug!("Removed job '{}' ({:?})", id, reason);
                self.publish_removed(id, reason);
                true
            }
            None => false,
        }
    }

    fn publish_removed(&self, id: &str, reason: RemovalReason) {
        self.event_bus.publish(SchedulerEvent::JobRemoved {
            job_id: id.to_string(),
            reason,
            timestamp: self.clock.now(),
        });
    }

    /// Delay until the job's next fire, or `None` if it will never fire again.
    fn next_delay(&self, entry: &mut JobEntry, now: DateTime<Utc>) -> Option<Duration> {
        match &entry.config.schedule {
            Schedule::Every(interval) => {
                let mode = entry
                    .config
                    .interval_mode
                    .unwrap_or(self.config.interval_mode);
                match mode {
                    IntervalMode::FixedDelay => Some(*interval),
                    IntervalMode::FixedRate => {
                        let current = Instant::now();
                        let due = entry.rate_anchor.map_or(current + *interval, |anchor| {
                            anchor + *interval
                        });
                        let due = due.max(current);
                        entry.rate_anchor = Some(due);
                        Some(due - current)
                    }
                }
            }
            Schedule::Once(at) => Some((*at - now).to_std().unwrap_or(Duration::ZERO)),
            Schedule::Cron(spec) => {
                // A timer may wake just before the wall clock reaches the
                // minute it was due at; never search from before that minute.
                let from = entry.last_due.map_or(now, |due| due.max(now));
                next_cron_within(spec, from, self.config.cron_horizon_minutes)
                    .map(|next| (next - now).to_std().unwrap_or(Duration::ZERO))
            }
        }
    }

    /// Replaces any live timer for `id` with a fresh one.
    fn arm(self: &Arc<Self>, id: &str, entry: &mut JobEntry, now: DateTime<Utc>) {
        entry.cancel_timer();

        let Some(delay) = self.next_delay(entry, now) else {
            entry.dormant = true;
            info!("Job '{}' has no future fire time and is now dormant", id);
            self.event_bus.publish(SchedulerEvent::JobDormant {
                job_id: id.to_string(),
                timestamp: now,
            });
            return;
        };

        entry.dormant = false;
        entry.next_run = chrono::Duration::from_std(delay)
            .ok()
            .and_then(|d| now.checked_add_signed(d));

        let epoch = entry.epoch;
        let weak: Weak<SchedulerInner> = Arc::downgrade(self);
        let job_id = id.to_string();
        trace!("Arming job '{}' in {:?}", id, delay);

        entry.timer = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Some(inner) = weak.upgrade() {
                inner.fire(job_id, epoch).await;
            }
        }));
    }

    async fn fire(self: Arc<Self>, id: String, epoch: u64) {
        let (func, instance) = {
            let mut jobs = self.lock_jobs();
            let Some(entry) = jobs.get_mut(&id) else {
                return;
            };
            if entry.epoch != epoch || !entry.active || entry.running {
                trace!("Stale timer for job '{}' ignored", id);
                return;
            }
            // Detach: this task now carries the execution and must not be
            // aborted by a later remove/pause.
            drop(entry.timer.take());
            entry.last_due = entry.next_run.take();
            entry.running = true;
            (Arc::clone(&entry.func), entry.instance)
        };

        self.execute(id, instance, func, Trigger::Timer).await;
    }

    async fn execute(self: Arc<Self>, id: String, instance: u64, func: JobFn, trigger: Trigger) {
        self.in_flight.fetch_add(1, Ordering::SeqCst);
        let started_at = self.clock.now();
        let started = Instant::now();

        self.event_bus.publish(SchedulerEvent::JobStarting {
            job_id: id.clone(),
            timestamp: started_at,
        });

        match run_isolated(func()).await {
            Ok(()) => {
                let elapsed = started.elapsed();
                debug!("Job '{}' completed in {:?}", id, elapsed);
                self.event_bus.publish(SchedulerEvent::JobCompleted {
                    job_id: id.clone(),
                    timestamp: self.clock.now(),
                    duration_ms: elapsed.as_millis() as u64,
                });
            }
            Err(e) => {
                warn!("Job '{}' failed: {}", id, e);
                self.event_bus.publish(SchedulerEvent::JobFailed {
                    job_id: id.clone(),
                    timestamp: self.clock.now(),
                    error: e.to_string(),
                });
            }
        }

        self.complete(&id, instance, trigger, started_at);

        if self.in_flight.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.idle.notify_waiters();
        }
    }

    /// Records the run and re-arms, unless the job was removed, replaced,
    /// paused or exhausted meanwhile.
    fn complete(self: &Arc<Self>, id: &str, instance: u64, trigger: Trigger, started_at: DateTime<Utc>) {
        let mut jobs = self.lock_jobs();
        let Some(entry) = jobs.get_mut(id) else {
            debug!("Job '{}' was removed while running", id);
            return;
        };
        if entry.instance != instance {
            return;
        }

        entry.running = false;
        entry.runs += 1;
        entry.last_run = Some(started_at);

        if entry.exhausted(trigger) {
            if let Some(mut entry) = jobs.remove(id) {
                entry.cancel_timer();
            }
            drop(jobs);
            debug!("Job '{}' finished its schedule", id);
            self.publish_removed(id, RemovalReason::Exhausted);
            return;
        }

        if !entry.active {
            return;
        }
        self.arm(id, entry, self.clock.now());
    }
}

impl Drop for SchedulerInner {
    fn drop(&mut self) {
        let jobs = self.jobs.get_mut().unwrap_or_else(|e| e.into_inner());
        if !jobs.is_empty() {
            warn!("Scheduler dropped with {} job(s) still registered", jobs.len());
            for entry in jobs.values_mut() {
                entry.cancel_timer();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::job::JobFuture;
    use chrono::TimeZone;
    use std::sync::atomic::AtomicU32;

    fn counting_job(counter: &Arc<AtomicU32>) -> impl Fn() -> std::future::Ready<Result<()>> {
        let counter = Arc::clone(counter);
        move || {
            counter.fetch_add(1, Ordering::SeqCst);
            std::future::ready(Ok(()))
        }
    }

    #[test]
    fn test_scheduler_config_default() {
        let config = SchedulerConfig::default();
        assert_eq!(config.interval_mode, IntervalMode::FixedDelay);
        assert_eq!(config.cron_horizon_minutes, 525_600);
        assert_eq!(config.shutdown_grace_period, Duration::from_secs(30));
        assert_eq!(config.event_capacity, 1000);
    }

    #[test]
    fn test_add_outside_runtime_fails() {
        let scheduler = Scheduler::new();
        let result = scheduler.every(|| async { Ok(()) }, Duration::from_secs(1));
        assert!(matches!(result, Err(TaskclockError::Scheduler(_))));
        assert!(scheduler.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_add_is_visible_immediately() {
        let scheduler = Scheduler::new();
        let id = scheduler
            .add(|| async { Ok(()) }, JobConfig::every(Duration::from_secs(1)).with_id("quotes"))
            .unwrap();

        assert_eq!(id, "quotes");
        let info = scheduler.get(&id).unwrap();
        assert_eq!(info.state, JobState::Scheduled);
        assert_eq!(info.runs, 0);
        assert!(info.active);
        assert!(info.next_run.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_generated_ids_are_unique() {
        let scheduler = Scheduler::new();
        let a = scheduler.every(|| async { Ok(()) }, Duration::from_secs(1)).unwrap();
        let b = scheduler.every(|| async { Ok(()) }, Duration::from_secs(1)).unwrap();
        assert_ne!(a, b);
        assert_eq!(scheduler.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_interval_rejected() {
        let scheduler = Scheduler::new();
        let result = scheduler.every(|| async { Ok(()) }, Duration::ZERO);
        assert!(matches!(result, Err(TaskclockError::Config(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_repeat_cap_removes_job() {
        let counter = Arc::new(AtomicU32::new(0));
        let scheduler = Scheduler::new();
        let id = scheduler
            .add(
                counting_job(&counter),
                JobConfig::every(Duration::from_millis(1000)).with_repeat(3),
            )
            .unwrap();

        tokio::time::sleep(Duration::from_millis(2500)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 2);
        assert_eq!(scheduler.get(&id).unwrap().runs, 2);

        tokio::time::sleep(Duration::from_millis(1000)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 3);
        assert!(scheduler.get(&id).is_none());

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_remove_is_idempotent() {
        let counter = Arc::new(AtomicU32::new(0));
        let scheduler = Scheduler::new();
        let id = scheduler.every(counting_job(&counter), Duration::from_millis(100)).unwrap();

        assert!(scheduler.remove(&id));
        assert!(!scheduler.remove(&id));
        assert!(!scheduler.remove("never-added"));

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_pause_resume_resets_phase() {
        let counter = Arc::new(AtomicU32::new(0));
        let scheduler = Scheduler::new();
        let id = scheduler.every(counting_job(&counter), Duration::from_millis(1000)).unwrap();

        tokio::time::sleep(Duration::from_millis(600)).await;
        assert!(scheduler.pause(&id));
        assert!(scheduler.pause(&id));
        let info = scheduler.get(&id).unwrap();
        assert_eq!(info.state, JobState::Paused);
        assert!(!info.active);
        assert!(info.next_run.is_none());

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 0);

        assert!(scheduler.resume(&id));
        // A full interval from the resume, not 400ms left of the old phase.
        tokio::time::sleep(Duration::from_millis(600)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 0);
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unknown_ids_are_noops() {
        let scheduler = Scheduler::new();
        assert!(!scheduler.pause("ghost"));
        assert!(!scheduler.resume("ghost"));
        assert!(scheduler.get("ghost").is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_failures_do_not_stop_schedule() {
        let counter = Arc::new(AtomicU32::new(0));
        let counter_clone = Arc::clone(&counter);
        let scheduler = Scheduler::new();
        let id = scheduler
            .every(
                move || {
                    counter_clone.fetch_add(1, Ordering::SeqCst);
                    async { Err::<(), TaskclockError>("feed offline".into()) }
                },
                Duration::from_millis(100),
            )
            .unwrap();

        tokio::time::sleep(Duration::from_millis(550)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 5);
        assert_eq!(scheduler.get(&id).unwrap().runs, 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_panicking_job_keeps_schedule() {
        let counter = Arc::new(AtomicU32::new(0));
        let counter_clone = Arc::clone(&counter);
        let scheduler = Scheduler::new();
        scheduler
            .every(
                move || {
                    let n = counter_clone.fetch_add(1, Ordering::SeqCst);
                    async move {
                        if n == 0 {
                            panic!("first run panics");
                        }
                        Ok(())
                    }
                },
                Duration::from_millis(100),
            )
            .unwrap();

        tokio::time::sleep(Duration::from_millis(350)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_once_in_past_fires_and_is_removed() {
        let counter = Arc::new(AtomicU32::new(0));
        let scheduler = Scheduler::new();
        let id = scheduler
            .at(counting_job(&counter), Utc::now() - chrono::Duration::hours(1))
            .unwrap();

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert!(scheduler.get(&id).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_immediate_runs_before_schedule() {
        let counter = Arc::new(AtomicU32::new(0));
        let scheduler = Scheduler::new();
        scheduler
            .add(
                counting_job(&counter),
                JobConfig::every(Duration::from_secs(60)).immediately(),
            )
            .unwrap();

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 1);
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unsatisfiable_cron_is_dormant() {
        let counter = Arc::new(AtomicU32::new(0));
        let scheduler = Scheduler::new();
        let spec = CronSpec::every_minute().with_days_of_month(&[31]).with_months(&[2]);
        let id = scheduler.cron(counting_job(&counter), spec).unwrap();

        let info = scheduler.get(&id).unwrap();
        assert_eq!(info.state, JobState::Dormant);
        assert!(info.next_run.is_none());

        tokio::time::sleep(Duration::from_secs(3600)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 0);
        assert_eq!(scheduler.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unsatisfiable_cron_immediate_fires_once() {
        let counter = Arc::new(AtomicU32::new(0));
        let scheduler = Scheduler::new();
        let spec = CronSpec::every_minute().with_days_of_month(&[31]).with_months(&[2]);
        let id = scheduler
            .add(counting_job(&counter), JobConfig::cron(spec).immediately())
            .unwrap();

        tokio::time::sleep(Duration::from_secs(3600)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 1);
        let info = scheduler.get(&id).unwrap();
        assert_eq!(info.runs, 1);
        assert_eq!(info.state, JobState::Dormant);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cron_next_run_uses_clock() {
        let clock = Arc::new(FixedClock::new(
            Utc.with_ymd_and_hms(2024, 1, 1, 9, 0, 30).unwrap(),
        ));
        let scheduler = Scheduler::with_clock(SchedulerConfig::default(), clock);
        let spec = CronSpec::every_minute().with_minutes(&[0]).with_hours(&[9]);
        let id = scheduler.cron(|| async { Ok(()) }, spec).unwrap();

        assert_eq!(
            scheduler.get(&id).unwrap().next_run,
            Some(Utc.with_ymd_and_hms(2024, 1, 2, 9, 0, 0).unwrap())
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_cron_early_wakeup_does_not_refire_same_minute() {
        // The wall clock lags the timer: it still reads 08:59:30 when the
        // 09:00 fire wakes up.
        let clock = Arc::new(FixedClock::new(
            Utc.with_ymd_and_hms(2024, 1, 1, 8, 59, 30).unwrap(),
        ));
        let counter = Arc::new(AtomicU32::new(0));
        let scheduler = Scheduler::with_clock(SchedulerConfig::default(), clock);
        let spec = CronSpec::every_minute().with_minutes(&[0]).with_hours(&[9]);
        let id = scheduler.cron(counting_job(&counter), spec).unwrap();

        tokio::time::sleep(Duration::from_secs(35)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert_eq!(
            scheduler.get(&id).unwrap().next_run,
            Some(Utc.with_ymd_and_hms(2024, 1, 2, 9, 0, 0).unwrap())
        );

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    fn slow_counting_job(counter: &Arc<AtomicU32>) -> impl Fn() -> JobFuture {
        let counter = Arc::clone(counter);
        move || {
            let counter = Arc::clone(&counter);
            Box::pin(async move {
                counter.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(500)).await;
                Ok(())
            }) as JobFuture
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_remove_while_running_does_not_rearm() {
        let counter = Arc::new(AtomicU32::new(0));
        let scheduler = Scheduler::new();
        let id = scheduler
            .every(slow_counting_job(&counter), Duration::from_millis(100))
            .unwrap();

        tokio::time::sleep(Duration::from_millis(150)).await;
        assert_eq!(scheduler.get(&id).unwrap().state, JobState::Running);
        assert!(scheduler.remove(&id));

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert!(scheduler.get(&id).is_none());
        assert_eq!(scheduler.in_flight(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_pause_while_running_does_not_rearm() {
        let counter = Arc::new(AtomicU32::new(0));
        let scheduler = Scheduler::new();
        let id = scheduler
            .every(slow_counting_job(&counter), Duration::from_millis(100))
            .unwrap();

        tokio::time::sleep(Duration::from_millis(150)).await;
        assert!(scheduler.pause(&id));

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 1);
        let info = scheduler.get(&id).unwrap();
        assert_eq!(info.runs, 1);
        assert_eq!(info.state, JobState::Paused);
        assert!(info.next_run.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_resumed_once_past_due_fires_and_is_removed() {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
        let clock = Arc::new(FixedClock::new(start));
        let counter = Arc::new(AtomicU32::new(0));
        let scheduler = Scheduler::with_clock(SchedulerConfig::default(), clock.clone());
        let id = scheduler
            .at(counting_job(&counter), start + chrono::Duration::minutes(1))
            .unwrap();

        assert!(scheduler.pause(&id));
        clock.advance(chrono::Duration::minutes(5));
        tokio::time::sleep(Duration::from_secs(120)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 0);

        assert!(scheduler.resume(&id));
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert!(scheduler.get(&id).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_fixed_rate_catches_up_without_overlap() {
        let counter = Arc::new(AtomicU32::new(0));
        let counter_clone = Arc::clone(&counter);
        let scheduler = Scheduler::new();
        scheduler
            .add(
                move || {
                    let counter = Arc::clone(&counter_clone);
                    async move {
                        counter.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(300)).await;
                        Ok(())
                    }
                },
                JobConfig::every(Duration::from_millis(1000))
                    .with_interval_mode(IntervalMode::FixedRate),
            )
            .unwrap();

        // Fires at 1000, 2000, 3000 regardless of the 300ms body.
        tokio::time::sleep(Duration::from_millis(3100)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fixed_delay_drifts_by_body_duration() {
        let counter = Arc::new(AtomicU32::new(0));
        let counter_clone = Arc::clone(&counter);
        let scheduler = Scheduler::new();
        scheduler
            .every(
                move || {
                    let counter = Arc::clone(&counter_clone);
                    async move {
                        counter.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(300)).await;
                        Ok(())
                    }
                },
                Duration::from_millis(1000),
            )
            .unwrap();

        // Starts at 1000, 2300; the third would be at 3600.
        tokio::time::sleep(Duration::from_millis(3100)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_clear_and_shutdown() {
        let counter = Arc::new(AtomicU32::new(0));
        let scheduler = Scheduler::new();
        for _ in 0..3 {
            scheduler.every(counting_job(&counter), Duration::from_millis(100)).unwrap();
        }
        assert_eq!(scheduler.len(), 3);

        scheduler.shutdown().await;
        assert!(scheduler.is_empty());
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 0);
    }
}
