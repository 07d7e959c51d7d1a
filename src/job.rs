//! Job records and schedule configuration.
//!
//! This module provides [`JobConfig`], the schedule description handed to
//! [`Scheduler::add`](crate::Scheduler::add), and [`JobInfo`], the read-only
//! snapshot the scheduler hands back from `list`/`get`.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::task::JoinError;

use crate::cron::CronSpec;
use crate::errors::TaskclockError;
use crate::Result;

/// Boxed future produced by a job function.
pub type JobFuture = Pin<Box<dyn Future<Output = Result<()>> + Send>>;

/// Shared, callable job body.
///
/// Jobs are invoked once per fire; each call returns a fresh future.
pub type JobFn = Arc<dyn Fn() -> JobFuture + Send + Sync>;

/// Adapts an async closure into a [`JobFn`].
///
/// # Examples
///
/// ```
/// use taskclock::job_fn;
///
/// let job = job_fn(|| async {
///     println!("refreshing curves");
///     Ok(())
/// });
/// ```
pub fn job_fn<F, Fut>(func: F) -> JobFn
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    Arc::new(move || Box::pin(func()) as JobFuture)
}

/// Runs one invocation on its own tokio task so a panic in the body surfaces
/// as an error instead of unwinding through the scheduler.
pub(crate) async fn run_isolated(fut: JobFuture) -> Result<()> {
    join_result(tokio::spawn(fut).await)
}

/// Flattens the outcome of a spawned job body.
pub(crate) fn join_result(joined: std::result::Result<Result<()>, JoinError>) -> Result<()> {
    match joined {
        Ok(result) => result,
        Err(e) if e.is_panic() => Err(TaskclockError::TaskExecution(format!(
            "job panicked: {}",
            panic_message(e.into_panic())
        ))),
        Err(e) => Err(TaskclockError::TaskExecution(format!("job aborted: {}", e))),
    }
}

fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// When a job fires.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Schedule {
    /// Fire once at an absolute instant.
    Once(DateTime<Utc>),
    /// Fire repeatedly with the given spacing.
    Every(Duration),
    /// Fire at every minute matching the spec.
    Cron(CronSpec),
}

impl fmt::Display for Schedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Schedule::Once(at) => write!(f, "once at {}", at.to_rfc3339()),
            Schedule::Every(interval) => write!(f, "every {:?}", interval),
            Schedule::Cron(spec) => write!(f, "cron '{}'", spec),
        }
    }
}

/// How an [`Schedule::Every`] job measures its spacing.
///
/// Either way a job never runs concurrently with itself; the modes differ in
/// how a slow body shifts later fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IntervalMode {
    /// Wait the full interval after the previous execution completes.
    /// A slow body pushes every later fire back by its duration.
    #[default]
    FixedDelay,
    /// Fire every interval measured from the previous scheduled fire.
    /// If the body overran, the next fire happens as soon as it completes.
    FixedRate,
}

/// Schedule specification for a single job.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use taskclock::JobConfig;
///
/// let config = JobConfig::every(Duration::from_secs(30))
///     .with_id("mark-to-market")
///     .with_repeat(10)
///     .immediately();
/// assert_eq!(config.repeat, Some(10));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobConfig {
    /// Caller-chosen id; a UUID is generated when `None`.
    pub id: Option<String>,
    pub schedule: Schedule,
    /// Maximum number of executions; unbounded when `None`.
    pub repeat: Option<u64>,
    /// Run once right away in addition to the schedule.
    pub immediate: bool,
    /// Overrides the scheduler-wide [`IntervalMode`] for `Every` jobs.
    pub interval_mode: Option<IntervalMode>,
}

impl JobConfig {
    pub fn new(schedule: Schedule) -> Self {
        JobConfig {
            id: None,
            schedule,
            repeat: None,
            immediate: false,
            interval_mode: None,
        }
    }

    pub fn every(interval: Duration) -> Self {
        Self::new(Schedule::Every(interval))
    }

    pub fn once(at: DateTime<Utc>) -> Self {
        Self::new(Schedule::Once(at))
    }

    pub fn cron(spec: CronSpec) -> Self {
        Self::new(Schedule::Cron(spec))
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
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

    pub fn with_interval_mode(mut self, mode: IntervalMode) -> Self {
        self.interval_mode = Some(mode);
        self
    }

    /// Rejects configurations that could never be armed sensibly.
    pub fn validate(&self) -> Result<()> {
        match &self.schedule {
            Schedule::Every(interval) if interval.is_zero() => Err(TaskclockError::Config(
                "interval must be greater than zero".to_string(),
            )),
            Schedule::Cron(spec) => spec.validate(),
            _ => Ok(()),
        }?;
        if self.repeat == Some(0) {
            return Err(TaskclockError::Config(
                "repeat must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Where a job is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    /// A timer is armed.
    Scheduled,
    /// The body is executing.
    Running,
    /// Paused; no timer is armed.
    Paused,
    /// No future fire exists (cron spec with no match in the horizon).
    Dormant,
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobState::Scheduled => write!(f, "scheduled"),
            JobState::Running => write!(f, "running"),
            JobState::Paused => write!(f, "paused"),
            JobState::Dormant => write!(f, "dormant"),
        }
    }
}

/// Snapshot of a job as seen by [`Scheduler::list`](crate::Scheduler::list).
#[derive(Debug, Clone)]
pub struct JobInfo {
    pub id: String,
    pub config: JobConfig,
    /// Completed executions, successful or not.
    pub runs: u64,
    /// Start time of the most recent execution.
    pub last_run: Option<DateTime<Utc>>,
    /// When the armed timer is due; `None` when paused, running or dormant.
    pub next_run: Option<DateTime<Utc>>,
    /// `false` while paused.
    pub active: bool,
    pub state: JobState,
}
