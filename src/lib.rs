//! # Taskclock: timer-driven jobs and named tasks for Tokio
//!
//! Taskclock runs asynchronous jobs on a schedule inside a Tokio application.
//! Each job owns a single timer that is re-armed only after the previous
//! execution settles, so a job never overlaps with itself and no central tick
//! loop is involved.
//!
//! ## Features
//!
//! - **Three schedule kinds**: fixed interval, one-shot at an instant, and
//!   five-field cron matched at minute resolution
//! - **Fixed-delay or fixed-rate spacing** for interval jobs
//! - **Repeat caps, immediate first runs, pause/resume**
//! - **Task registry** with names, tags, retries, timeouts and
//!   skip-if-running
//! - **Pluggable observability**: logger, metrics and tracer collaborators
//! - **Event Bus**: subscribe to job and task lifecycle events
//!
//! ## Basic Example
//!
//! ```no_run
//! use std::time::Duration;
//! use taskclock::{CronSpec, JobConfig, Scheduler};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let scheduler = Scheduler::new();
//!
//!     // Every 30 seconds, five times, starting right away.
//!     scheduler.add(
//!         || async {
//!             println!("polling quotes");
//!             Ok(())
//!         },
//!         JobConfig::every(Duration::from_secs(30)).with_repeat(5).immediately(),
//!     )?;
//!
//!     // Weekdays at 09:00.
//!     scheduler.cron(
//!         || async {
//!             println!("market open");
//!             Ok(())
//!         },
//!         "0 9 * * MON-FRI".parse::<CronSpec>()?,
//!     )?;
//!
//!     tokio::time::sleep(Duration::from_secs(3600)).await;
//!     scheduler.shutdown().await;
//!     Ok(())
//! }
//! ```
//!
//! ## Task Registry
//!
//! ```no_run
//! use std::time::Duration;
//! use taskclock::{BackoffKind, Observability, RetryCfg, Scheduler, TaskDef, TaskRegistry};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let registry = TaskRegistry::new(Scheduler::new(), Observability::default());
//!
//!     registry.register(
//!         TaskDef::every("risk-snapshot", Duration::from_secs(60), || async {
//!             // Your task logic here
//!             Ok(())
//!         })
//!         .with_name("Risk snapshot")
//!         .with_tags(&["risk", "critical"])
//!         .with_retry(
//!             RetryCfg::with_retries(3)
//!                 .timeout(Duration::from_secs(20))
//!                 .backoff(BackoffKind::Exponential, Duration::from_secs(1), Duration::from_secs(10)),
//!         ),
//!     )?;
//!
//!     registry.start_all()?;
//!
//!     let critical = registry.with_tag("critical");
//!     println!("Found {} critical tasks", critical.len());
//!
//!     tokio::time::sleep(Duration::from_secs(600)).await;
//!     registry.cancel_all();
//!     registry.scheduler().shutdown().await;
//!     Ok(())
//! }
//! ```
//!
//! ## Cron Expression Syntax
//!
//! Five fields: `minute hour day-of-month month day-of-week`, with day-of-week
//! `0..=6` where 0 is Sunday. A minute matches only when all five fields match.
//!
//! - `* * * * *` - Every minute
//! - `0 * * * *` - Every hour at minute 0
//! - `0 12 * * MON-FRI` - Weekdays at noon
//! - `*/15 9-17 * * *` - Every 15 minutes during office hours
//!
//! ## Main Components
//!
//! - [`Scheduler`] - Owns jobs and their timers
//! - [`TaskRegistry`] - Named tasks with retry and observability
//! - [`CronSpec`] - Parsed cron schedule with [`matches_cron`] and [`next_cron`]
//! - [`TaskclockError`] - Error types for the library
//! - [`Result`] - Convenient result type alias

// Re-export the main components
pub use crate::clock::{Clock, FixedClock, SystemClock};
pub use crate::cron::{
    matches_cron, next_cron, next_cron_within, CronField, CronSpec, CRON_SEARCH_HORIZON_MINUTES,
};
pub use crate::errors::TaskclockError;
pub use crate::events::{EventBus, RemovalReason, SchedulerEvent};
pub use crate::job::{
    job_fn, IntervalMode, JobConfig, JobFn, JobFuture, JobInfo, JobState, Schedule,
};
#[cfg(feature = "tracing-integration")]
pub use crate::observe::TracingTracer;
pub use crate::observe::{
    InMemoryMetrics, LogLogger, Logger, Meta, Metrics, NoopMetrics, NoopTracer, Observability,
    Span, Tracer,
};
pub use crate::registry::{TaskDef, TaskHandle, TaskRegistry, TaskState, TaskStatus};
pub use crate::retry::{BackoffKind, RetryCfg};
pub use crate::scheduler::{Scheduler, SchedulerConfig};

// Main modules
pub mod clock;
pub mod cron;
pub mod errors;
pub mod events;
pub mod job;
pub mod observe;
pub mod registry;
pub mod retry;
pub mod scheduler;

/// Convenient result type alias for Taskclock operations.
///
/// This is equivalent to `std::result::Result<T, TaskclockError>`.
///
/// # Examples
///
/// ```
/// use taskclock::Result;
///
/// fn do_something() -> Result<()> {
///     Ok(())
/// }
/// ```
pub type Result<T> = std::result::Result<T, TaskclockError>;

/// The version of the Taskclock library.
///
/// This is extracted from the `Cargo.toml` at compile time.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Installs `env_logger` with an `info` default filter, overridable through
/// `RUST_LOG`. Calling it more than once is harmless.
#[cfg(feature = "basic-logging")]
pub fn init_logging() {
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .try_init();
}

/// Installs a `tracing-subscriber` formatter. Calling it more than once is
/// harmless.
#[cfg(feature = "tracing-integration")]
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt().try_init();
}
