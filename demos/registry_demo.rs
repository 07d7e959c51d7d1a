use std::error::Error;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use log::info;
use taskclock::{
    BackoffKind, InMemoryMetrics, Observability, RetryCfg, Scheduler, SchedulerEvent, TaskDef,
    TaskRegistry, TaskclockError,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    taskclock::init_logging();
    info!("Starting registry demo (taskclock {})", taskclock::VERSION);

    let scheduler = Scheduler::new();

    // Print task outcomes as they happen
    let mut events = scheduler.event_bus().subscribe();
    tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            match event {
                SchedulerEvent::TaskCompleted { task_name, duration_ms, attempts, .. } => {
                    info!("{} completed in {}ms after {} attempt(s)", task_name, duration_ms, attempts)
                }
                SchedulerEvent::TaskFailed { task_name, error, .. } => {
                    info!("{} failed: {}", task_name, error)
                }
                SchedulerEvent::TaskSkipped { task_name, .. } => {
                    info!("{} skipped, previous run still busy", task_name)
                }
                _ => {}
            }
        }
    });

    let metrics = Arc::new(InMemoryMetrics::new());
    let registry = TaskRegistry::new(
        scheduler,
        Observability::default().with_metrics(metrics.clone()),
    );

    // Fails twice, then succeeds on the third attempt
    let attempts = Arc::new(AtomicU32::new(0));
    registry.register(
        TaskDef::every("price-feed", Duration::from_secs(2), move || {
            let attempts = Arc::clone(&attempts);
            async move {
                if attempts.fetch_add(1, Ordering::SeqCst) % 3 < 2 {
                    return Err(TaskclockError::TaskExecution("feed not ready".to_string()));
                }
                Ok(())
            }
        })
        .with_name("Price feed")
        .with_tag("market-data")
        .with_retry(RetryCfg::with_retries(3).backoff(
            BackoffKind::Exponential,
            Duration::from_millis(100),
            Duration::from_secs(1),
        )),
    )?;

    // Slower than its interval, so some fires are skipped
    registry.register(
        TaskDef::every("reconcile", Duration::from_secs(1), || async {
            tokio::time::sleep(Duration::from_millis(2500)).await;
            Ok(())
        })
        .with_name("Reconciliation")
        .with_tag("back-office"),
    )?;

    // Every minute, bounded by a timeout
    registry.register(
        TaskDef::cron("minute-report", "* * * * *".parse()?, || async {
            info!("minute report generated");
            Ok(())
        })
        .with_retry(RetryCfg::none().timeout(Duration::from_secs(5)))
        .immediately(),
    )?;

    for handle in registry.start_all()? {
        info!("Started {} as job {}", handle.task_id, handle.job_id);
    }

    tokio::time::sleep(Duration::from_secs(10)).await;

    for task in registry.list() {
        info!(
            "{:<14} {:<10} runs={} failures={} skips={} next={:?}",
            task.id, task.status, task.runs, task.failures, task.skips, task.next_run
        );
    }
    for (name, value) in metrics.counters() {
        info!("metric {} = {}", name, value);
    }

    registry.cancel_all();
    registry.scheduler().shutdown().await;
    info!("Registry demo finished");

    Ok(())
}
