//! Event system for job and task lifecycle notifications.
//!
//! The scheduler publishes job-level events, the task registry publishes
//! task-level events on the same bus.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::broadcast;

/// Why a job left the scheduler's job table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemovalReason {
    /// `remove` was called.
    Explicit,
    /// The `repeat` cap was reached, or a one-shot job fired.
    Exhausted,
    /// Replaced by a job added under the same id.
    Replaced,
    /// `clear` or `shutdown`.
    Cleared,
}

/// Represents the events published by the scheduler and the task registry.
#[derive(Debug, Clone)]
pub enum SchedulerEvent {
    /// A job was added to the scheduler
    JobAdded {
        job_id: String,
        timestamp: DateTime<Utc>,
    },

    /// A job was removed from the scheduler
    JobRemoved {
        job_id: String,
        reason: RemovalReason,
        timestamp: DateTime<Utc>,
    },

    /// A job is about to execute
    JobStarting {
        job_id: String,
        timestamp: DateTime<Utc>,
    },

    /// A job body returned `Ok`
    JobCompleted {
        job_id: String,
        timestamp: DateTime<Utc>,
        duration_ms: u64,
    },

    /// A job body returned an error or panicked
    JobFailed {
        job_id: String,
        timestamp: DateTime<Utc>,
        error: String,
    },

    /// A job was paused
    JobPaused {
        job_id: String,
        timestamp: DateTime<Utc>,
    },

    /// A job was resumed
    JobResumed {
        job_id: String,
        timestamp: DateTime<Utc>,
    },

    /// A job has no future fire time and will not run again
    JobDormant {
        job_id: String,
        timestamp: DateTime<Utc>,
    },

    /// A task body is starting
    TaskStarting {
        task_id: String,
        task_name: String,
        timestamp: DateTime<Utc>,
    },

    /// A task body completed successfully
    TaskCompleted {
        task_id: String,
        task_name: String,
        timestamp: DateTime<Utc>,
        duration_ms: u64,
        attempts: u32,
    },

    /// A task body failed after exhausting its retries
    TaskFailed {
        task_id: String,
        task_name: String,
        timestamp: DateTime<Utc>,
        error: String,
        attempts: u32,
    },

    /// A failed attempt will be retried after `delay_ms`
    TaskRetrying {
        task_id: String,
        task_name: String,
        timestamp: DateTime<Utc>,
        attempt: u32,
        delay_ms: u64,
    },

    /// A task attempt exceeded its timeout
    TaskTimedOut {
        task_id: String,
        task_name: String,
        timestamp: DateTime<Utc>,
        timeout_duration_ms: u64,
    },

    /// A fire was suppressed because the previous body was still running
    TaskSkipped {
        task_id: String,
        task_name: String,
        timestamp: DateTime<Utc>,
    },

    /// A task was cancelled
    TaskCancelled {
        task_id: String,
        task_name: String,
        timestamp: DateTime<Utc>,
    },
}

/// Event bus for broadcasting scheduler and task events.
///
/// # Examples
///
/// ```
/// use taskclock::events::{EventBus, SchedulerEvent};
///
/// #[tokio::main]
/// async fn main() {
///     let event_bus = EventBus::new();
///
///     let mut receiver = event_bus.subscribe();
///
///     tokio::spawn(async move {
///         while let Ok(event) = receiver.recv().await {
///             println!("Received event: {:?}", event);
///         }
///     });
/// }
/// ```
#[derive(Clone)]
pub struct EventBus {
    sender: Arc<broadcast::Sender<SchedulerEvent>>,
}

impl EventBus {
    /// Creates a new event bus with a default capacity of 1000 events.
    pub fn new() -> Self {
        Self::with_capacity(1000)
    }

    /// Creates a new event bus with a specified capacity.
    ///
    /// The capacity determines how many events can be buffered before
    /// old events are dropped if receivers are slow.
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        EventBus {
            sender: Arc::new(sender),
        }
    }

    /// Publishes an event to all subscribers.
    pub fn publish(&self, event: SchedulerEvent) {
        // No subscribers is fine
        let _ = self.sender.send(event);
    }

    /// Subscribes to events from this event bus.
    pub fn subscribe(&self) -> broadcast::Receiver<SchedulerEvent> {
        self.sender.subscribe()
    }

    /// Returns the number of active subscribers.
    ///
    /// # Examples
    ///
    /// ```
    /// use taskclock::events::EventBus;
    ///
    /// let event_bus = EventBus::new();
    /// assert_eq!(event_bus.subscriber_count(), 0);
    ///
    /// let _receiver = event_bus.subscribe();
    /// assert_eq!(event_bus.subscriber_count(), 1);
    /// ```
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
