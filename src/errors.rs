use thiserror::Error;

/// Represents all possible errors that can occur in taskclock
#[derive(Debug, Error)]
pub enum TaskclockError {
    /// Error parsing a cron expression
    #[error("Cron parsing error: {0}")]
    CronParse(String),

    /// Error raised by a job or task body
    #[error("Task execution error: {0}")]
    TaskExecution(String),

    /// A task attempt exceeded its timeout
    #[error("Task timeout: {0}")]
    TaskTimeout(String),

    /// Invalid job or task configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Scheduler error
    #[error("Scheduler error: {0}")]
    Scheduler(String),

    /// No task registered under the given id
    #[error("Task not found: {0}")]
    TaskNotFound(String),
}

impl From<String> for TaskclockError {
    fn from(error: String) -> Self {
        TaskclockError::TaskExecution(error)
    }
}

impl From<&str> for TaskclockError {
    fn from(error: &str) -> Self {
        TaskclockError::TaskExecution(error.to_string())
    }
}
