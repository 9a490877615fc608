//! Error types for queue, scheduler, and task execution failures.

use std::any::Any;
use std::fmt;

use thiserror::Error;

/// Reasons a blocking queue operation can end without transferring an item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum QueueError {
    /// The wait was aborted through a [`CancellationToken`](crate::core::CancellationToken).
    #[error("queue operation cancelled")]
    Cancelled,
    /// The wait deadline passed before a slot or item became available.
    #[error("queue operation timed out")]
    TimedOut,
    /// A queue was requested with zero capacity.
    #[error("queue capacity must be greater than 0")]
    ZeroCapacity,
}

/// A failed enqueue, carrying the item that could not be stored.
pub struct EnqueueError<T> {
    reason: QueueError,
    item: T,
}

impl<T> EnqueueError<T> {
    pub(crate) const fn new(reason: QueueError, item: T) -> Self {
        Self { reason, item }
    }

    /// Why the enqueue failed.
    #[must_use]
    pub const fn reason(&self) -> QueueError {
        self.reason
    }

    /// Recover the rejected item.
    pub fn into_inner(self) -> T {
        self.item
    }
}

impl<T> fmt::Debug for EnqueueError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EnqueueError")
            .field("reason", &self.reason)
            .finish_non_exhaustive()
    }
}

impl<T> fmt::Display for EnqueueError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "enqueue failed: {}", self.reason)
    }
}

impl<T> std::error::Error for EnqueueError<T> {}

/// Errors produced by the timer scheduler.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// The scheduler has been shut down and accepts no more work.
    #[error("scheduler is shut down")]
    Closed,
    /// `start` was called on a scheduler whose coordinator is already running.
    #[error("scheduler already started")]
    AlreadyStarted,
    /// A periodic task was scheduled with a zero interval.
    #[error("periodic interval must be greater than 0")]
    InvalidInterval,
    /// Configuration validation failed.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    /// The coordinator thread could not be spawned.
    #[error("failed to spawn coordinator thread: {0}")]
    Spawn(#[from] std::io::Error),
}

/// A task body failed (panicked) while running on a worker or the coordinator.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("task failed: {message}")]
pub struct TaskExecutionError {
    message: String,
}

impl TaskExecutionError {
    #[cfg(feature = "tokio-runtime")]
    pub(crate) fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// Build an error from a payload returned by `catch_unwind`.
    pub(crate) fn from_panic(payload: &(dyn Any + Send)) -> Self {
        let message = payload
            .downcast_ref::<&str>()
            .map(|s| (*s).to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "non-string panic payload".to_string());
        Self { message }
    }

    /// The panic message, or a description of why the task could not run.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Application-facing result using anyhow for higher-level contexts.
pub type AppResult<T> = Result<T, anyhow::Error>;
