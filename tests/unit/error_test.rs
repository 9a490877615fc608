//! Tests for error types

use prometheus_concurrency::core::{PoolError, QueueError, SchedulerError};

#[test]
fn test_queue_error_messages() {
    assert_eq!(QueueError::Cancelled.to_string(), "queue operation cancelled");
    assert_eq!(QueueError::TimedOut.to_string(), "queue operation timed out");
    assert_eq!(
        QueueError::ZeroCapacity.to_string(),
        "queue capacity must be greater than 0"
    );
}

#[test]
fn test_scheduler_error_messages() {
    assert_eq!(SchedulerError::Closed.to_string(), "scheduler is shut down");
    assert_eq!(SchedulerError::AlreadyStarted.to_string(), "scheduler already started");
    assert_eq!(
        SchedulerError::InvalidInterval.to_string(),
        "periodic interval must be greater than 0"
    );
    assert_eq!(
        SchedulerError::InvalidConfig("thread_name must not be empty".into()).to_string(),
        "invalid configuration: thread_name must not be empty"
    );
}

#[test]
fn test_scheduler_error_from_io() {
    let io = std::io::Error::new(std::io::ErrorKind::OutOfMemory, "no threads left");
    let err: SchedulerError = io.into();
    assert!(matches!(err, SchedulerError::Spawn(_)));
    assert!(err.to_string().contains("no threads left"));
}

#[test]
fn test_pool_error_internal() {
    let err = PoolError::Internal("all worker threads have exited".into());
    assert_eq!(err.to_string(), "internal error: all worker threads have exited");
}

#[test]
fn test_errors_convert_to_anyhow() {
    let err: anyhow::Error = PoolError::PoolClosed.into();
    assert_eq!(err.to_string(), "pool is closed to new tasks");

    let err: anyhow::Error = QueueError::Cancelled.into();
    assert!(err.downcast_ref::<QueueError>().is_some());
}
