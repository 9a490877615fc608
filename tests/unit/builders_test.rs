//! Tests for builder modules

use prometheus_concurrency::builders::{build_queue, build_scheduler, build_worker_pool};
use prometheus_concurrency::config::{QueueConfig, TimerSchedulerConfig, WorkerPoolConfig};
use prometheus_concurrency::core::{PoolState, QueueError, SchedulerError};

#[test]
fn test_build_worker_pool() {
    let pool = build_worker_pool(&WorkerPoolConfig::new().with_worker_count(2)).unwrap();
    assert_eq!(pool.worker_count(), 2);
    assert_eq!(pool.state(), PoolState::Running);
    pool.shutdown();
}

#[test]
fn test_build_worker_pool_rejects_invalid_config() {
    let err = build_worker_pool(&WorkerPoolConfig::new().with_worker_count(0)).unwrap_err();
    let message = format!("{err:#}");
    assert!(message.contains("failed to build worker pool"), "{message}");
    assert!(message.contains("worker_count must be greater than 0"), "{message}");
}

#[test]
fn test_build_scheduler_is_started() {
    let scheduler = build_scheduler(&TimerSchedulerConfig::default()).unwrap();
    assert!(scheduler.is_running());
    scheduler.shutdown();
}

#[test]
fn test_build_scheduler_rejects_invalid_config() {
    let err = build_scheduler(&TimerSchedulerConfig::default().with_thread_name("")).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<SchedulerError>(),
        Some(SchedulerError::InvalidConfig(_))
    ));
}

#[test]
fn test_build_queue() {
    let queue = build_queue::<String>(&QueueConfig { capacity: 3 }).unwrap();
    assert_eq!(queue.capacity(), 3);
    assert!(queue.is_empty());
}

#[test]
fn test_build_queue_rejects_zero_capacity() {
    let err = build_queue::<u8>(&QueueConfig { capacity: 0 }).unwrap_err();
    assert!(format!("{err:#}").contains("capacity must be greater than 0"));
    // Validation fails before the queue constructor is reached.
    assert!(err.downcast_ref::<QueueError>().is_none());
}
