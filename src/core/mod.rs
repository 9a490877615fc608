//! Blocking queue, worker pool, and timer scheduler primitives.

pub mod bounded_queue;
pub mod cancel;
pub mod error;
pub mod task;
pub mod timer_scheduler;
pub mod worker_pool;

pub use bounded_queue::BoundedQueue;
pub use cancel::CancellationToken;
pub use error::{AppResult, EnqueueError, QueueError, SchedulerError, TaskExecutionError};
pub use task::Task;
pub use timer_scheduler::{TaskHandle, TimerScheduler};
pub use worker_pool::{PoolError, PoolState, PoolStats, WorkerPool};
