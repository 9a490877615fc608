//! Fixed-size worker pool running fire-and-forget tasks on dedicated OS threads.
//!
//! Submissions go into an unbounded FIFO channel, so `submit_task` never
//! blocks. Workers pull from the channel until it is both closed and empty,
//! which is what makes `shutdown` a drain rather than an abort.
//!
//! # Key Features
//!
//! - **Non-blocking submission**: the intake is an unbounded channel
//! - **Graceful drain**: queued work always runs before the pool terminates
//! - **Failure isolation**: a panicking task is logged and counted, the worker lives on
//! - **Async jobs**: with `tokio-runtime`, futures run on a per-worker current-thread runtime
//!
//! # Example
//!
//! ```
//! use prometheus_concurrency::config::WorkerPoolConfig;
//! use prometheus_concurrency::core::WorkerPool;
//! use std::sync::atomic::{AtomicUsize, Ordering};
//! use std::sync::Arc;
//!
//! let pool = WorkerPool::new(WorkerPoolConfig::new().with_worker_count(2)).unwrap();
//! let done = Arc::new(AtomicUsize::new(0));
//!
//! for _ in 0..5 {
//!     let done = Arc::clone(&done);
//!     pool.submit_task(move || {
//!         done.fetch_add(1, Ordering::SeqCst);
//!     })
//!     .unwrap();
//! }
//!
//! pool.shutdown();
//! assert_eq!(done.load(Ordering::SeqCst), 5);
//! ```

mod threads;

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

#[cfg(feature = "tokio-runtime")]
use std::future::Future;
#[cfg(feature = "tokio-runtime")]
use std::pin::Pin;

use serde::{Deserialize, Serialize};

use super::Task;

pub use threads::WorkerPool;

/// Errors that can occur when using a `WorkerPool`.
#[derive(Debug)]
pub enum PoolError {
    /// The pool is draining or terminated and accepts no new tasks.
    PoolClosed,

    /// Configuration validation failed.
    InvalidConfig(String),

    /// Workers were still busy when the shutdown deadline passed.
    ShutdownTimeout,

    /// Internal error (thread spawn failure, all workers gone, etc.).
    Internal(String),
}

impl fmt::Display for PoolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PoolClosed => write!(f, "pool is closed to new tasks"),
            Self::InvalidConfig(msg) => write!(f, "invalid configuration: {msg}"),
            Self::ShutdownTimeout => write!(f, "workers did not finish before the shutdown timeout"),
            Self::Internal(msg) => write!(f, "internal error: {msg}"),
        }
    }
}

impl std::error::Error for PoolError {}

/// Lifecycle of a pool: accepting work, finishing accepted work, gone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PoolState {
    /// Accepting and executing tasks.
    Running,
    /// No new tasks accepted; queued tasks still run.
    Draining,
    /// Every worker has exited.
    Terminated,
}

/// Statistics about pool utilization.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PoolStats {
    /// Number of worker threads the pool was built with.
    pub worker_count: usize,

    /// Worker threads that have not exited yet.
    pub live_workers: usize,

    /// Currently executing tasks.
    pub active_tasks: u64,

    /// Tasks waiting in the queue.
    pub queued_tasks: u64,

    /// Total tasks accepted by `submit_task`/`submit_future`.
    pub submitted_tasks: u64,

    /// Total tasks that ran to completion.
    pub completed_tasks: u64,

    /// Total tasks whose body panicked.
    pub failed_tasks: u64,
}

/// Internal counters for pool statistics (thread-safe).
#[derive(Debug, Default)]
pub(crate) struct PoolCounters {
    pub active_tasks: AtomicU64,
    pub queued_tasks: AtomicU64,
    pub submitted_tasks: AtomicU64,
    pub completed_tasks: AtomicU64,
    pub failed_tasks: AtomicU64,
}

impl PoolCounters {
    /// Get a snapshot of current statistics.
    pub fn snapshot(&self, worker_count: usize, live_workers: usize) -> PoolStats {
        PoolStats {
            worker_count,
            live_workers,
            active_tasks: self.active_tasks.load(Ordering::Relaxed),
            queued_tasks: self.queued_tasks.load(Ordering::Relaxed),
            submitted_tasks: self.submitted_tasks.load(Ordering::Relaxed),
            completed_tasks: self.completed_tasks.load(Ordering::Relaxed),
            failed_tasks: self.failed_tasks.load(Ordering::Relaxed),
        }
    }
}

/// Boxed fire-and-forget future run on a worker's own runtime.
#[cfg(feature = "tokio-runtime")]
pub(crate) type AsyncTask = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

/// A unit of work sitting in the pool's queue.
pub(crate) enum Job {
    /// Plain closure run directly on the worker thread.
    Blocking(Task),
    /// Future driven to completion by the worker's current-thread runtime.
    #[cfg(feature = "tokio-runtime")]
    Async(AsyncTask),
}

/// A job tagged with its submission sequence number, for logging.
#[derive(Debug)]
pub(crate) struct WorkerTask {
    pub id: u64,
    pub job: Job,
}

impl fmt::Debug for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Blocking(_) => f.write_str("Job::Blocking"),
            #[cfg(feature = "tokio-runtime")]
            Self::Async(_) => f.write_str("Job::Async"),
        }
    }
}
