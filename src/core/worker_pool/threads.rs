//! `WorkerPool` implementation using dedicated OS threads.
//!
//! # Design Principles
//!
//! - **No polling**: workers block on channel `recv`; shutdown waits on a Condvar
//! - **Drain on close**: dropping the sender lets `recv` return every queued
//!   task before it reports disconnection
//! - **Lock-free counters**: statistics are plain atomics

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle, ThreadId};
use std::time::{Duration, Instant};

#[cfg(feature = "tokio-runtime")]
use std::future::Future;

use crossbeam_channel::{unbounded, Receiver, Sender};
use parking_lot::{Condvar, Mutex};
use tracing::{debug, error, info, warn};

use crate::config::WorkerPoolConfig;
use crate::core::task::run_isolated;
#[cfg(feature = "tokio-runtime")]
use crate::core::TaskExecutionError;

#[cfg(feature = "tokio-runtime")]
use super::AsyncTask;
use super::{Job, PoolCounters, PoolError, PoolState, PoolStats, WorkerTask};

/// Tracks how many worker threads are still alive.
///
/// Workers check out through [`ExitGuard`], so the count also drops for a
/// worker that never got to run.
struct Roster {
    live: Mutex<usize>,
    exited: Condvar,
}

impl Roster {
    fn new() -> Self {
        Self {
            live: Mutex::new(0),
            exited: Condvar::new(),
        }
    }

    fn enlist(&self) {
        *self.live.lock() += 1;
    }

    fn discharge(&self) {
        let mut live = self.live.lock();
        *live = live.saturating_sub(1);
        self.exited.notify_all();
    }

    fn live(&self) -> usize {
        *self.live.lock()
    }

    /// Block until every worker has exited. Returns `false` on timeout.
    fn wait_until_empty(&self, deadline: Option<Instant>) -> bool {
        let mut live = self.live.lock();
        while *live > 0 {
            match deadline {
                Some(deadline) => {
                    if self.exited.wait_until(&mut live, deadline).timed_out() {
                        return *live == 0;
                    }
                }
                None => self.exited.wait(&mut live),
            }
        }
        true
    }
}

struct ExitGuard(Arc<Roster>);

impl Drop for ExitGuard {
    fn drop(&mut self) {
        self.0.discharge();
    }
}

/// Worker pool with dedicated OS threads for fire-and-forget tasks.
///
/// # Design
///
/// - **Unbounded intake**: `submit_task` never blocks the caller
/// - **Graceful drain**: `shutdown` runs everything already accepted
/// - **Failure isolation**: a panicking task never takes its worker down
pub struct WorkerPool {
    /// Pool configuration.
    config: WorkerPoolConfig,

    /// Task sender (to workers). `None` once the pool stops accepting work.
    task_tx: Mutex<Option<Sender<WorkerTask>>>,

    /// Pool statistics counters (lock-free atomics).
    counters: Arc<PoolCounters>,

    /// Live worker count with exit notification.
    roster: Arc<Roster>,

    /// Worker thread handles.
    workers: Mutex<Vec<JoinHandle<()>>>,

    /// Ids of the worker threads, fixed at construction.
    worker_ids: Vec<ThreadId>,

    /// Task ID counter (lock-free atomic).
    task_id_counter: AtomicU64,
}

impl WorkerPool {
    /// Create a new worker pool and start its worker threads immediately.
    ///
    /// # Errors
    ///
    /// - `PoolError::InvalidConfig` if the configuration is invalid
    /// - `PoolError::Internal` if a worker thread could not be spawned; any
    ///   workers already started are stopped first
    pub fn new(config: WorkerPoolConfig) -> Result<Self, PoolError> {
        config.validate().map_err(PoolError::InvalidConfig)?;

        let (task_tx, task_rx) = unbounded::<WorkerTask>();
        let counters = Arc::new(PoolCounters::default());
        let roster = Arc::new(Roster::new());

        let mut workers = Vec::with_capacity(config.worker_count);
        for worker_id in 0..config.worker_count {
            match spawn_worker(
                worker_id,
                &config,
                task_rx.clone(),
                Arc::clone(&counters),
                Arc::clone(&roster),
            ) {
                Ok(worker) => workers.push(worker),
                Err(e) => {
                    error!(worker_id = worker_id, error = %e, "Failed to spawn worker thread");
                    drop(task_tx);
                    for worker in workers {
                        let _ = worker.join();
                    }
                    return Err(PoolError::Internal(format!(
                        "failed to spawn worker {worker_id}: {e}"
                    )));
                }
            }
        }

        info!(
            worker_count = config.worker_count,
            thread_name_prefix = %config.thread_name_prefix,
            "WorkerPool initialized with dedicated OS threads"
        );

        let worker_ids = workers.iter().map(|w| w.thread().id()).collect();

        Ok(Self {
            config,
            task_tx: Mutex::new(Some(task_tx)),
            counters,
            roster,
            workers: Mutex::new(workers),
            worker_ids,
            task_id_counter: AtomicU64::new(0),
        })
    }

    /// Create a pool with `worker_count` workers and default thread settings.
    ///
    /// # Errors
    ///
    /// Same as [`WorkerPool::new`].
    pub fn with_workers(worker_count: usize) -> Result<Self, PoolError> {
        Self::new(WorkerPoolConfig::new().with_worker_count(worker_count))
    }

    /// Submit a task for execution on some worker.
    ///
    /// Never blocks: the queue is unbounded. There is no result channel; a
    /// panic inside `task` is logged and counted in [`PoolStats::failed_tasks`].
    ///
    /// # Errors
    ///
    /// - `PoolError::PoolClosed` once `shutdown` has been initiated
    /// - `PoolError::Internal` if every worker has exited unexpectedly
    pub fn submit_task<F>(&self, task: F) -> Result<(), PoolError>
    where
        F: FnOnce() + Send + 'static,
    {
        self.enqueue(Job::Blocking(Box::new(task)))
    }

    /// Submit a future to be driven on a worker's own current-thread runtime.
    ///
    /// The worker builds its runtime on first use, so timers and other tokio
    /// resources are available inside `future`.
    ///
    /// # Errors
    ///
    /// Same as [`WorkerPool::submit_task`].
    #[cfg(feature = "tokio-runtime")]
    pub fn submit_future<Fut>(&self, future: Fut) -> Result<(), PoolError>
    where
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.enqueue(Job::Async(Box::pin(future)))
    }

    fn enqueue(&self, job: Job) -> Result<(), PoolError> {
        let task_tx = self.task_tx.lock();
        let Some(sender) = task_tx.as_ref() else {
            return Err(PoolError::PoolClosed);
        };

        let task_id = self.task_id_counter.fetch_add(1, Ordering::Relaxed);
        // Count before sending so a fast worker never sees the queue go negative.
        self.counters.queued_tasks.fetch_add(1, Ordering::Relaxed);

        if sender.send(WorkerTask { id: task_id, job }).is_err() {
            self.counters.queued_tasks.fetch_sub(1, Ordering::Relaxed);
            error!(task_id = task_id, "All worker threads have exited");
            return Err(PoolError::Internal("all worker threads have exited".into()));
        }

        self.counters.submitted_tasks.fetch_add(1, Ordering::Relaxed);
        debug!(task_id = task_id, "Task submitted to worker pool");
        Ok(())
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> PoolState {
        if self.task_tx.lock().is_some() {
            PoolState::Running
        } else if self.roster.live() > 0 {
            PoolState::Draining
        } else {
            PoolState::Terminated
        }
    }

    /// Number of workers the pool was created with.
    #[must_use]
    pub const fn worker_count(&self) -> usize {
        self.config.worker_count
    }

    /// Get current pool statistics.
    #[must_use]
    pub fn stats(&self) -> PoolStats {
        self.counters
            .snapshot(self.config.worker_count, self.roster.live())
    }

    /// Stop accepting tasks, run every queued task, then join all workers.
    ///
    /// When this returns the pool is `Terminated`, except when called from a
    /// task running on this pool. A task only closes the intake and returns
    /// at once; queued tasks still drain, and a later call from outside the
    /// pool (or `Drop`) finishes the job.
    pub fn shutdown(&self) {
        let _ = self.shutdown_until(None);
    }

    /// Like [`shutdown`](Self::shutdown), but stop waiting after `timeout`.
    ///
    /// # Errors
    ///
    /// Returns `PoolError::ShutdownTimeout` if workers were still running at
    /// the deadline. They keep draining in the background and a later
    /// `shutdown` call can join them.
    pub fn shutdown_timeout(&self, timeout: Duration) -> Result<(), PoolError> {
        self.shutdown_until(Instant::now().checked_add(timeout))
    }

    fn close_intake(&self) {
        let mut task_tx = self.task_tx.lock();
        if task_tx.take().is_some() {
            info!(
                queued_tasks = self.counters.queued_tasks.load(Ordering::Relaxed),
                "Shutting down worker pool, draining queued tasks"
            );
        }
    }

    fn shutdown_until(&self, deadline: Option<Instant>) -> Result<(), PoolError> {
        self.close_intake();

        if self.worker_ids.contains(&thread::current().id()) {
            // A worker waiting here would wait on itself or on a peer stuck
            // in this same call.
            debug!("Shutdown called from a pool task, returning without waiting");
            return Ok(());
        }

        // Held for the whole join so concurrent callers return only once done.
        let mut workers = self.workers.lock();
        self.await_drain(deadline)?;

        let worker_count = workers.len();
        for (idx, worker) in workers.drain(..).enumerate() {
            if worker.join().is_ok() {
                debug!(worker_id = idx, "Worker joined successfully");
            } else {
                warn!(worker_id = idx, "Worker panicked");
            }
        }

        if worker_count > 0 {
            info!(worker_count = worker_count, "Worker pool shut down complete");
        }
        Ok(())
    }

    fn await_drain(&self, deadline: Option<Instant>) -> Result<(), PoolError> {
        if self.roster.wait_until_empty(deadline) {
            return Ok(());
        }
        warn!(
            live_workers = self.roster.live(),
            "Worker pool did not drain before the shutdown timeout"
        );
        Err(PoolError::ShutdownTimeout)
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        // Close the intake but DON'T join: queued work keeps draining in the
        // background. Explicit shutdown() is required to wait for it.
        if self.task_tx.get_mut().take().is_some() {
            debug!("WorkerPool dropped without explicit shutdown - workers will drain and detach");
        }
    }
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("config", &self.config)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

/// Spawn a worker thread.
fn spawn_worker(
    worker_id: usize,
    config: &WorkerPoolConfig,
    task_rx: Receiver<WorkerTask>,
    counters: Arc<PoolCounters>,
    roster: Arc<Roster>,
) -> std::io::Result<JoinHandle<()>> {
    roster.enlist();
    // Dropped with the closure if the spawn itself fails.
    let guard = ExitGuard(roster);

    thread::Builder::new()
        .name(format!("{}-{worker_id}", config.thread_name_prefix))
        .stack_size(config.thread_stack_size)
        .spawn(move || {
            let _guard = guard;
            run_worker(worker_id, &task_rx, &counters);
        })
}

/// Worker loop: take the next task, run it, repeat until closed and drained.
fn run_worker(worker_id: usize, task_rx: &Receiver<WorkerTask>, counters: &PoolCounters) {
    debug!(worker_id = worker_id, "Worker thread started");

    #[cfg(feature = "tokio-runtime")]
    let mut runtime: Option<tokio::runtime::Runtime> = None;

    // recv() keeps yielding queued tasks after the sender is dropped and
    // only errors once the channel is empty.
    while let Ok(task) = task_rx.recv() {
        counters.queued_tasks.fetch_sub(1, Ordering::Relaxed);
        counters.active_tasks.fetch_add(1, Ordering::Relaxed);
        debug!(worker_id = worker_id, task_id = task.id, job = ?task.job, "Worker executing task");

        let outcome = match task.job {
            Job::Blocking(body) => run_isolated(body),
            #[cfg(feature = "tokio-runtime")]
            Job::Async(future) => run_async(&mut runtime, future),
        };

        counters.active_tasks.fetch_sub(1, Ordering::Relaxed);
        match outcome {
            Ok(()) => {
                counters.completed_tasks.fetch_add(1, Ordering::Relaxed);
                debug!(worker_id = worker_id, task_id = task.id, "Worker completed task");
            }
            Err(e) => {
                counters.failed_tasks.fetch_add(1, Ordering::Relaxed);
                error!(
                    worker_id = worker_id,
                    task_id = task.id,
                    error = %e,
                    "Task execution failed, worker continues"
                );
            }
        }
    }

    debug!(worker_id = worker_id, "Worker channel closed and drained, exiting");
}

/// Drive `future` on this worker's runtime, building it on first use.
///
/// A runtime that saw a panic is discarded and rebuilt for the next job.
#[cfg(feature = "tokio-runtime")]
fn run_async(
    runtime: &mut Option<tokio::runtime::Runtime>,
    future: AsyncTask,
) -> Result<(), TaskExecutionError> {
    let rt = match runtime.take() {
        Some(rt) => rt,
        None => tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| TaskExecutionError::new(format!("worker runtime unavailable: {e}")))?,
    };

    let outcome = run_isolated(|| rt.block_on(future));
    if outcome.is_ok() {
        *runtime = Some(rt);
    }
    outcome
}
