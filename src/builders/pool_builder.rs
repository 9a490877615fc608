//! Builders to construct primitives from configuration.

use anyhow::Context;
use tracing::debug;

use crate::config::{QueueConfig, TimerSchedulerConfig, WorkerPoolConfig};
use crate::core::{AppResult, BoundedQueue, TimerScheduler, WorkerPool};

/// Build a worker pool; its threads are running when this returns.
pub fn build_worker_pool(cfg: &WorkerPoolConfig) -> AppResult<WorkerPool> {
    let pool = WorkerPool::new(cfg.clone()).with_context(|| {
        format!(
            "failed to build worker pool `{}` with {} workers",
            cfg.thread_name_prefix, cfg.worker_count
        )
    })?;
    debug!(workers = cfg.worker_count, "Worker pool built");
    Ok(pool)
}

/// Build a timer scheduler and start its coordinator.
pub fn build_scheduler(cfg: &TimerSchedulerConfig) -> AppResult<TimerScheduler> {
    let scheduler = TimerScheduler::new(cfg.clone())
        .with_context(|| format!("invalid timer scheduler config `{}`", cfg.thread_name))?;
    scheduler
        .start()
        .with_context(|| format!("failed to start timer coordinator `{}`", cfg.thread_name))?;
    Ok(scheduler)
}

/// Build an empty bounded queue with the configured capacity.
pub fn build_queue<T: Send + 'static>(cfg: &QueueConfig) -> AppResult<BoundedQueue<T>> {
    cfg.validate()
        .map_err(anyhow::Error::msg)
        .context("queue config invalid")?;
    let queue = BoundedQueue::new(cfg.capacity).context("failed to build bounded queue")?;
    Ok(queue)
}
