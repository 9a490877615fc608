//! Configuration models for the worker pool, timer scheduler, and queues.
//!
//! Configuration can come from JSON or from `PROMETHEUS_*` environment
//! variables (a `.env` file in the working directory is honored). Every
//! struct validates itself; loaders validate before returning.

pub mod pool;
pub mod scheduler;

use std::str::FromStr;

use serde::{Deserialize, Serialize};

pub use pool::{QueueConfig, WorkerPoolConfig};
pub use scheduler::TimerSchedulerConfig;

/// Environment variable overriding `worker_pool.worker_count`.
pub const ENV_WORKER_COUNT: &str = "PROMETHEUS_WORKER_COUNT";
/// Environment variable overriding `worker_pool.thread_stack_size`.
pub const ENV_WORKER_STACK_SIZE: &str = "PROMETHEUS_WORKER_STACK_SIZE";
/// Environment variable overriding `worker_pool.thread_name_prefix`.
pub const ENV_WORKER_NAME_PREFIX: &str = "PROMETHEUS_WORKER_NAME_PREFIX";
/// Environment variable overriding `scheduler.thread_name`.
pub const ENV_SCHEDULER_THREAD_NAME: &str = "PROMETHEUS_SCHEDULER_THREAD_NAME";
/// Environment variable overriding `queue.capacity`.
pub const ENV_QUEUE_CAPACITY: &str = "PROMETHEUS_QUEUE_CAPACITY";

/// Root configuration covering every primitive.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PrimitivesConfig {
    /// Worker pool settings.
    pub worker_pool: WorkerPoolConfig,
    /// Timer scheduler settings.
    pub scheduler: TimerSchedulerConfig,
    /// Bounded queue settings.
    pub queue: QueueConfig,
}

impl PrimitivesConfig {
    /// Validate every section.
    pub fn validate(&self) -> Result<(), String> {
        self.worker_pool
            .validate()
            .map_err(|e| format!("worker_pool invalid: {e}"))?;
        self.scheduler
            .validate()
            .map_err(|e| format!("scheduler invalid: {e}"))?;
        self.queue
            .validate()
            .map_err(|e| format!("queue invalid: {e}"))?;
        Ok(())
    }

    /// Parse configuration from a JSON string and validate.
    ///
    /// Missing sections and fields take their defaults.
    pub fn from_json_str(input: &str) -> Result<Self, String> {
        let cfg: Self = serde_json::from_str(input).map_err(|e| format!("parse error: {e}"))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Load defaults overridden by `PROMETHEUS_*` variables from the
    /// process environment and `.env`.
    pub fn from_env() -> Result<Self, String> {
        // A missing .env file is the normal case.
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load defaults overridden by whatever `lookup` returns for each
    /// `PROMETHEUS_*` key.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, String>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut cfg = Self::default();

        if let Some(count) = parse_var(&lookup, ENV_WORKER_COUNT)? {
            cfg.worker_pool.worker_count = count;
        }
        if let Some(size) = parse_var(&lookup, ENV_WORKER_STACK_SIZE)? {
            cfg.worker_pool.thread_stack_size = size;
        }
        if let Some(prefix) = lookup(ENV_WORKER_NAME_PREFIX) {
            cfg.worker_pool.thread_name_prefix = prefix;
        }
        if let Some(name) = lookup(ENV_SCHEDULER_THREAD_NAME) {
            cfg.scheduler.thread_name = name;
        }
        if let Some(capacity) = parse_var(&lookup, ENV_QUEUE_CAPACITY)? {
            cfg.queue.capacity = capacity;
        }

        cfg.validate()?;
        Ok(cfg)
    }
}

fn parse_var<F, T>(lookup: &F, key: &str) -> Result<Option<T>, String>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    lookup(key)
        .map(|raw| {
            raw.trim()
                .parse::<T>()
                .map_err(|e| format!("{key}: cannot parse `{raw}`: {e}"))
        })
        .transpose()
}
