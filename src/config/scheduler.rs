//! Timer scheduler configuration.

use serde::{Deserialize, Serialize};

use super::pool::{DEFAULT_THREAD_STACK_SIZE, MIN_THREAD_STACK_SIZE};

/// Configuration for a [`TimerScheduler`](crate::core::TimerScheduler).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimerSchedulerConfig {
    /// Name of the coordinator thread.
    pub thread_name: String,
    /// Stack size of the coordinator thread, in bytes. Scheduled tasks run on it.
    pub thread_stack_size: usize,
}

impl Default for TimerSchedulerConfig {
    fn default() -> Self {
        Self {
            thread_name: "pc-timer".into(),
            thread_stack_size: DEFAULT_THREAD_STACK_SIZE,
        }
    }
}

impl TimerSchedulerConfig {
    /// Set the coordinator thread name.
    #[must_use]
    pub fn with_thread_name(mut self, name: impl Into<String>) -> Self {
        self.thread_name = name.into();
        self
    }

    /// Validate scheduler configuration values.
    pub fn validate(&self) -> Result<(), String> {
        if self.thread_name.trim().is_empty() {
            return Err("thread_name must not be empty".into());
        }
        if self.thread_stack_size < MIN_THREAD_STACK_SIZE {
            return Err(format!(
                "thread_stack_size must be at least {MIN_THREAD_STACK_SIZE} bytes"
            ));
        }
        Ok(())
    }
}
