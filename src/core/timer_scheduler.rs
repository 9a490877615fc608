//! Single-coordinator timer for delayed and periodic tasks.
//!
//! One dedicated thread owns the timeline. It sleeps until the earliest due
//! time (or until a new earlier task arrives), runs the task with the lock
//! released, and re-arms periodic tasks at `finish + interval`. That rate
//! drifts by each run's duration; it does not catch up on missed ticks.
//!
//! Cancellation is lazy: a cancelled task stays in the timeline and is
//! discarded when it reaches the head.
//!
//! # Example
//!
//! ```
//! use prometheus_concurrency::core::TimerScheduler;
//! use std::sync::atomic::{AtomicUsize, Ordering};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! let scheduler = TimerScheduler::default();
//! scheduler.start().unwrap();
//!
//! let fired = Arc::new(AtomicUsize::new(0));
//! let counter = Arc::clone(&fired);
//! scheduler
//!     .schedule_once(move || { counter.fetch_add(1, Ordering::SeqCst); }, Duration::from_millis(10))
//!     .unwrap();
//!
//! std::thread::sleep(Duration::from_millis(100));
//! scheduler.shutdown();
//! assert_eq!(fired.load(Ordering::SeqCst), 1);
//! ```

mod timeline;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex, MutexGuard};
use tracing::{debug, error, info, warn};

use crate::config::TimerSchedulerConfig;
use crate::core::SchedulerError;

use timeline::{ScheduledTask, TaskBody, Timeline};

pub use timeline::TaskHandle;

/// Delays too large to represent as an `Instant` are clamped to this.
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Lifecycle {
    Idle,
    Running,
    Stopped,
}

struct Schedule {
    timeline: Timeline,
    lifecycle: Lifecycle,
}

struct Shared {
    schedule: Mutex<Schedule>,
    wakeup: Condvar,
}

/// Runs tasks after a delay, once or at a fixed rate, on one coordinator thread.
///
/// Tasks may be scheduled before [`start`](Self::start); they wait in the
/// timeline until the coordinator runs.
pub struct TimerScheduler {
    config: TimerSchedulerConfig,
    shared: Arc<Shared>,
    coordinator: Mutex<Option<JoinHandle<()>>>,
    task_id_counter: AtomicU64,
}

impl TimerScheduler {
    /// Create an idle scheduler. Call [`start`](Self::start) to begin running tasks.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::InvalidConfig`] if the config fails validation.
    pub fn new(config: TimerSchedulerConfig) -> Result<Self, SchedulerError> {
        config.validate().map_err(SchedulerError::InvalidConfig)?;
        Ok(Self::idle(config))
    }

    fn idle(config: TimerSchedulerConfig) -> Self {
        Self {
            config,
            shared: Arc::new(Shared {
                schedule: Mutex::new(Schedule {
                    timeline: Timeline::default(),
                    lifecycle: Lifecycle::Idle,
                }),
                wakeup: Condvar::new(),
            }),
            coordinator: Mutex::new(None),
            task_id_counter: AtomicU64::new(0),
        }
    }

    /// Spawn the coordinator thread.
    ///
    /// # Errors
    ///
    /// [`SchedulerError::AlreadyStarted`] on a second call,
    /// [`SchedulerError::Closed`] after shutdown, and
    /// [`SchedulerError::Spawn`] if the OS refuses the thread.
    pub fn start(&self) -> Result<(), SchedulerError> {
        let mut coordinator = self.coordinator.lock();
        {
            let mut schedule = self.shared.schedule.lock();
            match schedule.lifecycle {
                Lifecycle::Running => return Err(SchedulerError::AlreadyStarted),
                Lifecycle::Stopped => return Err(SchedulerError::Closed),
                Lifecycle::Idle => schedule.lifecycle = Lifecycle::Running,
            }
        }

        let shared = Arc::clone(&self.shared);
        let spawned = thread::Builder::new()
            .name(self.config.thread_name.clone())
            .stack_size(self.config.thread_stack_size)
            .spawn(move || run_coordinator(&shared));

        match spawned {
            Ok(handle) => {
                *coordinator = Some(handle);
                info!(thread = %self.config.thread_name, "Timer scheduler started");
                Ok(())
            }
            Err(e) => {
                let mut schedule = self.shared.schedule.lock();
                if schedule.lifecycle == Lifecycle::Running {
                    schedule.lifecycle = Lifecycle::Idle;
                }
                Err(SchedulerError::Spawn(e))
            }
        }
    }

    /// Run `task` once, no earlier than `delay` from now.
    ///
    /// The body may consume what it captures.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::Closed`] after shutdown.
    pub fn schedule_once<F>(&self, task: F, delay: Duration) -> Result<TaskHandle, SchedulerError>
    where
        F: FnOnce() + Send + 'static,
    {
        self.insert(TaskBody::once(task), delay, Duration::ZERO)
    }

    /// Run `task` after `initial_delay`, then again `interval` after each run finishes.
    ///
    /// # Errors
    ///
    /// [`SchedulerError::InvalidInterval`] for a zero interval,
    /// [`SchedulerError::Closed`] after shutdown.
    pub fn schedule_at_fixed_rate<F>(
        &self,
        task: F,
        initial_delay: Duration,
        interval: Duration,
    ) -> Result<TaskHandle, SchedulerError>
    where
        F: Fn() + Send + Sync + 'static,
    {
        if interval.is_zero() {
            return Err(SchedulerError::InvalidInterval);
        }
        self.insert(TaskBody::repeating(task), initial_delay, interval)
    }

    /// Cancel a scheduled task. Same as [`TaskHandle::cancel`].
    pub fn cancel(&self, handle: &TaskHandle) {
        handle.cancel();
        debug!(task_id = handle.id(), "Task cancelled");
    }

    /// Stop the coordinator and discard every pending task.
    ///
    /// A task already running finishes first. Safe to call more than once.
    /// Called from inside a scheduled task, it returns without waiting for
    /// the coordinator, which exits once that task returns.
    pub fn shutdown(&self) {
        {
            let mut schedule = self.shared.schedule.lock();
            if schedule.lifecycle != Lifecycle::Stopped {
                schedule.lifecycle = Lifecycle::Stopped;
                let discarded = schedule.timeline.clear();
                info!(discarded_tasks = discarded, "Shutting down timer scheduler");
            }
            self.shared.wakeup.notify_all();
        }

        let handle = self.coordinator.lock().take();
        if let Some(handle) = handle {
            if handle.thread().id() == thread::current().id() {
                debug!("Shutdown requested from a scheduled task");
            } else if handle.join().is_err() {
                warn!("Timer coordinator thread panicked");
            }
        }
    }

    /// Entries still in the timeline, including cancelled ones not yet discarded.
    #[must_use]
    pub fn pending_tasks(&self) -> usize {
        self.shared.schedule.lock().timeline.len()
    }

    /// Whether the coordinator has been started and not shut down.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.shared.schedule.lock().lifecycle == Lifecycle::Running
    }

    fn insert(
        &self,
        body: TaskBody,
        delay: Duration,
        interval: Duration,
    ) -> Result<TaskHandle, SchedulerError> {
        let id = self.task_id_counter.fetch_add(1, Ordering::Relaxed);
        let task = Arc::new(ScheduledTask::new(id, body, interval));

        let mut schedule = self.shared.schedule.lock();
        if schedule.lifecycle == Lifecycle::Stopped {
            return Err(SchedulerError::Closed);
        }

        let due = due_after(delay);
        if schedule.timeline.push(due, Arc::clone(&task)) {
            self.shared.wakeup.notify_one();
        }
        drop(schedule);

        debug!(
            task_id = id,
            delay_ms = delay.as_millis(),
            interval_ms = interval.as_millis(),
            "Task scheduled"
        );
        Ok(TaskHandle::new(task))
    }
}

impl Default for TimerScheduler {
    fn default() -> Self {
        Self::idle(TimerSchedulerConfig::default())
    }
}

impl std::fmt::Debug for TimerScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let schedule = self.shared.schedule.lock();
        f.debug_struct("TimerScheduler")
            .field("thread_name", &self.config.thread_name)
            .field("lifecycle", &schedule.lifecycle)
            .field("pending", &schedule.timeline.len())
            .finish()
    }
}

impl Drop for TimerScheduler {
    fn drop(&mut self) {
        // Signal only; the coordinator holds its own reference to the shared state.
        let mut schedule = self.shared.schedule.lock();
        if schedule.lifecycle != Lifecycle::Stopped {
            schedule.lifecycle = Lifecycle::Stopped;
            schedule.timeline.clear();
            self.shared.wakeup.notify_all();
            debug!("Timer scheduler dropped without shutdown");
        }
    }
}

fn due_after(delay: Duration) -> Instant {
    let now = Instant::now();
    now.checked_add(delay).unwrap_or(now + FAR_FUTURE)
}

fn run_coordinator(shared: &Shared) {
    info!("Timer coordinator started");
    let mut schedule = shared.schedule.lock();

    loop {
        if schedule.lifecycle == Lifecycle::Stopped {
            break;
        }

        let Some(due) = schedule.timeline.next_due() else {
            shared.wakeup.wait(&mut schedule);
            continue;
        };

        if due > Instant::now() {
            // Woken early by an earlier insertion or by shutdown; re-evaluate either way.
            let _ = shared.wakeup.wait_until(&mut schedule, due);
            continue;
        }

        let Some(entry) = schedule.timeline.pop() else {
            continue;
        };
        let task = entry.task;
        if task.is_cancelled() {
            debug!(task_id = task.id(), "Discarding cancelled task");
            continue;
        }

        let outcome = MutexGuard::unlocked(&mut schedule, || task.run());
        if let Err(e) = outcome {
            error!(task_id = task.id(), error = %e, "Scheduled task failed");
        }

        if task.is_periodic() && !task.is_cancelled() && schedule.lifecycle != Lifecycle::Stopped {
            let next = due_after(task.interval());
            schedule.timeline.push(next, task);
        }
    }

    let discarded = schedule.timeline.clear();
    info!(discarded_tasks = discarded, "Timer coordinator stopped");
}
