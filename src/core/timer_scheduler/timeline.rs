//! Scheduled task records and the due-time ordered heap.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::fmt;
use std::sync::atomic::{self, AtomicBool, AtomicU64};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::core::task::run_isolated;
use crate::core::TaskExecutionError;

type OnceBody = Box<dyn FnOnce() + Send + 'static>;
type RepeatingBody = Box<dyn Fn() + Send + Sync + 'static>;

/// Body of a scheduled task.
pub(crate) enum TaskBody {
    /// Taken out on its first run; `None` afterwards.
    Once(Mutex<Option<OnceBody>>),
    Repeating(RepeatingBody),
}

impl TaskBody {
    pub(crate) fn once<F>(body: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Self::Once(Mutex::new(Some(Box::new(body))))
    }

    pub(crate) fn repeating<F>(body: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        Self::Repeating(Box::new(body))
    }
}

/// A task body plus its repeat interval and cancellation flag.
pub(crate) struct ScheduledTask {
    id: u64,
    body: TaskBody,
    /// Zero for one-shot tasks.
    interval: Duration,
    cancelled: AtomicBool,
    runs: AtomicU64,
}

impl ScheduledTask {
    pub(crate) fn new(id: u64, body: TaskBody, interval: Duration) -> Self {
        Self {
            id,
            body,
            interval,
            cancelled: AtomicBool::new(false),
            runs: AtomicU64::new(0),
        }
    }

    pub(crate) const fn id(&self) -> u64 {
        self.id
    }

    pub(crate) const fn interval(&self) -> Duration {
        self.interval
    }

    pub(crate) const fn is_periodic(&self) -> bool {
        !self.interval.is_zero()
    }

    pub(crate) fn is_cancelled(&self) -> bool {
        self.cancelled.load(atomic::Ordering::Acquire)
    }

    pub(crate) fn cancel(&self) {
        self.cancelled.store(true, atomic::Ordering::Release);
    }

    /// Run the body. A one-shot body that already ran is a no-op.
    pub(crate) fn run(&self) -> Result<(), TaskExecutionError> {
        match &self.body {
            TaskBody::Once(slot) => {
                let Some(body) = slot.lock().take() else {
                    return Ok(());
                };
                self.runs.fetch_add(1, atomic::Ordering::Relaxed);
                run_isolated(body)
            }
            TaskBody::Repeating(body) => {
                self.runs.fetch_add(1, atomic::Ordering::Relaxed);
                run_isolated(|| body())
            }
        }
    }
}

/// Handle to a scheduled task, returned by the schedule calls.
///
/// Clones refer to the same task; equality is identity of that task.
#[derive(Clone)]
pub struct TaskHandle {
    task: Arc<ScheduledTask>,
}

impl TaskHandle {
    pub(crate) const fn new(task: Arc<ScheduledTask>) -> Self {
        Self { task }
    }

    /// Scheduler-assigned task number, unique per scheduler.
    #[must_use]
    pub fn id(&self) -> u64 {
        self.task.id()
    }

    /// Prevent any future run. Idempotent, and harmless after the task ran.
    pub fn cancel(&self) {
        self.task.cancel();
    }

    /// Whether [`cancel`](Self::cancel) has been called.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.task.is_cancelled()
    }

    /// Whether this task re-arms itself after each run.
    #[must_use]
    pub fn is_periodic(&self) -> bool {
        self.task.is_periodic()
    }

    /// How many times the body has been started.
    #[must_use]
    pub fn run_count(&self) -> u64 {
        self.task.runs.load(atomic::Ordering::Relaxed)
    }
}

impl PartialEq for TaskHandle {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.task, &other.task)
    }
}

impl Eq for TaskHandle {}

impl fmt::Debug for TaskHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskHandle")
            .field("id", &self.task.id)
            .field("interval", &self.task.interval)
            .field("cancelled", &self.is_cancelled())
            .field("runs", &self.run_count())
            .finish()
    }
}

/// Heap entry: a task at its due time, tagged with an insertion sequence.
pub(crate) struct Entry {
    pub due: Instant,
    pub seq: u64,
    pub task: Arc<ScheduledTask>,
}

impl PartialEq for Entry {
    fn eq(&self, other: &Self) -> bool {
        self.due == other.due && self.seq == other.seq
    }
}

impl Eq for Entry {}

impl PartialOrd for Entry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Entry {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed for the max-heap: earliest due first, then lowest sequence.
        other
            .due
            .cmp(&self.due)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

/// Pending tasks ordered by `(due, seq)`.
///
/// Cancelled tasks stay in the heap until they reach the head.
#[derive(Default)]
pub(crate) struct Timeline {
    heap: BinaryHeap<Entry>,
    next_seq: u64,
}

impl Timeline {
    /// Insert a task; returns `true` if it is now strictly the earliest.
    pub(crate) fn push(&mut self, due: Instant, task: Arc<ScheduledTask>) -> bool {
        let earliest = self.heap.peek().is_none_or(|head| due < head.due);
        let seq = self.next_seq;
        self.next_seq += 1;
        self.heap.push(Entry { due, seq, task });
        earliest
    }

    pub(crate) fn next_due(&self) -> Option<Instant> {
        self.heap.peek().map(|entry| entry.due)
    }

    pub(crate) fn pop(&mut self) -> Option<Entry> {
        self.heap.pop()
    }

    pub(crate) fn len(&self) -> usize {
        self.heap.len()
    }

    /// Drop every pending task; returns how many were discarded.
    pub(crate) fn clear(&mut self) -> usize {
        let discarded = self.heap.len();
        self.heap.clear();
        discarded
    }
}
