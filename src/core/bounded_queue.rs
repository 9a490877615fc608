//! Bounded blocking FIFO queue with fair, cancellable waits.
//!
//! One `parking_lot::Mutex` guards the items and both waiter lists. Every
//! blocked caller parks on its own `Condvar`, so a release wakes exactly the
//! waiter it serves.
//!
//! # Direct handoff
//!
//! Items move between threads under the lock, never through a woken waiter:
//!
//! - An item arriving while consumers wait goes straight into the oldest
//!   consumer's slot instead of the queue.
//! - A slot freed while producers wait is refilled at once with the oldest
//!   producer's item.
//!
//! A waiter that has not woken yet therefore owns nothing another thread can
//! take, and late arrivals never barge. Two invariants follow: consumers only
//! wait on an empty queue, and producers only wait on a full one.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use tracing::{debug, trace};

use super::cancel::{CancelListener, CancellationToken};
use super::{EnqueueError, QueueError};

/// A parked producer or consumer.
struct Waiter<T> {
    /// Producer: its item until a consumer admits it. Consumer: empty until
    /// an item is handed over.
    slot: Mutex<Option<T>>,
    cvar: Condvar,
}

impl<T> Waiter<T> {
    fn new(slot: Option<T>) -> Arc<Self> {
        Arc::new(Self {
            slot: Mutex::new(slot),
            cvar: Condvar::new(),
        })
    }

    fn take(&self) -> Option<T> {
        self.slot.lock().take()
    }
}

struct State<T> {
    items: VecDeque<T>,
    producers: VecDeque<Arc<Waiter<T>>>,
    consumers: VecDeque<Arc<Waiter<T>>>,
}

impl<T> State<T> {
    /// Hand `item` to the oldest blocked consumer, else store it.
    fn publish(&mut self, item: T) {
        match self.consumers.pop_front() {
            Some(consumer) => {
                *consumer.slot.lock() = Some(item);
                consumer.cvar.notify_one();
            }
            None => self.items.push_back(item),
        }
    }

    /// Fill a freed slot with the oldest blocked producer's item.
    fn admit_producer(&mut self) {
        if let Some(producer) = self.producers.pop_front() {
            if let Some(item) = producer.take() {
                self.items.push_back(item);
            }
            producer.cvar.notify_one();
        }
    }

    fn forget(list: &mut VecDeque<Arc<Waiter<T>>>, waiter: &Arc<Waiter<T>>) {
        list.retain(|w| !Arc::ptr_eq(w, waiter));
    }
}

struct Shared<T> {
    state: Mutex<State<T>>,
    len: AtomicUsize,
}

impl<T> Shared<T> {
    fn push_item(&self, state: &mut State<T>, item: T) {
        state.publish(item);
        self.len.store(state.items.len(), Ordering::Relaxed);
    }

    fn pop_item(&self, state: &mut State<T>) -> Option<T> {
        let item = state.items.pop_front()?;
        state.admit_producer();
        self.len.store(state.items.len(), Ordering::Relaxed);
        Some(item)
    }
}

impl<T: Send> CancelListener for Shared<T> {
    fn on_cancel(&self) {
        // Waiters re-check their token after waking; unaffected ones park again.
        let state = self.state.lock();
        for waiter in state.producers.iter().chain(state.consumers.iter()) {
            waiter.cvar.notify_one();
        }
    }
}

/// How a blocking call may end besides success.
#[derive(Clone, Copy)]
struct WaitLimits<'a> {
    token: Option<&'a CancellationToken>,
    deadline: Option<Instant>,
}

impl<'a> WaitLimits<'a> {
    const fn unbounded() -> Self {
        Self {
            token: None,
            deadline: None,
        }
    }

    fn timeout(timeout: Duration) -> Self {
        Self {
            token: None,
            deadline: Instant::now().checked_add(timeout),
        }
    }

    const fn cancellable(token: &'a CancellationToken) -> Self {
        Self {
            token: Some(token),
            deadline: None,
        }
    }

    fn interrupted(&self) -> Option<QueueError> {
        if self.token.is_some_and(CancellationToken::is_cancelled) {
            return Some(QueueError::Cancelled);
        }
        if self.deadline.is_some_and(|d| Instant::now() >= d) {
            return Some(QueueError::TimedOut);
        }
        None
    }
}

/// A fixed-capacity FIFO queue whose `enqueue` blocks while full and whose
/// `dequeue` blocks while empty.
///
/// Blocked producers and consumers are each served in arrival order. Share it
/// between threads with an [`Arc`].
///
/// ```
/// use prometheus_concurrency::core::BoundedQueue;
/// use std::sync::Arc;
/// use std::thread;
///
/// let queue = Arc::new(BoundedQueue::new(2).unwrap());
/// let producer = {
///     let queue = Arc::clone(&queue);
///     thread::spawn(move || {
///         for i in 1..=3 {
///             queue.enqueue(i);
///         }
///     })
/// };
///
/// let received: Vec<i32> = (0..3).map(|_| queue.dequeue()).collect();
/// producer.join().unwrap();
/// assert_eq!(received, vec![1, 2, 3]);
/// ```
pub struct BoundedQueue<T> {
    capacity: usize,
    shared: Arc<Shared<T>>,
}

impl<T: Send + 'static> BoundedQueue<T> {
    /// Create a queue holding at most `capacity` items.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::ZeroCapacity`] if `capacity` is 0.
    pub fn new(capacity: usize) -> Result<Self, QueueError> {
        if capacity == 0 {
            return Err(QueueError::ZeroCapacity);
        }
        Ok(Self {
            capacity,
            shared: Arc::new(Shared {
                state: Mutex::new(State {
                    items: VecDeque::with_capacity(capacity.min(1024)),
                    producers: VecDeque::new(),
                    consumers: VecDeque::new(),
                }),
                len: AtomicUsize::new(0),
            }),
        })
    }

    /// Append `item`, blocking until a slot is free.
    pub fn enqueue(&self, item: T) {
        // Without a token or deadline the wait only ends once the item is stored.
        let _ = self.put(item, WaitLimits::unbounded());
    }

    /// Append `item`, giving up after `timeout`.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::TimedOut`] together with the item if no slot
    /// became free in time.
    pub fn enqueue_timeout(&self, item: T, timeout: Duration) -> Result<(), EnqueueError<T>> {
        self.put(item, WaitLimits::timeout(timeout))
    }

    /// Append `item`, aborting if `token` is cancelled while waiting.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::Cancelled`] together with the item. Once a
    /// consumer has admitted the item the call has succeeded, and a later
    /// cancellation leaves it in the queue.
    pub fn enqueue_cancellable(
        &self,
        item: T,
        token: &CancellationToken,
    ) -> Result<(), EnqueueError<T>> {
        self.put(item, WaitLimits::cancellable(token))
    }

    /// Remove the head item, blocking until one is available.
    pub fn dequeue(&self) -> T {
        loop {
            // Only a token or deadline can end the wait without an item.
            if let Ok(item) = self.take(WaitLimits::unbounded()) {
                return item;
            }
        }
    }

    /// Remove the head item, giving up after `timeout`.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::TimedOut`] if nothing arrived in time.
    pub fn dequeue_timeout(&self, timeout: Duration) -> Result<T, QueueError> {
        self.take(WaitLimits::timeout(timeout))
    }

    /// Remove the head item, aborting if `token` is cancelled while waiting.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::Cancelled`]. An item already handed to this call
    /// is returned even if the token fires before the caller wakes.
    pub fn dequeue_cancellable(&self, token: &CancellationToken) -> Result<T, QueueError> {
        self.take(WaitLimits::cancellable(token))
    }

    /// Remove the head item if one is available right now.
    ///
    /// Never takes an item meant for a blocked consumer: while any consumer
    /// waits, arriving items go to it directly and the queue stays empty.
    pub fn try_dequeue(&self) -> Option<T> {
        let mut state = self.shared.state.lock();
        self.shared.pop_item(&mut state)
    }

    fn put(&self, item: T, limits: WaitLimits<'_>) -> Result<(), EnqueueError<T>> {
        if let Some(reason) = limits.interrupted() {
            return Err(EnqueueError::new(reason, item));
        }
        let _registration = limits.token.map(|t| t.register(self.listener()));

        let mut state = self.shared.state.lock();
        if state.producers.is_empty() && state.items.len() < self.capacity {
            self.shared.push_item(&mut state, item);
            return Ok(());
        }

        let waiter = Waiter::new(Some(item));
        state.producers.push_back(Arc::clone(&waiter));
        trace!(waiting = state.producers.len(), "producer parked on full queue");

        loop {
            if waiter.slot.lock().is_none() {
                // Admitted by a consumer.
                return Ok(());
            }
            if let Some(reason) = limits.interrupted() {
                State::forget(&mut state.producers, &waiter);
                debug!(reason = %reason, "enqueue abandoned");
                return match waiter.take() {
                    Some(item) => Err(EnqueueError::new(reason, item)),
                    None => Ok(()),
                };
            }
            match limits.deadline {
                Some(deadline) => {
                    let _ = waiter.cvar.wait_until(&mut state, deadline);
                }
                None => waiter.cvar.wait(&mut state),
            }
        }
    }

    fn take(&self, limits: WaitLimits<'_>) -> Result<T, QueueError> {
        if let Some(reason) = limits.interrupted() {
            return Err(reason);
        }
        let _registration = limits.token.map(|t| t.register(self.listener()));

        let mut state = self.shared.state.lock();
        if let Some(item) = self.shared.pop_item(&mut state) {
            return Ok(item);
        }

        let waiter = Waiter::new(None);
        state.consumers.push_back(Arc::clone(&waiter));
        trace!(waiting = state.consumers.len(), "consumer parked on empty queue");

        loop {
            if let Some(item) = waiter.take() {
                return Ok(item);
            }
            if let Some(reason) = limits.interrupted() {
                State::forget(&mut state.consumers, &waiter);
                debug!(reason = %reason, "dequeue abandoned");
                return Err(reason);
            }
            match limits.deadline {
                Some(deadline) => {
                    let _ = waiter.cvar.wait_until(&mut state, deadline);
                }
                None => waiter.cvar.wait(&mut state),
            }
        }
    }

    fn listener(&self) -> Weak<dyn CancelListener> {
        let shared: Arc<dyn CancelListener> = self.shared.clone();
        Arc::downgrade(&shared)
    }
}

impl<T> BoundedQueue<T> {
    /// Best-effort number of stored items; may be stale under contention.
    pub fn size(&self) -> usize {
        self.shared.len.load(Ordering::Relaxed)
    }

    /// Whether the queue looked empty at the time of the call.
    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    /// Fixed capacity given at construction.
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    #[cfg(test)]
    pub(crate) fn waiting(&self) -> (usize, usize) {
        let state = self.shared.state.lock();
        (state.producers.len(), state.consumers.len())
    }
}

impl<T> std::fmt::Debug for BoundedQueue<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoundedQueue")
            .field("capacity", &self.capacity)
            .field("size", &self.size())
            .finish()
    }
}
