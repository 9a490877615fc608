//! Cancellation tokens for blocked queue operations.
//!
//! A [`CancellationToken`] is the explicit replacement for interrupting a
//! blocked thread: the waiter passes a token into the blocking call, and any
//! clone of that token can abort the wait from another thread.
//!
//! Blocking primitives register a listener for the duration of a wait. The
//! token never holds a listener lock while calling back into a primitive, so
//! a primitive may take its own lock inside [`CancelListener::on_cancel`].

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tracing::debug;

/// Callback target for a token firing.
pub(crate) trait CancelListener: Send + Sync {
    /// Wake every waiter that may be observing the token.
    fn on_cancel(&self);
}

struct TokenInner {
    cancelled: AtomicBool,
    next_listener_id: AtomicU64,
    listeners: Mutex<Vec<(u64, Weak<dyn CancelListener>)>>,
}

/// A clonable signal that aborts blocked [`BoundedQueue`](crate::core::BoundedQueue) waits.
///
/// Cancellation is sticky: once cancelled, a token stays cancelled and every
/// later cancellable call using it fails immediately.
///
/// ```
/// use prometheus_concurrency::core::{BoundedQueue, CancellationToken, QueueError};
/// use std::thread;
///
/// let queue = BoundedQueue::<u32>::new(1).unwrap();
/// let token = CancellationToken::new();
///
/// let canceller = token.clone();
/// let handle = thread::spawn(move || canceller.cancel());
///
/// // Nothing is ever enqueued, so only the token can end this wait.
/// assert_eq!(queue.dequeue_cancellable(&token), Err(QueueError::Cancelled));
/// handle.join().unwrap();
/// ```
#[derive(Clone)]
pub struct CancellationToken {
    inner: Arc<TokenInner>,
}

impl CancellationToken {
    /// Create a token in the not-cancelled state.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(TokenInner {
                cancelled: AtomicBool::new(false),
                next_listener_id: AtomicU64::new(0),
                listeners: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Fire the token, waking every wait currently registered on it.
    pub fn cancel(&self) {
        if self.inner.cancelled.swap(true, Ordering::SeqCst) {
            return;
        }

        // Snapshot first; listeners take their own locks when notified.
        let listeners: Vec<Arc<dyn CancelListener>> = {
            let guard = self.inner.listeners.lock();
            guard.iter().filter_map(|(_, weak)| weak.upgrade()).collect()
        };
        debug!(listeners = listeners.len(), "cancellation token fired");

        for listener in listeners {
            listener.on_cancel();
        }
    }

    /// Whether [`cancel`](Self::cancel) has been called on any clone.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::SeqCst)
    }

    /// Register a listener until the returned guard is dropped.
    pub(crate) fn register(&self, listener: Weak<dyn CancelListener>) -> Registration<'_> {
        let id = self.inner.next_listener_id.fetch_add(1, Ordering::Relaxed);
        self.inner.listeners.lock().push((id, listener));
        Registration { token: self, id }
    }

    #[cfg(test)]
    pub(crate) fn listener_count(&self) -> usize {
        self.inner.listeners.lock().len()
    }
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for CancellationToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancellationToken")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

/// Keeps a listener registered for the lifetime of a wait.
pub(crate) struct Registration<'a> {
    token: &'a CancellationToken,
    id: u64,
}

impl Drop for Registration<'_> {
    fn drop(&mut self) {
        self.token
            .inner
            .listeners
            .lock()
            .retain(|(id, _)| *id != self.id);
    }
}
