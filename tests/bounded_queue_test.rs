//! Integration tests for BoundedQueue
//!
//! Producer/consumer scenarios across real threads: blocking at capacity,
//! FIFO delivery, arrival-order fairness, and cancellation.

use prometheus_concurrency::core::{BoundedQueue, CancellationToken, QueueError};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Long enough for a spawned thread to reach its blocking call.
const SETTLE: Duration = Duration::from_millis(50);

/// A producer at capacity blocks until a consumer frees a slot
#[test]
fn test_producer_blocks_when_full() {
    let queue = Arc::new(BoundedQueue::new(2).unwrap());
    queue.enqueue(1);
    queue.enqueue(2);

    let stored = Arc::new(AtomicBool::new(false));
    let producer = {
        let queue = Arc::clone(&queue);
        let stored = Arc::clone(&stored);
        thread::spawn(move || {
            queue.enqueue(3);
            stored.store(true, Ordering::SeqCst);
        })
    };

    thread::sleep(SETTLE);
    assert!(!stored.load(Ordering::SeqCst), "enqueue should block while full");
    assert_eq!(queue.size(), 2);

    assert_eq!(queue.dequeue(), 1);
    producer.join().unwrap();
    assert!(stored.load(Ordering::SeqCst));

    assert_eq!(queue.dequeue(), 2);
    assert_eq!(queue.dequeue(), 3);
    assert!(queue.is_empty());
}

/// A consumer on an empty queue blocks until an item arrives
#[test]
fn test_consumer_blocks_when_empty() {
    let queue = Arc::new(BoundedQueue::new(4).unwrap());

    let consumer = {
        let queue = Arc::clone(&queue);
        thread::spawn(move || queue.dequeue())
    };

    thread::sleep(SETTLE);
    assert!(!consumer.is_finished());

    queue.enqueue("hello");
    assert_eq!(consumer.join().unwrap(), "hello");
}

/// A single producer's items come out in the order they went in
#[test]
fn test_fifo_through_small_buffer() {
    const NUM_ITEMS: usize = 1_000;

    let queue = Arc::new(BoundedQueue::new(3).unwrap());
    let producer = {
        let queue = Arc::clone(&queue);
        thread::spawn(move || {
            for i in 0..NUM_ITEMS {
                queue.enqueue(i);
            }
        })
    };

    let received: Vec<usize> = (0..NUM_ITEMS).map(|_| queue.dequeue()).collect();
    producer.join().unwrap();

    assert_eq!(received, (0..NUM_ITEMS).collect::<Vec<_>>());
}

/// Blocked producers are admitted in the order they arrived
#[test]
fn test_blocked_producers_served_in_arrival_order() {
    let queue = Arc::new(BoundedQueue::new(1).unwrap());
    queue.enqueue("initial");

    let mut producers = Vec::new();
    for name in ["first", "second", "third"] {
        let queue = Arc::clone(&queue);
        producers.push(thread::spawn(move || queue.enqueue(name)));
        thread::sleep(SETTLE);
    }

    let received: Vec<&str> = (0..4).map(|_| queue.dequeue()).collect();
    for producer in producers {
        producer.join().unwrap();
    }

    assert_eq!(received, vec!["initial", "first", "second", "third"]);
}

/// Blocked consumers receive items in the order they arrived
#[test]
fn test_blocked_consumers_served_in_arrival_order() {
    let queue = Arc::new(BoundedQueue::new(4).unwrap());
    let order = Arc::new(parking_lot::Mutex::new(Vec::new()));

    let mut consumers = Vec::new();
    for consumer_id in 0..3 {
        let queue = Arc::clone(&queue);
        let order = Arc::clone(&order);
        consumers.push(thread::spawn(move || {
            let item = queue.dequeue();
            order.lock().push((consumer_id, item));
        }));
        thread::sleep(SETTLE);
    }

    for item in [10, 20, 30] {
        queue.enqueue(item);
        thread::sleep(SETTLE);
    }
    for consumer in consumers {
        consumer.join().unwrap();
    }

    assert_eq!(*order.lock(), vec![(0, 10), (1, 20), (2, 30)]);
}

/// Size never exceeds capacity and every item is delivered exactly once
#[test]
fn test_many_producers_and_consumers() {
    const PRODUCERS: usize = 4;
    const CONSUMERS: usize = 3;
    const PER_PRODUCER: usize = 500;
    const CAPACITY: usize = 8;

    let queue = Arc::new(BoundedQueue::new(CAPACITY).unwrap());
    let done = Arc::new(AtomicBool::new(false));
    let max_seen = Arc::new(AtomicUsize::new(0));

    let monitor = {
        let queue = Arc::clone(&queue);
        let done = Arc::clone(&done);
        let max_seen = Arc::clone(&max_seen);
        thread::spawn(move || {
            while !done.load(Ordering::SeqCst) {
                max_seen.fetch_max(queue.size(), Ordering::SeqCst);
                thread::yield_now();
            }
        })
    };

    let producers: Vec<_> = (0..PRODUCERS)
        .map(|p| {
            let queue = Arc::clone(&queue);
            thread::spawn(move || {
                for i in 0..PER_PRODUCER {
                    queue.enqueue(p * PER_PRODUCER + i);
                }
            })
        })
        .collect();

    let total = PRODUCERS * PER_PRODUCER;
    let consumed = Arc::new(AtomicUsize::new(0));
    let consumers: Vec<_> = (0..CONSUMERS)
        .map(|_| {
            let queue = Arc::clone(&queue);
            let consumed = Arc::clone(&consumed);
            thread::spawn(move || {
                let mut items = Vec::new();
                while consumed.fetch_add(1, Ordering::SeqCst) < total {
                    items.push(queue.dequeue());
                }
                items
            })
        })
        .collect();

    for producer in producers {
        producer.join().unwrap();
    }
    let mut seen = HashSet::new();
    for consumer in consumers {
        for item in consumer.join().unwrap() {
            assert!(seen.insert(item), "item {item} delivered twice");
        }
    }
    done.store(true, Ordering::SeqCst);
    monitor.join().unwrap();

    assert_eq!(seen.len(), total);
    assert!(max_seen.load(Ordering::SeqCst) <= CAPACITY);
    assert!(queue.is_empty());
}

/// Random pauses on both sides still preserve per-producer order
#[test]
fn test_random_interleavings_keep_producer_order() {
    const PRODUCERS: usize = 3;
    const PER_PRODUCER: usize = 60;

    let queue = Arc::new(BoundedQueue::new(2).unwrap());

    let producers: Vec<_> = (0..PRODUCERS)
        .map(|p| {
            let queue = Arc::clone(&queue);
            thread::spawn(move || {
                let mut rng = StdRng::seed_from_u64(p as u64);
                for seq in 0..PER_PRODUCER {
                    if rng.random_bool(0.3) {
                        thread::sleep(Duration::from_micros(rng.random_range(50..500)));
                    }
                    queue.enqueue((p, seq));
                }
            })
        })
        .collect();

    let mut rng = StdRng::seed_from_u64(99);
    let mut last_seq = [None::<usize>; PRODUCERS];
    for _ in 0..PRODUCERS * PER_PRODUCER {
        if rng.random_bool(0.3) {
            thread::sleep(Duration::from_micros(rng.random_range(50..500)));
        }
        let (p, seq) = queue.dequeue();
        if let Some(prev) = last_seq[p] {
            assert!(seq > prev, "producer {p} reordered: {prev} then {seq}");
        }
        last_seq[p] = Some(seq);
    }

    for producer in producers {
        producer.join().unwrap();
    }
    assert!(last_seq.iter().all(|s| *s == Some(PER_PRODUCER - 1)));
}

/// Cancelling a blocked consumer returns Cancelled and leaves the queue usable
#[test]
fn test_cancel_blocked_consumer() {
    let queue = Arc::new(BoundedQueue::<u32>::new(2).unwrap());
    let token = CancellationToken::new();

    let consumer = {
        let queue = Arc::clone(&queue);
        let token = token.clone();
        thread::spawn(move || queue.dequeue_cancellable(&token))
    };

    thread::sleep(SETTLE);
    token.cancel();
    assert_eq!(consumer.join().unwrap(), Err(QueueError::Cancelled));

    // Full capacity is still available.
    queue.enqueue_timeout(1, Duration::from_millis(10)).unwrap();
    queue.enqueue_timeout(2, Duration::from_millis(10)).unwrap();
    assert!(queue.enqueue_timeout(3, Duration::from_millis(10)).is_err());
    assert_eq!(queue.dequeue(), 1);
}

/// Cancelling a blocked producer hands the item back
#[test]
fn test_cancel_blocked_producer_returns_item() {
    let queue = Arc::new(BoundedQueue::new(1).unwrap());
    queue.enqueue(String::from("resident"));
    let token = CancellationToken::new();

    let producer = {
        let queue = Arc::clone(&queue);
        let token = token.clone();
        thread::spawn(move || queue.enqueue_cancellable(String::from("rejected"), &token))
    };

    thread::sleep(SETTLE);
    token.cancel();
    let err = producer.join().unwrap().unwrap_err();
    assert_eq!(err.reason(), QueueError::Cancelled);
    assert_eq!(err.into_inner(), "rejected");

    assert_eq!(queue.size(), 1);
    assert_eq!(queue.dequeue(), "resident");
    assert!(queue.try_dequeue().is_none());
}

/// A token cancelled before the call fails fast, even when the queue could serve it
#[test]
fn test_pre_cancelled_token_fails_fast() {
    let queue = BoundedQueue::new(1).unwrap();
    queue.enqueue(5);

    let token = CancellationToken::new();
    token.cancel();
    assert_eq!(queue.dequeue_cancellable(&token), Err(QueueError::Cancelled));
    assert_eq!(queue.size(), 1);
}

/// Timeouts are honored on both sides
#[test]
fn test_timeouts() {
    let queue = BoundedQueue::new(1).unwrap();

    let start = Instant::now();
    assert_eq!(queue.dequeue_timeout(Duration::from_millis(40)), Err(QueueError::TimedOut));
    assert!(start.elapsed() >= Duration::from_millis(40));

    queue.enqueue('a');
    let err = queue.enqueue_timeout('b', Duration::from_millis(20)).unwrap_err();
    assert_eq!(err.reason(), QueueError::TimedOut);
    assert_eq!(queue.dequeue_timeout(Duration::from_millis(20)), Ok('a'));
}

/// One token cancels every wait registered with it
#[test]
fn test_one_token_cancels_many_waiters() {
    let queue = Arc::new(BoundedQueue::<u8>::new(1).unwrap());
    let token = CancellationToken::new();

    let consumers: Vec<_> = (0..4)
        .map(|_| {
            let queue = Arc::clone(&queue);
            let token = token.clone();
            thread::spawn(move || queue.dequeue_cancellable(&token))
        })
        .collect();

    thread::sleep(SETTLE);
    token.cancel();
    for consumer in consumers {
        assert_eq!(consumer.join().unwrap(), Err(QueueError::Cancelled));
    }

    queue.enqueue(9);
    assert_eq!(queue.dequeue(), 9);
}
