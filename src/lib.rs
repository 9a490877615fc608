//! # Prometheus Concurrency
//!
//! Thread-based concurrency primitives: a bounded blocking queue, a
//! fixed-size worker pool, and a delayed/periodic timer scheduler.
//!
//! All three are built on `parking_lot` locks and condition variables and on
//! dedicated OS threads. None of them needs an async runtime; the worker pool
//! can optionally drive futures through a per-worker Tokio runtime
//! (`tokio-runtime` feature, on by default).
//!
//! ## Key Features
//!
//! - **Fair blocking queue**: producers and consumers are served in arrival
//!   order, and blocked calls can be cancelled or time out without leaking capacity
//! - **Draining worker pool**: `shutdown` stops intake, runs every queued task,
//!   then joins the workers; panicking tasks never take a worker down
//! - **Single-coordinator timer**: one-shot and fixed-rate tasks on one thread,
//!   ordered by due time then submission order, with lazy cancellation
//! - **Configuration**: serde structs, loadable from JSON or `PROMETHEUS_*`
//!   environment variables
//!
//! ## BoundedQueue
//!
//! ```rust
//! use prometheus_concurrency::core::{BoundedQueue, CancellationToken, QueueError};
//!
//! let queue = BoundedQueue::new(1).unwrap();
//! queue.enqueue("first");
//!
//! // Full: a cancelled producer gets its item back.
//! let token = CancellationToken::new();
//! token.cancel();
//! let err = queue.enqueue_cancellable("second", &token).unwrap_err();
//! assert_eq!(err.reason(), QueueError::Cancelled);
//! assert_eq!(err.into_inner(), "second");
//!
//! assert_eq!(queue.dequeue(), "first");
//! ```
//!
//! ## WorkerPool and TimerScheduler
//!
//! ```rust
//! use prometheus_concurrency::builders::{build_scheduler, build_worker_pool};
//! use prometheus_concurrency::config::PrimitivesConfig;
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! let cfg = PrimitivesConfig::from_json_str(r#"{ "worker_pool": { "worker_count": 2 } }"#).unwrap();
//! let pool = Arc::new(build_worker_pool(&cfg.worker_pool).unwrap());
//! let scheduler = build_scheduler(&cfg.scheduler).unwrap();
//!
//! // Hand a heartbeat to the pool every 50ms.
//! let heartbeat_pool = Arc::clone(&pool);
//! let heartbeat = scheduler
//!     .schedule_at_fixed_rate(
//!         move || {
//!             let _ = heartbeat_pool.submit_task(|| {});
//!         },
//!         Duration::ZERO,
//!         Duration::from_millis(50),
//!     )
//!     .unwrap();
//!
//! std::thread::sleep(Duration::from_millis(120));
//! heartbeat.cancel();
//! scheduler.shutdown();
//! pool.shutdown();
//! assert!(pool.stats().completed_tasks >= 1);
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

/// Queue, pool, and scheduler primitives plus their error types.
pub mod core;
/// Configuration models for every primitive.
pub mod config;
/// Builders to construct primitives from configuration.
pub mod builders;
/// Shared utilities.
pub mod util;
