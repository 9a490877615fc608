//! Builders to construct primitives from configuration.

pub mod pool_builder;

pub use pool_builder::{build_queue, build_scheduler, build_worker_pool};
