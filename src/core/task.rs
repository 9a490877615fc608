//! Task representation and panic isolation shared by the pool and the scheduler.

use std::panic::{self, AssertUnwindSafe};

use super::TaskExecutionError;

/// An opaque, fire-and-forget unit of work for the worker pool.
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// Run a task body, converting a panic into a [`TaskExecutionError`].
///
/// The caller's thread survives the failure, so a faulty task never costs a
/// worker or the scheduler coordinator.
pub(crate) fn run_isolated<F>(body: F) -> Result<(), TaskExecutionError>
where
    F: FnOnce(),
{
    panic::catch_unwind(AssertUnwindSafe(body))
        .map_err(|payload| TaskExecutionError::from_panic(payload.as_ref()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_isolated_ok() {
        let mut ran = false;
        assert!(run_isolated(|| ran = true).is_ok());
        assert!(ran);
    }

    #[test]
    fn test_run_isolated_catches_panic() {
        let err = run_isolated(|| panic!("task exploded")).unwrap_err();
        assert_eq!(err.message(), "task exploded");
    }
}
