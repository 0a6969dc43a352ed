//! Replay seams
//!
//! Replay drives an external [`Executor`] and waits between operations
//! through a [`Sleeper`], so tests can observe the delays without waiting.

use ga_core::Params;
use std::time::Duration;

/// Failure reported by an executor
pub type ExecutorError = Box<dyn std::error::Error + Send + Sync>;

/// Carries out one recorded operation
pub trait Executor {
    fn execute(&mut self, action_type: &str, params: &Params) -> Result<(), ExecutorError>;
}

impl<F> Executor for F
where
    F: FnMut(&str, &Params) -> Result<(), ExecutorError>,
{
    fn execute(&mut self, action_type: &str, params: &Params) -> Result<(), ExecutorError> {
        self(action_type, params)
    }
}

/// Blocks between replayed operations
pub trait Sleeper {
    fn sleep(&mut self, duration: Duration);
}

/// Sleeps the current thread
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&mut self, duration: Duration) {
        if !duration.is_zero() {
            std::thread::sleep(duration);
        }
    }
}

/// Delay between two recorded timestamps (seconds); negative or
/// unrepresentable gaps become zero
pub fn gap(from: f64, to: f64) -> Duration {
    Duration::try_from_secs_f64(to - from).unwrap_or(Duration::ZERO)
}
