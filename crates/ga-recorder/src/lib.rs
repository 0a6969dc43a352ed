//! Operation recording and replay
//!
//! The [`OperationRecorder`] keeps a timestamped log of the actions the bot
//! dispatched. A log can be saved, loaded back, and replayed against an
//! [`Executor`] with the same spacing between operations as when it was
//! recorded.

pub mod recorder;
pub mod replay;

pub use recorder::{OperationRecorder, RecorderError, RecorderResult};
pub use replay::{gap, Executor, ExecutorError, Sleeper, ThreadSleeper};
