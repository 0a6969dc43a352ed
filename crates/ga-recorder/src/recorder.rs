//! Operation recorder
//!
//! Records dispatched actions with their capture time while recording is
//! switched on, persists the log as JSON, and replays it with the original
//! spacing between operations.

use ga_config::{read_json_file, write_json_file, ConfigError};
use ga_core::{epoch_secs, Action, Clock, Params, RecordedOperation, SystemClock};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, instrument, trace, warn};

use crate::replay::{gap, Executor, ExecutorError, Sleeper, ThreadSleeper};

/// Recorder errors
#[derive(Debug, Error)]
pub enum RecorderError {
    #[error("Replay failed at operation {index} ({action_type}): {source}")]
    Replay {
        index: usize,
        action_type: String,
        #[source]
        source: ExecutorError,
    },

    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Result type for recorder operations
pub type RecorderResult<T> = Result<T, RecorderError>;

/// Timestamped log of dispatched operations
pub struct OperationRecorder {
    operations: Vec<RecordedOperation>,
    recording: bool,
    clock: Arc<dyn Clock>,
}

impl OperationRecorder {
    /// Create an idle recorder on the system clock
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Create an idle recorder with an injected clock
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            operations: Vec::new(),
            recording: false,
            clock,
        }
    }

    /// Start appending operations; the existing log is kept
    pub fn start_recording(&mut self) {
        self.recording = true;
        info!(existing = self.operations.len(), "Recording started");
    }

    /// Stop appending operations; the log is kept
    pub fn stop_recording(&mut self) {
        self.recording = false;
        info!(recorded = self.operations.len(), "Recording stopped");
    }

    pub fn is_recording(&self) -> bool {
        self.recording
    }

    /// Append an operation stamped with the current time
    ///
    /// Ignored unless recording. Returns whether the operation was kept.
    pub fn record_operation(&mut self, action_type: impl Into<String>, params: Params) -> bool {
        if !self.recording {
            return false;
        }

        let operation = RecordedOperation {
            action_type: action_type.into(),
            params,
            timestamp: epoch_secs(self.clock.now()),
        };
        trace!(action = %operation.action_type, timestamp = operation.timestamp, "Recorded operation");
        self.operations.push(operation);
        true
    }

    /// Append a dispatched action; see [`Self::record_operation`]
    pub fn record_action(&mut self, action: &Action) -> bool {
        self.record_operation(action.action_type.clone(), action.params.clone())
    }

    /// Drop every recorded operation
    pub fn clear_operations(&mut self) {
        self.operations.clear();
    }

    /// Recorded operations in capture order
    pub fn operations(&self) -> &[RecordedOperation] {
        &self.operations
    }

    pub fn operation_count(&self) -> usize {
        self.operations.len()
    }

    /// Number of recorded operations per action type
    pub fn operation_type_histogram(&self) -> BTreeMap<String, usize> {
        let mut histogram = BTreeMap::new();
        for operation in &self.operations {
            *histogram.entry(operation.action_type.clone()).or_insert(0) += 1;
        }
        histogram
    }

    /// Write the log as a JSON list
    pub fn save(&self, path: impl AsRef<Path>) -> RecorderResult<()> {
        write_json_file(path.as_ref(), &self.operations)?;
        info!(count = self.operations.len(), path = %path.as_ref().display(), "Saved recording");
        Ok(())
    }

    /// Replace the log from a JSON file
    ///
    /// A missing or malformed file leaves the log empty. Returns the number
    /// of operations loaded.
    #[instrument(skip_all)]
    pub fn load(&mut self, path: impl AsRef<Path>) -> usize {
        let path = path.as_ref();
        match read_json_file::<Vec<RecordedOperation>>(path) {
            Ok(operations) => {
                self.operations = operations;
                info!(count = self.operations.len(), path = %path.display(), "Loaded recording");
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Failed to load recording, starting empty");
                self.operations.clear();
            }
        }
        self.operations.len()
    }

    /// Replay the log in real time
    pub fn replay(&self, executor: &mut dyn Executor) -> RecorderResult<usize> {
        self.replay_with(executor, &mut ThreadSleeper)
    }

    /// Replay the log, waiting through the given sleeper
    ///
    /// Between two operations the sleeper is asked to wait for the gap
    /// between their timestamps; nothing waits after the last one. The first
    /// executor failure stops the replay.
    pub fn replay_with(
        &self,
        executor: &mut dyn Executor,
        sleeper: &mut dyn Sleeper,
    ) -> RecorderResult<usize> {
        info!(count = self.operations.len(), "Replaying recording");

        for (index, operation) in self.operations.iter().enumerate() {
            debug!(index, action = %operation.action_type, "Replaying operation");

            executor
                .execute(&operation.action_type, &operation.params)
                .map_err(|source| RecorderError::Replay {
                    index,
                    action_type: operation.action_type.clone(),
                    source,
                })?;

            if let Some(next) = self.operations.get(index + 1) {
                sleeper.sleep(gap(operation.timestamp, next.timestamp));
            }
        }

        Ok(self.operations.len())
    }
}

impl Default for OperationRecorder {
    fn default() -> Self {
        Self::new()
    }
}
