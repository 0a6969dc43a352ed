//! Action output
//!
//! The decision core hands every chosen action to an [`ActionDispatcher`].
//! The bot binary writes them as JSON lines for the input-injection process
//! on the other end of stdout.

use ga_core::{Action, Params};
use ga_recorder::{Executor, ExecutorError};
use std::io::Write;
use thiserror::Error;
use tracing::trace;

/// Dispatch errors
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("Failed to write action: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to serialize action: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Action rejected: {0}")]
    Rejected(String),
}

/// Result type for dispatch operations
pub type DispatchResult<T> = Result<T, DispatchError>;

/// Carries out chosen actions
pub trait ActionDispatcher {
    fn dispatch(&mut self, action: &Action) -> DispatchResult<()>;
}

/// Writes each action as one JSON object per line
pub struct JsonLinesDispatcher<W> {
    writer: W,
}

impl<W: Write> JsonLinesDispatcher<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }

    fn write_action(&mut self, action: &Action) -> DispatchResult<()> {
        serde_json::to_writer(&mut self.writer, action)?;
        self.writer.write_all(b"\n")?;
        self.writer.flush()?;
        trace!(%action, "Dispatched action");
        Ok(())
    }
}

impl<W: Write> ActionDispatcher for JsonLinesDispatcher<W> {
    fn dispatch(&mut self, action: &Action) -> DispatchResult<()> {
        self.write_action(action)
    }
}

/// Replayed operations go out the same way live actions do
impl<W: Write> Executor for JsonLinesDispatcher<W> {
    fn execute(&mut self, action_type: &str, params: &Params) -> Result<(), ExecutorError> {
        let action = Action::new(action_type).with_params(params.clone());
        self.write_action(&action)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    fn lines(output: Vec<u8>) -> Vec<Value> {
        String::from_utf8(output)
            .unwrap()
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect()
    }

    #[test]
    fn test_writes_one_line_per_action() {
        let mut dispatcher = JsonLinesDispatcher::new(Vec::new());
        let mut params = Params::new();
        params.insert("x".to_string(), json!(100));

        dispatcher
            .dispatch(&Action::new("click").with_params(params).with_priority(2))
            .unwrap();
        dispatcher.dispatch(&Action::new("wait")).unwrap();

        let out = lines(dispatcher.into_inner());
        assert_eq!(out.len(), 2);
        assert_eq!(
            out[0],
            json!({"action_type": "click", "params": {"x": 100}, "priority": 2})
        );
        assert_eq!(out[1]["action_type"], "wait");
    }

    #[test]
    fn test_executor_writes_replayed_operations() {
        let mut dispatcher = JsonLinesDispatcher::new(Vec::new());
        let mut params = Params::new();
        params.insert("key".to_string(), json!("space"));

        dispatcher.execute("key", &params).unwrap();

        let out = lines(dispatcher.into_inner());
        assert_eq!(
            out,
            vec![json!({"action_type": "key", "params": {"key": "space"}, "priority": 0})]
        );
    }
}
