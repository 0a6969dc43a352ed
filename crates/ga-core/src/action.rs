//! Action types produced by the decision core

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Parameter mapping carried by actions and recorded operations
pub type Params = Map<String, Value>;

/// A chosen action
///
/// The decision core only decides *which* action is due; the type and
/// parameters are opaque to it and interpreted by the external dispatcher.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
    /// Action type identifier (e.g. "click", "key", "retreat")
    pub action_type: String,

    /// Action parameters
    #[serde(default)]
    pub params: Params,

    /// Priority of the originating rule or trigger
    #[serde(default)]
    pub priority: i64,
}

impl Action {
    /// Create an action with no parameters
    pub fn new(action_type: impl Into<String>) -> Self {
        Self {
            action_type: action_type.into(),
            params: Params::new(),
            priority: 0,
        }
    }

    /// Set the parameters
    pub fn with_params(mut self, params: Params) -> Self {
        self.params = params;
        self
    }

    /// Set the priority
    pub fn with_priority(mut self, priority: i64) -> Self {
        self.priority = priority;
        self
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.params.is_empty() {
            write!(f, "{}", self.action_type)
        } else {
            write!(f, "{}({})", self.action_type, Value::Object(self.params.clone()))
        }
    }
}

/// One entry of the operation recording log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordedOperation {
    /// Action type
    #[serde(rename = "type")]
    pub action_type: String,

    /// Action parameters
    #[serde(default)]
    pub params: Params,

    /// Capture time in Unix seconds
    pub timestamp: f64,
}

/// One entry of the rule engine's dispatch history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionRecord {
    pub action_type: String,
    pub params: Params,
    pub priority: i64,
    /// Whether the dispatcher reported success
    pub result: bool,
    pub timestamp: DateTime<Utc>,
}

impl ActionRecord {
    /// Record the outcome of dispatching an action
    pub fn new(action: &Action, result: bool, timestamp: DateTime<Utc>) -> Self {
        Self {
            action_type: action.action_type.clone(),
            params: action.params.clone(),
            priority: action.priority,
            result,
            timestamp,
        }
    }
}
