//! State machine configuration
//!
//! The document has an ordered `states` mapping and a `triggers` list:
//!
//! ```yaml
//! states:
//!   explore:
//!     operations: [move_left, move_right]
//!     transitions:
//!       "[enemy]": battle
//!   battle:
//!     operations: [attack, attack, skill]
//!     timeout: 30
//! triggers:
//!   - condition: "{hp:0,20}"
//!     action: heal
//!     priority: 10
//! ```
//!
//! Mapping order is significant: the first state is the initial state and
//! the timeout fallback, and transitions are checked in the order written.

use ga_automation::ConditionExpr;
use ga_config::{from_yaml_value, load_yaml, load_yaml_string, ConfigError, Value};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::cmp::Reverse;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

/// State machine errors
#[derive(Debug, Error)]
pub enum StateMachineError {
    #[error("Invalid state machine configuration: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Result type for state machine operations
pub type StateMachineResult<T> = Result<T, StateMachineError>;

/// Top-level state machine document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StateMachineConfig {
    /// States in configured order
    #[serde(default)]
    pub states: IndexMap<String, StateConfig>,

    /// Global interrupts, in configured order
    #[serde(default)]
    pub triggers: Vec<TriggerConfig>,
}

/// One state of the document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StateConfig {
    /// Operation identifiers played back cyclically
    #[serde(default)]
    pub operations: Vec<String>,

    /// Condition expression → target state
    #[serde(default)]
    pub transitions: IndexMap<String, String>,

    /// Seconds after which the machine falls back to the first state
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<f64>,
}

/// One trigger of the document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriggerConfig {
    pub condition: String,
    pub action: String,
    #[serde(default)]
    pub priority: i64,
}

impl StateMachineConfig {
    /// Load a document from a YAML file
    pub fn load(path: impl AsRef<Path>) -> StateMachineResult<Self> {
        let path = path.as_ref();
        let base_dir = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        let file_name = path.file_name().map(Path::new).unwrap_or(path);

        Self::from_yaml(load_yaml(base_dir, file_name)?)
    }

    /// Parse a document from YAML text
    pub fn from_yaml_str(content: &str) -> StateMachineResult<Self> {
        Self::from_yaml(load_yaml_string(".", content, "<state machine>")?)
    }

    /// Parse a document from a processed YAML value
    pub fn from_yaml(yaml: Value) -> StateMachineResult<Self> {
        if !yaml.is_mapping() {
            return Err(StateMachineError::InvalidConfig(
                "document must be a mapping with `states` and `triggers`".to_string(),
            ));
        }

        let config: StateMachineConfig = from_yaml_value(yaml, "state_machine")?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> StateMachineResult<()> {
        for (name, state) in &self.states {
            if let Some(timeout) = state.timeout {
                if timeout.is_nan() {
                    return Err(StateMachineError::InvalidConfig(format!(
                        "state '{name}' has a NaN timeout"
                    )));
                }
            }

            for target in state.transitions.values() {
                if !self.states.contains_key(target) {
                    warn!(state = %name, to = %target, "Transition targets an unknown state");
                }
            }
        }

        Ok(())
    }
}

/// Compiled trigger
#[derive(Debug, Clone, PartialEq)]
pub struct Trigger {
    pub condition: ConditionExpr,
    pub action: String,
    pub priority: i64,
}

/// Compiled transition
#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    pub condition: ConditionExpr,
    pub target: String,
}

/// Compiled state
#[derive(Debug, Clone, PartialEq)]
pub struct State {
    pub name: String,
    pub operations: Vec<String>,
    pub transitions: Vec<Transition>,
    pub timeout: Option<f64>,
}

impl State {
    /// Timeout in seconds, if it is set and positive
    pub fn effective_timeout(&self) -> Option<f64> {
        self.timeout.filter(|t| *t > 0.0)
    }

    pub fn first_operation(&self) -> Option<&str> {
        self.operations.first().map(String::as_str)
    }
}

/// Parse every expression and order the triggers
///
/// Triggers are stably sorted by descending priority, so equal priorities
/// keep their configured order.
pub(crate) fn compile(config: StateMachineConfig) -> (IndexMap<String, State>, Vec<Trigger>) {
    let states = config
        .states
        .into_iter()
        .map(|(name, state)| {
            let transitions = state
                .transitions
                .into_iter()
                .map(|(condition, target)| Transition {
                    condition: ConditionExpr::new(condition),
                    target,
                })
                .collect();

            let compiled = State {
                name: name.clone(),
                operations: state.operations,
                transitions,
                timeout: state.timeout,
            };
            (name, compiled)
        })
        .collect();

    let mut triggers: Vec<Trigger> = config
        .triggers
        .into_iter()
        .map(|t| {
            let condition = ConditionExpr::new(t.condition);
            if !condition.expr().is_recognized() {
                debug!(condition = %condition, action = %t.action, "Trigger condition has unrecognized parts");
            }
            Trigger {
                condition,
                action: t.action,
                priority: t.priority,
            }
        })
        .collect();
    triggers.sort_by_key(|t| Reverse(t.priority));

    (states, triggers)
}
