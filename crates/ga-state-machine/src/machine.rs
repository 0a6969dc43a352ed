//! The operation state machine
//!
//! Each tick the machine picks at most one operation:
//!
//! 1. The first trigger (highest priority) whose condition holds fires its
//!    action, without touching the current state.
//! 2. Before the first state is entered, the machine enters the first
//!    configured state and yields nothing.
//! 3. A state past its timeout falls back to the first configured state and
//!    yields that state's first operation.
//! 4. The first transition whose condition holds and whose target exists
//!    moves to the target and yields its first operation.
//! 5. Otherwise the current state's operations play back cyclically, one
//!    every 100 ms since entry.

use chrono::{DateTime, Utc};
use ga_automation::{ConditionEvaluator, EvalContext};
use ga_core::{elapsed_secs, Action, Clock, Observation, SystemClock};
use indexmap::IndexMap;
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, instrument, trace, warn};

use crate::config::{compile, State, StateMachineConfig, StateMachineResult, Trigger};

/// Playback cadence of a state's operation list
pub const OPERATION_INTERVAL_MICROS: i64 = 100_000;

/// Why a step was chosen
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOrigin {
    /// A global trigger fired
    Trigger,
    /// The state timed out and the machine fell back to its first state
    Timeout { to: String },
    /// A transition moved the machine to a new state
    Transition { to: String },
    /// Cyclic playback of the current state
    Cycle { index: usize },
}

impl fmt::Display for StepOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StepOrigin::Trigger => f.write_str("trigger"),
            StepOrigin::Timeout { to } => write!(f, "timeout -> {to}"),
            StepOrigin::Transition { to } => write!(f, "transition -> {to}"),
            StepOrigin::Cycle { index } => write!(f, "cycle[{index}]"),
        }
    }
}

/// The operation chosen for a tick
#[derive(Debug, Clone, PartialEq)]
pub struct Step {
    /// Operation or action identifier
    pub operation: String,
    /// Priority of the firing trigger, 0 otherwise
    pub priority: i64,
    pub origin: StepOrigin,
}

impl Step {
    fn new(operation: impl Into<String>, origin: StepOrigin) -> Self {
        Self {
            operation: operation.into(),
            priority: 0,
            origin,
        }
    }

    pub fn into_action(self) -> Action {
        Action::new(self.operation).with_priority(self.priority)
    }
}

impl From<Step> for Action {
    fn from(step: Step) -> Self {
        step.into_action()
    }
}

/// Named-state operation sequencer
pub struct StateMachine {
    states: IndexMap<String, State>,
    triggers: Vec<Trigger>,
    current: Option<String>,
    entered_at: DateTime<Utc>,
    evaluator: ConditionEvaluator,
    clock: Arc<dyn Clock>,
}

impl StateMachine {
    /// Create an empty machine on the system clock
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Create an empty machine with an injected clock
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        let entered_at = clock.now();
        Self {
            states: IndexMap::new(),
            triggers: Vec::new(),
            current: None,
            entered_at,
            evaluator: ConditionEvaluator::new(),
            clock,
        }
    }

    /// Load states and triggers from a YAML file
    ///
    /// Returns `false` when the file cannot be read or parsed; the previous
    /// configuration is then kept as is.
    #[instrument(skip_all)]
    pub fn load_config(&mut self, path: impl AsRef<Path>) -> bool {
        let path = path.as_ref();
        self.apply_result(StateMachineConfig::load(path), &path.display().to_string())
    }

    /// Load states and triggers from YAML text; see [`Self::load_config`]
    pub fn load_config_str(&mut self, content: &str) -> bool {
        self.apply_result(StateMachineConfig::from_yaml_str(content), "<string>")
    }

    fn apply_result(&mut self, result: StateMachineResult<StateMachineConfig>, source: &str) -> bool {
        match result {
            Ok(config) => {
                self.apply_config(config);
                true
            }
            Err(e) => {
                warn!(source, error = %e, "Failed to load state machine, keeping previous configuration");
                false
            }
        }
    }

    /// Replace states and triggers
    ///
    /// The current state survives when a state of the same name exists in
    /// the new configuration.
    pub fn apply_config(&mut self, config: StateMachineConfig) {
        let (states, triggers) = compile(config);
        self.states = states;
        self.triggers = triggers;

        if let Some(current) = &self.current {
            if !self.states.contains_key(current) {
                debug!(state = %current, "Current state removed by reload");
                self.current = None;
            }
        }

        info!(
            states = self.states.len(),
            triggers = self.triggers.len(),
            "Loaded state machine"
        );
    }

    /// Advance one tick
    pub fn update(&mut self, observation: &Observation) -> Option<Step> {
        let now = self.clock.now();
        let ctx = EvalContext::new(observation).with_time(now);

        if let Some(trigger) = self
            .triggers
            .iter()
            .find(|t| self.evaluator.evaluate_expr(t.condition.expr(), &ctx))
        {
            debug!(condition = %trigger.condition, action = %trigger.action, "Trigger fired");
            let mut step = Step::new(trigger.action.clone(), StepOrigin::Trigger);
            step.priority = trigger.priority;
            return Some(step);
        }

        let Some(current) = self.current.as_deref().and_then(|name| self.states.get(name)) else {
            if let Some(first) = self.states.keys().next().cloned() {
                self.enter(first, now);
            }
            return None;
        };

        let elapsed = elapsed_secs(self.entered_at, now);

        if let Some(timeout) = current.effective_timeout() {
            if elapsed > timeout {
                let first = self.states.get_index(0).map(|(name, _)| name.clone())?;
                debug!(state = %current.name, elapsed, timeout, "State timed out");
                self.enter(first.clone(), now);
                return self.first_step(&first, StepOrigin::Timeout { to: first.clone() });
            }
        }

        let target = current
            .transitions
            .iter()
            .filter(|t| {
                let known = self.states.contains_key(&t.target);
                if !known {
                    trace!(to = %t.target, "Skipping transition to unknown state");
                }
                known
            })
            .find(|t| self.evaluator.evaluate_expr(t.condition.expr(), &ctx))
            .map(|t| t.target.clone());

        if let Some(target) = target {
            self.enter(target.clone(), now);
            return self.first_step(&target, StepOrigin::Transition { to: target.clone() });
        }

        cycle_step(current, self.entered_at, now)
    }

    fn enter(&mut self, name: String, now: DateTime<Utc>) {
        info!(from = ?self.current, to = %name, "Entering state");
        self.entered_at = now;
        self.current = Some(name);
    }

    fn first_step(&self, name: &str, origin: StepOrigin) -> Option<Step> {
        let operation = self.states.get(name)?.first_operation()?;
        Some(Step::new(operation, origin))
    }

    /// Name of the current state, `None` before the first tick
    pub fn current_state(&self) -> Option<&str> {
        self.current.as_deref()
    }

    /// State names in configured order
    pub fn state_names(&self) -> impl Iterator<Item = &str> {
        self.states.keys().map(String::as_str)
    }

    pub fn state(&self, name: &str) -> Option<&State> {
        self.states.get(name)
    }

    /// Triggers in evaluation order
    pub fn triggers(&self) -> &[Trigger] {
        &self.triggers
    }

    /// Seconds since the current state was entered
    pub fn time_in_state(&self) -> Option<f64> {
        self.current
            .as_ref()
            .map(|_| elapsed_secs(self.entered_at, self.clock.now()))
    }

    /// Forget the current state; the next tick enters the first state again
    pub fn reset(&mut self) {
        self.current = None;
        self.entered_at = self.clock.now();
    }
}

impl Default for StateMachine {
    fn default() -> Self {
        Self::new()
    }
}

fn cycle_step(state: &State, entered_at: DateTime<Utc>, now: DateTime<Utc>) -> Option<Step> {
    if state.operations.is_empty() {
        return None;
    }

    let elapsed_micros = (now - entered_at).num_microseconds().unwrap_or(i64::MAX).max(0);
    let index = (elapsed_micros / OPERATION_INTERVAL_MICROS) as usize % state.operations.len();

    let operation = &state.operations[index];
    trace!(state = %state.name, index, operation = %operation, "Cycling operation");
    Some(Step::new(operation.clone(), StepOrigin::Cycle { index }))
}
