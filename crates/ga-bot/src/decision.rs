//! Decision core
//!
//! Combines the rule engine, the state machine and the recorder into the
//! per-tick pipeline:
//!
//! ```text
//! Observation → RuleEngine (or StateMachine) → Action → ActionDispatcher
//!                                                     ↘ OperationRecorder
//! ```

use chrono::{DateTime, Utc};
use ga_automation::RuleEngine;
use ga_config::{BotConfig, EngineMode};
use ga_core::{Action, Clock, Observation};
use ga_recorder::{OperationRecorder, RecorderResult};
use ga_state_machine::StateMachine;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::dispatch::ActionDispatcher;

/// The per-tick decision pipeline
pub struct DecisionCore {
    mode: EngineMode,
    rules: RuleEngine,
    machine: StateMachine,
    recorder: OperationRecorder,
    clock: Arc<dyn Clock>,
    max_observation_age_secs: f64,
    /// Capture time of the newest observation evaluated so far
    last_captured_at: Option<DateTime<Utc>>,
}

impl DecisionCore {
    /// Create a core with empty engines
    pub fn new(mode: EngineMode, clock: Arc<dyn Clock>) -> Self {
        Self {
            mode,
            rules: RuleEngine::with_clock(clock.clone()),
            machine: StateMachine::with_clock(clock.clone()),
            recorder: OperationRecorder::with_clock(clock.clone()),
            clock,
            max_observation_age_secs: BotConfig::default().max_observation_age_secs,
            last_captured_at: None,
        }
    }

    /// Build a core from the bot configuration, loading rule and state files
    ///
    /// Load failures are logged and leave the affected engine empty.
    pub fn from_config(config: &BotConfig, clock: Arc<dyn Clock>) -> Self {
        let mut core = Self::new(config.engine, clock)
            .with_max_observation_age(config.max_observation_age_secs);

        if config.engine.uses_rules() {
            match &config.rules_path {
                Some(path) => {
                    core.rules.load_rules(path);
                }
                None => warn!("Rule engine enabled without rules_path"),
            }
        }

        if config.engine.uses_state_machine() {
            match &config.state_machine_path {
                Some(path) => {
                    core.machine.load_config(path);
                }
                None => warn!("State machine enabled without state_machine_path"),
            }
        }

        if config.recording.enabled {
            core.recorder.start_recording();
        }

        info!(
            mode = ?core.mode,
            rules = core.rules.len(),
            states = core.machine.state_names().count(),
            recording = core.recorder.is_recording(),
            "Decision core ready"
        );
        core
    }

    /// Observations older than this many seconds are skipped
    pub fn with_max_observation_age(mut self, secs: f64) -> Self {
        self.max_observation_age_secs = secs;
        self
    }

    /// Choose the action for an observation without dispatching it
    ///
    /// Observations that are too old, or captured before one already
    /// evaluated, are skipped. Rules are consulted first; among matching
    /// rules the highest priority wins and ties go to the earlier rule. The
    /// state machine is only ticked when no rule matched.
    pub fn decide(&mut self, observation: &Observation) -> Option<Action> {
        let age = observation.age_secs(self.clock.now());
        if age > self.max_observation_age_secs {
            debug!(age, max = self.max_observation_age_secs, "Skipping stale observation");
            return None;
        }

        let captured_at = observation.captured_at();
        if let Some(last) = self.last_captured_at {
            if captured_at < last {
                debug!(%captured_at, newest = %last, "Skipping out-of-order observation");
                return None;
            }
        }
        self.last_captured_at = Some(captured_at);

        if self.mode.uses_rules() {
            let chosen = self
                .rules
                .evaluate(observation)
                .into_iter()
                .reduce(|best, next| if next.priority > best.priority { next } else { best });
            if chosen.is_some() {
                return chosen;
            }
        }

        if self.mode.uses_state_machine() {
            return self.machine.update(observation).map(|step| {
                debug!(operation = %step.operation, origin = %step.origin, "State machine step");
                step.into_action()
            });
        }

        None
    }

    /// Decide, dispatch and record one tick
    ///
    /// Dispatch failures are logged and recorded in the rule history; they
    /// never stop the loop.
    pub fn tick(
        &mut self,
        observation: &Observation,
        dispatcher: &mut dyn ActionDispatcher,
    ) -> Option<Action> {
        let action = self.decide(observation)?;

        let success = match dispatcher.dispatch(&action) {
            Ok(()) => true,
            Err(e) => {
                warn!(%action, error = %e, "Failed to dispatch action");
                false
            }
        };

        self.recorder.record_action(&action);
        self.rules.record_action(&action, success);
        Some(action)
    }

    /// Persist the recording
    pub fn save_recording(&self, path: impl AsRef<Path>) -> RecorderResult<()> {
        self.recorder.save(path)
    }

    pub fn mode(&self) -> EngineMode {
        self.mode
    }

    pub fn rules(&self) -> &RuleEngine {
        &self.rules
    }

    pub fn rules_mut(&mut self) -> &mut RuleEngine {
        &mut self.rules
    }

    pub fn machine(&self) -> &StateMachine {
        &self.machine
    }

    pub fn machine_mut(&mut self) -> &mut StateMachine {
        &mut self.machine
    }

    pub fn recorder(&self) -> &OperationRecorder {
        &self.recorder
    }

    pub fn recorder_mut(&mut self) -> &mut OperationRecorder {
        &mut self.recorder
    }
}
