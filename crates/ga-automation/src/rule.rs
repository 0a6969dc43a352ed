//! Rule engine
//!
//! A rule ties an AND-combined list of leaf predicates to an action. The
//! engine evaluates every rule against each observation and reports the
//! actions of those that match, in load order.

use chrono::{DateTime, Utc};
use ga_config::{read_json_file, write_json_file, ConfigError};
use ga_core::{Action, ActionRecord, Clock, Observation, Params, SystemClock};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::VecDeque;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, instrument, trace, warn};

use crate::eval::ConditionEvaluator;
use crate::predicate::Predicate;

/// Default bound on the dispatch history
pub const DEFAULT_MAX_HISTORY: usize = 1000;

/// Rule errors
#[derive(Debug, Error)]
pub enum RuleError {
    #[error("Invalid rule: {reason}")]
    InvalidRule { reason: String },

    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Result type for rule operations
pub type RuleResult<T> = Result<T, RuleError>;

/// A single decision rule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    /// Unique ID (auto-generated if not provided)
    #[serde(default = "generate_rule_id")]
    pub id: String,

    /// Human-readable description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Predicates that must all hold
    pub conditions: Vec<Predicate>,

    /// Action type to emit when the rule matches
    pub action_type: String,

    /// Parameters of the emitted action
    #[serde(default)]
    pub action_params: Params,

    /// Carried onto the emitted action; does not affect evaluation order
    #[serde(default)]
    pub priority: i64,
}

fn generate_rule_id() -> String {
    ulid::Ulid::new().to_string().to_lowercase()
}

impl Rule {
    /// Create a rule with no conditions
    pub fn new(action_type: impl Into<String>) -> Self {
        Self {
            id: generate_rule_id(),
            description: None,
            conditions: Vec::new(),
            action_type: action_type.into(),
            action_params: Params::new(),
            priority: 0,
        }
    }

    /// Add a condition
    pub fn with_condition(mut self, predicate: Predicate) -> Self {
        self.conditions.push(predicate);
        self
    }

    /// Set the action parameters
    pub fn with_params(mut self, params: Params) -> Self {
        self.action_params = params;
        self
    }

    /// Set the priority
    pub fn with_priority(mut self, priority: i64) -> Self {
        self.priority = priority;
        self
    }

    /// Validate and build a rule from a raw JSON record
    ///
    /// The record must carry a `conditions` list and an `action_type`.
    pub fn from_value(value: Value) -> RuleResult<Self> {
        let Value::Object(record) = &value else {
            return Err(RuleError::InvalidRule {
                reason: "rule must be an object".to_string(),
            });
        };

        if !record.get("conditions").is_some_and(Value::is_array) {
            return Err(RuleError::InvalidRule {
                reason: "missing conditions list".to_string(),
            });
        }
        if !record.contains_key("action_type") {
            return Err(RuleError::InvalidRule {
                reason: "missing action_type".to_string(),
            });
        }

        serde_json::from_value(value).map_err(|e| RuleError::InvalidRule {
            reason: e.to_string(),
        })
    }

    /// The action this rule emits
    pub fn action(&self) -> Action {
        Action::new(self.action_type.clone())
            .with_params(self.action_params.clone())
            .with_priority(self.priority)
    }

    /// Description if set, otherwise the ID
    pub fn display_name(&self) -> &str {
        self.description.as_deref().unwrap_or(&self.id)
    }
}

/// Evaluates an ordered rule list against observations
pub struct RuleEngine {
    rules: Vec<Rule>,
    evaluator: ConditionEvaluator,
    history: VecDeque<ActionRecord>,
    max_history: usize,
    clock: Arc<dyn Clock>,
}

impl RuleEngine {
    /// Create an empty engine on the system clock
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Create an empty engine with an injected clock
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            rules: Vec::new(),
            evaluator: ConditionEvaluator::new(),
            history: VecDeque::new(),
            max_history: DEFAULT_MAX_HISTORY,
            clock,
        }
    }

    /// Create an engine and load rules from a JSON file
    pub fn with_rules_file(path: impl AsRef<Path>) -> Self {
        let mut engine = Self::new();
        engine.load_rules(path);
        engine
    }

    /// Set the history bound
    pub fn with_max_history(mut self, max_history: usize) -> Self {
        self.max_history = max_history;
        self.trim_history();
        self
    }

    /// Replace the rule set from a JSON file
    ///
    /// A missing or malformed file leaves the engine with no rules. Returns
    /// the number of rules loaded.
    #[instrument(skip_all)]
    pub fn load_rules(&mut self, path: impl AsRef<Path>) -> usize {
        let path = path.as_ref();
        self.rules.clear();

        let document: Value = match read_json_file(path) {
            Ok(document) => document,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Failed to load rules, continuing with none");
                return 0;
            }
        };

        self.load_rules_value(document)
    }

    /// Replace the rule set from a parsed JSON document
    pub fn load_rules_value(&mut self, document: Value) -> usize {
        self.rules.clear();

        let Value::Array(records) = document else {
            warn!("Rule document is not a list, continuing with none");
            return 0;
        };

        for record in records {
            match Rule::from_value(record) {
                Ok(rule) => self.rules.push(rule),
                Err(e) => warn!(error = %e, "Skipping rule"),
            }
        }

        info!(count = self.rules.len(), "Loaded rules");
        self.rules.len()
    }

    /// Append a rule from a raw record
    ///
    /// Returns `false` and leaves the rule set untouched when the record is
    /// invalid.
    pub fn add_rule(&mut self, record: Value) -> bool {
        match Rule::from_value(record) {
            Ok(rule) => {
                self.add(rule);
                true
            }
            Err(e) => {
                debug!(error = %e, "Rejected rule");
                false
            }
        }
    }

    /// Append an already-built rule
    pub fn add(&mut self, rule: Rule) {
        debug!(id = %rule.id, action = %rule.action_type, "Added rule");
        self.rules.push(rule);
    }

    /// Actions of every rule whose conditions all hold, in rule order
    pub fn evaluate(&self, observation: &Observation) -> Vec<Action> {
        let actions: Vec<Action> = self
            .rules
            .iter()
            .filter(|rule| self.evaluator.evaluate_all(&rule.conditions, observation))
            .inspect(|rule| trace!(rule = rule.display_name(), "Rule matched"))
            .map(Rule::action)
            .collect();

        if !actions.is_empty() {
            debug!(matched = actions.len(), "Rules matched");
        }
        actions
    }

    /// Write the rule set as a JSON list
    pub fn save_rules(&self, path: impl AsRef<Path>) -> RuleResult<()> {
        write_json_file(path.as_ref(), &self.rules)?;
        info!(count = self.rules.len(), path = %path.as_ref().display(), "Saved rules");
        Ok(())
    }

    /// Record the dispatch outcome of an action
    pub fn record_action(&mut self, action: &Action, result: bool) {
        self.history
            .push_back(ActionRecord::new(action, result, self.now()));
        self.trim_history();
    }

    /// Dispatch history, oldest first
    pub fn history(&self) -> &VecDeque<ActionRecord> {
        &self.history
    }

    pub fn clear_history(&mut self) {
        self.history.clear();
    }

    pub fn max_history(&self) -> usize {
        self.max_history
    }

    /// Loaded rules in evaluation order
    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Remove all rules
    pub fn clear(&mut self) {
        self.rules.clear();
    }

    fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    fn trim_history(&mut self) {
        while self.history.len() > self.max_history {
            self.history.pop_front();
        }
    }
}

impl Default for RuleEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use ga_core::ManualClock;
    use serde_json::json;
    use std::fs;
    use tempfile::TempDir;

    fn observation(facts: Value) -> Observation {
        let Value::Object(map) = facts else {
            panic!("facts must be an object");
        };
        Observation::new(map, Utc::now())
    }

    fn start_rule() -> Value {
        json!({
            "conditions": [{"type": "text_present", "text": "Start"}],
            "action_type": "click",
            "action_params": {"x": 100, "y": 200}
        })
    }

    #[test]
    fn test_text_present_scenario() {
        let mut engine = RuleEngine::new();
        assert!(engine.add_rule(start_rule()));

        let actions = engine.evaluate(&observation(json!({
            "text_content": {"full_text": "Start button"}
        })));

        assert_eq!(actions.len(), 1);
        assert_eq!(actions[0].action_type, "click");
        assert_eq!(actions[0].params.get("x"), Some(&json!(100)));
        assert_eq!(actions[0].params.get("y"), Some(&json!(200)));
    }

    #[test]
    fn test_add_rule_rejects_incomplete_records() {
        let mut engine = RuleEngine::new();

        assert!(!engine.add_rule(json!({"action_type": "click"})));
        assert!(!engine.add_rule(json!({"conditions": []})));
        assert!(!engine.add_rule(json!({"conditions": {}, "action_type": "click"})));
        assert!(!engine.add_rule(json!(["not", "a", "rule"])));
        assert!(engine.is_empty());
    }

    #[test]
    fn test_evaluate_in_list_order() {
        let mut engine = RuleEngine::new();
        engine.add(Rule::new("low").with_priority(1));
        engine.add(Rule::new("high").with_priority(9));
        engine.add(Rule::new("never").with_condition(Predicate::MotionDetected));

        let actions = engine.evaluate(&observation(json!({})));
        let types: Vec<_> = actions.iter().map(|a| a.action_type.as_str()).collect();
        assert_eq!(types, vec!["low", "high"]);
        assert_eq!(actions[1].priority, 9);
    }

    #[test]
    fn test_empty_engine_evaluates_to_nothing() {
        let engine = RuleEngine::new();
        assert!(engine.evaluate(&observation(json!({"a": 1}))).is_empty());
    }

    #[test]
    fn test_unknown_predicate_never_matches() {
        let mut engine = RuleEngine::new();
        assert!(engine.add_rule(json!({
            "conditions": [{"type": "hp_below", "value": 30}],
            "action_type": "heal"
        })));
        assert!(engine.evaluate(&observation(json!({"hp": 10}))).is_empty());
    }

    #[test]
    fn test_generated_ids_are_unique() {
        let mut engine = RuleEngine::new();
        engine.add_rule(start_rule());
        engine.add_rule(start_rule());
        assert_ne!(engine.rules()[0].id, engine.rules()[1].id);
    }

    #[test]
    fn test_load_missing_file_gives_empty_set() {
        let dir = TempDir::new().unwrap();
        let mut engine = RuleEngine::new();
        engine.add_rule(start_rule());

        assert_eq!(engine.load_rules(dir.path().join("missing.json")), 0);
        assert!(engine.is_empty());
    }

    #[test]
    fn test_load_malformed_file_gives_empty_set() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("rules.json");
        fs::write(&path, "{ not json").unwrap();

        let engine = RuleEngine::with_rules_file(&path);
        assert!(engine.is_empty());

        fs::write(&path, r#"{"rules": []}"#).unwrap();
        let engine = RuleEngine::with_rules_file(&path);
        assert!(engine.is_empty());
    }

    #[test]
    fn test_load_skips_invalid_records() {
        let mut engine = RuleEngine::new();
        let loaded = engine.load_rules_value(json!([
            start_rule(),
            {"action_type": "orphan"},
            {"conditions": [{"type": "text_present"}], "action_type": "broken"},
            {"id": "fight", "conditions": [{"type": "motion_detected"}], "action_type": "attack"}
        ]));

        assert_eq!(loaded, 2);
        assert_eq!(engine.rules()[1].id, "fight");
    }

    #[test]
    fn test_save_then_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("rules.json");

        let mut engine = RuleEngine::new();
        engine.add_rule(start_rule());
        engine.add(
            Rule::new("retreat")
                .with_condition(Predicate::ColorPresent { color: [255, 0, 0] })
                .with_priority(5),
        );
        engine.save_rules(&path).unwrap();

        let reloaded = RuleEngine::with_rules_file(&path);
        assert_eq!(reloaded.rules(), engine.rules());
    }

    #[test]
    fn test_save_to_missing_directory_fails() {
        let dir = TempDir::new().unwrap();
        let engine = RuleEngine::new();
        let err = engine
            .save_rules(dir.path().join("no/such/rules.json"))
            .unwrap_err();
        assert!(matches!(err, RuleError::Config(ConfigError::WriteFile { .. })));
    }

    #[test]
    fn test_history_is_bounded() {
        let clock = Arc::new(ManualClock::at(
            Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
        ));
        let mut engine = RuleEngine::with_clock(clock.clone()).with_max_history(2);

        for name in ["a", "b", "c"] {
            engine.record_action(&Action::new(name), true);
            clock.advance_seconds(1);
        }

        let types: Vec<_> = engine
            .history()
            .iter()
            .map(|r| r.action_type.as_str())
            .collect();
        assert_eq!(types, vec!["b", "c"]);
        assert_eq!(
            engine.history()[1].timestamp,
            Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 2).unwrap()
        );

        engine.clear_history();
        assert!(engine.history().is_empty());
    }
}
