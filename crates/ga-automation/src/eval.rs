//! Condition evaluation logic
//!
//! Runtime evaluation of leaf predicates and expression trees against the
//! current observation.

use chrono::{DateTime, Utc};
use ga_core::{epoch_secs, Observation};
use tracing::{debug, trace};

use crate::expr::Expr;
use crate::predicate::Predicate;

/// Context for condition evaluation
///
/// Carries the observation being evaluated and an optional time override
/// used for windowed presence checks.
#[derive(Debug, Clone, Copy)]
pub struct EvalContext<'a> {
    /// The observation under evaluation
    pub observation: &'a Observation,

    /// Override for current time (for testing and injected clocks)
    pub time_override: Option<DateTime<Utc>>,
}

impl<'a> EvalContext<'a> {
    /// Create a context over an observation
    pub fn new(observation: &'a Observation) -> Self {
        Self {
            observation,
            time_override: None,
        }
    }

    /// Set time override
    pub fn with_time(mut self, time: DateTime<Utc>) -> Self {
        self.time_override = Some(time);
        self
    }

    /// Get current time (or override if set)
    pub fn now(&self) -> DateTime<Utc> {
        self.time_override.unwrap_or_else(Utc::now)
    }
}

/// Condition evaluator
///
/// Stateless; predicates that cannot be evaluated read as false.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConditionEvaluator;

impl ConditionEvaluator {
    pub fn new() -> Self {
        Self
    }

    /// Evaluate a single leaf predicate
    pub fn evaluate(&self, predicate: &Predicate, observation: &Observation) -> bool {
        let result = match predicate {
            Predicate::TextPresent { text } => observation.full_text().contains(text.as_str()),
            Predicate::ButtonExists { text } => {
                observation.buttons().iter().any(|b| &b.text == text)
            }
            Predicate::IconExists { icon_type } => observation
                .icons()
                .iter()
                .any(|i| &i.icon_type == icon_type),
            Predicate::ProgressComplete => observation
                .progress_bars()
                .iter()
                .any(|p| p.progress >= 1.0),
            Predicate::MotionDetected => observation.motion().motion_detected,
            Predicate::ColorPresent { color } => observation.dominant_color() == Some(*color),
            Predicate::Unknown => {
                debug!("Unknown predicate type, treating as false");
                false
            }
        };

        trace!(%predicate, result, "Predicate result");
        result
    }

    /// Evaluate multiple predicates (all must pass)
    pub fn evaluate_all(&self, predicates: &[Predicate], observation: &Observation) -> bool {
        predicates
            .iter()
            .all(|predicate| self.evaluate(predicate, observation))
    }

    /// Evaluate an expression tree
    pub fn evaluate_expr(&self, expr: &Expr, ctx: &EvalContext<'_>) -> bool {
        match expr {
            Expr::All(parts) => parts.iter().all(|part| self.evaluate_expr(part, ctx)),
            Expr::Any(parts) => parts.iter().any(|part| self.evaluate_expr(part, ctx)),
            Expr::Not(inner) => !self.evaluate_expr(inner, ctx),
            Expr::Present { name } => ctx.observation.contains(name),
            Expr::Window {
                name,
                start,
                duration,
            } => self.eval_window(name, *start, *duration, ctx),
            Expr::InRange { name, min, max } => match range_value(ctx.observation, name) {
                Some(value) => *min <= value && value <= *max,
                None => false,
            },
            Expr::Unrecognized(text) => {
                trace!(text = %text, "Unrecognized condition, treating as false");
                false
            }
        }
    }

    /// Parse and evaluate an expression string
    pub fn evaluate_str(&self, source: &str, ctx: &EvalContext<'_>) -> bool {
        self.evaluate_expr(&Expr::parse(source), ctx)
    }

    fn eval_window(&self, name: &str, start: f64, duration: f64, ctx: &EvalContext<'_>) -> bool {
        if !ctx.observation.contains(name) {
            return false;
        }

        let entered_at = ctx.observation.entered_at(name).unwrap_or(0.0);
        let elapsed = epoch_secs(ctx.now()) - entered_at;
        let matches = start <= elapsed && elapsed < start + duration;

        trace!(fact = name, elapsed, start, duration, matches, "Window check result");
        matches
    }
}

/// Numeric reading of a fact for range checks; flags count as 1 or 0
fn range_value(observation: &Observation, name: &str) -> Option<f64> {
    match observation.get(name)? {
        serde_json::Value::Bool(flag) => Some(if *flag { 1.0 } else { 0.0 }),
        value => value.as_f64(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::{json, Value};

    fn observation(facts: Value) -> Observation {
        let Value::Object(map) = facts else {
            panic!("facts must be an object");
        };
        Observation::new(map, Utc::now())
    }

    fn check(source: &str, facts: Value) -> bool {
        let obs = observation(facts);
        ConditionEvaluator::new().evaluate_str(source, &EvalContext::new(&obs))
    }

    #[test]
    fn test_text_present() {
        let obs = observation(json!({"text_content": {"full_text": "Start button"}}));
        let evaluator = ConditionEvaluator::new();

        assert!(evaluator.evaluate(
            &Predicate::TextPresent {
                text: "Start".to_string()
            },
            &obs
        ));
        assert!(!evaluator.evaluate(
            &Predicate::TextPresent {
                text: "Quit".to_string()
            },
            &obs
        ));
    }

    #[test]
    fn test_visual_predicates() {
        let obs = observation(json!({
            "visual_elements": {
                "buttons": [{"text": "OK", "position": {"x": 10, "y": 20}}],
                "icons": [{"type": "sword", "position": {"x": 1, "y": 2}}],
                "progress_bars": [{"progress": 0.4}, {"progress": 1.0}]
            }
        }));
        let evaluator = ConditionEvaluator::new();

        assert!(evaluator.evaluate(
            &Predicate::ButtonExists {
                text: "OK".to_string()
            },
            &obs
        ));
        assert!(!evaluator.evaluate(
            &Predicate::ButtonExists {
                text: "Cancel".to_string()
            },
            &obs
        ));
        assert!(evaluator.evaluate(
            &Predicate::IconExists {
                icon_type: "sword".to_string()
            },
            &obs
        ));
        assert!(evaluator.evaluate(&Predicate::ProgressComplete, &obs));
    }

    #[test]
    fn test_progress_incomplete() {
        let obs = observation(json!({
            "visual_elements": {"progress_bars": [{"progress": 0.99}]}
        }));
        assert!(!ConditionEvaluator::new().evaluate(&Predicate::ProgressComplete, &obs));
    }

    #[test]
    fn test_motion_and_color() {
        let obs = observation(json!({
            "motion": {"motion_detected": true, "change_ratio": 0.3},
            "colors": {"dominant_color": [255, 0, 0]}
        }));
        let evaluator = ConditionEvaluator::new();

        assert!(evaluator.evaluate(&Predicate::MotionDetected, &obs));
        assert!(evaluator.evaluate(&Predicate::ColorPresent { color: [255, 0, 0] }, &obs));
        assert!(!evaluator.evaluate(&Predicate::ColorPresent { color: [255, 0, 1] }, &obs));

        let still = observation(json!({}));
        assert!(!evaluator.evaluate(&Predicate::MotionDetected, &still));
        assert!(!evaluator.evaluate(&Predicate::ColorPresent { color: [0, 0, 0] }, &still));
    }

    #[test]
    fn test_unknown_predicate_is_false() {
        let obs = observation(json!({"anything": true}));
        assert!(!ConditionEvaluator::new().evaluate(&Predicate::Unknown, &obs));
    }

    #[test]
    fn test_evaluate_all() {
        let obs = observation(json!({
            "text_content": {"full_text": "Victory"},
            "motion": {"motion_detected": false}
        }));
        let evaluator = ConditionEvaluator::new();
        let victory = Predicate::TextPresent {
            text: "Victory".to_string(),
        };

        assert!(evaluator.evaluate_all(&[], &obs));
        assert!(evaluator.evaluate_all(std::slice::from_ref(&victory), &obs));
        assert!(!evaluator.evaluate_all(&[victory, Predicate::MotionDetected], &obs));
    }

    #[test]
    fn test_and_expression() {
        assert!(!check("[a]&[b]", json!({"a": true})));
        assert!(check("[a]&[b]", json!({"a": true, "b": true})));
    }

    #[test]
    fn test_range_expression() {
        assert!(check("{x:0,10}", json!({"x": 5})));
        assert!(check("{x:0,10}", json!({"x": 10})));
        assert!(!check("{x:0,10}", json!({"x": 15})));
        assert!(!check("{x:0,10}", json!({})));
        assert!(!check("{x:0,10}", json!({"x": "5"})));
    }

    #[test]
    fn test_range_reads_flags_as_numbers() {
        assert!(check("{x:0,10}", json!({"x": true})));
        assert!(check("{x:0,0}", json!({"x": false})));
        assert!(!check("{x:2,10}", json!({"x": true})));
    }

    #[test]
    fn test_mixed_operators_and_first() {
        // [a] & ([b] | [c])
        assert!(check("[a]&[b]|[c]", json!({"a": 1, "c": 1})));
        assert!(!check("[a]&[b]|[c]", json!({"c": 1})));
        // ([a] | [b]) & [c]
        assert!(!check("[a]|[b]&[c]", json!({"a": 1})));
        assert!(check("[a]|[b]&[c]", json!({"b": 1, "c": 1})));
    }

    #[test]
    fn test_negation() {
        assert!(check("![danger]", json!({})));
        assert!(!check("![danger]", json!({"danger": true})));
        assert!(check("!![danger]", json!({"danger": false})));
        // Negating an unrecognized leaf holds
        assert!(check("!garbage", json!({})));
    }

    #[test]
    fn test_presence_ignores_value() {
        assert!(check("[flag]", json!({"flag": false})));
        assert!(check("[flag]", json!({"flag": null})));
    }

    #[test]
    fn test_unrecognized_is_false() {
        assert!(!check("", json!({})));
        assert!(!check("danger", json!({"danger": true})));
        assert!(!check("[a]&", json!({"a": true})));
    }

    #[test]
    fn test_window_expression() {
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
        let entered = epoch_secs(now) - 3.0;
        let obs = observation(json!({"boss": true, "boss_time": entered}));
        let evaluator = ConditionEvaluator::new();
        let ctx = EvalContext::new(&obs).with_time(now);

        assert!(evaluator.evaluate_str("[boss,2,5]", &ctx));
        assert!(evaluator.evaluate_str("[boss,3,1]", &ctx));
        assert!(!evaluator.evaluate_str("[boss,0,3]", &ctx));
        assert!(!evaluator.evaluate_str("[boss,4,10]", &ctx));
    }

    #[test]
    fn test_window_without_entry_time_uses_epoch() {
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
        let obs = observation(json!({"boss": true}));
        let evaluator = ConditionEvaluator::new();
        let ctx = EvalContext::new(&obs).with_time(now);

        assert!(!evaluator.evaluate_str("[boss,0,10]", &ctx));
        assert!(evaluator.evaluate_str("[boss,0,1e12]", &ctx));
        assert!(!evaluator.evaluate_str("[ghost,0,1e12]", &ctx));
    }
}
