//! Decision rules
//!
//! This crate provides the condition language and the rule engine of the
//! decision core.
//!
//! # Architecture
//!
//! ```text
//! RULE = PREDICATES (all) → ACTION
//! ```
//!
//! - **Predicates**: structured leaf tests over an observation (text, buttons,
//!   icons, progress, motion, color)
//! - **Expressions**: the compact `&`/`|`/`!` string dialect used by state
//!   machine triggers and transitions
//! - **Rules**: predicate lists mapped to actions, evaluated in load order
//!
//! # Key Types
//!
//! - [`Predicate`] - Leaf test used by rules
//! - [`Expr`] / [`ConditionExpr`] - Parsed expression dialect
//! - [`ConditionEvaluator`] - Evaluates both against an observation
//! - [`RuleEngine`] - Holds and evaluates the rule list

pub mod eval;
pub mod expr;
pub mod predicate;
pub mod rule;

pub use eval::{ConditionEvaluator, EvalContext};
pub use expr::{ConditionExpr, Expr};
pub use predicate::Predicate;
pub use rule::{Rule, RuleEngine, RuleError, RuleResult, DEFAULT_MAX_HISTORY};
