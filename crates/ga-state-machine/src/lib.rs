//! Operation state machine
//!
//! This crate provides the StateMachine, which sequences multi-step game
//! operations. States play back their operation lists on a fixed cadence,
//! move along condition-guarded transitions, and fall back to the first
//! state on timeout. Global triggers interrupt all of that by priority.
//!
//! Conditions use the expression dialect from `ga-automation`; the
//! configuration is a YAML document loaded through `ga-config`.

pub mod config;
pub mod machine;

pub use config::{
    State, StateConfig, StateMachineConfig, StateMachineError, StateMachineResult, Transition,
    Trigger, TriggerConfig,
};
pub use machine::{StateMachine, Step, StepOrigin, OPERATION_INTERVAL_MICROS};
