//! Decision core glue
//!
//! Wires the rule engine, the state machine and the operation recorder into
//! a single per-tick pipeline, and drives it from a stream of JSON-line
//! observations.
//!
//! # Key Types
//!
//! - [`DecisionCore`] - Chooses, dispatches and records one action per tick
//! - [`ActionDispatcher`] - Where chosen actions go
//! - [`run_live`] - The interval-driven tick loop

pub mod decision;
pub mod dispatch;
pub mod runner;

pub use decision::DecisionCore;
pub use dispatch::{ActionDispatcher, DispatchError, DispatchResult, JsonLinesDispatcher};
pub use runner::{read_observations, run_live};
