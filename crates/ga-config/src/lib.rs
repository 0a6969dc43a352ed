//! Configuration loading for the game automation core
//!
//! This crate provides YAML loading with a small set of custom tags, plain
//! JSON file helpers for rule sets and recordings, and the [`BotConfig`]
//! document that wires the decision core together.
//!
//! Supported YAML tags:
//!
//! - `!include path` - Include another YAML file
//! - `!include_dir_merge_list dir` - Merge lists from all YAML files in a directory
//! - `!env_var VAR` - Environment variable substitution
//!
//! # Example
//!
//! ```ignore
//! use ga_config::{load_yaml, BotConfig};
//!
//! let doc = load_yaml("/etc/bot", "battle.yaml")?;
//! let config = BotConfig::load("/etc/bot/bot.yaml")?;
//! ```

mod bot_config;
mod error;
mod json;
mod loader;

pub use bot_config::{BotConfig, EngineMode, RecordingConfig};
pub use error::{ConfigError, ConfigResult};
pub use json::{read_json_file, write_json_file};
pub use loader::{from_yaml_value, load_yaml, load_yaml_string, YamlLoader};

// Re-export serde_yaml::Value for convenience
pub use serde_yaml::Value;
