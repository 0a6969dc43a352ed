//! Bot configuration
//!
//! Parses the top-level document that wires the decision core together:
//! which engines run, where their rule/state files live, the tick cadence,
//! and the recording/replay settings.

use serde::{Deserialize, Serialize};
use serde_yaml::Value;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{ConfigError, ConfigResult};
use crate::loader::{from_yaml_value, YamlLoader};

/// Which decision engines a tick consults
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum EngineMode {
    /// Rule engine only
    Rules,
    /// State machine only
    StateMachine,
    /// Rule engine first, state machine when no rule matches
    #[default]
    Both,
}

impl EngineMode {
    pub fn uses_rules(self) -> bool {
        matches!(self, EngineMode::Rules | EngineMode::Both)
    }

    pub fn uses_state_machine(self) -> bool {
        matches!(self, EngineMode::StateMachine | EngineMode::Both)
    }
}

/// Operation recording settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordingConfig {
    /// Record dispatched actions from the first tick
    #[serde(default)]
    pub enabled: bool,

    /// Where the recording is saved on shutdown
    #[serde(default = "default_recording_path")]
    pub path: PathBuf,
}

impl Default for RecordingConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            path: default_recording_path(),
        }
    }
}

/// Top-level bot configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BotConfig {
    /// Tick cadence; 10 Hz or more resolves the 0.1 s operation quantum
    #[serde(default = "default_tick_rate_hz")]
    pub tick_rate_hz: f64,

    /// Observations older than this are not evaluated
    #[serde(default = "default_max_observation_age_secs")]
    pub max_observation_age_secs: f64,

    /// Which engines to consult each tick
    #[serde(default)]
    pub engine: EngineMode,

    /// JSON rule file for the rule engine
    #[serde(default)]
    pub rules_path: Option<PathBuf>,

    /// YAML state/trigger file for the state machine
    #[serde(default)]
    pub state_machine_path: Option<PathBuf>,

    #[serde(default)]
    pub recording: RecordingConfig,

    /// When set, the bot replays this recording instead of ticking
    #[serde(default)]
    pub replay_path: Option<PathBuf>,

    /// Default log filter when RUST_LOG is not set
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_tick_rate_hz() -> f64 {
    10.0
}

fn default_max_observation_age_secs() -> f64 {
    1.0
}

fn default_recording_path() -> PathBuf {
    PathBuf::from("recording.json")
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            tick_rate_hz: default_tick_rate_hz(),
            max_observation_age_secs: default_max_observation_age_secs(),
            engine: EngineMode::default(),
            rules_path: None,
            state_machine_path: None,
            recording: RecordingConfig::default(),
            replay_path: None,
            log_level: default_log_level(),
        }
    }
}

impl BotConfig {
    /// Load the bot configuration from a YAML file
    ///
    /// Relative paths inside the document resolve against the file's
    /// directory.
    pub fn load(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        let base_dir = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));

        let file_name = path.file_name().map(Path::new).unwrap_or(path);

        let yaml = YamlLoader::new(&base_dir).load_file(file_name)?;
        let mut config = Self::from_yaml(yaml)?;
        config.resolve_paths(&base_dir);
        Ok(config)
    }

    /// Parse and validate the configuration from a YAML value
    pub fn from_yaml(yaml: Value) -> ConfigResult<Self> {
        let config: BotConfig = match yaml {
            Value::Null => BotConfig::default(),
            Value::Mapping(_) => from_yaml_value(yaml, "bot")?,
            _ => {
                return Err(ConfigError::InvalidValue {
                    key: "root".to_string(),
                    reason: "configuration must be a mapping".to_string(),
                })
            }
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> ConfigResult<()> {
        if !(self.tick_rate_hz.is_finite() && self.tick_rate_hz > 0.0) {
            return Err(ConfigError::InvalidValue {
                key: "tick_rate_hz".to_string(),
                reason: format!("must be a positive number, got {}", self.tick_rate_hz),
            });
        }

        if !(self.max_observation_age_secs.is_finite() && self.max_observation_age_secs >= 0.0) {
            return Err(ConfigError::InvalidValue {
                key: "max_observation_age_secs".to_string(),
                reason: format!(
                    "must be a non-negative number, got {}",
                    self.max_observation_age_secs
                ),
            });
        }

        Ok(())
    }

    fn resolve_paths(&mut self, base_dir: &Path) {
        let resolve = |p: &mut PathBuf| {
            if p.is_relative() {
                *p = base_dir.join(&*p);
            }
        };

        if let Some(p) = self.rules_path.as_mut() {
            resolve(p);
        }
        if let Some(p) = self.state_machine_path.as_mut() {
            resolve(p);
        }
        if let Some(p) = self.replay_path.as_mut() {
            resolve(p);
        }
        resolve(&mut self.recording.path);
    }

    /// Time between ticks
    pub fn tick_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.tick_rate_hz)
    }
}
