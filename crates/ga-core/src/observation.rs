//! Observation type representing one snapshot of the observed game screen

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::debug;

use crate::clock::{elapsed_secs, from_epoch_secs};
use crate::keys;

/// Error type for observations that cannot be built
#[derive(Debug, Error)]
pub enum ObservationError {
    #[error("observation must be a JSON object, got {0}")]
    NotAnObject(&'static str),

    #[error("failed to parse observation: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Screen position of a detected element
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    #[serde(default)]
    pub x: f64,
    #[serde(default)]
    pub y: f64,
}

/// A detected button
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Button {
    /// Recognized label
    #[serde(default)]
    pub text: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<Position>,
}

/// A detected icon
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Icon {
    /// Icon classification (e.g. "close", "settings")
    #[serde(rename = "type", default)]
    pub icon_type: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<Position>,
}

/// A detected progress bar
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ProgressBar {
    /// Fill ratio, 1.0 meaning complete
    #[serde(default, alias = "value")]
    pub progress: f64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<Position>,
}

/// The `visual_elements` block of an observation
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct VisualElements {
    #[serde(default)]
    pub buttons: Vec<Button>,
    #[serde(default)]
    pub icons: Vec<Icon>,
    #[serde(default)]
    pub progress_bars: Vec<ProgressBar>,
}

/// The `motion` block of an observation
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Motion {
    #[serde(default)]
    pub motion_detected: bool,
    #[serde(default)]
    pub change_ratio: f64,
}

#[derive(Debug, Default, Deserialize)]
struct TextContent {
    #[serde(default)]
    full_text: String,
}

#[derive(Debug, Default, Deserialize)]
struct Colors {
    #[serde(default)]
    dominant_color: Option<[u8; 3]>,
}

/// A structured snapshot of observed game state
///
/// An observation is a free-form mapping from named facts to JSON values,
/// plus the instant it was captured. The well-known blocks produced by the
/// vision collaborator (recognized text, visual elements, motion, colors) are
/// parsed once at construction; a malformed block reads as empty rather than
/// failing the whole observation.
#[derive(Debug, Clone)]
pub struct Observation {
    facts: Map<String, Value>,
    captured_at: DateTime<Utc>,
    full_text: String,
    visual: VisualElements,
    motion: Motion,
    dominant_color: Option<[u8; 3]>,
}

impl Observation {
    /// Create an observation from a fact mapping
    pub fn new(facts: Map<String, Value>, captured_at: DateTime<Utc>) -> Self {
        let full_text = parse_block::<TextContent>(&facts, keys::TEXT_CONTENT).full_text;
        let visual = parse_block::<VisualElements>(&facts, keys::VISUAL_ELEMENTS);
        let motion = parse_block::<Motion>(&facts, keys::MOTION);
        let dominant_color = parse_block::<Colors>(&facts, keys::COLORS).dominant_color;

        Self {
            facts,
            captured_at,
            full_text,
            visual,
            motion,
            dominant_color,
        }
    }

    /// Create an empty observation
    pub fn empty(captured_at: DateTime<Utc>) -> Self {
        Self::new(Map::new(), captured_at)
    }

    /// Create an observation from a JSON value
    ///
    /// A numeric top-level `timestamp` field (Unix seconds) is taken as the
    /// capture time; otherwise `received_at` is used.
    pub fn from_value(value: Value, received_at: DateTime<Utc>) -> Result<Self, ObservationError> {
        let facts = match value {
            Value::Object(map) => map,
            Value::Null => return Err(ObservationError::NotAnObject("null")),
            Value::Bool(_) => return Err(ObservationError::NotAnObject("bool")),
            Value::Number(_) => return Err(ObservationError::NotAnObject("number")),
            Value::String(_) => return Err(ObservationError::NotAnObject("string")),
            Value::Array(_) => return Err(ObservationError::NotAnObject("array")),
        };

        let captured_at = facts
            .get("timestamp")
            .and_then(Value::as_f64)
            .and_then(from_epoch_secs)
            .unwrap_or(received_at);

        Ok(Self::new(facts, captured_at))
    }

    /// Parse an observation from a JSON document
    pub fn from_json_str(s: &str, received_at: DateTime<Utc>) -> Result<Self, ObservationError> {
        let value: Value = serde_json::from_str(s)?;
        Self::from_value(value, received_at)
    }

    /// All raw facts
    pub fn facts(&self) -> &Map<String, Value> {
        &self.facts
    }

    /// Get a raw fact
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.facts.get(name)
    }

    /// Check whether a fact is present
    pub fn contains(&self, name: &str) -> bool {
        self.facts.contains_key(name)
    }

    /// Get a fact as a number, if it is numeric
    pub fn number(&self, name: &str) -> Option<f64> {
        self.facts.get(name).and_then(Value::as_f64)
    }

    /// Entry timestamp (Unix seconds) recorded for a named fact
    ///
    /// Read from the companion fact `<name>_time`.
    pub fn entered_at(&self, name: &str) -> Option<f64> {
        self.number(&format!("{name}{}", keys::ENTERED_AT_SUFFIX))
    }

    /// Full recognized text, empty when none was recognized
    pub fn full_text(&self) -> &str {
        &self.full_text
    }

    /// Detected buttons
    pub fn buttons(&self) -> &[Button] {
        &self.visual.buttons
    }

    /// Detected icons
    pub fn icons(&self) -> &[Icon] {
        &self.visual.icons
    }

    /// Detected progress bars
    pub fn progress_bars(&self) -> &[ProgressBar] {
        &self.visual.progress_bars
    }

    /// Motion report
    pub fn motion(&self) -> Motion {
        self.motion
    }

    /// Dominant color as an RGB triple
    pub fn dominant_color(&self) -> Option<[u8; 3]> {
        self.dominant_color
    }

    /// When this snapshot was captured
    pub fn captured_at(&self) -> DateTime<Utc> {
        self.captured_at
    }

    /// Seconds between capture and `now`
    pub fn age_secs(&self, now: DateTime<Utc>) -> f64 {
        elapsed_secs(self.captured_at, now)
    }
}

fn parse_block<T>(facts: &Map<String, Value>, key: &str) -> T
where
    T: for<'de> Deserialize<'de> + Default,
{
    let Some(value) = facts.get(key) else {
        return T::default();
    };

    serde_json::from_value(value.clone()).unwrap_or_else(|e| {
        debug!(key, error = %e, "Ignoring malformed observation block");
        T::default()
    })
}
