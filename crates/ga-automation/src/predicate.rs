//! Structured leaf predicates
//!
//! Predicates are the condition records used by rules. Each one tests a
//! single property of the current observation; a rule's predicates are
//! AND-combined.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Leaf predicate over an observation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Predicate {
    /// Text is a substring of the recognized screen text
    TextPresent { text: String },

    /// A button with this label is visible
    ButtonExists { text: String },

    /// An icon of this type is visible
    IconExists { icon_type: String },

    /// Some progress bar is full
    ProgressComplete,

    /// Motion was detected between frames
    MotionDetected,

    /// The dominant screen color equals this RGB triple
    ColorPresent { color: [u8; 3] },

    /// Any predicate type this engine does not know; never holds
    #[serde(other)]
    Unknown,
}

impl Predicate {
    /// The `type` tag of this predicate
    pub fn kind(&self) -> &'static str {
        match self {
            Predicate::TextPresent { .. } => "text_present",
            Predicate::ButtonExists { .. } => "button_exists",
            Predicate::IconExists { .. } => "icon_exists",
            Predicate::ProgressComplete => "progress_complete",
            Predicate::MotionDetected => "motion_detected",
            Predicate::ColorPresent { .. } => "color_present",
            Predicate::Unknown => "unknown",
        }
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Predicate::TextPresent { text } | Predicate::ButtonExists { text } => {
                write!(f, "{}({:?})", self.kind(), text)
            }
            Predicate::IconExists { icon_type } => write!(f, "{}({:?})", self.kind(), icon_type),
            Predicate::ColorPresent { color: [r, g, b] } => {
                write!(f, "{}({}, {}, {})", self.kind(), r, g, b)
            }
            _ => f.write_str(self.kind()),
        }
    }
}
