//! Core types for the game automation core
//!
//! This crate provides the fundamental value types shared by every other
//! crate in the workspace: the per-tick [`Observation`], the chosen
//! [`Action`], the [`RecordedOperation`] log entry, and the [`Clock`]
//! abstraction used for every elapsed-time computation.

mod action;
mod clock;
mod observation;

pub use action::{Action, ActionRecord, Params, RecordedOperation};
pub use clock::{elapsed_secs, epoch_secs, from_epoch_secs, Clock, ManualClock, SystemClock};
pub use observation::{
    Button, Icon, Motion, Observation, ObservationError, Position, ProgressBar, VisualElements,
};

/// Well-known observation keys produced by the vision collaborator
pub mod keys {
    /// Recognized text block (`{"full_text": "..."}`)
    pub const TEXT_CONTENT: &str = "text_content";

    /// Detected buttons, icons and progress bars
    pub const VISUAL_ELEMENTS: &str = "visual_elements";

    /// Frame-difference motion report
    pub const MOTION: &str = "motion";

    /// Color analysis (`{"dominant_color": [r, g, b]}`)
    pub const COLORS: &str = "colors";

    /// Suffix of the fact holding the entry timestamp of a named fact
    pub const ENTERED_AT_SUFFIX: &str = "_time";
}
