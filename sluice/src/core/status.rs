//! Recipe state and stage kind enums.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The kind of stage at a position in the stage list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageKind {
    /// A stage that transforms, drops or fans out records.
    Filter,
    /// A stage that performs a side effect and passes records through.
    Emitter,
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Filter => write!(f, "filter"),
            Self::Emitter => write!(f, "emitter"),
        }
    }
}

/// The lifecycle state of a recipe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecipeState {
    /// The recipe has been built but never run.
    #[default]
    NotStarted,
    /// A run is in progress.
    Running,
    /// The source was exhausted and every record was drained.
    Completed,
    /// The run ended early on a fatal error or cancellation.
    Aborted,
}

impl fmt::Display for RecipeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotStarted => write!(f, "not_started"),
            Self::Running => write!(f, "running"),
            Self::Completed => write!(f, "completed"),
            Self::Aborted => write!(f, "aborted"),
        }
    }
}

impl RecipeState {
    /// Returns true if the state represents a finished run.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Aborted)
    }
}
