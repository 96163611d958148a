//! Error types for the sluice pipeline runner.
//!
//! Errors fall into three groups: configuration errors caught while a recipe
//! is built, source errors that abort a run, and stage errors raised while a
//! single record is being processed.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

/// The main error type for sluice operations.
#[derive(Debug, Error)]
pub enum SluiceError {
    /// A recipe failed validation.
    #[error("{0}")]
    Validation(#[from] RecipeValidationError),

    /// A source could not be opened or read.
    #[error("{0}")]
    Source(#[from] SourceError),

    /// A filter or emitter failed.
    #[error("{0}")]
    Stage(#[from] StageError),

    /// A run ended before the source was exhausted.
    #[error("Recipe '{recipe}' aborted at record {position} in '{stage}': {error}")]
    Aborted {
        /// The recipe name.
        recipe: String,
        /// The stage that caused the abort (`source` for source failures).
        stage: String,
        /// Zero-based position in the source stream.
        position: u64,
        /// The fatal error description.
        error: String,
    },

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for SluiceError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// Metadata about a configuration error for better diagnostics.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ContractErrorInfo {
    /// Error code (e.g., "RECIPE-NO-EMITTER").
    pub code: String,
    /// Short summary of the error.
    pub summary: String,
    /// Hint for fixing the error.
    pub fix_hint: Option<String>,
    /// Additional context key-value pairs.
    #[serde(default)]
    pub context: HashMap<String, String>,
}

impl ContractErrorInfo {
    /// Creates a new contract error info.
    #[must_use]
    pub fn new(code: impl Into<String>, summary: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            summary: summary.into(),
            fix_hint: None,
            context: HashMap::new(),
        }
    }

    /// Sets the fix hint.
    #[must_use]
    pub fn with_fix_hint(mut self, hint: impl Into<String>) -> Self {
        self.fix_hint = Some(hint.into());
        self
    }

    /// Adds a single context entry.
    #[must_use]
    pub fn with_context_entry(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }
}

/// Error raised when a recipe or one of its collaborators is misconfigured.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct RecipeValidationError {
    /// The error message.
    pub message: String,
    /// Optional contract error info.
    pub error_info: Option<ContractErrorInfo>,
}

impl RecipeValidationError {
    /// Creates a new validation error.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            error_info: None,
        }
    }

    /// Sets the contract error info.
    #[must_use]
    pub fn with_error_info(mut self, info: ContractErrorInfo) -> Self {
        self.error_info = Some(info);
        self
    }

    /// Creates an error for an invalid collaborator or recipe setting.
    #[must_use]
    pub fn invalid_config(component: &str, message: impl Into<String>) -> Self {
        let message = message.into();
        Self::new(format!("Invalid configuration for '{component}': {message}")).with_error_info(
            ContractErrorInfo::new("RECIPE-INVALID-CONFIG", message)
                .with_context_entry("component", component),
        )
    }

    /// Returns the error code, if any.
    #[must_use]
    pub fn code(&self) -> Option<&str> {
        self.error_info.as_ref().map(|info| info.code.as_str())
    }
}

/// Errors raised by a source while opening or reading.
#[derive(Debug, Error)]
pub enum SourceError {
    /// The underlying resource could not be opened.
    #[error("Failed to open source '{name}': {message}")]
    Open {
        /// The source name.
        name: String,
        /// What went wrong.
        message: String,
    },

    /// A record could not be read.
    #[error("Failed to read from source '{name}': {message}")]
    Read {
        /// The source name.
        name: String,
        /// What went wrong.
        message: String,
    },

    /// A line of input could not be parsed into a record.
    #[error("Malformed record on line {line} of '{name}': {message}")]
    Parse {
        /// The source name.
        name: String,
        /// One-based line number.
        line: u64,
        /// Parser message.
        message: String,
    },

    /// The source was already traversed and cannot be restarted.
    #[error("Source '{name}' has already been consumed")]
    AlreadyConsumed {
        /// The source name.
        name: String,
    },

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl SourceError {
    /// Creates an open error.
    #[must_use]
    pub fn open(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Open {
            name: name.into(),
            message: message.into(),
        }
    }

    /// Creates a read error.
    #[must_use]
    pub fn read(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Read {
            name: name.into(),
            message: message.into(),
        }
    }
}

/// An error raised by a filter or emitter while handling one record.
///
/// Stage errors are non-fatal unless marked otherwise: the recipe records
/// them and moves on to the next record.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{message}")]
pub struct StageError {
    /// The error message.
    pub message: String,
    /// Error type name (e.g. "ValidationError").
    pub kind: String,
    /// Whether the error should abort the run (or detach an emitter).
    pub fatal: bool,
}

impl StageError {
    /// Creates a non-fatal stage error.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            kind: "Error".to_string(),
            fatal: false,
        }
    }

    /// Creates a fatal stage error.
    #[must_use]
    pub fn fatal(message: impl Into<String>) -> Self {
        Self::new(message).into_fatal()
    }

    /// Creates a validation error for a record that failed a check.
    #[must_use]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(message).with_kind("ValidationError")
    }

    /// Sets the error type name.
    #[must_use]
    pub fn with_kind(mut self, kind: impl Into<String>) -> Self {
        self.kind = kind.into();
        self
    }

    /// Marks the error as fatal.
    #[must_use]
    pub fn into_fatal(mut self) -> Self {
        self.fatal = true;
        self
    }
}

impl From<anyhow::Error> for StageError {
    fn from(err: anyhow::Error) -> Self {
        Self::new(format!("{err:#}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contract_error_info_creation() {
        let info = ContractErrorInfo::new("TEST-001", "Test error")
            .with_fix_hint("Fix this by doing that")
            .with_context_entry("stage", "my_stage");

        assert_eq!(info.code, "TEST-001");
        assert_eq!(info.summary, "Test error");
        assert_eq!(info.fix_hint, Some("Fix this by doing that".to_string()));
        assert_eq!(info.context.get("stage"), Some(&"my_stage".to_string()));
    }

    #[test]
    fn test_invalid_config_code() {
        let err = RecipeValidationError::invalid_config("count", "every must be positive");
        assert_eq!(err.code(), Some("RECIPE-INVALID-CONFIG"));
        assert!(err.to_string().contains("'count'"));
    }

    #[test]
    fn test_stage_error_from_anyhow() {
        let err: StageError = anyhow::anyhow!("bad value").context("parsing amount").into();
        assert_eq!(err.message, "parsing amount: bad value");
        assert!(!err.fatal);
    }

    #[test]
    fn test_stage_error_builders() {
        let err = StageError::validation("duplicate id").into_fatal();
        assert_eq!(err.kind, "ValidationError");
        assert!(err.fatal);
        assert!(StageError::fatal("boom").fatal);
    }

    #[test]
    fn test_source_error_display() {
        let err = SourceError::Parse {
            name: "lines".to_string(),
            line: 3,
            message: "expected value".to_string(),
        };
        assert_eq!(err.to_string(), "Malformed record on line 3 of 'lines': expected value");
    }
}
