//! Recipe configuration.

use super::failure_tolerance::{EmitterFailurePolicy, FailureMode};
use crate::errors::RecipeValidationError;
use serde::{Deserialize, Serialize};

/// Run-time options for a recipe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RecipeConfig {
    /// Recipe name, used in logs, events and reports.
    #[serde(default = "default_name")]
    pub name: String,
    /// How per-record failures are handled.
    #[serde(default)]
    pub failure_mode: FailureMode,
    /// What a fatal emitter error does.
    #[serde(default)]
    pub emitter_policy: EmitterFailurePolicy,
    /// Maximum number of error records kept per run; `None` keeps all.
    #[serde(default = "default_error_capacity")]
    pub error_capacity: Option<usize>,
}

fn default_name() -> String {
    "recipe".to_string()
}

#[allow(clippy::unnecessary_wraps)]
fn default_error_capacity() -> Option<usize> {
    Some(10_000)
}

impl Default for RecipeConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            failure_mode: FailureMode::default(),
            emitter_policy: EmitterFailurePolicy::default(),
            error_capacity: default_error_capacity(),
        }
    }
}

impl RecipeConfig {
    /// Creates a configuration with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the recipe name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Sets the failure mode.
    #[must_use]
    pub const fn with_failure_mode(mut self, mode: FailureMode) -> Self {
        self.failure_mode = mode;
        self
    }

    /// Shorthand for [`FailureMode::FailFast`].
    #[must_use]
    pub const fn fail_fast(self) -> Self {
        self.with_failure_mode(FailureMode::FailFast)
    }

    /// Sets the emitter failure policy.
    #[must_use]
    pub const fn with_emitter_policy(mut self, policy: EmitterFailurePolicy) -> Self {
        self.emitter_policy = policy;
        self
    }

    /// Sets the error capacity; `None` keeps every error.
    #[must_use]
    pub const fn with_error_capacity(mut self, capacity: Option<usize>) -> Self {
        self.error_capacity = capacity;
        self
    }

    /// Parses a configuration from JSON. Missing fields take defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the document is malformed or invalid.
    pub fn from_json_str(json: &str) -> Result<Self, RecipeValidationError> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| RecipeValidationError::invalid_config("recipe", e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Checks the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is empty.
    pub fn validate(&self) -> Result<(), RecipeValidationError> {
        if self.name.trim().is_empty() {
            return Err(RecipeValidationError::invalid_config(
                "recipe",
                "name must not be empty",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_defaults() {
        let config = RecipeConfig::default();
        assert_eq!(config.name, "recipe");
        assert_eq!(config.failure_mode, FailureMode::ContinueOnFailure);
        assert_eq!(config.emitter_policy, EmitterFailurePolicy::Detach);
        assert_eq!(config.error_capacity, Some(10_000));
    }

    #[test]
    fn test_from_json_partial() {
        let config = RecipeConfig::from_json_str(r#"{"name": "orders", "failure_mode": "fail_fast"}"#).unwrap();
        assert_eq!(
            config,
            RecipeConfig::new().with_name("orders").fail_fast()
        );
    }

    #[test]
    fn test_from_json_unbounded_errors() {
        let config = RecipeConfig::from_json_str(r#"{"error_capacity": null, "emitter_policy": "abort"}"#).unwrap();
        assert_eq!(config.error_capacity, None);
        assert_eq!(config.emitter_policy, EmitterFailurePolicy::Abort);
    }

    #[test]
    fn test_from_json_rejects_bad_documents() {
        for json in [r#"{"failure_mode": "sometimes"}"#, r#"{"colour": "red"}"#, "[1,2]", r#"{"name": " "}"#] {
            let err = RecipeConfig::from_json_str(json).unwrap_err();
            assert_eq!(err.code(), Some("RECIPE-INVALID-CONFIG"), "{json}");
        }
    }
}
