//! Run results.

use super::failure_tolerance::ErrorRecord;
use crate::core::RecipeState;
use crate::errors::SluiceError;
use crate::utils::Timestamp;
use serde::Serialize;
use std::fmt;
use uuid::Uuid;

/// Why a run aborted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AbortReason {
    /// The source failed to open or read.
    SourceFailure,
    /// A stage failed under a fatal policy.
    StageFailure,
    /// The run was cancelled.
    Cancelled,
}

impl fmt::Display for AbortReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SourceFailure => write!(f, "source_failure"),
            Self::StageFailure => write!(f, "stage_failure"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// The fatal error that ended a run, and where.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AbortInfo {
    /// What kind of failure.
    pub reason: AbortReason,
    /// Index of the failing stage; `None` for source failures and
    /// cancellation.
    pub stage_index: Option<usize>,
    /// Name of the failing stage or source.
    pub stage_name: String,
    /// Error message.
    pub error: String,
    /// Stream position: the record being processed, or for source failures
    /// and cancellation the number of records pulled so far.
    pub position: u64,
}

/// Outcome of one recipe run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    /// Unique id of this run.
    pub run_id: Uuid,
    /// Recipe name.
    pub recipe: String,
    /// Final state: `Completed` or `Aborted`.
    pub state: RecipeState,
    /// Records pulled from the source.
    pub records_pulled: u64,
    /// Source records fully traversed without any error. Dropped records
    /// count as completed.
    pub records_completed: u64,
    /// Source records with at least one error in their traversal.
    pub records_failed: u64,
    /// Retained error records, in the order they happened.
    pub errors: Vec<ErrorRecord>,
    /// Error records dropped once the error capacity was reached.
    pub errors_discarded: u64,
    /// Set when the run aborted.
    pub abort: Option<AbortInfo>,
    /// Emitter finalize failures, as `(emitter, message)`.
    pub finalize_errors: Vec<(String, String)>,
    /// When the run started.
    pub started_at: Timestamp,
    /// When the run ended.
    pub finished_at: Timestamp,
    /// Run duration in milliseconds.
    pub duration_ms: u64,
}

impl RunReport {
    /// Returns true if the run completed.
    #[must_use]
    pub fn is_completed(&self) -> bool {
        self.state == RecipeState::Completed
    }

    /// Returns true if the run aborted.
    #[must_use]
    pub fn is_aborted(&self) -> bool {
        self.state == RecipeState::Aborted
    }

    /// Returns true if the run completed with no errors of any kind.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.is_completed()
            && self.errors.is_empty()
            && self.errors_discarded == 0
            && self.finalize_errors.is_empty()
    }

    /// Converts an aborted report into an error.
    ///
    /// # Errors
    ///
    /// Returns [`SluiceError::Aborted`] if the run aborted.
    pub fn into_result(self) -> Result<Self, SluiceError> {
        match &self.abort {
            Some(abort) => Err(SluiceError::Aborted {
                recipe: self.recipe.clone(),
                stage: abort.stage_name.clone(),
                position: abort.position,
                error: abort.error.clone(),
            }),
            None => Ok(self),
        }
    }

    /// Summarizes the report as JSON, without the error records.
    #[must_use]
    pub fn summary(&self) -> serde_json::Value {
        serde_json::json!({
            "run_id": self.run_id.to_string(),
            "recipe": self.recipe,
            "state": self.state,
            "records_pulled": self.records_pulled,
            "records_completed": self.records_completed,
            "records_failed": self.records_failed,
            "errors": self.errors.len() as u64 + self.errors_discarded,
            "abort": self.abort,
            "duration_ms": self.duration_ms,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::{generate_run_id, now_utc};

    fn report(abort: Option<AbortInfo>) -> RunReport {
        let now = now_utc();
        RunReport {
            run_id: generate_run_id(),
            recipe: "orders".to_string(),
            state: if abort.is_some() { RecipeState::Aborted } else { RecipeState::Completed },
            records_pulled: 3,
            records_completed: 3,
            records_failed: 0,
            errors: Vec::new(),
            errors_discarded: 0,
            abort,
            finalize_errors: Vec::new(),
            started_at: now,
            finished_at: now,
            duration_ms: 0,
        }
    }

    #[test]
    fn test_into_result_completed() {
        let report = report(None);
        assert!(report.is_clean());
        assert!(report.into_result().is_ok());
    }

    #[test]
    fn test_into_result_aborted() {
        let report = report(Some(AbortInfo {
            reason: AbortReason::SourceFailure,
            stage_index: None,
            stage_name: "orders.jsonl".to_string(),
            error: "disk gone".to_string(),
            position: 1,
        }));
        assert!(report.is_aborted());

        let err = report.into_result().unwrap_err();
        assert_eq!(
            err.to_string(),
            "Recipe 'orders' aborted at record 1 in 'orders.jsonl': disk gone"
        );
    }

    #[test]
    fn test_summary() {
        let summary = report(None).summary();
        assert_eq!(summary["state"], "completed");
        assert_eq!(summary["records_pulled"], 3);
        assert!(summary["abort"].is_null());
    }
}
