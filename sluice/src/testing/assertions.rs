//! Test assertions for run reports.

use crate::core::{RecipeState, Record, Value};
use crate::pipeline::{AbortReason, ErrorRecord, RunReport};

/// Asserts that the run completed.
pub fn assert_completed(report: &RunReport) {
    assert_eq!(
        report.state,
        RecipeState::Completed,
        "Expected completed run, got {:?} (abort: {:?})",
        report.state,
        report.abort
    );
}

/// Asserts that the run aborted for the given reason.
pub fn assert_aborted(report: &RunReport, reason: AbortReason) {
    assert_eq!(report.state, RecipeState::Aborted, "Expected aborted run");
    let actual = report.abort.as_ref().map(|abort| abort.reason);
    assert_eq!(actual, Some(reason), "Expected abort reason {reason:?}, got {actual:?}");
}

/// Asserts that the run produced exactly one error record and returns it.
#[must_use]
pub fn assert_single_error(report: &RunReport) -> &ErrorRecord {
    assert_eq!(
        report.errors.len(),
        1,
        "Expected exactly one error record, got {:?}",
        report.errors
    );
    &report.errors[0]
}

/// Asserts that `records` carry exactly `expected` in `field`, in order.
pub fn assert_field_values<V: Into<Value>>(records: &[Record], field: &str, expected: impl IntoIterator<Item = V>) {
    let actual: Vec<Option<&Value>> = records.iter().map(|r| r.get(field)).collect();
    let expected: Vec<Value> = expected.into_iter().map(Into::into).collect();
    let expected: Vec<Option<&Value>> = expected.iter().map(Some).collect();
    assert_eq!(actual, expected, "Field '{}' values differ", field);
}
