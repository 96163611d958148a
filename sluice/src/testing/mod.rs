//! Testing utilities for sluice recipes.
//!
//! This module provides:
//! - Mock filters, emitters and sources with observable state
//! - Record fixtures
//! - Assertions over run reports

mod assertions;
mod fixtures;
mod mocks;

pub use assertions::{
    assert_aborted, assert_completed, assert_field_values, assert_single_error,
};
pub use fixtures::{keyed_records, numbered_records};
pub use mocks::{
    DuplicatingFilter, EventLog, FailOnFilter, FailingFilter, FailingSource, RecordingEmitter,
    SourceProbe, TrackedSource,
};
