//! Failure policies and per-record error collection.
//!
//! By default a failing record is recorded and the run moves on to the next
//! one. [`FailureMode::FailFast`] turns every failure into an abort, and
//! [`EmitterFailurePolicy`] decides what a fatal emitter error does to its
//! attachment point.

use crate::core::{Record, StageKind, Value};
use crate::errors::StageError;
use crate::utils::{now_utc, Timestamp};
use serde::{Deserialize, Serialize};

/// How to handle per-record failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureMode {
    /// Record the failure, abandon the branch, keep pulling (default).
    #[default]
    ContinueOnFailure,
    /// Abort the run on the first failure.
    FailFast,
}

/// What a fatal emitter error does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmitterFailurePolicy {
    /// Stop delivering to the failing emitter for the rest of the run;
    /// siblings keep receiving records (default).
    #[default]
    Detach,
    /// Abort the run.
    Abort,
}

/// What the run loop does after a stage error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureAction {
    /// Record it and abandon the branch.
    Record,
    /// Record it and stop delivering to the emitter.
    Detach,
    /// Record it and abort the run.
    Abort,
}

/// Decides how a stage error is handled.
#[must_use]
pub const fn decide(
    mode: FailureMode,
    policy: EmitterFailurePolicy,
    kind: StageKind,
    error: &StageError,
) -> FailureAction {
    if matches!(mode, FailureMode::FailFast) {
        return FailureAction::Abort;
    }
    if !error.fatal {
        return FailureAction::Record;
    }
    match (kind, policy) {
        (StageKind::Emitter, EmitterFailurePolicy::Detach) => FailureAction::Detach,
        _ => FailureAction::Abort,
    }
}

/// A record that failed, where it failed, and why.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorRecord {
    /// The record as it entered the failing stage.
    pub record: Record,
    /// Zero-based position of the originating record in the source stream.
    pub position: u64,
    /// Index of the failing stage in the stage list.
    pub stage_index: usize,
    /// Name of the failing filter or emitter.
    pub stage_name: String,
    /// Whether the failing stage was a filter or an emitter.
    pub stage_kind: StageKind,
    /// Error message.
    pub error: String,
    /// Error type name.
    pub error_kind: String,
    /// Whether the failing emitter was detached.
    pub detached: bool,
    /// When the failure happened.
    pub timestamp: Timestamp,
}

impl ErrorRecord {
    /// Creates an error record from a stage error.
    #[must_use]
    pub fn new(
        record: Record,
        position: u64,
        stage_index: usize,
        stage_name: impl Into<String>,
        stage_kind: StageKind,
        error: &StageError,
    ) -> Self {
        Self {
            record,
            position,
            stage_index,
            stage_name: stage_name.into(),
            stage_kind,
            error: error.message.clone(),
            error_kind: error.kind.clone(),
            detached: false,
            timestamp: now_utc(),
        }
    }

    /// Marks the failing emitter as detached.
    #[must_use]
    pub const fn detached(mut self) -> Self {
        self.detached = true;
        self
    }

    /// Converts the failure into a record for an error chain.
    ///
    /// The record carries `record`, `error`, `error_kind`, `stage`,
    /// `stage_index` and `position` fields.
    #[must_use]
    pub fn to_record(&self) -> Record {
        Record::new()
            .with("record", Value::from(self.record.clone()))
            .with("error", self.error.as_str())
            .with("error_kind", self.error_kind.as_str())
            .with("stage", self.stage_name.as_str())
            .with("stage_index", Value::Int(i64::try_from(self.stage_index).unwrap_or(i64::MAX)))
            .with("position", Value::Int(i64::try_from(self.position).unwrap_or(i64::MAX)))
    }
}

/// Collects error records for one run, up to a capacity.
#[derive(Debug)]
pub struct ErrorCollector {
    capacity: Option<usize>,
    errors: Vec<ErrorRecord>,
    discarded: u64,
}

impl ErrorCollector {
    /// Creates a collector; `None` keeps every error.
    #[must_use]
    pub const fn new(capacity: Option<usize>) -> Self {
        Self {
            capacity,
            errors: Vec::new(),
            discarded: 0,
        }
    }

    /// Records an error, or counts it as discarded once the capacity is
    /// reached.
    pub fn record(&mut self, error: ErrorRecord) {
        match self.capacity {
            Some(capacity) if self.errors.len() >= capacity => self.discarded += 1,
            _ => self.errors.push(error),
        }
    }

    /// Returns the retained errors, in the order they happened.
    #[must_use]
    pub fn errors(&self) -> &[ErrorRecord] {
        &self.errors
    }

    /// Returns the number of errors dropped for capacity.
    #[must_use]
    pub const fn discarded(&self) -> u64 {
        self.discarded
    }

    /// Returns the total number of errors seen.
    #[must_use]
    pub fn total(&self) -> u64 {
        self.errors.len() as u64 + self.discarded
    }

    /// Consumes the collector, returning the retained errors and the
    /// discarded count.
    #[must_use]
    pub fn into_parts(self) -> (Vec<ErrorRecord>, u64) {
        (self.errors, self.discarded)
    }
}

impl Default for ErrorCollector {
    fn default() -> Self {
        Self::new(None)
    }
}
