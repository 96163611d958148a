//! Mock stages and sources for testing.

use parking_lot::Mutex;
use std::sync::Arc;

use crate::core::{Outcome, Record, Value};
use crate::errors::{SourceError, StageError};
use crate::sources::Source;
use crate::stages::{Emitter, Filter};

/// A shared, ordered log of emitter activity.
///
/// Entries read `"<emitter> <record>"` for emits and `"<emitter> finalize"`
/// for finalize calls, so one log shared by several emitters shows the
/// global order of side effects.
#[derive(Debug, Clone, Default)]
pub struct EventLog {
    entries: Arc<Mutex<Vec<String>>>,
}

impl EventLog {
    /// Creates an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an entry.
    pub fn push(&self, entry: impl Into<String>) {
        self.entries.lock().push(entry.into());
    }

    /// Returns all entries in order.
    #[must_use]
    pub fn entries(&self) -> Vec<String> {
        self.entries.lock().clone()
    }
}

#[derive(Debug, Default)]
struct Recording {
    records: Vec<Record>,
    finalized: usize,
    resets: usize,
}

/// An emitter that records everything it receives.
///
/// Clones share state, so keep a clone to inspect after handing one to a
/// recipe.
#[derive(Debug, Clone)]
pub struct RecordingEmitter {
    name: String,
    state: Arc<Mutex<Recording>>,
    log: Option<EventLog>,
    fail_on: Option<(String, Value)>,
    fatal: bool,
    fail_finalize: bool,
}

impl RecordingEmitter {
    /// Creates a recording emitter.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: Arc::default(),
            log: None,
            fail_on: None,
            fatal: false,
            fail_finalize: false,
        }
    }

    /// Writes activity to a shared log.
    #[must_use]
    pub fn with_log(mut self, log: &EventLog) -> Self {
        self.log = Some(log.clone());
        self
    }

    /// Fails on records whose `key` equals `value`. Failing records are not
    /// recorded.
    #[must_use]
    pub fn fail_on(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fail_on = Some((key.into(), value.into()));
        self
    }

    /// Makes failures fatal.
    #[must_use]
    pub const fn fatal(mut self) -> Self {
        self.fatal = true;
        self
    }

    /// Fails on finalize.
    #[must_use]
    pub const fn fail_finalize(mut self) -> Self {
        self.fail_finalize = true;
        self
    }

    /// Returns the records received in the current run.
    #[must_use]
    pub fn records(&self) -> Vec<Record> {
        self.state.lock().records.clone()
    }

    /// Returns the number of times finalize was called.
    #[must_use]
    pub fn finalize_count(&self) -> usize {
        self.state.lock().finalized
    }

    /// Returns the number of times the emitter was reset.
    #[must_use]
    pub fn reset_count(&self) -> usize {
        self.state.lock().resets
    }
}

impl Emitter for RecordingEmitter {
    fn name(&self) -> &str {
        &self.name
    }

    fn emit(&mut self, record: &Record) -> Result<(), StageError> {
        if let Some((key, value)) = &self.fail_on {
            if record.get(key) == Some(value) {
                let err = StageError::new(format!("{} rejected {record}", self.name)).with_kind("EmitterError");
                return Err(if self.fatal { err.into_fatal() } else { err });
            }
        }
        if let Some(log) = &self.log {
            log.push(format!("{} {record}", self.name));
        }
        self.state.lock().records.push(record.clone());
        Ok(())
    }

    fn finalize(&mut self) -> Result<(), StageError> {
        self.state.lock().finalized += 1;
        if let Some(log) = &self.log {
            log.push(format!("{} finalize", self.name));
        }
        if self.fail_finalize {
            return Err(StageError::new(format!("{} could not flush", self.name)));
        }
        Ok(())
    }

    fn reset(&mut self) {
        let mut state = self.state.lock();
        state.records.clear();
        state.resets += 1;
    }
}

/// A filter that fails on every record.
#[derive(Debug, Clone)]
pub struct FailingFilter {
    name: String,
    error: StageError,
}

impl FailingFilter {
    /// Creates a filter failing with a non-fatal error.
    #[must_use]
    pub fn new(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            error: StageError::new(message),
        }
    }

    /// Makes the failure fatal.
    #[must_use]
    pub fn fatal(mut self) -> Self {
        self.error = self.error.into_fatal();
        self
    }
}

impl Filter for FailingFilter {
    fn name(&self) -> &str {
        &self.name
    }

    fn process(&mut self, _record: Record) -> Result<Outcome, StageError> {
        Err(self.error.clone())
    }
}

/// A filter that fails on records whose field equals a value and passes
/// everything else through.
#[derive(Debug, Clone)]
pub struct FailOnFilter {
    name: String,
    key: String,
    value: Value,
    fatal: bool,
    calls: Arc<Mutex<usize>>,
}

impl FailOnFilter {
    /// Creates the filter.
    #[must_use]
    pub fn new(name: impl Into<String>, key: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            name: name.into(),
            key: key.into(),
            value: value.into(),
            fatal: false,
            calls: Arc::default(),
        }
    }

    /// Makes the failure fatal.
    #[must_use]
    pub const fn fatal(mut self) -> Self {
        self.fatal = true;
        self
    }

    /// Returns how many records the filter has seen, across clones.
    #[must_use]
    pub fn calls(&self) -> usize {
        *self.calls.lock()
    }
}

impl Filter for FailOnFilter {
    fn name(&self) -> &str {
        &self.name
    }

    fn process(&mut self, record: Record) -> Result<Outcome, StageError> {
        *self.calls.lock() += 1;
        if record.get(&self.key) == Some(&self.value) {
            let err = StageError::new(format!("{} cannot handle {}={}", self.name, self.key, self.value));
            return Err(if self.fatal { err.into_fatal() } else { err });
        }
        Ok(Outcome::keep(record))
    }
}

/// A filter that emits `copies` records per input, each tagged with a
/// `copy` field.
#[derive(Debug, Clone)]
pub struct DuplicatingFilter {
    name: String,
    copies: u32,
}

impl DuplicatingFilter {
    /// Creates the filter.
    #[must_use]
    pub fn new(name: impl Into<String>, copies: u32) -> Self {
        Self {
            name: name.into(),
            copies,
        }
    }
}

impl Filter for DuplicatingFilter {
    fn name(&self) -> &str {
        &self.name
    }

    fn process(&mut self, record: Record) -> Result<Outcome, StageError> {
        Ok(Outcome::fan_out(
            (0..self.copies).map(|copy| record.clone().with("copy", copy)),
        ))
    }
}

/// A source that yields some records and then fails.
#[derive(Debug)]
pub struct FailingSource {
    records: std::vec::IntoIter<Record>,
    message: String,
    fail_open: bool,
}

impl FailingSource {
    /// Yields `records`, then a read error.
    #[must_use]
    pub fn after(records: Vec<Record>, message: impl Into<String>) -> Self {
        Self {
            records: records.into_iter(),
            message: message.into(),
            fail_open: false,
        }
    }

    /// Fails to open.
    #[must_use]
    pub fn on_open(message: impl Into<String>) -> Self {
        Self {
            records: Vec::new().into_iter(),
            message: message.into(),
            fail_open: true,
        }
    }
}

impl Source for FailingSource {
    fn name(&self) -> &str {
        "failing"
    }

    fn open(&mut self) -> Result<(), SourceError> {
        if self.fail_open {
            return Err(SourceError::open("failing", self.message.clone()));
        }
        Ok(())
    }

    fn next_record(&mut self) -> Option<Result<Record, SourceError>> {
        Some(
            self.records
                .next()
                .ok_or_else(|| SourceError::read("failing", self.message.clone())),
        )
    }
}

#[derive(Debug, Default)]
struct Probe {
    open: bool,
    opens: usize,
    closes: usize,
    pulled: usize,
}

/// Observes a [`TrackedSource`] after it has been moved into a run.
#[derive(Debug, Clone, Default)]
pub struct SourceProbe {
    state: Arc<Mutex<Probe>>,
}

impl SourceProbe {
    /// Returns true between a successful open and close.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.state.lock().open
    }

    /// Returns the number of successful opens.
    #[must_use]
    pub fn open_count(&self) -> usize {
        self.state.lock().opens
    }

    /// Returns the number of closes.
    #[must_use]
    pub fn close_count(&self) -> usize {
        self.state.lock().closes
    }

    /// Returns the number of records handed out.
    #[must_use]
    pub fn pulled(&self) -> usize {
        self.state.lock().pulled
    }
}

/// A source that reports its open, close and pull activity.
#[derive(Debug)]
pub struct TrackedSource {
    records: std::vec::IntoIter<Record>,
    probe: SourceProbe,
    fail_open: Option<String>,
}

impl TrackedSource {
    /// Creates a source over `records`.
    #[must_use]
    pub fn new(records: Vec<Record>) -> Self {
        Self {
            records: records.into_iter(),
            probe: SourceProbe::default(),
            fail_open: None,
        }
    }

    /// Makes `open` fail.
    #[must_use]
    pub fn fail_open(mut self, message: impl Into<String>) -> Self {
        self.fail_open = Some(message.into());
        self
    }

    /// Returns a probe sharing this source's state.
    #[must_use]
    pub fn probe(&self) -> SourceProbe {
        self.probe.clone()
    }
}

impl Source for TrackedSource {
    fn name(&self) -> &str {
        "tracked"
    }

    fn open(&mut self) -> Result<(), SourceError> {
        if let Some(message) = &self.fail_open {
            return Err(SourceError::open("tracked", message.clone()));
        }
        let mut state = self.probe.state.lock();
        state.open = true;
        state.opens += 1;
        Ok(())
    }

    fn next_record(&mut self) -> Option<Result<Record, SourceError>> {
        let record = self.records.next()?;
        self.probe.state.lock().pulled += 1;
        Some(Ok(record))
    }

    fn close(&mut self) {
        let mut state = self.probe.state.lock();
        state.open = false;
        state.closes += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_emitter_shares_state_across_clones() {
        let log = EventLog::new();
        let out = RecordingEmitter::new("out").with_log(&log);
        let mut inner = out.clone();

        inner.emit(&Record::new().with("a", 1)).unwrap();
        inner.finalize().unwrap();

        assert_eq!(out.records().len(), 1);
        assert_eq!(out.finalize_count(), 1);
        assert_eq!(log.entries(), vec!["out {\"a\":1}", "out finalize"]);

        inner.reset();
        assert!(out.records().is_empty());
        assert_eq!(out.reset_count(), 1);
    }

    #[test]
    fn test_recording_emitter_fail_on() {
        let mut out = RecordingEmitter::new("out").fail_on("id", "B").fatal();
        assert!(out.emit(&Record::new().with("id", "A")).is_ok());
        let err = out.emit(&Record::new().with("id", "B")).unwrap_err();
        assert!(err.fatal);
        assert_eq!(out.records().len(), 1);
    }

    #[test]
    fn test_fail_on_filter() {
        let mut filter = FailOnFilter::new("f", "id", "B");
        assert!(filter.process(Record::new().with("id", "A")).is_ok());
        assert!(filter.process(Record::new().with("id", "B")).is_err());
        assert_eq!(filter.calls(), 2);
    }

    #[test]
    fn test_duplicating_filter() {
        let mut filter = DuplicatingFilter::new("dup", 2);
        let outcome = filter.process(Record::new().with("id", "A")).unwrap();
        let copies: Vec<Record> = outcome.into_iter().collect();
        assert_eq!(copies[1].get("copy"), Some(&Value::from(1_u32)));
    }

    #[test]
    fn test_failing_source() {
        let mut source = FailingSource::after(vec![Record::new()], "disk gone");
        assert!(source.next_record().unwrap().is_ok());
        assert!(source.next_record().unwrap().is_err());
        assert!(FailingSource::on_open("nope").open().is_err());
    }
}
