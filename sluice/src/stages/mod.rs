//! Filter and emitter contracts and implementations.
//!
//! Filters and emitters are the stages a recipe drives records through.
//! A filter maps one record to zero, one or many records; an emitter
//! observes a record, performs a side effect, and leaves it untouched.

pub mod emitters;
pub mod filters;

use crate::core::{Outcome, Record};
use crate::errors::StageError;
use std::fmt::Debug;

/// Trait for record transformations.
///
/// A filter must be a pure function of its input and the configuration it
/// was built with. Any state it keeps across records (counters, seen-sets)
/// belongs to the instance and is cleared by [`Filter::reset`], which the
/// recipe calls at the start of every run.
pub trait Filter: Send + Debug {
    /// Returns the name of the filter.
    fn name(&self) -> &str;

    /// Processes one record.
    ///
    /// # Errors
    ///
    /// Returns a [`StageError`] if the record cannot be processed. The error
    /// is attributed to this record and this filter's position.
    fn process(&mut self, record: Record) -> Result<Outcome, StageError>;

    /// Clears any per-run state.
    fn reset(&mut self) {}
}

/// Trait for side-effecting sinks.
///
/// Emitters receive a shared reference, so a record always leaves an
/// emitter exactly as it arrived.
pub trait Emitter: Send + Debug {
    /// Returns the name of the emitter.
    fn name(&self) -> &str;

    /// Accepts one record.
    ///
    /// # Errors
    ///
    /// Returns a [`StageError`] if the side effect failed.
    fn emit(&mut self, record: &Record) -> Result<(), StageError>;

    /// Flushes or closes the underlying resource.
    ///
    /// Called once, in attachment order, when a run completes. Never called
    /// for a run that aborted.
    ///
    /// # Errors
    ///
    /// Returns a [`StageError`] if flushing failed.
    fn finalize(&mut self) -> Result<(), StageError> {
        Ok(())
    }

    /// Clears any per-run state.
    fn reset(&mut self) {}
}

type ProcessFn = Box<dyn FnMut(Record) -> Result<Outcome, StageError> + Send>;

/// A closure-based filter.
pub struct FnFilter {
    name: String,
    func: ProcessFn,
}

impl FnFilter {
    /// Creates a filter from a closure returning an [`Outcome`].
    pub fn new<F>(name: impl Into<String>, func: F) -> Self
    where
        F: FnMut(Record) -> Result<Outcome, StageError> + Send + 'static,
    {
        Self {
            name: name.into(),
            func: Box::new(func),
        }
    }

    /// Creates a one-to-one filter from a fallible closure.
    pub fn map<F>(name: impl Into<String>, mut func: F) -> Self
    where
        F: FnMut(Record) -> anyhow::Result<Record> + Send + 'static,
    {
        Self::new(name, move |record| {
            func(record).map(Outcome::keep).map_err(StageError::from)
        })
    }

    /// Creates a filter that keeps records matching a predicate.
    pub fn retain<F>(name: impl Into<String>, mut predicate: F) -> Self
    where
        F: FnMut(&Record) -> bool + Send + 'static,
    {
        Self::new(name, move |record| {
            Ok(if predicate(&record) {
                Outcome::keep(record)
            } else {
                Outcome::drop_record()
            })
        })
    }
}

impl Debug for FnFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnFilter").field("name", &self.name).finish()
    }
}

impl Filter for FnFilter {
    fn name(&self) -> &str {
        &self.name
    }

    fn process(&mut self, record: Record) -> Result<Outcome, StageError> {
        (self.func)(record)
    }
}

type EmitFn = Box<dyn FnMut(&Record) -> Result<(), StageError> + Send>;
type FinalizeFn = Box<dyn FnMut() -> Result<(), StageError> + Send>;

/// A closure-based emitter.
pub struct FnEmitter {
    name: String,
    emit: EmitFn,
    finalize: Option<FinalizeFn>,
}

impl FnEmitter {
    /// Creates an emitter from a closure.
    pub fn new<F>(name: impl Into<String>, emit: F) -> Self
    where
        F: FnMut(&Record) -> Result<(), StageError> + Send + 'static,
    {
        Self {
            name: name.into(),
            emit: Box::new(emit),
            finalize: None,
        }
    }

    /// Sets the closure run on finalize.
    #[must_use]
    pub fn on_finalize<F>(mut self, finalize: F) -> Self
    where
        F: FnMut() -> Result<(), StageError> + Send + 'static,
    {
        self.finalize = Some(Box::new(finalize));
        self
    }
}

impl Debug for FnEmitter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnEmitter")
            .field("name", &self.name)
            .field("has_finalize", &self.finalize.is_some())
            .finish()
    }
}

impl Emitter for FnEmitter {
    fn name(&self) -> &str {
        &self.name
    }

    fn emit(&mut self, record: &Record) -> Result<(), StageError> {
        (self.emit)(record)
    }

    fn finalize(&mut self) -> Result<(), StageError> {
        match self.finalize.as_mut() {
            Some(finalize) => finalize(),
            None => Ok(()),
        }
    }
}

/// A filter that passes every record through unchanged.
#[derive(Debug, Clone)]
pub struct NoOpFilter {
    name: String,
}

impl NoOpFilter {
    /// Creates a new no-op filter.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl Filter for NoOpFilter {
    fn name(&self) -> &str {
        &self.name
    }

    fn process(&mut self, record: Record) -> Result<Outcome, StageError> {
        Ok(Outcome::keep(record))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Value;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_fn_filter() {
        let mut filter = FnFilter::new("double", |record| Ok(Outcome::fan_out([record.clone(), record])));

        assert_eq!(filter.name(), "double");
        let outcome = filter.process(Record::new().with("a", 1)).unwrap();
        assert_eq!(outcome.len(), 2);
    }

    #[test]
    fn test_fn_filter_map_converts_anyhow() {
        let mut filter = FnFilter::map("parse", |mut record| {
            let raw = record.get_str("n").unwrap_or_default().to_string();
            let n: i64 = raw.parse()?;
            record.insert("n", n);
            Ok(record)
        });

        let ok = filter.process(Record::new().with("n", "12")).unwrap();
        assert_eq!(ok, Outcome::keep(Record::new().with("n", 12)));

        let err = filter.process(Record::new().with("n", "x")).unwrap_err();
        assert!(err.message.contains("invalid digit"));
    }

    #[test]
    fn test_fn_filter_retain() {
        let mut filter = FnFilter::retain("even", |r| r.get("n").and_then(Value::as_i64).is_some_and(|n| n % 2 == 0));
        assert_eq!(filter.process(Record::new().with("n", 2)).unwrap().len(), 1);
        assert_eq!(filter.process(Record::new().with("n", 3)).unwrap(), Outcome::Dropped);
    }

    #[test]
    fn test_fn_emitter_finalize() {
        let finalized = Arc::new(AtomicUsize::new(0));
        let counter = finalized.clone();
        let mut emitter = FnEmitter::new("sink", |_| Ok(())).on_finalize(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        emitter.emit(&Record::new()).unwrap();
        emitter.finalize().unwrap();
        assert_eq!(finalized.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_noop_filter() {
        let mut filter = NoOpFilter::new("noop");
        let record = Record::new().with("x", "y");
        assert_eq!(filter.process(record.clone()).unwrap(), Outcome::keep(record));
    }
}
