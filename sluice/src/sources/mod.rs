//! Record sources.
//!
//! A source is a pull cursor: the recipe opens it, asks for records one at a
//! time until it signals exhaustion, and closes it. Closing is guaranteed on
//! every exit path once opening succeeded, including aborts and
//! cancellation.

mod iter;
mod json_lines;

pub use iter::IterSource;
pub use json_lines::JsonLinesSource;

use crate::core::Record;
use crate::errors::SourceError;

/// Trait for record origins.
pub trait Source {
    /// Returns the name of the source, used in reports and logs.
    fn name(&self) -> &str {
        "source"
    }

    /// Acquires the underlying resource.
    ///
    /// # Errors
    ///
    /// Returns an error if the resource cannot be acquired. The run aborts
    /// before any record is pulled.
    fn open(&mut self) -> Result<(), SourceError> {
        Ok(())
    }

    /// Produces the next record, or `None` once the source is exhausted.
    ///
    /// An `Err` aborts the run.
    fn next_record(&mut self) -> Option<Result<Record, SourceError>>;

    /// Releases the underlying resource.
    fn close(&mut self) {}
}

impl<S: Source + ?Sized> Source for Box<S> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn open(&mut self) -> Result<(), SourceError> {
        (**self).open()
    }

    fn next_record(&mut self) -> Option<Result<Record, SourceError>> {
        (**self).next_record()
    }

    fn close(&mut self) {
        (**self).close();
    }
}

/// An opened source that is closed when dropped.
#[derive(Debug)]
pub(crate) struct SourceGuard<S: Source> {
    source: S,
}

impl<S: Source> SourceGuard<S> {
    /// Opens the source. On failure the source is dropped without `close`.
    pub(crate) fn open(mut source: S) -> Result<Self, SourceError> {
        source.open()?;
        Ok(Self { source })
    }

    pub(crate) fn name(&self) -> &str {
        self.source.name()
    }

    pub(crate) fn next_record(&mut self) -> Option<Result<Record, SourceError>> {
        self.source.next_record()
    }
}

impl<S: Source> Drop for SourceGuard<S> {
    fn drop(&mut self) {
        self.source.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::TrackedSource;

    #[test]
    fn test_guard_closes_on_drop() {
        let source = TrackedSource::new(vec![Record::new().with("a", 1)]);
        let probe = source.probe();

        {
            let mut guard = SourceGuard::open(source).unwrap();
            assert!(probe.is_open());
            assert!(guard.next_record().is_some());
        }

        assert!(!probe.is_open());
        assert_eq!(probe.close_count(), 1);
    }

    #[test]
    fn test_guard_skips_close_when_open_fails() {
        let source = TrackedSource::new(Vec::new()).fail_open("permission denied");
        let probe = source.probe();

        let err = SourceGuard::open(source).unwrap_err();
        assert!(err.to_string().contains("permission denied"));
        assert_eq!(probe.close_count(), 0);
    }

    #[test]
    fn test_boxed_source() {
        let mut source: Box<dyn Source> = Box::new(IterSource::new([Record::new()]).with_name("boxed"));
        assert_eq!(source.name(), "boxed");
        assert!(source.next_record().is_some());
        assert!(source.next_record().is_none());
    }
}
