//! In-memory sources.

use super::Source;
use crate::core::Record;
use crate::errors::SourceError;
use std::fmt::Debug;

type RecordIter = Box<dyn Iterator<Item = Result<Record, SourceError>> + Send>;

/// A source backed by any iterator of records.
pub struct IterSource {
    name: String,
    iter: RecordIter,
}

impl IterSource {
    /// Creates a source from records.
    pub fn new<I>(records: I) -> Self
    where
        I: IntoIterator<Item = Record>,
        I::IntoIter: Send + 'static,
    {
        Self::fallible(records.into_iter().map(Ok))
    }

    /// Creates a source from results; the first `Err` aborts the run.
    pub fn fallible<I>(results: I) -> Self
    where
        I: IntoIterator<Item = Result<Record, SourceError>>,
        I::IntoIter: Send + 'static,
    {
        Self {
            name: "iter".to_string(),
            iter: Box::new(results.into_iter()),
        }
    }

    /// Sets the source name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}

impl Debug for IterSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IterSource").field("name", &self.name).finish_non_exhaustive()
    }
}

impl Source for IterSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn next_record(&mut self) -> Option<Result<Record, SourceError>> {
        self.iter.next()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_iter_source_yields_in_order() {
        let mut source = IterSource::new((1..=3).map(|n| Record::new().with("n", n)));
        let seen: Vec<Record> = std::iter::from_fn(|| source.next_record()).map(Result::unwrap).collect();
        assert_eq!(seen.len(), 3);
        assert_eq!(seen[2], Record::new().with("n", 3));
        assert_eq!(source.name(), "iter");
    }

    #[test]
    fn test_fallible_source() {
        let mut source = IterSource::fallible(vec![
            Ok(Record::new()),
            Err(SourceError::read("feed", "connection reset")),
        ]);
        assert!(source.next_record().unwrap().is_ok());
        assert!(source.next_record().unwrap().is_err());
    }
}
