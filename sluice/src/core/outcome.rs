//! The result of passing one record through a filter.

use super::Record;

/// What a filter produced for one input record.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// The record was dropped; later stages never see it.
    Dropped,
    /// Exactly one record continues.
    Single(Record),
    /// Zero or more records continue, in order.
    Fanout(Vec<Record>),
}

impl Outcome {
    /// Passes a record on.
    #[must_use]
    pub const fn keep(record: Record) -> Self {
        Self::Single(record)
    }

    /// Drops the record.
    #[must_use]
    pub const fn drop_record() -> Self {
        Self::Dropped
    }

    /// Fans out into several records.
    #[must_use]
    pub fn fan_out(records: impl IntoIterator<Item = Record>) -> Self {
        Self::Fanout(records.into_iter().collect())
    }

    /// Returns the number of records produced.
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Dropped => 0,
            Self::Single(_) => 1,
            Self::Fanout(records) => records.len(),
        }
    }

    /// Returns true if no records were produced.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl From<Record> for Outcome {
    fn from(record: Record) -> Self {
        Self::Single(record)
    }
}

impl From<Option<Record>> for Outcome {
    fn from(record: Option<Record>) -> Self {
        record.map_or(Self::Dropped, Self::Single)
    }
}

impl From<Vec<Record>> for Outcome {
    fn from(records: Vec<Record>) -> Self {
        Self::Fanout(records)
    }
}

impl IntoIterator for Outcome {
    type Item = Record;
    type IntoIter = OutcomeIter;

    fn into_iter(self) -> Self::IntoIter {
        match self {
            Self::Dropped => OutcomeIter::One(None),
            Self::Single(record) => OutcomeIter::One(Some(record)),
            Self::Fanout(records) => OutcomeIter::Many(records.into_iter()),
        }
    }
}

/// Iterator over the records of an [`Outcome`].
#[derive(Debug)]
pub enum OutcomeIter {
    /// At most one record.
    One(Option<Record>),
    /// Several records.
    Many(std::vec::IntoIter<Record>),
}

impl Iterator for OutcomeIter {
    type Item = Record;

    fn next(&mut self) -> Option<Record> {
        match self {
            Self::One(slot) => slot.take(),
            Self::Many(iter) => iter.next(),
        }
    }
}
