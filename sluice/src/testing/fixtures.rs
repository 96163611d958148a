//! Record fixtures.

use crate::core::Record;

/// Returns `n` records of the form `{"n": i}`.
#[must_use]
pub fn numbered_records(n: i64) -> Vec<Record> {
    (0..n).map(|i| Record::new().with("n", i)).collect()
}

/// Returns one record `{"id": key}` per key.
#[must_use]
pub fn keyed_records<'a>(keys: impl IntoIterator<Item = &'a str>) -> Vec<Record> {
    keys.into_iter().map(|key| Record::new().with("id", key)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixtures() {
        assert_eq!(numbered_records(3).len(), 3);
        assert_eq!(keyed_records(["A", "B"])[1].get_str("id"), Some("B"));
    }
}
