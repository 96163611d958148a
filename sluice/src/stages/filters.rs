//! General-purpose filters that work on any record shape.
//!
//! Field filters take the field names they act on at construction time.
//! Stateful filters (`Unique`, `UniqueId`) forget what they have seen when
//! the recipe starts a new run.

use super::Filter;
use crate::core::{Outcome, Record, Value};
use crate::errors::StageError;
use std::collections::HashSet;
use std::fmt::Debug;

fn to_keys<I, S>(keys: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    keys.into_iter().map(Into::into).collect()
}

fn missing_field(filter: &str, field: &str) -> StageError {
    StageError::new(format!("{filter}: record has no field '{field}'")).with_kind("MissingField")
}

/// Removes every field except the given ones.
#[derive(Debug, Clone)]
pub struct FieldKeeper {
    name: String,
    keys: HashSet<String>,
}

impl FieldKeeper {
    /// Creates a keeper for the given fields.
    pub fn new<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: "field_keeper".to_string(),
            keys: to_keys(keys).into_iter().collect(),
        }
    }
}

impl Filter for FieldKeeper {
    fn name(&self) -> &str {
        &self.name
    }

    fn process(&mut self, mut record: Record) -> Result<Outcome, StageError> {
        record.retain(|key, _| self.keys.contains(key));
        Ok(Outcome::keep(record))
    }
}

/// Removes the given fields; absent fields are ignored.
#[derive(Debug, Clone)]
pub struct FieldRemover {
    name: String,
    keys: Vec<String>,
}

impl FieldRemover {
    /// Creates a remover for the given fields.
    pub fn new<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: "field_remover".to_string(),
            keys: to_keys(keys),
        }
    }
}

impl Filter for FieldRemover {
    fn name(&self) -> &str {
        &self.name
    }

    fn process(&mut self, mut record: Record) -> Result<Outcome, StageError> {
        for key in &self.keys {
            record.remove(key);
        }
        Ok(Outcome::keep(record))
    }
}

/// Renames fields. The mapping is `(destination, source)`.
///
/// A missing source field is an error for that record.
#[derive(Debug, Clone)]
pub struct FieldRenamer {
    name: String,
    mapping: Vec<(String, String)>,
}

impl FieldRenamer {
    /// Creates a renamer from `(destination, source)` pairs.
    pub fn new<I, D, S>(mapping: I) -> Self
    where
        I: IntoIterator<Item = (D, S)>,
        D: Into<String>,
        S: Into<String>,
    {
        Self {
            name: "field_renamer".to_string(),
            mapping: mapping.into_iter().map(|(d, s)| (d.into(), s.into())).collect(),
        }
    }
}

impl Filter for FieldRenamer {
    fn name(&self) -> &str {
        &self.name
    }

    fn process(&mut self, mut record: Record) -> Result<Outcome, StageError> {
        for (dest, source) in &self.mapping {
            let value = record
                .remove(source)
                .ok_or_else(|| missing_field(&self.name, source))?;
            record.insert(dest.clone(), value);
        }
        Ok(Outcome::keep(record))
    }
}

/// Copies fields. The mapping is `(destination, source)`.
///
/// A missing source field is an error for that record.
#[derive(Debug, Clone)]
pub struct FieldCopier {
    name: String,
    mapping: Vec<(String, String)>,
}

impl FieldCopier {
    /// Creates a copier from `(destination, source)` pairs.
    pub fn new<I, D, S>(mapping: I) -> Self
    where
        I: IntoIterator<Item = (D, S)>,
        D: Into<String>,
        S: Into<String>,
    {
        Self {
            name: "field_copier".to_string(),
            mapping: mapping.into_iter().map(|(d, s)| (d.into(), s.into())).collect(),
        }
    }
}

impl Filter for FieldCopier {
    fn name(&self) -> &str {
        &self.name
    }

    fn process(&mut self, mut record: Record) -> Result<Outcome, StageError> {
        for (dest, source) in &self.mapping {
            let value = record
                .get(source)
                .cloned()
                .ok_or_else(|| missing_field(&self.name, source))?;
            record.insert(dest.clone(), value);
        }
        Ok(Outcome::keep(record))
    }
}

type ValueFn = Box<dyn FnMut() -> Value + Send>;

enum FieldValue {
    Static(Value),
    Generated(ValueFn),
}

/// Adds a field with a fixed or generated value.
///
/// A generator is called once per record that receives the field, so
/// `FieldAdder::generated("id", counter)` numbers records in stream order.
pub struct FieldAdder {
    name: String,
    field: String,
    value: FieldValue,
    replace: bool,
}

impl FieldAdder {
    /// Adds a constant value.
    pub fn new(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            name: "field_adder".to_string(),
            field: field.into(),
            value: FieldValue::Static(value.into()),
            replace: true,
        }
    }

    /// Adds a value produced by a closure.
    pub fn generated<F>(field: impl Into<String>, generator: F) -> Self
    where
        F: FnMut() -> Value + Send + 'static,
    {
        Self {
            name: "field_adder".to_string(),
            field: field.into(),
            value: FieldValue::Generated(Box::new(generator)),
            replace: true,
        }
    }

    /// Leaves existing values untouched instead of overwriting them.
    #[must_use]
    pub const fn keep_existing(mut self) -> Self {
        self.replace = false;
        self
    }
}

impl Debug for FieldAdder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FieldAdder")
            .field("field", &self.field)
            .field("generated", &matches!(self.value, FieldValue::Generated(_)))
            .field("replace", &self.replace)
            .finish()
    }
}

impl Filter for FieldAdder {
    fn name(&self) -> &str {
        &self.name
    }

    fn process(&mut self, mut record: Record) -> Result<Outcome, StageError> {
        if self.replace || !record.contains_key(&self.field) {
            let value = match &mut self.value {
                FieldValue::Static(value) => value.clone(),
                FieldValue::Generated(generator) => generator(),
            };
            record.insert(self.field.clone(), value);
        }
        Ok(Outcome::keep(record))
    }
}

type ModifyFn = Box<dyn FnMut(Value) -> Result<Value, StageError> + Send>;

/// Applies a function to the given fields; absent fields are skipped.
pub struct FieldModifier {
    name: String,
    keys: Vec<String>,
    func: ModifyFn,
}

impl FieldModifier {
    /// Creates a modifier for the given fields.
    pub fn new<I, S, F>(keys: I, func: F) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
        F: FnMut(Value) -> Result<Value, StageError> + Send + 'static,
    {
        Self {
            name: "field_modifier".to_string(),
            keys: to_keys(keys),
            func: Box::new(func),
        }
    }
}

impl Debug for FieldModifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FieldModifier").field("keys", &self.keys).finish()
    }
}

impl Filter for FieldModifier {
    fn name(&self) -> &str {
        &self.name
    }

    fn process(&mut self, mut record: Record) -> Result<Outcome, StageError> {
        for key in &self.keys {
            if let Some(value) = record.remove(key) {
                record.insert(key.clone(), (self.func)(value)?);
            }
        }
        Ok(Outcome::keep(record))
    }
}

type PredicateFn = Box<dyn FnMut(&Record) -> bool + Send>;

/// Passes records that satisfy a predicate.
///
/// By default failing records are dropped silently. As a validator, a
/// failing record raises a validation error instead, so it shows up in the
/// run's error records.
pub struct ConditionalFilter {
    name: String,
    predicate: PredicateFn,
    validator: bool,
}

impl ConditionalFilter {
    /// Creates a filter that drops records failing the predicate.
    pub fn new<F>(name: impl Into<String>, predicate: F) -> Self
    where
        F: FnMut(&Record) -> bool + Send + 'static,
    {
        Self {
            name: name.into(),
            predicate: Box::new(predicate),
            validator: false,
        }
    }

    /// Creates a filter that rejects records failing the predicate.
    pub fn validator<F>(name: impl Into<String>, predicate: F) -> Self
    where
        F: FnMut(&Record) -> bool + Send + 'static,
    {
        let mut filter = Self::new(name, predicate);
        filter.validator = true;
        filter
    }
}

impl Debug for ConditionalFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConditionalFilter")
            .field("name", &self.name)
            .field("validator", &self.validator)
            .finish()
    }
}

impl Filter for ConditionalFilter {
    fn name(&self) -> &str {
        &self.name
    }

    fn process(&mut self, record: Record) -> Result<Outcome, StageError> {
        if (self.predicate)(&record) {
            Ok(Outcome::keep(record))
        } else if self.validator {
            Err(StageError::validation(format!("{}: rejected {record}", self.name)))
        } else {
            Ok(Outcome::drop_record())
        }
    }
}

/// Passes only the first occurrence of each distinct record.
#[derive(Debug, Clone, Default)]
pub struct Unique {
    seen: HashSet<String>,
    validator: bool,
}

impl Unique {
    /// Creates a filter that drops duplicates.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a filter that rejects duplicates with a validation error.
    #[must_use]
    pub fn validator() -> Self {
        Self {
            seen: HashSet::new(),
            validator: true,
        }
    }
}

impl Filter for Unique {
    fn name(&self) -> &str {
        "unique"
    }

    fn process(&mut self, record: Record) -> Result<Outcome, StageError> {
        if self.seen.insert(record.fingerprint()) {
            Ok(Outcome::keep(record))
        } else if self.validator {
            Err(StageError::validation(format!("duplicate record {record}")))
        } else {
            Ok(Outcome::drop_record())
        }
    }

    fn reset(&mut self) {
        self.seen.clear();
    }
}

/// Passes only the first record for each id (one or more fields).
///
/// A record missing any id field is an error for that record.
#[derive(Debug, Clone)]
pub struct UniqueId {
    fields: Vec<String>,
    seen: HashSet<String>,
    validator: bool,
}

impl UniqueId {
    /// Creates a filter keyed on the given id fields.
    pub fn new<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            fields: to_keys(fields),
            seen: HashSet::new(),
            validator: false,
        }
    }

    /// Rejects repeated ids with a validation error instead of dropping.
    #[must_use]
    pub const fn as_validator(mut self) -> Self {
        self.validator = true;
        self
    }

    fn id_of(&self, record: &Record) -> Result<String, StageError> {
        let parts = self
            .fields
            .iter()
            .map(|field| {
                record
                    .get(field)
                    .map(Value::to_json)
                    .ok_or_else(|| missing_field("unique_id", field))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(serde_json::Value::Array(parts).to_string())
    }
}

impl Filter for UniqueId {
    fn name(&self) -> &str {
        "unique_id"
    }

    fn process(&mut self, record: Record) -> Result<Outcome, StageError> {
        let id = self.id_of(&record)?;
        if self.seen.insert(id.clone()) {
            Ok(Outcome::keep(record))
        } else if self.validator {
            Err(StageError::validation(format!("duplicate id {id}")))
        } else {
            Ok(Outcome::drop_record())
        }
    }

    fn reset(&mut self) {
        self.seen.clear();
    }
}

/// Fans a record out into one record per element of a list field.
///
/// Each output is a copy of the input with the list replaced by a single
/// element. Records without the field, or where it is not a list, pass
/// through unchanged; an empty list drops the record.
#[derive(Debug, Clone)]
pub struct FieldExploder {
    field: String,
    target: Option<String>,
}

impl FieldExploder {
    /// Creates an exploder for a list field.
    pub fn new(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            target: None,
        }
    }

    /// Writes each element under a different field name.
    #[must_use]
    pub fn into_field(mut self, target: impl Into<String>) -> Self {
        self.target = Some(target.into());
        self
    }
}

impl Filter for FieldExploder {
    fn name(&self) -> &str {
        "field_exploder"
    }

    fn process(&mut self, mut record: Record) -> Result<Outcome, StageError> {
        let items = match record.remove(&self.field) {
            Some(Value::List(items)) => items,
            Some(other) => {
                record.insert(self.field.clone(), other);
                return Ok(Outcome::keep(record));
            }
            None => return Ok(Outcome::keep(record)),
        };
        let target = self.target.as_ref().unwrap_or(&self.field);
        Ok(Outcome::fan_out(items.into_iter().map(|item| {
            let mut child = record.clone();
            child.insert(target.clone(), item);
            child
        })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn single(outcome: Outcome) -> Record {
        match outcome {
            Outcome::Single(record) => record,
            other => panic!("expected a single record, got {other:?}"),
        }
    }

    fn sample() -> Record {
        Record::new().with("a", 1).with("b", 2).with("c", 3)
    }

    #[test]
    fn test_field_keeper() {
        let mut filter = FieldKeeper::new(["a", "c", "z"]);
        let out = single(filter.process(sample()).unwrap());
        assert_eq!(out, Record::new().with("a", 1).with("c", 3));
    }

    #[test]
    fn test_field_remover_ignores_missing() {
        let mut filter = FieldRemover::new(["b", "z"]);
        let out = single(filter.process(sample()).unwrap());
        assert_eq!(out, Record::new().with("a", 1).with("c", 3));
    }

    #[test]
    fn test_field_renamer() {
        let mut filter = FieldRenamer::new([("x", "a")]);
        let out = single(filter.process(sample()).unwrap());
        assert_eq!(out, Record::new().with("x", 1).with("b", 2).with("c", 3));
    }

    #[test]
    fn test_field_renamer_missing_source_fails() {
        let mut filter = FieldRenamer::new([("x", "missing")]);
        let err = filter.process(sample()).unwrap_err();
        assert_eq!(err.kind, "MissingField");
    }

    #[test]
    fn test_field_copier() {
        let mut filter = FieldCopier::new([("a2", "a")]);
        let out = single(filter.process(sample()).unwrap());
        assert_eq!(out.get("a2"), Some(&Value::Int(1)));
        assert_eq!(out.get("a"), Some(&Value::Int(1)));
    }

    #[test]
    fn test_field_adder_static_and_keep_existing() {
        let mut replace = FieldAdder::new("a", "new");
        assert_eq!(single(replace.process(sample()).unwrap()).get_str("a"), Some("new"));

        let mut keep = FieldAdder::new("a", "new").keep_existing();
        assert_eq!(single(keep.process(sample()).unwrap()).get("a"), Some(&Value::Int(1)));
        assert_eq!(single(keep.process(Record::new()).unwrap()).get_str("a"), Some("new"));
    }

    #[test]
    fn test_field_adder_generated_counts() {
        let mut next = 0;
        let mut filter = FieldAdder::generated("id", move || {
            next += 1;
            Value::Int(next)
        });
        let ids: Vec<_> = (0..3)
            .map(|_| single(filter.process(Record::new()).unwrap()).get("id").cloned())
            .collect();
        assert_eq!(ids, vec![Some(Value::Int(1)), Some(Value::Int(2)), Some(Value::Int(3))]);
    }

    #[test]
    fn test_field_modifier() {
        let mut filter = FieldModifier::new(["a", "missing"], |v| {
            v.as_i64()
                .map(|n| Value::Int(n * 10))
                .ok_or_else(|| StageError::new("not an integer"))
        });
        let out = single(filter.process(sample()).unwrap());
        assert_eq!(out.get("a"), Some(&Value::Int(10)));
        assert!(!out.contains_key("missing"));

        assert!(filter.process(Record::new().with("a", "x")).is_err());
    }

    #[test]
    fn test_conditional_filter_drop_and_validate() {
        let mut dropper = ConditionalFilter::new("has_a", |r| r.contains_key("a"));
        assert_eq!(dropper.process(Record::new()).unwrap(), Outcome::Dropped);

        let mut validator = ConditionalFilter::validator("has_a", |r| r.contains_key("a"));
        let err = validator.process(Record::new()).unwrap_err();
        assert_eq!(err.kind, "ValidationError");
        assert!(validator.process(sample()).is_ok());
    }

    #[test]
    fn test_unique_and_reset() {
        let mut filter = Unique::new();
        assert_eq!(filter.process(sample()).unwrap().len(), 1);
        assert_eq!(filter.process(sample()).unwrap(), Outcome::Dropped);

        filter.reset();
        assert_eq!(filter.process(sample()).unwrap().len(), 1);
    }

    #[test]
    fn test_unique_validator() {
        let mut filter = Unique::validator();
        filter.process(sample()).unwrap();
        assert!(filter.process(sample()).is_err());
    }

    #[test]
    fn test_unique_id_composite() {
        let mut filter = UniqueId::new(["a", "b"]);
        assert_eq!(filter.process(sample()).unwrap().len(), 1);
        assert_eq!(filter.process(sample().with("c", 99)).unwrap(), Outcome::Dropped);
        assert_eq!(filter.process(sample().with("b", 5)).unwrap().len(), 1);
        assert!(filter.process(Record::new().with("a", 1)).is_err());
    }

    #[test]
    fn test_field_exploder() {
        let mut filter = FieldExploder::new("tags").into_field("tag");
        let record = Record::new().with("id", 1).with("tags", vec!["x", "y"]);
        let outs: Vec<Record> = filter.process(record).unwrap().into_iter().collect();
        assert_eq!(
            outs,
            vec![
                Record::new().with("id", 1).with("tag", "x"),
                Record::new().with("id", 1).with("tag", "y"),
            ]
        );
    }

    #[test]
    fn test_field_exploder_edge_cases() {
        let mut filter = FieldExploder::new("tags");
        assert!(filter.process(Record::new().with("tags", Vec::<Value>::new())).unwrap().is_empty());
        assert_eq!(filter.process(Record::new().with("tags", "solo")).unwrap().len(), 1);
        assert_eq!(filter.process(Record::new()).unwrap().len(), 1);
    }
}
