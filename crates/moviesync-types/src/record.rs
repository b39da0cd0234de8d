//! Denormalized aggregate records and the batches that carry them between
//! stages.
//!
//! A [`Batch`] serializes as a JSON array of flat objects so separately
//! scheduled stages can hand it to each other through files. Key order is
//! preserved (`serde_json` is built with `preserve_order`).

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One entity flattened into field → scalar value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AggregateRecord(Map<String, Value>);

impl AggregateRecord {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite a value. New keys are appended at the end.
    pub fn insert(&mut self, key: impl Into<String>, value: Value) -> Option<Value> {
        self.0.insert(key.into(), value)
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// Rename `from` to `to` in place, keeping the key's position.
    /// Returns `false` when `from` is absent.
    pub fn rename(&mut self, from: &str, to: &str) -> bool {
        if !self.0.contains_key(from) {
            return false;
        }
        let entries = std::mem::take(&mut self.0);
        self.0 = entries
            .into_iter()
            .map(|(k, v)| if k == from { (to.to_string(), v) } else { (k, v) })
            .collect();
        true
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>> FromIterator<(K, Value)> for AggregateRecord {
    fn from_iter<I: IntoIterator<Item = (K, Value)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }
}

/// Ways a batch can fail to be loadable.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BatchShapeError {
    #[error("batch has no fields")]
    EmptyFieldSet,
    #[error("record {index} has {actual} values, expected {expected}")]
    Arity {
        index: usize,
        expected: usize,
        actual: usize,
    },
    #[error("record {index} is missing field '{field}'")]
    MissingField { index: usize, field: String },
}

/// Ordered records sharing one field set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Batch {
    records: Vec<AggregateRecord>,
}

impl Batch {
    #[must_use]
    pub fn new(records: Vec<AggregateRecord>) -> Self {
        Self { records }
    }

    #[must_use]
    pub fn records(&self) -> &[AggregateRecord] {
        &self.records
    }

    #[must_use]
    pub fn into_records(self) -> Vec<AggregateRecord> {
        self.records
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Field names in the order of the first record.
    #[must_use]
    pub fn fields(&self) -> Vec<&str> {
        self.records
            .first()
            .map(|r| r.keys().collect())
            .unwrap_or_default()
    }

    /// Check that every record carries exactly the first record's fields.
    ///
    /// # Errors
    ///
    /// Returns the first [`BatchShapeError`] found, scanning records in
    /// order. An empty batch passes.
    pub fn check_shape(&self) -> Result<(), BatchShapeError> {
        let Some(first) = self.records.first() else {
            return Ok(());
        };
        if first.is_empty() {
            return Err(BatchShapeError::EmptyFieldSet);
        }
        let fields: Vec<&str> = first.keys().collect();
        for (index, record) in self.records.iter().enumerate().skip(1) {
            if record.len() != fields.len() {
                return Err(BatchShapeError::Arity {
                    index,
                    expected: fields.len(),
                    actual: record.len(),
                });
            }
            if let Some(missing) = fields.iter().find(|f| !record.contains(f)) {
                return Err(BatchShapeError::MissingField {
                    index,
                    field: (*missing).to_string(),
                });
            }
        }
        Ok(())
    }
}

impl FromIterator<AggregateRecord> for Batch {
    fn from_iter<I: IntoIterator<Item = AggregateRecord>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}
