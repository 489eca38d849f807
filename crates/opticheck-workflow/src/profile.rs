//! Profile records as read from, and written to, the record store.

use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;

/// Column that joins store rows to face-matcher labels.
pub const IDENTITY_FIELD: &str = "Verified Users";

/// One cell value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Integer(i64),
    Real(f64),
    Text(String),
}

impl FieldValue {
    /// Numeric reading of the value; text is parsed. Non-finite values are rejected.
    pub fn as_number(&self) -> Option<f64> {
        let n = match self {
            FieldValue::Integer(i) => *i as f64,
            FieldValue::Real(r) => *r,
            FieldValue::Text(s) => s.trim().parse::<f64>().ok()?,
        };
        n.is_finite().then_some(n)
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Integer(i) => write!(f, "{i}"),
            FieldValue::Real(r) => write!(f, "{r}"),
            FieldValue::Text(s) => f.write_str(s),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        FieldValue::Text(s.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(s: String) -> Self {
        FieldValue::Text(s)
    }
}

impl From<i64> for FieldValue {
    fn from(i: i64) -> Self {
        FieldValue::Integer(i)
    }
}

impl From<f64> for FieldValue {
    fn from(r: f64) -> Self {
        FieldValue::Real(r)
    }
}

/// Ordered field name → value mapping for one identity.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ProfileRecord {
    fields: Vec<(String, FieldValue)>,
}

impl ProfileRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.fields.iter().find(|(k, _)| k == name).map(|(_, v)| v)
    }

    /// Replace the value in place, or append a new field at the end.
    pub fn set(&mut self, name: &str, value: FieldValue) {
        match self.fields.iter_mut().find(|(k, _)| k == name) {
            Some((_, slot)) => *slot = value,
            None => self.fields.push((name.to_string(), value)),
        }
    }

    pub fn with(mut self, name: &str, value: impl Into<FieldValue>) -> Self {
        self.set(name, value.into());
        self
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// The identity label, if the record carries one.
    pub fn identity(&self) -> Option<String> {
        self.get(IDENTITY_FIELD).map(|v| v.to_string())
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Temporary profile used when the store has no row for a recognized label.
    pub fn fallback(label: &str) -> Self {
        Self::new()
            .with(IDENTITY_FIELD, label)
            .with("Age", 30i64)
            .with("Weight", 150.0f64)
            .with("Height", 170.0f64)
            .with("Last Check-in", "2025-02-25")
            .with("Blood Pressure", "120/80")
            .with("Notes", "Created from fallback data")
    }
}

impl FromIterator<(String, FieldValue)> for ProfileRecord {
    fn from_iter<I: IntoIterator<Item = (String, FieldValue)>>(iter: I) -> Self {
        let mut record = ProfileRecord::new();
        for (k, v) in iter {
            record.set(&k, v);
        }
        record
    }
}

impl Serialize for ProfileRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (k, v) in &self.fields {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}
