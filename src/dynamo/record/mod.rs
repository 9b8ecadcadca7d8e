//! Record model: dynamic field values, ordered records, and type schemas
//!
//! A record is an ordered list of named field values; the order is the
//! record type's declaration order and doubles as the wire order for
//! positional codecs. The schema travels with the factory that produces
//! the type, so codecs never have to reflect over anything at runtime.

pub mod factory;

pub use factory::{GameEventFactory, ObjectFactory, RecordFactory};

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A single dynamically-typed field value.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    String(String),
    Integer(i64),
    Float(f64),
    Boolean(bool),
    Timestamp(DateTime<Utc>),
    Null,
}

impl FieldValue {
    /// The declared kind this value belongs to. `Null` reports `String`
    /// since a null carries no type of its own.
    pub fn kind(&self) -> FieldKind {
        match self {
            FieldValue::String(_) | FieldValue::Null => FieldKind::String,
            FieldValue::Integer(_) => FieldKind::Integer,
            FieldValue::Float(_) => FieldKind::Float,
            FieldValue::Boolean(_) => FieldKind::Boolean,
            FieldValue::Timestamp(_) => FieldKind::Timestamp,
        }
    }
}

impl fmt::Display for FieldValue {
    /// Text-codec string form. Timestamps render as RFC-3339 with
    /// millisecond precision; null renders as the empty string.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::String(s) => write!(f, "{}", s),
            FieldValue::Integer(i) => write!(f, "{}", i),
            FieldValue::Float(v) => write!(f, "{}", v),
            FieldValue::Boolean(b) => write!(f, "{}", b),
            FieldValue::Timestamp(ts) => {
                write!(f, "{}", ts.to_rfc3339_opts(SecondsFormat::Millis, true))
            }
            FieldValue::Null => Ok(()),
        }
    }
}

/// Declared kind of a record field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FieldKind {
    String,
    Integer,
    Float,
    Boolean,
    Timestamp,
}

/// One field declaration: name plus kind, in declaration order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSpec {
    pub name: String,
    pub kind: FieldKind,
}

impl FieldSpec {
    pub fn new(name: impl Into<String>, kind: FieldKind) -> Self {
        FieldSpec {
            name: name.into(),
            kind,
        }
    }
}

/// Schema of a record type: the type name and its ordered fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordSchema {
    pub name: String,
    pub fields: Vec<FieldSpec>,
}

impl RecordSchema {
    pub fn new(name: impl Into<String>, fields: Vec<FieldSpec>) -> Self {
        RecordSchema {
            name: name.into(),
            fields,
        }
    }

    /// Look up a field declaration by name.
    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }
}

/// A single produced record: named values in declaration order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Record {
    fields: Vec<(String, FieldValue)>,
}

impl Record {
    pub fn new() -> Self {
        Record { fields: Vec::new() }
    }

    /// Append a field. Order of insertion is the wire order.
    pub fn push(&mut self, name: impl Into<String>, value: FieldValue) {
        self.fields.push((name.into(), value));
    }

    /// Builder-style variant of [`push`](Record::push).
    pub fn with(mut self, name: impl Into<String>, value: FieldValue) -> Self {
        self.push(name, value);
        self
    }

    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.fields
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
    }

    /// Replace the value of an existing field; ignored when absent.
    pub fn set(&mut self, name: &str, value: FieldValue) {
        if let Some(slot) = self.fields.iter_mut().find(|(n, _)| n == name) {
            slot.1 = value;
        }
    }

    /// Stamp every timestamp-valued field with the given instant. Used by
    /// the hourly-range engine to tag records with their bucket time.
    pub fn stamp(&mut self, at: DateTime<Utc>) {
        for (_, value) in self.fields.iter_mut() {
            if matches!(value, FieldValue::Timestamp(_)) {
                *value = FieldValue::Timestamp(at);
            }
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.fields.iter().map(|(n, v)| (n.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl FromIterator<(String, FieldValue)> for Record {
    fn from_iter<I: IntoIterator<Item = (String, FieldValue)>>(iter: I) -> Self {
        Record {
            fields: iter.into_iter().collect(),
        }
    }
}
