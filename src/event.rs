//! Domain events consumed by state providers and the latency analysis.
//!
//! The store only depends on this abstraction; reading events out of a trace
//! file is the caller's job.

use crate::types::Timestamp;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Payload field value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Int(i64),
    Float(f64),
    Str(String),
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Int(v) => write!(f, "{}", v),
            FieldValue::Float(v) => write!(f, "{}", v),
            FieldValue::Str(s) => write!(f, "{}", s),
        }
    }
}

impl From<i64> for FieldValue {
    fn from(v: i64) -> Self {
        FieldValue::Int(v)
    }
}

impl From<i32> for FieldValue {
    fn from(v: i32) -> Self {
        FieldValue::Int(i64::from(v))
    }
}

impl From<f64> for FieldValue {
    fn from(v: f64) -> Self {
        FieldValue::Float(v)
    }
}

impl From<&str> for FieldValue {
    fn from(v: &str) -> Self {
        FieldValue::Str(v.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(v: String) -> Self {
        FieldValue::Str(v)
    }
}

/// One timestamped event with named payload fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub name: String,
    pub timestamp: Timestamp,
    #[serde(default)]
    pub fields: FxHashMap<String, FieldValue>,
}

impl Event {
    pub fn new<S: Into<String>>(name: S, timestamp: Timestamp) -> Self {
        Self {
            name: name.into(),
            timestamp,
            fields: FxHashMap::default(),
        }
    }

    pub fn with_field<K: Into<String>, V: Into<FieldValue>>(mut self, key: K, value: V) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    pub fn field(&self, key: &str) -> Option<&FieldValue> {
        self.fields.get(key)
    }

    /// String field; `None` if missing or not a string.
    pub fn field_str(&self, key: &str) -> Option<&str> {
        match self.field(key)? {
            FieldValue::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Integer field; `None` if missing or not an integer.
    pub fn field_int(&self, key: &str) -> Option<i64> {
        match self.field(key)? {
            FieldValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// Numeric field, integer or float; `None` otherwise.
    pub fn field_number(&self, key: &str) -> Option<&FieldValue> {
        self.field(key)
            .filter(|value| matches!(value, FieldValue::Int(_) | FieldValue::Float(_)))
    }

    /// Field rendered as text, whatever its type.
    pub fn field_formatted(&self, key: &str) -> Option<String> {
        self.field(key).map(ToString::to_string)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_typed_getters() {
        let event = Event::new("processStart", 100)
            .with_field("requester", "alice")
            .with_field("id", 42)
            .with_field("value", 1.5);

        assert_eq!(event.field_str("requester"), Some("alice"));
        assert_eq!(event.field_int("id"), Some(42));
        assert_eq!(event.field_int("requester"), None);
        assert_eq!(event.field_str("id"), None);
        assert_eq!(event.field("value"), Some(&FieldValue::Float(1.5)));
        assert_eq!(event.field_formatted("id").as_deref(), Some("42"));
        assert_eq!(event.field_number("value"), Some(&FieldValue::Float(1.5)));
        assert!(event.field_number("requester").is_none());
        assert!(event.field("missing").is_none());
    }

    #[test]
    fn test_deserialize_from_json() {
        let event: Event = serde_json::from_str(
            r#"{"name":"start","timestamp":5,"fields":{"requester":"bob","id":3,"value":2.5}}"#,
        )
        .unwrap();

        assert_eq!(event.name, "start");
        assert_eq!(event.timestamp, 5);
        assert_eq!(event.field_str("requester"), Some("bob"));
        assert_eq!(event.field_int("id"), Some(3));
        assert_eq!(event.field("value"), Some(&FieldValue::Float(2.5)));
    }

    #[test]
    fn test_fields_default_to_empty() {
        let event: Event = serde_json::from_str(r#"{"name":"tick","timestamp":1}"#).unwrap();
        assert!(event.fields.is_empty());
    }
}
