//! Core record types for latticedb.
//!
//! A [`Record`] is the unit of storage: a stable integer id, a dense f32
//! vector of table-fixed dimension, and an unordered payload mapping field
//! names to scalar [`PayloadValue`]s. An optional [`Schema`] constrains the
//! payload shape.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::{Error, Result};

/// Stable record identifier. Allocated monotonically, never reused.
pub type RecordId = u64;

/// A typed scalar value attached to a record payload.
///
/// Used for filtering, scalar indexing, and projection. Uses the default
/// externally-tagged serde representation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum PayloadValue {
    /// UTF-8 string.
    String(String),
    /// 64-bit signed integer.
    Integer(i64),
    /// 64-bit floating-point number.
    Float(f64),
    /// Boolean value (`true` / `false`).
    Boolean(bool),
    /// Explicit null.
    Null,
}

impl PayloadValue {
    /// Human-readable type name, used in schema violation messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            PayloadValue::String(_) => "string",
            PayloadValue::Integer(_) => "integer",
            PayloadValue::Float(_) => "float",
            PayloadValue::Boolean(_) => "boolean",
            PayloadValue::Null => "null",
        }
    }

    /// Converts an untagged JSON value at the payload boundary. Numbers
    /// that fit i64 become `Integer`, everything else numeric becomes
    /// `Float`. Arrays and objects are not payload scalars.
    pub fn from_json(value: serde_json::Value) -> Result<PayloadValue> {
        match value {
            serde_json::Value::Null => Ok(PayloadValue::Null),
            serde_json::Value::Bool(b) => Ok(PayloadValue::Boolean(b)),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Ok(PayloadValue::Integer(i))
                } else if let Some(f) = n.as_f64() {
                    Ok(PayloadValue::Float(f))
                } else {
                    Err(Error::SchemaViolation(format!(
                        "number {n} is not representable as a payload value"
                    )))
                }
            }
            serde_json::Value::String(s) => Ok(PayloadValue::String(s)),
            serde_json::Value::Array(_) => Err(Error::SchemaViolation(
                "payload values must be scalar, got an array".into(),
            )),
            serde_json::Value::Object(_) => Err(Error::SchemaViolation(
                "payload values must be scalar, got an object".into(),
            )),
        }
    }

    /// Renders the value as untagged JSON.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            PayloadValue::String(s) => serde_json::Value::String(s.clone()),
            PayloadValue::Integer(i) => serde_json::Value::from(*i),
            PayloadValue::Float(f) => {
                serde_json::Number::from_f64(*f).map_or(serde_json::Value::Null, serde_json::Value::Number)
            }
            PayloadValue::Boolean(b) => serde_json::Value::Bool(*b),
            PayloadValue::Null => serde_json::Value::Null,
        }
    }

    /// Equality with Integer/Float unified numerically.
    pub fn loose_eq(&self, other: &PayloadValue) -> bool {
        match (self, other) {
            (PayloadValue::String(a), PayloadValue::String(b)) => a == b,
            (PayloadValue::Boolean(a), PayloadValue::Boolean(b)) => a == b,
            (PayloadValue::Integer(a), PayloadValue::Integer(b)) => a == b,
            (PayloadValue::Float(a), PayloadValue::Float(b)) => a == b,
            (PayloadValue::Integer(a), PayloadValue::Float(b))
            | (PayloadValue::Float(b), PayloadValue::Integer(a)) => *a as f64 == *b,
            (PayloadValue::Null, PayloadValue::Null) => true,
            _ => false,
        }
    }
}

impl From<&str> for PayloadValue {
    fn from(s: &str) -> Self {
        PayloadValue::String(s.to_string())
    }
}

impl From<String> for PayloadValue {
    fn from(s: String) -> Self {
        PayloadValue::String(s)
    }
}

impl From<i64> for PayloadValue {
    fn from(i: i64) -> Self {
        PayloadValue::Integer(i)
    }
}

impl From<f64> for PayloadValue {
    fn from(f: f64) -> Self {
        PayloadValue::Float(f)
    }
}

impl From<bool> for PayloadValue {
    fn from(b: bool) -> Self {
        PayloadValue::Boolean(b)
    }
}

/// Record payload: field name → scalar value.
///
/// A `BTreeMap` keeps iteration order deterministic for projection and
/// equality checks.
pub type Payload = BTreeMap<String, PayloadValue>;

/// Builds a payload from an untagged JSON object.
pub fn payload_from_json(value: serde_json::Value) -> Result<Payload> {
    let serde_json::Value::Object(map) = value else {
        return Err(Error::SchemaViolation(
            "payload must be a JSON object".into(),
        ));
    };
    map.into_iter()
        .map(|(field, v)| Ok((field, PayloadValue::from_json(v)?)))
        .collect()
}

/// Renders a payload as an untagged JSON object.
pub fn payload_to_json(payload: &Payload) -> serde_json::Value {
    serde_json::Value::Object(
        payload
            .iter()
            .map(|(field, v)| (field.clone(), v.to_json()))
            .collect(),
    )
}

/// A stored record: id, vector, payload.
///
/// The token multiset for configured text fields is derived on mutation and
/// owned by the full-text index, not the record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Record {
    /// Stable unique identifier.
    pub id: RecordId,
    /// Dense embedding of table-fixed dimension.
    pub vector: Vec<f32>,
    /// Arbitrary key-value payload.
    pub payload: Payload,
}

/// Expected type of a schema field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    String,
    Integer,
    Float,
    Boolean,
}

impl FieldType {
    fn matches(&self, value: &PayloadValue) -> bool {
        matches!(
            (self, value),
            (FieldType::String, PayloadValue::String(_))
                | (FieldType::Integer, PayloadValue::Integer(_))
                | (FieldType::Float, PayloadValue::Float(_))
                | (FieldType::Boolean, PayloadValue::Boolean(_))
        )
    }
}

/// Optional payload schema.
///
/// When present, unknown fields are rejected and declared fields missing
/// from a payload are stored as [`PayloadValue::Null`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Schema {
    fields: BTreeMap<String, FieldType>,
}

impl Schema {
    /// Creates an empty schema (rejects every field).
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares a field with its expected type.
    pub fn field(mut self, name: &str, ty: FieldType) -> Self {
        self.fields.insert(name.to_string(), ty);
        self
    }

    /// Validates a payload against the schema and fills missing declared
    /// fields with `Null`. Returns the normalized payload.
    pub fn normalize(&self, payload: Payload) -> Result<Payload> {
        for (name, value) in &payload {
            let Some(expected) = self.fields.get(name) else {
                return Err(Error::SchemaViolation(format!("unknown field '{name}'")));
            };
            if !matches!(value, PayloadValue::Null) && !expected.matches(value) {
                return Err(Error::SchemaViolation(format!(
                    "field '{name}': expected {expected:?}, got {}",
                    value.type_name()
                )));
            }
        }
        let mut normalized = payload;
        for name in self.fields.keys() {
            normalized
                .entry(name.clone())
                .or_insert(PayloadValue::Null);
        }
        Ok(normalized)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload(pairs: Vec<(&str, PayloadValue)>) -> Payload {
        pairs.into_iter().map(|(k, v)| (k.to_string(), v)).collect()
    }

    #[test]
    fn test_loose_eq_numeric() {
        assert!(PayloadValue::Integer(3).loose_eq(&PayloadValue::Float(3.0)));
        assert!(!PayloadValue::Integer(3).loose_eq(&PayloadValue::Float(3.5)));
        assert!(!PayloadValue::Integer(3).loose_eq(&PayloadValue::String("3".into())));
    }

    #[test]
    fn test_schema_rejects_unknown_field() {
        let schema = Schema::new().field("title", FieldType::String);
        let err = schema
            .normalize(payload(vec![("author", "x".into())]))
            .unwrap_err();
        assert!(matches!(err, Error::SchemaViolation(_)));
    }

    #[test]
    fn test_schema_rejects_type_mismatch() {
        let schema = Schema::new().field("count", FieldType::Integer);
        let err = schema
            .normalize(payload(vec![("count", "ten".into())]))
            .unwrap_err();
        assert!(matches!(err, Error::SchemaViolation(_)));
    }

    #[test]
    fn test_schema_fills_missing_with_null() {
        let schema = Schema::new()
            .field("title", FieldType::String)
            .field("year", FieldType::Integer);
        let normalized = schema
            .normalize(payload(vec![("title", "dune".into())]))
            .unwrap();
        assert!(matches!(normalized.get("year"), Some(PayloadValue::Null)));
    }

    #[test]
    fn test_schema_allows_explicit_null() {
        let schema = Schema::new().field("year", FieldType::Integer);
        let normalized = schema
            .normalize(payload(vec![("year", PayloadValue::Null)]))
            .unwrap();
        assert!(matches!(normalized.get("year"), Some(PayloadValue::Null)));
    }

    #[test]
    fn test_payload_from_json_scalars() {
        let p = payload_from_json(serde_json::json!({
            "title": "dune",
            "year": 1965,
            "rating": 4.5,
            "in_print": true,
            "isbn": null,
        }))
        .unwrap();
        assert!(matches!(p.get("title"), Some(PayloadValue::String(s)) if s == "dune"));
        assert!(matches!(p.get("year"), Some(PayloadValue::Integer(1965))));
        assert!(matches!(p.get("rating"), Some(PayloadValue::Float(f)) if *f == 4.5));
        assert!(matches!(p.get("in_print"), Some(PayloadValue::Boolean(true))));
        assert!(matches!(p.get("isbn"), Some(PayloadValue::Null)));
    }

    #[test]
    fn test_payload_from_json_rejects_nested() {
        let err = payload_from_json(serde_json::json!({"tags": ["a", "b"]})).unwrap_err();
        assert!(matches!(err, Error::SchemaViolation(_)));
        let err = payload_from_json(serde_json::json!({"meta": {"k": 1}})).unwrap_err();
        assert!(matches!(err, Error::SchemaViolation(_)));
        let err = payload_from_json(serde_json::json!("not an object")).unwrap_err();
        assert!(matches!(err, Error::SchemaViolation(_)));
    }

    #[test]
    fn test_payload_json_round_trip() {
        let original = serde_json::json!({
            "name": "ada",
            "age": 36,
            "active": false,
            "note": null,
        });
        let p = payload_from_json(original.clone()).unwrap();
        assert_eq!(payload_to_json(&p), original);
    }
}
