//! Record value model
//!
//! Record bodies are heterogeneous maps, so every value is one of a closed set
//! of variants and consumers match on it exhaustively.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Field map of a record body
pub type Fields = BTreeMap<String, RecordValue>;

/// A single value inside a record body.
///
/// Integers and floats are distinct: `5` stays an integer and `5.0` stays a
/// float through parsing, storage and rendering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RecordValue {
    Null,
    Bool(bool),
    Integer(i64),
    Float(f64),
    String(String),
    Array(Vec<RecordValue>),
    Object(Fields),
}

impl RecordValue {
    /// Whether the value is a scalar (not an object or array)
    pub fn is_scalar(&self) -> bool {
        !matches!(self, RecordValue::Array(_) | RecordValue::Object(_))
    }

    /// Borrow the string content, if this is a string
    pub fn as_str(&self) -> Option<&str> {
        match self {
            RecordValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// Name of the JSON type, used in error messages
    pub fn type_name(&self) -> &'static str {
        match self {
            RecordValue::Null => "null",
            RecordValue::Bool(_) => "boolean",
            RecordValue::Integer(_) | RecordValue::Float(_) => "number",
            RecordValue::String(_) => "string",
            RecordValue::Array(_) => "array",
            RecordValue::Object(_) => "object",
        }
    }

    /// Plain-text rendering for table cells.
    ///
    /// Null renders empty; nested values render as compact JSON.
    pub fn to_display(&self) -> String {
        match self {
            RecordValue::Null => String::new(),
            RecordValue::Bool(b) => b.to_string(),
            RecordValue::Integer(i) => i.to_string(),
            RecordValue::String(s) => s.clone(),
            RecordValue::Float(_) | RecordValue::Array(_) | RecordValue::Object(_) => {
                serde_json::to_string(self).unwrap_or_default()
            }
        }
    }
}

impl From<serde_json::Value> for RecordValue {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => RecordValue::Null,
            serde_json::Value::Bool(b) => RecordValue::Bool(b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => RecordValue::Integer(i),
                None => RecordValue::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            serde_json::Value::String(s) => RecordValue::String(s),
            serde_json::Value::Array(items) => {
                RecordValue::Array(items.into_iter().map(RecordValue::from).collect())
            }
            serde_json::Value::Object(map) => RecordValue::Object(
                map.into_iter()
                    .map(|(k, v)| (k, RecordValue::from(v)))
                    .collect(),
            ),
        }
    }
}

impl From<&str> for RecordValue {
    fn from(s: &str) -> Self {
        RecordValue::String(s.to_string())
    }
}

impl From<String> for RecordValue {
    fn from(s: String) -> Self {
        RecordValue::String(s)
    }
}

impl From<i64> for RecordValue {
    fn from(i: i64) -> Self {
        RecordValue::Integer(i)
    }
}

impl From<f64> for RecordValue {
    fn from(f: f64) -> Self {
        RecordValue::Float(f)
    }
}

impl From<bool> for RecordValue {
    fn from(b: bool) -> Self {
        RecordValue::Bool(b)
    }
}

/// Convert a JSON object into a field map
pub fn fields_from_json(map: serde_json::Map<String, serde_json::Value>) -> Fields {
    map.into_iter()
        .map(|(k, v)| (k, RecordValue::from(v)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_integer_and_float_stay_distinct() {
        assert_eq!(RecordValue::from(json!(5)), RecordValue::Integer(5));
        assert_eq!(RecordValue::from(json!(5.0)), RecordValue::Float(5.0));
    }

    #[test]
    fn test_deserialize_nested() {
        let value: RecordValue =
            serde_json::from_str(r#"{"a":[1,2.5,"x",null,true],"b":{"c":"d"}}"#).unwrap();
        let RecordValue::Object(map) = value else {
            panic!("expected object");
        };
        assert_eq!(
            map["a"],
            RecordValue::Array(vec![
                RecordValue::Integer(1),
                RecordValue::Float(2.5),
                RecordValue::String("x".into()),
                RecordValue::Null,
                RecordValue::Bool(true),
            ])
        );
        assert!(!map["b"].is_scalar());
    }

    #[test]
    fn test_serialize_keeps_float_marker() {
        let out = serde_json::to_string(&RecordValue::Float(5.0)).unwrap();
        assert_eq!(out, "5.0");
        let out = serde_json::to_string(&RecordValue::Integer(5)).unwrap();
        assert_eq!(out, "5");
    }

    #[test]
    fn test_display_cells() {
        assert_eq!(RecordValue::Null.to_display(), "");
        assert_eq!(RecordValue::Bool(true).to_display(), "true");
        assert_eq!(RecordValue::String("hi".into()).to_display(), "hi");
        assert_eq!(RecordValue::Float(2.75).to_display(), "2.75");
        assert_eq!(
            RecordValue::Array(vec![RecordValue::Integer(1)]).to_display(),
            "[1]"
        );
    }

    #[test]
    fn test_type_names() {
        assert_eq!(RecordValue::Array(vec![]).type_name(), "array");
        assert_eq!(RecordValue::Object(Fields::new()).type_name(), "object");
        assert_eq!(RecordValue::Float(1.5).type_name(), "number");
    }
}
