use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Attribute value types accepted by the tracing engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeValue {
    String(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    StringArray(Vec<String>),
}

/// Normalized attribute set.
pub type Attributes = BTreeMap<String, AttributeValue>;

impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for AttributeValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<i64> for AttributeValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<f64> for AttributeValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<bool> for AttributeValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

fn element_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Maps an arbitrary value into the engine's attribute domain.
///
/// Scalars pass through, arrays become arrays of strings, and anything else
/// (objects, null) becomes its JSON text.
pub fn normalize_value(value: &Value) -> AttributeValue {
    match value {
        Value::String(s) => AttributeValue::String(s.clone()),
        Value::Bool(b) => AttributeValue::Bool(*b),
        Value::Number(n) => match n.as_i64() {
            Some(i) => AttributeValue::Int(i),
            None => AttributeValue::Float(n.as_f64().unwrap_or(f64::NAN)),
        },
        Value::Array(items) => {
            AttributeValue::StringArray(items.iter().map(element_to_string).collect())
        }
        Value::Null | Value::Object(_) => AttributeValue::String(value.to_string()),
    }
}

/// Normalizes a list of raw key/value pairs.
pub fn normalize(raw: &[(&str, Value)]) -> Attributes {
    raw.iter()
        .map(|(key, value)| ((*key).to_string(), normalize_value(value)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn scalars_pass_through() {
        let attrs = normalize(&[
            ("s", json!("GET")),
            ("i", json!(200)),
            ("f", json!(1.5)),
            ("b", json!(true)),
        ]);
        assert_eq!(attrs["s"], AttributeValue::String("GET".into()));
        assert_eq!(attrs["i"], AttributeValue::Int(200));
        assert_eq!(attrs["f"], AttributeValue::Float(1.5));
        assert_eq!(attrs["b"], AttributeValue::Bool(true));
    }

    #[test]
    fn arrays_become_string_arrays() {
        let attrs = normalize(&[("ids", json!([1, "two", false, null]))]);
        assert_eq!(
            attrs["ids"],
            AttributeValue::StringArray(vec![
                "1".into(),
                "two".into(),
                "false".into(),
                "null".into()
            ])
        );
    }

    #[test]
    fn other_values_are_stringified() {
        let attrs = normalize(&[("user", json!({"id": 7})), ("missing", Value::Null)]);
        assert_eq!(attrs["user"], AttributeValue::String(r#"{"id":7}"#.into()));
        assert_eq!(attrs["missing"], AttributeValue::String("null".into()));
    }

    #[test]
    fn large_unsigned_becomes_float() {
        let attrs = normalize(&[("big", json!(u64::MAX))]);
        assert!(matches!(attrs["big"], AttributeValue::Float(_)));
    }
}
