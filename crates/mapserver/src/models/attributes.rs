//! Feature attribute values.

use std::collections::BTreeMap;
use std::fmt;

use serde_json::{Map, Value};

use crate::error::DecodeError;

/// A scalar attribute value.
///
/// `Null` is what the server sent as `null`; a field the server did not send
/// at all is simply absent from [`Attributes`].
#[derive(Clone, Debug, PartialEq)]
pub enum AttributeValue {
    Null,
    String(String),
    Integer(i64),
    Float(f64),
}

impl AttributeValue {
    pub fn from_json(field: &str, value: &Value) -> Result<Self, DecodeError> {
        match value {
            Value::Null => Ok(Self::Null),
            Value::String(s) => Ok(Self::String(s.clone())),
            Value::Number(n) => match n.as_i64() {
                Some(i) => Ok(Self::Integer(i)),
                None => n
                    .as_f64()
                    .map(Self::Float)
                    .ok_or_else(|| DecodeError::Schema(format!("{field} is out of range: {n}"))),
            },
            Value::Bool(_) | Value::Array(_) | Value::Object(_) => {
                Err(DecodeError::NonScalarAttribute {
                    field: field.to_string(),
                })
            }
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            Self::Null => Value::Null,
            Self::String(s) => Value::String(s.clone()),
            Self::Integer(i) => Value::from(*i),
            Self::Float(f) => Value::from(*f),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Integer(i) => Some(*i as f64),
            Self::Float(f) => Some(*f),
            _ => None,
        }
    }
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "null"),
            Self::String(s) => write!(f, "{s}"),
            Self::Integer(i) => write!(f, "{i}"),
            Self::Float(x) => write!(f, "{x}"),
        }
    }
}

/// Field name to value mapping of one feature.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Attributes(BTreeMap<String, AttributeValue>);

impl Attributes {
    pub fn from_json(object: &Map<String, Value>) -> Result<Self, DecodeError> {
        object
            .iter()
            .map(|(field, value)| {
                AttributeValue::from_json(field, value).map(|value| (field.clone(), value))
            })
            .collect::<Result<BTreeMap<_, _>, _>>()
            .map(Self)
    }

    pub fn to_json(&self) -> Map<String, Value> {
        self.0
            .iter()
            .map(|(field, value)| (field.clone(), value.to_json()))
            .collect()
    }

    /// `None` when the field is missing, `Some(AttributeValue::Null)` when
    /// the server sent `null`.
    pub fn get(&self, field: &str) -> Option<&AttributeValue> {
        self.0.get(field)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &AttributeValue)> {
        self.0.iter().map(|(field, value)| (field.as_str(), value))
    }

    pub fn insert(&mut self, field: impl Into<String>, value: AttributeValue) {
        self.0.insert(field.into(), value);
    }
}

impl FromIterator<(String, AttributeValue)> for Attributes {
    fn from_iter<I: IntoIterator<Item = (String, AttributeValue)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_null_is_distinct_from_missing() {
        let object = json!({ "TRAILNAME": "Mesa Trail", "CLOSURE": null });
        let attributes = Attributes::from_json(object.as_object().unwrap()).unwrap();

        assert_eq!(attributes.get("CLOSURE"), Some(&AttributeValue::Null));
        assert_eq!(attributes.get("DOGREG"), None);
        assert!(attributes.contains("CLOSURE"));
        assert_eq!(attributes.len(), 2);
    }

    #[test]
    fn test_numbers_keep_integer_precision() {
        let object = json!({ "OBJECTID": 9007199254740993_i64, "MILEAGE": 1.25 });
        let attributes = Attributes::from_json(object.as_object().unwrap()).unwrap();

        assert_eq!(
            attributes.get("OBJECTID").and_then(AttributeValue::as_i64),
            Some(9007199254740993)
        );
        assert_eq!(attributes.get("MILEAGE"), Some(&AttributeValue::Float(1.25)));
    }

    #[test]
    fn test_non_scalar_values_are_rejected() {
        let object = json!({ "NESTED": { "a": 1 } });
        let err = Attributes::from_json(object.as_object().unwrap()).unwrap_err();
        assert!(matches!(err, DecodeError::NonScalarAttribute { field } if field == "NESTED"));

        assert!(AttributeValue::from_json("FLAG", &json!(true)).is_err());
    }

    #[test]
    fn test_json_round_trip_preserves_null() {
        let object = json!({ "A": null, "B": "x", "C": 3 });
        let attributes = Attributes::from_json(object.as_object().unwrap()).unwrap();
        assert_eq!(Value::Object(attributes.to_json()), object);
    }
}
