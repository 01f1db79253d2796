use serde::{Deserialize, Serialize};

use super::field_type::FieldType;

/// Runtime value carried through the adapter pipeline: logical values coming
/// from or going to the framework host, and driver-coerced values going to or
/// coming from storage. One enum serves both roles, matching how the field
/// transform's coercion fallthrough (boolean -> integer -> string) only ever
/// narrows a value into another variant of the same type, never a distinct
/// wire representation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value")]
#[non_exhaustive]
pub enum Value {
    Null,
    String(String),
    Number(i64),
    Boolean(bool),
    Date(chrono::DateTime<chrono::Utc>),
    Json(serde_json::Value),
    StringArray(Vec<String>),
    NumberArray(Vec<i64>),
}

impl Value {
    /// The [`FieldType`] this value would naturally be declared as, or
    /// `None` for `Null` (null has no intrinsic type).
    pub fn field_type(&self) -> Option<FieldType> {
        match self {
            Self::Null => None,
            Self::String(_) => Some(FieldType::String),
            Self::Number(_) => Some(FieldType::Number),
            Self::Boolean(_) => Some(FieldType::Boolean),
            Self::Date(_) => Some(FieldType::Date),
            Self::Json(_) => Some(FieldType::Json),
            Self::StringArray(_) => Some(FieldType::StringArray),
            Self::NumberArray(_) => Some(FieldType::NumberArray),
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

    pub fn as_number(&self) -> Option<i64> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Boolean(b) => Some(*b),
            _ => None,
        }
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Null => write!(f, "null"),
            Self::String(s) => write!(f, "\"{s}\""),
            Self::Number(n) => write!(f, "{n}"),
            Self::Boolean(b) => write!(f, "{b}"),
            Self::Date(dt) => write!(f, "{dt}"),
            Self::Json(v) => write!(f, "{v}"),
            Self::StringArray(items) => {
                write!(f, "[")?;
                for (i, v) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "\"{v}\"")?;
                }
                write!(f, "]")
            }
            Self::NumberArray(items) => {
                write!(f, "[")?;
                for (i, v) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{v}")?;
                }
                write!(f, "]")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_primitives() {
        assert_eq!(Value::Null.to_string(), "null");
        assert_eq!(Value::String("hi".into()).to_string(), "\"hi\"");
        assert_eq!(Value::Number(42).to_string(), "42");
        assert_eq!(Value::Boolean(true).to_string(), "true");
    }

    #[test]
    fn field_type_matches_variant() {
        assert_eq!(Value::String("x".into()).field_type(), Some(FieldType::String));
        assert_eq!(Value::Null.field_type(), None);
        assert_eq!(
            Value::NumberArray(vec![1, 2]).field_type(),
            Some(FieldType::NumberArray)
        );
    }

    #[test]
    fn serde_roundtrip_primitives() {
        let values = vec![
            Value::Null,
            Value::String("hello".into()),
            Value::Number(42),
            Value::Boolean(false),
        ];
        for v in values {
            let json = serde_json::to_string(&v).unwrap();
            let back: Value = serde_json::from_str(&json).unwrap();
            assert_eq!(v, back);
        }
    }

    #[test]
    fn serde_roundtrip_arrays() {
        let v = Value::StringArray(vec!["a".into(), "b".into()]);
        let json = serde_json::to_string(&v).unwrap();
        let back: Value = serde_json::from_str(&json).unwrap();
        assert_eq!(v, back);
    }

    #[test]
    fn serde_roundtrip_json() {
        let v = Value::Json(serde_json::json!({"key": [1, 2, 3]}));
        let json = serde_json::to_string(&v).unwrap();
        let back: Value = serde_json::from_str(&json).unwrap();
        assert_eq!(v, back);
    }

    #[test]
    fn serde_roundtrip_date() {
        let dt = chrono::Utc::now();
        let v = Value::Date(dt);
        let json = serde_json::to_string(&v).unwrap();
        let back: Value = serde_json::from_str(&json).unwrap();
        assert_eq!(v, back);
    }
}
