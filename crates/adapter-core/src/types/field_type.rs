use serde::{Deserialize, Serialize};

/// The closed set of field types a model attribute may declare.
///
/// Mirrors the closed set of driver capability flags (`supports_booleans`,
/// `supports_dates`, `supports_json`, `supports_arrays`): every variant here
/// has a matching capability that the field transform consults to decide
/// whether a value needs coercion on the way to or from a driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[non_exhaustive]
pub enum FieldType {
    String,
    Number,
    Boolean,
    Date,
    Json,
    StringArray,
    NumberArray,
}

impl FieldType {
    /// `true` for the two array variants.
    pub fn is_array(self) -> bool {
        matches!(self, Self::StringArray | Self::NumberArray)
    }
}

impl std::fmt::Display for FieldType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::String => write!(f, "string"),
            Self::Number => write!(f, "number"),
            Self::Boolean => write!(f, "boolean"),
            Self::Date => write!(f, "date"),
            Self::Json => write!(f, "json"),
            Self::StringArray => write!(f, "string[]"),
            Self::NumberArray => write!(f, "number[]"),
        }
    }
}
