use serde::{Deserialize, Serialize};

use super::field_name::FieldName;
use super::model_name::ModelName;

/// Behavior when the referenced row is deleted. Defaults to `Cascade`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum OnDelete {
    Cascade,
    SetNull,
    Restrict,
    NoAction,
}

impl Default for OnDelete {
    fn default() -> Self {
        Self::Cascade
    }
}

/// A foreign-key style reference from one field to a field on another model,
/// used by the join resolver to detect forward/backward relations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reference {
    pub model: ModelName,
    pub field: FieldName,
    #[serde(default)]
    pub on_delete: OnDelete,
}

impl Reference {
    pub fn new(model: ModelName, field: FieldName) -> Self {
        Self {
            model,
            field,
            on_delete: OnDelete::default(),
        }
    }

    pub fn with_on_delete(mut self, on_delete: OnDelete) -> Self {
        self.on_delete = on_delete;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_on_delete_is_cascade() {
        let r = Reference::new(ModelName::new("user").unwrap(), FieldName::new("id").unwrap());
        assert_eq!(r.on_delete, OnDelete::Cascade);
    }

    #[test]
    fn serde_roundtrip() {
        let r = Reference::new(ModelName::new("user").unwrap(), FieldName::new("id").unwrap())
            .with_on_delete(OnDelete::SetNull);
        let json = serde_json::to_string(&r).unwrap();
        let back: Reference = serde_json::from_str(&json).unwrap();
        assert_eq!(r, back);
    }
}
