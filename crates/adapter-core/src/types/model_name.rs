use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// A validated model identifier, used for both logical model names
/// (`"user"`) and physical table names supplied by plugin overrides.
///
/// Unlike the strict PascalCase/snake_case identifiers of a DSL-driven
/// schema, better-auth style model names come from arbitrary plugin and
/// host code, so validation only rules out the empty string and characters
/// that cannot round-trip through a SQL identifier or JSON key: ASCII
/// letters, digits, and underscores, starting with a letter or underscore.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ModelName(String);

impl ModelName {
    pub fn new(s: impl Into<String>) -> Result<Self, CoreError> {
        let s = s.into();
        if !is_valid_identifier(&s) {
            return Err(CoreError::InvalidIdentifier(s));
        }
        Ok(Self(s))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Naive English pluralization used to derive a default table name
    /// (`"user"` -> `"users"`) when a plugin does not override it.
    pub fn pluralized(&self) -> String {
        if self.0.ends_with('s') {
            self.0.clone()
        } else if self.0.ends_with('y')
            && !self.0.ends_with("ay")
            && !self.0.ends_with("ey")
            && !self.0.ends_with("oy")
            && !self.0.ends_with("uy")
        {
            format!("{}ies", &self.0[..self.0.len() - 1])
        } else {
            format!("{}s", self.0)
        }
    }
}

pub(crate) fn is_valid_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

impl fmt::Display for ModelName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<ModelName> for String {
    fn from(n: ModelName) -> String {
        n.0
    }
}

impl TryFrom<String> for ModelName {
    type Error = CoreError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl AsRef<str> for ModelName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_names() {
        for name in ["user", "session", "emailVerified", "_internal", "account2"] {
            assert!(ModelName::new(name).is_ok(), "expected valid: {name}");
        }
    }

    #[test]
    fn invalid_names() {
        for name in ["", "2user", "has-dash", "has space"] {
            assert!(ModelName::new(name).is_err(), "expected invalid: {name}");
        }
    }

    #[test]
    fn pluralizes_naively() {
        assert_eq!(ModelName::new("user").unwrap().pluralized(), "users");
        assert_eq!(ModelName::new("category").unwrap().pluralized(), "categories");
        assert_eq!(ModelName::new("session").unwrap().pluralized(), "sessions");
        assert_eq!(ModelName::new("sessions").unwrap().pluralized(), "sessions");
    }

    #[test]
    fn serde_roundtrip() {
        let name = ModelName::new("user").unwrap();
        let json = serde_json::to_string(&name).unwrap();
        assert_eq!(json, "\"user\"");
        let back: ModelName = serde_json::from_str(&json).unwrap();
        assert_eq!(name, back);
    }

    #[test]
    fn serde_rejects_invalid() {
        assert!(serde_json::from_str::<ModelName>("\"2bad\"").is_err());
    }
}
