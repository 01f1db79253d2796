use std::fmt;

/// Errors raised by the pure, synchronous modules: schema composition,
/// field transform, the where-clause compiler, and the migration planner.
///
/// Driver I/O failures, hook aborts, and capability mismatches detected at
/// factory construction live in `auth-adapter-backend::error::AdapterError`,
/// which wraps this type as one of its variants.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum CoreError {
    /// A model name used in a query/predicate is not present in the composed schema.
    UnknownModel(String),
    /// A field name is not present on the named model.
    UnknownField { model: String, field: String },
    /// An identifier failed the logical/physical name validation.
    InvalidIdentifier(String),
    /// Two plugin schemas (or a plugin and the base schema) declared the same
    /// model with conflicting required-field definitions.
    FieldConflict {
        model: String,
        field: String,
        reason: String,
    },
    /// A composed schema would end up with zero fields on a model.
    EmptyModel(String),
    /// A where-clause predicate's value does not match its operator's shape
    /// (e.g. `in`/`not_in` given a non-array value).
    InvalidPredicate { field: String, reason: String },
    /// A where-clause predicate used an operator that is not in the closed set.
    UnknownOperator(String),
    /// A field attribute declared a type that cannot be reconciled with a
    /// supplied literal default value.
    InvalidDefaultValue { field: String, reason: String },
}

impl fmt::Display for CoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownModel(m) => write!(f, "unknown model '{m}'"),
            Self::UnknownField { model, field } => {
                write!(f, "model '{model}' has no field '{field}'")
            }
            Self::InvalidIdentifier(s) => write!(f, "invalid identifier '{s}'"),
            Self::FieldConflict {
                model,
                field,
                reason,
            } => write!(f, "conflicting definition of '{model}.{field}': {reason}"),
            Self::EmptyModel(m) => write!(f, "model '{m}' has no fields after composition"),
            Self::InvalidPredicate { field, reason } => {
                write!(f, "invalid predicate on '{field}': {reason}")
            }
            Self::UnknownOperator(op) => write!(f, "unknown where-clause operator '{op}'"),
            Self::InvalidDefaultValue { field, reason } => {
                write!(f, "invalid default value for '{field}': {reason}")
            }
        }
    }
}

impl std::error::Error for CoreError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_messages() {
        let cases = vec![
            (CoreError::UnknownModel("Widget".into()), "unknown model 'Widget'"),
            (
                CoreError::UnknownField {
                    model: "user".into(),
                    field: "nope".into(),
                },
                "model 'user' has no field 'nope'",
            ),
            (
                CoreError::UnknownOperator("regex".into()),
                "unknown where-clause operator 'regex'",
            ),
        ];
        for (error, expected_prefix) in cases {
            let msg = error.to_string();
            assert!(msg.starts_with(expected_prefix), "got '{msg}'");
        }
    }

    #[test]
    fn error_is_std_error() {
        let err: Box<dyn std::error::Error> = Box::new(CoreError::UnknownModel("x".into()));
        assert!(err.to_string().contains("unknown model"));
    }
}
