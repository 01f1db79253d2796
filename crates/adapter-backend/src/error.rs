use std::fmt;

use auth_adapter_core::CoreError;

/// The error taxonomy surfaced by the Adapter Factory and Internal Adapter.
/// Drivers never throw driver-specific error types at the caller; every
/// failure is folded into one of these variants before it crosses the
/// factory boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum AdapterError {
    /// A model or field alias failed to resolve through every name-resolution
    /// attempt (C1).
    SchemaLookup(CoreError),
    /// A caller-supplied argument does not match the shape an operator or
    /// policy requires (`in`/`not_in` with a scalar value, etc).
    InvalidArgument(CoreError),
    /// A requested capability is not available on the configured driver
    /// (e.g. `useNumberId: true` against a driver with `supportsNumericIds:
    /// false`). Raised at factory construction, not per-call.
    CapabilityMismatch { reason: String },
    /// An error surfaced from the driver, wrapped with operation context.
    DriverFailure {
        operation: String,
        model: String,
        transaction_id: u64,
        message: String,
    },
    /// A `before` hook failed; the operation did not reach the driver.
    HookAbort {
        model: String,
        operation: String,
        message: String,
    },
    /// `transaction()` was invoked against a driver without transaction
    /// support. Informational: the operation still completes sequentially.
    TransactionUnsupported,
}

impl AdapterError {
    pub fn driver_failure(operation: impl Into<String>, model: impl Into<String>, transaction_id: u64, message: impl fmt::Display) -> Self {
        Self::DriverFailure {
            operation: operation.into(),
            model: model.into(),
            transaction_id,
            message: message.to_string(),
        }
    }
}

impl fmt::Display for AdapterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SchemaLookup(e) => write!(f, "schema lookup failed: {e}"),
            Self::InvalidArgument(e) => write!(f, "invalid argument: {e}"),
            Self::CapabilityMismatch { reason } => write!(f, "capability mismatch: {reason}"),
            Self::DriverFailure {
                operation,
                model,
                transaction_id,
                message,
            } => write!(
                f,
                "driver failure during '{operation}' on '{model}' (tx {transaction_id}): {message}"
            ),
            Self::HookAbort { model, operation, message } => {
                write!(f, "'{operation}' on '{model}' aborted by hook: {message}")
            }
            Self::TransactionUnsupported => {
                write!(f, "transaction() invoked against a driver without transaction support; ran sequentially")
            }
        }
    }
}

impl std::error::Error for AdapterError {}

impl From<CoreError> for AdapterError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::InvalidPredicate { .. } | CoreError::UnknownOperator(_) => Self::InvalidArgument(err),
            _ => Self::SchemaLookup(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_model_classifies_as_schema_lookup() {
        let err: AdapterError = CoreError::UnknownModel("widget".into()).into();
        assert!(matches!(err, AdapterError::SchemaLookup(_)));
    }

    #[test]
    fn invalid_predicate_classifies_as_invalid_argument() {
        let err: AdapterError = CoreError::InvalidPredicate {
            field: "id".into(),
            reason: "not an array".into(),
        }
        .into();
        assert!(matches!(err, AdapterError::InvalidArgument(_)));
    }

    #[test]
    fn driver_failure_message_includes_context() {
        let err = AdapterError::driver_failure("create", "user", 7, "connection reset");
        let msg = err.to_string();
        assert!(msg.contains("create"));
        assert!(msg.contains("user"));
        assert!(msg.contains('7'));
        assert!(msg.contains("connection reset"));
    }

    #[test]
    fn error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<AdapterError>();
    }
}
