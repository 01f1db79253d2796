use std::fmt;
use std::sync::Arc;

use super::model_name::ModelName;
use super::value::Value;

/// Context handed to a [`DefaultValue::Generated`] or an on-update generator
/// when it runs, mirroring the `{ model }` argument the id-generation hook
/// receives.
#[derive(Debug, Clone)]
pub struct GenerateContext {
    pub model: ModelName,
}

/// A field's default (or on-update) value: either a literal or a function
/// invoked at create/update time. The literal case is the common one
/// (`email_verified` defaulting to `false`); the generator case covers
/// `created_at`/`updated_at` timestamps and any host-supplied id or token
/// generator.
///
/// Closures aren't `Eq`/`Hash`/serializable, so unlike the teacher's
/// corresponding type this is not round-trippable through serde -- defaults
/// are part of the in-process schema definition, not wire data.
#[derive(Clone)]
pub enum DefaultValue {
    Literal(Value),
    Generated(Arc<dyn Fn(&GenerateContext) -> Value + Send + Sync>),
}

impl DefaultValue {
    pub fn literal(value: Value) -> Self {
        Self::Literal(value)
    }

    pub fn generated<F>(f: F) -> Self
    where
        F: Fn(&GenerateContext) -> Value + Send + Sync + 'static,
    {
        Self::Generated(Arc::new(f))
    }

    /// Resolves this default into a concrete value for the given context.
    pub fn resolve(&self, ctx: &GenerateContext) -> Value {
        match self {
            Self::Literal(v) => v.clone(),
            Self::Generated(f) => f(ctx),
        }
    }
}

impl fmt::Debug for DefaultValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Literal(v) => f.debug_tuple("Literal").field(v).finish(),
            Self::Generated(_) => f.write_str("Generated(<fn>)"),
        }
    }
}

impl fmt::Display for DefaultValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Literal(v) => write!(f, "{v}"),
            Self::Generated(_) => write!(f, "<generated>"),
        }
    }
}

impl PartialEq for DefaultValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Literal(a), Self::Literal(b)) => a == b,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> GenerateContext {
        GenerateContext {
            model: ModelName::new("user").unwrap(),
        }
    }

    #[test]
    fn literal_resolves_to_itself() {
        let dv = DefaultValue::literal(Value::Boolean(false));
        assert_eq!(dv.resolve(&ctx()), Value::Boolean(false));
    }

    #[test]
    fn generated_invokes_closure_with_context() {
        let dv = DefaultValue::generated(|c| Value::String(c.model.as_str().to_string()));
        assert_eq!(dv.resolve(&ctx()), Value::String("user".into()));
    }

    #[test]
    fn display_variants() {
        assert_eq!(DefaultValue::literal(Value::Number(42)).to_string(), "42");
        assert_eq!(DefaultValue::generated(|_| Value::Null).to_string(), "<generated>");
    }

    #[test]
    fn equality_only_for_matching_literals() {
        assert_eq!(
            DefaultValue::literal(Value::Number(1)),
            DefaultValue::literal(Value::Number(1))
        );
        assert_ne!(
            DefaultValue::literal(Value::Number(1)),
            DefaultValue::generated(|_| Value::Number(1))
        );
    }
}
