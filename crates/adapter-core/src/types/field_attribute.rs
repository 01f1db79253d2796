use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::default_value::DefaultValue;
use super::field_name::FieldName;
use super::field_type::FieldType;
use super::reference::Reference;
use super::value::Value;

/// A field-declared input/output transform hook: a pure function applied to
/// a value on the way into storage (`input`) or on the way back out to the
/// framework host (`output`). Composed with any capability-driven coercion
/// the field transform applies, input hooks run before coercion and output
/// hooks run after.
#[derive(Clone)]
pub struct TransformHook(Arc<dyn Fn(Value) -> Value + Send + Sync>);

impl TransformHook {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(Value) -> Value + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }

    pub fn apply(&self, value: Value) -> Value {
        (self.0)(value)
    }
}

impl fmt::Debug for TransformHook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("TransformHook(<fn>)")
    }
}

/// A complete field attribute as declared on a model: type, physical name
/// override, required/unique/sortable/bigint flags, a reference to another
/// model's field, literal or generated defaults, and optional transform
/// hooks.
#[derive(Clone)]
pub struct FieldAttribute {
    pub field_type: FieldType,
    pub field_name: Option<FieldName>,
    pub required: bool,
    pub unique: bool,
    pub sortable: bool,
    pub bigint: bool,
    pub input: bool,
    pub references: Option<Reference>,
    pub default_value: Option<DefaultValue>,
    pub on_update: Option<DefaultValue>,
    pub transform_input: Option<TransformHook>,
    pub transform_output: Option<TransformHook>,
}

impl FieldAttribute {
    /// A required field of the given type, no override, no default.
    pub fn new(field_type: FieldType) -> Self {
        Self {
            field_type,
            field_name: None,
            required: true,
            unique: false,
            sortable: false,
            bigint: false,
            input: true,
            references: None,
            default_value: None,
            on_update: None,
            transform_input: None,
            transform_output: None,
        }
    }

    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    pub fn sortable(mut self) -> Self {
        self.sortable = true;
        self
    }

    pub fn bigint(mut self) -> Self {
        self.bigint = true;
        self
    }

    pub fn not_input(mut self) -> Self {
        self.input = false;
        self
    }

    pub fn with_field_name(mut self, name: FieldName) -> Self {
        self.field_name = Some(name);
        self
    }

    pub fn with_reference(mut self, reference: Reference) -> Self {
        self.references = Some(reference);
        self
    }

    pub fn with_default(mut self, default: DefaultValue) -> Self {
        self.default_value = Some(default);
        self
    }

    pub fn with_on_update(mut self, on_update: DefaultValue) -> Self {
        self.on_update = Some(on_update);
        self
    }

    pub fn with_transform_input(mut self, hook: TransformHook) -> Self {
        self.transform_input = Some(hook);
        self
    }

    pub fn with_transform_output(mut self, hook: TransformHook) -> Self {
        self.transform_output = Some(hook);
        self
    }

    /// The physical field name this attribute resolves to, given its
    /// logical name (falls back to the logical name when no override is set).
    pub fn physical_name<'a>(&'a self, logical: &'a FieldName) -> &'a FieldName {
        self.field_name.as_ref().unwrap_or(logical)
    }
}

impl fmt::Debug for FieldAttribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldAttribute")
            .field("field_type", &self.field_type)
            .field("field_name", &self.field_name)
            .field("required", &self.required)
            .field("unique", &self.unique)
            .field("sortable", &self.sortable)
            .field("bigint", &self.bigint)
            .field("input", &self.input)
            .field("references", &self.references)
            .field("default_value", &self.default_value)
            .field("on_update", &self.on_update)
            .finish()
    }
}

impl fmt::Display for FieldAttribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.field_type)?;
        if !self.required {
            write!(f, "?")?;
        }
        if self.unique {
            write!(f, " @unique")?;
        }
        if let Some(reference) = &self.references {
            write!(f, " -> {}.{}", reference.model, reference.field)?;
        }
        Ok(())
    }
}

/// Serde wire form for serializing/persisting a schema snapshot. Function
/// defaults don't round-trip; only the literal shape of an attribute is
/// captured here.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldAttributeSnapshot {
    pub field_type: FieldType,
    pub field_name: Option<FieldName>,
    pub required: bool,
    pub unique: bool,
    pub sortable: bool,
    pub bigint: bool,
    pub input: bool,
    pub references: Option<Reference>,
}

impl From<&FieldAttribute> for FieldAttributeSnapshot {
    fn from(attr: &FieldAttribute) -> Self {
        Self {
            field_type: attr.field_type,
            field_name: attr.field_name.clone(),
            required: attr.required,
            unique: attr.unique,
            sortable: attr.sortable,
            bigint: attr.bigint,
            input: attr.input,
            references: attr.references.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_defaults_to_required() {
        let attr = FieldAttribute::new(FieldType::String);
        assert!(attr.required);
        assert!(attr.input);
        assert!(!attr.unique);
    }

    #[test]
    fn builder_methods_chain() {
        let attr = FieldAttribute::new(FieldType::Number)
            .optional()
            .unique()
            .sortable()
            .bigint();
        assert!(!attr.required);
        assert!(attr.unique);
        assert!(attr.sortable);
        assert!(attr.bigint);
    }

    #[test]
    fn physical_name_falls_back_to_logical() {
        let attr = FieldAttribute::new(FieldType::String);
        let logical = FieldName::new("email").unwrap();
        assert_eq!(attr.physical_name(&logical).as_str(), "email");
    }

    #[test]
    fn physical_name_uses_override() {
        let attr = FieldAttribute::new(FieldType::String)
            .with_field_name(FieldName::new("email_addr").unwrap());
        let logical = FieldName::new("email").unwrap();
        assert_eq!(attr.physical_name(&logical).as_str(), "email_addr");
    }

    #[test]
    fn display_shows_optional_marker() {
        let attr = FieldAttribute::new(FieldType::String).optional();
        assert_eq!(attr.to_string(), "string?");
    }

    #[test]
    fn snapshot_captures_shape_not_functions() {
        let attr = FieldAttribute::new(FieldType::Boolean)
            .with_default(DefaultValue::literal(Value::Boolean(false)));
        let snapshot = FieldAttributeSnapshot::from(&attr);
        let json = serde_json::to_string(&snapshot).unwrap();
        let back: FieldAttributeSnapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(back.field_type, FieldType::Boolean);
    }
}
