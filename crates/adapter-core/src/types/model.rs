use std::collections::BTreeMap;
use std::fmt;

use super::field_attribute::FieldAttribute;
use super::field_name::FieldName;
use super::model_name::ModelName;

/// A single model (table/collection) as declared by the base schema or a
/// plugin: its fields keyed by logical name, an optional physical name
/// override, a composition order, and whether the migration planner should
/// skip it entirely.
#[derive(Clone)]
pub struct Model {
    pub model_name: Option<ModelName>,
    pub fields: BTreeMap<FieldName, FieldAttribute>,
    pub order: i32,
    pub disable_migrations: bool,
}

impl Model {
    pub fn new() -> Self {
        Self {
            model_name: None,
            fields: BTreeMap::new(),
            order: 0,
            disable_migrations: false,
        }
    }

    pub fn with_field(mut self, name: FieldName, attr: FieldAttribute) -> Self {
        self.fields.insert(name, attr);
        self
    }

    pub fn with_model_name(mut self, name: ModelName) -> Self {
        self.model_name = Some(name);
        self
    }

    pub fn with_order(mut self, order: i32) -> Self {
        self.order = order;
        self
    }

    pub fn with_migrations_disabled(mut self) -> Self {
        self.disable_migrations = true;
        self
    }

    /// The physical table name this model resolves to, given its logical
    /// name. Falls back to the pluralized logical name when `use_plural` is
    /// set and there is no explicit `modelName` override, or to the literal
    /// logical name otherwise (§3: "physical table/collection name...
    /// optionally pluralized").
    pub fn physical_name(&self, logical: &ModelName, use_plural: bool) -> String {
        match &self.model_name {
            Some(name) => name.as_str().to_string(),
            None if use_plural => logical.pluralized(),
            None => logical.as_str().to_string(),
        }
    }

    pub fn field(&self, name: &str) -> Option<&FieldAttribute> {
        self.fields.get(&FieldName::new(name).ok()?)
    }
}

impl Default for Model {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Model")
            .field("model_name", &self.model_name)
            .field("fields", &self.fields.keys().collect::<Vec<_>>())
            .field("order", &self.order)
            .field("disable_migrations", &self.disable_migrations)
            .finish()
    }
}
