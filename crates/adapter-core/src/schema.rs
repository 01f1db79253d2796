use std::collections::BTreeMap;

use crate::error::CoreError;
use crate::types::{FieldAttribute, FieldName, FieldType, Model, ModelName};

/// The composed schema: every model known to the framework, keyed by
/// logical name, after merging the base schema with plugin contributions
/// and user overrides.
pub type Schema = BTreeMap<ModelName, Model>;

/// Options controlling name resolution.
#[derive(Debug, Clone, Copy)]
pub struct SchemaOptions {
    /// When set, physical model names default to the pluralized logical
    /// name, and lookups try stripping a trailing `s` before falling back
    /// to the literal supplied name.
    pub use_plural: bool,
}

impl Default for SchemaOptions {
    fn default() -> Self {
        Self { use_plural: true }
    }
}

/// One field/model contribution from a plugin or the base schema, prior to
/// composition.
#[derive(Clone, Default)]
pub struct ModelContribution {
    pub model_name: Option<ModelName>,
    pub fields: BTreeMap<FieldName, FieldAttribute>,
    pub order: i32,
    pub disable_migrations: bool,
}

/// Composes a base schema with plugin contributions and user-supplied
/// additional fields into a final [`Schema`].
///
/// Plugin fields shallow-merge into the matching model: a plugin may add a
/// field, or override a base field that is not `required`, but may not
/// override a required base field (a conflict there is a hard error at
/// init). Plugin-only models are added verbatim. `additional_fields` merge
/// last and always win, mirroring `user.additionalFields` in the host
/// framework's options.
pub fn compose(
    base: BTreeMap<ModelName, ModelContribution>,
    plugins: Vec<BTreeMap<ModelName, ModelContribution>>,
    additional_fields: BTreeMap<ModelName, BTreeMap<FieldName, FieldAttribute>>,
) -> Result<Schema, CoreError> {
    let mut models: BTreeMap<ModelName, Model> = BTreeMap::new();

    for (name, contribution) in base {
        models.insert(name, contribution_into_model(contribution));
    }

    for plugin in plugins {
        for (name, contribution) in plugin {
            match models.get_mut(&name) {
                Some(existing) => merge_contribution(&name, existing, contribution)?,
                None => {
                    models.insert(name, contribution_into_model(contribution));
                }
            }
        }
    }

    for (name, fields) in additional_fields {
        let model = models.entry(name).or_insert_with(Model::new);
        for (field, attr) in fields {
            model.fields.insert(field, attr);
        }
    }

    for (name, model) in &models {
        if model.fields.is_empty() {
            return Err(CoreError::EmptyModel(name.to_string()));
        }
    }

    Ok(models)
}

fn contribution_into_model(contribution: ModelContribution) -> Model {
    let mut model = Model::new();
    model.model_name = contribution.model_name;
    model.fields = contribution.fields;
    model.order = contribution.order;
    model.disable_migrations = contribution.disable_migrations;
    model
}

fn merge_contribution(
    name: &ModelName,
    existing: &mut Model,
    contribution: ModelContribution,
) -> Result<(), CoreError> {
    for (field, attr) in contribution.fields {
        match existing.fields.get(&field) {
            Some(base_attr) if base_attr.required && field.as_str() == "id" => {
                return Err(CoreError::FieldConflict {
                    model: name.to_string(),
                    field: field.to_string(),
                    reason: "plugins may not redefine the primary id field".into(),
                });
            }
            Some(base_attr) if base_attr.required => {
                return Err(CoreError::FieldConflict {
                    model: name.to_string(),
                    field: field.to_string(),
                    reason: "cannot override a required base field".into(),
                });
            }
            _ => {
                existing.fields.insert(field, attr);
            }
        }
    }
    if contribution.model_name.is_some() {
        existing.model_name = contribution.model_name;
    }
    Ok(())
}

/// Injects the standard `id` field (always present, never user-overridable
/// in shape though its storage representation varies by id policy) into a
/// model contribution's field map.
pub fn with_id_field(mut fields: BTreeMap<FieldName, FieldAttribute>, id_type: FieldType) -> BTreeMap<FieldName, FieldAttribute> {
    fields.insert(
        FieldName::new("id").expect("'id' is a valid identifier"),
        FieldAttribute::new(id_type).unique(),
    );
    fields
}

/// Pure, bidirectional name resolution over a composed [`Schema`] (C1).
pub struct SchemaRegistry<'s> {
    schema: &'s Schema,
    options: SchemaOptions,
}

impl<'s> SchemaRegistry<'s> {
    pub fn new(schema: &'s Schema, options: SchemaOptions) -> Self {
        Self { schema, options }
    }

    pub fn schema(&self) -> &Schema {
        self.schema
    }

    /// Resolves either a logical name, a physical `modelName`, or a
    /// pluralized form, back to the logical key used to index the schema.
    pub fn get_default_model_name(&self, name: &str) -> Result<ModelName, CoreError> {
        if let Ok(candidate) = ModelName::new(name) {
            if self.schema.contains_key(&candidate) {
                return Ok(candidate);
            }
        }
        if let Some((logical, _)) = self
            .schema
            .iter()
            .find(|(logical, model)| model.physical_name(logical, self.options.use_plural) == name)
        {
            return Ok(logical.clone());
        }
        if self.options.use_plural {
            if let Some(singular) = name.strip_suffix('s') {
                if let Ok(candidate) = ModelName::new(singular) {
                    if self.schema.contains_key(&candidate) {
                        return Ok(candidate);
                    }
                }
            }
        }
        Err(CoreError::UnknownModel(name.to_string()))
    }

    /// Returns the physical name the driver should see for a logical model.
    pub fn get_model_name(&self, logical: &ModelName) -> Result<String, CoreError> {
        let model = self
            .schema
            .get(logical)
            .ok_or_else(|| CoreError::UnknownModel(logical.to_string()))?;
        Ok(model.physical_name(logical, self.options.use_plural))
    }

    /// Resolves either a logical field key or a physical `fieldName` to the
    /// logical key. `id`/`_id` are always normalized to `id`.
    pub fn get_default_field_name(&self, model: &ModelName, field: &str) -> Result<FieldName, CoreError> {
        if field == "_id" {
            return FieldName::new("id").map_err(|_| CoreError::UnknownField {
                model: model.to_string(),
                field: field.to_string(),
            });
        }
        let model_def = self
            .schema
            .get(model)
            .ok_or_else(|| CoreError::UnknownModel(model.to_string()))?;
        if let Ok(candidate) = FieldName::new(field) {
            if model_def.fields.contains_key(&candidate) {
                return Ok(candidate);
            }
        }
        if let Some((logical, _)) = model_def
            .fields
            .iter()
            .find(|(logical, attr)| attr.physical_name(logical).as_str() == field)
        {
            return Ok(logical.clone());
        }
        Err(CoreError::UnknownField {
            model: model.to_string(),
            field: field.to_string(),
        })
    }

    /// Returns the physical column name for a logical field.
    pub fn get_field_name(&self, model: &ModelName, field: &FieldName) -> Result<FieldName, CoreError> {
        let model_def = self
            .schema
            .get(model)
            .ok_or_else(|| CoreError::UnknownModel(model.to_string()))?;
        let attr = model_def
            .fields
            .get(field)
            .ok_or_else(|| CoreError::UnknownField {
                model: model.to_string(),
                field: field.to_string(),
            })?;
        Ok(attr.physical_name(field).clone())
    }
}
