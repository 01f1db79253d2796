//! Join Resolver (C5): native join forwarding plus the fallback algorithm
//! for drivers that cannot join natively (§4.5).
//!
//! Decoupled from the `Driver` trait itself: the fallback algorithm is
//! expressed against a `fetch` callback so it can be unit-tested without a
//! concrete driver. The Adapter Factory supplies the real callback, wired
//! to a compiled where-clause `in` query against the related model.

use std::collections::{BTreeMap, BTreeSet};
use std::future::Future;

use auth_adapter_core::schema::Schema;
use auth_adapter_core::types::{FieldName, ModelName, Value};

use crate::error::AdapterError;

/// A logical, output-transformed row (already through C2's output
/// transform), as handed back from `findOne`/`findMany`.
pub type Row = BTreeMap<FieldName, Value>;

/// One requested join, keyed by the related model's logical name.
#[derive(Debug, Clone)]
pub struct JoinSpec {
    pub related: ModelName,
    pub limit: Option<u64>,
    pub select: Option<BTreeSet<FieldName>>,
}

impl JoinSpec {
    pub fn new(related: ModelName) -> Self {
        Self {
            related,
            limit: None,
            select: None,
        }
    }
}

/// The attached result of one join: a single optional row (one-to-one,
/// many-to-one) or a list of rows (one-to-many).
#[derive(Debug, Clone, PartialEq)]
pub enum JoinedField {
    One(Option<Row>),
    Many(Vec<Row>),
}

/// How a related model connects back to the base model (§4.5 step 1).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelationDirection {
    /// The *related* model has a field referencing the base model.
    Forward { referencing_field: FieldName, unique: bool },
    /// The *base* model has a field referencing the related model.
    Backward { referencing_field: FieldName },
}

/// Classifies the relation between `base` and `related` from the composed
/// schema. Forward takes precedence when both directions exist (the
/// auth-domain schemas in this spec never declare both).
pub fn classify_relation(schema: &Schema, base: &ModelName, related: &ModelName) -> Result<RelationDirection, AdapterError> {
    let related_model = schema
        .get(related)
        .ok_or_else(|| AdapterError::SchemaLookup(auth_adapter_core::CoreError::UnknownModel(related.to_string())))?;
    if let Some((field, attr)) = related_model.fields.iter().find(|(_, attr)| attr.references.as_ref().is_some_and(|r| &r.model == base)) {
        return Ok(RelationDirection::Forward {
            referencing_field: field.clone(),
            unique: attr.unique,
        });
    }

    let base_model = schema
        .get(base)
        .ok_or_else(|| AdapterError::SchemaLookup(auth_adapter_core::CoreError::UnknownModel(base.to_string())))?;
    if let Some((field, _)) = base_model.fields.iter().find(|(_, attr)| attr.references.as_ref().is_some_and(|r| &r.model == related)) {
        return Ok(RelationDirection::Backward {
            referencing_field: field.clone(),
        });
    }

    Err(AdapterError::SchemaLookup(auth_adapter_core::CoreError::UnknownField {
        model: base.to_string(),
        field: related.to_string(),
    }))
}

fn bucket_key(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// One batched (or per-parent) secondary fetch request issued by the
/// fallback algorithm.
pub struct FetchRequest {
    pub related: ModelName,
    pub key_field: FieldName,
    pub key_values: Vec<Value>,
    pub limit: Option<u64>,
    pub select: Option<BTreeSet<FieldName>>,
}

/// Resolves one join spec against a batch of base rows (the `findMany`
/// path). `id_field` names the field the base model exposes as its primary
/// key (`"id"` in every schema this spec defines).
pub async fn resolve_join_many<F, Fut>(
    schema: &Schema,
    base: &ModelName,
    id_field: &FieldName,
    base_rows: &[Row],
    spec: &JoinSpec,
    mut fetch: F,
) -> Result<Vec<JoinedField>, AdapterError>
where
    F: FnMut(FetchRequest) -> Fut,
    Fut: Future<Output = Result<Vec<Row>, AdapterError>>,
{
    if base_rows.is_empty() {
        return Ok(Vec::new());
    }

    match classify_relation(schema, base, &spec.related)? {
        RelationDirection::Forward { referencing_field, unique } => {
            let keys: Vec<Value> = base_rows.iter().filter_map(|row| row.get(id_field).cloned()).collect();

            if unique {
                let related_rows = fetch(FetchRequest {
                    related: spec.related.clone(),
                    key_field: referencing_field.clone(),
                    key_values: keys,
                    limit: None,
                    select: spec.select.clone(),
                })
                .await?;
                let mut by_key: BTreeMap<String, Row> = BTreeMap::new();
                for row in related_rows {
                    if let Some(key) = row.get(&referencing_field).and_then(bucket_key) {
                        by_key.insert(key, row);
                    }
                }
                Ok(base_rows
                    .iter()
                    .map(|row| {
                        let key = row.get(id_field).and_then(bucket_key);
                        JoinedField::One(key.and_then(|k| by_key.get(&k).cloned()))
                    })
                    .collect())
            } else if spec.limit.is_some() {
                let mut out = Vec::with_capacity(base_rows.len());
                for row in base_rows {
                    let Some(key) = row.get(id_field).cloned() else {
                        out.push(JoinedField::Many(Vec::new()));
                        continue;
                    };
                    let related_rows = fetch(FetchRequest {
                        related: spec.related.clone(),
                        key_field: referencing_field.clone(),
                        key_values: vec![key],
                        limit: spec.limit,
                        select: spec.select.clone(),
                    })
                    .await?;
                    out.push(JoinedField::Many(related_rows));
                }
                Ok(out)
            } else {
                let related_rows = fetch(FetchRequest {
                    related: spec.related.clone(),
                    key_field: referencing_field.clone(),
                    key_values: keys,
                    limit: None,
                    select: spec.select.clone(),
                })
                .await?;
                let mut by_key: BTreeMap<String, Vec<Row>> = BTreeMap::new();
                for row in related_rows {
                    if let Some(key) = row.get(&referencing_field).and_then(bucket_key) {
                        by_key.entry(key).or_default().push(row);
                    }
                }
                Ok(base_rows
                    .iter()
                    .map(|row| {
                        let key = row.get(id_field).and_then(bucket_key);
                        JoinedField::Many(key.and_then(|k| by_key.get(&k).cloned()).unwrap_or_default())
                    })
                    .collect())
            }
        }
        RelationDirection::Backward { referencing_field } => {
            let related_id_field = FieldName::new("id").expect("'id' is always valid");
            let keys: Vec<Value> = base_rows.iter().filter_map(|row| row.get(&referencing_field).cloned()).collect();
            let related_rows = fetch(FetchRequest {
                related: spec.related.clone(),
                key_field: related_id_field.clone(),
                key_values: keys,
                limit: None,
                select: spec.select.clone(),
            })
            .await?;
            let mut by_key: BTreeMap<String, Row> = BTreeMap::new();
            for row in related_rows {
                if let Some(key) = row.get(&related_id_field).and_then(bucket_key) {
                    by_key.insert(key, row);
                }
            }
            Ok(base_rows
                .iter()
                .map(|row| {
                    let key = row.get(&referencing_field).and_then(bucket_key);
                    JoinedField::One(key.and_then(|k| by_key.get(&k).cloned()))
                })
                .collect())
        }
    }
}

/// Resolves one join spec against a single base row (the `findOne` path).
/// `None` base row short-circuits without issuing secondary queries.
pub async fn resolve_join_one<F, Fut>(
    schema: &Schema,
    base: &ModelName,
    id_field: &FieldName,
    base_row: Option<&Row>,
    spec: &JoinSpec,
    mut fetch: F,
) -> Result<Option<JoinedField>, AdapterError>
where
    F: FnMut(FetchRequest) -> Fut,
    Fut: Future<Output = Result<Vec<Row>, AdapterError>>,
{
    let Some(row) = base_row else {
        return Ok(None);
    };

    match classify_relation(schema, base, &spec.related)? {
        RelationDirection::Forward { referencing_field, unique } => {
            let Some(key) = row.get(id_field).cloned() else {
                return Ok(Some(if unique { JoinedField::One(None) } else { JoinedField::Many(Vec::new()) }));
            };
            let related_rows = fetch(FetchRequest {
                related: spec.related.clone(),
                key_field: referencing_field,
                key_values: vec![key],
                limit: spec.limit,
                select: spec.select.clone(),
            })
            .await?;
            Ok(Some(if unique {
                JoinedField::One(related_rows.into_iter().next())
            } else {
                JoinedField::Many(related_rows)
            }))
        }
        RelationDirection::Backward { referencing_field } => {
            let related_id_field = FieldName::new("id").expect("'id' is always valid");
            let Some(key) = row.get(&referencing_field).cloned() else {
                return Ok(Some(JoinedField::One(None)));
            };
            let related_rows = fetch(FetchRequest {
                related: spec.related.clone(),
                key_field: related_id_field,
                key_values: vec![key],
                limit: None,
                select: spec.select.clone(),
            })
            .await?;
            Ok(Some(JoinedField::One(related_rows.into_iter().next())))
        }
    }
}
