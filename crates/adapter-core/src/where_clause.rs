//! Where-clause compiler (C3): normalizes a caller-supplied predicate list
//! into the canonical, driver-facing shape described in spec.md §4.3/§6.2 --
//! physical field names, a closed operator set, and numeric-id coercion --
//! without building a general expression tree. Consumed by the Adapter
//! Factory (forwarded to drivers) and by the Join Resolver's secondary
//! `in`-queries.

use std::str::FromStr;

use crate::error::CoreError;
use crate::schema::SchemaRegistry;
use crate::types::{FieldName, ModelName, Value};

/// The closed set of comparison operators a driver must be able to execute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum Operator {
    Eq,
    Ne,
    Lt,
    Lte,
    Gt,
    Gte,
    In,
    NotIn,
    Contains,
    StartsWith,
    EndsWith,
}

impl Default for Operator {
    fn default() -> Self {
        Self::Eq
    }
}

impl FromStr for Operator {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "eq" => Self::Eq,
            "ne" => Self::Ne,
            "lt" => Self::Lt,
            "lte" => Self::Lte,
            "gt" => Self::Gt,
            "gte" => Self::Gte,
            "in" => Self::In,
            "not_in" => Self::NotIn,
            "contains" => Self::Contains,
            "starts_with" => Self::StartsWith,
            "ends_with" => Self::EndsWith,
            other => return Err(CoreError::UnknownOperator(other.to_string())),
        })
    }
}

/// Which group a predicate belongs to. `And` is the default so a caller
/// supplying no connector gets ordinary conjunctive filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Connector {
    And,
    Or,
}

impl Default for Connector {
    fn default() -> Self {
        Self::And
    }
}

/// One caller-supplied predicate, prior to name resolution or coercion.
#[derive(Debug, Clone)]
pub struct Predicate {
    pub field: FieldName,
    pub value: Value,
    pub operator: Operator,
    pub connector: Connector,
}

impl Predicate {
    pub fn new(field: FieldName, value: Value) -> Self {
        Self {
            field,
            value,
            operator: Operator::default(),
            connector: Connector::default(),
        }
    }

    pub fn with_operator(mut self, operator: Operator) -> Self {
        self.operator = operator;
        self
    }

    pub fn with_connector(mut self, connector: Connector) -> Self {
        self.connector = connector;
        self
    }
}

/// A compiled predicate: physical field name, closed operator, already
/// numerically coerced value. This is the §6.2 driver-facing shape.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledPredicate {
    pub field: String,
    pub value: Value,
    pub operator: Operator,
    pub connector: Connector,
}

/// The two-level disjunction-of-conjunctions shape from spec.md §4.3:
/// `AND(ands) AND OR(ors)`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WhereGroups {
    pub ands: Vec<CompiledPredicate>,
    pub ors: Vec<CompiledPredicate>,
}

/// Splits a compiled predicate list into its AND and OR groups, preserving
/// relative order within each group.
pub fn group(predicates: Vec<CompiledPredicate>) -> WhereGroups {
    let mut groups = WhereGroups::default();
    for predicate in predicates {
        match predicate.connector {
            Connector::And => groups.ands.push(predicate),
            Connector::Or => groups.ors.push(predicate),
        }
    }
    groups
}

/// Compiles a caller-supplied predicate list against `model` into the
/// canonical driver-facing form: physical field names, and values
/// numerically coerced when the field is (or references) an `id` under
/// `use_number_id` mode.
pub fn compile_where(
    registry: &SchemaRegistry<'_>,
    model: &ModelName,
    predicates: &[Predicate],
    use_number_id: bool,
) -> Result<Vec<CompiledPredicate>, CoreError> {
    predicates
        .iter()
        .map(|predicate| compile_one(registry, model, predicate, use_number_id))
        .collect()
}

fn compile_one(
    registry: &SchemaRegistry<'_>,
    model: &ModelName,
    predicate: &Predicate,
    use_number_id: bool,
) -> Result<CompiledPredicate, CoreError> {
    let model_def = registry
        .schema()
        .get(model)
        .ok_or_else(|| CoreError::UnknownModel(model.to_string()))?;
    let attr = model_def.fields.get(&predicate.field).ok_or_else(|| CoreError::UnknownField {
        model: model.to_string(),
        field: predicate.field.to_string(),
    })?;
    let physical = registry.get_field_name(model, &predicate.field)?;

    if matches!(predicate.operator, Operator::In | Operator::NotIn)
        && !matches!(predicate.value, Value::StringArray(_) | Value::NumberArray(_))
    {
        return Err(CoreError::InvalidPredicate {
            field: predicate.field.to_string(),
            reason: "'in'/'not_in' require an array value".into(),
        });
    }

    let is_id_like = predicate.field.as_str() == "id" || attr.references.is_some();
    let value = if is_id_like && use_number_id {
        coerce_numeric(predicate.value.clone())
    } else {
        predicate.value.clone()
    };

    Ok(CompiledPredicate {
        field: physical.as_str().to_string(),
        value,
        operator: predicate.operator,
        connector: predicate.connector,
    })
}

fn coerce_numeric(value: Value) -> Value {
    match value {
        Value::String(s) => s.parse::<i64>().map(Value::Number).unwrap_or(Value::String(s)),
        Value::StringArray(items) => {
            let parsed: Option<Vec<i64>> = items.iter().map(|s| s.parse::<i64>().ok()).collect();
            match parsed {
                Some(numbers) => Value::NumberArray(numbers),
                None => Value::StringArray(items),
            }
        }
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::base_schema::base_schema;
    use crate::schema::{compose, SchemaOptions};
    use std::collections::BTreeMap;

    fn registry_fixture() -> (crate::schema::Schema, ModelName) {
        let schema = compose(base_schema(crate::types::FieldType::String, crate::types::FieldType::String), vec![], BTreeMap::new()).unwrap();
        (schema, ModelName::new("user").unwrap())
    }

    #[test]
    fn operator_defaults_to_eq() {
        let predicate = Predicate::new(FieldName::new("email").unwrap(), Value::String("a@b.com".into()));
        assert_eq!(predicate.operator, Operator::Eq);
        assert_eq!(predicate.connector, Connector::And);
    }

    #[test]
    fn operator_from_str_roundtrip() {
        for (s, op) in [
            ("eq", Operator::Eq),
            ("in", Operator::In),
            ("not_in", Operator::NotIn),
            ("starts_with", Operator::StartsWith),
        ] {
            assert_eq!(Operator::from_str(s).unwrap(), op);
        }
        assert!(matches!(Operator::from_str("regex"), Err(CoreError::UnknownOperator(_))));
    }

    #[test]
    fn compile_resolves_to_physical_field_name() {
        let (schema, model) = registry_fixture();
        let registry = SchemaRegistry::new(&schema, SchemaOptions::default());
        let predicates = vec![Predicate::new(FieldName::new("email").unwrap(), Value::String("a@b.com".into()))];
        let compiled = compile_where(&registry, &model, &predicates, false).unwrap();
        assert_eq!(compiled[0].field, "email");
    }

    #[test]
    fn in_with_scalar_value_is_invalid_argument() {
        let (schema, model) = registry_fixture();
        let registry = SchemaRegistry::new(&schema, SchemaOptions::default());
        let predicates = vec![
            Predicate::new(FieldName::new("email").unwrap(), Value::String("a@b.com".into())).with_operator(Operator::In),
        ];
        let result = compile_where(&registry, &model, &predicates, false);
        assert!(matches!(result, Err(CoreError::InvalidPredicate { .. })));
    }

    #[test]
    fn in_with_array_value_passes() {
        let (schema, model) = registry_fixture();
        let registry = SchemaRegistry::new(&schema, SchemaOptions::default());
        let predicates = vec![Predicate::new(
            FieldName::new("email").unwrap(),
            Value::StringArray(vec!["a@b.com".into(), "c@d.com".into()]),
        )
        .with_operator(Operator::In)];
        let compiled = compile_where(&registry, &model, &predicates, false).unwrap();
        assert_eq!(compiled[0].operator, Operator::In);
    }

    #[test]
    fn numeric_id_mode_coerces_string_id_to_number() {
        let (schema, model) = registry_fixture();
        let registry = SchemaRegistry::new(&schema, SchemaOptions::default());
        let predicates = vec![Predicate::new(FieldName::new("id").unwrap(), Value::String("1".into()))];
        let compiled = compile_where(&registry, &model, &predicates, true).unwrap();
        assert_eq!(compiled[0].value, Value::Number(1));
    }

    #[test]
    fn non_numeric_mode_leaves_id_as_string() {
        let (schema, model) = registry_fixture();
        let registry = SchemaRegistry::new(&schema, SchemaOptions::default());
        let predicates = vec![Predicate::new(FieldName::new("id").unwrap(), Value::String("abc123".into()))];
        let compiled = compile_where(&registry, &model, &predicates, false).unwrap();
        assert_eq!(compiled[0].value, Value::String("abc123".into()));
    }

    #[test]
    fn starts_with_literal_is_not_interpreted_as_regex() {
        let (schema, model) = registry_fixture();
        let registry = SchemaRegistry::new(&schema, SchemaOptions::default());
        let predicates = vec![Predicate::new(FieldName::new("name").unwrap(), Value::String(".*".into())).with_operator(Operator::StartsWith)];
        let compiled = compile_where(&registry, &model, &predicates, false).unwrap();
        assert_eq!(compiled[0].value, Value::String(".*".into()));
        assert_eq!(compiled[0].operator, Operator::StartsWith);
    }

    #[test]
    fn group_splits_by_connector_preserving_order() {
        let a = CompiledPredicate {
            field: "a".into(),
            value: Value::Number(1),
            operator: Operator::Eq,
            connector: Connector::And,
        };
        let b = CompiledPredicate {
            field: "b".into(),
            value: Value::Number(2),
            operator: Operator::Eq,
            connector: Connector::Or,
        };
        let c = CompiledPredicate {
            field: "c".into(),
            value: Value::Number(3),
            operator: Operator::Eq,
            connector: Connector::And,
        };
        let groups = group(vec![a.clone(), b.clone(), c.clone()]);
        assert_eq!(groups.ands, vec![a, c]);
        assert_eq!(groups.ors, vec![b]);
    }

    #[test]
    fn unknown_field_is_schema_lookup_error() {
        let (schema, model) = registry_fixture();
        let registry = SchemaRegistry::new(&schema, SchemaOptions::default());
        let predicates = vec![Predicate::new(FieldName::new("nope").unwrap(), Value::Null)];
        let result = compile_where(&registry, &model, &predicates, false);
        assert!(matches!(result, Err(CoreError::UnknownField { .. })));
    }
}
