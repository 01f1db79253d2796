use std::collections::BTreeMap;

use proptest::prelude::*;

use auth_adapter_core::schema::{Schema, SchemaOptions, SchemaRegistry};
use auth_adapter_core::transform::{transform_input, transform_output, Action};
use auth_adapter_core::types::{Capabilities, FieldAttribute, FieldName, FieldType, GenerateContext, Model, ModelName, Value};

fn ctx() -> GenerateContext {
    GenerateContext { model: ModelName::new("thing").unwrap() }
}

proptest! {
    #[test]
    fn field_name_display_roundtrip(s in "[a-zA-Z_][a-zA-Z0-9_]{0,30}") {
        let name = FieldName::new(&s).unwrap();
        let displayed = name.to_string();
        let back = FieldName::new(displayed).unwrap();
        prop_assert_eq!(name, back);
    }

    #[test]
    fn model_name_display_roundtrip(s in "[a-zA-Z_][a-zA-Z0-9_]{0,30}") {
        let name = ModelName::new(&s).unwrap();
        let displayed = name.to_string();
        let back = ModelName::new(displayed).unwrap();
        prop_assert_eq!(name, back);
    }

    /// §8's "id is always rendered as a string on output" law, independent
    /// of whatever numeric id a driver hands back.
    #[test]
    fn id_is_always_a_string_on_output(n in any::<i64>()) {
        let mut model = Model::new();
        model.fields.insert(FieldName::new("id").unwrap(), FieldAttribute::new(FieldType::Number));
        let mut row = BTreeMap::new();
        row.insert("id".to_string(), Value::Number(n));
        let out = transform_output(&model, &row, None, &Capabilities::full());
        prop_assert!(matches!(out.get(&FieldName::new("id").unwrap()), Some(Value::String(_))));
    }

    /// C2's boolean coercion cascade (§4.2): on a driver with no native
    /// boolean support, a value stored through `transform_input` and read
    /// back through `transform_output` must decode to the same boolean it
    /// started as, regardless of whether the driver falls back to an
    /// integer or a string.
    #[test]
    fn boolean_round_trips_through_every_coercion_fallback(value in any::<bool>(), supports_numbers in any::<bool>()) {
        let model = {
            let mut m = Model::new();
            m.fields.insert(FieldName::new("verified").unwrap(), FieldAttribute::new(FieldType::Boolean));
            m
        };
        let caps = Capabilities { supports_booleans: false, supports_numbers, ..Capabilities::full() };
        let mut data = BTreeMap::new();
        data.insert(FieldName::new("verified").unwrap(), Value::Boolean(value));

        let stored = transform_input(&model, &data, Action::Create, &caps, false, &ctx());
        let row: BTreeMap<String, Value> = stored.into_iter().collect();
        let out = transform_output(&model, &row, None, &caps);
        prop_assert_eq!(out.get(&FieldName::new("verified").unwrap()), Some(&Value::Boolean(value)));
    }

    /// C1 name resolution round trip (§4.1): whatever physical column name
    /// `getFieldName` resolves a logical field to, `getDefaultFieldName`
    /// must resolve back to the same logical field.
    #[test]
    fn field_name_resolution_round_trips(logical in "[a-z][a-zA-Z0-9]{0,20}", physical in "[a-z][a-zA-Z0-9_]{0,20}") {
        prop_assume!(logical != physical);
        let logical_field = FieldName::new(&logical).unwrap();
        let physical_field = FieldName::new(&physical).unwrap();

        let mut model = Model::new();
        model.fields.insert(logical_field.clone(), FieldAttribute::new(FieldType::String).with_field_name(physical_field.clone()));

        let model_name = ModelName::new("widget").unwrap();
        let mut schema: Schema = BTreeMap::new();
        schema.insert(model_name.clone(), model);

        let registry = SchemaRegistry::new(&schema, SchemaOptions::default());
        let resolved_physical = registry.get_field_name(&model_name, &logical_field).unwrap();
        prop_assert_eq!(&resolved_physical, &physical_field);

        let resolved_logical = registry.get_default_field_name(&model_name, resolved_physical.as_str()).unwrap();
        prop_assert_eq!(resolved_logical, logical_field);
    }
}
