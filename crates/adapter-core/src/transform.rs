use std::collections::{BTreeMap, BTreeSet};

use tracing::warn;

use crate::types::{Capabilities, FieldName, GenerateContext, Model, Value};

/// Which pipeline phase a transform runs under: controls whether `onUpdate`
/// fires and whether `defaultValue` fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Create,
    Update,
}

/// Applies defaults/`onUpdate`, user transform hooks, and capability-driven
/// coercion to a caller-supplied payload, producing a physical-key map
/// ready to hand to a driver (C2 input transform).
///
/// The `id` field receives no special treatment here: whether a
/// caller-supplied `id` is honored, dropped, or replaced by a generated
/// value is the Adapter Factory's responsibility (the ID policy, §4.4),
/// decided before this function is invoked.
pub fn transform_input(
    model: &Model,
    caller_data: &BTreeMap<FieldName, Value>,
    action: Action,
    capabilities: &Capabilities,
    use_number_id: bool,
    gen_ctx: &GenerateContext,
) -> BTreeMap<String, Value> {
    let mut out = BTreeMap::new();

    for (logical, attr) in &model.fields {
        let supplied = if attr.input {
            caller_data.get(logical).cloned()
        } else {
            None
        };

        let mut value = match (action, &attr.on_update) {
            (Action::Update, Some(on_update)) => Some(on_update.resolve(gen_ctx)),
            _ => supplied,
        };

        if value.is_none() && action == Action::Create {
            if let Some(default) = &attr.default_value {
                value = Some(default.resolve(gen_ctx));
            }
        }

        let Some(mut value) = value else {
            continue;
        };

        if let Some(hook) = &attr.transform_input {
            value = hook.apply(value);
        }

        value = match &capabilities.custom_transform_input {
            Some(hook) => hook(value),
            None => coerce_for_driver(value, capabilities, use_number_id, attr.references.is_some()),
        };

        let mut physical = attr.physical_name(logical).as_str().to_string();
        if let Some(hook) = &capabilities.map_keys_transform_input {
            physical = hook(&physical);
        }
        out.insert(physical, value);
    }

    if caller_data.contains_key(&FieldName::new("id").expect("valid")) && !model.fields.contains_key(&FieldName::new("id").expect("valid"))
    {
        warn!("caller supplied 'id' for a model with no id field; ignoring");
    }

    out
}

fn coerce_for_driver(value: Value, capabilities: &Capabilities, use_number_id: bool, is_reference: bool) -> Value {
    match value {
        Value::Boolean(b) => {
            if capabilities.supports_booleans {
                Value::Boolean(b)
            } else {
                let as_number = if b { 1 } else { 0 };
                if capabilities.supports_numbers {
                    Value::Number(as_number)
                } else {
                    Value::String(as_number.to_string())
                }
            }
        }
        Value::Date(dt) => {
            if capabilities.supports_dates {
                Value::Date(dt)
            } else {
                Value::String(dt.to_rfc3339())
            }
        }
        Value::Json(json) => {
            if capabilities.supports_json {
                Value::Json(json)
            } else {
                Value::String(json.to_string())
            }
        }
        Value::StringArray(items) => {
            if capabilities.supports_arrays {
                Value::StringArray(items)
            } else {
                Value::String(serde_json::to_string(&items).unwrap_or_default())
            }
        }
        Value::NumberArray(items) => {
            if capabilities.supports_arrays {
                Value::NumberArray(items)
            } else {
                Value::String(serde_json::to_string(&items).unwrap_or_default())
            }
        }
        Value::String(s) if is_reference && use_number_id => s
            .parse::<i64>()
            .map(Value::Number)
            .unwrap_or(Value::String(s)),
        Value::Number(n) => {
            if capabilities.supports_numbers || is_reference {
                Value::Number(n)
            } else {
                Value::String(n.to_string())
            }
        }
        other => other,
    }
}

/// Inverse of [`transform_input`]: reconstructs logical values from a
/// driver row (C2 output transform). `select`, when present, restricts the
/// output to the listed logical fields.
pub fn transform_output(
    model: &Model,
    driver_row: &BTreeMap<String, Value>,
    select: Option<&BTreeSet<FieldName>>,
    capabilities: &Capabilities,
) -> BTreeMap<FieldName, Value> {
    let mut out = BTreeMap::new();

    for (logical, attr) in &model.fields {
        if let Some(select) = select {
            if !select.contains(logical) {
                continue;
            }
        }

        let mut physical = attr.physical_name(logical).as_str().to_string();
        if let Some(hook) = &capabilities.map_keys_transform_output {
            physical = hook(&physical);
        }
        let Some(raw) = driver_row.get(&physical).cloned() else {
            continue;
        };

        let mut value = if logical.as_str() == "id" {
            coerce_id_to_string(raw)
        } else {
            match &capabilities.custom_transform_output {
                Some(hook) => hook(raw),
                None => uncoerce_from_driver(raw, attr.field_type),
            }
        };

        if let Some(hook) = &attr.transform_output {
            value = hook.apply(value);
        }

        out.insert(logical.clone(), value);
    }

    out
}

fn coerce_id_to_string(value: Value) -> Value {
    match value {
        Value::Number(n) => Value::String(n.to_string()),
        other => other,
    }
}

fn uncoerce_from_driver(value: Value, field_type: crate::types::FieldType) -> Value {
    use crate::types::FieldType;
    match (field_type, value) {
        (FieldType::Boolean, Value::Number(n)) => Value::Boolean(n == 1),
        (FieldType::Boolean, Value::String(s)) => Value::Boolean(s == "1" || s == "true"),
        (FieldType::Date, Value::String(s)) => chrono::DateTime::parse_from_rfc3339(&s)
            .map(|dt| Value::Date(dt.with_timezone(&chrono::Utc)))
            .unwrap_or(Value::String(s)),
        (FieldType::Json, Value::String(s)) => {
            serde_json::from_str(&s).map(Value::Json).unwrap_or(Value::Null)
        }
        (FieldType::StringArray, Value::String(s)) => serde_json::from_str::<Vec<String>>(&s)
            .map(Value::StringArray)
            .unwrap_or(Value::Null),
        (FieldType::NumberArray, Value::String(s)) => serde_json::from_str::<Vec<i64>>(&s)
            .map(Value::NumberArray)
            .unwrap_or(Value::Null),
        (FieldType::Number, Value::String(s)) => s.parse::<i64>().map(Value::Number).unwrap_or(Value::String(s)),
        (_, other) => other,
    }
}
