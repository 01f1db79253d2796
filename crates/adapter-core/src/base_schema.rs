//! The base schema: `user`, `session`, `account`, `verification`, always
//! present regardless of plugin configuration. Field shapes are inferred
//! from the C7 Internal Adapter's operation surface (`createUser`,
//! `findUserByEmail`, `createSession`, `createOAuthUser`,
//! `findVerificationValue`, ...), since the base schema itself is not laid
//! out field-by-field.

use std::collections::BTreeMap;

use crate::schema::ModelContribution;
use crate::types::{DefaultValue, FieldAttribute, FieldName, FieldType, ModelName, OnDelete, Reference, Value};

fn field(name: &str) -> FieldName {
    FieldName::new(name).expect("base schema field names are valid identifiers")
}

fn model(name: &str) -> ModelName {
    ModelName::new(name).expect("base schema model names are valid identifiers")
}

fn now_generator() -> DefaultValue {
    DefaultValue::generated(|_ctx| Value::Date(chrono::Utc::now()))
}

fn user_model(id_type: FieldType) -> ModelContribution {
    let mut fields = BTreeMap::new();
    fields.insert(field("id"), FieldAttribute::new(id_type).unique());
    fields.insert(
        field("email"),
        FieldAttribute::new(FieldType::String).unique().sortable(),
    );
    fields.insert(
        field("emailVerified"),
        FieldAttribute::new(FieldType::Boolean)
            .with_default(DefaultValue::literal(Value::Boolean(false))),
    );
    fields.insert(field("name"), FieldAttribute::new(FieldType::String).sortable());
    fields.insert(field("image"), FieldAttribute::new(FieldType::String).optional());
    fields.insert(
        field("createdAt"),
        FieldAttribute::new(FieldType::Date).with_default(now_generator()),
    );
    fields.insert(
        field("updatedAt"),
        FieldAttribute::new(FieldType::Date)
            .with_default(now_generator())
            .with_on_update(now_generator()),
    );
    ModelContribution {
        fields,
        order: 0,
        ..Default::default()
    }
}

fn session_model(id_type: FieldType, user_id_type: FieldType) -> ModelContribution {
    let mut fields = BTreeMap::new();
    fields.insert(field("id"), FieldAttribute::new(id_type).unique());
    fields.insert(
        field("userId"),
        FieldAttribute::new(user_id_type).with_reference(
            Reference::new(model("user"), field("id")).with_on_delete(OnDelete::Cascade),
        ),
    );
    fields.insert(
        field("token"),
        FieldAttribute::new(FieldType::String).unique(),
    );
    fields.insert(field("expiresAt"), FieldAttribute::new(FieldType::Date));
    fields.insert(field("ipAddress"), FieldAttribute::new(FieldType::String).optional());
    fields.insert(field("userAgent"), FieldAttribute::new(FieldType::String).optional());
    fields.insert(
        field("createdAt"),
        FieldAttribute::new(FieldType::Date).with_default(now_generator()),
    );
    fields.insert(
        field("updatedAt"),
        FieldAttribute::new(FieldType::Date)
            .with_default(now_generator())
            .with_on_update(now_generator()),
    );
    ModelContribution {
        fields,
        order: 1,
        ..Default::default()
    }
}

fn account_model(id_type: FieldType, user_id_type: FieldType) -> ModelContribution {
    let mut fields = BTreeMap::new();
    fields.insert(field("id"), FieldAttribute::new(id_type).unique());
    fields.insert(
        field("userId"),
        FieldAttribute::new(user_id_type).with_reference(
            Reference::new(model("user"), field("id")).with_on_delete(OnDelete::Cascade),
        ),
    );
    fields.insert(field("accountId"), FieldAttribute::new(FieldType::String));
    fields.insert(field("providerId"), FieldAttribute::new(FieldType::String));
    fields.insert(field("accessToken"), FieldAttribute::new(FieldType::String).optional());
    fields.insert(field("refreshToken"), FieldAttribute::new(FieldType::String).optional());
    fields.insert(field("idToken"), FieldAttribute::new(FieldType::String).optional());
    fields.insert(
        field("accessTokenExpiresAt"),
        FieldAttribute::new(FieldType::Date).optional(),
    );
    fields.insert(
        field("refreshTokenExpiresAt"),
        FieldAttribute::new(FieldType::Date).optional(),
    );
    fields.insert(field("scope"), FieldAttribute::new(FieldType::String).optional());
    fields.insert(
        field("password"),
        FieldAttribute::new(FieldType::String).optional().not_input(),
    );
    fields.insert(
        field("createdAt"),
        FieldAttribute::new(FieldType::Date).with_default(now_generator()),
    );
    fields.insert(
        field("updatedAt"),
        FieldAttribute::new(FieldType::Date)
            .with_default(now_generator())
            .with_on_update(now_generator()),
    );
    ModelContribution {
        fields,
        order: 1,
        ..Default::default()
    }
}

fn verification_model(id_type: FieldType) -> ModelContribution {
    let mut fields = BTreeMap::new();
    fields.insert(field("id"), FieldAttribute::new(id_type).unique());
    fields.insert(field("identifier"), FieldAttribute::new(FieldType::String).sortable());
    fields.insert(field("value"), FieldAttribute::new(FieldType::String));
    fields.insert(field("expiresAt"), FieldAttribute::new(FieldType::Date));
    fields.insert(
        field("createdAt"),
        FieldAttribute::new(FieldType::Date).with_default(now_generator()),
    );
    fields.insert(
        field("updatedAt"),
        FieldAttribute::new(FieldType::Date)
            .with_default(now_generator())
            .with_on_update(now_generator()),
    );
    ModelContribution {
        fields,
        order: 0,
        ..Default::default()
    }
}

/// Builds the base schema's four always-present models: `user`, `session`,
/// `account`, `verification`. `id_type` and `user_id_type` follow the
/// configured id policy (string token/uuid vs. numeric auto-increment).
pub fn base_schema(id_type: FieldType, user_id_type: FieldType) -> BTreeMap<ModelName, ModelContribution> {
    let mut schema = BTreeMap::new();
    schema.insert(model("user"), user_model(id_type));
    schema.insert(model("session"), session_model(id_type, user_id_type));
    schema.insert(model("account"), account_model(id_type, user_id_type));
    schema.insert(model("verification"), verification_model(id_type));
    schema
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_schema_has_four_core_models() {
        let schema = base_schema(FieldType::String, FieldType::String);
        for name in ["user", "session", "account", "verification"] {
            assert!(schema.contains_key(&model(name)), "missing model {name}");
        }
    }

    #[test]
    fn every_model_has_an_id_field() {
        let schema = base_schema(FieldType::String, FieldType::String);
        for contribution in schema.values() {
            assert!(contribution.fields.contains_key(&field("id")));
        }
    }

    #[test]
    fn session_references_user() {
        let schema = base_schema(FieldType::String, FieldType::String);
        let session = &schema[&model("session")];
        let user_id = &session.fields[&field("userId")];
        assert_eq!(user_id.references.as_ref().unwrap().model, model("user"));
    }
}
