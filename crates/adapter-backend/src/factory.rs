//! Adapter Factory (C4): the coordinator. Wraps a driver, owns the composed
//! schema and the ID policy, and drives every call through C1 (name
//! resolution), C2 (transform), C3 (where compilation), C5 (joins), and C8
//! (hooks), per the data-flow diagram in §2.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tracing::debug;

use auth_adapter_core::migration::{plan_migrations, DdlStatement, Dialect, LiveSchema, RateLimitStorage};
use auth_adapter_core::schema::{Schema, SchemaOptions, SchemaRegistry};
use auth_adapter_core::transform::{transform_input, transform_output, Action};
use auth_adapter_core::types::{FieldName, GenerateContext, JoinSupport, ModelName, Value};
use auth_adapter_core::where_clause::{compile_where, CompiledPredicate, Connector, Operator, Predicate};

use crate::driver::{Driver, SortBy};
use crate::error::AdapterError;
use crate::hooks::{HookOperation, HookRegistry};
use crate::join::{self, JoinSpec, JoinedField};

/// How `id` values are produced. Exactly one policy is active per factory,
/// chosen at construction (§4.4).
#[derive(Clone)]
pub enum IdPolicy {
    /// The driver supplies an auto-increment id; the core never generates
    /// one, and the output id is stringified as usual.
    UseNumberId,
    /// The driver generates the id by its own means; the core never
    /// supplies one (`generateId: false`).
    DriverGenerated,
    /// The core generates an RFC-4122 v4 UUID.
    Uuid,
    /// A host-supplied function invoked per create, given `{model}`.
    Custom(Arc<dyn Fn(&GenerateContext) -> String + Send + Sync>),
    /// Default: a 16-24 char URL-safe random token.
    RandomToken,
}

impl fmt::Debug for IdPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UseNumberId => f.write_str("IdPolicy::UseNumberId"),
            Self::DriverGenerated => f.write_str("IdPolicy::DriverGenerated"),
            Self::Uuid => f.write_str("IdPolicy::Uuid"),
            Self::Custom(_) => f.write_str("IdPolicy::Custom(..)"),
            Self::RandomToken => f.write_str("IdPolicy::RandomToken"),
        }
    }
}

impl Default for IdPolicy {
    fn default() -> Self {
        Self::RandomToken
    }
}

const TOKEN_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789-_";

fn random_token() -> String {
    let mut rng = rand::rng();
    let len = rand::Rng::random_range(&mut rng, 16..=24usize);
    (0..len)
        .map(|_| {
            let idx = rand::Rng::random_range(&mut rng, 0..TOKEN_ALPHABET.len());
            TOKEN_ALPHABET[idx] as char
        })
        .collect()
}

fn generate_id(policy: &IdPolicy, ctx: &GenerateContext) -> Option<String> {
    match policy {
        IdPolicy::UseNumberId | IdPolicy::DriverGenerated => None,
        IdPolicy::Uuid => Some(uuid::Uuid::new_v4().to_string()),
        IdPolicy::Custom(f) => Some(f(ctx)),
        IdPolicy::RandomToken => Some(random_token()),
    }
}

/// Construction-time options for an [`AdapterFactory`].
#[derive(Clone)]
pub struct FactoryOptions {
    pub id_policy: IdPolicy,
    pub schema_options: SchemaOptions,
    /// Applied to `findMany` when the caller does not specify one (§4.4:
    /// "Default `findMany` limit is 100 when not specified").
    pub default_find_many_limit: usize,
}

impl Default for FactoryOptions {
    fn default() -> Self {
        Self {
            id_policy: IdPolicy::default(),
            schema_options: SchemaOptions::default(),
            default_find_many_limit: 100,
        }
    }
}

impl FactoryOptions {
    fn use_number_id(&self) -> bool {
        matches!(self.id_policy, IdPolicy::UseNumberId)
    }
}

fn id_field() -> FieldName {
    FieldName::new("id").expect("'id' is always a valid identifier")
}

/// A logical, output-transformed row.
pub type Row = BTreeMap<FieldName, Value>;

/// The result of a read with joins attached, keyed by the related model's
/// logical name.
#[derive(Debug, Clone, Default)]
pub struct JoinedRow {
    pub row: Row,
    pub joins: BTreeMap<ModelName, JoinedField>,
}

fn values_to_array(values: Vec<Value>) -> Value {
    if values.iter().all(|v| matches!(v, Value::Number(_))) {
        Value::NumberArray(values.into_iter().filter_map(|v| v.as_number()).collect())
    } else {
        Value::StringArray(
            values
                .into_iter()
                .map(|v| match v {
                    Value::String(s) => s,
                    other => other.to_string(),
                })
                .collect(),
        )
    }
}

/// Wraps a driver-provided adapter (C4). Generic over the concrete
/// [`Driver`] implementation; the factory is the only place in this crate
/// that knows a driver's associated error type.
pub struct AdapterFactory<D: Driver> {
    driver: D,
    schema: Schema,
    options: FactoryOptions,
    hooks: HookRegistry,
    instance_id: u64,
    transaction_counter: AtomicU64,
}

impl<D: Driver> AdapterFactory<D> {
    pub fn new(driver: D, schema: Schema, options: FactoryOptions, hooks: HookRegistry, instance_id: u64) -> Result<Self, AdapterError> {
        if options.use_number_id() && !driver.capabilities().supports_numeric_ids {
            return Err(AdapterError::CapabilityMismatch {
                reason: "useNumberId requested against a driver with supportsNumericIds: false".into(),
            });
        }
        Ok(Self {
            driver,
            schema,
            options,
            hooks,
            instance_id,
            transaction_counter: AtomicU64::new(0),
        })
    }

    pub fn driver(&self) -> &D {
        &self.driver
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    fn registry(&self) -> SchemaRegistry<'_> {
        SchemaRegistry::new(&self.schema, self.options.schema_options)
    }

    fn next_transaction_id(&self) -> u64 {
        self.transaction_counter.fetch_add(1, Ordering::Relaxed)
    }

    fn trace(&self, tx_id: u64, model: &str, operation: &str, phase: &str, detail: &dyn fmt::Debug) {
        debug!(
            factory_instance = self.instance_id,
            transaction_id = tx_id,
            model,
            operation,
            phase,
            detail = ?detail,
            "adapter factory trace"
        );
    }

    fn driver_error(&self, operation: &str, model: &str, tx_id: u64, err: D::Error) -> AdapterError {
        AdapterError::driver_failure(operation, model, tx_id, err)
    }

    async fn fetch_for_join(&self, request: join::FetchRequest) -> Result<Vec<Row>, AdapterError> {
        let registry = self.registry();
        let table = registry.get_model_name(&request.related)?;
        let physical_key = registry.get_field_name(&request.related, &request.key_field)?;
        let predicate = if request.key_values.len() == 1 {
            CompiledPredicate {
                field: physical_key.as_str().to_string(),
                value: request.key_values.into_iter().next().expect("len checked above"),
                operator: Operator::Eq,
                connector: Connector::And,
            }
        } else {
            CompiledPredicate {
                field: physical_key.as_str().to_string(),
                value: values_to_array(request.key_values),
                operator: Operator::In,
                connector: Connector::And,
            }
        };
        let model_def = self
            .schema
            .get(&request.related)
            .ok_or_else(|| AdapterError::SchemaLookup(auth_adapter_core::CoreError::UnknownModel(request.related.to_string())))?;
        let limit = request.limit.unwrap_or(self.options.default_find_many_limit as u64) as usize;
        let rows = self
            .driver
            .find_many(&table, std::slice::from_ref(&predicate), limit, None, None, None)
            .await
            .map_err(|e| self.driver_error("find_many", request.related.as_str(), 0, e))?;
        let capabilities = self.driver.capabilities();
        Ok(rows.iter().map(|row| transform_output(model_def, row, request.select.as_ref(), &capabilities)).collect())
    }

    async fn attach_joins(&self, logical_model: &ModelName, rows: &[Row], joins: &[JoinSpec]) -> Result<Vec<BTreeMap<ModelName, JoinedField>>, AdapterError> {
        let mut attachments: Vec<BTreeMap<ModelName, JoinedField>> = vec![BTreeMap::new(); rows.len()];
        if self.driver.capabilities().joins == JoinSupport::Native {
            // Native mode: the join descriptor is the driver's concern; the
            // core performs no secondary work (§4.5 mode 1).
            return Ok(attachments);
        }
        for spec in joins {
            let results = join::resolve_join_many(&self.schema, logical_model, &id_field(), rows, spec, |req| self.fetch_for_join(req)).await?;
            for (attachment, joined) in attachments.iter_mut().zip(results) {
                attachment.insert(spec.related.clone(), joined);
            }
        }
        Ok(attachments)
    }

    /// `create({model, data, select?, forceAllowId?}) -> R` (§4.4).
    pub async fn create(
        &self,
        model: &str,
        data: Row,
        select: Option<&[FieldName]>,
        force_allow_id: bool,
    ) -> Result<Row, AdapterError> {
        let tx_id = self.next_transaction_id();
        self.trace(tx_id, model, "create", "Unsafe Input", &data);

        let registry = self.registry();
        let logical_model = registry.get_default_model_name(model)?;
        let model_def = self
            .schema
            .get(&logical_model)
            .ok_or_else(|| AdapterError::SchemaLookup(auth_adapter_core::CoreError::UnknownModel(logical_model.to_string())))?;

        let mut data = self.hooks.run_before(&logical_model, HookOperation::Create, &data)?;

        let id_key = id_field();
        if !force_allow_id && data.contains_key(&id_key) {
            tracing::warn!(model, "caller-supplied id dropped; pass forceAllowId to override");
            data.remove(&id_key);
        }
        if !data.contains_key(&id_key) && !self.options.use_number_id() {
            let ctx = GenerateContext { model: logical_model.clone() };
            if let Some(generated) = generate_id(&self.options.id_policy, &ctx) {
                data.insert(id_key, Value::String(generated));
            }
        }

        let capabilities = self.driver.capabilities();
        let ctx = GenerateContext { model: logical_model.clone() };
        let physical_row = transform_input(model_def, &data, Action::Create, &capabilities, self.options.use_number_id(), &ctx);
        self.trace(tx_id, model, "create", "Parsed Input", &physical_row);

        let table = registry.get_model_name(&logical_model)?;
        let driver_row = self
            .driver
            .create(&table, physical_row)
            .await
            .map_err(|e| self.driver_error("create", model, tx_id, e))?;
        self.trace(tx_id, model, "create", "DB Result", &driver_row);

        let select_set = select.map(|s| s.iter().cloned().collect());
        let out = transform_output(model_def, &driver_row, select_set.as_ref(), &capabilities);
        self.trace(tx_id, model, "create", "Parsed Result", &out);

        self.hooks.run_after(&logical_model, HookOperation::Create, &out);
        Ok(out)
    }

    /// `update({model, where, update}) -> R|null` (§4.4).
    pub async fn update(&self, model: &str, where_: &[Predicate], update_data: Row) -> Result<Option<Row>, AdapterError> {
        let tx_id = self.next_transaction_id();
        self.trace(tx_id, model, "update", "Unsafe Input", &update_data);

        let registry = self.registry();
        let logical_model = registry.get_default_model_name(model)?;
        let model_def = self
            .schema
            .get(&logical_model)
            .ok_or_else(|| AdapterError::SchemaLookup(auth_adapter_core::CoreError::UnknownModel(logical_model.to_string())))?;

        let update_data = self.hooks.run_before(&logical_model, HookOperation::Update, &update_data)?;

        let capabilities = self.driver.capabilities();
        let ctx = GenerateContext { model: logical_model.clone() };
        let physical_patch = transform_input(model_def, &update_data, Action::Update, &capabilities, self.options.use_number_id(), &ctx);
        let compiled = compile_where(&registry, &logical_model, where_, self.options.use_number_id())?;
        self.trace(tx_id, model, "update", "Parsed Input", &physical_patch);

        let table = registry.get_model_name(&logical_model)?;
        let driver_row = self
            .driver
            .update(&table, &compiled, physical_patch)
            .await
            .map_err(|e| self.driver_error("update", model, tx_id, e))?;
        self.trace(tx_id, model, "update", "DB Result", &driver_row);

        let out = driver_row.map(|row| transform_output(model_def, &row, None, &capabilities));
        self.trace(tx_id, model, "update", "Parsed Result", &out);

        if let Some(row) = &out {
            self.hooks.run_after(&logical_model, HookOperation::Update, row);
        }
        Ok(out)
    }

    /// `updateMany({model, where, update}) -> number` (§4.4). Row-level
    /// hooks are not fanned out per affected row for bulk operations; this
    /// mirrors the spec's silence on per-row hook semantics for bulk writes.
    pub async fn update_many(&self, model: &str, where_: &[Predicate], update_data: Row) -> Result<u64, AdapterError> {
        let registry = self.registry();
        let logical_model = registry.get_default_model_name(model)?;
        let model_def = self
            .schema
            .get(&logical_model)
            .ok_or_else(|| AdapterError::SchemaLookup(auth_adapter_core::CoreError::UnknownModel(logical_model.to_string())))?;

        let capabilities = self.driver.capabilities();
        let ctx = GenerateContext { model: logical_model.clone() };
        let physical_patch = transform_input(model_def, &update_data, Action::Update, &capabilities, self.options.use_number_id(), &ctx);
        let compiled = compile_where(&registry, &logical_model, where_, self.options.use_number_id())?;
        let table = registry.get_model_name(&logical_model)?;
        self.driver
            .update_many(&table, &compiled, physical_patch)
            .await
            .map_err(|e| self.driver_error("updateMany", model, 0, e))
    }

    /// `findOne({model, where, select?, join?}) -> R|null` (§4.4).
    pub async fn find_one(
        &self,
        model: &str,
        where_: &[Predicate],
        select: Option<&[FieldName]>,
        joins: &[JoinSpec],
    ) -> Result<Option<JoinedRow>, AdapterError> {
        let tx_id = self.next_transaction_id();
        self.trace(tx_id, model, "findOne", "Unsafe Input", &where_.len());

        let registry = self.registry();
        let logical_model = registry.get_default_model_name(model)?;
        let model_def = self
            .schema
            .get(&logical_model)
            .ok_or_else(|| AdapterError::SchemaLookup(auth_adapter_core::CoreError::UnknownModel(logical_model.to_string())))?;

        let compiled = compile_where(&registry, &logical_model, where_, self.options.use_number_id())?;
        self.trace(tx_id, model, "findOne", "Parsed Input", &compiled.len());

        let table = registry.get_model_name(&logical_model)?;
        let select_strings: Option<Vec<String>> = select.map(|fields| {
            fields
                .iter()
                .filter_map(|f| registry.get_field_name(&logical_model, f).ok())
                .map(|f| f.as_str().to_string())
                .collect()
        });
        let driver_row = self
            .driver
            .find_one(&table, &compiled, select_strings.as_deref())
            .await
            .map_err(|e| self.driver_error("findOne", model, tx_id, e))?;
        self.trace(tx_id, model, "findOne", "DB Result", &driver_row);

        let capabilities = self.driver.capabilities();
        let select_set = select.map(|s| s.iter().cloned().collect());
        let row = driver_row.map(|r| transform_output(model_def, &r, select_set.as_ref(), &capabilities));
        self.trace(tx_id, model, "findOne", "Parsed Result", &row);

        let Some(row) = row else {
            return Ok(None);
        };

        let mut joined = BTreeMap::new();
        if capabilities.joins == JoinSupport::Fallback {
            for spec in joins {
                if let Some(result) = join::resolve_join_one(&self.schema, &logical_model, &id_field(), Some(&row), spec, |req| self.fetch_for_join(req)).await? {
                    joined.insert(spec.related.clone(), result);
                }
            }
        }
        Ok(Some(JoinedRow { row, joins: joined }))
    }

    /// `findMany({model, where?, limit?, offset?, sortBy?, join?}) -> R[]` (§4.4).
    pub async fn find_many(
        &self,
        model: &str,
        where_: &[Predicate],
        limit: Option<usize>,
        offset: Option<u64>,
        sort_by: Option<&SortBy>,
        joins: &[JoinSpec],
    ) -> Result<Vec<JoinedRow>, AdapterError> {
        let tx_id = self.next_transaction_id();
        self.trace(tx_id, model, "findMany", "Unsafe Input", &where_.len());

        let registry = self.registry();
        let logical_model = registry.get_default_model_name(model)?;
        let model_def = self
            .schema
            .get(&logical_model)
            .ok_or_else(|| AdapterError::SchemaLookup(auth_adapter_core::CoreError::UnknownModel(logical_model.to_string())))?;

        let compiled = compile_where(&registry, &logical_model, where_, self.options.use_number_id())?;
        let effective_limit = limit.unwrap_or(self.options.default_find_many_limit);
        self.trace(tx_id, model, "findMany", "Parsed Input", &compiled.len());

        let table = registry.get_model_name(&logical_model)?;
        let driver_rows = self
            .driver
            .find_many(&table, &compiled, effective_limit, offset, sort_by, None)
            .await
            .map_err(|e| self.driver_error("findMany", model, tx_id, e))?;
        self.trace(tx_id, model, "findMany", "DB Result", &driver_rows.len());

        let capabilities = self.driver.capabilities();
        let rows: Vec<Row> = driver_rows.iter().map(|r| transform_output(model_def, r, None, &capabilities)).collect();
        self.trace(tx_id, model, "findMany", "Parsed Result", &rows.len());

        let attachments = self.attach_joins(&logical_model, &rows, joins).await?;
        Ok(rows
            .into_iter()
            .zip(attachments)
            .map(|(row, joins)| JoinedRow { row, joins })
            .collect())
    }

    /// `delete({model, where}) -> void` (§4.4). Idempotent: a delete against
    /// a missing row succeeds without invoking hooks.
    pub async fn delete(&self, model: &str, where_: &[Predicate]) -> Result<(), AdapterError> {
        let registry = self.registry();
        let logical_model = registry.get_default_model_name(model)?;
        let model_def = self
            .schema
            .get(&logical_model)
            .ok_or_else(|| AdapterError::SchemaLookup(auth_adapter_core::CoreError::UnknownModel(logical_model.to_string())))?;

        let compiled = compile_where(&registry, &logical_model, where_, self.options.use_number_id())?;
        let table = registry.get_model_name(&logical_model)?;

        let existing = self
            .driver
            .find_one(&table, &compiled, None)
            .await
            .map_err(|e| self.driver_error("delete", model, 0, e))?;
        let Some(existing) = existing else {
            return Ok(());
        };
        let capabilities = self.driver.capabilities();
        let payload = transform_output(model_def, &existing, None, &capabilities);
        let payload = self.hooks.run_before(&logical_model, HookOperation::Delete, &payload)?;

        self.driver
            .delete(&table, &compiled)
            .await
            .map_err(|e| self.driver_error("delete", model, 0, e))?;

        self.hooks.run_after(&logical_model, HookOperation::Delete, &payload);
        Ok(())
    }

    /// `deleteMany({model, where}) -> number` (§4.4).
    pub async fn delete_many(&self, model: &str, where_: &[Predicate]) -> Result<u64, AdapterError> {
        let registry = self.registry();
        let logical_model = registry.get_default_model_name(model)?;
        let compiled = compile_where(&registry, &logical_model, where_, self.options.use_number_id())?;
        let table = registry.get_model_name(&logical_model)?;
        self.driver
            .delete_many(&table, &compiled)
            .await
            .map_err(|e| self.driver_error("deleteMany", model, 0, e))
    }

    /// `count({model, where?}) -> number` (§4.4).
    pub async fn count(&self, model: &str, where_: &[Predicate]) -> Result<u64, AdapterError> {
        let registry = self.registry();
        let logical_model = registry.get_default_model_name(model)?;
        let compiled = compile_where(&registry, &logical_model, where_, self.options.use_number_id())?;
        let table = registry.get_model_name(&logical_model)?;
        self.driver.count(&table, &compiled).await.map_err(|e| self.driver_error("count", model, 0, e))
    }

    /// `transaction(fn)`: delegates to the driver's own `transaction` when
    /// it declares transaction support, so a driver with a real begin/
    /// commit/rollback boundary actually provides one; otherwise runs `f`
    /// against this same factory in sequence and reports
    /// `TransactionUnsupported` (informational, not fatal -- §7).
    pub async fn transaction<'s, F, Fut, T>(&'s self, f: F) -> Result<T, AdapterError>
    where
        F: FnOnce(&'s Self) -> Fut + Send,
        Fut: std::future::Future<Output = Result<T, AdapterError>> + Send + 's,
    {
        if self.driver.capabilities().supports_transactions {
            self.driver.transaction(move || f(self)).await
        } else {
            tracing::warn!("{}", AdapterError::TransactionUnsupported);
            f(self).await
        }
    }

    /// `createSchema(file?)`: introspects the live database, diffs it
    /// against the composed schema (C6), and asks the driver to apply the
    /// resulting statements.
    pub async fn create_schema(&self, dialect: Dialect, rate_limit: RateLimitStorage) -> Result<Vec<DdlStatement>, AdapterError> {
        let live: LiveSchema = self.driver.introspect().await.map_err(|e| self.driver_error("introspect", "*", 0, e))?;
        let statements = plan_migrations(&self.schema, &live, dialect, rate_limit, self.options.schema_options.use_plural)?;
        self.driver
            .create_schema(&statements)
            .await
            .map_err(|e| self.driver_error("createSchema", "*", 0, e))?;
        Ok(statements)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn random_token_length_is_in_range() {
        for _ in 0..50 {
            let token = random_token();
            assert!(token.len() >= 16 && token.len() <= 24, "token length {} out of range", token.len());
            assert!(token.chars().all(|c| TOKEN_ALPHABET.contains(&(c as u8))));
        }
    }

    #[test]
    fn use_number_id_only_true_for_that_policy() {
        let mut options = FactoryOptions::default();
        assert!(!options.use_number_id());
        options.id_policy = IdPolicy::UseNumberId;
        assert!(options.use_number_id());
    }

    #[test]
    fn values_to_array_groups_numbers_together() {
        let arr = values_to_array(vec![Value::Number(1), Value::Number(2)]);
        assert_eq!(arr, Value::NumberArray(vec![1, 2]));
    }

    #[test]
    fn values_to_array_falls_back_to_strings_for_mixed_input() {
        let arr = values_to_array(vec![Value::String("a".into()), Value::Number(2)]);
        assert_eq!(arr, Value::StringArray(vec!["a".into(), "2".into()]));
    }
}
