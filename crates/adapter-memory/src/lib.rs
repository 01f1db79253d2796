//! An in-memory reference driver (§6.1) backed by a `BTreeMap` table store
//! behind a `tokio::sync::RwLock`.
//!
//! Not a spec.md module in its own right -- real dialect drivers are out of
//! scope -- but required as ambient test tooling: without at least one
//! concrete [`Driver`] implementation, the Adapter Factory, Join Resolver,
//! Lifecycle Hooks, and Secondary Storage have no integration-level tests.
//! Grounded on the teacher's `schema-forge-surrealdb::SurrealBackend` (a
//! concrete driver implementing the same trait set against a real backend),
//! adapted to an in-process store since this crate has no wire protocol to
//! speak.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicI64, Ordering as AtomicOrdering};

use tokio::sync::RwLock;

use auth_adapter_backend::driver::{Driver, DriverRow, SortBy};
use auth_adapter_core::migration::{DdlStatement, LiveColumn, LiveSchema, LiveTable};
use auth_adapter_core::types::{Capabilities, JoinSupport, Value};
use auth_adapter_core::where_clause::{group, CompiledPredicate, Connector, Operator};

/// The only error this driver can produce. Every method here is infallible
/// in practice (no I/O), but the trait requires a concrete, `Send + Sync +
/// 'static` error type; this exists mainly so a caller exercising
/// `AdapterError::DriverFailure` against a concrete driver has something to
/// construct.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryError(pub String);

impl fmt::Display for MemoryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "in-memory driver error: {}", self.0)
    }
}

impl std::error::Error for MemoryError {}

#[derive(Debug, Default)]
struct Table {
    rows: Vec<DriverRow>,
}

/// The in-memory reference driver. Table name is the physical model name
/// (already resolved by the Adapter Factory before any call reaches here).
pub struct MemoryDriver {
    tables: RwLock<BTreeMap<String, Table>>,
    capabilities: Capabilities,
    next_id: AtomicI64,
}

impl MemoryDriver {
    /// A driver with every optional capability enabled and native joins
    /// (matching SPEC_FULL.md's default).
    pub fn new() -> Self {
        Self::with_capabilities(Capabilities::full())
    }

    /// A driver configured with a specific capability record, to exercise
    /// C2's coercion fallbacks and C5's fallback-join path in tests.
    pub fn with_capabilities(capabilities: Capabilities) -> Self {
        Self {
            tables: RwLock::new(BTreeMap::new()),
            capabilities,
            next_id: AtomicI64::new(1),
        }
    }

    /// A minimal-capability driver (no booleans/dates/json/arrays/numeric
    /// ids, fallback joins) for exercising every coercion fallthrough.
    pub fn minimal() -> Self {
        Self::with_capabilities(Capabilities::minimal())
    }

    fn next_numeric_id(&self) -> i64 {
        self.next_id.fetch_add(1, AtomicOrdering::Relaxed)
    }
}

impl Default for MemoryDriver {
    fn default() -> Self {
        Self::new()
    }
}

fn row_value_or_null(row: &DriverRow, field: &str) -> Value {
    row.get(field).cloned().unwrap_or(Value::Null)
}

fn values_equal(a: &Value, b: &Value) -> bool {
    a == b
}

fn value_in_array(value: &Value, array: &Value) -> bool {
    match (value, array) {
        (Value::String(s), Value::StringArray(items)) => items.contains(s),
        (Value::Number(n), Value::NumberArray(items)) => items.contains(n),
        _ => false,
    }
}

fn string_op(value: &Value, needle: &Value, op: Operator) -> bool {
    let (Value::String(haystack), Value::String(needle)) = (value, needle) else {
        return false;
    };
    match op {
        Operator::Contains => haystack.contains(needle.as_str()),
        Operator::StartsWith => haystack.starts_with(needle.as_str()),
        Operator::EndsWith => haystack.ends_with(needle.as_str()),
        _ => unreachable!("string_op only called for Contains/StartsWith/EndsWith"),
    }
}

fn compare(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.partial_cmp(y),
        (Value::String(x), Value::String(y)) => x.partial_cmp(y),
        (Value::Date(x), Value::Date(y)) => x.partial_cmp(y),
        _ => None,
    }
}

fn predicate_matches(row: &DriverRow, predicate: &CompiledPredicate) -> bool {
    let actual = row_value_or_null(row, &predicate.field);
    match predicate.operator {
        Operator::Eq => values_equal(&actual, &predicate.value),
        Operator::Ne => !values_equal(&actual, &predicate.value),
        Operator::Lt => compare(&actual, &predicate.value) == Some(Ordering::Less),
        Operator::Lte => matches!(compare(&actual, &predicate.value), Some(Ordering::Less) | Some(Ordering::Equal)),
        Operator::Gt => compare(&actual, &predicate.value) == Some(Ordering::Greater),
        Operator::Gte => matches!(compare(&actual, &predicate.value), Some(Ordering::Greater) | Some(Ordering::Equal)),
        Operator::In => value_in_array(&actual, &predicate.value),
        Operator::NotIn => !value_in_array(&actual, &predicate.value),
        Operator::Contains | Operator::StartsWith | Operator::EndsWith => string_op(&actual, &predicate.value, predicate.operator),
    }
}

/// `AND(ands) AND OR(ors)`: every `and` predicate must match, and -- if any
/// `or` predicates are present -- at least one of them must match too.
fn row_matches(row: &DriverRow, predicates: &[CompiledPredicate]) -> bool {
    let groups = group(predicates.to_vec());
    let ands_match = groups.ands.iter().all(|p| predicate_matches(row, p));
    let ors_match = groups.ors.is_empty() || groups.ors.iter().any(|p| predicate_matches(row, p));
    ands_match && ors_match
}

fn apply_select(row: &DriverRow, select: Option<&[String]>) -> DriverRow {
    match select {
        None => row.clone(),
        Some(fields) => row.iter().filter(|(k, _)| fields.iter().any(|f| f == *k)).map(|(k, v)| (k.clone(), v.clone())).collect(),
    }
}

fn sort_rows(rows: &mut [DriverRow], sort_by: &SortBy) {
    rows.sort_by(|a, b| {
        let av = row_value_or_null(a, &sort_by.field);
        let bv = row_value_or_null(b, &sort_by.field);
        let ordering = compare(&av, &bv).unwrap_or(Ordering::Equal);
        if sort_by.descending {
            ordering.reverse()
        } else {
            ordering
        }
    });
}

impl Driver for MemoryDriver {
    type Error = MemoryError;

    fn adapter_id(&self) -> &str {
        "memory"
    }

    fn adapter_name(&self) -> &str {
        "auth-adapter-memory"
    }

    fn capabilities(&self) -> Capabilities {
        self.capabilities.clone()
    }

    async fn create(&self, table: &str, mut row: DriverRow) -> Result<DriverRow, Self::Error> {
        if self.capabilities.supports_numeric_ids && !row.contains_key("id") {
            row.insert("id".to_string(), Value::Number(self.next_numeric_id()));
        }
        let mut tables = self.tables.write().await;
        tables.entry(table.to_string()).or_default().rows.push(row.clone());
        Ok(row)
    }

    async fn find_one(&self, table: &str, where_: &[CompiledPredicate], select: Option<&[String]>) -> Result<Option<DriverRow>, Self::Error> {
        let tables = self.tables.read().await;
        let found = tables.get(table).and_then(|t| t.rows.iter().find(|row| row_matches(row, where_)));
        Ok(found.map(|row| apply_select(row, select)))
    }

    async fn find_many(
        &self,
        table: &str,
        where_: &[CompiledPredicate],
        limit: usize,
        offset: Option<u64>,
        sort_by: Option<&SortBy>,
        select: Option<&[String]>,
    ) -> Result<Vec<DriverRow>, Self::Error> {
        let tables = self.tables.read().await;
        let mut matched: Vec<DriverRow> = tables
            .get(table)
            .map(|t| t.rows.iter().filter(|row| row_matches(row, where_)).cloned().collect())
            .unwrap_or_default();

        if let Some(sort_by) = sort_by {
            sort_rows(&mut matched, sort_by);
        }

        let offset = offset.unwrap_or(0) as usize;
        let page: Vec<DriverRow> = matched.into_iter().skip(offset).take(limit).map(|row| apply_select(&row, select)).collect();
        Ok(page)
    }

    async fn update(&self, table: &str, where_: &[CompiledPredicate], patch: DriverRow) -> Result<Option<DriverRow>, Self::Error> {
        let mut tables = self.tables.write().await;
        let Some(t) = tables.get_mut(table) else {
            return Ok(None);
        };
        let Some(row) = t.rows.iter_mut().find(|row| row_matches(row, where_)) else {
            return Ok(None);
        };
        for (k, v) in patch {
            row.insert(k, v);
        }
        Ok(Some(row.clone()))
    }

    async fn update_many(&self, table: &str, where_: &[CompiledPredicate], patch: DriverRow) -> Result<u64, Self::Error> {
        let mut tables = self.tables.write().await;
        let Some(t) = tables.get_mut(table) else {
            return Ok(0);
        };
        let mut count = 0u64;
        for row in t.rows.iter_mut().filter(|row| row_matches(row, where_)) {
            for (k, v) in &patch {
                row.insert(k.clone(), v.clone());
            }
            count += 1;
        }
        Ok(count)
    }

    async fn delete(&self, table: &str, where_: &[CompiledPredicate]) -> Result<(), Self::Error> {
        let mut tables = self.tables.write().await;
        if let Some(t) = tables.get_mut(table) {
            if let Some(pos) = t.rows.iter().position(|row| row_matches(row, where_)) {
                t.rows.remove(pos);
            }
        }
        Ok(())
    }

    async fn delete_many(&self, table: &str, where_: &[CompiledPredicate]) -> Result<u64, Self::Error> {
        let mut tables = self.tables.write().await;
        let Some(t) = tables.get_mut(table) else {
            return Ok(0);
        };
        let before = t.rows.len();
        t.rows.retain(|row| !row_matches(row, where_));
        Ok((before - t.rows.len()) as u64)
    }

    async fn count(&self, table: &str, where_: &[CompiledPredicate]) -> Result<u64, Self::Error> {
        let tables = self.tables.read().await;
        Ok(tables.get(table).map(|t| t.rows.iter().filter(|row| row_matches(row, where_)).count() as u64).unwrap_or(0))
    }

    async fn introspect(&self) -> Result<LiveSchema, Self::Error> {
        let tables = self.tables.read().await;
        let mut live = LiveSchema::new();
        for (name, table) in tables.iter() {
            let mut columns = Vec::new();
            if let Some(first) = table.rows.first() {
                for (key, value) in first {
                    columns.push(LiveColumn {
                        name: key.clone(),
                        data_type: format!("{:?}", value.field_type()),
                    });
                }
            }
            live.insert(name.clone(), LiveTable { columns });
        }
        Ok(live)
    }

    async fn create_schema(&self, statements: &[DdlStatement]) -> Result<(), Self::Error> {
        let mut tables = self.tables.write().await;
        for statement in statements {
            if let DdlStatement::CreateTable { table, .. } = statement {
                tables.entry(table.clone()).or_default();
            }
        }
        Ok(())
    }
}
