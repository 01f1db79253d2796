//! The adapter driver contract (§6.1): what a backend implementer provides.
//!
//! Uses RPITIT (return position `impl Trait` in trait) for async methods,
//! matching the teacher's `SchemaBackend`/`EntityStore` traits, so no
//! `async-trait` crate is required.

use std::collections::BTreeMap;
use std::future::Future;

use auth_adapter_core::migration::{DdlStatement, LiveSchema};
use auth_adapter_core::types::{Capabilities, Value};
use auth_adapter_core::where_clause::CompiledPredicate;

/// A driver-facing row: physical column names to already-coerced values.
pub type DriverRow = BTreeMap<String, Value>;

/// A single sort instruction forwarded to `findMany`, already resolved to a
/// physical column name.
#[derive(Debug, Clone)]
pub struct SortBy {
    pub field: String,
    pub descending: bool,
}

/// A backend implementation conforming to §6.1. Every method operates on
/// already physical names and already-compiled predicates -- name
/// resolution (C1), field transform (C2), and where-compilation (C3) all
/// happen in the Adapter Factory before a driver is ever called.
pub trait Driver: Send + Sync {
    /// The driver's own error type. The Adapter Factory wraps every
    /// occurrence in `AdapterError::DriverFailure` with operation context.
    type Error: std::error::Error + Send + Sync + 'static;

    fn adapter_id(&self) -> &str;
    fn adapter_name(&self) -> &str;

    /// The capability record governing C2 coercion and C5 join mode
    /// selection.
    fn capabilities(&self) -> Capabilities;

    /// `true` if the driver itself assigns `id` (numeric auto-increment)
    /// and the core must never generate one. Mirrors `disableIdGeneration`.
    fn disables_id_generation(&self) -> bool {
        false
    }

    fn create(&self, table: &str, row: DriverRow) -> impl Future<Output = Result<DriverRow, Self::Error>> + Send;

    fn find_one(
        &self,
        table: &str,
        where_: &[CompiledPredicate],
        select: Option<&[String]>,
    ) -> impl Future<Output = Result<Option<DriverRow>, Self::Error>> + Send;

    fn find_many(
        &self,
        table: &str,
        where_: &[CompiledPredicate],
        limit: usize,
        offset: Option<u64>,
        sort_by: Option<&SortBy>,
        select: Option<&[String]>,
    ) -> impl Future<Output = Result<Vec<DriverRow>, Self::Error>> + Send;

    fn update(
        &self,
        table: &str,
        where_: &[CompiledPredicate],
        patch: DriverRow,
    ) -> impl Future<Output = Result<Option<DriverRow>, Self::Error>> + Send;

    fn update_many(
        &self,
        table: &str,
        where_: &[CompiledPredicate],
        patch: DriverRow,
    ) -> impl Future<Output = Result<u64, Self::Error>> + Send;

    fn delete(&self, table: &str, where_: &[CompiledPredicate]) -> impl Future<Output = Result<(), Self::Error>> + Send;

    fn delete_many(&self, table: &str, where_: &[CompiledPredicate]) -> impl Future<Output = Result<u64, Self::Error>> + Send;

    fn count(&self, table: &str, where_: &[CompiledPredicate]) -> impl Future<Output = Result<u64, Self::Error>> + Send;

    /// Introspects live tables for the migration planner (C6). Restricted to
    /// whatever scope the driver considers its current search path/database.
    fn introspect(&self) -> impl Future<Output = Result<LiveSchema, Self::Error>> + Send;

    /// Executes a planned migration (optional per driver; §4.4
    /// `createSchema`). The default does nothing and reports success, for
    /// drivers that only support introspection plus external tooling.
    fn create_schema(&self, _statements: &[DdlStatement]) -> impl Future<Output = Result<(), Self::Error>> + Send {
        async { Ok(()) }
    }

    /// `transaction(fn)` (§4.4, §6.1 optional `transaction` capability):
    /// runs `f` under whatever atomicity guarantee the driver can offer.
    /// Generic over the caller's own result type rather than `Self::Error`,
    /// since the wrapped closure runs arbitrary Adapter Factory operations
    /// and produces `AdapterError`, not a driver error.
    ///
    /// The default runs `f` directly with no transactional framing -- only
    /// meaningful for drivers that declare `supports_transactions: true`
    /// anyway, since `AdapterFactory::transaction` checks that flag before
    /// delegating here. A driver with a real begin/commit/rollback boundary
    /// overrides this to wrap `f` accordingly.
    fn transaction<F, Fut, T, E>(&self, f: F) -> impl Future<Output = Result<T, E>> + Send
    where
        F: FnOnce() -> Fut + Send,
        Fut: Future<Output = Result<T, E>> + Send,
    {
        f()
    }
}
