pub mod driver;
pub mod error;
pub mod factory;
pub mod hooks;
pub mod internal;
pub mod join;
pub mod secondary;

pub use driver::{Driver, DriverRow, SortBy};
pub use error::AdapterError;
pub use factory::{AdapterFactory, FactoryOptions, IdPolicy, JoinedRow, Row};
pub use hooks::{AfterHook, BeforeHook, HookOperation, HookPayload, HookRegistry};
pub use internal::InternalAdapter;
pub use join::{classify_relation, resolve_join_many, resolve_join_one, JoinSpec, JoinedField, RelationDirection};
pub use secondary::{active_sessions_key, session_key, ttl_seconds_from_millis, NoopSecondaryStorage, SecondaryStorage};
