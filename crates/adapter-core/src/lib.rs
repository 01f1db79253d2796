//! Pure, synchronous core of the adapter framework: schema composition and
//! name resolution (C1), field-level transform (C2), the where-clause
//! compiler (C3), and the migration planner (C6). No I/O, no async, no
//! driver trait -- those live in `auth-adapter-backend`.

pub mod base_schema;
pub mod error;
pub mod migration;
pub mod schema;
pub mod transform;
pub mod types;
pub mod where_clause;

pub use error::CoreError;
pub use schema::{compose, Schema, SchemaOptions, SchemaRegistry};
pub use transform::{transform_input, transform_output, Action};
pub use where_clause::{compile_where, group, CompiledPredicate, Connector, Operator, Predicate, WhereGroups};
