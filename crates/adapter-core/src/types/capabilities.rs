use std::fmt;
use std::sync::Arc;

/// A driver-provided blanket key remapper: applied to every physical column
/// name in addition to any per-field `fieldName` override (§6.1
/// `mapKeysTransformInput`/`mapKeysTransformOutput`), e.g. a driver that
/// stores every column in `snake_case` regardless of the schema's logical
/// (typically camelCase) naming.
pub type KeyMapHook = Arc<dyn Fn(&str) -> String + Send + Sync>;

/// A driver-provided override of the default capability-driven coercion for
/// a single value (§6.1 `customTransformInput`/`customTransformOutput`).
/// When set, it replaces the built-in boolean/date/json/array/number
/// coercion cascade entirely for every field on that driver.
pub type CustomTransformHook = Arc<dyn Fn(super::Value) -> super::Value + Send + Sync>;

/// The closed capability record a driver declares about itself. A plain
/// struct of named booleans rather than a bitflags set, matching the field
/// list the capability record is specified field-by-field with: blurring it
/// into a flags integer would hide which flags exist from a reader of the
/// type.
///
/// Consumed by the field transform (coercion fallbacks), the where-clause
/// compiler (which operators a driver can execute natively), the join
/// resolver (native vs. fallback join mode), and the adapter factory (id
/// policy dispatch).
#[derive(Clone)]
pub struct Capabilities {
    pub supports_booleans: bool,
    pub supports_dates: bool,
    pub supports_json: bool,
    pub supports_arrays: bool,
    pub supports_numeric_ids: bool,
    /// Whether the driver has a native numeric column type for plain
    /// `number` fields (distinct from `supports_numeric_ids`, which governs
    /// only `id` and reference coercion under `useNumberId`).
    pub supports_numbers: bool,
    pub joins: JoinSupport,
    pub supports_transactions: bool,
    /// Blanket physical-key remap applied on the way into the driver, after
    /// the per-field `fieldName` override has already been resolved (§4.2
    /// step 5, §6.1 `mapKeysTransformInput`).
    pub map_keys_transform_input: Option<KeyMapHook>,
    /// Inverse of `map_keys_transform_input`, applied before a physical key
    /// is looked up in a driver row on the way out (§6.1
    /// `mapKeysTransformOutput`).
    pub map_keys_transform_output: Option<KeyMapHook>,
    /// Replaces the default coercion cascade for every field on input when
    /// set (§6.1 `customTransformInput`).
    pub custom_transform_input: Option<CustomTransformHook>,
    /// Replaces the default decoding cascade for every field on output when
    /// set (§6.1 `customTransformOutput`).
    pub custom_transform_output: Option<CustomTransformHook>,
}

/// Whether a driver can execute relational joins itself or needs the
/// framework's fallback join resolver (batched `in`-queries).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinSupport {
    Native,
    Fallback,
}

impl Capabilities {
    /// A driver supporting every optional feature natively: booleans,
    /// dates, json, arrays, numeric ids, native joins, transactions, no
    /// custom key-map or transform hooks.
    pub const fn full() -> Self {
        Self {
            supports_booleans: true,
            supports_dates: true,
            supports_json: true,
            supports_arrays: true,
            supports_numeric_ids: true,
            supports_numbers: true,
            joins: JoinSupport::Native,
            supports_transactions: true,
            map_keys_transform_input: None,
            map_keys_transform_output: None,
            custom_transform_input: None,
            custom_transform_output: None,
        }
    }

    /// A minimal driver: no optional type support, fallback joins, no
    /// transactions, no custom key-map or transform hooks. Useful as a
    /// starting point for exercising coercion and fallback-join paths in
    /// tests.
    pub const fn minimal() -> Self {
        Self {
            supports_booleans: false,
            supports_dates: false,
            supports_json: false,
            supports_arrays: false,
            supports_numeric_ids: false,
            supports_numbers: false,
            joins: JoinSupport::Fallback,
            supports_transactions: false,
            map_keys_transform_input: None,
            map_keys_transform_output: None,
            custom_transform_input: None,
            custom_transform_output: None,
        }
    }

    pub fn with_map_keys_transform_input(mut self, hook: KeyMapHook) -> Self {
        self.map_keys_transform_input = Some(hook);
        self
    }

    pub fn with_map_keys_transform_output(mut self, hook: KeyMapHook) -> Self {
        self.map_keys_transform_output = Some(hook);
        self
    }

    pub fn with_custom_transform_input(mut self, hook: CustomTransformHook) -> Self {
        self.custom_transform_input = Some(hook);
        self
    }

    pub fn with_custom_transform_output(mut self, hook: CustomTransformHook) -> Self {
        self.custom_transform_output = Some(hook);
        self
    }
}

impl Default for Capabilities {
    fn default() -> Self {
        Self::full()
    }
}

impl fmt::Debug for Capabilities {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Capabilities")
            .field("supports_booleans", &self.supports_booleans)
            .field("supports_dates", &self.supports_dates)
            .field("supports_json", &self.supports_json)
            .field("supports_arrays", &self.supports_arrays)
            .field("supports_numeric_ids", &self.supports_numeric_ids)
            .field("supports_numbers", &self.supports_numbers)
            .field("joins", &self.joins)
            .field("supports_transactions", &self.supports_transactions)
            .field("map_keys_transform_input", &self.map_keys_transform_input.is_some())
            .field("map_keys_transform_output", &self.map_keys_transform_output.is_some())
            .field("custom_transform_input", &self.custom_transform_input.is_some())
            .field("custom_transform_output", &self.custom_transform_output.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Value;

    #[test]
    fn full_has_every_flag_set() {
        let c = Capabilities::full();
        assert!(c.supports_booleans && c.supports_dates && c.supports_json);
        assert!(c.supports_arrays && c.supports_numeric_ids && c.supports_transactions);
        assert_eq!(c.joins, JoinSupport::Native);
        assert!(c.map_keys_transform_input.is_none());
        assert!(c.custom_transform_input.is_none());
    }

    #[test]
    fn minimal_has_no_optional_flags() {
        let c = Capabilities::minimal();
        assert!(!c.supports_booleans && !c.supports_dates && !c.supports_json);
        assert!(!c.supports_arrays && !c.supports_numeric_ids && !c.supports_transactions);
        assert_eq!(c.joins, JoinSupport::Fallback);
    }

    #[test]
    fn key_map_hook_transforms_a_physical_name() {
        let caps = Capabilities::full().with_map_keys_transform_input(Arc::new(|k: &str| k.to_lowercase()));
        let hook = caps.map_keys_transform_input.as_ref().unwrap();
        assert_eq!(hook("EMAIL"), "email");
    }

    #[test]
    fn custom_transform_hook_overrides_default_coercion() {
        let caps = Capabilities::full().with_custom_transform_input(Arc::new(|_v| Value::String("overridden".into())));
        let hook = caps.custom_transform_input.as_ref().unwrap();
        assert_eq!(hook(Value::Boolean(true)), Value::String("overridden".into()));
    }
}
