//! Lifecycle hooks (C8): before/after callbacks per model x operation,
//! merged from options and plugins in declaration order.
//!
//! Mirrors the field-level `TransformHook` shape in
//! `auth_adapter_core::types::field_attribute` (an `Arc<dyn Fn>` with a
//! manual `Debug` impl) rather than introducing a trait-object hierarchy.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use auth_adapter_core::types::{FieldName, ModelName, Value};

use crate::error::AdapterError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum HookOperation {
    Create,
    Update,
    Delete,
}

impl HookOperation {
    fn as_str(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }
}

pub type HookPayload = BTreeMap<FieldName, Value>;

/// A `before` hook: may replace the payload (`Ok(Some(..))`), continue
/// unchanged (`Ok(None)`), or abort the operation (`Err`).
#[derive(Clone)]
pub struct BeforeHook(Arc<dyn Fn(&HookPayload) -> Result<Option<HookPayload>, String> + Send + Sync>);

impl BeforeHook {
    pub fn new(f: impl Fn(&HookPayload) -> Result<Option<HookPayload>, String> + Send + Sync + 'static) -> Self {
        Self(Arc::new(f))
    }

    fn call(&self, payload: &HookPayload) -> Result<Option<HookPayload>, String> {
        (self.0)(payload)
    }
}

impl fmt::Debug for BeforeHook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("BeforeHook(..)")
    }
}

/// An `after` hook: observes the final payload, cannot alter or abort.
#[derive(Clone)]
pub struct AfterHook(Arc<dyn Fn(&HookPayload) + Send + Sync>);

impl AfterHook {
    pub fn new(f: impl Fn(&HookPayload) + Send + Sync + 'static) -> Self {
        Self(Arc::new(f))
    }

    fn call(&self, payload: &HookPayload) {
        (self.0)(payload)
    }
}

impl fmt::Debug for AfterHook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AfterHook(..)")
    }
}

/// The merged hook table: options hooks registered first, then plugin hooks
/// in plugin-registration order, preserved as insertion order per
/// `(model, operation)` bucket.
#[derive(Debug, Clone, Default)]
pub struct HookRegistry {
    before: BTreeMap<(ModelName, HookOperation), Vec<BeforeHook>>,
    after: BTreeMap<(ModelName, HookOperation), Vec<AfterHook>>,
}

impl HookRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_before(&mut self, model: ModelName, operation: HookOperation, hook: BeforeHook) {
        self.before.entry((model, operation)).or_default().push(hook);
    }

    pub fn register_after(&mut self, model: ModelName, operation: HookOperation, hook: AfterHook) {
        self.after.entry((model, operation)).or_default().push(hook);
    }

    /// Runs every registered `before` hook for `(model, operation)` in
    /// declaration order, threading the (possibly replaced) payload through.
    pub fn run_before(&self, model: &ModelName, operation: HookOperation, payload: &HookPayload) -> Result<HookPayload, AdapterError> {
        let mut current = payload.clone();
        if let Some(hooks) = self.before.get(&(model.clone(), operation)) {
            for hook in hooks {
                match hook.call(&current) {
                    Ok(Some(replacement)) => current = replacement,
                    Ok(None) => {}
                    Err(message) => {
                        return Err(AdapterError::HookAbort {
                            model: model.to_string(),
                            operation: operation.as_str().to_string(),
                            message,
                        })
                    }
                }
            }
        }
        Ok(current)
    }

    /// Runs every registered `after` hook for `(model, operation)` in
    /// declaration order. Observational only; failures are not modeled.
    pub fn run_after(&self, model: &ModelName, operation: HookOperation, payload: &HookPayload) {
        if let Some(hooks) = self.after.get(&(model.clone(), operation)) {
            for hook in hooks {
                hook.call(payload);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload(pairs: &[(&str, Value)]) -> HookPayload {
        pairs.iter().map(|(k, v)| (FieldName::new(*k).unwrap(), v.clone())).collect()
    }

    #[test]
    fn unregistered_hook_bucket_passes_payload_through_unchanged() {
        let registry = HookRegistry::new();
        let model = ModelName::new("user").unwrap();
        let data = payload(&[("email", Value::String("a@b.com".into()))]);
        let out = registry.run_before(&model, HookOperation::Create, &data).unwrap();
        assert_eq!(out, data);
    }

    #[test]
    fn before_hook_can_replace_payload() {
        let mut registry = HookRegistry::new();
        let model = ModelName::new("user").unwrap();
        registry.register_before(
            model.clone(),
            HookOperation::Create,
            BeforeHook::new(|_data| {
                let mut replacement = HookPayload::new();
                replacement.insert(FieldName::new("email").unwrap(), Value::String("rewritten@b.com".into()));
                Ok(Some(replacement))
            }),
        );
        let data = payload(&[("email", Value::String("a@b.com".into()))]);
        let out = registry.run_before(&model, HookOperation::Create, &data).unwrap();
        assert_eq!(out.get(&FieldName::new("email").unwrap()), Some(&Value::String("rewritten@b.com".into())));
    }

    #[test]
    fn before_hook_failure_aborts_with_hook_abort_error() {
        let mut registry = HookRegistry::new();
        let model = ModelName::new("user").unwrap();
        registry.register_before(
            model.clone(),
            HookOperation::Create,
            BeforeHook::new(|_data| Err("blocked by policy".into())),
        );
        let data = payload(&[]);
        let result = registry.run_before(&model, HookOperation::Create, &data);
        assert!(matches!(result, Err(AdapterError::HookAbort { .. })));
    }

    #[test]
    fn multiple_hooks_run_in_declaration_order() {
        let mut registry = HookRegistry::new();
        let model = ModelName::new("user").unwrap();
        let order: Arc<std::sync::Mutex<Vec<i32>>> = Arc::new(std::sync::Mutex::new(Vec::new()));
        let first = Arc::clone(&order);
        let second = Arc::clone(&order);
        registry.register_before(
            model.clone(),
            HookOperation::Create,
            BeforeHook::new(move |_| {
                first.lock().unwrap().push(1);
                Ok(None)
            }),
        );
        registry.register_before(
            model.clone(),
            HookOperation::Create,
            BeforeHook::new(move |_| {
                second.lock().unwrap().push(2);
                Ok(None)
            }),
        );
        registry.run_before(&model, HookOperation::Create, &payload(&[])).unwrap();
        assert_eq!(*order.lock().unwrap(), vec![1, 2]);
    }

    #[test]
    fn after_hook_observes_final_payload() {
        let mut registry = HookRegistry::new();
        let model = ModelName::new("user").unwrap();
        let seen: Arc<std::sync::Mutex<Option<HookPayload>>> = Arc::new(std::sync::Mutex::new(None));
        let seen_clone = Arc::clone(&seen);
        registry.register_after(
            model.clone(),
            HookOperation::Create,
            AfterHook::new(move |data| {
                *seen_clone.lock().unwrap() = Some(data.clone());
            }),
        );
        let data = payload(&[("email", Value::String("a@b.com".into()))]);
        registry.run_after(&model, HookOperation::Create, &data);
        assert_eq!(seen.lock().unwrap().as_ref(), Some(&data));
    }
}
