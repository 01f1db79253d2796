//! Secondary storage (C9): the optional key-value cache used for session
//! and active-session-list caching (§4.7, §6.5). An interface of three
//! methods, not a class hierarchy; its absence (the Internal Adapter holds
//! `Option<S>`) short-circuits caching without null checks scattered
//! through call sites.

use std::convert::Infallible;
use std::future::Future;

/// A key-value store with per-key TTL. `get`/`set`/`delete` mirror §4.9
/// exactly; serialization of the cached payload is the caller's job (the
/// Internal Adapter stores JSON-encoded session/active-session-list
/// values, see §6.5).
pub trait SecondaryStorage: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    fn get(&self, key: &str) -> impl Future<Output = Result<Option<String>, Self::Error>> + Send;

    fn set(&self, key: &str, value: &str, ttl_seconds: Option<u64>) -> impl Future<Output = Result<(), Self::Error>> + Send;

    fn delete(&self, key: &str) -> impl Future<Output = Result<(), Self::Error>> + Send;
}

/// A `SecondaryStorage` that caches nothing. Used as the default type
/// parameter so an `InternalAdapter` configured with `secondary: None` has
/// a concrete, zero-cost type rather than a boxed trait object.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopSecondaryStorage;

impl SecondaryStorage for NoopSecondaryStorage {
    type Error = Infallible;

    async fn get(&self, _key: &str) -> Result<Option<String>, Self::Error> {
        Ok(None)
    }

    async fn set(&self, _key: &str, _value: &str, _ttl_seconds: Option<u64>) -> Result<(), Self::Error> {
        Ok(())
    }

    async fn delete(&self, _key: &str) -> Result<(), Self::Error> {
        Ok(())
    }
}

/// The secondary-storage key for a session token payload (§6.5).
pub fn session_key(token: &str) -> String {
    token.to_string()
}

/// The secondary-storage key for a user's active-session list (§6.5).
pub fn active_sessions_key(user_id: &str) -> String {
    format!("active-sessions-{user_id}")
}

/// Rounds a millisecond duration down to whole seconds for a TTL, per the
/// scenario in §8.6 (`floor(3_599_500 / 1000) = 3599`). Saturates at zero
/// for already-expired durations.
pub fn ttl_seconds_from_millis(millis: i64) -> u64 {
    (millis.max(0) / 1000) as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_key_is_the_bare_token() {
        assert_eq!(session_key("tok_abc"), "tok_abc");
    }

    #[test]
    fn active_sessions_key_is_namespaced_by_user() {
        assert_eq!(active_sessions_key("u1"), "active-sessions-u1");
    }

    #[test]
    fn ttl_rounds_down_to_whole_seconds() {
        assert_eq!(ttl_seconds_from_millis(3_599_500), 3599);
    }

    #[test]
    fn ttl_saturates_at_zero_for_expired_durations() {
        assert_eq!(ttl_seconds_from_millis(-500), 0);
    }

    #[tokio::test]
    async fn noop_storage_never_returns_a_value() {
        let storage = NoopSecondaryStorage;
        storage.set("k", "v", Some(60)).await.unwrap();
        assert_eq!(storage.get("k").await.unwrap(), None);
        storage.delete("k").await.unwrap();
    }
}
