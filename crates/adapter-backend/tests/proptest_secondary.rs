use proptest::prelude::*;

use auth_adapter_backend::{active_sessions_key, session_key, ttl_seconds_from_millis};

proptest! {
    /// `sessionKey` is an identity mapping (§6.5): whatever token comes in
    /// is the key that goes out, so a lookup by token always hits its own
    /// cache entry.
    #[test]
    fn session_key_is_the_token_itself(token in "[a-zA-Z0-9_-]{1,40}") {
        prop_assert_eq!(session_key(&token), token);
    }

    /// `activeSessionsKey` always carries the user id verbatim, so two
    /// different users never collide on the same key.
    #[test]
    fn active_sessions_key_embeds_the_user_id(user_id in "[a-zA-Z0-9_-]{1,40}") {
        let key = active_sessions_key(&user_id);
        prop_assert!(key.ends_with(&user_id));
        prop_assert!(key.starts_with("active-sessions-"));
    }

    /// §8.6's floor-rounding TTL rule: never rounds up, never goes negative,
    /// and an exact multiple of 1000ms loses nothing.
    #[test]
    fn ttl_seconds_floors_and_never_goes_negative(millis in any::<i64>()) {
        let seconds = ttl_seconds_from_millis(millis);
        if millis <= 0 {
            prop_assert_eq!(seconds, 0);
        } else {
            prop_assert_eq!(seconds, (millis / 1000) as u64);
            prop_assert!((seconds as i64) * 1000 <= millis);
        }
    }

    #[test]
    fn ttl_seconds_exact_multiple_of_1000_loses_nothing(secs in 0u64..1_000_000u64) {
        let millis = (secs * 1000) as i64;
        prop_assert_eq!(ttl_seconds_from_millis(millis), secs);
    }
}
