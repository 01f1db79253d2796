//! Internal Adapter (C7): the thin, typed auth-domain layer built on top of
//! the Adapter Factory (§4.7). Every method here compiles down to one or two
//! `AdapterFactory` calls plus, when a secondary store is configured, the
//! session-cache bookkeeping from §6.5.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use auth_adapter_core::types::{FieldName, ModelName, Value};
use auth_adapter_core::where_clause::Predicate;

use crate::driver::Driver;
use crate::error::AdapterError;
use crate::factory::{AdapterFactory, Row};
use crate::join::JoinedField;
use crate::secondary::{active_sessions_key, session_key, ttl_seconds_from_millis, NoopSecondaryStorage, SecondaryStorage};

fn field(name: &str) -> FieldName {
    FieldName::new(name).expect("internal adapter field names are valid identifiers")
}

fn model(name: &str) -> ModelName {
    ModelName::new(name).expect("internal adapter model names are valid identifiers")
}

fn row_date(row: &Row, key: &FieldName) -> Option<DateTime<Utc>> {
    match row.get(key) {
        Some(Value::Date(dt)) => Some(*dt),
        _ => None,
    }
}

fn row_string(row: &Row, key: &FieldName) -> Option<String> {
    row.get(key).and_then(|v| v.as_str().map(str::to_string))
}

/// The cached payload stored under a session token key (§6.5): the session
/// row plus its joined user, so a cache hit never needs a primary read.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct SessionCachePayload {
    session: Row,
    user: Option<Row>,
}

/// One entry in a user's `active-sessions-<userId>` list.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ActiveSessionEntry {
    token: String,
    expires_at: DateTime<Utc>,
}

/// The domain layer over C4: `createUser`, `findUserByEmail`,
/// `createSession`, ..., each a thin wrapper dispatching through the wrapped
/// [`AdapterFactory`], with optional secondary-storage session caching.
pub struct InternalAdapter<D: Driver, S: SecondaryStorage = NoopSecondaryStorage> {
    factory: AdapterFactory<D>,
    secondary: Option<S>,
}

impl<D: Driver, S: SecondaryStorage> InternalAdapter<D, S> {
    pub fn new(factory: AdapterFactory<D>, secondary: Option<S>) -> Self {
        Self { factory, secondary }
    }

    pub fn factory(&self) -> &AdapterFactory<D> {
        &self.factory
    }

    pub fn secondary(&self) -> Option<&S> {
        self.secondary.as_ref()
    }

    pub async fn create_user(&self, data: Row) -> Result<Row, AdapterError> {
        self.factory.create("user", data, None, false).await
    }

    pub async fn find_user_by_email(&self, email: &str) -> Result<Option<Row>, AdapterError> {
        let predicate = Predicate::new(field("email"), Value::String(email.to_string()));
        let found = self.factory.find_one("user", &[predicate], None, &[]).await?;
        Ok(found.map(|j| j.row))
    }

    async fn find_user_by_id(&self, user_id: Value) -> Result<Option<Row>, AdapterError> {
        let predicate = Predicate::new(field("id"), user_id);
        let found = self.factory.find_one("user", &[predicate], None, &[]).await?;
        Ok(found.map(|j| j.row))
    }

    /// `createSession`: writes the session row, then -- if secondary storage
    /// is configured -- caches `{session, user}` under the token key and
    /// refreshes the user's active-sessions list (§6.5).
    pub async fn create_session(&self, data: Row) -> Result<Row, AdapterError> {
        let session = self.factory.create("session", data, None, false).await?;
        self.sync_session_cache(&session).await;
        Ok(session)
    }

    /// `findSession`: a cache hit returns the cached `{session, user}` pair
    /// without touching primary storage; a miss falls through to `findOne`
    /// with the user joined.
    pub async fn find_session(&self, token: &str) -> Result<Option<(Row, Option<Row>)>, AdapterError> {
        if let Some(secondary) = &self.secondary {
            match secondary.get(&session_key(token)).await {
                Ok(Some(cached)) => {
                    if let Ok(payload) = serde_json::from_str::<SessionCachePayload>(&cached) {
                        return Ok(Some((payload.session, payload.user)));
                    }
                }
                Ok(None) => {}
                Err(e) => warn!(error = %e, "secondary storage read failed; falling through to primary"),
            }
        }

        let predicate = Predicate::new(field("token"), Value::String(token.to_string()));
        let joins = [crate::join::JoinSpec::new(model("user"))];
        let found = self.factory.find_one("session", &[predicate], None, &joins).await?;
        let Some(joined) = found else {
            return Ok(None);
        };
        let user = match joined.joins.get(&model("user")) {
            Some(JoinedField::One(user)) => user.clone(),
            _ => None,
        };
        Ok(Some((joined.row, user)))
    }

    /// `updateSession`: applies the patch, then rewrites both the token
    /// payload and the active-sessions entry for that token (§4.7).
    pub async fn update_session(&self, token: &str, patch: Row) -> Result<Option<Row>, AdapterError> {
        let predicate = Predicate::new(field("token"), Value::String(token.to_string()));
        let updated = self.factory.update("session", &[predicate], patch).await?;
        if let Some(session) = &updated {
            self.sync_session_cache(session).await;
        }
        Ok(updated)
    }

    /// `deleteSession`: removes the token key and recomputes the
    /// active-sessions list for that user with the entry spliced out.
    pub async fn delete_session(&self, token: &str) -> Result<(), AdapterError> {
        let predicate = Predicate::new(field("token"), Value::String(token.to_string()));
        let existing = self.factory.find_one("session", &[predicate.clone()], None, &[]).await?;

        self.factory.delete("session", &[predicate]).await?;

        if let (Some(secondary), Some(existing)) = (&self.secondary, &existing) {
            if let Err(e) = secondary.delete(&session_key(token)).await {
                warn!(error = %e, "secondary storage delete failed for session token");
            }
            if let Some(user_id) = existing.row.get(&field("userId")).cloned() {
                self.rewrite_active_sessions(secondary, user_id).await;
            }
        }
        Ok(())
    }

    /// `listSessions`: every session for a user, deduplicated by token.
    pub async fn list_sessions(&self, user_id: Value) -> Result<Vec<Row>, AdapterError> {
        let predicate = Predicate::new(field("userId"), user_id);
        let joined = self.factory.find_many("session", &[predicate], None, None, None, &[]).await?;
        let mut by_token: BTreeMap<String, Row> = BTreeMap::new();
        for j in joined {
            if let Some(token) = row_string(&j.row, &field("token")) {
                by_token.entry(token).or_insert(j.row);
            }
        }
        Ok(by_token.into_values().collect())
    }

    /// `createOAuthUser`: an atomic user + account pair. Runs inside
    /// `transaction()` so a driver with transaction support rolls back the
    /// user on account-creation failure; a driver without support still runs
    /// both creates in sequence (§4.4 `transaction` semantics).
    pub async fn create_oauth_user(&self, user_data: Row, mut account_data: Row) -> Result<(Row, Row), AdapterError> {
        self.factory
            .transaction(|factory| async move {
                let user = factory.create("user", user_data, None, false).await?;
                if let Some(user_id) = user.get(&field("id")).cloned() {
                    account_data.insert(field("userId"), user_id);
                }
                let account = factory.create("account", account_data, None, false).await?;
                Ok((user, account))
            })
            .await
    }

    /// `findVerificationValue`: returns the stored `value` for `identifier`,
    /// opportunistically deleting (and propagating hooks for) an expired
    /// record instead of returning it.
    pub async fn find_verification_value(&self, identifier: &str) -> Result<Option<String>, AdapterError> {
        let predicate = Predicate::new(field("identifier"), Value::String(identifier.to_string()));
        let Some(joined) = self.factory.find_one("verification", &[predicate.clone()], None, &[]).await? else {
            return Ok(None);
        };

        if let Some(expires_at) = row_date(&joined.row, &field("expiresAt")) {
            if expires_at <= Utc::now() {
                self.factory.delete("verification", &[predicate]).await?;
                return Ok(None);
            }
        }

        Ok(row_string(&joined.row, &field("value")))
    }

    pub async fn delete_verification_by_identifier(&self, identifier: &str) -> Result<u64, AdapterError> {
        let predicate = Predicate::new(field("identifier"), Value::String(identifier.to_string()));
        self.factory.delete_many("verification", &[predicate]).await
    }

    pub async fn create_account(&self, data: Row) -> Result<Row, AdapterError> {
        self.factory.create("account", data, None, false).await
    }

    pub async fn find_account(&self, account_id: &str, provider_id: &str) -> Result<Option<Row>, AdapterError> {
        let predicates = [
            Predicate::new(field("accountId"), Value::String(account_id.to_string())),
            Predicate::new(field("providerId"), Value::String(provider_id.to_string())),
        ];
        let found = self.factory.find_one("account", &predicates, None, &[]).await?;
        Ok(found.map(|j| j.row))
    }

    pub async fn delete_accounts(&self, user_id: Value) -> Result<u64, AdapterError> {
        let predicate = Predicate::new(field("userId"), user_id);
        self.factory.delete_many("account", &[predicate]).await
    }

    pub async fn refresh_user_sessions(&self, user_id: Value, new_expires_at: DateTime<Utc>) -> Result<u64, AdapterError> {
        let predicate = Predicate::new(field("userId"), user_id.clone());
        let mut patch = Row::new();
        patch.insert(field("expiresAt"), Value::Date(new_expires_at));
        let count = self.factory.update_many("session", &[predicate], patch).await?;
        if let Some(secondary) = &self.secondary {
            self.rewrite_active_sessions(secondary, user_id).await;
        }
        Ok(count)
    }

    async fn sync_session_cache(&self, session: &Row) {
        let Some(secondary) = &self.secondary else {
            return;
        };
        let Some(token) = row_string(session, &field("token")) else {
            return;
        };
        let user_id = session.get(&field("userId")).cloned();
        let user = match user_id.clone() {
            Some(id) => self.find_user_by_id(id).await.ok().flatten(),
            None => None,
        };

        let ttl = row_date(session, &field("expiresAt")).map(|expires_at| ttl_seconds_from_millis((expires_at - Utc::now()).num_milliseconds()));
        let payload = SessionCachePayload {
            session: session.clone(),
            user,
        };
        match serde_json::to_string(&payload) {
            Ok(encoded) => {
                if let Err(e) = secondary.set(&session_key(&token), &encoded, ttl).await {
                    warn!(error = %e, "secondary storage write failed for session token");
                }
            }
            Err(e) => warn!(error = %e, "failed to encode session cache payload"),
        }

        if let Some(user_id) = user_id {
            self.rewrite_active_sessions(secondary, user_id).await;
        }
    }

    /// Recomputes a user's `active-sessions-<userId>` list from primary
    /// storage: simpler and less error-prone than splicing a cached list in
    /// place, at the cost of one extra `findMany` per session write.
    async fn rewrite_active_sessions(&self, secondary: &S, user_id: Value) {
        let predicate = Predicate::new(field("userId"), user_id.clone());
        let sessions = match self.factory.find_many("session", &[predicate], None, None, None, &[]).await {
            Ok(rows) => rows,
            Err(e) => {
                warn!(error = %e, "failed to list sessions while rewriting active-sessions cache");
                return;
            }
        };

        let mut by_token: BTreeMap<String, DateTime<Utc>> = BTreeMap::new();
        for joined in &sessions {
            if let (Some(token), Some(expires_at)) = (row_string(&joined.row, &field("token")), row_date(&joined.row, &field("expiresAt"))) {
                by_token.insert(token, expires_at);
            }
        }

        let key = match &user_id {
            Value::String(s) => active_sessions_key(s),
            other => active_sessions_key(&other.to_string()),
        };

        if by_token.is_empty() {
            if let Err(e) = secondary.delete(&key).await {
                warn!(error = %e, "failed to delete empty active-sessions cache entry");
            }
            return;
        }

        let latest = by_token.values().max().copied().unwrap_or_else(Utc::now);
        let entries: Vec<ActiveSessionEntry> = by_token.into_iter().map(|(token, expires_at)| ActiveSessionEntry { token, expires_at }).collect();
        let ttl = ttl_seconds_from_millis((latest - Utc::now()).num_milliseconds());
        match serde_json::to_string(&entries) {
            Ok(encoded) => {
                if let Err(e) = secondary.set(&key, &encoded, Some(ttl)).await {
                    warn!(error = %e, "failed to write active-sessions cache entry");
                }
            }
            Err(e) => warn!(error = %e, "failed to encode active-sessions cache entry"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn row_date_reads_only_date_values() {
        let mut row = Row::new();
        row.insert(field("expiresAt"), Value::String("not a date".into()));
        assert_eq!(row_date(&row, &field("expiresAt")), None);

        let now = Utc::now();
        let mut row2 = Row::new();
        row2.insert(field("expiresAt"), Value::Date(now));
        assert_eq!(row_date(&row2, &field("expiresAt")), Some(now));
    }

    #[test]
    fn session_cache_payload_round_trips_through_json() {
        let mut session = Row::new();
        session.insert(field("token"), Value::String("tok".into()));
        let payload = SessionCachePayload { session: session.clone(), user: None };
        let encoded = serde_json::to_string(&payload).unwrap();
        let decoded: SessionCachePayload = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded.session, session);
        assert_eq!(decoded.user, None);
    }

    #[test]
    fn active_session_entry_round_trips_through_json() {
        let entry = ActiveSessionEntry {
            token: "tok".into(),
            expires_at: Utc::now(),
        };
        let encoded = serde_json::to_string(&entry).unwrap();
        let decoded: ActiveSessionEntry = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded.token, entry.token);
        assert_eq!(decoded.expires_at, entry.expires_at);
    }
}
