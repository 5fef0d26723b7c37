//! Process-wide bearer token cache.
//!
//! - Tokens are keyed by (canonical scope set, credential identity)
//! - A 60 second margin before expiry counts as a miss
//! - Refresh runs under the write lock, so concurrent misses on one key
//!   mint a single token
//! - No credential configured is `Ok(None)`, not an error

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::debug;

use crate::credentials::{Credential, CredentialStore};
use crate::error::AuthResult;
use crate::exchange::TokenExchangeClient;

/// Refresh margin: a token within 60 seconds of expiry is treated as expired.
const EXPIRY_MARGIN_MS: i64 = 60_000;

/// Injectable time source so tests can steer expiry without sleeping.
pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

#[derive(Clone)]
struct CachedToken {
    token: String,
    expires_at_ms: i64,
}

impl CachedToken {
    fn is_fresh(&self, now_ms: i64) -> bool {
        self.expires_at_ms - now_ms > EXPIRY_MARGIN_MS
    }
}

/// Expiry-aware token cache over the credential store and exchange client.
pub struct TokenCache {
    store: CredentialStore,
    exchange: TokenExchangeClient,
    clock: Clock,
    cache: RwLock<HashMap<(String, String), CachedToken>>,
}

impl TokenCache {
    /// Cache with the real wall clock.
    pub fn new(store: CredentialStore, http: reqwest::Client) -> Self {
        Self::with_clock(store, http, Arc::new(Utc::now))
    }

    /// Cache with an injected clock (tests).
    pub fn with_clock(store: CredentialStore, http: reqwest::Client, clock: Clock) -> Self {
        Self {
            store,
            exchange: TokenExchangeClient::new(http),
            clock,
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Canonical cache key for a scope set: sorted, space-joined. Scope order
    /// in the request must never produce a second cache entry.
    pub fn scope_key(scopes: &[&str]) -> String {
        let mut sorted: Vec<&str> = scopes.to_vec();
        sorted.sort_unstable();
        sorted.join(" ")
    }

    /// Drop every cached token.
    pub async fn invalidate(&self) {
        self.cache.write().await.clear();
    }

    /// Get a bearer token for the scope set, minting one if needed.
    ///
    /// `Ok(None)` when no credential is configured; `Err` only for failures
    /// of a configured credential (endpoint rejection, network, signing).
    pub async fn get_token(&self, scopes: &[&str]) -> AuthResult<Option<String>> {
        let Some(credential) = self.store.credential() else {
            return Ok(None);
        };

        let key = (
            Self::scope_key(scopes),
            credential.identity_key().to_string(),
        );

        // Fast path: shared lock.
        {
            let now_ms = (self.clock)().timestamp_millis();
            let cache = self.cache.read().await;
            if let Some(cached) = cache.get(&key) {
                if cached.is_fresh(now_ms) {
                    return Ok(Some(cached.token.clone()));
                }
            }
        }

        // Slow path: exclusive lock with a double-check, then exchange while
        // the lock is held (single-flight per cache).
        let mut cache = self.cache.write().await;
        let now = (self.clock)();
        if let Some(cached) = cache.get(&key) {
            if cached.is_fresh(now.timestamp_millis()) {
                return Ok(Some(cached.token.clone()));
            }
        }

        let minted = match credential {
            Credential::ServiceAccount(account) => {
                self.exchange
                    .exchange_service_account(account, &key.0, now)
                    .await?
            }
            Credential::AuthorizedUser(account) => {
                self.exchange
                    .exchange_authorized_user(account, &key.0)
                    .await?
            }
        };

        debug!(scope_key = %key.0, expires_in = minted.expires_in, "minted access token");

        let token = minted.access_token;
        cache.insert(
            key,
            CachedToken {
                token: token.clone(),
                expires_at_ms: now.timestamp_millis() + minted.expires_in * 1000,
            },
        );

        Ok(Some(token))
    }
}
