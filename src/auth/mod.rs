//! OAuth token lifecycle for streaming service calls.
//!
//! [`TokenRefresher`] hands out access tokens for (user, service) pairs,
//! refreshing proactively when a token is within the expiry skew window.
//! Refreshes are single-flight per credential, and failures degrade to the
//! stored token rather than aborting the caller - the service call itself
//! will surface auth errors if the stale token really is dead.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::Utc;
use sqlx::SqlitePool;

use crate::db;
use crate::error::{Error, Result};
use crate::model::{Credential, ServiceKind};
use crate::services::ClientRegistry;

/// Refresh this many seconds before actual expiry to absorb clock skew and
/// request latency.
pub const DEFAULT_TOKEN_SKEW_SECS: i64 = 60;

/// Coordinates access token reads and refreshes against the credential store.
pub struct TokenRefresher {
    pool: SqlitePool,
    registry: ClientRegistry,
    skew_secs: i64,
    /// One async mutex per credential so concurrent callers share a single
    /// refresh request instead of racing the provider.
    locks: Mutex<HashMap<(i64, ServiceKind), Arc<tokio::sync::Mutex<()>>>>,
}

impl TokenRefresher {
    pub fn new(pool: SqlitePool, registry: ClientRegistry) -> Self {
        Self::with_skew(pool, registry, DEFAULT_TOKEN_SKEW_SECS)
    }

    pub fn with_skew(pool: SqlitePool, registry: ClientRegistry, skew_secs: i64) -> Self {
        Self {
            pool,
            registry,
            skew_secs,
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// Get a usable access token for this (user, service) pair.
    ///
    /// Fast path returns the stored token when it is comfortably inside its
    /// lifetime. Otherwise one caller refreshes while the rest wait, then
    /// everyone reads the persisted result.
    ///
    /// # Errors
    ///
    /// [`Error::AuthMissing`] if no credential is stored at all. Refresh
    /// failures do NOT error; the stale token is returned with a warning.
    pub async fn access_token(&self, user_id: i64, service: ServiceKind) -> Result<String> {
        let cred = self.load_credential(user_id, service).await?;
        let now = Utc::now().timestamp();
        if self.is_fresh(&cred, now) {
            return Ok(cred.access_token);
        }

        let lock = self.lock_for(user_id, service);
        let _guard = lock.lock().await;

        // Whoever held the lock before us may have already refreshed.
        let cred = self.load_credential(user_id, service).await?;
        let now = Utc::now().timestamp();
        if self.is_fresh(&cred, now) {
            return Ok(cred.access_token);
        }

        self.refresh(cred, now).await
    }

    async fn load_credential(&self, user_id: i64, service: ServiceKind) -> Result<Credential> {
        db::get_credential(&self.pool, user_id, service)
            .await?
            .ok_or(Error::AuthMissing { user_id, service })
    }

    /// A token with no recorded expiry is trusted until a service rejects it.
    fn is_fresh(&self, cred: &Credential, now: i64) -> bool {
        match cred.expires_at {
            None => true,
            Some(expires_at) => now + self.skew_secs < expires_at,
        }
    }

    fn lock_for(&self, user_id: i64, service: ServiceKind) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.locks.lock().expect("token lock map poisoned");
        locks
            .entry((user_id, service))
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone()
    }

    async fn refresh(&self, cred: Credential, now: i64) -> Result<String> {
        let Some(refresh_token) = cred.refresh_token.clone() else {
            tracing::warn!(
                user_id = cred.user_id,
                service = %cred.service,
                "Token expired but no refresh token stored; using it anyway"
            );
            return Ok(cred.access_token);
        };

        let client = match self.registry.get(cred.service) {
            Ok(client) => client,
            Err(err) => {
                tracing::warn!(
                    user_id = cred.user_id,
                    service = %cred.service,
                    error = %err,
                    "No client to refresh with; using stored token"
                );
                return Ok(cred.access_token);
            }
        };

        match client.refresh_token(&refresh_token).await {
            Ok(grant) => {
                // Providers that don't rotate refresh tokens omit them from
                // the grant; keep the one we have.
                let retained = grant.refresh_token.clone().or(cred.refresh_token);
                db::update_credential_tokens(
                    &self.pool,
                    cred.user_id,
                    cred.service,
                    &grant.access_token,
                    retained.as_deref(),
                    Some(now + grant.expires_in),
                )
                .await?;
                tracing::info!(
                    user_id = cred.user_id,
                    service = %cred.service,
                    expires_in = grant.expires_in,
                    "Refreshed access token"
                );
                Ok(grant.access_token)
            }
            Err(err) => {
                tracing::warn!(
                    user_id = cred.user_id,
                    service = %cred.service,
                    error = %err,
                    "Token refresh failed; degrading to stored token"
                );
                Ok(cred.access_token)
            }
        }
    }
}
