//! OAuth token freshness
//!
//! [`TokenGuard`] hands out credentials that are valid for at least the
//! configured margin, refreshing them through the [`TokenRefresher`] port and
//! persisting the result. Refreshes are serialized per account, so concurrent
//! fetches against one expired account trigger a single refresh.

use std::future::Future;
use std::sync::Arc;

use chrono::{Duration, Utc};
use dashmap::{DashMap, DashSet};
use schej_domain::{AccountCredentials, FetchError, OAuthTokens, RefreshError, SourceFailure};
use tracing::{debug, info, warn};

use super::ports::{CalendarSource, TokenRefresher};
use crate::user::ports::UserRepository;
use crate::utils::KeyedLocks;

/// Refresh bookkeeping for one aggregation or push call.
///
/// Once an account's refresh is denied, every other source of that account
/// fails fast for the remainder of the call. Accounts whose refreshed tokens
/// could not be written back are recorded for the caller.
#[derive(Debug, Default)]
pub struct RefreshScope {
    denied: DashSet<String>,
    unpersisted: DashSet<String>,
}

impl RefreshScope {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_denied(&self, account_key: &str) -> bool {
        self.denied.contains(account_key)
    }

    fn deny(&self, account_key: String) {
        self.denied.insert(account_key);
    }

    /// Account emails whose refreshed tokens are held in memory only, sorted.
    pub fn unpersisted_accounts(&self) -> Vec<String> {
        let mut accounts: Vec<String> = self.unpersisted.iter().map(|a| a.key().clone()).collect();
        accounts.sort();
        accounts
    }

    fn note_unpersisted(&self, account: &str) {
        self.unpersisted.insert(account.to_string());
    }
}

pub struct TokenGuard {
    refresher: Arc<dyn TokenRefresher>,
    users: Arc<dyn UserRepository>,
    locks: KeyedLocks,
    /// Most recent tokens this process obtained, per account key
    latest: DashMap<String, OAuthTokens>,
    margin: Duration,
}

impl TokenGuard {
    pub fn new(
        refresher: Arc<dyn TokenRefresher>,
        users: Arc<dyn UserRepository>,
        margin: Duration,
    ) -> Self {
        Self { refresher, users, locks: KeyedLocks::new(), latest: DashMap::new(), margin }
    }

    /// Credentials for `source` that will not expire within the margin.
    ///
    /// Non-OAuth credentials pass through untouched.
    pub async fn ensure_fresh(
        &self,
        source: &CalendarSource,
        scope: &RefreshScope,
    ) -> Result<AccountCredentials, RefreshError> {
        let AccountCredentials::OAuth(stored) = &source.credentials else {
            return Ok(source.credentials.clone());
        };

        let tokens = self.newest(&source.account_key(), stored);
        if !tokens.expires_within(Utc::now(), self.margin) {
            return Ok(AccountCredentials::OAuth(tokens));
        }

        debug!(account = %source.id.account, "access token near expiry");
        self.refresh(source, &tokens, scope).await.map(AccountCredentials::OAuth)
    }

    /// Refresh after the provider rejected `rejected`.
    pub async fn refresh_rejected(
        &self,
        source: &CalendarSource,
        rejected: &OAuthTokens,
        scope: &RefreshScope,
    ) -> Result<OAuthTokens, RefreshError> {
        self.refresh(source, rejected, scope).await
    }

    /// Run `op` with fresh credentials. An `Unauthorized` outcome triggers one
    /// refresh and one retry; a second rejection is returned as is.
    pub async fn call_authorized<T, F, Fut>(
        &self,
        source: &CalendarSource,
        scope: &RefreshScope,
        op: F,
    ) -> Result<T, SourceFailure>
    where
        F: Fn(CalendarSource) -> Fut,
        Fut: Future<Output = Result<T, FetchError>>,
    {
        let credentials = self.ensure_fresh(source, scope).await?;
        let authorized = source.with_credentials(credentials);

        match op(authorized.clone()).await {
            Err(FetchError::Unauthorized(reason)) => {
                let Some(rejected) = authorized.credentials.oauth() else {
                    return Err(FetchError::Unauthorized(reason).into());
                };
                debug!(source = %source.id, %reason, "credentials rejected, refreshing once");

                let refreshed = self.refresh_rejected(&authorized, rejected, scope).await?;
                let retry = authorized.with_credentials(AccountCredentials::OAuth(refreshed));
                op(retry).await.map_err(SourceFailure::from)
            }
            outcome => outcome.map_err(SourceFailure::from),
        }
    }

    fn newest(&self, account_key: &str, stored: &OAuthTokens) -> OAuthTokens {
        match self.latest.get(account_key) {
            Some(cached) if cached.value().access_token_expires_at > stored.access_token_expires_at => {
                cached.value().clone()
            }
            _ => stored.clone(),
        }
    }

    async fn refresh(
        &self,
        source: &CalendarSource,
        stale: &OAuthTokens,
        scope: &RefreshScope,
    ) -> Result<OAuthTokens, RefreshError> {
        let key = source.account_key();
        let _guard = self.locks.lock(&key).await;

        if scope.is_denied(&key) {
            return Err(RefreshError::RefreshDenied(format!(
                "refresh for {} was already denied",
                source.id.account
            )));
        }

        // Another fetch may have refreshed while we waited for the lock.
        let cached = self.latest.get(&key).map(|entry| entry.value().clone());
        if let Some(cached) = cached {
            if cached.access_token != stale.access_token
                && !cached.expires_within(Utc::now(), self.margin)
            {
                debug!(account = %source.id.account, "reusing concurrently refreshed token");
                return Ok(cached);
            }
        }

        match self.refresher.refresh(stale, source.token_origin).await {
            Ok(tokens) => {
                if let Err(err) = self
                    .users
                    .update_account_tokens(&source.user_id, &source.id.account, &tokens)
                    .await
                {
                    warn!(account = %source.id.account, error = %err, "failed to persist refreshed tokens");
                    scope.note_unpersisted(&source.id.account);
                }
                self.latest.insert(key, tokens.clone());
                info!(
                    account = %source.id.account,
                    expires_at = %tokens.access_token_expires_at,
                    "access token refreshed"
                );
                Ok(tokens)
            }
            Err(err) => {
                if matches!(err, RefreshError::RefreshDenied(_)) {
                    scope.deny(key);
                }
                warn!(account = %source.id.account, error = %err, "token refresh failed");
                Err(err)
            }
        }
    }
}
