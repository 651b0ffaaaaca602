//! Port interfaces for user persistence
//!
//! Users are written by account-linking flows outside this engine; the engine
//! reads them and writes refreshed OAuth tokens back.

use async_trait::async_trait;
use schej_domain::{OAuthTokens, Result, User};

/// Trait for user persistence and retrieval
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Get user by ID
    async fn get_by_id(&self, id: &str) -> Result<Option<User>>;

    /// Insert or replace a user document
    async fn save(&self, user: &User) -> Result<()>;

    /// Replace the stored tokens of one linked account.
    ///
    /// Returns `NotFound` when the user or account does not exist.
    async fn update_account_tokens(
        &self,
        user_id: &str,
        account_email: &str,
        tokens: &OAuthTokens,
    ) -> Result<()>;
}
