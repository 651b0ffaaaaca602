//! Calendar provider port interfaces
//!
//! Providers speak to one external calendar service each. They receive a
//! [`CalendarSource`] carrying credentials that are already fresh and return
//! normalized [`Interval`]s.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use schej_domain::{
    AccountCredentials, CalendarAccount, FetchError, Interval, OAuthTokens, ProviderKind,
    RefreshError, Slot, SourceId, TimeWindow, TokenOrigin, User, UtcOffset,
};

/// One calendar to query, with everything a provider needs to reach it.
#[derive(Debug, Clone, PartialEq)]
pub struct CalendarSource {
    pub id: SourceId,
    pub user_id: String,
    pub credentials: AccountCredentials,
    /// Owner's offset, used to anchor date-only events
    pub utc_offset: UtcOffset,
    pub token_origin: Option<TokenOrigin>,
}

impl CalendarSource {
    pub fn new(user: &User, account: &CalendarAccount, calendar_id: impl Into<String>) -> Self {
        Self {
            id: SourceId::new(account.email.clone(), calendar_id),
            user_id: user.id.clone(),
            credentials: account.credentials.clone(),
            utc_offset: user.utc_offset,
            token_origin: user.token_origin,
        }
    }

    pub fn provider(&self) -> ProviderKind {
        self.credentials.provider()
    }

    /// Key shared by every source of the same account.
    pub fn account_key(&self) -> String {
        format!("{}:{}", self.user_id, self.id.account)
    }

    pub fn with_credentials(&self, credentials: AccountCredentials) -> Self {
        Self { credentials, ..self.clone() }
    }
}

/// Calendar entry to create for a finalized poll
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventDraft {
    pub title: String,
    pub description: Option<String>,
    pub slot: Slot,
    pub attendees: Vec<String>,
}

/// Trait for calendar provider operations
#[async_trait]
pub trait CalendarProvider: Send + Sync {
    fn kind(&self) -> ProviderKind;

    /// Fetch events overlapping `window` from one calendar
    async fn fetch_events(
        &self,
        source: &CalendarSource,
        window: TimeWindow,
    ) -> Result<Vec<Interval>, FetchError>;

    /// Create an event and return its provider id
    async fn create_event(
        &self,
        source: &CalendarSource,
        draft: &EventDraft,
    ) -> Result<String, FetchError>;

    /// Delete a previously created event
    async fn delete_event(
        &self,
        source: &CalendarSource,
        provider_event_id: &str,
    ) -> Result<(), FetchError>;
}

/// Exchanges a refresh token for a new access token.
#[async_trait]
pub trait TokenRefresher: Send + Sync {
    /// Returns the new token set. Providers that do not rotate refresh tokens
    /// hand back the one they were given.
    async fn refresh(
        &self,
        tokens: &OAuthTokens,
        origin: Option<TokenOrigin>,
    ) -> Result<OAuthTokens, RefreshError>;
}

/// Provider adapters keyed by the kind of account they serve
#[derive(Clone, Default)]
pub struct ProviderSet {
    providers: HashMap<ProviderKind, Arc<dyn CalendarProvider>>,
}

impl ProviderSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, provider: Arc<dyn CalendarProvider>) -> Self {
        self.providers.insert(provider.kind(), provider);
        self
    }

    pub fn get(&self, kind: ProviderKind) -> Option<Arc<dyn CalendarProvider>> {
        self.providers.get(&kind).cloned()
    }

    /// Like [`ProviderSet::get`], as a fetch failure for the source.
    pub fn require(&self, kind: ProviderKind) -> Result<Arc<dyn CalendarProvider>, FetchError> {
        self.get(kind)
            .ok_or_else(|| FetchError::Unreachable(format!("no provider registered for {kind}")))
    }
}

impl fmt::Debug for ProviderSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut kinds: Vec<_> = self.providers.keys().collect();
        kinds.sort();
        f.debug_struct("ProviderSet").field("kinds", &kinds).finish()
    }
}
