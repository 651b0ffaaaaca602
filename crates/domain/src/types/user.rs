//! User and calendar account types
//!
//! A user links any number of calendar accounts. Accounts keep the order in
//! which they were linked, and so do their sub-calendars; aggregation relies on
//! that order for deterministic tie-breaking.

use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::interval::UtcOffset;
use super::toggle::Toggle;
use crate::impl_wire_name_conversions;

/// Provider family behind an account
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    Google,
    #[serde(rename = "caldav")]
    CalDav,
}

impl_wire_name_conversions!(ProviderKind {
    Google => "google",
    CalDav => "caldav",
});

/// Client that minted the user's Google tokens; decides which OAuth client
/// id is used for refreshes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenOrigin {
    Web,
    Ios,
    Android,
}

impl_wire_name_conversions!(TokenOrigin {
    Web => "web",
    Ios => "ios",
    Android => "android",
});

/// Registered user as read from persistence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: String,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub picture: Option<String>,
    #[serde(default)]
    pub utc_offset: UtcOffset,
    #[serde(default)]
    pub token_origin: Option<TokenOrigin>,
    #[serde(default)]
    pub calendar_accounts: Vec<CalendarAccount>,
}

impl User {
    pub fn new(id: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            email: email.into(),
            first_name: None,
            last_name: None,
            picture: None,
            utc_offset: UtcOffset::UTC,
            token_origin: None,
            calendar_accounts: Vec::new(),
        }
    }

    pub fn account(&self, email: &str) -> Option<&CalendarAccount> {
        self.calendar_accounts.iter().find(|a| a.email == email)
    }

    pub fn account_mut(&mut self, email: &str) -> Option<&mut CalendarAccount> {
        self.calendar_accounts.iter_mut().find(|a| a.email == email)
    }

    /// Insert or replace an account, keeping the original link position on
    /// replacement.
    pub fn upsert_account(&mut self, account: CalendarAccount) {
        match self.account_mut(&account.email) {
            Some(existing) => *existing = account,
            None => self.calendar_accounts.push(account),
        }
    }

    /// Account used for pushing finalized events: the one matching the login
    /// email, otherwise the first linked account.
    pub fn primary_account(&self) -> Option<&CalendarAccount> {
        self.account(&self.email).or_else(|| self.calendar_accounts.first())
    }

    pub fn display_name(&self) -> String {
        match (&self.first_name, &self.last_name) {
            (Some(first), Some(last)) => format!("{first} {last}"),
            (Some(first), None) => first.clone(),
            (None, Some(last)) => last.clone(),
            (None, None) => self.email.clone(),
        }
    }
}

/// One linked calendar account
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalendarAccount {
    pub email: String,
    #[serde(default)]
    pub picture: Option<String>,
    /// Account-level master switch; only `On` lets any sub-calendar through.
    #[serde(default)]
    pub enabled: Toggle,
    /// `None` means "query the primary calendar only".
    #[serde(default)]
    pub sub_calendars: Option<Vec<SubCalendar>>,
    pub credentials: AccountCredentials,
}

impl CalendarAccount {
    pub fn new(email: impl Into<String>, credentials: AccountCredentials) -> Self {
        Self {
            email: email.into(),
            picture: None,
            enabled: Toggle::On,
            sub_calendars: None,
            credentials,
        }
    }

    pub fn provider(&self) -> ProviderKind {
        self.credentials.provider()
    }

    pub fn with_sub_calendar(mut self, sub_calendar: SubCalendar) -> Self {
        self.sub_calendars.get_or_insert_with(Vec::new).push(sub_calendar);
        self
    }
}

/// Named calendar inside an account that can be toggled independently
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubCalendar {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub enabled: Toggle,
}

impl SubCalendar {
    pub fn new(id: impl Into<String>, name: impl Into<String>, enabled: Toggle) -> Self {
        Self { id: id.into(), name: name.into(), enabled }
    }
}

/// Opaque connection parameters for one account
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum AccountCredentials {
    /// Token-based API access (Google)
    #[serde(rename = "oauth")]
    OAuth(OAuthTokens),
    /// Credential-based access (CalDAV, e.g. iCloud app-specific passwords)
    #[serde(rename = "basic")]
    Basic(BasicCredentials),
}

impl AccountCredentials {
    pub fn provider(&self) -> ProviderKind {
        match self {
            Self::OAuth(_) => ProviderKind::Google,
            Self::Basic(_) => ProviderKind::CalDav,
        }
    }

    pub fn oauth(&self) -> Option<&OAuthTokens> {
        match self {
            Self::OAuth(tokens) => Some(tokens),
            Self::Basic(_) => None,
        }
    }
}

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OAuthTokens {
    pub access_token: String,
    pub access_token_expires_at: DateTime<Utc>,
    pub refresh_token: String,
}

impl OAuthTokens {
    /// True when the access token expires within `margin` of `now`.
    pub fn expires_within(&self, now: DateTime<Utc>, margin: Duration) -> bool {
        self.access_token_expires_at <= now + margin
    }
}

impl fmt::Debug for OAuthTokens {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OAuthTokens")
            .field("access_token_expires_at", &self.access_token_expires_at)
            .finish_non_exhaustive()
    }
}

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BasicCredentials {
    /// CalDAV server root, e.g. `https://caldav.icloud.com`
    pub server_url: String,
    pub username: String,
    pub password: String,
    /// Skip date-only events at the provider. Off unless explicitly requested.
    #[serde(default)]
    pub timed_only: bool,
}

impl fmt::Debug for BasicCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BasicCredentials")
            .field("server_url", &self.server_url)
            .field("username", &self.username)
            .field("timed_only", &self.timed_only)
            .finish_non_exhaustive()
    }
}
