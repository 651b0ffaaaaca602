#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use schej_core::CalendarSource;
use schej_domain::{
    AccountCredentials, BasicCredentials, CalendarAccount, OAuthTokens, User, UtcOffset,
};
use schej_infra::database::DbManager;
use schej_infra::http::HttpClient;
use tempfile::TempDir;

/// Temporary database wrapper that keeps the underlying file alive for the
/// duration of a test run.
pub struct TestDatabase {
    pub manager: Arc<DbManager>,
    _temp_dir: TempDir,
}

impl TestDatabase {
    /// Create a migrated database in a fresh temporary directory.
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("temp dir should be created");
        let db_path = temp_dir.path().join("schej-test.db");

        let manager = DbManager::new(&db_path, 4).expect("db manager should be created");
        manager.run_migrations().expect("schema migrations should apply");

        Self { manager: Arc::new(manager), _temp_dir: temp_dir }
    }
}

impl Default for TestDatabase {
    fn default() -> Self {
        Self::new()
    }
}

/// HTTP client with short backoff so retry paths stay fast.
pub fn fast_http_client() -> HttpClient {
    HttpClient::builder()
        .timeout(Duration::from_secs(5))
        .max_attempts(2)
        .base_backoff(Duration::from_millis(1))
        .build()
        .expect("http client should build")
}

pub fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, h, min, 0).single().expect("timestamp should be valid")
}

pub fn google_tokens(access: &str) -> OAuthTokens {
    OAuthTokens {
        access_token: access.to_string(),
        access_token_expires_at: at(2030, 1, 1, 0, 0),
        refresh_token: "refresh-token".to_string(),
    }
}

pub fn caldav_credentials(server_url: &str) -> BasicCredentials {
    BasicCredentials {
        server_url: server_url.to_string(),
        username: "me@icloud.com".to_string(),
        password: "app-specific".to_string(),
        timed_only: false,
    }
}

/// User with one Google account (matching the login email) and one CalDAV
/// account.
pub fn sample_user(caldav_server: &str) -> User {
    let mut user = User::new("user-1", "me@gmail.com");
    user.utc_offset = UtcOffset::from_minutes(-240).expect("offset should be valid");
    user.upsert_account(CalendarAccount::new(
        "me@gmail.com",
        AccountCredentials::OAuth(google_tokens("access-1")),
    ));
    user.upsert_account(CalendarAccount::new(
        "me@icloud.com",
        AccountCredentials::Basic(caldav_credentials(caldav_server)),
    ));
    user
}

pub fn source_for(user: &User, account_email: &str, calendar_id: &str) -> CalendarSource {
    let account = user.account(account_email).expect("account should exist");
    CalendarSource::new(user, account, calendar_id)
}
