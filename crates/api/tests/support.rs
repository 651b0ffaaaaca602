#![allow(dead_code)]

use chrono::{DateTime, TimeZone, Utc};
use schej_api::AppContext;
use schej_domain::{
    AccountCredentials, BasicCredentials, CalendarAccount, Config, DatabaseConfig, GoogleConfig,
    HttpConfig, OAuthTokens, User,
};
use tempfile::TempDir;

/// Context wired against a temporary database and a mock provider server.
pub struct TestApp {
    pub ctx: AppContext,
    _temp_dir: TempDir,
}

pub fn test_config(temp_dir: &TempDir, mock_base: &str) -> Config {
    Config {
        database: DatabaseConfig {
            path: temp_dir.path().join("schej.db").to_string_lossy().to_string(),
            pool_size: 4,
        },
        google: GoogleConfig {
            client_id: "web-client".to_string(),
            client_secret: "web-secret".to_string(),
            token_url: format!("{mock_base}/token"),
            api_base_url: mock_base.to_string(),
            ..GoogleConfig::default()
        },
        http: HttpConfig { timeout_secs: 5, max_attempts: 1 },
        ..Config::default()
    }
}

pub async fn setup_test_app(mock_base: &str) -> TestApp {
    let temp_dir = TempDir::new().expect("failed to create temporary directory");
    let config = test_config(&temp_dir, mock_base);
    let ctx = AppContext::new_with_config(config).await.expect("context should build");
    TestApp { ctx, _temp_dir: temp_dir }
}

pub fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, h, min, 0).single().expect("timestamp should be valid")
}

pub fn google_account(email: &str, access: &str, refresh: &str, expires_at: DateTime<Utc>) -> CalendarAccount {
    CalendarAccount::new(
        email,
        AccountCredentials::OAuth(OAuthTokens {
            access_token: access.to_string(),
            access_token_expires_at: expires_at,
            refresh_token: refresh.to_string(),
        }),
    )
}

pub fn caldav_account(email: &str, server_url: &str) -> CalendarAccount {
    CalendarAccount::new(
        email,
        AccountCredentials::Basic(BasicCredentials {
            server_url: server_url.to_string(),
            username: email.to_string(),
            password: "app-specific".to_string(),
            timed_only: false,
        }),
    )
}

pub fn user_with(id: &str, email: &str, accounts: Vec<CalendarAccount>) -> User {
    let mut user = User::new(id, email);
    user.first_name = Some(id.to_string());
    for account in accounts {
        user.upsert_account(account);
    }
    user
}
