//! Configuration management

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_AGGREGATION_TIMEOUT_MS, DEFAULT_DATABASE_PATH, DEFAULT_DATABASE_POOL_SIZE,
    DEFAULT_HTTP_MAX_ATTEMPTS, DEFAULT_HTTP_TIMEOUT_SECS, DEFAULT_MAX_CONCURRENT_FETCHES,
    DEFAULT_TOKEN_REFRESH_MARGIN_SECS, GOOGLE_CALENDAR_API_BASE, GOOGLE_TOKEN_URL,
};

/// Application configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    pub database: DatabaseConfig,
    pub google: GoogleConfig,
    #[serde(default)]
    pub aggregation: AggregationConfig,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Database configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub path: String,
    pub pool_size: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self { path: DEFAULT_DATABASE_PATH.to_string(), pool_size: DEFAULT_DATABASE_POOL_SIZE }
    }
}

/// Google OAuth client and endpoint configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GoogleConfig {
    pub client_id: String,
    #[serde(skip_serializing, default)]
    pub client_secret: String,
    /// Client id used for tokens minted by the iOS app (no secret)
    #[serde(default)]
    pub ios_client_id: Option<String>,
    /// Client id used for tokens minted by the Android app (no secret)
    #[serde(default)]
    pub android_client_id: Option<String>,
    #[serde(default = "default_token_url")]
    pub token_url: String,
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
}

impl Default for GoogleConfig {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            client_secret: String::new(),
            ios_client_id: None,
            android_client_id: None,
            token_url: default_token_url(),
            api_base_url: default_api_base_url(),
        }
    }
}

fn default_token_url() -> String {
    GOOGLE_TOKEN_URL.to_string()
}

fn default_api_base_url() -> String {
    GOOGLE_CALENDAR_API_BASE.to_string()
}

/// Fan-out limits for a single aggregation call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AggregationConfig {
    /// Deadline for the whole aggregation call
    pub timeout_ms: u64,
    pub max_concurrent_fetches: usize,
    /// Tokens expiring within this margin are refreshed before use
    pub refresh_margin_secs: i64,
}

impl AggregationConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for AggregationConfig {
    fn default() -> Self {
        Self {
            timeout_ms: DEFAULT_AGGREGATION_TIMEOUT_MS,
            max_concurrent_fetches: DEFAULT_MAX_CONCURRENT_FETCHES,
            refresh_margin_secs: DEFAULT_TOKEN_REFRESH_MARGIN_SECS,
        }
    }
}

/// Outbound HTTP settings shared by provider adapters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub timeout_secs: u64,
    pub max_attempts: usize,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self { timeout_secs: DEFAULT_HTTP_TIMEOUT_SECS, max_attempts: DEFAULT_HTTP_MAX_ATTEMPTS }
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive when `RUST_LOG` is unset
    pub level: String,
    /// Emit JSON lines instead of human-readable output
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info".to_string(), json: false }
    }
}
