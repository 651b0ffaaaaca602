//! Application constants
//!
//! Centralized location for domain-level defaults used by config, core services
//! and provider adapters.

// Aggregation defaults
pub const DEFAULT_AGGREGATION_TIMEOUT_MS: u64 = 5_000;
pub const DEFAULT_MAX_CONCURRENT_FETCHES: usize = 8;
pub const DEFAULT_TOKEN_REFRESH_MARGIN_SECS: i64 = 60;

// Calendar identifiers
pub const PRIMARY_CALENDAR_ID: &str = "primary";

// Google endpoints
pub const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
pub const GOOGLE_CALENDAR_API_BASE: &str = "https://www.googleapis.com/calendar/v3";

// Database defaults
pub const DEFAULT_DATABASE_PATH: &str = "schej.db";
pub const DEFAULT_DATABASE_POOL_SIZE: u32 = 8;

// HTTP defaults
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 15;
pub const DEFAULT_HTTP_MAX_ATTEMPTS: usize = 2;

pub const MINUTES_PER_DAY: i64 = 24 * 60;
