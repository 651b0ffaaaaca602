//! Configuration loader
//!
//! Loads application configuration from environment variables or files.
//!
//! ## Loading Strategy
//! 1. Reads a `.env` file into the process environment when one exists
//! 2. Attempts to load from `SCHEJ_*` environment variables
//! 3. If a required variable is missing, falls back to a config file
//! 4. Supports JSON and TOML formats
//!
//! ## Environment Variables
//! Required:
//! - `SCHEJ_DB_PATH`: Database file path
//! - `SCHEJ_DB_POOL_SIZE`: Connection pool size
//! - `SCHEJ_GOOGLE_CLIENT_ID`: Web OAuth client id
//! - `SCHEJ_GOOGLE_CLIENT_SECRET`: Web OAuth client secret
//!
//! Optional:
//! - `SCHEJ_GOOGLE_IOS_CLIENT_ID`, `SCHEJ_GOOGLE_ANDROID_CLIENT_ID`
//! - `SCHEJ_GOOGLE_TOKEN_URL`, `SCHEJ_GOOGLE_API_BASE_URL`
//! - `SCHEJ_AGGREGATION_TIMEOUT_MS`, `SCHEJ_MAX_CONCURRENT_FETCHES`
//! - `SCHEJ_TOKEN_REFRESH_MARGIN_SECS`
//! - `SCHEJ_HTTP_TIMEOUT_SECS`, `SCHEJ_HTTP_MAX_ATTEMPTS`
//! - `SCHEJ_LOG_LEVEL`, `SCHEJ_LOG_JSON` (true/false)
//!
//! ## File Locations
//! The loader probes `config.{json,toml}` and `schej.{json,toml}` in the
//! current directory, its two parents, and next to the executable.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use schej_domain::{
    AggregationConfig, Config, DatabaseConfig, GoogleConfig, HttpConfig, LoggingConfig, Result,
    SchejError,
};

const CONFIG_FILE_NAMES: [&str; 4] = ["config.json", "config.toml", "schej.json", "schej.toml"];

/// Load configuration with automatic fallback strategy
///
/// # Errors
/// Returns `SchejError::Config` if neither source yields a valid config.
pub fn load() -> Result<Config> {
    if let Ok(path) = dotenvy::dotenv() {
        tracing::debug!(path = %path.display(), "Loaded .env file");
    }

    let config = match load_from_env() {
        Ok(config) => {
            tracing::info!("Configuration loaded from environment variables");
            config
        }
        Err(e) => {
            tracing::debug!(error = ?e, "Failed to load from environment, trying file");
            load_from_file(None)?
        }
    };

    validate(&config)?;
    Ok(config)
}

/// Load configuration from environment variables
///
/// Optional variables fall back to the defaults of their config section.
///
/// # Errors
/// Returns `SchejError::Config` if required variables are missing or any
/// variable has an invalid value.
pub fn load_from_env() -> Result<Config> {
    let database = DatabaseConfig {
        path: env_var("SCHEJ_DB_PATH")?,
        pool_size: env_parse("SCHEJ_DB_POOL_SIZE")?,
    };

    let google_defaults = GoogleConfig::default();
    let google = GoogleConfig {
        client_id: env_var("SCHEJ_GOOGLE_CLIENT_ID")?,
        client_secret: env_var("SCHEJ_GOOGLE_CLIENT_SECRET")?,
        ios_client_id: env_opt("SCHEJ_GOOGLE_IOS_CLIENT_ID"),
        android_client_id: env_opt("SCHEJ_GOOGLE_ANDROID_CLIENT_ID"),
        token_url: env_opt("SCHEJ_GOOGLE_TOKEN_URL").unwrap_or(google_defaults.token_url),
        api_base_url: env_opt("SCHEJ_GOOGLE_API_BASE_URL")
            .unwrap_or(google_defaults.api_base_url),
    };

    let aggregation_defaults = AggregationConfig::default();
    let aggregation = AggregationConfig {
        timeout_ms: env_parse_or("SCHEJ_AGGREGATION_TIMEOUT_MS", aggregation_defaults.timeout_ms)?,
        max_concurrent_fetches: env_parse_or(
            "SCHEJ_MAX_CONCURRENT_FETCHES",
            aggregation_defaults.max_concurrent_fetches,
        )?,
        refresh_margin_secs: env_parse_or(
            "SCHEJ_TOKEN_REFRESH_MARGIN_SECS",
            aggregation_defaults.refresh_margin_secs,
        )?,
    };

    let http_defaults = HttpConfig::default();
    let http = HttpConfig {
        timeout_secs: env_parse_or("SCHEJ_HTTP_TIMEOUT_SECS", http_defaults.timeout_secs)?,
        max_attempts: env_parse_or("SCHEJ_HTTP_MAX_ATTEMPTS", http_defaults.max_attempts)?,
    };

    let logging_defaults = LoggingConfig::default();
    let logging = LoggingConfig {
        level: env_opt("SCHEJ_LOG_LEVEL").unwrap_or(logging_defaults.level),
        json: env_bool("SCHEJ_LOG_JSON", logging_defaults.json),
    };

    Ok(Config { database, google, aggregation, http, logging })
}

/// Load configuration from a file
///
/// If `path` is `None`, probes the standard locations. Format is picked by
/// file extension.
///
/// # Errors
/// Returns `SchejError::Config` if the file is missing, unreadable or invalid.
pub fn load_from_file(path: Option<PathBuf>) -> Result<Config> {
    let config_path = match path {
        Some(p) => {
            if !p.exists() {
                return Err(SchejError::Config(format!("Config file not found: {}", p.display())));
            }
            p
        }
        None => probe_config_paths().ok_or_else(|| {
            SchejError::Config("No config file found in any of the standard locations".to_string())
        })?,
    };

    tracing::info!(path = %config_path.display(), "Loading configuration from file");

    let contents = std::fs::read_to_string(&config_path)
        .map_err(|e| SchejError::Config(format!("Failed to read config file: {e}")))?;

    parse_config(&contents, &config_path)
}

/// Reject settings the engine cannot run with.
///
/// # Errors
/// Returns `SchejError::Config` naming the first offending field.
pub fn validate(config: &Config) -> Result<()> {
    if config.database.path.trim().is_empty() {
        return Err(SchejError::Config("database.path must not be empty".into()));
    }
    if config.database.pool_size == 0 {
        return Err(SchejError::Config("database.pool_size must be at least 1".into()));
    }
    if config.aggregation.max_concurrent_fetches == 0 {
        return Err(SchejError::Config(
            "aggregation.max_concurrent_fetches must be at least 1".into(),
        ));
    }
    if config.aggregation.timeout_ms == 0 {
        return Err(SchejError::Config("aggregation.timeout_ms must be positive".into()));
    }
    if config.aggregation.refresh_margin_secs < 0 {
        return Err(SchejError::Config("aggregation.refresh_margin_secs must not be negative".into()));
    }
    if config.http.max_attempts == 0 {
        return Err(SchejError::Config("http.max_attempts must be at least 1".into()));
    }
    Ok(())
}

fn parse_config(contents: &str, path: &Path) -> Result<Config> {
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("json");

    match extension {
        "toml" => toml::from_str(contents)
            .map_err(|e| SchejError::Config(format!("Invalid TOML format: {e}"))),
        "json" => serde_json::from_str(contents)
            .map_err(|e| SchejError::Config(format!("Invalid JSON format: {e}"))),
        _ => Err(SchejError::Config(format!("Unsupported config format: {extension}"))),
    }
}

/// Probe the standard locations for a configuration file
///
/// Returns the first file found, or `None`.
pub fn probe_config_paths() -> Option<PathBuf> {
    let mut roots = Vec::new();

    if let Ok(cwd) = std::env::current_dir() {
        roots.extend([cwd.clone(), cwd.join(".."), cwd.join("../..")]);
    }

    if let Ok(exe_path) = std::env::current_exe() {
        if let Some(exe_dir) = exe_path.parent() {
            roots.extend([exe_dir.to_path_buf(), exe_dir.join(".."), exe_dir.join("../..")]);
        }
    }

    roots
        .iter()
        .flat_map(|root| CONFIG_FILE_NAMES.iter().map(move |name| root.join(name)))
        .find(|path| path.exists())
}

fn env_var(key: &str) -> Result<String> {
    std::env::var(key)
        .map_err(|_| SchejError::Config(format!("Missing required environment variable: {key}")))
}

fn env_opt(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn env_parse<T>(key: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let raw = env_var(key)?;
    raw.trim().parse::<T>().map_err(|e| SchejError::Config(format!("Invalid value for {key}: {e}")))
}

fn env_parse_or<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env_opt(key) {
        Some(_) => env_parse(key),
        None => Ok(default),
    }
}

/// Parse boolean from environment variable
///
/// Accepts: `1`/`0`, `true`/`false`, `yes`/`no`, `on`/`off` (case-insensitive)
fn env_bool(key: &str, default: bool) -> bool {
    std::env::var(key)
        .ok()
        .map(|s| matches!(s.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use std::io::Write;
    use std::sync::Mutex;

    use once_cell::sync::Lazy;
    use tempfile::NamedTempFile;

    use super::*;

    static ENV_LOCK: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));

    const REQUIRED: [(&str, &str); 4] = [
        ("SCHEJ_DB_PATH", "/tmp/schej-test.db"),
        ("SCHEJ_DB_POOL_SIZE", "5"),
        ("SCHEJ_GOOGLE_CLIENT_ID", "web-client"),
        ("SCHEJ_GOOGLE_CLIENT_SECRET", "web-secret"),
    ];

    const OPTIONAL: [&str; 11] = [
        "SCHEJ_GOOGLE_IOS_CLIENT_ID",
        "SCHEJ_GOOGLE_ANDROID_CLIENT_ID",
        "SCHEJ_GOOGLE_TOKEN_URL",
        "SCHEJ_GOOGLE_API_BASE_URL",
        "SCHEJ_AGGREGATION_TIMEOUT_MS",
        "SCHEJ_MAX_CONCURRENT_FETCHES",
        "SCHEJ_TOKEN_REFRESH_MARGIN_SECS",
        "SCHEJ_HTTP_TIMEOUT_SECS",
        "SCHEJ_HTTP_MAX_ATTEMPTS",
        "SCHEJ_LOG_LEVEL",
        "SCHEJ_LOG_JSON",
    ];

    fn set_required() {
        for (key, value) in REQUIRED {
            std::env::set_var(key, value);
        }
    }

    fn clear_all() {
        for (key, _) in REQUIRED {
            std::env::remove_var(key);
        }
        for key in OPTIONAL {
            std::env::remove_var(key);
        }
    }

    fn write_temp(contents: &str, extension: &str) -> PathBuf {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(contents.as_bytes()).unwrap();
        let path = temp_file.path().with_extension(extension);
        std::fs::copy(temp_file.path(), &path).unwrap();
        path
    }

    #[test]
    fn test_env_bool_parsing() {
        let _guard = ENV_LOCK.lock().expect("env mutex poisoned");

        for value in ["1", "true", "YES", "on"] {
            std::env::set_var("SCHEJ_TEST_BOOL", value);
            assert!(env_bool("SCHEJ_TEST_BOOL", false), "{value} should be true");
        }
        for value in ["0", "false", "no", "off"] {
            std::env::set_var("SCHEJ_TEST_BOOL", value);
            assert!(!env_bool("SCHEJ_TEST_BOOL", true), "{value} should be false");
        }

        std::env::remove_var("SCHEJ_TEST_BOOL");
        assert!(env_bool("SCHEJ_TEST_BOOL", true));
        assert!(!env_bool("SCHEJ_TEST_BOOL", false));
    }

    #[test]
    fn test_load_from_env_required_only_uses_defaults() {
        let _guard = ENV_LOCK.lock().expect("env mutex poisoned");
        clear_all();
        set_required();

        let config = load_from_env().expect("config from env");
        assert_eq!(config.database.path, "/tmp/schej-test.db");
        assert_eq!(config.database.pool_size, 5);
        assert_eq!(config.google.client_id, "web-client");
        assert_eq!(config.google.client_secret, "web-secret");
        assert_eq!(config.google.ios_client_id, None);
        assert_eq!(config.google.token_url, GoogleConfig::default().token_url);
        assert_eq!(config.aggregation, AggregationConfig::default());
        assert_eq!(config.http, HttpConfig::default());
        assert!(!config.logging.json);

        clear_all();
    }

    #[test]
    fn test_load_from_env_optional_overrides() {
        let _guard = ENV_LOCK.lock().expect("env mutex poisoned");
        clear_all();
        set_required();
        std::env::set_var("SCHEJ_GOOGLE_IOS_CLIENT_ID", "ios-client");
        std::env::set_var("SCHEJ_GOOGLE_TOKEN_URL", "http://127.0.0.1:9/token");
        std::env::set_var("SCHEJ_AGGREGATION_TIMEOUT_MS", "2500");
        std::env::set_var("SCHEJ_MAX_CONCURRENT_FETCHES", "3");
        std::env::set_var("SCHEJ_HTTP_MAX_ATTEMPTS", "1");
        std::env::set_var("SCHEJ_LOG_LEVEL", "debug");
        std::env::set_var("SCHEJ_LOG_JSON", "true");

        let config = load_from_env().expect("config from env");
        assert_eq!(config.google.ios_client_id.as_deref(), Some("ios-client"));
        assert_eq!(config.google.token_url, "http://127.0.0.1:9/token");
        assert_eq!(config.aggregation.timeout_ms, 2500);
        assert_eq!(config.aggregation.max_concurrent_fetches, 3);
        assert_eq!(config.http.max_attempts, 1);
        assert_eq!(config.logging.level, "debug");
        assert!(config.logging.json);

        clear_all();
    }

    #[test]
    fn test_load_from_env_missing_var() {
        let _guard = ENV_LOCK.lock().expect("env mutex poisoned");
        clear_all();
        std::env::set_var("SCHEJ_DB_PATH", "/tmp/schej-test.db");

        let err = load_from_env().unwrap_err();
        assert!(matches!(err, SchejError::Config(msg) if msg.contains("SCHEJ_DB_POOL_SIZE")));

        clear_all();
    }

    #[test]
    fn test_load_from_env_invalid_number() {
        let _guard = ENV_LOCK.lock().expect("env mutex poisoned");
        clear_all();
        set_required();
        std::env::set_var("SCHEJ_MAX_CONCURRENT_FETCHES", "many");

        let err = load_from_env().unwrap_err();
        assert!(
            matches!(err, SchejError::Config(msg) if msg.contains("SCHEJ_MAX_CONCURRENT_FETCHES"))
        );

        clear_all();
    }

    #[test]
    fn test_load_from_file_json() {
        let path = write_temp(
            r#"{
                "database": { "path": "test.db", "pool_size": 4 },
                "google": { "client_id": "id", "client_secret": "secret" },
                "aggregation": { "timeout_ms": 1000 }
            }"#,
            "json",
        );

        let config = load_from_file(Some(path.clone())).expect("json config");
        assert_eq!(config.database.pool_size, 4);
        assert_eq!(config.aggregation.timeout_ms, 1000);
        assert_eq!(config.aggregation.max_concurrent_fetches, 8);

        std::fs::remove_file(path).ok();
    }

    #[test]
    fn test_load_from_file_toml() {
        let path = write_temp(
            r#"
[database]
path = "test.db"
pool_size = 6

[google]
client_id = "id"
client_secret = "secret"
android_client_id = "android"

[logging]
level = "warn"
json = true
"#,
            "toml",
        );

        let config = load_from_file(Some(path.clone())).expect("toml config");
        assert_eq!(config.database.pool_size, 6);
        assert_eq!(config.google.android_client_id.as_deref(), Some("android"));
        assert_eq!(config.logging.level, "warn");
        assert!(config.logging.json);

        std::fs::remove_file(path).ok();
    }

    #[test]
    fn test_load_from_file_not_found() {
        let err = load_from_file(Some(PathBuf::from("/nonexistent/config.json"))).unwrap_err();
        assert!(matches!(err, SchejError::Config(_)));
    }

    #[test]
    fn test_load_from_file_invalid_json() {
        let path = write_temp(r#"{ "this is": "not valid json" "#, "json");
        assert!(load_from_file(Some(path.clone())).is_err());
        std::fs::remove_file(path).ok();
    }

    #[test]
    fn test_parse_config_unsupported_format() {
        let result = parse_config("some content", &PathBuf::from("test.yaml"));
        assert!(matches!(result, Err(SchejError::Config(msg)) if msg.contains("yaml")));
    }

    #[test]
    fn test_validate_rejects_zero_concurrency() {
        let mut config = Config::default();
        assert!(validate(&config).is_ok());

        config.aggregation.max_concurrent_fetches = 0;
        assert!(matches!(validate(&config), Err(SchejError::Config(_))));

        let mut config = Config::default();
        config.http.max_attempts = 0;
        assert!(validate(&config).is_err());
    }
}
