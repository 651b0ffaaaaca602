use std::time::Duration;

use schej_domain::{FinalizeError, LoggingConfig, SchejError};
use tracing::{info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Install the global tracing subscriber.
///
/// `RUST_LOG` wins over `config.level`. Calling this more than once is a
/// no-op; returns whether this call installed the subscriber.
pub fn init_tracing(config: &LoggingConfig) -> bool {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let registry = tracing_subscriber::registry().with(filter);
    let result = if config.json {
        registry.with(fmt::layer().json().with_current_span(false)).try_init()
    } else {
        registry.with(fmt::layer().with_target(true)).try_init()
    };

    result.is_ok()
}

/// Log the outcome of a command execution with structured fields.
///
/// `command` is a stable identifier such as `"polls::create_poll"`; it must not
/// carry user data.
#[inline]
pub fn log_command_execution(command: &str, elapsed: Duration, success: bool) {
    let duration_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX);

    if success {
        info!(command, duration_ms, "command_execution_success");
    } else {
        warn!(command, duration_ms, "command_execution_failure");
    }
}

/// Convert a `SchejError` into a stable label suitable for logging.
#[inline]
pub fn error_label(error: &SchejError) -> &'static str {
    match error {
        SchejError::Database(_) => "database",
        SchejError::Config(_) => "config",
        SchejError::Network(_) => "network",
        SchejError::Auth(_) => "auth",
        SchejError::NotFound(_) => "not_found",
        SchejError::InvalidInput(_) => "invalid_input",
        SchejError::Conflict(_) => "conflict",
        SchejError::Internal(_) => "internal",
    }
}

#[inline]
pub fn finalize_error_label(error: &FinalizeError) -> &'static str {
    match error {
        FinalizeError::AlreadyFinalized { .. } => "already_finalized",
        FinalizeError::PushFailed { .. } => "push_failed",
        FinalizeError::Rejected(inner) => error_label(inner),
    }
}
