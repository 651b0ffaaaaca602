//! Command execution helpers
//!
//! Provides utilities to reduce boilerplate when implementing commands with
//! timing and logging.

use std::future::Future;
use std::time::Instant;

use schej_domain::{FinalizeError, SchejError};
use tracing::debug;

use crate::utils::logging::{error_label, finalize_error_label, log_command_execution};

/// Errors commands can return, reduced to a stable label for logs
pub trait CommandError {
    fn label(&self) -> &'static str;
}

impl CommandError for SchejError {
    fn label(&self) -> &'static str {
        error_label(self)
    }
}

impl CommandError for FinalizeError {
    fn label(&self) -> &'static str {
        finalize_error_label(self)
    }
}

/// Execute a command with automatic timing and logging
///
/// # Example
///
/// ```rust,ignore
/// pub async fn my_command(ctx: &AppContext, id: &str) -> Result<MyResponse> {
///     execute_command("my_module::my_command", || async {
///         ctx.some_service.do_something(id).await
///     })
///     .await
/// }
/// ```
pub async fn execute_command<F, Fut, T, E>(command_name: &str, command_fn: F) -> Result<T, E>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: CommandError,
{
    let start = Instant::now();

    let result = command_fn().await;

    let elapsed = start.elapsed();
    if let Err(err) = &result {
        debug!(command = command_name, error_type = err.label(), "command returned error");
    }
    log_command_execution(command_name, elapsed, result.is_ok());

    result
}
