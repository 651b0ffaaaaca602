//! Mapping of provider HTTP outcomes onto per-source failures

use reqwest::{Response, StatusCode};
use schej_domain::{FetchError, SchejError};
use serde::Deserialize;

const MAX_BODY_IN_ERROR: usize = 200;

/// 403 reasons Google uses for throttling rather than for denied access
const RATE_LIMIT_REASONS: &[&str] = &["rateLimitExceeded", "userRateLimitExceeded", "quotaExceeded"];

/// Classify a non-success status.
pub fn fetch_error_for_status(status: StatusCode, body: &str) -> FetchError {
    let message = format!("HTTP {}: {}", status.as_u16(), truncate(body));
    match status.as_u16() {
        403 if is_rate_limit_body(body) => FetchError::RateLimited(message),
        401 | 403 => FetchError::Unauthorized(message),
        429 => FetchError::RateLimited(message),
        500..=599 => FetchError::Unreachable(message),
        _ => FetchError::Malformed(message),
    }
}

/// Classify an error raised by the shared HTTP client before any status was
/// received.
pub fn fetch_error_for_transport(err: SchejError) -> FetchError {
    match err {
        SchejError::Auth(msg) => FetchError::Unauthorized(msg),
        other => FetchError::Unreachable(other.to_string()),
    }
}

/// Pass through success responses; turn everything else into a [`FetchError`].
pub async fn ensure_success(response: Response) -> Result<Response, FetchError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(fetch_error_for_status(status, &body))
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    errors: Vec<ErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    #[serde(default)]
    reason: String,
}

fn is_rate_limit_body(body: &str) -> bool {
    serde_json::from_str::<ErrorEnvelope>(body).is_ok_and(|envelope| {
        envelope.error.errors.iter().any(|detail| RATE_LIMIT_REASONS.contains(&detail.reason.as_str()))
    })
}

fn truncate(body: &str) -> &str {
    let body = body.trim();
    match body.char_indices().nth(MAX_BODY_IN_ERROR) {
        Some((idx, _)) => &body[..idx],
        None => body,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statuses_map_to_fetch_errors() {
        assert!(matches!(
            fetch_error_for_status(StatusCode::UNAUTHORIZED, ""),
            FetchError::Unauthorized(_)
        ));
        assert!(matches!(
            fetch_error_for_status(StatusCode::FORBIDDEN, ""),
            FetchError::Unauthorized(_)
        ));
        assert!(matches!(
            fetch_error_for_status(StatusCode::TOO_MANY_REQUESTS, ""),
            FetchError::RateLimited(_)
        ));
        assert!(matches!(
            fetch_error_for_status(StatusCode::SERVICE_UNAVAILABLE, ""),
            FetchError::Unreachable(_)
        ));
        assert!(matches!(
            fetch_error_for_status(StatusCode::NOT_FOUND, ""),
            FetchError::Malformed(_)
        ));
    }

    #[test]
    fn throttling_403_is_rate_limited() {
        for reason in ["rateLimitExceeded", "userRateLimitExceeded", "quotaExceeded"] {
            let body = format!(
                r#"{{"error":{{"code":403,"message":"Rate Limit Exceeded","errors":[{{"domain":"usageLimits","reason":"{reason}","message":"Rate Limit Exceeded"}}]}}}}"#
            );
            assert!(matches!(
                fetch_error_for_status(StatusCode::FORBIDDEN, &body),
                FetchError::RateLimited(_)
            ));
        }

        let denied = r#"{"error":{"code":403,"message":"Forbidden","errors":[{"domain":"global","reason":"forbidden"}]}}"#;
        assert!(matches!(
            fetch_error_for_status(StatusCode::FORBIDDEN, denied),
            FetchError::Unauthorized(_)
        ));
    }

    #[test]
    fn long_bodies_are_truncated() {
        let body = "x".repeat(1000);
        match fetch_error_for_status(StatusCode::BAD_REQUEST, &body) {
            FetchError::Malformed(msg) => assert!(msg.len() < 250),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn transport_errors_are_unreachable() {
        let err = fetch_error_for_transport(SchejError::Network("connection refused".into()));
        assert!(matches!(err, FetchError::Unreachable(msg) if msg.contains("refused")));
    }
}
