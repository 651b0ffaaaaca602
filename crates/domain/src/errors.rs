//! Error types used throughout the engine

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::SourceId;

/// Main error type for Schej
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "message")]
pub enum SchejError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias for Schej operations
pub type Result<T> = std::result::Result<T, SchejError>;

// ============================================================================
// Per-source failures
// ============================================================================

/// Failure returned by a provider when fetching or pushing events for one
/// calendar source.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "message")]
pub enum FetchError {
    /// Credentials rejected; recoverable by a single token refresh.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Rate limited: {0}")]
    RateLimited(String),

    #[error("Unreachable: {0}")]
    Unreachable(String),

    /// Provider returned data the normalizer cannot parse.
    #[error("Malformed provider data: {0}")]
    Malformed(String),
}

impl FetchError {
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Unauthorized(_))
    }
}

/// Failure returned by a token refresher.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "message")]
pub enum RefreshError {
    /// The provider refused the refresh token; the account stays unavailable
    /// for the rest of the current call.
    #[error("Refresh denied: {0}")]
    RefreshDenied(String),

    #[error("Token endpoint unreachable: {0}")]
    Unreachable(String),
}

/// Categories of source failures, used for reporting and retry hints
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureCategory {
    Unauthorized,
    RefreshDenied,
    RateLimited,
    Unreachable,
    Malformed,
}

/// Anything that can take a single source out of an aggregation call.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "error")]
pub enum SourceFailure {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Refresh(#[from] RefreshError),
}

impl SourceFailure {
    /// Get the failure category
    pub fn category(&self) -> FailureCategory {
        match self {
            Self::Fetch(FetchError::Unauthorized(_)) => FailureCategory::Unauthorized,
            Self::Fetch(FetchError::RateLimited(_)) => FailureCategory::RateLimited,
            Self::Fetch(FetchError::Unreachable(_)) | Self::Refresh(RefreshError::Unreachable(_)) => {
                FailureCategory::Unreachable
            }
            Self::Fetch(FetchError::Malformed(_)) => FailureCategory::Malformed,
            Self::Refresh(RefreshError::RefreshDenied(_)) => FailureCategory::RefreshDenied,
        }
    }

    /// Whether a later call by the caller could succeed without user action
    pub fn should_retry(&self) -> bool {
        matches!(self.category(), FailureCategory::RateLimited | FailureCategory::Unreachable)
    }
}

/// Error recorded for one source during an aggregation call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceError {
    pub source: SourceId,
    pub failure: SourceFailure,
}

impl SourceError {
    pub fn new(source: SourceId, failure: impl Into<SourceFailure>) -> Self {
        Self { source, failure: failure.into() }
    }

    pub fn category(&self) -> FailureCategory {
        self.failure.category()
    }
}

// ============================================================================
// Finalization
// ============================================================================

/// Errors returned when finalizing a poll into a calendar entry.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FinalizeError {
    #[error("poll {poll_id} is already finalized")]
    AlreadyFinalized { poll_id: String },

    /// The calendar entry was not created. `slot_recorded` tells the caller
    /// whether the chosen slot was still stored on the poll.
    #[error("calendar push failed for poll {poll_id} (slot recorded: {slot_recorded}): {reason}")]
    PushFailed { poll_id: String, reason: String, slot_recorded: bool },

    #[error(transparent)]
    Rejected(#[from] SchejError),
}

impl From<FinalizeError> for SchejError {
    fn from(err: FinalizeError) -> Self {
        match err {
            FinalizeError::AlreadyFinalized { .. } => Self::Conflict(err.to_string()),
            FinalizeError::PushFailed { .. } => Self::Network(err.to_string()),
            FinalizeError::Rejected(inner) => inner,
        }
    }
}
