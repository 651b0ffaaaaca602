//! Conversions from external infrastructure errors into domain errors.

use reqwest::Error as HttpError;
use rusqlite::Error as SqlError;
use schej_domain::SchejError;

/// Error newtype that keeps conversions on the infrastructure side and can be
/// converted back into the domain error.
#[derive(Debug)]
pub struct InfraError(pub SchejError);

impl From<InfraError> for SchejError {
    fn from(value: InfraError) -> Self {
        value.0
    }
}

impl From<SchejError> for InfraError {
    fn from(value: SchejError) -> Self {
        InfraError(value)
    }
}

/// Extension trait to make the conversion logic explicit in tests and within
/// this module.
trait IntoSchejError {
    fn into_schej(self) -> SchejError;
}

/* -------------------------------------------------------------------------- */
/* rusqlite::Error → SchejError */
/* -------------------------------------------------------------------------- */

impl IntoSchejError for SqlError {
    fn into_schej(self) -> SchejError {
        use rusqlite::ffi::ErrorCode;
        use rusqlite::Error as RE;

        match self {
            RE::SqliteFailure(err, maybe_message) => {
                let message = maybe_message.unwrap_or_default();
                match (err.code, err.extended_code) {
                    (ErrorCode::DatabaseBusy, _) => SchejError::Database("database is busy".into()),
                    (ErrorCode::DatabaseLocked, _) => {
                        SchejError::Database("database is locked".into())
                    }
                    (ErrorCode::ConstraintViolation, 1555 | 2067) => {
                        SchejError::Conflict(format!("unique constraint violation: {message}"))
                    }
                    (ErrorCode::ConstraintViolation, 787) => {
                        SchejError::Database("foreign key constraint violation".into())
                    }
                    _ => SchejError::Database(format!(
                        "sqlite failure {:?} (code {}): {}",
                        err.code, err.extended_code, message
                    )),
                }
            }
            RE::QueryReturnedNoRows => SchejError::NotFound("no rows returned by query".into()),
            RE::FromSqlConversionFailure(_, _, cause) => {
                SchejError::Database(format!("failed to convert sqlite value: {cause}"))
            }
            RE::InvalidColumnType(_, _, ty) => {
                SchejError::Database(format!("invalid column type: {ty}"))
            }
            RE::InvalidPath(path) => SchejError::Database(format!(
                "invalid database path: {}",
                path.to_string_lossy()
            )),
            other => SchejError::Database(other.to_string()),
        }
    }
}

impl From<SqlError> for InfraError {
    fn from(value: SqlError) -> Self {
        InfraError(value.into_schej())
    }
}

/* -------------------------------------------------------------------------- */
/* r2d2::Error → SchejError */
/* -------------------------------------------------------------------------- */

impl IntoSchejError for r2d2::Error {
    fn into_schej(self) -> SchejError {
        SchejError::Database(format!("connection pool unavailable: {self}"))
    }
}

impl From<r2d2::Error> for InfraError {
    fn from(value: r2d2::Error) -> Self {
        InfraError(value.into_schej())
    }
}

/* -------------------------------------------------------------------------- */
/* serde_json::Error → SchejError */
/* -------------------------------------------------------------------------- */

impl IntoSchejError for serde_json::Error {
    fn into_schej(self) -> SchejError {
        SchejError::Database(format!("stored document is not valid JSON: {self}"))
    }
}

impl From<serde_json::Error> for InfraError {
    fn from(value: serde_json::Error) -> Self {
        InfraError(value.into_schej())
    }
}

/* -------------------------------------------------------------------------- */
/* reqwest::Error → SchejError */
/* -------------------------------------------------------------------------- */

impl IntoSchejError for HttpError {
    fn into_schej(self) -> SchejError {
        if self.is_timeout() {
            return SchejError::Network("HTTP request timed out".into());
        }

        if self.is_connect() {
            return SchejError::Network("HTTP connection failure".into());
        }

        if let Some(status) = self.status() {
            let code = status.as_u16();
            let message =
                format!("HTTP {} {}", code, status.canonical_reason().unwrap_or("unknown status"));

            return match code {
                401 | 403 => SchejError::Auth(message),
                404 => SchejError::NotFound(message),
                400..=499 => SchejError::InvalidInput(message),
                _ => SchejError::Network(message),
            };
        }

        SchejError::Network(self.to_string())
    }
}

impl From<HttpError> for InfraError {
    fn from(value: HttpError) -> Self {
        InfraError(value.into_schej())
    }
}

/* -------------------------------------------------------------------------- */
/* Tests */
/* -------------------------------------------------------------------------- */
