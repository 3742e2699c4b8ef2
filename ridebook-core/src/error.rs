use axum::http::StatusCode;
use thiserror::Error;

/// Errors surfaced by every booking operation.
///
/// Each variant carries the human-readable reason shown to the caller.
/// Nothing is written to the store before an operation's commit point,
/// so a `TransientStore` failure can be retried as a whole.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BookingError {
    /// Malformed or out-of-range input (unparseable timestamp, negative duration, ...)
    #[error("validation error: {0}")]
    Validation(String),

    /// Unknown ride or user
    #[error("not found: {0}")]
    NotFound(String),

    /// Illegal state transition, ownership mismatch or scheduling overlap
    #[error("conflict: {0}")]
    Conflict(String),

    /// Persistence unavailable
    #[error("store unavailable: {0}")]
    TransientStore(String),
}

impl BookingError {
    pub fn validation(reason: impl Into<String>) -> Self {
        BookingError::Validation(reason.into())
    }

    pub fn not_found(reason: impl Into<String>) -> Self {
        BookingError::NotFound(reason.into())
    }

    pub fn conflict(reason: impl Into<String>) -> Self {
        BookingError::Conflict(reason.into())
    }

    /// Stable machine-readable name of the error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            BookingError::Validation(_) => "validation_error",
            BookingError::NotFound(_) => "not_found",
            BookingError::Conflict(_) => "conflict",
            BookingError::TransientStore(_) => "transient_store_error",
        }
    }

    /// The reason string without the kind prefix.
    pub fn reason(&self) -> &str {
        match self {
            BookingError::Validation(r)
            | BookingError::NotFound(r)
            | BookingError::Conflict(r)
            | BookingError::TransientStore(r) => r,
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            BookingError::Validation(_) => StatusCode::BAD_REQUEST,
            BookingError::NotFound(_) => StatusCode::NOT_FOUND,
            BookingError::Conflict(_) => StatusCode::CONFLICT,
            BookingError::TransientStore(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    /// Process exit status used by the command-line client.
    pub fn exit_code(&self) -> i32 {
        match self {
            BookingError::Validation(_) => 2,
            BookingError::NotFound(_) => 3,
            BookingError::Conflict(_) => 4,
            BookingError::TransientStore(_) => 5,
        }
    }
}

impl From<sqlx::Error> for BookingError {
    fn from(error: sqlx::Error) -> Self {
        tracing::error!("Store operation failed: {}", error);
        BookingError::TransientStore(error.to_string())
    }
}

impl From<sqlx::migrate::MigrateError> for BookingError {
    fn from(error: sqlx::migrate::MigrateError) -> Self {
        tracing::error!("Migration failed: {}", error);
        BookingError::TransientStore(error.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    #[test]
    fn test_kinds_map_to_distinct_exit_codes() {
        let errors = [
            BookingError::validation("bad"),
            BookingError::not_found("missing"),
            BookingError::conflict("taken"),
            BookingError::TransientStore("down".to_string()),
        ];
        let codes: BTreeSet<i32> = errors.iter().map(|e| e.exit_code()).collect();
        assert_eq!(codes.len(), errors.len());
        assert_eq!(codes, BTreeSet::from([2, 3, 4, 5]));
    }

    #[test]
    fn test_reason_strips_prefix() {
        let error = BookingError::conflict("ride 4 is no longer available");
        assert_eq!(error.reason(), "ride 4 is no longer available");
        assert_eq!(error.to_string(), "conflict: ride 4 is no longer available");
        assert_eq!(error.status_code(), StatusCode::CONFLICT);
    }
}
