//! Application-wide error types.

use thiserror::Error;

/// Result type alias using `AppError`.
pub type AppResult<T> = Result<T, AppError>;

/// Application error types.
#[derive(Debug, Error)]
pub enum AppError {
    /// Malformed input, nothing was mutated.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Missing, invalid or stale credential or signature.
    #[error("Authentication failed: {0}")]
    Unauthorized(String),

    /// Caller role is not in the allow-list.
    #[error("Access denied: {0}")]
    Forbidden(String),

    /// Unknown payment, refund or booking.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid state transition or already-refunded payment.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Payment processor unreachable or returned a non-success response.
    #[error("Upstream error: {0}")]
    Upstream(String),

    /// Database error.
    #[error("Database error: {0}")]
    Database(String),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Returns the HTTP status code for this error.
    #[must_use]
    pub const fn status_code(&self) -> u16 {
        match self {
            Self::Validation(_) => 400,
            Self::Unauthorized(_) => 401,
            Self::Forbidden(_) => 403,
            Self::NotFound(_) => 404,
            Self::Conflict(_) => 409,
            Self::Upstream(_) => 502,
            Self::Database(_) | Self::Internal(_) => 500,
        }
    }

    /// Returns the error code for API responses.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::Unauthorized(_) => "UNAUTHORIZED",
            Self::Forbidden(_) => "FORBIDDEN",
            Self::NotFound(_) => "NOT_FOUND",
            Self::Conflict(_) => "CONFLICT",
            Self::Upstream(_) => "GATEWAY_ERROR",
            Self::Database(_) => "DATABASE_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Whether the caller may retry the same request later.
    ///
    /// Gateway and storage failures are transient; conflicts such as
    /// "already refunded" are terminal.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Upstream(_) | Self::Database(_))
    }
}
