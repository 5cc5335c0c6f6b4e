//! Webhook verification errors.

use clinipay_shared::AppError;
use thiserror::Error;

/// Errors raised while authenticating a notification.
#[derive(Debug, Error)]
pub enum WebhookError {
    /// The body is not a supported notification.
    #[error("malformed notification body: {0}")]
    MalformedBody(String),

    /// Signature missing, malformed, invalid or stale.
    ///
    /// Every authentication failure renders the same message.
    #[error("invalid webhook signature")]
    Unauthenticated,
}

impl From<WebhookError> for AppError {
    fn from(err: WebhookError) -> Self {
        match err {
            WebhookError::MalformedBody(msg) => Self::Validation(msg),
            WebhookError::Unauthenticated => Self::Unauthorized(err.to_string()),
        }
    }
}

/// Why a signature was rejected. Logged, never returned to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RejectReason {
    MissingSignature,
    MissingRequestId,
    MalformedSignature,
    Mismatch,
    Stale,
    FromFuture,
}

impl RejectReason {
    pub(crate) const fn as_str(self) -> &'static str {
        match self {
            Self::MissingSignature => "missing_signature",
            Self::MissingRequestId => "missing_request_id",
            Self::MalformedSignature => "malformed_signature",
            Self::Mismatch => "signature_mismatch",
            Self::Stale => "stale_timestamp",
            Self::FromFuture => "future_timestamp",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_maps_to_app_error() {
        let err: AppError = WebhookError::MalformedBody("missing data".into()).into();
        assert_eq!(err.status_code(), 400);

        let err: AppError = WebhookError::Unauthenticated.into();
        assert_eq!(err.status_code(), 401);
        assert_eq!(
            err.to_string(),
            "Authentication failed: invalid webhook signature"
        );
    }
}
