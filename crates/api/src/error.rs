//! Error rendering.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use clinipay_core::ledger::LedgerError;
use clinipay_core::payment::ReconcileError;
use clinipay_core::refund::RefundError;
use clinipay_core::store::StoreError;
use clinipay_core::webhook::WebhookError;
use clinipay_shared::AppError;
use serde::Serialize;
use tracing::error;

/// An error response: `{ error, details?, retryable }`.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    code: &'static str,
    details: Option<String>,
    retryable: bool,
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
    retryable: bool,
}

impl ApiError {
    fn with_code(err: AppError, code: &'static str) -> Self {
        let status =
            StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let retryable = err.is_retryable();
        let details = match err {
            AppError::Database(_) => None,
            AppError::Validation(msg)
            | AppError::Unauthorized(msg)
            | AppError::Forbidden(msg)
            | AppError::NotFound(msg)
            | AppError::Conflict(msg)
            | AppError::Upstream(msg)
            | AppError::Internal(msg) => Some(msg),
        };
        Self {
            status,
            code,
            details,
            retryable,
        }
    }

    /// A reconciliation failure the processor should redeliver.
    ///
    /// Always 500, whatever the underlying cause.
    #[must_use]
    pub fn redeliver(err: &ReconcileError) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            code: err.error_code(),
            details: Some(err.to_string()),
            retryable: true,
        }
    }

    /// Rejects a request with a specific status.
    #[must_use]
    pub fn new(status: StatusCode, code: &'static str, details: impl Into<String>) -> Self {
        Self {
            status,
            code,
            details: Some(details.into()),
            retryable: false,
        }
    }

    /// HTTP status of the response.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        self.status
    }
}

impl From<AppError> for ApiError {
    fn from(err: AppError) -> Self {
        let code = err.error_code();
        Self::with_code(err, code)
    }
}

impl From<RefundError> for ApiError {
    fn from(err: RefundError) -> Self {
        let code = err.error_code();
        Self::with_code(err.into(), code)
    }
}

impl From<ReconcileError> for ApiError {
    fn from(err: ReconcileError) -> Self {
        let code = err.error_code();
        Self::with_code(err.into(), code)
    }
}

impl From<LedgerError> for ApiError {
    fn from(err: LedgerError) -> Self {
        let code = err.error_code();
        Self::with_code(err.into(), code)
    }
}

impl From<WebhookError> for ApiError {
    fn from(err: WebhookError) -> Self {
        AppError::from(err).into()
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        AppError::from(err).into()
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            error!(
                status = self.status.as_u16(),
                code = self.code,
                details = self.details.as_deref().unwrap_or_default(),
                "Request failed"
            );
        }

        let body = ErrorBody {
            error: self.code.to_ascii_lowercase(),
            details: self.details,
            retryable: self.retryable,
        };
        (self.status, Json(body)).into_response()
    }
}
