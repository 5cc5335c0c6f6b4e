//! Refund errors.

use clinipay_shared::AppError;
use clinipay_shared::types::{PaymentId, RefundId};
use thiserror::Error;

use crate::payment::PaymentStatus;
use crate::processor::ProcessorError;
use crate::storage::StorageError;
use crate::store::StoreError;

/// Errors raised by refund operations.
#[derive(Debug, Error)]
pub enum RefundError {
    /// Caller role is not allowed to refund.
    #[error("role '{0}' may not perform refunds")]
    Forbidden(String),

    /// Unknown payment.
    #[error("payment not found: {0}")]
    PaymentNotFound(PaymentId),

    /// Unknown refund.
    #[error("refund not found: {0}")]
    RefundNotFound(RefundId),

    /// Refund has no proof document.
    #[error("refund {0} has no proof document")]
    ProofMissing(RefundId),

    /// Payment is fully refunded.
    #[error("payment {0} is already refunded")]
    AlreadyRefunded(PaymentId),

    /// Payment is not in a refundable status.
    #[error("payment {payment_id} is {status} and cannot be refunded")]
    NotRefundable {
        /// Payment id.
        payment_id: PaymentId,
        /// Current status.
        status: PaymentStatus,
    },

    /// Payment has no processor record to refund against.
    #[error("payment {0} is not linked to a processor payment")]
    NotLinked(PaymentId),

    /// A previous refund left an unresolved discrepancy.
    #[error("payment {0} has an unresolved refund discrepancy")]
    OpenDiscrepancy(PaymentId),

    /// Requested amount is invalid.
    #[error("invalid refund amount: {0}")]
    InvalidAmount(String),

    /// Payment changed while the refund was in flight.
    #[error("payment {0} was modified concurrently")]
    ConcurrentModification(PaymentId),

    /// Processor refund call failed.
    #[error("gateway error: {0}")]
    Gateway(#[source] ProcessorError),

    /// Processor refunded but the local commit failed.
    #[error("refund {processor_refund_id} for payment {payment_id} was issued but could not be recorded")]
    CommitFailed {
        /// Payment id.
        payment_id: PaymentId,
        /// Processor refund id.
        processor_refund_id: String,
    },

    /// Proof storage failed.
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// Store failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl RefundError {
    /// Returns the error code for API responses.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::Forbidden(_) => "FORBIDDEN",
            Self::PaymentNotFound(_) => "PAYMENT_NOT_FOUND",
            Self::RefundNotFound(_) => "REFUND_NOT_FOUND",
            Self::ProofMissing(_) => "PROOF_NOT_FOUND",
            Self::AlreadyRefunded(_) => "ALREADY_REFUNDED",
            Self::NotRefundable { .. } => "NOT_REFUNDABLE",
            Self::NotLinked(_) => "NOT_LINKED",
            Self::OpenDiscrepancy(_) => "OPEN_DISCREPANCY",
            Self::InvalidAmount(_) => "INVALID_AMOUNT",
            Self::ConcurrentModification(_) => "CONCURRENT_MODIFICATION",
            Self::Gateway(_) => "GATEWAY_ERROR",
            Self::CommitFailed { .. } => "REFUND_NOT_RECORDED",
            Self::Storage(_) => "STORAGE_ERROR",
            Self::Store(_) => "DATABASE_ERROR",
        }
    }
}

impl From<RefundError> for AppError {
    fn from(err: RefundError) -> Self {
        match err {
            RefundError::Forbidden(_) => Self::Forbidden(err.to_string()),
            RefundError::PaymentNotFound(_)
            | RefundError::RefundNotFound(_)
            | RefundError::ProofMissing(_) => Self::NotFound(err.to_string()),
            RefundError::AlreadyRefunded(_) => Self::Conflict("already refunded".to_string()),
            RefundError::NotRefundable { .. }
            | RefundError::NotLinked(_)
            | RefundError::OpenDiscrepancy(_)
            | RefundError::ConcurrentModification(_) => Self::Conflict(err.to_string()),
            RefundError::InvalidAmount(_) => Self::Validation(err.to_string()),
            RefundError::Gateway(_) => Self::Upstream(err.to_string()),
            RefundError::CommitFailed { .. } => Self::Internal(err.to_string()),
            RefundError::Storage(e) => e.into(),
            RefundError::Store(e) => e.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let cases: Vec<(RefundError, u16)> = vec![
            (RefundError::Forbidden("patient".into()), 403),
            (RefundError::PaymentNotFound(PaymentId::new()), 404),
            (RefundError::ProofMissing(RefundId::new()), 404),
            (RefundError::AlreadyRefunded(PaymentId::new()), 409),
            (RefundError::OpenDiscrepancy(PaymentId::new()), 409),
            (RefundError::InvalidAmount("negative".into()), 400),
            (RefundError::Gateway(ProcessorError::Timeout), 502),
            (
                RefundError::CommitFailed {
                    payment_id: PaymentId::new(),
                    processor_refund_id: "r-1".into(),
                },
                500,
            ),
        ];
        for (err, status) in cases {
            assert_eq!(AppError::from(err).status_code(), status);
        }
    }

    #[test]
    fn test_gateway_is_retryable_already_refunded_is_not() {
        let gateway: AppError = RefundError::Gateway(ProcessorError::Timeout).into();
        assert!(gateway.is_retryable());
        assert!(gateway.to_string().contains("gateway error"));

        let done: AppError = RefundError::AlreadyRefunded(PaymentId::new()).into();
        assert!(!done.is_retryable());
        assert_eq!(done.to_string(), "Conflict: already refunded");
    }
}
