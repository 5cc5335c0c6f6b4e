//! Reconciliation errors.

use clinipay_shared::AppError;
use clinipay_shared::types::{BookingId, PaymentId};
use rust_decimal::Decimal;
use thiserror::Error;

use super::status::{BookingStatus, PaymentStatus};
use crate::ledger::LedgerError;
use crate::processor::ProcessorError;
use crate::store::StoreError;

/// Errors raised while reconciling a payment.
#[derive(Debug, Error)]
pub enum ReconcileError {
    /// No local payment matches the processor record.
    #[error("no local payment for processor payment {0}")]
    PaymentNotFound(String),

    /// The state machine does not allow the change.
    #[error("payment {payment_id} cannot move from {from} to {to}")]
    InvalidTransition {
        /// Local payment id.
        payment_id: PaymentId,
        /// Current status.
        from: PaymentStatus,
        /// Requested status.
        to: PaymentStatus,
    },

    /// The processor charged a different amount than the payment expects.
    #[error("payment {payment_id} amount mismatch: expected {expected}, processor reported {actual}")]
    AmountMismatch {
        /// Local payment id.
        payment_id: PaymentId,
        /// Local gross amount.
        expected: Decimal,
        /// Canonical amount.
        actual: Decimal,
    },

    /// The processor reported a status we do not know.
    #[error("unknown processor status: {0}")]
    UnknownStatus(String),

    /// Booking not found.
    #[error("booking not found: {0}")]
    BookingNotFound(BookingId),

    /// Booking cannot be completed in its current state.
    #[error("booking {booking_id} is {status}, only confirmed bookings can be completed")]
    BookingNotCompletable {
        /// Booking id.
        booking_id: BookingId,
        /// Current status.
        status: BookingStatus,
    },

    /// Booking completion requires an approved payment.
    #[error("booking {booking_id} has no approved payment")]
    PaymentNotApproved {
        /// Booking id.
        booking_id: BookingId,
    },

    /// Processor call failed.
    #[error(transparent)]
    Processor(#[from] ProcessorError),

    /// Ledger write failed.
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    /// Store failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl ReconcileError {
    /// Returns the error code for API responses.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::PaymentNotFound(_) => "PAYMENT_NOT_FOUND",
            Self::InvalidTransition { .. } => "INVALID_TRANSITION",
            Self::AmountMismatch { .. } => "AMOUNT_MISMATCH",
            Self::UnknownStatus(_) => "UNKNOWN_PROCESSOR_STATUS",
            Self::BookingNotFound(_) => "BOOKING_NOT_FOUND",
            Self::BookingNotCompletable { .. } => "BOOKING_NOT_COMPLETABLE",
            Self::PaymentNotApproved { .. } => "PAYMENT_NOT_APPROVED",
            Self::Processor(_) => "GATEWAY_ERROR",
            Self::Ledger(_) => "LEDGER_ERROR",
            Self::Store(_) => "DATABASE_ERROR",
        }
    }

    /// Failures that redelivering the same notification cannot fix.
    #[must_use]
    pub const fn is_ignorable(&self) -> bool {
        matches!(
            self,
            Self::PaymentNotFound(_) | Self::InvalidTransition { .. } | Self::AmountMismatch { .. }
        )
    }
}

impl From<ReconcileError> for AppError {
    fn from(err: ReconcileError) -> Self {
        match err {
            ReconcileError::PaymentNotFound(_) | ReconcileError::BookingNotFound(_) => {
                Self::NotFound(err.to_string())
            }
            ReconcileError::InvalidTransition { .. }
            | ReconcileError::AmountMismatch { .. }
            | ReconcileError::BookingNotCompletable { .. }
            | ReconcileError::PaymentNotApproved { .. } => Self::Conflict(err.to_string()),
            ReconcileError::UnknownStatus(_) => Self::Upstream(err.to_string()),
            ReconcileError::Processor(e) => e.into(),
            ReconcileError::Ledger(e) => e.into(),
            ReconcileError::Store(e) => e.into(),
        }
    }
}
