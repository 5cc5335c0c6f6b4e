//! Ledger error types.

use clinipay_shared::AppError;
use rust_decimal::Decimal;
use thiserror::Error;

use crate::store::StoreError;

/// Errors that can occur during ledger operations.
#[derive(Debug, Error)]
pub enum LedgerError {
    // ========== Validation Errors ==========
    /// Transaction must have at least 2 entries.
    #[error("Transaction must have at least 2 entries")]
    InsufficientEntries,

    /// Transaction is not balanced (debits != credits).
    #[error("Transaction is not balanced. Debit: {debit}, Credit: {credit}")]
    UnbalancedTransaction {
        /// Total debit amount.
        debit: Decimal,
        /// Total credit amount.
        credit: Decimal,
    },

    /// Gross amount must be positive.
    #[error("Entry amount cannot be zero")]
    ZeroAmount,

    /// Entry amount cannot be negative.
    #[error("Entry amount cannot be negative")]
    NegativeAmount,

    /// Entries of one write must share a transaction id.
    #[error("Entries belong to more than one transaction")]
    MixedTransactions,

    /// Payout rate outside `[0, 1]`.
    #[error("Payout rate must be between 0 and 1, got {0}")]
    InvalidPayoutRate(Decimal),

    // ========== Database Errors ==========
    /// Store failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl LedgerError {
    /// Returns the error code for API responses.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::InsufficientEntries => "INSUFFICIENT_ENTRIES",
            Self::UnbalancedTransaction { .. } => "UNBALANCED_TRANSACTION",
            Self::ZeroAmount => "ZERO_AMOUNT",
            Self::NegativeAmount => "NEGATIVE_AMOUNT",
            Self::MixedTransactions => "MIXED_TRANSACTIONS",
            Self::InvalidPayoutRate(_) => "INVALID_PAYOUT_RATE",
            Self::Store(_) => "DATABASE_ERROR",
        }
    }
}

impl From<LedgerError> for AppError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::Store(e) => e.into(),
            LedgerError::ZeroAmount | LedgerError::NegativeAmount => {
                Self::Validation(err.to_string())
            }
            _ => Self::Internal(err.to_string()),
        }
    }
}
