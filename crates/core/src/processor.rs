//! Payment processor gateway.
//!
//! The reconciler and the refund coordinator talk to the processor only
//! through [`PaymentProcessor`]. The HTTP implementation lives in the
//! processor crate.

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The processor's authoritative view of a payment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanonicalPayment {
    /// Processor payment id.
    pub id: String,
    /// Status in the processor's own vocabulary.
    pub status: String,
    /// Amount the processor charged.
    pub transaction_amount: Decimal,
    /// Merchant reference attached at checkout, our booking id.
    pub external_reference: Option<String>,
}

/// Request for a processor-side refund.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessorRefundRequest {
    /// Processor payment id to refund.
    pub processor_payment_id: String,
    /// Amount to return to the payer.
    pub amount: Decimal,
    /// Key that makes a repeated request a no-op on the processor side.
    pub idempotency_key: String,
}

/// A refund confirmed by the processor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessorRefund {
    /// Processor refund id.
    pub id: String,
    /// Amount refunded.
    pub amount: Decimal,
    /// Processor refund status.
    pub status: String,
}

/// Errors talking to the payment processor.
#[derive(Debug, Error)]
pub enum ProcessorError {
    /// The request did not complete within the configured timeout.
    #[error("processor request timed out")]
    Timeout,

    /// The processor could not be reached.
    #[error("processor unreachable: {0}")]
    Unreachable(String),

    /// The processor answered with a non-success status.
    #[error("processor returned {status}: {message}")]
    Rejected {
        /// HTTP status returned.
        status: u16,
        /// Response body or reason.
        message: String,
    },

    /// The processor answered with a body we could not read.
    #[error("invalid processor response: {0}")]
    InvalidResponse(String),
}

impl From<ProcessorError> for clinipay_shared::AppError {
    fn from(err: ProcessorError) -> Self {
        Self::Upstream(err.to_string())
    }
}

/// Operations the processor exposes to us.
#[async_trait]
pub trait PaymentProcessor: Send + Sync {
    /// Fetches the canonical record for a processor payment id.
    async fn fetch_payment(&self, processor_payment_id: &str)
    -> Result<CanonicalPayment, ProcessorError>;

    /// Issues a refund.
    async fn refund(
        &self,
        request: &ProcessorRefundRequest,
    ) -> Result<ProcessorRefund, ProcessorError>;
}
