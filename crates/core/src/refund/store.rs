//! Refund persistence seam.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use clinipay_shared::types::{PaymentId, RefundId};

use super::types::{Refund, RefundCommit, RefundDiscrepancy};
use crate::store::StoreError;

/// Refunds and refund discrepancies.
#[async_trait]
pub trait RefundStore: Send + Sync {
    /// Inserts the refund, updates the payment and applies the booking side
    /// effect in one transaction.
    ///
    /// Returns false when the payment no longer matches the commit's
    /// precondition; nothing is written in that case.
    async fn commit_refund(&self, commit: &RefundCommit) -> Result<bool, StoreError>;

    /// Inserts a refund the processor issued against a payment that a
    /// processor notification has already marked refunded. The payment row
    /// is left untouched.
    ///
    /// Returns false, writing nothing, when the payment is not refunded.
    async fn record_settled_refund(&self, refund: &Refund) -> Result<bool, StoreError>;

    /// Loads a refund.
    async fn find_refund(&self, id: RefundId) -> Result<Option<Refund>, StoreError>;

    /// Lists refunds of a payment, oldest first.
    async fn list_refunds(&self, payment_id: PaymentId) -> Result<Vec<Refund>, StoreError>;

    /// Records a discrepancy.
    async fn record_discrepancy(&self, discrepancy: &RefundDiscrepancy) -> Result<(), StoreError>;

    /// Lists unresolved discrepancies of a payment.
    async fn open_discrepancies(
        &self,
        payment_id: PaymentId,
    ) -> Result<Vec<RefundDiscrepancy>, StoreError>;

    /// Marks every open discrepancy of a payment resolved. Returns how many.
    async fn resolve_discrepancies(
        &self,
        payment_id: PaymentId,
        at: DateTime<Utc>,
    ) -> Result<u64, StoreError>;
}
