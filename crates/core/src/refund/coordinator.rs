//! Refund coordination and the automated refund path.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use clinipay_shared::config::RefundConfig;
use clinipay_shared::types::{PaymentId, RefundId};
use rust_decimal::Decimal;
use tracing::{error, info, warn};
use uuid::Uuid;

use super::error::RefundError;
use super::store::RefundStore;
use super::types::{Actor, Refund, RefundCommit, RefundDiscrepancy, RefundMethod};
use crate::locks::KeyedLocks;
use crate::payment::{BookingTransition, Payment, PaymentStatus, PaymentStore, RefundStatus};
use crate::processor::{PaymentProcessor, ProcessorRefundRequest};
use crate::storage::{ProofStore, UploadLimits};

/// Checks that a payment can take another refund.
pub fn ensure_refundable(payment: &Payment) -> Result<(), RefundError> {
    if payment.status == PaymentStatus::Refunded || payment.refund_status == RefundStatus::Refunded
    {
        return Err(RefundError::AlreadyRefunded(payment.id));
    }
    if payment.status != PaymentStatus::Approved {
        return Err(RefundError::NotRefundable {
            payment_id: payment.id,
            status: payment.status,
        });
    }
    Ok(())
}

/// Resolves the refund amount. Defaults to everything still refundable.
pub fn resolve_amount(payment: &Payment, requested: Option<Decimal>) -> Result<Decimal, RefundError> {
    let remaining = payment.refundable_amount();
    let amount = requested.unwrap_or(remaining);

    if amount <= Decimal::ZERO {
        return Err(RefundError::InvalidAmount(format!(
            "amount must be positive, got {amount}"
        )));
    }
    if amount > remaining {
        return Err(RefundError::InvalidAmount(format!(
            "amount {amount} exceeds refundable {remaining}"
        )));
    }
    if amount.normalize().scale() > 2 {
        return Err(RefundError::InvalidAmount(format!(
            "amount {amount} has more than 2 decimal places"
        )));
    }

    Ok(amount)
}

/// Builds the commit for a refund of `refund.amount` against `payment`.
#[must_use]
pub fn build_commit(payment: &Payment, refund: Refund, cancel_booking: bool) -> RefundCommit {
    let new_refunded_amount = payment.refunded_amount + refund.amount;
    let full = new_refunded_amount >= payment.gross_amount;

    RefundCommit {
        refund,
        expected_refunded_amount: payment.refunded_amount,
        new_refunded_amount,
        status: if full {
            PaymentStatus::Refunded
        } else {
            PaymentStatus::Approved
        },
        refund_status: if full {
            RefundStatus::Refunded
        } else {
            RefundStatus::Partial
        },
        booking: cancel_booking.then(|| BookingTransition::cancel(payment.booking_id)),
    }
}

/// Processor idempotency key for refunding `amount` on top of what the
/// payment has already refunded.
///
/// A retry of the same request replays the processor's refund; a different
/// amount is a different refund.
#[must_use]
pub fn idempotency_key(payment: &Payment, amount: Decimal) -> String {
    format!(
        "refund-{}-{}-{}",
        payment.id,
        payment.refunded_amount.normalize(),
        amount.normalize()
    )
}

/// Executes automated and manual refunds.
pub struct RefundCoordinator {
    pub(super) payments: Arc<dyn PaymentStore>,
    pub(super) refunds: Arc<dyn RefundStore>,
    pub(super) processor: Arc<dyn PaymentProcessor>,
    pub(super) proofs: Arc<dyn ProofStore>,
    pub(super) limits: UploadLimits,
    pub(super) config: RefundConfig,
    locks: Arc<KeyedLocks>,
}

impl RefundCoordinator {
    /// Creates a coordinator.
    #[must_use]
    pub fn new(
        payments: Arc<dyn PaymentStore>,
        refunds: Arc<dyn RefundStore>,
        processor: Arc<dyn PaymentProcessor>,
        proofs: Arc<dyn ProofStore>,
        limits: UploadLimits,
        config: RefundConfig,
    ) -> Self {
        Self {
            payments,
            refunds,
            processor,
            proofs,
            limits,
            config,
            locks: Arc::new(KeyedLocks::new()),
        }
    }

    /// Shares the per-payment lock table with the payment reconciler so a
    /// refund commit and a processor notification for the same payment never
    /// interleave.
    #[must_use]
    pub fn with_locks(mut self, locks: Arc<KeyedLocks>) -> Self {
        self.locks = locks;
        self
    }

    /// Lifetime of minted proof URLs.
    #[must_use]
    pub fn proof_url_ttl(&self) -> Duration {
        Duration::from_secs(self.config.proof_url_ttl_secs)
    }

    pub(super) fn authorize(&self, actor: &Actor) -> Result<(), RefundError> {
        if self.config.is_role_allowed(&actor.role) {
            Ok(())
        } else {
            warn!(user_id = %actor.user_id, role = %actor.role, "Refund operation denied");
            Err(RefundError::Forbidden(actor.role.clone()))
        }
    }

    pub(super) async fn load_payment(&self, payment_id: PaymentId) -> Result<Payment, RefundError> {
        self.payments
            .find_payment(payment_id)
            .await?
            .ok_or(RefundError::PaymentNotFound(payment_id))
    }

    pub(super) async fn ensure_no_open_discrepancy(
        &self,
        payment_id: PaymentId,
    ) -> Result<(), RefundError> {
        if self.refunds.open_discrepancies(payment_id).await?.is_empty() {
            Ok(())
        } else {
            Err(RefundError::OpenDiscrepancy(payment_id))
        }
    }

    /// Refunds through the processor.
    ///
    /// The processor is called first with a key derived from the amount
    /// already refunded and the amount requested, so a retried request cannot
    /// refund twice. The local commit follows as one compare-and-set under the
    /// payment's lock; the lock is never held across the processor call.
    pub async fn refund_automated(
        &self,
        payment_id: PaymentId,
        amount: Option<Decimal>,
        actor: &Actor,
    ) -> Result<Refund, RefundError> {
        self.authorize(actor)?;

        let payment = self.load_payment(payment_id).await?;
        ensure_refundable(&payment)?;
        self.ensure_no_open_discrepancy(payment_id).await?;
        let amount = resolve_amount(&payment, amount)?;

        let processor_payment_id = payment
            .processor_payment_id
            .clone()
            .ok_or(RefundError::NotLinked(payment_id))?;

        let request = ProcessorRefundRequest {
            processor_payment_id,
            amount,
            idempotency_key: idempotency_key(&payment, amount),
        };

        let issued = self.processor.refund(&request).await.map_err(|e| {
            error!(
                payment_id = %payment_id,
                amount = %amount,
                error = %e,
                "Processor refund failed"
            );
            RefundError::Gateway(e)
        })?;

        if issued.amount != amount {
            let detail = format!("processor issued {} for a requested {amount}", issued.amount);
            return Err(self
                .record_discrepancy(&payment, issued.amount, &issued.id, &detail)
                .await);
        }

        let _guard = self.locks.lock(&request.processor_payment_id).await;

        let refund = Refund {
            id: RefundId::new(),
            payment_id,
            amount,
            method: RefundMethod::Automated,
            processor_refund_id: Some(issued.id.clone()),
            proof: None,
            actor_id: actor.user_id,
            reason: None,
            created_at: Utc::now(),
        };
        let full = payment.refunded_amount + amount >= payment.gross_amount;
        let commit = build_commit(&payment, refund.clone(), full);

        match self.refunds.commit_refund(&commit).await {
            Ok(true) => {
                info!(
                    payment_id = %payment_id,
                    refund_id = %refund.id,
                    processor_refund_id = %issued.id,
                    amount = %amount,
                    full,
                    "Automated refund committed"
                );
                Ok(refund)
            }
            Ok(false) => {
                let recorded = self
                    .refunds
                    .list_refunds(payment_id)
                    .await?
                    .iter()
                    .any(|r| r.processor_refund_id.as_deref() == Some(issued.id.as_str()));

                if recorded {
                    warn!(
                        payment_id = %payment_id,
                        processor_refund_id = %issued.id,
                        "Concurrent refund already committed"
                    );
                    Err(RefundError::ConcurrentModification(payment_id))
                } else {
                    match self.refunds.record_settled_refund(&refund).await {
                        Ok(true) => {
                            info!(
                                payment_id = %payment_id,
                                refund_id = %refund.id,
                                processor_refund_id = %issued.id,
                                amount = %amount,
                                "Automated refund recorded against a processor-settled payment"
                            );
                            Ok(refund)
                        }
                        Ok(false) => Err(self
                            .record_discrepancy(
                                &payment,
                                amount,
                                &issued.id,
                                "payment changed before commit",
                            )
                            .await),
                        Err(e) => Err(self
                            .record_discrepancy(&payment, amount, &issued.id, &e.to_string())
                            .await),
                    }
                }
            }
            Err(e) => Err(self
                .record_discrepancy(&payment, amount, &issued.id, &e.to_string())
                .await),
        }
    }

    async fn record_discrepancy(
        &self,
        payment: &Payment,
        amount: Decimal,
        processor_refund_id: &str,
        detail: &str,
    ) -> RefundError {
        error!(
            payment_id = %payment.id,
            processor_refund_id,
            amount = %amount,
            detail,
            "Processor refund issued but not recorded"
        );

        let discrepancy = RefundDiscrepancy {
            id: Uuid::now_v7(),
            payment_id: payment.id,
            amount,
            processor_refund_id: processor_refund_id.to_string(),
            detail: detail.to_string(),
            created_at: Utc::now(),
            resolved_at: None,
        };
        if let Err(e) = self.refunds.record_discrepancy(&discrepancy).await {
            error!(
                payment_id = %payment.id,
                processor_refund_id,
                error = %e,
                "Failed to record refund discrepancy"
            );
        }

        RefundError::CommitFailed {
            payment_id: payment.id,
            processor_refund_id: processor_refund_id.to_string(),
        }
    }
}
