//! Applies processor notifications to local payments.

use std::sync::Arc;

use chrono::Utc;
use clinipay_shared::types::{BookingId, PaymentId};
use serde::Serialize;
use tracing::{debug, error, info, warn};

use super::error::ReconcileError;
use super::status::{BookingStatus, PaymentStatus};
use super::store::{PaymentStore, ProcessedEventStore};
use super::types::{Booking, BookingTransition, Payment, PaymentTransition, ProcessedEvent};
use crate::ledger::LedgerWriter;
use crate::locks::KeyedLocks;
use crate::processor::{CanonicalPayment, PaymentProcessor};
use crate::webhook::VerifiedEvent;

/// What reconciling a notification did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ReconcileOutcome {
    /// The payment moved to a new status.
    Applied {
        /// Local payment id.
        payment_id: PaymentId,
        /// Previous status.
        from: PaymentStatus,
        /// New status.
        to: PaymentStatus,
    },
    /// The payment already had the canonical status.
    AlreadyApplied {
        /// Local payment id.
        payment_id: PaymentId,
        /// Current status.
        status: PaymentStatus,
    },
    /// The request id was processed before.
    Duplicate,
}

impl ReconcileOutcome {
    /// Short label stored with the dedup marker.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Applied { .. } => "applied",
            Self::AlreadyApplied { .. } => "already_applied",
            Self::Duplicate => "duplicate",
        }
    }
}

/// Reconciles local payments against the processor's canonical record.
pub struct PaymentReconciler {
    payments: Arc<dyn PaymentStore>,
    events: Arc<dyn ProcessedEventStore>,
    processor: Arc<dyn PaymentProcessor>,
    ledger: LedgerWriter,
    locks: Arc<KeyedLocks>,
}

impl PaymentReconciler {
    /// Creates a reconciler.
    #[must_use]
    pub fn new(
        payments: Arc<dyn PaymentStore>,
        events: Arc<dyn ProcessedEventStore>,
        processor: Arc<dyn PaymentProcessor>,
        ledger: LedgerWriter,
    ) -> Self {
        Self {
            payments,
            events,
            processor,
            ledger,
            locks: Arc::new(KeyedLocks::new()),
        }
    }

    /// Shares the per-payment lock table with other writers of the same
    /// payments, such as the refund coordinator.
    #[must_use]
    pub fn with_locks(mut self, locks: Arc<KeyedLocks>) -> Self {
        self.locks = locks;
        self
    }

    /// Reconciles one verified notification.
    ///
    /// The processor is queried before the per-payment lock is taken; the
    /// lock only covers the dedup re-check and the local commit.
    pub async fn reconcile(&self, event: &VerifiedEvent) -> Result<ReconcileOutcome, ReconcileError> {
        if self.events.is_processed(&event.request_id).await? {
            info!(request_id = %event.request_id, "Duplicate payment notification");
            return Ok(ReconcileOutcome::Duplicate);
        }

        let canonical = self
            .processor
            .fetch_payment(&event.processor_payment_id)
            .await
            .map_err(|e| {
                error!(
                    request_id = %event.request_id,
                    processor_payment_id = %event.processor_payment_id,
                    error = %e,
                    "Failed to fetch canonical payment"
                );
                e
            })?;

        let target = PaymentStatus::from_processor(&canonical.status).ok_or_else(|| {
            error!(
                request_id = %event.request_id,
                status = %canonical.status,
                "Processor reported an unknown payment status"
            );
            ReconcileError::UnknownStatus(canonical.status.clone())
        })?;

        let _guard = self.locks.lock(&event.processor_payment_id).await;

        if self.events.is_processed(&event.request_id).await? {
            info!(request_id = %event.request_id, "Duplicate payment notification");
            return Ok(ReconcileOutcome::Duplicate);
        }

        let payment = self.locate(&event.processor_payment_id, &canonical).await?;
        let outcome = self.apply(payment, target, &canonical).await?;

        self.events
            .mark_processed(&ProcessedEvent {
                request_id: event.request_id.clone(),
                processor_payment_id: event.processor_payment_id.clone(),
                outcome: outcome.label().to_string(),
                processed_at: Utc::now(),
            })
            .await?;

        Ok(outcome)
    }

    /// Finds the local payment, linking the processor id on first sight.
    async fn locate(
        &self,
        processor_payment_id: &str,
        canonical: &CanonicalPayment,
    ) -> Result<Payment, ReconcileError> {
        if let Some(payment) = self.payments.find_by_processor_id(processor_payment_id).await? {
            return Ok(payment);
        }

        let not_found = || ReconcileError::PaymentNotFound(processor_payment_id.to_string());

        let booking_id = canonical
            .external_reference
            .as_deref()
            .and_then(|r| r.trim().parse::<BookingId>().ok())
            .ok_or_else(not_found)?;

        let mut payment = self
            .payments
            .find_by_booking(booking_id)
            .await?
            .ok_or_else(not_found)?;

        if let Some(linked) = payment.processor_payment_id.as_deref() {
            warn!(
                payment_id = %payment.id,
                linked,
                processor_payment_id,
                "Booking already paid by another processor payment"
            );
            return Err(not_found());
        }

        if self
            .payments
            .link_processor_id(payment.id, processor_payment_id)
            .await?
        {
            debug!(payment_id = %payment.id, processor_payment_id, "Linked processor payment");
            payment.processor_payment_id = Some(processor_payment_id.to_string());
            return Ok(payment);
        }

        // Linked concurrently, possibly to the same id.
        self.payments
            .find_payment(payment.id)
            .await?
            .filter(|p| p.processor_payment_id.as_deref() == Some(processor_payment_id))
            .ok_or_else(not_found)
    }

    async fn apply(
        &self,
        payment: Payment,
        target: PaymentStatus,
        canonical: &CanonicalPayment,
    ) -> Result<ReconcileOutcome, ReconcileError> {
        if payment.status == target {
            if target == PaymentStatus::Approved {
                self.ledger.record_approval(&payment).await?;
            }
            debug!(payment_id = %payment.id, status = %target, "Payment status already applied");
            return Ok(ReconcileOutcome::AlreadyApplied {
                payment_id: payment.id,
                status: target,
            });
        }

        if !payment.status.can_transition_to(target) {
            warn!(
                payment_id = %payment.id,
                from = %payment.status,
                to = %target,
                "Rejected invalid payment transition"
            );
            return Err(ReconcileError::InvalidTransition {
                payment_id: payment.id,
                from: payment.status,
                to: target,
            });
        }

        if target == PaymentStatus::Approved && canonical.transaction_amount != payment.gross_amount
        {
            warn!(
                security_event = "amount_mismatch",
                payment_id = %payment.id,
                expected = %payment.gross_amount,
                actual = %canonical.transaction_amount,
                "Processor amount does not match payment"
            );
            return Err(ReconcileError::AmountMismatch {
                payment_id: payment.id,
                expected: payment.gross_amount,
                actual: canonical.transaction_amount,
            });
        }

        let now = Utc::now();
        let transition = PaymentTransition::for_payment(&payment, target, now);

        if !self.payments.apply_transition(&transition).await? {
            let current = self
                .payments
                .find_payment(payment.id)
                .await?
                .map_or(target, |p| p.status);
            info!(
                payment_id = %payment.id,
                status = %current,
                "Payment changed concurrently, treating as applied"
            );
            return Ok(ReconcileOutcome::AlreadyApplied {
                payment_id: payment.id,
                status: current,
            });
        }

        if target == PaymentStatus::Approved {
            let approved = Payment {
                status: PaymentStatus::Approved,
                approved_at: Some(now),
                updated_at: now,
                ..payment.clone()
            };
            self.ledger.record_approval(&approved).await?;
        }

        info!(
            payment_id = %payment.id,
            from = %payment.status,
            to = %target,
            "Applied payment transition"
        );

        Ok(ReconcileOutcome::Applied {
            payment_id: payment.id,
            from: payment.status,
            to: target,
        })
    }

    /// Marks a confirmed booking as delivered. Requires an approved payment.
    pub async fn complete_booking(&self, booking_id: BookingId) -> Result<Booking, ReconcileError> {
        let booking = self
            .payments
            .find_booking(booking_id)
            .await?
            .ok_or(ReconcileError::BookingNotFound(booking_id))?;

        if booking.status == BookingStatus::Completed {
            return Ok(booking);
        }

        let approved = self
            .payments
            .find_by_booking(booking_id)
            .await?
            .is_some_and(|p| p.status == PaymentStatus::Approved);
        if !approved {
            return Err(ReconcileError::PaymentNotApproved { booking_id });
        }

        if booking.status != BookingStatus::Confirmed {
            return Err(ReconcileError::BookingNotCompletable {
                booking_id,
                status: booking.status,
            });
        }

        if !self
            .payments
            .transition_booking(&BookingTransition::complete(booking_id))
            .await?
        {
            let current = self
                .payments
                .find_booking(booking_id)
                .await?
                .ok_or(ReconcileError::BookingNotFound(booking_id))?;
            if current.status != BookingStatus::Completed {
                return Err(ReconcileError::BookingNotCompletable {
                    booking_id,
                    status: current.status,
                });
            }
        }

        info!(booking_id = %booking_id, "Booking completed");
        Ok(Booking {
            status: BookingStatus::Completed,
            ..booking
        })
    }
}
