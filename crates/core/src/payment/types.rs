//! Payment and booking records.

use chrono::{DateTime, Utc};
use clinipay_shared::types::{BookingId, PaymentId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::status::{BookingStatus, PaymentStatus, RefundStatus};

/// A payment for one booking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payment {
    /// Local id.
    pub id: PaymentId,
    /// Booking being paid for.
    pub booking_id: BookingId,
    /// Processor id, linked on the first notification.
    pub processor_payment_id: Option<String>,
    /// Current status.
    pub status: PaymentStatus,
    /// Amount charged to the payer.
    pub gross_amount: Decimal,
    /// How much has been refunded so far.
    pub refund_status: RefundStatus,
    /// Sum of committed refunds.
    pub refunded_amount: Decimal,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last mutation time.
    pub updated_at: DateTime<Utc>,
    /// When the payment was approved.
    pub approved_at: Option<DateTime<Utc>>,
}

impl Payment {
    /// Creates a pending payment for a booking.
    #[must_use]
    pub fn pending(booking_id: BookingId, gross_amount: Decimal) -> Self {
        let now = Utc::now();
        Self {
            id: PaymentId::new(),
            booking_id,
            processor_payment_id: None,
            status: PaymentStatus::Pending,
            gross_amount,
            refund_status: RefundStatus::None,
            refunded_amount: Decimal::ZERO,
            created_at: now,
            updated_at: now,
            approved_at: None,
        }
    }

    /// Amount still available to refund.
    #[must_use]
    pub fn refundable_amount(&self) -> Decimal {
        (self.gross_amount - self.refunded_amount).max(Decimal::ZERO)
    }
}

/// A booking for a clinical service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Booking {
    /// Booking id.
    pub id: BookingId,
    /// Current status.
    pub status: BookingStatus,
    /// Professional delivering the service.
    pub professional_id: Uuid,
    /// Service booked.
    pub service_id: Uuid,
}

/// Conditional booking status change.
///
/// Applied only if the booking's current status is one of `from`. A
/// booking in any other status is left untouched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookingTransition {
    /// Booking to update.
    pub booking_id: BookingId,
    /// Statuses the update applies to.
    pub from: Vec<BookingStatus>,
    /// New status.
    pub to: BookingStatus,
}

impl BookingTransition {
    /// Confirms a pending booking.
    #[must_use]
    pub fn confirm(booking_id: BookingId) -> Self {
        Self {
            booking_id,
            from: vec![BookingStatus::Pending],
            to: BookingStatus::Confirmed,
        }
    }

    /// Cancels a booking that has not been delivered.
    #[must_use]
    pub fn cancel(booking_id: BookingId) -> Self {
        Self {
            booking_id,
            from: vec![BookingStatus::Pending, BookingStatus::Confirmed],
            to: BookingStatus::Cancelled,
        }
    }

    /// Completes a confirmed booking.
    #[must_use]
    pub fn complete(booking_id: BookingId) -> Self {
        Self {
            booking_id,
            from: vec![BookingStatus::Confirmed],
            to: BookingStatus::Completed,
        }
    }
}

/// Compare-and-set payment status change.
///
/// The store applies it only if the payment is still in `from`, together with
/// the booking side effect, in one atomic unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentTransition {
    /// Payment to update.
    pub payment_id: PaymentId,
    /// Expected current status.
    pub from: PaymentStatus,
    /// New status.
    pub to: PaymentStatus,
    /// New refund bookkeeping, for processor-side refunds.
    pub refund: Option<(RefundStatus, Decimal)>,
    /// Booking side effect.
    pub booking: Option<BookingTransition>,
    /// Time of the change.
    pub at: DateTime<Utc>,
}

impl PaymentTransition {
    /// Builds the transition for `payment` moving to `to`, with the side
    /// effects the state machine attaches to it.
    #[must_use]
    pub fn for_payment(payment: &Payment, to: PaymentStatus, at: DateTime<Utc>) -> Self {
        let booking = match to {
            PaymentStatus::Approved => Some(BookingTransition::confirm(payment.booking_id)),
            PaymentStatus::Refunded | PaymentStatus::Rejected | PaymentStatus::Cancelled => {
                Some(BookingTransition::cancel(payment.booking_id))
            }
            PaymentStatus::Pending => None,
        };
        let refund = (to == PaymentStatus::Refunded)
            .then_some((RefundStatus::Refunded, payment.gross_amount));

        Self {
            payment_id: payment.id,
            from: payment.status,
            to,
            refund,
            booking,
            at,
        }
    }
}

/// Dedup marker for a processed notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessedEvent {
    /// Processor request id.
    pub request_id: String,
    /// Processor payment id.
    pub processor_payment_id: String,
    /// Outcome label.
    pub outcome: String,
    /// When processing finished.
    pub processed_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_refundable_amount() {
        let mut payment = Payment::pending(BookingId::new(), dec!(100.00));
        assert_eq!(payment.refundable_amount(), dec!(100.00));

        payment.refunded_amount = dec!(30.00);
        assert_eq!(payment.refundable_amount(), dec!(70.00));
    }

    #[test]
    fn test_approval_confirms_booking() {
        let payment = Payment::pending(BookingId::new(), dec!(100.00));
        let transition = PaymentTransition::for_payment(&payment, PaymentStatus::Approved, Utc::now());

        assert_eq!(transition.from, PaymentStatus::Pending);
        assert_eq!(transition.booking, Some(BookingTransition::confirm(payment.booking_id)));
        assert_eq!(transition.refund, None);
    }

    #[test]
    fn test_refund_cancels_booking_and_marks_fully_refunded() {
        let mut payment = Payment::pending(BookingId::new(), dec!(100.00));
        payment.status = PaymentStatus::Approved;
        let transition = PaymentTransition::for_payment(&payment, PaymentStatus::Refunded, Utc::now());

        assert_eq!(transition.booking, Some(BookingTransition::cancel(payment.booking_id)));
        assert_eq!(transition.refund, Some((RefundStatus::Refunded, dec!(100.00))));
    }
}
