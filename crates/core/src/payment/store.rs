//! Storage seams for payments, bookings and notification dedup.

use async_trait::async_trait;
use clinipay_shared::types::{BookingId, PaymentId};

use super::types::{Booking, BookingTransition, Payment, PaymentTransition, ProcessedEvent};
use crate::store::StoreError;

/// Payments and the bookings they pay for.
#[async_trait]
pub trait PaymentStore: Send + Sync {
    /// Loads a payment by local id.
    async fn find_payment(&self, id: PaymentId) -> Result<Option<Payment>, StoreError>;

    /// Loads a payment by processor id.
    async fn find_by_processor_id(
        &self,
        processor_payment_id: &str,
    ) -> Result<Option<Payment>, StoreError>;

    /// Loads the payment for a booking.
    async fn find_by_booking(&self, booking_id: BookingId) -> Result<Option<Payment>, StoreError>;

    /// Links a processor id to a payment that has none yet.
    ///
    /// Returns false if the payment already carries a processor id.
    async fn link_processor_id(
        &self,
        id: PaymentId,
        processor_payment_id: &str,
    ) -> Result<bool, StoreError>;

    /// Applies a status change if the payment is still in `transition.from`.
    ///
    /// The payment update and the booking side effect commit together.
    /// Returns false when the precondition no longer holds.
    async fn apply_transition(&self, transition: &PaymentTransition) -> Result<bool, StoreError>;

    /// Loads a booking.
    async fn find_booking(&self, id: BookingId) -> Result<Option<Booking>, StoreError>;

    /// Applies a booking status change if its status is in `transition.from`.
    async fn transition_booking(&self, transition: &BookingTransition) -> Result<bool, StoreError>;
}

/// Dedup markers for processed notifications.
#[async_trait]
pub trait ProcessedEventStore: Send + Sync {
    /// Whether a request id has already been processed.
    async fn is_processed(&self, request_id: &str) -> Result<bool, StoreError>;

    /// Records a processed request id. First insert wins; returns false if
    /// the marker already existed.
    async fn mark_processed(&self, event: &ProcessedEvent) -> Result<bool, StoreError>;
}
