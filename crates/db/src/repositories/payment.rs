//! Payment and booking repository.

use async_trait::async_trait;
use clinipay_core::payment::{
    Booking, BookingTransition, Payment, PaymentStatus, PaymentStore, PaymentTransition,
};
use clinipay_core::store::StoreError;
use clinipay_shared::types::{BookingId, PaymentId};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, QueryFilter,
    Set, TransactionTrait,
};
use tracing::debug;

use super::convert::{db_err, is_unique_violation};
use crate::entities::{bookings, payments};

/// Repository for payments and their bookings.
#[derive(Debug, Clone)]
pub struct PaymentRepository {
    db: DatabaseConnection,
}

impl PaymentRepository {
    /// Creates a new payment repository.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Inserts a booking and its pending payment.
    ///
    /// # Errors
    ///
    /// Returns an error if either insert fails.
    pub async fn create(&self, booking: &Booking, payment: &Payment) -> Result<(), StoreError> {
        let txn = self.db.begin().await.map_err(db_err)?;

        bookings::ActiveModel {
            id: Set(booking.id.into_inner()),
            status: Set(booking.status.as_str().to_string()),
            professional_id: Set(booking.professional_id),
            service_id: Set(booking.service_id),
            created_at: Set(payment.created_at.into()),
            updated_at: Set(payment.created_at.into()),
        }
        .insert(&txn)
        .await
        .map_err(db_err)?;

        payments::ActiveModel {
            id: Set(payment.id.into_inner()),
            booking_id: Set(payment.booking_id.into_inner()),
            processor_payment_id: Set(payment.processor_payment_id.clone()),
            status: Set(payment.status.as_str().to_string()),
            gross_amount: Set(payment.gross_amount),
            refund_status: Set(payment.refund_status.as_str().to_string()),
            refunded_amount: Set(payment.refunded_amount),
            created_at: Set(payment.created_at.into()),
            updated_at: Set(payment.updated_at.into()),
            approved_at: Set(payment.approved_at.map(Into::into)),
        }
        .insert(&txn)
        .await
        .map_err(db_err)?;

        txn.commit().await.map_err(db_err)
    }

    async fn find_one(
        &self,
        filter: impl sea_orm::sea_query::IntoCondition,
    ) -> Result<Option<Payment>, StoreError> {
        payments::Entity::find()
            .filter(filter)
            .one(&self.db)
            .await
            .map_err(db_err)?
            .map(Payment::try_from)
            .transpose()
    }
}

/// Conditional booking update shared by payment and refund writes.
pub(crate) async fn update_booking<C: ConnectionTrait>(
    conn: &C,
    transition: &BookingTransition,
    at: chrono::DateTime<chrono::Utc>,
) -> Result<bool, StoreError> {
    let from: Vec<&str> = transition.from.iter().map(|s| s.as_str()).collect();
    let result = bookings::Entity::update_many()
        .col_expr(bookings::Column::Status, Expr::value(transition.to.as_str()))
        .col_expr(bookings::Column::UpdatedAt, Expr::value(at))
        .filter(bookings::Column::Id.eq(transition.booking_id.into_inner()))
        .filter(bookings::Column::Status.is_in(from))
        .exec(conn)
        .await
        .map_err(db_err)?;

    Ok(result.rows_affected == 1)
}

#[async_trait]
impl PaymentStore for PaymentRepository {
    async fn find_payment(&self, id: PaymentId) -> Result<Option<Payment>, StoreError> {
        self.find_one(payments::Column::Id.eq(id.into_inner())).await
    }

    async fn find_by_processor_id(
        &self,
        processor_payment_id: &str,
    ) -> Result<Option<Payment>, StoreError> {
        self.find_one(payments::Column::ProcessorPaymentId.eq(processor_payment_id))
            .await
    }

    async fn find_by_booking(&self, booking_id: BookingId) -> Result<Option<Payment>, StoreError> {
        self.find_one(payments::Column::BookingId.eq(booking_id.into_inner()))
            .await
    }

    async fn link_processor_id(
        &self,
        id: PaymentId,
        processor_payment_id: &str,
    ) -> Result<bool, StoreError> {
        let result = payments::Entity::update_many()
            .col_expr(
                payments::Column::ProcessorPaymentId,
                Expr::value(processor_payment_id),
            )
            .filter(payments::Column::Id.eq(id.into_inner()))
            .filter(payments::Column::ProcessorPaymentId.is_null())
            .exec(&self.db)
            .await;

        match result {
            Ok(res) => Ok(res.rows_affected == 1),
            Err(err) if is_unique_violation(&err) => {
                debug!(%id, processor_payment_id, "Processor id already linked elsewhere");
                Ok(false)
            }
            Err(err) => Err(db_err(err)),
        }
    }

    async fn apply_transition(&self, transition: &PaymentTransition) -> Result<bool, StoreError> {
        let txn = self.db.begin().await.map_err(db_err)?;

        let mut update = payments::Entity::update_many()
            .col_expr(payments::Column::Status, Expr::value(transition.to.as_str()))
            .col_expr(payments::Column::UpdatedAt, Expr::value(transition.at));
        if transition.to == PaymentStatus::Approved {
            update = update.col_expr(payments::Column::ApprovedAt, Expr::value(transition.at));
        }
        if let Some((refund_status, refunded_amount)) = transition.refund {
            update = update
                .col_expr(
                    payments::Column::RefundStatus,
                    Expr::value(refund_status.as_str()),
                )
                .col_expr(payments::Column::RefundedAmount, Expr::value(refunded_amount));
        }

        let result = update
            .filter(payments::Column::Id.eq(transition.payment_id.into_inner()))
            .filter(payments::Column::Status.eq(transition.from.as_str()))
            .exec(&txn)
            .await
            .map_err(db_err)?;

        if result.rows_affected != 1 {
            txn.rollback().await.map_err(db_err)?;
            return Ok(false);
        }

        if let Some(booking) = &transition.booking {
            update_booking(&txn, booking, transition.at).await?;
        }

        txn.commit().await.map_err(db_err)?;
        Ok(true)
    }

    async fn find_booking(&self, id: BookingId) -> Result<Option<Booking>, StoreError> {
        bookings::Entity::find_by_id(id.into_inner())
            .one(&self.db)
            .await
            .map_err(db_err)?
            .map(Booking::try_from)
            .transpose()
    }

    async fn transition_booking(&self, transition: &BookingTransition) -> Result<bool, StoreError> {
        update_booking(&self.db, transition, chrono::Utc::now()).await
    }
}
