//! Refund and discrepancy repository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use clinipay_core::payment::PaymentStatus;
use clinipay_core::refund::{Refund, RefundCommit, RefundDiscrepancy, RefundStore};
use clinipay_core::store::StoreError;
use clinipay_shared::types::{PaymentId, RefundId};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder,
    QuerySelect, Set, TransactionTrait,
};
use tracing::warn;

use super::convert::db_err;
use super::payment::update_booking;
use crate::entities::{payments, refund_discrepancies, refunds};

/// Repository for refunds and refund discrepancies.
#[derive(Debug, Clone)]
pub struct RefundRepository {
    db: DatabaseConnection,
}

impl RefundRepository {
    /// Creates a new refund repository.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

fn active_model(refund: &Refund) -> refunds::ActiveModel {
    let proof = refund.proof.as_ref();
    refunds::ActiveModel {
        id: Set(refund.id.into_inner()),
        payment_id: Set(refund.payment_id.into_inner()),
        amount: Set(refund.amount),
        method: Set(refund.method.as_str().to_string()),
        processor_refund_id: Set(refund.processor_refund_id.clone()),
        proof_key: Set(proof.map(|p| p.key.clone())),
        proof_checksum: Set(proof.map(|p| p.checksum_sha256.clone())),
        proof_content_type: Set(proof.map(|p| p.content_type.clone())),
        proof_size: Set(proof.map(|p| i64::try_from(p.size).unwrap_or(i64::MAX))),
        actor_id: Set(refund.actor_id.into_inner()),
        reason: Set(refund.reason.clone()),
        created_at: Set(refund.created_at.into()),
    }
}

#[async_trait]
impl RefundStore for RefundRepository {
    async fn commit_refund(&self, commit: &RefundCommit) -> Result<bool, StoreError> {
        let refund = &commit.refund;
        let txn = self.db.begin().await.map_err(db_err)?;

        let result = payments::Entity::update_many()
            .col_expr(payments::Column::Status, Expr::value(commit.status.as_str()))
            .col_expr(
                payments::Column::RefundStatus,
                Expr::value(commit.refund_status.as_str()),
            )
            .col_expr(
                payments::Column::RefundedAmount,
                Expr::value(commit.new_refunded_amount),
            )
            .col_expr(payments::Column::UpdatedAt, Expr::value(refund.created_at))
            .filter(payments::Column::Id.eq(refund.payment_id.into_inner()))
            .filter(payments::Column::Status.eq(PaymentStatus::Approved.as_str()))
            .filter(payments::Column::RefundedAmount.eq(commit.expected_refunded_amount))
            .exec(&txn)
            .await
            .map_err(db_err)?;

        if result.rows_affected != 1 {
            txn.rollback().await.map_err(db_err)?;
            warn!(
                payment_id = %refund.payment_id,
                expected = %commit.expected_refunded_amount,
                "Refund commit lost a concurrent update"
            );
            return Ok(false);
        }

        active_model(refund).insert(&txn).await.map_err(db_err)?;

        if let Some(booking) = &commit.booking {
            update_booking(&txn, booking, refund.created_at).await?;
        }

        txn.commit().await.map_err(db_err)?;
        Ok(true)
    }

    async fn record_settled_refund(&self, refund: &Refund) -> Result<bool, StoreError> {
        let txn = self.db.begin().await.map_err(db_err)?;

        let settled = payments::Entity::find_by_id(refund.payment_id.into_inner())
            .filter(payments::Column::Status.eq(PaymentStatus::Refunded.as_str()))
            .lock_exclusive()
            .one(&txn)
            .await
            .map_err(db_err)?
            .is_some();

        if !settled {
            txn.rollback().await.map_err(db_err)?;
            return Ok(false);
        }

        active_model(refund).insert(&txn).await.map_err(db_err)?;
        txn.commit().await.map_err(db_err)?;
        Ok(true)
    }

    async fn find_refund(&self, id: RefundId) -> Result<Option<Refund>, StoreError> {
        refunds::Entity::find_by_id(id.into_inner())
            .one(&self.db)
            .await
            .map_err(db_err)?
            .map(Refund::try_from)
            .transpose()
    }

    async fn list_refunds(&self, payment_id: PaymentId) -> Result<Vec<Refund>, StoreError> {
        refunds::Entity::find()
            .filter(refunds::Column::PaymentId.eq(payment_id.into_inner()))
            .order_by_asc(refunds::Column::CreatedAt)
            .all(&self.db)
            .await
            .map_err(db_err)?
            .into_iter()
            .map(Refund::try_from)
            .collect()
    }

    async fn record_discrepancy(&self, discrepancy: &RefundDiscrepancy) -> Result<(), StoreError> {
        refund_discrepancies::ActiveModel {
            id: Set(discrepancy.id),
            payment_id: Set(discrepancy.payment_id.into_inner()),
            amount: Set(discrepancy.amount),
            processor_refund_id: Set(discrepancy.processor_refund_id.clone()),
            detail: Set(discrepancy.detail.clone()),
            created_at: Set(discrepancy.created_at.into()),
            resolved_at: Set(discrepancy.resolved_at.map(Into::into)),
        }
        .insert(&self.db)
        .await
        .map_err(db_err)?;
        Ok(())
    }

    async fn open_discrepancies(
        &self,
        payment_id: PaymentId,
    ) -> Result<Vec<RefundDiscrepancy>, StoreError> {
        let rows = refund_discrepancies::Entity::find()
            .filter(refund_discrepancies::Column::PaymentId.eq(payment_id.into_inner()))
            .filter(refund_discrepancies::Column::ResolvedAt.is_null())
            .order_by_asc(refund_discrepancies::Column::CreatedAt)
            .all(&self.db)
            .await
            .map_err(db_err)?;
        Ok(rows.into_iter().map(RefundDiscrepancy::from).collect())
    }

    async fn resolve_discrepancies(
        &self,
        payment_id: PaymentId,
        at: DateTime<Utc>,
    ) -> Result<u64, StoreError> {
        let result = refund_discrepancies::Entity::update_many()
            .col_expr(refund_discrepancies::Column::ResolvedAt, Expr::value(at))
            .filter(refund_discrepancies::Column::PaymentId.eq(payment_id.into_inner()))
            .filter(refund_discrepancies::Column::ResolvedAt.is_null())
            .exec(&self.db)
            .await
            .map_err(db_err)?;
        Ok(result.rows_affected)
    }
}
