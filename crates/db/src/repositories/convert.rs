//! Row <-> domain mapping.

use chrono::{DateTime, Utc};
use clinipay_core::ledger::{EntryType, LedgerEntry};
use clinipay_core::payment::{Booking, BookingStatus, Payment, PaymentStatus, RefundStatus};
use clinipay_core::refund::{ProofObject, Refund, RefundDiscrepancy, RefundMethod};
use clinipay_core::store::StoreError;
use clinipay_shared::types::{BookingId, LedgerEntryId, PaymentId, RefundId, UserId};
use sea_orm::prelude::DateTimeWithTimeZone;
use sea_orm::{DbErr, SqlErr};

use crate::entities::{bookings, ledger_entries, payments, refund_discrepancies, refunds};

pub(crate) fn db_err(err: DbErr) -> StoreError {
    StoreError::database(err.to_string())
}

pub(crate) fn is_unique_violation(err: &DbErr) -> bool {
    matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_)))
}

pub(crate) fn utc(at: DateTimeWithTimeZone) -> DateTime<Utc> {
    at.with_timezone(&Utc)
}

fn corrupt(table: &str, id: impl std::fmt::Display, column: &str, value: &str) -> StoreError {
    StoreError::corrupt(format!("{table} {id}: invalid {column} '{value}'"))
}

impl TryFrom<payments::Model> for Payment {
    type Error = StoreError;

    fn try_from(row: payments::Model) -> Result<Self, Self::Error> {
        let status = PaymentStatus::parse(&row.status)
            .ok_or_else(|| corrupt("payment", row.id, "status", &row.status))?;
        let refund_status = RefundStatus::parse(&row.refund_status)
            .ok_or_else(|| corrupt("payment", row.id, "refund_status", &row.refund_status))?;

        Ok(Self {
            id: PaymentId::from_uuid(row.id),
            booking_id: BookingId::from_uuid(row.booking_id),
            processor_payment_id: row.processor_payment_id,
            status,
            gross_amount: row.gross_amount,
            refund_status,
            refunded_amount: row.refunded_amount,
            created_at: utc(row.created_at),
            updated_at: utc(row.updated_at),
            approved_at: row.approved_at.map(utc),
        })
    }
}

impl TryFrom<bookings::Model> for Booking {
    type Error = StoreError;

    fn try_from(row: bookings::Model) -> Result<Self, Self::Error> {
        let status = BookingStatus::parse(&row.status)
            .ok_or_else(|| corrupt("booking", row.id, "status", &row.status))?;

        Ok(Self {
            id: BookingId::from_uuid(row.id),
            status,
            professional_id: row.professional_id,
            service_id: row.service_id,
        })
    }
}

impl TryFrom<ledger_entries::Model> for LedgerEntry {
    type Error = StoreError;

    fn try_from(row: ledger_entries::Model) -> Result<Self, Self::Error> {
        let entry_type = EntryType::parse(&row.entry_type)
            .ok_or_else(|| corrupt("ledger entry", row.id, "entry_type", &row.entry_type))?;

        Ok(Self {
            id: LedgerEntryId::from_uuid(row.id),
            transaction_id: PaymentId::from_uuid(row.transaction_id),
            entry_type,
            account_code: row.account_code,
            amount: row.amount,
            reverses: row.reverses.map(LedgerEntryId::from_uuid),
            created_at: utc(row.created_at),
        })
    }
}

impl TryFrom<refunds::Model> for Refund {
    type Error = StoreError;

    fn try_from(row: refunds::Model) -> Result<Self, Self::Error> {
        let method = RefundMethod::parse(&row.method)
            .ok_or_else(|| corrupt("refund", row.id, "method", &row.method))?;

        let proof = match (row.proof_key, row.proof_checksum) {
            (Some(key), Some(checksum_sha256)) => Some(ProofObject {
                key,
                checksum_sha256,
                content_type: row.proof_content_type.unwrap_or_default(),
                size: row
                    .proof_size
                    .and_then(|s| u64::try_from(s).ok())
                    .unwrap_or_default(),
            }),
            _ => None,
        };

        Ok(Self {
            id: RefundId::from_uuid(row.id),
            payment_id: PaymentId::from_uuid(row.payment_id),
            amount: row.amount,
            method,
            processor_refund_id: row.processor_refund_id,
            proof,
            actor_id: UserId::from_uuid(row.actor_id),
            reason: row.reason,
            created_at: utc(row.created_at),
        })
    }
}

impl From<refund_discrepancies::Model> for RefundDiscrepancy {
    fn from(row: refund_discrepancies::Model) -> Self {
        Self {
            id: row.id,
            payment_id: PaymentId::from_uuid(row.payment_id),
            amount: row.amount,
            processor_refund_id: row.processor_refund_id,
            detail: row.detail,
            created_at: utc(row.created_at),
            resolved_at: row.resolved_at.map(utc),
        }
    }
}
