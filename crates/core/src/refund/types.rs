//! Refund records.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use clinipay_shared::types::{PaymentId, RefundId, UserId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::payment::{BookingTransition, PaymentStatus, RefundStatus};

/// Who is issuing a refund operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    /// Authenticated user.
    pub user_id: UserId,
    /// Role claimed by the bearer token.
    pub role: String,
}

/// How a refund was executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RefundMethod {
    /// Issued through the processor API.
    Automated,
    /// Issued outside the processor and backed by a proof document.
    Manual,
}

impl RefundMethod {
    /// Database and wire name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Automated => "automated",
            Self::Manual => "manual",
        }
    }

    /// Parses a stored method.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "automated" => Some(Self::Automated),
            "manual" => Some(Self::Manual),
            _ => None,
        }
    }
}

/// A stored proof document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofObject {
    /// Object storage key.
    pub key: String,
    /// Hex SHA-256 of the document as uploaded.
    pub checksum_sha256: String,
    /// MIME type.
    pub content_type: String,
    /// Size in bytes.
    pub size: u64,
}

/// A committed refund.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Refund {
    /// Refund id.
    pub id: RefundId,
    /// Refunded payment.
    pub payment_id: PaymentId,
    /// Amount returned.
    pub amount: Decimal,
    /// Execution method.
    pub method: RefundMethod,
    /// Processor refund id, for automated refunds.
    pub processor_refund_id: Option<String>,
    /// Proof document, for manual refunds.
    pub proof: Option<ProofObject>,
    /// Who issued the refund.
    pub actor_id: UserId,
    /// Free-text reason.
    pub reason: Option<String>,
    /// Commit time.
    pub created_at: DateTime<Utc>,
}

/// Atomic refund commit.
///
/// Applied only if the payment is still approved and its refunded amount
/// still equals `expected_refunded_amount`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefundCommit {
    /// Refund record to insert.
    pub refund: Refund,
    /// Refunded amount the commit was computed from.
    pub expected_refunded_amount: Decimal,
    /// Refunded amount after the commit.
    pub new_refunded_amount: Decimal,
    /// Payment status after the commit.
    pub status: PaymentStatus,
    /// Refund status after the commit.
    pub refund_status: RefundStatus,
    /// Booking side effect.
    pub booking: Option<BookingTransition>,
}

/// A processor-confirmed refund whose local commit failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefundDiscrepancy {
    /// Record id.
    pub id: Uuid,
    /// Affected payment.
    pub payment_id: PaymentId,
    /// Amount refunded by the processor.
    pub amount: Decimal,
    /// Processor refund id.
    pub processor_refund_id: String,
    /// What went wrong locally.
    pub detail: String,
    /// When the discrepancy was recorded.
    pub created_at: DateTime<Utc>,
    /// When it was reconciled by hand.
    pub resolved_at: Option<DateTime<Utc>>,
}

/// An uploaded proof document.
#[derive(Debug, Clone)]
pub struct ProofUpload {
    /// Original file name.
    pub file_name: String,
    /// Declared MIME type.
    pub content_type: String,
    /// File content.
    pub bytes: Bytes,
}

/// Input for a manual refund.
#[derive(Debug, Clone)]
pub struct ManualRefundRequest {
    /// Payment to refund.
    pub payment_id: PaymentId,
    /// Amount, defaults to the remaining refundable amount.
    pub amount: Option<Decimal>,
    /// Free-text reason.
    pub reason: Option<String>,
    /// Whether to cancel the booking.
    pub cancel_booking: bool,
    /// Proof document.
    pub proof: ProofUpload,
}

/// A refund together with a time-limited URL to its proof.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SignedProof {
    /// The refund.
    pub refund: Refund,
    /// Presigned read URL.
    pub signed_url: String,
    /// URL expiry.
    pub expires_at: DateTime<Utc>,
}

/// Result of re-checking a stored proof.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProofVerification {
    /// Refund checked.
    pub refund_id: RefundId,
    /// Whether the stored object still matches its checksum.
    pub intact: bool,
}
