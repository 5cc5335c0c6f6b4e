//! Refund scenarios against the in-memory store, processor and proof storage.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use clinipay_shared::config::{LedgerConfig, RefundConfig};
use clinipay_shared::types::{PaymentId, RefundId, UserId};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use super::coordinator::idempotency_key;
use super::*;
use crate::ledger::LedgerWriter;
use crate::locks::KeyedLocks;
use crate::payment::{
    BookingStatus, Payment, PaymentReconciler, PaymentStatus, ReconcileOutcome, RefundStatus,
};
use crate::processor::{
    CanonicalPayment, PaymentProcessor, ProcessorError, ProcessorRefund, ProcessorRefundRequest,
};
use crate::storage::{StorageError, UploadLimits, sha256_hex};
use crate::testing::{FailureMode, FakeProcessor, MemoryProofStore, MemoryStore};
use crate::webhook::{VerifiedEvent, WebhookAction};

const PDF: &[u8] = b"%PDF-1.7 transfer receipt";

struct Harness {
    store: Arc<MemoryStore>,
    processor: Arc<FakeProcessor>,
    proofs: Arc<MemoryProofStore>,
    coordinator: RefundCoordinator,
}

fn harness() -> Harness {
    let store = Arc::new(MemoryStore::new());
    let processor = Arc::new(FakeProcessor::new());
    let proofs = Arc::new(MemoryProofStore::new());
    let coordinator = RefundCoordinator::new(
        store.clone(),
        store.clone(),
        processor.clone(),
        proofs.clone(),
        UploadLimits::default(),
        RefundConfig::default(),
    );
    Harness {
        store,
        processor,
        proofs,
        coordinator,
    }
}

fn finance() -> Actor {
    Actor {
        user_id: UserId::new(),
        role: "finance".to_string(),
    }
}

fn patient() -> Actor {
    Actor {
        user_id: UserId::new(),
        role: "patient".to_string(),
    }
}

/// Seeds an approved, processor-linked payment with a confirmed booking.
fn approved(h: &Harness, gross: Decimal) -> Payment {
    seed_approved(&h.store, gross)
}

fn seed_approved(store: &MemoryStore, gross: Decimal) -> Payment {
    let (mut payment, mut booking) = store.seed(gross);
    payment.status = PaymentStatus::Approved;
    payment.processor_payment_id = Some(format!("mp-{}", payment.id));
    payment.approved_at = Some(Utc::now());
    booking.status = BookingStatus::Confirmed;
    store.insert_payment(payment.clone());
    store.insert_booking(booking);
    payment
}

fn processor_id(payment: &Payment) -> String {
    payment.processor_payment_id.clone().unwrap_or_default()
}

/// Registers the payment with the processor so it caps refunds at the
/// captured amount.
fn captured(h: &Harness, payment: &Payment) {
    h.processor
        .set_payment(&processor_id(payment), "approved", payment.gross_amount, None);
}

fn manual_request(payment_id: PaymentId, amount: Option<Decimal>) -> ManualRefundRequest {
    ManualRefundRequest {
        payment_id,
        amount,
        reason: Some("bank transfer".to_string()),
        cancel_booking: true,
        proof: ProofUpload {
            file_name: "receipt.pdf".to_string(),
            content_type: "application/pdf".to_string(),
            bytes: Bytes::from_static(PDF),
        },
    }
}

// ---------------------------------------------------------------------------
// Automated
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_full_automated_refund() {
    let h = harness();
    let payment = approved(&h, dec!(100.00));

    let refund = h
        .coordinator
        .refund_automated(payment.id, None, &finance())
        .await
        .unwrap();

    assert_eq!(refund.amount, dec!(100.00));
    assert_eq!(refund.method, RefundMethod::Automated);
    assert!(refund.processor_refund_id.is_some());

    let stored = h.store.payment(payment.id).unwrap();
    assert_eq!(stored.status, PaymentStatus::Refunded);
    assert_eq!(stored.refund_status, RefundStatus::Refunded);
    assert_eq!(stored.refunded_amount, dec!(100.00));
    assert_eq!(
        h.store.booking(payment.booking_id).unwrap().status,
        BookingStatus::Cancelled
    );
    assert_eq!(h.processor.issued_refunds(), 1);
}

#[tokio::test]
async fn test_partial_refunds_accumulate() {
    let h = harness();
    let payment = approved(&h, dec!(100.00));

    h.coordinator
        .refund_automated(payment.id, Some(dec!(40.00)), &finance())
        .await
        .unwrap();
    let stored = h.store.payment(payment.id).unwrap();
    assert_eq!(stored.status, PaymentStatus::Approved);
    assert_eq!(stored.refund_status, RefundStatus::Partial);
    assert_eq!(
        h.store.booking(payment.booking_id).unwrap().status,
        BookingStatus::Confirmed
    );

    h.coordinator
        .refund_automated(payment.id, None, &finance())
        .await
        .unwrap();
    let stored = h.store.payment(payment.id).unwrap();
    assert_eq!(stored.refunded_amount, dec!(100.00));
    assert_eq!(stored.status, PaymentStatus::Refunded);
    assert_eq!(h.processor.issued_refunds(), 2);
    assert_eq!(h.store.refunds().len(), 2);
}

#[tokio::test]
async fn test_refunding_a_refunded_payment_conflicts() {
    let h = harness();
    let payment = approved(&h, dec!(100.00));
    h.coordinator
        .refund_automated(payment.id, None, &finance())
        .await
        .unwrap();
    let before = h.store.payment(payment.id).unwrap();

    let err = h
        .coordinator
        .refund_automated(payment.id, None, &finance())
        .await
        .unwrap_err();

    assert!(matches!(err, RefundError::AlreadyRefunded(_)));
    assert_eq!(h.store.payment(payment.id).unwrap(), before);
    assert_eq!(h.processor.refund_calls(), 1);
}

#[tokio::test]
async fn test_gateway_failure_mutates_nothing_and_retry_refunds_once() {
    let h = harness();
    let payment = approved(&h, dec!(100.00));

    h.processor.set_failure(FailureMode::BadGateway);
    let err = h
        .coordinator
        .refund_automated(payment.id, None, &finance())
        .await
        .unwrap_err();
    assert!(matches!(err, RefundError::Gateway(_)));
    assert!(clinipay_shared::AppError::from(err).is_retryable());

    let stored = h.store.payment(payment.id).unwrap();
    assert_eq!(stored.status, PaymentStatus::Approved);
    assert_eq!(stored.refunded_amount, Decimal::ZERO);
    assert!(h.store.refunds().is_empty());

    h.processor.set_failure(FailureMode::Off);
    h.coordinator
        .refund_automated(payment.id, None, &finance())
        .await
        .unwrap();

    assert_eq!(h.processor.issued_refunds(), 1);
    assert_eq!(h.store.refunds().len(), 1);
}

#[tokio::test]
async fn test_commit_failure_records_discrepancy_and_blocks_refunds() {
    let h = harness();
    let payment = approved(&h, dec!(100.00));

    h.store.set_fail_refund_commit(true);
    let err = h
        .coordinator
        .refund_automated(payment.id, None, &finance())
        .await
        .unwrap_err();
    assert!(matches!(err, RefundError::CommitFailed { .. }));

    let discrepancies = h.store.discrepancies();
    assert_eq!(discrepancies.len(), 1);
    assert_eq!(discrepancies[0].amount, dec!(100.00));
    assert!(discrepancies[0].resolved_at.is_none());

    h.store.set_fail_refund_commit(false);
    let err = h
        .coordinator
        .refund_automated(payment.id, None, &finance())
        .await
        .unwrap_err();
    assert!(matches!(err, RefundError::OpenDiscrepancy(_)));

    let err = h
        .coordinator
        .refund_manual(manual_request(payment.id, None), &finance())
        .await
        .unwrap_err();
    assert!(matches!(err, RefundError::OpenDiscrepancy(_)));
    assert_eq!(h.proofs.accesses(), 0);
}

#[tokio::test]
async fn test_resolved_discrepancy_retry_reuses_processor_refund() {
    let h = harness();
    let payment = approved(&h, dec!(100.00));

    h.store.set_fail_refund_commit(true);
    let first = h
        .coordinator
        .refund_automated(payment.id, None, &finance())
        .await
        .unwrap_err();
    let RefundError::CommitFailed {
        processor_refund_id, ..
    } = first
    else {
        panic!("expected CommitFailed");
    };
    h.store.set_fail_refund_commit(false);

    let resolved = h
        .coordinator
        .resolve_discrepancy(payment.id, &finance())
        .await
        .unwrap();
    assert_eq!(resolved, 1);

    let refund = h
        .coordinator
        .refund_automated(payment.id, None, &finance())
        .await
        .unwrap();

    assert_eq!(refund.processor_refund_id, Some(processor_refund_id));
    assert_eq!(h.processor.issued_refunds(), 1);
}

#[tokio::test]
async fn test_partial_gateway_failure_retry_refunds_once() {
    let h = harness();
    let payment = approved(&h, dec!(100.00));
    captured(&h, &payment);

    h.processor.set_failure(FailureMode::BadGateway);
    let err = h
        .coordinator
        .refund_automated(payment.id, Some(dec!(40.00)), &finance())
        .await
        .unwrap_err();
    assert!(matches!(err, RefundError::Gateway(_)));

    h.processor.set_failure(FailureMode::Off);
    let refund = h
        .coordinator
        .refund_automated(payment.id, Some(dec!(40.00)), &finance())
        .await
        .unwrap();

    assert_eq!(refund.amount, dec!(40.00));
    assert_eq!(h.processor.issued_refunds(), 1);
    let stored = h.store.payment(payment.id).unwrap();
    assert_eq!(stored.refunded_amount, dec!(40.00));
    assert_eq!(stored.status, PaymentStatus::Approved);
    assert_eq!(stored.refund_status, RefundStatus::Partial);
}

#[tokio::test]
async fn test_lost_partial_refund_response_never_records_a_different_amount() {
    let h = harness();
    let payment = approved(&h, dec!(100.00));
    captured(&h, &payment);

    h.processor.set_failure(FailureMode::LostResponse);
    let err = h
        .coordinator
        .refund_automated(payment.id, Some(dec!(40.00)), &finance())
        .await
        .unwrap_err();
    assert!(matches!(err, RefundError::Gateway(_)));
    assert_eq!(h.processor.issued_refunds(), 1);
    assert!(h.store.refunds().is_empty());

    // A retry for the full amount is a different refund; the processor
    // refuses it because 40 already left.
    h.processor.set_failure(FailureMode::Off);
    let err = h
        .coordinator
        .refund_automated(payment.id, None, &finance())
        .await
        .unwrap_err();
    assert!(matches!(err, RefundError::Gateway(_)));
    assert_eq!(h.store.payment(payment.id).unwrap().refunded_amount, Decimal::ZERO);
    assert!(h.store.refunds().is_empty());

    // Repeating the original request replays the refund already issued.
    let refund = h
        .coordinator
        .refund_automated(payment.id, Some(dec!(40.00)), &finance())
        .await
        .unwrap();

    assert_eq!(refund.amount, dec!(40.00));
    assert_eq!(h.processor.issued_refunds(), 1);
    let stored = h.store.payment(payment.id).unwrap();
    assert_eq!(stored.refunded_amount, dec!(40.00));
    assert_eq!(stored.status, PaymentStatus::Approved);
}

#[tokio::test]
async fn test_resolved_partial_discrepancy_retry_reuses_processor_refund() {
    let h = harness();
    let payment = approved(&h, dec!(100.00));
    captured(&h, &payment);

    h.store.set_fail_refund_commit(true);
    let RefundError::CommitFailed {
        processor_refund_id, ..
    } = h
        .coordinator
        .refund_automated(payment.id, Some(dec!(40.00)), &finance())
        .await
        .unwrap_err()
    else {
        panic!("expected CommitFailed");
    };
    assert_eq!(h.store.discrepancies()[0].amount, dec!(40.00));
    h.store.set_fail_refund_commit(false);

    h.coordinator
        .resolve_discrepancy(payment.id, &finance())
        .await
        .unwrap();

    let refund = h
        .coordinator
        .refund_automated(payment.id, Some(dec!(40.00)), &finance())
        .await
        .unwrap();

    assert_eq!(refund.processor_refund_id, Some(processor_refund_id));
    assert_eq!(refund.amount, dec!(40.00));
    assert_eq!(h.processor.issued_refunds(), 1);
    let stored = h.store.payment(payment.id).unwrap();
    assert_eq!(stored.refunded_amount, dec!(40.00));
    assert_eq!(stored.status, PaymentStatus::Approved);
    assert_eq!(stored.refund_status, RefundStatus::Partial);
}

#[tokio::test]
async fn test_processor_amount_mismatch_records_discrepancy_without_commit() {
    let h = harness();
    let payment = approved(&h, dec!(100.00));

    // The processor answers the full-refund key with a 40 refund.
    h.processor
        .refund(&ProcessorRefundRequest {
            processor_payment_id: processor_id(&payment),
            amount: dec!(40.00),
            idempotency_key: idempotency_key(&payment, dec!(100.00)),
        })
        .await
        .unwrap();

    let err = h
        .coordinator
        .refund_automated(payment.id, None, &finance())
        .await
        .unwrap_err();
    assert!(matches!(err, RefundError::CommitFailed { .. }));

    let discrepancies = h.store.discrepancies();
    assert_eq!(discrepancies.len(), 1);
    assert_eq!(discrepancies[0].amount, dec!(40.00));
    assert!(h.store.refunds().is_empty());

    let stored = h.store.payment(payment.id).unwrap();
    assert_eq!(stored.status, PaymentStatus::Approved);
    assert_eq!(stored.refunded_amount, Decimal::ZERO);
    assert_eq!(h.processor.issued_refunds(), 1);
}

/// Processor whose refund notification reaches the store before the refund
/// call returns.
struct SettlingProcessor {
    inner: Arc<FakeProcessor>,
    store: Arc<MemoryStore>,
    payment_id: PaymentId,
}

#[async_trait]
impl PaymentProcessor for SettlingProcessor {
    async fn fetch_payment(
        &self,
        processor_payment_id: &str,
    ) -> Result<CanonicalPayment, ProcessorError> {
        self.inner.fetch_payment(processor_payment_id).await
    }

    async fn refund(
        &self,
        request: &ProcessorRefundRequest,
    ) -> Result<ProcessorRefund, ProcessorError> {
        let issued = self.inner.refund(request).await?;
        if let Some(mut payment) = self.store.payment(self.payment_id) {
            payment.status = PaymentStatus::Refunded;
            payment.refund_status = RefundStatus::Refunded;
            payment.refunded_amount = payment.gross_amount;
            self.store.insert_payment(payment);
        }
        Ok(issued)
    }
}

#[tokio::test]
async fn test_refund_settled_by_notification_mid_flight_is_recorded() {
    let store = Arc::new(MemoryStore::new());
    let inner = Arc::new(FakeProcessor::new());
    let payment = seed_approved(&store, dec!(100.00));
    let coordinator = RefundCoordinator::new(
        store.clone(),
        store.clone(),
        Arc::new(SettlingProcessor {
            inner: inner.clone(),
            store: store.clone(),
            payment_id: payment.id,
        }),
        Arc::new(MemoryProofStore::new()),
        UploadLimits::default(),
        RefundConfig::default(),
    );

    let refund = coordinator
        .refund_automated(payment.id, None, &finance())
        .await
        .unwrap();

    assert_eq!(store.refunds(), vec![refund]);
    assert!(store.discrepancies().is_empty());
    assert_eq!(store.payment(payment.id).unwrap().status, PaymentStatus::Refunded);
    assert_eq!(inner.issued_refunds(), 1);
}

#[tokio::test]
async fn test_concurrent_refund_and_refund_notification_stay_consistent() {
    for round in 0..16 {
        let store = Arc::new(MemoryStore::new());
        let processor = Arc::new(FakeProcessor::new());
        let locks = Arc::new(KeyedLocks::new());
        let payment = seed_approved(&store, dec!(100.00));
        let mp = processor_id(&payment);
        processor.set_payment(&mp, "refunded", dec!(100.00), None);

        let reconciler = Arc::new(
            PaymentReconciler::new(
                store.clone(),
                store.clone(),
                processor.clone(),
                LedgerWriter::new(store.clone(), LedgerConfig::default()),
            )
            .with_locks(locks.clone()),
        );
        let coordinator = Arc::new(
            RefundCoordinator::new(
                store.clone(),
                store.clone(),
                processor.clone(),
                Arc::new(MemoryProofStore::new()),
                UploadLimits::default(),
                RefundConfig::default(),
            )
            .with_locks(locks),
        );

        let notification = tokio::spawn({
            let reconciler = reconciler.clone();
            let event = VerifiedEvent {
                action: WebhookAction::Updated,
                processor_payment_id: mp.clone(),
                request_id: format!("req-{round}"),
                signed_at: Utc::now(),
            };
            async move { reconciler.reconcile(&event).await }
        });
        let refund = tokio::spawn({
            let coordinator = coordinator.clone();
            let payment_id = payment.id;
            async move {
                coordinator
                    .refund_automated(payment_id, None, &finance())
                    .await
            }
        });

        let outcome = notification.await.unwrap().unwrap();
        assert!(matches!(
            outcome,
            ReconcileOutcome::Applied { .. } | ReconcileOutcome::AlreadyApplied { .. }
        ));
        match refund.await.unwrap() {
            Ok(refund) => assert_eq!(refund.amount, dec!(100.00)),
            Err(err) => assert!(matches!(err, RefundError::AlreadyRefunded(_)), "{err}"),
        }

        assert!(store.discrepancies().is_empty());
        assert_eq!(store.refunds().len(), processor.issued_refunds());
        let stored = store.payment(payment.id).unwrap();
        assert_eq!(stored.status, PaymentStatus::Refunded);
        assert_eq!(stored.refunded_amount, dec!(100.00));
    }
}

#[tokio::test]
async fn test_automated_refund_requires_allowed_role() {
    let h = harness();
    let payment = approved(&h, dec!(100.00));

    let err = h
        .coordinator
        .refund_automated(payment.id, None, &patient())
        .await
        .unwrap_err();

    assert!(matches!(err, RefundError::Forbidden(_)));
    assert_eq!(h.processor.refund_calls(), 0);
}

#[tokio::test]
async fn test_automated_refund_rejects_unrefundable_payments() {
    let h = harness();
    let (pending, _) = h.store.seed(dec!(100.00));

    let err = h
        .coordinator
        .refund_automated(pending.id, None, &finance())
        .await
        .unwrap_err();
    assert!(matches!(err, RefundError::NotRefundable { .. }));

    let mut unlinked = approved(&h, dec!(10.00));
    unlinked.processor_payment_id = None;
    h.store.insert_payment(unlinked.clone());
    let err = h
        .coordinator
        .refund_automated(unlinked.id, None, &finance())
        .await
        .unwrap_err();
    assert!(matches!(err, RefundError::NotLinked(_)));

    let err = h
        .coordinator
        .refund_automated(PaymentId::new(), None, &finance())
        .await
        .unwrap_err();
    assert!(matches!(err, RefundError::PaymentNotFound(_)));

    let linked = approved(&h, dec!(10.00));
    let err = h
        .coordinator
        .refund_automated(linked.id, Some(dec!(10.01)), &finance())
        .await
        .unwrap_err();
    assert!(matches!(err, RefundError::InvalidAmount(_)));
    assert_eq!(h.processor.refund_calls(), 0);
}

// ---------------------------------------------------------------------------
// Manual
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_manual_refund_stores_proof_and_returns_short_lived_url() {
    let h = harness();
    let payment = approved(&h, dec!(100.00));

    let signed = h
        .coordinator
        .refund_manual(manual_request(payment.id, Some(dec!(30.00))), &finance())
        .await
        .unwrap();

    assert!(!signed.signed_url.is_empty());
    let ttl = (signed.expires_at - Utc::now()).num_seconds();
    assert!((290..=300).contains(&ttl), "ttl was {ttl}");

    let proof = signed.refund.proof.clone().unwrap();
    assert_eq!(proof.checksum_sha256, sha256_hex(PDF));
    assert_eq!(
        proof.key,
        format!("refunds/{}/{}/receipt.pdf", payment.id, signed.refund.id)
    );
    assert_eq!(h.proofs.keys(), vec![proof.key]);

    let stored = h.store.payment(payment.id).unwrap();
    assert_eq!(stored.refund_status, RefundStatus::Partial);
    assert_eq!(stored.refunded_amount, dec!(30.00));
    assert_eq!(
        h.store.booking(payment.booking_id).unwrap().status,
        BookingStatus::Cancelled
    );
    assert_eq!(h.processor.refund_calls(), 0);
}

#[tokio::test]
async fn test_manual_refund_forbidden_touches_no_storage() {
    let h = harness();
    let payment = approved(&h, dec!(100.00));

    let err = h
        .coordinator
        .refund_manual(manual_request(payment.id, None), &patient())
        .await
        .unwrap_err();

    assert!(matches!(err, RefundError::Forbidden(_)));
    assert_eq!(h.proofs.accesses(), 0);
    assert!(h.store.refunds().is_empty());
}

#[tokio::test]
async fn test_manual_refund_rejects_disallowed_upload() {
    let h = harness();
    let payment = approved(&h, dec!(100.00));

    let mut request = manual_request(payment.id, None);
    request.proof.content_type = "application/x-msdownload".to_string();
    let err = h
        .coordinator
        .refund_manual(request, &finance())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        RefundError::Storage(StorageError::InvalidMimeType { .. })
    ));

    let mut request = manual_request(payment.id, None);
    request.proof.bytes = Bytes::new();
    let err = h
        .coordinator
        .refund_manual(request, &finance())
        .await
        .unwrap_err();
    assert!(matches!(err, RefundError::Storage(StorageError::EmptyFile)));
    assert_eq!(h.proofs.accesses(), 0);
}

#[tokio::test]
async fn test_manual_refund_discards_proof_when_presign_fails() {
    let h = harness();
    let payment = approved(&h, dec!(100.00));
    h.proofs.set_fail_presign(true);

    let err = h
        .coordinator
        .refund_manual(manual_request(payment.id, None), &finance())
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        RefundError::Storage(StorageError::PresignNotSupported)
    ));
    assert!(h.proofs.keys().is_empty());
    assert!(h.store.refunds().is_empty());
}

#[tokio::test]
async fn test_manual_refund_discards_proof_when_commit_fails() {
    let h = harness();
    let payment = approved(&h, dec!(100.00));
    h.store.set_fail_refund_commit(true);

    let err = h
        .coordinator
        .refund_manual(manual_request(payment.id, None), &finance())
        .await
        .unwrap_err();

    assert!(matches!(err, RefundError::Store(_)));
    assert!(h.proofs.keys().is_empty());
    assert_eq!(
        h.store.payment(payment.id).unwrap().refunded_amount,
        Decimal::ZERO
    );
}

#[tokio::test]
async fn test_manual_refund_storage_outage_mutates_nothing() {
    let h = harness();
    let payment = approved(&h, dec!(100.00));
    h.proofs.set_fail_put(true);

    let err = h
        .coordinator
        .refund_manual(manual_request(payment.id, None), &finance())
        .await
        .unwrap_err();

    assert!(matches!(err, RefundError::Storage(StorageError::Operation(_))));
    assert!(h.store.refunds().is_empty());
}

#[tokio::test]
async fn test_proof_url_authorizes_before_lookup() {
    let h = harness();
    let payment = approved(&h, dec!(100.00));
    let signed = h
        .coordinator
        .refund_manual(manual_request(payment.id, None), &finance())
        .await
        .unwrap();
    let accesses = h.proofs.accesses();

    let err = h
        .coordinator
        .proof_url(signed.refund.id, &patient())
        .await
        .unwrap_err();
    assert!(matches!(err, RefundError::Forbidden(_)));
    assert_eq!(h.proofs.accesses(), accesses);

    let err = h
        .coordinator
        .proof_url(RefundId::new(), &patient())
        .await
        .unwrap_err();
    assert!(matches!(err, RefundError::Forbidden(_)));

    let fresh = h
        .coordinator
        .proof_url(signed.refund.id, &finance())
        .await
        .unwrap();
    assert_eq!(fresh.refund.id, signed.refund.id);
    assert!(fresh.expires_at > Utc::now());
}

#[tokio::test]
async fn test_proof_url_not_found_cases() {
    let h = harness();
    let payment = approved(&h, dec!(100.00));

    let err = h
        .coordinator
        .proof_url(RefundId::new(), &finance())
        .await
        .unwrap_err();
    assert!(matches!(err, RefundError::RefundNotFound(_)));

    let automated = h
        .coordinator
        .refund_automated(payment.id, Some(dec!(10)), &finance())
        .await
        .unwrap();
    let err = h
        .coordinator
        .proof_url(automated.id, &finance())
        .await
        .unwrap_err();
    assert!(matches!(err, RefundError::ProofMissing(_)));
}

#[tokio::test]
async fn test_verify_proof_detects_tampering() {
    let h = harness();
    let payment = approved(&h, dec!(100.00));
    let signed = h
        .coordinator
        .refund_manual(manual_request(payment.id, None), &finance())
        .await
        .unwrap();
    let refund_id = signed.refund.id;

    let check = h.coordinator.verify_proof(refund_id, &finance()).await.unwrap();
    assert!(check.intact);

    let key = signed.refund.proof.unwrap().key;
    h.proofs.tamper(&key, Bytes::from_static(b"%PDF-1.7 edited"));
    let check = h.coordinator.verify_proof(refund_id, &finance()).await.unwrap();
    assert!(!check.intact);
}

#[tokio::test]
async fn test_list_refunds() {
    let h = harness();
    let payment = approved(&h, dec!(100.00));
    h.coordinator
        .refund_automated(payment.id, Some(dec!(10)), &finance())
        .await
        .unwrap();
    h.coordinator
        .refund_manual(manual_request(payment.id, Some(dec!(20))), &finance())
        .await
        .unwrap();

    let refunds = h
        .coordinator
        .list_refunds(payment.id, &finance())
        .await
        .unwrap();
    assert_eq!(refunds.len(), 2);
    assert_eq!(refunds[0].method, RefundMethod::Automated);
    assert_eq!(refunds[1].method, RefundMethod::Manual);

    let err = h
        .coordinator
        .list_refunds(payment.id, &patient())
        .await
        .unwrap_err();
    assert!(matches!(err, RefundError::Forbidden(_)));
}
