//! In-memory doubles for the storage, processor and proof seams.
//!
//! Used by this crate's tests and, behind the `testing` feature, by the API
//! crate's router tests.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use clinipay_shared::types::{BookingId, PaymentId, RefundId};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::ledger::{AppendOutcome, LedgerEntry, LedgerFilter, LedgerStore};
use crate::payment::{
    Booking, BookingStatus, BookingTransition, Payment, PaymentStatus, PaymentStore,
    PaymentTransition, ProcessedEvent, ProcessedEventStore,
};
use crate::processor::{
    CanonicalPayment, PaymentProcessor, ProcessorError, ProcessorRefund, ProcessorRefundRequest,
};
use crate::refund::{Refund, RefundCommit, RefundDiscrepancy, RefundStore};
use crate::storage::{PresignedUrl, ProofStore, StorageError};
use crate::store::StoreError;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn apply_booking(bookings: &mut HashMap<BookingId, Booking>, transition: &BookingTransition) -> bool {
    match bookings.get_mut(&transition.booking_id) {
        Some(booking) if transition.from.contains(&booking.status) => {
            booking.status = transition.to;
            true
        }
        _ => false,
    }
}

#[derive(Debug, Default)]
struct State {
    payments: HashMap<PaymentId, Payment>,
    bookings: HashMap<BookingId, Booking>,
    events: HashMap<String, ProcessedEvent>,
    ledger: Vec<LedgerEntry>,
    refunds: Vec<Refund>,
    discrepancies: Vec<RefundDiscrepancy>,
}

/// Single in-memory store implementing every persistence seam.
///
/// Writes that the database performs in one transaction happen under one
/// mutex acquisition here.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<State>,
    fail_refund_commit: AtomicBool,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a pending booking and its pending payment.
    pub fn seed(&self, gross_amount: Decimal) -> (Payment, Booking) {
        let booking = Booking {
            id: BookingId::new(),
            status: BookingStatus::Pending,
            professional_id: Uuid::now_v7(),
            service_id: Uuid::now_v7(),
        };
        let payment = Payment::pending(booking.id, gross_amount);
        self.insert_booking(booking.clone());
        self.insert_payment(payment.clone());
        (payment, booking)
    }

    /// Inserts or replaces a payment.
    pub fn insert_payment(&self, payment: Payment) {
        lock(&self.state).payments.insert(payment.id, payment);
    }

    /// Inserts or replaces a booking.
    pub fn insert_booking(&self, booking: Booking) {
        lock(&self.state).bookings.insert(booking.id, booking);
    }

    /// Current copy of a payment.
    #[must_use]
    pub fn payment(&self, id: PaymentId) -> Option<Payment> {
        lock(&self.state).payments.get(&id).cloned()
    }

    /// Current copy of a booking.
    #[must_use]
    pub fn booking(&self, id: BookingId) -> Option<Booking> {
        lock(&self.state).bookings.get(&id).cloned()
    }

    /// Every ledger entry, in insertion order.
    #[must_use]
    pub fn ledger_entries(&self) -> Vec<LedgerEntry> {
        lock(&self.state).ledger.clone()
    }

    /// Every committed refund.
    #[must_use]
    pub fn refunds(&self) -> Vec<Refund> {
        lock(&self.state).refunds.clone()
    }

    /// Every recorded discrepancy.
    #[must_use]
    pub fn discrepancies(&self) -> Vec<RefundDiscrepancy> {
        lock(&self.state).discrepancies.clone()
    }

    /// Number of processed-notification markers.
    #[must_use]
    pub fn processed_count(&self) -> usize {
        lock(&self.state).events.len()
    }

    /// Makes `commit_refund` fail with a database error.
    pub fn set_fail_refund_commit(&self, fail: bool) {
        self.fail_refund_commit.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl PaymentStore for MemoryStore {
    async fn find_payment(&self, id: PaymentId) -> Result<Option<Payment>, StoreError> {
        Ok(self.payment(id))
    }

    async fn find_by_processor_id(
        &self,
        processor_payment_id: &str,
    ) -> Result<Option<Payment>, StoreError> {
        Ok(lock(&self.state)
            .payments
            .values()
            .find(|p| p.processor_payment_id.as_deref() == Some(processor_payment_id))
            .cloned())
    }

    async fn find_by_booking(&self, booking_id: BookingId) -> Result<Option<Payment>, StoreError> {
        Ok(lock(&self.state)
            .payments
            .values()
            .find(|p| p.booking_id == booking_id)
            .cloned())
    }

    async fn link_processor_id(
        &self,
        id: PaymentId,
        processor_payment_id: &str,
    ) -> Result<bool, StoreError> {
        let mut state = lock(&self.state);
        let taken = state
            .payments
            .values()
            .any(|p| p.processor_payment_id.as_deref() == Some(processor_payment_id));
        match state.payments.get_mut(&id) {
            Some(payment) if payment.processor_payment_id.is_none() && !taken => {
                payment.processor_payment_id = Some(processor_payment_id.to_string());
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn apply_transition(&self, transition: &PaymentTransition) -> Result<bool, StoreError> {
        let mut state = lock(&self.state);
        let Some(payment) = state.payments.get_mut(&transition.payment_id) else {
            return Ok(false);
        };
        if payment.status != transition.from {
            return Ok(false);
        }

        payment.status = transition.to;
        payment.updated_at = transition.at;
        if transition.to == PaymentStatus::Approved {
            payment.approved_at = Some(transition.at);
        }
        if let Some((refund_status, refunded_amount)) = transition.refund {
            payment.refund_status = refund_status;
            payment.refunded_amount = refunded_amount;
        }
        if let Some(booking) = &transition.booking {
            apply_booking(&mut state.bookings, booking);
        }
        Ok(true)
    }

    async fn find_booking(&self, id: BookingId) -> Result<Option<Booking>, StoreError> {
        Ok(self.booking(id))
    }

    async fn transition_booking(&self, transition: &BookingTransition) -> Result<bool, StoreError> {
        Ok(apply_booking(&mut lock(&self.state).bookings, transition))
    }
}

#[async_trait]
impl ProcessedEventStore for MemoryStore {
    async fn is_processed(&self, request_id: &str) -> Result<bool, StoreError> {
        Ok(lock(&self.state).events.contains_key(request_id))
    }

    async fn mark_processed(&self, event: &ProcessedEvent) -> Result<bool, StoreError> {
        let mut state = lock(&self.state);
        if state.events.contains_key(&event.request_id) {
            return Ok(false);
        }
        state.events.insert(event.request_id.clone(), event.clone());
        Ok(true)
    }
}

#[async_trait]
impl LedgerStore for MemoryStore {
    async fn append_balanced(&self, entries: &[LedgerEntry]) -> Result<AppendOutcome, StoreError> {
        let mut state = lock(&self.state);
        let existing: HashSet<_> = state
            .ledger
            .iter()
            .map(|e| (e.transaction_id, e.account_code.clone(), e.entry_type))
            .collect();

        let fresh: Vec<LedgerEntry> = entries
            .iter()
            .filter(|e| !existing.contains(&(e.transaction_id, e.account_code.clone(), e.entry_type)))
            .cloned()
            .collect();

        if fresh.is_empty() {
            return Ok(AppendOutcome::AlreadyPresent);
        }
        let inserted = fresh.len();
        state.ledger.extend(fresh);
        Ok(AppendOutcome::Inserted(inserted))
    }

    async fn list_entries(&self, filter: &LedgerFilter) -> Result<Vec<LedgerEntry>, StoreError> {
        let mut entries: Vec<LedgerEntry> = lock(&self.state)
            .ledger
            .iter()
            .filter(|e| filter.matches(e.entry_type, &e.account_code, e.created_at))
            .cloned()
            .collect();
        entries.sort_by_key(|e| e.created_at);
        Ok(entries)
    }
}

#[async_trait]
impl RefundStore for MemoryStore {
    async fn commit_refund(&self, commit: &RefundCommit) -> Result<bool, StoreError> {
        if self.fail_refund_commit.load(Ordering::SeqCst) {
            return Err(StoreError::database("connection reset"));
        }

        let mut state = lock(&self.state);
        let Some(payment) = state.payments.get_mut(&commit.refund.payment_id) else {
            return Ok(false);
        };
        if payment.status != PaymentStatus::Approved
            || payment.refunded_amount != commit.expected_refunded_amount
        {
            return Ok(false);
        }

        payment.status = commit.status;
        payment.refund_status = commit.refund_status;
        payment.refunded_amount = commit.new_refunded_amount;
        payment.updated_at = commit.refund.created_at;

        if let Some(booking) = &commit.booking {
            apply_booking(&mut state.bookings, booking);
        }
        state.refunds.push(commit.refund.clone());
        Ok(true)
    }

    async fn record_settled_refund(&self, refund: &Refund) -> Result<bool, StoreError> {
        let mut state = lock(&self.state);
        let settled = state
            .payments
            .get(&refund.payment_id)
            .is_some_and(|p| p.status == PaymentStatus::Refunded);
        if settled {
            state.refunds.push(refund.clone());
        }
        Ok(settled)
    }

    async fn find_refund(&self, id: RefundId) -> Result<Option<Refund>, StoreError> {
        Ok(lock(&self.state).refunds.iter().find(|r| r.id == id).cloned())
    }

    async fn list_refunds(&self, payment_id: PaymentId) -> Result<Vec<Refund>, StoreError> {
        Ok(lock(&self.state)
            .refunds
            .iter()
            .filter(|r| r.payment_id == payment_id)
            .cloned()
            .collect())
    }

    async fn record_discrepancy(&self, discrepancy: &RefundDiscrepancy) -> Result<(), StoreError> {
        lock(&self.state).discrepancies.push(discrepancy.clone());
        Ok(())
    }

    async fn open_discrepancies(
        &self,
        payment_id: PaymentId,
    ) -> Result<Vec<RefundDiscrepancy>, StoreError> {
        Ok(lock(&self.state)
            .discrepancies
            .iter()
            .filter(|d| d.payment_id == payment_id && d.resolved_at.is_none())
            .cloned()
            .collect())
    }

    async fn resolve_discrepancies(
        &self,
        payment_id: PaymentId,
        at: DateTime<Utc>,
    ) -> Result<u64, StoreError> {
        let mut resolved = 0;
        for d in &mut lock(&self.state).discrepancies {
            if d.payment_id == payment_id && d.resolved_at.is_none() {
                d.resolved_at = Some(at);
                resolved += 1;
            }
        }
        Ok(resolved)
    }
}

/// How the fake processor fails when failure is switched on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureMode {
    /// Answer normally.
    Off,
    /// Time out.
    Timeout,
    /// Answer with a 502.
    BadGateway,
    /// Issue refunds but time out before answering.
    LostResponse,
}

/// Scriptable processor.
///
/// Refunds are idempotent by key, like the real processor.
#[derive(Debug)]
pub struct FakeProcessor {
    payments: Mutex<HashMap<String, CanonicalPayment>>,
    /// Issued refunds by idempotency key, with their processor payment id.
    refunds: Mutex<HashMap<String, (String, ProcessorRefund)>>,
    failure: Mutex<FailureMode>,
    fetch_calls: AtomicUsize,
    refund_calls: AtomicUsize,
}

impl Default for FakeProcessor {
    fn default() -> Self {
        Self {
            payments: Mutex::default(),
            refunds: Mutex::default(),
            failure: Mutex::new(FailureMode::Off),
            fetch_calls: AtomicUsize::new(0),
            refund_calls: AtomicUsize::new(0),
        }
    }
}

impl FakeProcessor {
    /// Creates a processor with no payments.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the canonical record for a processor payment id.
    pub fn set_payment(
        &self,
        id: &str,
        status: &str,
        amount: Decimal,
        external_reference: Option<String>,
    ) {
        lock(&self.payments).insert(
            id.to_string(),
            CanonicalPayment {
                id: id.to_string(),
                status: status.to_string(),
                transaction_amount: amount,
                external_reference,
            },
        );
    }

    /// Switches failure injection.
    pub fn set_failure(&self, mode: FailureMode) {
        *lock(&self.failure) = mode;
    }

    /// Number of `fetch_payment` calls so far.
    #[must_use]
    pub fn fetch_calls(&self) -> usize {
        self.fetch_calls.load(Ordering::SeqCst)
    }

    /// Number of `refund` calls so far.
    #[must_use]
    pub fn refund_calls(&self) -> usize {
        self.refund_calls.load(Ordering::SeqCst)
    }

    /// Number of distinct refunds the processor actually issued.
    #[must_use]
    pub fn issued_refunds(&self) -> usize {
        lock(&self.refunds).len()
    }

    fn check_failure(&self) -> Result<(), ProcessorError> {
        match *lock(&self.failure) {
            FailureMode::Off | FailureMode::LostResponse => Ok(()),
            FailureMode::Timeout => Err(ProcessorError::Timeout),
            FailureMode::BadGateway => Err(ProcessorError::Rejected {
                status: 502,
                message: "bad gateway".to_string(),
            }),
        }
    }
}

#[async_trait]
impl PaymentProcessor for FakeProcessor {
    async fn fetch_payment(
        &self,
        processor_payment_id: &str,
    ) -> Result<CanonicalPayment, ProcessorError> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        self.check_failure()?;
        lock(&self.payments)
            .get(processor_payment_id)
            .cloned()
            .ok_or_else(|| ProcessorError::Rejected {
                status: 404,
                message: format!("payment {processor_payment_id} not found"),
            })
    }

    async fn refund(
        &self,
        request: &ProcessorRefundRequest,
    ) -> Result<ProcessorRefund, ProcessorError> {
        self.refund_calls.fetch_add(1, Ordering::SeqCst);
        self.check_failure()?;

        let refund = {
            let mut refunds = lock(&self.refunds);
            if let Some((_, replayed)) = refunds.get(&request.idempotency_key) {
                replayed.clone()
            } else {
                let captured = lock(&self.payments)
                    .get(&request.processor_payment_id)
                    .map(|p| p.transaction_amount);
                let refunded: Decimal = refunds
                    .values()
                    .filter(|(id, _)| *id == request.processor_payment_id)
                    .map(|(_, r)| r.amount)
                    .sum();
                if captured.is_some_and(|captured| refunded + request.amount > captured) {
                    return Err(ProcessorError::Rejected {
                        status: 400,
                        message: "refund exceeds the captured amount".to_string(),
                    });
                }

                let issued = ProcessorRefund {
                    id: format!("re_{}", Uuid::now_v7().simple()),
                    amount: request.amount,
                    status: "approved".to_string(),
                };
                refunds.insert(
                    request.idempotency_key.clone(),
                    (request.processor_payment_id.clone(), issued.clone()),
                );
                issued
            }
        };

        if *lock(&self.failure) == FailureMode::LostResponse {
            return Err(ProcessorError::Timeout);
        }
        Ok(refund)
    }
}

/// In-memory proof storage that can mint URLs.
#[derive(Debug, Default)]
pub struct MemoryProofStore {
    objects: Mutex<HashMap<String, Bytes>>,
    accesses: AtomicUsize,
    fail_put: AtomicBool,
    fail_presign: AtomicBool,
}

impl MemoryProofStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of calls of any kind.
    #[must_use]
    pub fn accesses(&self) -> usize {
        self.accesses.load(Ordering::SeqCst)
    }

    /// Stored object keys.
    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        lock(&self.objects).keys().cloned().collect()
    }

    /// Overwrites an object in place.
    pub fn tamper(&self, key: &str, bytes: Bytes) {
        lock(&self.objects).insert(key.to_string(), bytes);
    }

    /// Makes `put` fail.
    pub fn set_fail_put(&self, fail: bool) {
        self.fail_put.store(fail, Ordering::SeqCst);
    }

    /// Makes `presign_read` fail.
    pub fn set_fail_presign(&self, fail: bool) {
        self.fail_presign.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl ProofStore for MemoryProofStore {
    async fn put(&self, key: &str, bytes: Bytes, _content_type: &str) -> Result<(), StorageError> {
        self.accesses.fetch_add(1, Ordering::SeqCst);
        if self.fail_put.load(Ordering::SeqCst) {
            return Err(StorageError::operation("bucket unavailable"));
        }
        lock(&self.objects).insert(key.to_string(), bytes);
        Ok(())
    }

    async fn read(&self, key: &str) -> Result<Bytes, StorageError> {
        self.accesses.fetch_add(1, Ordering::SeqCst);
        lock(&self.objects)
            .get(key)
            .cloned()
            .ok_or_else(|| StorageError::not_found(key))
    }

    async fn presign_read(&self, key: &str, ttl: Duration) -> Result<PresignedUrl, StorageError> {
        self.accesses.fetch_add(1, Ordering::SeqCst);
        if self.fail_presign.load(Ordering::SeqCst) {
            return Err(StorageError::PresignNotSupported);
        }
        let lifetime =
            chrono::Duration::from_std(ttl).map_err(|e| StorageError::configuration(e.to_string()))?;
        Ok(PresignedUrl {
            url: format!("memory://{key}?expires={}", ttl.as_secs()),
            method: "GET".to_string(),
            expires_at: Utc::now() + lifetime,
        })
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        self.accesses.fetch_add(1, Ordering::SeqCst);
        lock(&self.objects).remove(key);
        Ok(())
    }
}
