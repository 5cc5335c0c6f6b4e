//! Exactly-once ledger writer for approved payments.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use clinipay_shared::config::LedgerConfig;
use rust_decimal::Decimal;
use tracing::{debug, info};

use super::entry::{EntryType, LedgerEntry};
use super::error::LedgerError;
use super::split::RevenueSplit;
use super::store::{AppendOutcome, LedgerStore};
use super::types::{LedgerFilter, LedgerWriteOutcome, TransactionTotals};
use crate::payment::Payment;

/// Validates that a set of entries forms one balanced transaction.
///
/// 1. At least 2 entries
/// 2. A single transaction id
/// 3. No negative amounts
/// 4. Sum of debits equals sum of credits
pub fn validate_balanced(entries: &[LedgerEntry]) -> Result<TransactionTotals, LedgerError> {
    if entries.len() < 2 {
        return Err(LedgerError::InsufficientEntries);
    }

    let transaction_id = entries[0].transaction_id;
    if entries.iter().any(|e| e.transaction_id != transaction_id) {
        return Err(LedgerError::MixedTransactions);
    }

    if entries.iter().any(|e| e.amount < Decimal::ZERO) {
        return Err(LedgerError::NegativeAmount);
    }

    let debit: Decimal = entries
        .iter()
        .filter(|e| e.entry_type == EntryType::Debit)
        .map(|e| e.amount)
        .sum();
    let credit: Decimal = entries
        .iter()
        .filter(|e| e.entry_type == EntryType::Credit)
        .map(|e| e.amount)
        .sum();

    let totals = TransactionTotals::new(debit, credit);
    if !totals.is_balanced {
        return Err(LedgerError::UnbalancedTransaction { debit, credit });
    }

    Ok(totals)
}

/// Writes the revenue and payout entries for approved payments.
#[derive(Clone)]
pub struct LedgerWriter {
    store: Arc<dyn LedgerStore>,
    config: LedgerConfig,
}

impl LedgerWriter {
    /// Creates a writer over a store.
    #[must_use]
    pub fn new(store: Arc<dyn LedgerStore>, config: LedgerConfig) -> Self {
        Self { store, config }
    }

    /// Builds the entries for an approval without writing them.
    ///
    /// DEBIT clearing for the gross amount, balanced by a CREDIT to revenue
    /// and a CREDIT to the professional payout liability.
    pub fn approval_entries(
        &self,
        payment: &Payment,
        at: DateTime<Utc>,
    ) -> Result<Vec<LedgerEntry>, LedgerError> {
        let split = RevenueSplit::compute(payment.gross_amount, self.config.payout_rate)?;

        let entries = vec![
            LedgerEntry::new(
                payment.id,
                EntryType::Debit,
                &self.config.clearing_account,
                split.gross,
                at,
            ),
            LedgerEntry::new(
                payment.id,
                EntryType::Credit,
                &self.config.revenue_account,
                split.revenue,
                at,
            ),
            LedgerEntry::new(
                payment.id,
                EntryType::Credit,
                &self.config.payout_account,
                split.payout,
                at,
            ),
        ];

        validate_balanced(&entries)?;
        Ok(entries)
    }

    /// Records an approved payment. Calling it again for the same payment
    /// writes nothing.
    pub async fn record_approval(
        &self,
        payment: &Payment,
    ) -> Result<LedgerWriteOutcome, LedgerError> {
        let at = payment.approved_at.unwrap_or_else(Utc::now);
        let entries = self.approval_entries(payment, at)?;

        match self.store.append_balanced(&entries).await? {
            AppendOutcome::Inserted(rows) => {
                info!(
                    payment_id = %payment.id,
                    gross = %payment.gross_amount,
                    rows,
                    "Recorded ledger entries for approved payment"
                );
                Ok(LedgerWriteOutcome::Recorded)
            }
            AppendOutcome::AlreadyPresent => {
                debug!(payment_id = %payment.id, "Ledger entries already present");
                Ok(LedgerWriteOutcome::AlreadyRecorded)
            }
        }
    }

    /// Lists entries matching a filter.
    pub async fn list_entries(&self, filter: &LedgerFilter) -> Result<Vec<LedgerEntry>, LedgerError> {
        Ok(self.store.list_entries(filter).await?)
    }
}
