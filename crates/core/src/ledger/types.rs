//! Ledger read filters and write outcomes.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::entry::EntryType;

/// Filter for listing ledger entries. Unset fields match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerFilter {
    /// Entry type.
    pub entry_type: Option<EntryType>,
    /// Account code.
    pub account_code: Option<String>,
    /// Inclusive lower bound on creation time.
    pub from: Option<DateTime<Utc>>,
    /// Inclusive upper bound on creation time.
    pub to: Option<DateTime<Utc>>,
}

impl LedgerFilter {
    /// Whether an entry with these attributes passes the filter.
    #[must_use]
    pub fn matches(
        &self,
        entry_type: EntryType,
        account_code: &str,
        created_at: DateTime<Utc>,
    ) -> bool {
        self.entry_type.is_none_or(|t| t == entry_type)
            && self.account_code.as_deref().is_none_or(|c| c == account_code)
            && self.from.is_none_or(|from| created_at >= from)
            && self.to.is_none_or(|to| created_at <= to)
    }
}

/// Result of recording an approval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LedgerWriteOutcome {
    /// Entries were written.
    Recorded,
    /// Entries already existed; nothing written.
    AlreadyRecorded,
}

/// Transaction totals for validation and display.
#[derive(Debug, Clone)]
pub struct TransactionTotals {
    /// Total debit amount.
    pub debit: Decimal,
    /// Total credit amount.
    pub credit: Decimal,
    /// Whether the transaction is balanced (debits == credits).
    pub is_balanced: bool,
}

impl TransactionTotals {
    /// Creates new transaction totals from debit and credit sums.
    #[must_use]
    pub fn new(debit: Decimal, credit: Decimal) -> Self {
        Self {
            debit,
            credit,
            is_balanced: debit == credit,
        }
    }

    /// Returns the difference between debits and credits.
    #[must_use]
    pub fn difference(&self) -> Decimal {
        self.debit - self.credit
    }
}
