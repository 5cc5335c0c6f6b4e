//! Ledger entry domain types.

use chrono::{DateTime, Utc};
use clinipay_shared::types::{LedgerEntryId, PaymentId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Type of ledger entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum EntryType {
    /// Debit entry.
    Debit,
    /// Credit entry.
    Credit,
}

impl EntryType {
    /// Database and wire name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Debit => "DEBIT",
            Self::Credit => "CREDIT",
        }
    }

    /// Parses a stored entry type, case-insensitively.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        if value.eq_ignore_ascii_case("DEBIT") {
            Some(Self::Debit)
        } else if value.eq_ignore_ascii_case("CREDIT") {
            Some(Self::Credit)
        } else {
            None
        }
    }
}

impl std::fmt::Display for EntryType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single immutable ledger line.
///
/// Entries sharing a `transaction_id` must balance (debits = credits).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    /// Unique identifier for this entry.
    pub id: LedgerEntryId,
    /// Payment the entry belongs to.
    pub transaction_id: PaymentId,
    /// Whether this is a debit or credit.
    pub entry_type: EntryType,
    /// Account affected.
    pub account_code: String,
    /// Non-negative amount.
    pub amount: Decimal,
    /// Entry this one reverses, for corrections.
    pub reverses: Option<LedgerEntryId>,
    /// Commit time.
    pub created_at: DateTime<Utc>,
}

impl LedgerEntry {
    /// Creates a new entry.
    #[must_use]
    pub fn new(
        transaction_id: PaymentId,
        entry_type: EntryType,
        account_code: impl Into<String>,
        amount: Decimal,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: LedgerEntryId::new(),
            transaction_id,
            entry_type,
            account_code: account_code.into(),
            amount,
            reverses: None,
            created_at,
        }
    }

    /// Returns the signed amount (positive for debit, negative for credit).
    #[must_use]
    pub fn signed_amount(&self) -> Decimal {
        match self.entry_type {
            EntryType::Debit => self.amount,
            EntryType::Credit => -self.amount,
        }
    }
}
