//! Revenue, payout and margin over a time window.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use clinipay_shared::config::LedgerConfig;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use super::amount::parse_amount;
use crate::ledger::{EntryType, LedgerEntry, LedgerFilter, LedgerStore};
use crate::store::StoreError;

/// A ledger row as seen by the read model.
///
/// Amounts stay untyped: rows may come from exports or older schemas.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RevenueRow {
    /// Transaction correlation key.
    pub transaction_id: String,
    /// `CREDIT` or `DEBIT`, any case.
    pub entry_type: String,
    /// Account code.
    pub account_code: String,
    /// Raw amount.
    #[serde(default)]
    pub amount: Value,
    /// Creation time.
    pub created_at: DateTime<Utc>,
}

impl From<&LedgerEntry> for RevenueRow {
    fn from(entry: &LedgerEntry) -> Self {
        Self {
            transaction_id: entry.transaction_id.to_string(),
            entry_type: entry.entry_type.as_str().to_string(),
            account_code: entry.account_code.clone(),
            amount: Value::String(entry.amount.to_string()),
            created_at: entry.created_at,
        }
    }
}

/// Inclusive time window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    /// Start, inclusive.
    pub from: DateTime<Utc>,
    /// End, inclusive.
    pub to: DateTime<Utc>,
}

impl DateRange {
    /// Whether a timestamp lies inside the window.
    #[must_use]
    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.from <= at && at <= self.to
    }
}

/// Aggregated figures for a window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RevenueSummary {
    /// Window start.
    pub from: DateTime<Utc>,
    /// Window end.
    pub to: DateTime<Utc>,
    /// Sum of revenue-account credits.
    pub revenue: Decimal,
    /// Sum of payout-account credits.
    pub payouts: Decimal,
    /// Revenue minus payouts.
    pub margin: Decimal,
    /// Margin over revenue, in percent, 2 dp. Zero when revenue is zero.
    pub margin_percentage: Decimal,
    /// Distinct transactions contributing revenue.
    pub transaction_count: usize,
}

/// Largest row amount (10^18), in either sign, the aggregator accepts.
/// Anything beyond is treated as malformed.
const MAX_ROW_AMOUNT: Decimal = Decimal::from_parts(0xA764_0000, 0x0DE0_B6B3, 0, false, 0);

/// Adds a row's amount to `total`. Out-of-range amounts and sums that would
/// overflow are skipped.
fn accumulate(total: &mut Decimal, row: &RevenueRow) {
    let amount = parse_amount(&row.amount);
    let sum = (amount.abs() <= MAX_ROW_AMOUNT)
        .then(|| total.checked_add(amount))
        .flatten();

    match sum {
        Some(sum) => *total = sum,
        None => warn!(
            transaction_id = %row.transaction_id,
            account_code = %row.account_code,
            "Skipped out-of-range ledger amount"
        ),
    }
}

/// Pure read model over ledger rows.
#[derive(Debug, Clone)]
pub struct RevenueAggregator {
    revenue_accounts: Vec<String>,
    payout_accounts: Vec<String>,
}

impl RevenueAggregator {
    /// Creates an aggregator with explicit account code lists.
    #[must_use]
    pub fn new(revenue_accounts: Vec<String>, payout_accounts: Vec<String>) -> Self {
        Self {
            revenue_accounts,
            payout_accounts,
        }
    }

    /// Uses the ledger's configured revenue and payout accounts.
    #[must_use]
    pub fn from_config(config: &LedgerConfig) -> Self {
        Self::new(
            vec![config.revenue_account.clone()],
            vec![config.payout_account.clone()],
        )
    }

    /// Summarizes CREDIT rows inside `range`.
    #[must_use]
    pub fn summarize(&self, rows: &[RevenueRow], range: &DateRange) -> RevenueSummary {
        let mut revenue = Decimal::ZERO;
        let mut payouts = Decimal::ZERO;
        let mut transactions = HashSet::new();

        let credits = rows.iter().filter(|row| {
            EntryType::parse(row.entry_type.trim()) == Some(EntryType::Credit)
                && range.contains(row.created_at)
        });

        for row in credits {
            let code = row.account_code.as_str();
            if self.revenue_accounts.iter().any(|c| c == code) {
                accumulate(&mut revenue, row);
                transactions.insert(row.transaction_id.as_str());
            } else if self.payout_accounts.iter().any(|c| c == code) {
                accumulate(&mut payouts, row);
            }
        }

        let margin = revenue.saturating_sub(payouts);
        let margin_percentage = if revenue.is_zero() {
            Decimal::ZERO
        } else {
            margin
                .checked_div(revenue)
                .and_then(|ratio| ratio.checked_mul(Decimal::ONE_HUNDRED))
                .unwrap_or(Decimal::ZERO)
                .round_dp_with_strategy(2, RoundingStrategy::MidpointNearestEven)
        };

        RevenueSummary {
            from: range.from,
            to: range.to,
            revenue,
            payouts,
            margin,
            margin_percentage,
            transaction_count: transactions.len(),
        }
    }

    /// Reads CREDIT entries in `range` from the ledger and summarizes them.
    pub async fn report(
        &self,
        ledger: &dyn LedgerStore,
        range: &DateRange,
    ) -> Result<RevenueSummary, StoreError> {
        let filter = LedgerFilter {
            entry_type: Some(EntryType::Credit),
            account_code: None,
            from: Some(range.from),
            to: Some(range.to),
        };
        let rows: Vec<RevenueRow> = ledger
            .list_entries(&filter)
            .await?
            .iter()
            .map(RevenueRow::from)
            .collect();

        Ok(self.summarize(&rows, range))
    }
}
