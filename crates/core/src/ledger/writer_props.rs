//! Property-based tests for the approval writer.
//!
//! - Every approval is balanced
//! - The two credits sum to the gross amount exactly
//! - The payout share never carries more than 2 decimal places

use chrono::Utc;
use clinipay_shared::config::LedgerConfig;
use clinipay_shared::types::BookingId;
use proptest::prelude::*;
use rust_decimal::Decimal;
use std::sync::Arc;

use super::entry::EntryType;
use super::split::RevenueSplit;
use super::writer::{LedgerWriter, validate_balanced};
use crate::payment::{Payment, PaymentStatus};
use crate::testing::MemoryStore;

/// Strategy to generate positive decimal amounts (0.01 to 100,000.00).
fn positive_amount() -> impl Strategy<Value = Decimal> {
    (1i64..10_000_000i64).prop_map(|cents| Decimal::new(cents, 2))
}

/// Strategy to generate payout rates (0.00 to 1.00, 4 dp).
fn payout_rate() -> impl Strategy<Value = Decimal> {
    (0i64..=10_000i64).prop_map(|v| Decimal::new(v, 4))
}

proptest! {
    #[test]
    fn prop_split_sums_to_gross(gross in positive_amount(), rate in payout_rate()) {
        let split = RevenueSplit::compute(gross, rate).unwrap();
        prop_assert_eq!(split.revenue + split.payout, gross);
        prop_assert!(split.payout.scale() <= 2);
        prop_assert!(split.payout >= Decimal::ZERO);
        prop_assert!(split.revenue >= Decimal::ZERO);
    }

    #[test]
    fn prop_approval_entries_balanced(gross in positive_amount(), rate in payout_rate()) {
        let config = LedgerConfig { payout_rate: rate, ..LedgerConfig::default() };
        let writer = LedgerWriter::new(Arc::new(MemoryStore::new()), config);

        let mut payment = Payment::pending(BookingId::new(), gross);
        payment.status = PaymentStatus::Approved;

        let entries = writer.approval_entries(&payment, Utc::now()).unwrap();
        let totals = validate_balanced(&entries).unwrap();

        prop_assert_eq!(totals.debit, gross);
        prop_assert_eq!(totals.credit, gross);
        prop_assert_eq!(
            entries.iter().filter(|e| e.entry_type == EntryType::Credit).count(),
            2
        );
    }
}
