//! Property-based tests for the revenue aggregator.
//!
//! - Result is invariant to row order
//! - margin == revenue - payouts
//! - Malformed or out-of-range amounts never panic and contribute nothing

use chrono::{DateTime, TimeDelta, Utc};
use clinipay_shared::config::LedgerConfig;
use proptest::prelude::*;
use rust_decimal::Decimal;
use serde_json::{Value, json};

use super::aggregator::{DateRange, RevenueAggregator, RevenueRow};

fn base() -> DateTime<Utc> {
    DateTime::from_timestamp(1_760_000_000, 0).unwrap_or_default()
}

/// Strategy for a raw amount: well-formed, locale-formatted, garbage or near
/// the limits of `Decimal`.
fn raw_amount() -> impl Strategy<Value = Value> {
    prop_oneof![
        (0i64..10_000_000).prop_map(|c| json!(Decimal::new(c, 2).to_string())),
        (0i64..10_000_000).prop_map(|c| json!(Decimal::new(c, 2).to_string().replace('.', ","))),
        (0u32..100_000).prop_map(|n| json!(n)),
        Just(Value::Null),
        "[a-z ]{0,8}".prop_map(Value::String),
        Just(json!(Decimal::MAX.to_string())),
        Just(json!(Decimal::MIN.to_string())),
        (0u64..1_000).prop_map(|n| json!((Decimal::MAX - Decimal::from(n)).to_string())),
    ]
}

fn row() -> impl Strategy<Value = RevenueRow> {
    (
        0u8..20,
        prop_oneof![Just("CREDIT"), Just("DEBIT"), Just("credit")],
        prop_oneof![
            Just("revenue-service"),
            Just("liability-professional"),
            Just("processor-clearing"),
        ],
        raw_amount(),
        -5i64..15,
    )
        .prop_map(|(tx, entry_type, account, amount, day)| RevenueRow {
            transaction_id: format!("tx-{tx}"),
            entry_type: entry_type.to_string(),
            account_code: account.to_string(),
            amount,
            created_at: base() + TimeDelta::days(day),
        })
}

fn shuffled_rows() -> impl Strategy<Value = (Vec<RevenueRow>, Vec<RevenueRow>)> {
    prop::collection::vec(row(), 0..40)
        .prop_flat_map(|rows| (Just(rows.clone()), Just(rows).prop_shuffle()))
}

proptest! {
    #[test]
    fn prop_order_invariant((rows, shuffled) in shuffled_rows()) {
        let aggregator = RevenueAggregator::from_config(&LedgerConfig::default());
        let range = DateRange { from: base(), to: base() + TimeDelta::days(10) };

        prop_assert_eq!(
            aggregator.summarize(&rows, &range),
            aggregator.summarize(&shuffled, &range)
        );
    }

    #[test]
    fn prop_margin_is_revenue_minus_payouts(rows in prop::collection::vec(row(), 0..40)) {
        let aggregator = RevenueAggregator::from_config(&LedgerConfig::default());
        let range = DateRange { from: base(), to: base() + TimeDelta::days(10) };

        let summary = aggregator.summarize(&rows, &range);
        prop_assert_eq!(summary.margin, summary.revenue - summary.payouts);
        prop_assert!(summary.revenue >= Decimal::ZERO);
        prop_assert!(summary.payouts >= Decimal::ZERO);
        if summary.revenue.is_zero() {
            prop_assert_eq!(summary.margin_percentage, Decimal::ZERO);
        }
    }
}
