//! Revenue read model over the ledger.

pub mod aggregator;
pub mod amount;

#[cfg(test)]
mod aggregator_props;

pub use aggregator::{DateRange, RevenueAggregator, RevenueRow, RevenueSummary};
pub use amount::parse_amount;
