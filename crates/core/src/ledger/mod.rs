//! Double-entry ledger for approved payments.
//!
//! This module implements:
//! - Ledger entries (debits and credits), append-only
//! - Revenue/payout split with banker's rounding
//! - Balance validation before any write
//! - The exactly-once approval writer
//! - Error types for ledger operations

pub mod entry;
pub mod error;
pub mod split;
pub mod store;
pub mod types;
pub mod writer;

#[cfg(test)]
mod writer_props;

pub use entry::{EntryType, LedgerEntry};
pub use error::LedgerError;
pub use split::RevenueSplit;
pub use store::{AppendOutcome, LedgerStore};
pub use types::{LedgerFilter, LedgerWriteOutcome, TransactionTotals};
pub use writer::{LedgerWriter, validate_balanced};
