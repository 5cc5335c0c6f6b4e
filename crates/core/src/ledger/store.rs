//! Ledger persistence seam.

use async_trait::async_trait;

use super::entry::LedgerEntry;
use super::types::LedgerFilter;
use crate::store::StoreError;

/// What an append actually wrote.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppendOutcome {
    /// Number of rows inserted.
    Inserted(usize),
    /// Every entry already existed.
    AlreadyPresent,
}

/// Append-only ledger storage.
///
/// There is no update or delete.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Inserts a balanced set of entries in one transaction.
    ///
    /// Rows colliding on `(transaction_id, account_code, entry_type)` are
    /// skipped.
    async fn append_balanced(&self, entries: &[LedgerEntry]) -> Result<AppendOutcome, StoreError>;

    /// Lists entries matching a filter, oldest first.
    async fn list_entries(&self, filter: &LedgerFilter) -> Result<Vec<LedgerEntry>, StoreError>;
}
