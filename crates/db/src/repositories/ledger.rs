//! Append-only ledger repository.

use async_trait::async_trait;
use clinipay_core::ledger::{AppendOutcome, LedgerEntry, LedgerFilter, LedgerStore};
use clinipay_core::store::StoreError;
use sea_orm::sea_query::OnConflict;
use sea_orm::{
    ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set, TransactionTrait,
};
use tracing::debug;

use super::convert::db_err;
use crate::entities::ledger_entries;

/// Repository for ledger entries.
///
/// Rows are never updated or deleted; the database rejects both.
#[derive(Debug, Clone)]
pub struct LedgerRepository {
    db: DatabaseConnection,
}

impl LedgerRepository {
    /// Creates a new ledger repository.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

fn active_model(entry: &LedgerEntry) -> ledger_entries::ActiveModel {
    ledger_entries::ActiveModel {
        id: Set(entry.id.into_inner()),
        transaction_id: Set(entry.transaction_id.into_inner()),
        entry_type: Set(entry.entry_type.as_str().to_string()),
        account_code: Set(entry.account_code.clone()),
        amount: Set(entry.amount),
        reverses: Set(entry.reverses.map(|id| id.into_inner())),
        created_at: Set(entry.created_at.into()),
    }
}

#[async_trait]
impl LedgerStore for LedgerRepository {
    async fn append_balanced(&self, entries: &[LedgerEntry]) -> Result<AppendOutcome, StoreError> {
        if entries.is_empty() {
            return Ok(AppendOutcome::AlreadyPresent);
        }

        // The balance trigger is deferred, so all rows must land in one
        // transaction.
        let txn = self.db.begin().await.map_err(db_err)?;
        let inserted = ledger_entries::Entity::insert_many(entries.iter().map(active_model))
            .on_conflict(
                OnConflict::columns([
                    ledger_entries::Column::TransactionId,
                    ledger_entries::Column::AccountCode,
                    ledger_entries::Column::EntryType,
                ])
                .do_nothing()
                .to_owned(),
            )
            .exec_without_returning(&txn)
            .await
            .map_err(db_err)?;
        txn.commit().await.map_err(db_err)?;

        debug!(
            transaction_id = %entries[0].transaction_id,
            inserted,
            "Appended ledger entries"
        );

        if inserted == 0 {
            Ok(AppendOutcome::AlreadyPresent)
        } else {
            Ok(AppendOutcome::Inserted(
                usize::try_from(inserted).unwrap_or(usize::MAX),
            ))
        }
    }

    async fn list_entries(&self, filter: &LedgerFilter) -> Result<Vec<LedgerEntry>, StoreError> {
        let mut query = ledger_entries::Entity::find();
        if let Some(entry_type) = filter.entry_type {
            query = query.filter(ledger_entries::Column::EntryType.eq(entry_type.as_str()));
        }
        if let Some(account_code) = &filter.account_code {
            query = query.filter(ledger_entries::Column::AccountCode.eq(account_code.as_str()));
        }
        if let Some(from) = filter.from {
            query = query.filter(ledger_entries::Column::CreatedAt.gte(from));
        }
        if let Some(to) = filter.to {
            query = query.filter(ledger_entries::Column::CreatedAt.lte(to));
        }

        query
            .order_by_asc(ledger_entries::Column::CreatedAt)
            .order_by_asc(ledger_entries::Column::Id)
            .all(&self.db)
            .await
            .map_err(db_err)?
            .into_iter()
            .map(LedgerEntry::try_from)
            .collect()
    }
}
