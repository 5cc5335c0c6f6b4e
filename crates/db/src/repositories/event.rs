//! Notification dedup markers.

use async_trait::async_trait;
use clinipay_core::payment::{ProcessedEvent, ProcessedEventStore};
use clinipay_core::store::StoreError;
use sea_orm::sea_query::OnConflict;
use sea_orm::{DatabaseConnection, EntityTrait, PaginatorTrait, Set};

use super::convert::db_err;
use crate::entities::processed_events;

/// Repository for processed notification markers.
#[derive(Debug, Clone)]
pub struct ProcessedEventRepository {
    db: DatabaseConnection,
}

impl ProcessedEventRepository {
    /// Creates a new processed event repository.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

#[async_trait]
impl ProcessedEventStore for ProcessedEventRepository {
    async fn is_processed(&self, request_id: &str) -> Result<bool, StoreError> {
        let count = processed_events::Entity::find_by_id(request_id.to_string())
            .count(&self.db)
            .await
            .map_err(db_err)?;
        Ok(count > 0)
    }

    async fn mark_processed(&self, event: &ProcessedEvent) -> Result<bool, StoreError> {
        let model = processed_events::ActiveModel {
            request_id: Set(event.request_id.clone()),
            processor_payment_id: Set(event.processor_payment_id.clone()),
            outcome: Set(event.outcome.clone()),
            processed_at: Set(event.processed_at.into()),
        };

        let inserted = processed_events::Entity::insert(model)
            .on_conflict(
                OnConflict::column(processed_events::Column::RequestId)
                    .do_nothing()
                    .to_owned(),
            )
            .exec_without_returning(&self.db)
            .await
            .map_err(db_err)?;

        Ok(inserted == 1)
    }
}
