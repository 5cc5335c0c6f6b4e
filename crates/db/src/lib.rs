//! Database layer with `SeaORM` entities and repositories.
//!
//! This crate provides:
//! - `SeaORM` entity definitions for payments, bookings, ledger and refunds
//! - Repository implementations of the core store traits
//! - Database migrations, including the ledger balance and immutability
//!   triggers

pub mod entities;
pub mod migration;
pub mod repositories;

pub use repositories::{
    LedgerRepository, PaymentRepository, ProcessedEventRepository, RefundRepository,
};

use std::time::Duration;

use clinipay_shared::config::DatabaseConfig;
use sea_orm::{ConnectOptions, Database, DatabaseConnection, DbErr};

/// Establishes a connection pool from configuration.
///
/// # Errors
///
/// Returns an error if the connection cannot be established.
pub async fn connect(config: &DatabaseConfig) -> Result<DatabaseConnection, DbErr> {
    let mut options = ConnectOptions::new(config.url.clone());
    options
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .connect_timeout(Duration::from_secs(10))
        .sqlx_logging(false);
    Database::connect(options).await
}
