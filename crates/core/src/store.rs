//! Persistence errors shared by every store trait.
//!
//! The store traits themselves live next to the domain logic that uses them
//! and are implemented by the db crate.

use thiserror::Error;

/// Errors raised by a store implementation.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The backing database failed.
    #[error("database error: {0}")]
    Database(String),

    /// A stored row could not be mapped to a domain value.
    #[error("corrupt record: {0}")]
    Corrupt(String),
}

impl StoreError {
    /// Create a database error.
    #[must_use]
    pub fn database(msg: impl Into<String>) -> Self {
        Self::Database(msg.into())
    }

    /// Create a corrupt record error.
    #[must_use]
    pub fn corrupt(msg: impl Into<String>) -> Self {
        Self::Corrupt(msg.into())
    }
}

impl From<StoreError> for clinipay_shared::AppError {
    fn from(err: StoreError) -> Self {
        Self::Database(err.to_string())
    }
}
