//! Core business logic for Clinipay.
//!
//! This crate contains pure business logic with ZERO web or database dependencies.
//! Persistence, the payment processor and proof storage sit behind traits
//! implemented in the `db`, `processor` crates and [`storage`].
//!
//! # Modules
//!
//! - `webhook` - Processor notification authentication
//! - `payment` - Payment state machine and reconciliation
//! - `ledger` - Double-entry revenue recording
//! - `refund` - Automated and manual refunds
//! - `revenue` - Revenue, payout and margin reporting
//! - `storage` - Refund proof documents

pub mod ledger;
pub mod locks;
pub mod payment;
pub mod processor;
pub mod refund;
pub mod revenue;
pub mod storage;
pub mod store;
pub mod webhook;

#[cfg(any(test, feature = "testing"))]
pub mod testing;
