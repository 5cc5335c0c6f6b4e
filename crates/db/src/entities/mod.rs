//! `SeaORM` entity definitions.
//!
//! Statuses are stored as constrained `VARCHAR` columns and parsed into the
//! core enums by the repositories.

pub mod bookings;
pub mod ledger_entries;
pub mod payments;
pub mod processed_events;
pub mod refund_discrepancies;
pub mod refunds;
