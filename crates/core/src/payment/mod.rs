//! Payment state machine and reconciliation.

pub mod error;
pub mod reconciler;
pub mod status;
pub mod store;
pub mod types;


pub use error::ReconcileError;
pub use reconciler::{PaymentReconciler, ReconcileOutcome};
pub use status::{BookingStatus, PaymentStatus, RefundStatus};
pub use store::{PaymentStore, ProcessedEventStore};
pub use types::{Booking, BookingTransition, Payment, PaymentTransition, ProcessedEvent};
