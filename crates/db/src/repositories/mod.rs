//! Repository implementations of the core store traits.

mod convert;
mod event;
mod ledger;
mod payment;
mod refund;

pub use event::ProcessedEventRepository;
pub use ledger::LedgerRepository;
pub use payment::PaymentRepository;
pub use refund::RefundRepository;
