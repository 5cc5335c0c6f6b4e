//! Automated and manual refunds.

pub mod coordinator;
pub mod error;
pub mod manual;
pub mod store;
pub mod types;

#[cfg(test)]
mod tests;

pub use coordinator::RefundCoordinator;
pub use error::RefundError;
pub use store::RefundStore;
pub use types::{
    Actor, ManualRefundRequest, ProofObject, ProofUpload, ProofVerification, Refund, RefundCommit,
    RefundDiscrepancy, RefundMethod, SignedProof,
};
