//! Inbound payment notification authentication.
//!
//! - Closed event union parsed at the boundary
//! - `ts=<unix-ms>,v1=<hex>` signature header
//! - HMAC-SHA256 over the notification manifest with secret rotation
//! - Freshness window and clock-skew tolerance

pub mod error;
pub mod event;
pub mod signature;
pub mod verifier;

pub use error::WebhookError;
pub use event::{EventData, VerifiedEvent, WebhookAction, WebhookEvent};
pub use signature::{SignatureHeader, manifest, signature_header};
pub use verifier::WebhookVerifier;
