//! HTTP client for the payment processor.
//!
//! Implements [`clinipay_core::processor::PaymentProcessor`] over the
//! processor's REST API:
//! - `GET  /v1/payments/{id}` for the canonical payment record
//! - `POST /v1/payments/{id}/refunds` with an `X-Idempotency-Key` header

mod client;
mod wire;

pub use client::ProcessorClient;
