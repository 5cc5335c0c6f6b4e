//! HTTP API layer with Axum routes and middleware.
//!
//! This crate provides:
//! - The signed payment notification endpoint
//! - Refund, booking, ledger and revenue report routes
//! - Bearer authentication and role allow-list middleware
//! - Error rendering as `{ error, details? }`

pub mod error;
pub mod middleware;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use clinipay_core::ledger::{LedgerStore, LedgerWriter};
use clinipay_core::payment::PaymentReconciler;
use clinipay_core::refund::RefundCoordinator;
use clinipay_core::revenue::RevenueAggregator;
use clinipay_core::webhook::WebhookVerifier;
use clinipay_shared::JwtService;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub use error::ApiError;

/// Application state shared across handlers.
///
/// Every service is built once at startup and only read afterwards.
#[derive(Clone)]
pub struct AppState {
    /// JWT service for bearer validation.
    pub jwt_service: Arc<JwtService>,
    /// Notification signature verifier.
    pub verifier: Arc<WebhookVerifier>,
    /// Payment reconciler.
    pub reconciler: Arc<PaymentReconciler>,
    /// Refund coordinator.
    pub refunds: Arc<RefundCoordinator>,
    /// Ledger writer, used here for its read surface.
    pub ledger: LedgerWriter,
    /// Ledger store read by the revenue report.
    pub ledger_store: Arc<dyn LedgerStore>,
    /// Revenue read model.
    pub revenue: Arc<RevenueAggregator>,
    /// Roles allowed on administrative routes.
    pub staff_roles: Arc<[String]>,
    /// Request body limit for proof uploads.
    pub max_upload_bytes: usize,
}

/// Creates the main application router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .nest("/api/v1", routes::api_routes_with_state(state.clone()))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}
