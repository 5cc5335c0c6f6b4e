//! API route definitions.

use axum::{Router, middleware};

use crate::{
    AppState,
    middleware::{auth_middleware, require_staff_role},
};

pub mod bookings;
pub mod health;
pub mod ledger;
pub mod refunds;
pub mod reports;
pub mod webhooks;

/// Creates the API router with protected routes that need state for middleware.
#[allow(clippy::needless_pass_by_value)]
pub fn api_routes_with_state(state: AppState) -> Router<AppState> {
    // Refund routes authorize the role inside the coordinator.
    let refund_routes = refunds::routes(state.max_upload_bytes).layer(
        middleware::from_fn_with_state(state.clone(), auth_middleware),
    );

    let staff_routes = Router::new()
        .merge(bookings::routes())
        .merge(ledger::routes())
        .merge(reports::routes())
        .layer(middleware::from_fn_with_state(
            state.clone(),
            require_staff_role,
        ))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    Router::new()
        .merge(health::routes())
        .merge(webhooks::routes())
        .merge(refund_routes)
        .merge(staff_routes)
}
