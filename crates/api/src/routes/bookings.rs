//! Booking lifecycle routes.

use axum::{
    Json, Router,
    extract::{Path, State},
    routing::post,
};
use clinipay_core::payment::BookingStatus;
use clinipay_shared::types::BookingId;
use serde::Serialize;
use tracing::info;

use crate::{AppState, error::ApiError, middleware::AuthUser};

/// Creates the booking routes.
pub fn routes() -> Router<AppState> {
    Router::new().route("/bookings/{booking_id}/complete", post(complete_booking))
}

/// Booking status after an update.
#[derive(Debug, Serialize)]
pub struct BookingResponse {
    /// Booking id.
    pub booking_id: BookingId,
    /// New status.
    pub status: BookingStatus,
}

/// POST `/bookings/{booking_id}/complete`
///
/// Marks a delivered service complete. Requires an approved payment.
async fn complete_booking(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(booking_id): Path<BookingId>,
) -> Result<Json<BookingResponse>, ApiError> {
    let booking = state.reconciler.complete_booking(booking_id).await?;

    info!(booking_id = %booking_id, user_id = %auth.user_id(), "Booking completed");
    Ok(Json(BookingResponse {
        booking_id: booking.id,
        status: booking.status,
    }))
}
