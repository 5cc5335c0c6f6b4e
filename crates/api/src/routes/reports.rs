//! Revenue report routes.

use axum::{
    Json, Router,
    extract::{Query, State},
    routing::get,
};
use clinipay_core::revenue::{DateRange, RevenueSummary};
use clinipay_shared::AppError;

use crate::{AppState, error::ApiError};

/// Creates the report routes.
pub fn routes() -> Router<AppState> {
    Router::new().route("/reports/revenue", get(revenue_report))
}

/// GET `/reports/revenue?from&to`
///
/// Both bounds are inclusive RFC 3339 timestamps.
async fn revenue_report(
    State(state): State<AppState>,
    Query(range): Query<DateRange>,
) -> Result<Json<RevenueSummary>, ApiError> {
    if range.from > range.to {
        return Err(AppError::Validation("from must not be after to".to_string()).into());
    }

    let summary = state
        .revenue
        .report(state.ledger_store.as_ref(), &range)
        .await?;
    Ok(Json(summary))
}
