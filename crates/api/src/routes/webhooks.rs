//! Signed payment notifications.

use axum::{
    Json, Router,
    body::Bytes,
    extract::State,
    http::HeaderMap,
    routing::post,
};
use clinipay_core::payment::ReconcileOutcome;
use serde::Serialize;
use tracing::{info, warn};

use crate::{AppState, error::ApiError};

const SIGNATURE_HEADER: &str = "x-signature";
const REQUEST_ID_HEADER: &str = "x-request-id";

/// Creates the webhook routes.
pub fn routes() -> Router<AppState> {
    Router::new().route("/webhooks/payments", post(receive_payment_notification))
}

/// Acknowledgement returned to the processor.
#[derive(Debug, Serialize)]
pub struct WebhookAck {
    /// `processed`, `duplicate` or `ignored`.
    pub status: &'static str,
    /// Echoed request id.
    pub request_id: String,
    /// What reconciliation did, when it ran.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome: Option<ReconcileOutcome>,
    /// Why the notification was ignored.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<&'static str>,
}

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

/// POST `/webhooks/payments`
///
/// 400 for a malformed body, 401 for any signature failure, 500 when the
/// processor should redeliver. Notifications that can never succeed are
/// acknowledged as `ignored`.
async fn receive_payment_notification(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<WebhookAck>, ApiError> {
    let event = state.verifier.verify(
        &body,
        header(&headers, SIGNATURE_HEADER),
        header(&headers, REQUEST_ID_HEADER),
    )?;

    match state.reconciler.reconcile(&event).await {
        Ok(ReconcileOutcome::Duplicate) => Ok(Json(WebhookAck {
            status: "duplicate",
            request_id: event.request_id,
            outcome: None,
            reason: None,
        })),
        Ok(outcome) => {
            info!(
                request_id = %event.request_id,
                processor_payment_id = %event.processor_payment_id,
                outcome = outcome.label(),
                "Payment notification processed"
            );
            Ok(Json(WebhookAck {
                status: "processed",
                request_id: event.request_id,
                outcome: Some(outcome),
                reason: None,
            }))
        }
        Err(err) if err.is_ignorable() => {
            warn!(
                request_id = %event.request_id,
                processor_payment_id = %event.processor_payment_id,
                error = %err,
                "Payment notification ignored"
            );
            Ok(Json(WebhookAck {
                status: "ignored",
                request_id: event.request_id,
                outcome: None,
                reason: Some(err.error_code()),
            }))
        }
        Err(err) => Err(ApiError::redeliver(&err)),
    }
}
