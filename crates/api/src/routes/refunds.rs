//! Refund routes.
//!
//! The caller's role is checked by the coordinator before any payment,
//! refund or storage access.

use std::str::FromStr;

use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, Multipart, State, multipart::Field},
    http::StatusCode,
    routing::post,
};
use clinipay_core::refund::{
    ManualRefundRequest, ProofUpload, ProofVerification, Refund, SignedProof,
};
use clinipay_shared::AppError;
use clinipay_shared::types::{PaymentId, RefundId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{AppState, error::ApiError, middleware::AuthUser};

/// Creates the refund routes.
pub fn routes(max_upload_bytes: usize) -> Router<AppState> {
    Router::new()
        .route("/refunds/automated", post(create_automated_refund))
        .route(
            "/refunds/manual",
            post(create_manual_refund).layer(DefaultBodyLimit::max(max_upload_bytes)),
        )
        .route("/refunds/manual/overview", post(manual_overview))
        .route("/refunds/manual/proof", post(proof_url))
        .route("/refunds/manual/verify", post(verify_proof))
        .route("/refunds/discrepancies/resolve", post(resolve_discrepancies))
}

// ============================================================================
// Request/Response Types
// ============================================================================

/// Request body for an automated refund.
#[derive(Debug, Deserialize)]
pub struct AutomatedRefundRequest {
    /// Payment to refund.
    pub payment_id: PaymentId,
    /// Amount, defaults to everything still refundable.
    #[serde(default)]
    pub amount: Option<Decimal>,
}

/// Response for an automated refund.
#[derive(Debug, Serialize)]
pub struct AutomatedRefundResponse {
    /// Local refund id.
    pub refund_id: RefundId,
    /// Always `completed`; failures are error responses.
    pub status: &'static str,
    /// Amount refunded.
    pub amount: Decimal,
    /// Refunded payment.
    pub payment_id: PaymentId,
}

/// Request body naming a payment.
#[derive(Debug, Deserialize)]
pub struct PaymentRequest {
    /// Payment id.
    pub payment_id: PaymentId,
}

/// Request body naming a refund.
#[derive(Debug, Deserialize)]
pub struct RefundRequest {
    /// Refund id.
    pub refund_id: RefundId,
}

/// Refunds of one payment.
#[derive(Debug, Serialize)]
pub struct RefundOverview {
    /// Refunds, oldest first.
    pub refunds: Vec<Refund>,
}

/// Outcome of resolving discrepancies.
#[derive(Debug, Serialize)]
pub struct ResolveResponse {
    /// Number of discrepancies closed.
    pub resolved: u64,
}

// ============================================================================
// Helper Functions
// ============================================================================

fn invalid_form(details: impl Into<String>) -> ApiError {
    AppError::Validation(details.into()).into()
}

async fn field_text(field: Field<'_>) -> Result<String, ApiError> {
    field
        .text()
        .await
        .map(|s| s.trim().to_string())
        .map_err(|e| ApiError::new(e.status(), "INVALID_MULTIPART", e.body_text()))
}

fn parse_bool(value: &str) -> Result<bool, ApiError> {
    match value.to_ascii_lowercase().as_str() {
        "" | "false" | "0" | "off" | "no" => Ok(false),
        "true" | "1" | "on" | "yes" => Ok(true),
        other => Err(invalid_form(format!("invalid cancel_booking value '{other}'"))),
    }
}

/// Reads the manual refund form.
///
/// Fields: `payment_id`, `amount?`, `cancel_booking?`, `reason?` and the
/// `proof` file.
async fn read_manual_form(mut multipart: Multipart) -> Result<ManualRefundRequest, ApiError> {
    let mut payment_id = None;
    let mut amount = None;
    let mut cancel_booking = false;
    let mut reason = None;
    let mut proof = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::new(e.status(), "INVALID_MULTIPART", e.body_text()))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "payment_id" => {
                let raw = field_text(field).await?;
                payment_id = Some(
                    PaymentId::from_str(&raw)
                        .map_err(|_| invalid_form(format!("invalid payment_id '{raw}'")))?,
                );
            }
            "amount" => {
                let raw = field_text(field).await?;
                if !raw.is_empty() {
                    amount = Some(
                        Decimal::from_str(&raw)
                            .map_err(|_| invalid_form(format!("invalid amount '{raw}'")))?,
                    );
                }
            }
            "cancel_booking" => cancel_booking = parse_bool(&field_text(field).await?)?,
            "reason" => {
                let raw = field_text(field).await?;
                reason = (!raw.is_empty()).then_some(raw);
            }
            "proof" => {
                let file_name = field.file_name().unwrap_or("proof").to_string();
                let content_type = field
                    .content_type()
                    .unwrap_or("application/octet-stream")
                    .to_string();
                let bytes = field.bytes().await.map_err(|e| {
                    ApiError::new(e.status(), "INVALID_MULTIPART", e.body_text())
                })?;
                proof = Some(ProofUpload {
                    file_name,
                    content_type,
                    bytes,
                });
            }
            _ => {}
        }
    }

    Ok(ManualRefundRequest {
        payment_id: payment_id.ok_or_else(|| invalid_form("payment_id is required"))?,
        amount,
        reason,
        cancel_booking,
        proof: proof.ok_or_else(|| invalid_form("proof file is required"))?,
    })
}

// ============================================================================
// Route Handlers
// ============================================================================

/// POST `/refunds/automated`
async fn create_automated_refund(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(payload): Json<AutomatedRefundRequest>,
) -> Result<(StatusCode, Json<AutomatedRefundResponse>), ApiError> {
    let refund = state
        .refunds
        .refund_automated(payload.payment_id, payload.amount, &auth.actor())
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(AutomatedRefundResponse {
            refund_id: refund.id,
            status: "completed",
            amount: refund.amount,
            payment_id: refund.payment_id,
        }),
    ))
}

/// POST `/refunds/manual` (multipart)
async fn create_manual_refund(
    State(state): State<AppState>,
    auth: AuthUser,
    multipart: Multipart,
) -> Result<(StatusCode, Json<SignedProof>), ApiError> {
    let request = read_manual_form(multipart).await?;
    let signed = state.refunds.refund_manual(request, &auth.actor()).await?;
    Ok((StatusCode::CREATED, Json(signed)))
}

/// POST `/refunds/manual/overview`
async fn manual_overview(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(payload): Json<PaymentRequest>,
) -> Result<Json<RefundOverview>, ApiError> {
    let refunds = state
        .refunds
        .list_refunds(payload.payment_id, &auth.actor())
        .await?;
    Ok(Json(RefundOverview { refunds }))
}

/// POST `/refunds/manual/proof`
async fn proof_url(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(payload): Json<RefundRequest>,
) -> Result<Json<SignedProof>, ApiError> {
    let signed = state
        .refunds
        .proof_url(payload.refund_id, &auth.actor())
        .await?;
    Ok(Json(signed))
}

/// POST `/refunds/manual/verify`
async fn verify_proof(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(payload): Json<RefundRequest>,
) -> Result<Json<ProofVerification>, ApiError> {
    let verification = state
        .refunds
        .verify_proof(payload.refund_id, &auth.actor())
        .await?;
    Ok(Json(verification))
}

/// POST `/refunds/discrepancies/resolve`
async fn resolve_discrepancies(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(payload): Json<PaymentRequest>,
) -> Result<Json<ResolveResponse>, ApiError> {
    let resolved = state
        .refunds
        .resolve_discrepancy(payload.payment_id, &auth.actor())
        .await?;
    Ok(Json(ResolveResponse { resolved }))
}
