//! Notification authentication.

use chrono::{DateTime, Utc};
use clinipay_shared::config::WebhookConfig;
use subtle::{Choice, ConstantTimeEq};
use tracing::warn;

use super::error::{RejectReason, WebhookError};
use super::event::{VerifiedEvent, WebhookEvent};
use super::signature::{SignatureHeader, compute, manifest};

/// Authenticates inbound payment notifications.
#[derive(Clone)]
pub struct WebhookVerifier {
    secrets: Vec<Vec<u8>>,
    freshness_window_ms: i64,
    max_clock_skew_ms: i64,
}

impl std::fmt::Debug for WebhookVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebhookVerifier")
            .field("secrets", &self.secrets.len())
            .field("freshness_window_ms", &self.freshness_window_ms)
            .field("max_clock_skew_ms", &self.max_clock_skew_ms)
            .finish()
    }
}

fn secs_to_ms(secs: u64) -> i64 {
    i64::try_from(secs.saturating_mul(1000)).unwrap_or(i64::MAX)
}

impl WebhookVerifier {
    /// Creates a verifier from configuration.
    #[must_use]
    pub fn new(config: &WebhookConfig) -> Self {
        Self {
            secrets: config
                .accepted_secrets()
                .into_iter()
                .map(|s| s.as_bytes().to_vec())
                .collect(),
            freshness_window_ms: secs_to_ms(config.freshness_window_secs),
            max_clock_skew_ms: secs_to_ms(config.max_clock_skew_secs),
        }
    }

    /// Verifies a notification against the current time.
    pub fn verify(
        &self,
        body: &[u8],
        signature: Option<&str>,
        request_id: Option<&str>,
    ) -> Result<VerifiedEvent, WebhookError> {
        self.verify_at(body, signature, request_id, Utc::now())
    }

    /// Verifies a notification as of `now`.
    ///
    /// The body is parsed first so that malformed payloads are reported as
    /// such; every authentication failure afterwards is the same error.
    pub fn verify_at(
        &self,
        body: &[u8],
        signature: Option<&str>,
        request_id: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<VerifiedEvent, WebhookError> {
        let event = WebhookEvent::parse(body)?;

        let request_id = request_id.map(str::trim).unwrap_or_default();

        match self.authenticate(&event, signature, request_id, now) {
            Ok(signed_at) => Ok(VerifiedEvent {
                action: event.action(),
                processor_payment_id: event.payment_id().to_string(),
                request_id: request_id.to_string(),
                signed_at,
            }),
            Err(reason) => {
                warn!(
                    request_id = %request_id,
                    reason = reason.as_str(),
                    "Rejected payment notification"
                );
                Err(WebhookError::Unauthenticated)
            }
        }
    }

    fn authenticate(
        &self,
        event: &WebhookEvent,
        signature: Option<&str>,
        request_id: &str,
        now: DateTime<Utc>,
    ) -> Result<DateTime<Utc>, RejectReason> {
        let raw = signature.ok_or(RejectReason::MissingSignature)?;
        if request_id.is_empty() {
            return Err(RejectReason::MissingRequestId);
        }

        let header = SignatureHeader::parse(raw).ok_or(RejectReason::MalformedSignature)?;
        let signed_at =
            DateTime::from_timestamp_millis(header.ts).ok_or(RejectReason::MalformedSignature)?;

        let manifest = manifest(event.payment_id(), request_id, header.ts);
        let mut matched = Choice::from(0);
        for secret in &self.secrets {
            if let Some(expected) = compute(secret, &manifest) {
                matched |= expected.as_slice().ct_eq(header.v1.as_slice());
            }
        }
        if !bool::from(matched) {
            return Err(RejectReason::Mismatch);
        }

        let age_ms = now.timestamp_millis().saturating_sub(header.ts);
        if age_ms > self.freshness_window_ms {
            return Err(RejectReason::Stale);
        }
        if age_ms < self.max_clock_skew_ms.saturating_neg() {
            return Err(RejectReason::FromFuture);
        }

        Ok(signed_at)
    }
}
