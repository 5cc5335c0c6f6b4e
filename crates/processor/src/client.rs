//! reqwest implementation of the processor gateway.

use std::time::Duration;

use async_trait::async_trait;
use clinipay_core::processor::{
    CanonicalPayment, PaymentProcessor, ProcessorError, ProcessorRefund, ProcessorRefundRequest,
};
use clinipay_shared::config::ProcessorConfig;
use reqwest::{Client, Response, Url};
use tracing::{debug, warn};

use crate::wire::{PaymentBody, RefundBody, RefundRequestBody};

/// Longest response body quoted in an error.
const MAX_ERROR_BODY: usize = 512;

/// Payment processor API client.
///
/// Every request is bounded by the configured timeout.
#[derive(Clone)]
pub struct ProcessorClient {
    http: Client,
    base_url: Url,
    access_token: String,
}

impl std::fmt::Debug for ProcessorClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessorClient")
            .field("base_url", &self.base_url.as_str())
            .field("access_token", &"[REDACTED]")
            .finish_non_exhaustive()
    }
}

fn send_error(err: &reqwest::Error) -> ProcessorError {
    if err.is_timeout() {
        ProcessorError::Timeout
    } else if err.is_decode() {
        ProcessorError::InvalidResponse(err.to_string())
    } else {
        ProcessorError::Unreachable(err.to_string())
    }
}

async fn ensure_success(response: Response) -> Result<Response, ProcessorError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let mut message = response.text().await.unwrap_or_default();
    if message.len() > MAX_ERROR_BODY {
        let mut end = MAX_ERROR_BODY;
        while !message.is_char_boundary(end) {
            end -= 1;
        }
        message.truncate(end);
    }
    Err(ProcessorError::Rejected {
        status: status.as_u16(),
        message,
    })
}

impl ProcessorClient {
    /// Builds a client from configuration.
    pub fn new(config: &ProcessorConfig) -> Result<Self, ProcessorError> {
        let base_url = Url::parse(&config.base_url)
            .map_err(|e| ProcessorError::Unreachable(format!("invalid base url: {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(ProcessorError::Unreachable(format!(
                "invalid base url: {base_url}"
            )));
        }

        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ProcessorError::Unreachable(e.to_string()))?;

        Ok(Self {
            http,
            base_url,
            access_token: config.access_token.clone(),
        })
    }

    /// `{base}/v1/payments/{id}[/extra...]`, with the id percent-encoded.
    fn payment_url(&self, processor_payment_id: &str, extra: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments
                .pop_if_empty()
                .extend(["v1", "payments", processor_payment_id])
                .extend(extra);
        }
        url
    }
}

#[async_trait]
impl PaymentProcessor for ProcessorClient {
    async fn fetch_payment(
        &self,
        processor_payment_id: &str,
    ) -> Result<CanonicalPayment, ProcessorError> {
        let url = self.payment_url(processor_payment_id, &[]);

        let response = self
            .http
            .get(url)
            .bearer_auth(&self.access_token)
            .send()
            .await
            .map_err(|e| send_error(&e))?;
        let body: PaymentBody = ensure_success(response)
            .await?
            .json()
            .await
            .map_err(|e| send_error(&e))?;

        let canonical = CanonicalPayment::try_from(body)?;
        debug!(
            processor_payment_id,
            status = %canonical.status,
            "Fetched canonical payment"
        );
        Ok(canonical)
    }

    async fn refund(
        &self,
        request: &ProcessorRefundRequest,
    ) -> Result<ProcessorRefund, ProcessorError> {
        let url = self.payment_url(&request.processor_payment_id, &["refunds"]);
        let body = RefundRequestBody::new(request.amount)?;

        let response = self
            .http
            .post(url)
            .bearer_auth(&self.access_token)
            .header("X-Idempotency-Key", &request.idempotency_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| send_error(&e))?;
        let body: RefundBody = ensure_success(response)
            .await
            .inspect_err(|e| {
                warn!(
                    processor_payment_id = %request.processor_payment_id,
                    idempotency_key = %request.idempotency_key,
                    error = %e,
                    "Processor declined refund"
                );
            })?
            .json()
            .await
            .map_err(|e| send_error(&e))?;

        let refund = ProcessorRefund::try_from(body)?;
        debug!(
            processor_payment_id = %request.processor_payment_id,
            refund_id = %refund.id,
            "Processor refund issued"
        );
        Ok(refund)
    }
}
