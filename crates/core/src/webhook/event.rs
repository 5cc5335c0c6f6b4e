//! Notification payloads.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use super::error::WebhookError;

/// A payment notification as sent by the processor.
///
/// Only the action and the payment id are read. Any monetary fields in the
/// payload are ignored; the canonical record is fetched from the processor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action")]
pub enum WebhookEvent {
    /// A payment was created at checkout.
    #[serde(rename = "payment.created")]
    PaymentCreated {
        /// Event data.
        data: EventData,
    },
    /// A payment changed status.
    #[serde(rename = "payment.updated")]
    PaymentUpdated {
        /// Event data.
        data: EventData,
    },
}

/// The `data` object of a notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventData {
    /// Processor payment id. Sent as a string or a number.
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Text(String),
        Number(u64),
    }

    Ok(match RawId::deserialize(deserializer)? {
        RawId::Text(s) => s,
        RawId::Number(n) => n.to_string(),
    })
}

/// Notification action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WebhookAction {
    /// `payment.created`
    #[serde(rename = "payment.created")]
    Created,
    /// `payment.updated`
    #[serde(rename = "payment.updated")]
    Updated,
}

impl WebhookAction {
    /// Wire name of the action.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Created => "payment.created",
            Self::Updated => "payment.updated",
        }
    }
}

impl WebhookEvent {
    /// Parses and validates a raw body.
    pub fn parse(body: &[u8]) -> Result<Self, WebhookError> {
        let event: Self = serde_json::from_slice(body)
            .map_err(|e| WebhookError::MalformedBody(e.to_string()))?;

        if event.payment_id().trim().is_empty() {
            return Err(WebhookError::MalformedBody(
                "data.id must not be empty".to_string(),
            ));
        }

        Ok(event)
    }

    /// The action carried by this event.
    #[must_use]
    pub const fn action(&self) -> WebhookAction {
        match self {
            Self::PaymentCreated { .. } => WebhookAction::Created,
            Self::PaymentUpdated { .. } => WebhookAction::Updated,
        }
    }

    /// Processor payment id the event refers to.
    #[must_use]
    pub fn payment_id(&self) -> &str {
        match self {
            Self::PaymentCreated { data } | Self::PaymentUpdated { data } => &data.id,
        }
    }
}

/// An authenticated notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VerifiedEvent {
    /// Notification action.
    pub action: WebhookAction,
    /// Processor payment id.
    pub processor_payment_id: String,
    /// Processor request id, used as the dedup key.
    pub request_id: String,
    /// When the processor signed the notification.
    pub signed_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_parse_updated_event() {
        let event = WebhookEvent::parse(br#"{"action":"payment.updated","data":{"id":"123"}}"#)
            .unwrap();
        assert_eq!(event.action(), WebhookAction::Updated);
        assert_eq!(event.payment_id(), "123");
    }

    #[test]
    fn test_parse_numeric_id_and_extra_fields() {
        let body = br#"{
            "action": "payment.created",
            "api_version": "v1",
            "live_mode": true,
            "data": {"id": 987654321, "transaction_amount": 1.0}
        }"#;
        let event = WebhookEvent::parse(body).unwrap();
        assert_eq!(event.action(), WebhookAction::Created);
        assert_eq!(event.payment_id(), "987654321");
    }

    #[rstest]
    #[case::unknown_action(br#"{"action":"payment.deleted","data":{"id":"1"}}"#.as_slice())]
    #[case::missing_action(br#"{"data":{"id":"1"}}"#.as_slice())]
    #[case::missing_data(br#"{"action":"payment.updated"}"#.as_slice())]
    #[case::empty_id(br#"{"action":"payment.updated","data":{"id":"  "}}"#.as_slice())]
    #[case::not_json(b"not json".as_slice())]
    fn test_parse_rejects(#[case] body: &[u8]) {
        assert!(matches!(
            WebhookEvent::parse(body),
            Err(WebhookError::MalformedBody(_))
        ));
    }
}
