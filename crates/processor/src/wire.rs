//! Processor response bodies.
//!
//! Ids arrive as numbers or strings and amounts as JSON numbers or strings,
//! both read through [`Value`]. A JSON number is held as an `f64`; amounts
//! are rebuilt from its shortest decimal rendering, which reproduces the wire
//! text for up to 15 significant digits. String amounts never touch a float.

use std::str::FromStr;

use clinipay_core::processor::{CanonicalPayment, ProcessorError, ProcessorRefund};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};

#[derive(Debug, Deserialize)]
pub(crate) struct PaymentBody {
    id: Value,
    status: String,
    #[serde(default)]
    transaction_amount: Value,
    #[serde(default)]
    external_reference: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RefundBody {
    id: Value,
    #[serde(default)]
    amount: Value,
    #[serde(default)]
    status: Option<String>,
}

#[derive(Debug, Serialize)]
pub(crate) struct RefundRequestBody {
    pub amount: Number,
}

impl RefundRequestBody {
    pub(crate) fn new(amount: Decimal) -> Result<Self, ProcessorError> {
        let amount = Number::from_str(&amount.normalize().to_string())
            .map_err(|e| ProcessorError::InvalidResponse(format!("unencodable amount: {e}")))?;
        Ok(Self { amount })
    }
}

fn id(value: &Value) -> Result<String, ProcessorError> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Ok(s.trim().to_string()),
        Value::Number(n) => Ok(n.to_string()),
        _ => Err(ProcessorError::InvalidResponse("missing id".to_string())),
    }
}

fn amount(value: &Value, field: &str) -> Result<Decimal, ProcessorError> {
    let text = match value {
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.trim().to_string(),
        _ => return Err(ProcessorError::InvalidResponse(format!("missing {field}"))),
    };
    Decimal::from_str(&text)
        .or_else(|_| Decimal::from_scientific(&text))
        .map_err(|_| ProcessorError::InvalidResponse(format!("invalid {field}: {text}")))
}

impl TryFrom<PaymentBody> for CanonicalPayment {
    type Error = ProcessorError;

    fn try_from(body: PaymentBody) -> Result<Self, Self::Error> {
        Ok(Self {
            id: id(&body.id)?,
            transaction_amount: amount(&body.transaction_amount, "transaction_amount")?,
            status: body.status,
            external_reference: body.external_reference.filter(|r| !r.trim().is_empty()),
        })
    }
}

impl TryFrom<RefundBody> for ProcessorRefund {
    type Error = ProcessorError;

    fn try_from(body: RefundBody) -> Result<Self, Self::Error> {
        Ok(Self {
            id: id(&body.id)?,
            amount: amount(&body.amount, "amount")?,
            status: body.status.unwrap_or_else(|| "approved".to_string()),
        })
    }
}
