//! Signature header parsing and manifest signing.

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Parsed `x-signature` header: `ts=<unix-ms>,v1=<hex>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureHeader {
    /// Signing time in unix milliseconds.
    pub ts: i64,
    /// Raw HMAC bytes.
    pub v1: Vec<u8>,
}

impl SignatureHeader {
    /// Parses the header. Parts may come in any order and carry whitespace.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        let mut ts = None;
        let mut v1 = None;

        for part in raw.split(',') {
            let (key, value) = part.split_once('=')?;
            match key.trim() {
                "ts" => ts = Some(value.trim().parse::<i64>().ok()?),
                "v1" => v1 = Some(hex::decode(value.trim()).ok()?),
                _ => {}
            }
        }

        let v1 = v1.filter(|bytes| !bytes.is_empty())?;
        Some(Self { ts: ts?, v1 })
    }
}

/// Builds the signed manifest for a notification.
#[must_use]
pub fn manifest(payment_id: &str, request_id: &str, ts: i64) -> String {
    format!("id:{payment_id};request-id:{request_id};ts:{ts};")
}

/// Computes the HMAC-SHA256 of a manifest.
pub(crate) fn compute(secret: &[u8], manifest: &str) -> Option<Vec<u8>> {
    let mut mac = HmacSha256::new_from_slice(secret).ok()?;
    mac.update(manifest.as_bytes());
    Some(mac.finalize().into_bytes().to_vec())
}

/// Renders a complete `x-signature` header value, as the processor would.
#[must_use]
pub fn signature_header(secret: &str, payment_id: &str, request_id: &str, ts: i64) -> String {
    let digest = compute(secret.as_bytes(), &manifest(payment_id, request_id, ts))
        .map(hex::encode)
        .unwrap_or_default();
    format!("ts={ts},v1={digest}")
}
