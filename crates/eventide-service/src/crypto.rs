//! Webhook signature verification.
//!
//! The payment processor signs each delivery with HMAC-SHA256 over
//! `"{timestamp}.{rawBody}"` and sends the result in a header shaped
//! `t=<timestamp>,v1=<hex>` (multiple `v1` entries are allowed during
//! secret rotation). Verification recomputes the digest and compares in
//! constant time, and rejects timestamps outside the replay tolerance.

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Maximum accepted skew between the signed timestamp and now.
pub const SIGNATURE_TOLERANCE_SECONDS: i64 = 300;

/// Why a signature header was rejected.
#[derive(Debug, thiserror::Error)]
pub enum SignatureError {
    /// Header has no `t=` element or it is not a Unix timestamp.
    #[error("missing or malformed timestamp")]
    BadTimestamp,

    /// Signed timestamp is outside the replay tolerance.
    #[error("timestamp outside tolerance")]
    StaleTimestamp,

    /// Header has no `v1=` element.
    #[error("missing signature")]
    MissingSignature,

    /// No candidate signature matched the computed digest.
    #[error("signature mismatch")]
    Mismatch,
}

/// Verify a `t=<ts>,v1=<hex>` signature header against the raw body.
///
/// # Errors
///
/// Returns a [`SignatureError`] describing the first check that failed.
pub fn verify_signature_header(
    secret: &str,
    header: &str,
    body: &str,
) -> Result<(), SignatureError> {
    let mut timestamp: Option<&str> = None;
    let mut signatures: Vec<&str> = Vec::new();

    for part in header.split(',') {
        let mut kv = part.splitn(2, '=');
        match (kv.next(), kv.next()) {
            (Some("t"), Some(ts)) => timestamp = Some(ts),
            (Some("v1"), Some(sig)) => signatures.push(sig),
            _ => {}
        }
    }

    let timestamp = timestamp
        .and_then(|ts| ts.trim().parse::<i64>().ok())
        .ok_or(SignatureError::BadTimestamp)?;

    let now = chrono::Utc::now().timestamp();
    if (now - timestamp).abs() > SIGNATURE_TOLERANCE_SECONDS {
        return Err(SignatureError::StaleTimestamp);
    }

    if signatures.is_empty() {
        return Err(SignatureError::MissingSignature);
    }

    let signed_payload = format!("{timestamp}.{body}");
    let expected = hmac_sha256_hex(secret, &signed_payload);

    if signatures.iter().any(|sig| constant_time_eq(&expected, sig)) {
        Ok(())
    } else {
        Err(SignatureError::Mismatch)
    }
}

/// Compute HMAC-SHA256 and return the hex-encoded result.
///
/// # Panics
///
/// Never panics in practice: HMAC-SHA256 accepts keys of any size per
/// RFC 2104, so `new_from_slice` only fails if the Hmac implementation
/// is broken.
#[must_use]
pub fn hmac_sha256_hex(secret: &str, message: &str) -> String {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC-SHA256 accepts any key size");
    mac.update(message.as_bytes());
    let result = mac.finalize();

    hex::encode(result.into_bytes())
}

/// Constant-time string comparison for signature checks.
#[must_use]
pub fn constant_time_eq(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result = 0u8;
    for (x, y) in a.bytes().zip(b.bytes()) {
        result |= x ^ y;
    }
    result == 0
}
