//! Webhook signature verification.
//!
//! LINE signs each webhook delivery with base64(HMAC-SHA256(channel_secret,
//! body)) in the `X-Line-Signature` header.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Compute the expected signature for a request body.
pub fn sign(channel_secret: &str, body: &[u8]) -> String {
    let mut mac = HmacSha256::new_from_slice(channel_secret.as_bytes()).expect("HMAC key length");
    mac.update(body);
    BASE64.encode(mac.finalize().into_bytes())
}

/// Verify an `X-Line-Signature` header value against the request body.
pub fn verify(channel_secret: &str, signature: &str, body: &[u8]) -> bool {
    constant_time_eq(&sign(channel_secret, body), signature)
}

/// Constant-time string comparison to prevent timing attacks.
fn constant_time_eq(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.bytes()
        .zip(b.bytes())
        .fold(0u8, |acc, (x, y)| acc | (x ^ y))
        == 0
}
