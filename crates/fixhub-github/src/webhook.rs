//! Webhook signature verification

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

const SIGNATURE_PREFIX: &str = "sha256=";

/// Check a `sha256=<hex>` header against the HMAC-SHA256 of `payload`
///
/// Returns `false` for a missing prefix, undecodable hex or a mismatch;
/// verification problems are never errors.
pub fn verify_signature(
    payload: impl AsRef<[u8]>,
    secret: impl AsRef<[u8]>,
    signature_header: &str,
) -> bool {
    let Some(provided_hex) = signature_header.strip_prefix(SIGNATURE_PREFIX) else {
        tracing::debug!("Webhook signature header is missing the sha256= prefix");
        return false;
    };

    let provided = match hex::decode(provided_hex) {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::warn!("Error decoding webhook signature: {}", e);
            return false;
        }
    };

    let expected = hmac_sha256(secret.as_ref(), payload.as_ref());
    constant_time_eq(&expected, &provided)
}

/// The header value GitHub would send for `payload`
pub fn signature_header(payload: impl AsRef<[u8]>, secret: impl AsRef<[u8]>) -> String {
    format!(
        "{}{}",
        SIGNATURE_PREFIX,
        hex::encode(hmac_sha256(secret.as_ref(), payload.as_ref()))
    )
}

fn hmac_sha256(secret: &[u8], payload: &[u8]) -> Vec<u8> {
    // HMAC takes keys of any length
    let mut mac = match HmacSha256::new_from_slice(secret) {
        Ok(mac) => mac,
        Err(_) => return Vec::new(),
    };
    mac.update(payload);
    mac.finalize().into_bytes().to_vec()
}

/// Compare without short-circuiting on the first differing byte
///
/// Slices of different length compare unequal immediately; length is not
/// secret.
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let diff = a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y));
    diff == 0
}
