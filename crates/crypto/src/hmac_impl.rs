//! HMAC and digest primitives.

use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};

use crate::{CryptoError, Result};

type HmacSha256 = Hmac<Sha256>;

/// Generate HMAC-SHA256 signature.
///
/// # Arguments
/// * `key` - Secret key bytes
/// * `message` - Message to sign
///
/// # Returns
/// Signature as lowercase hex string
pub fn hmac_sha256(key: &[u8], message: &[u8]) -> Result<String> {
    hmac_sha256_parts(key, &[message])
}

/// Generate HMAC-SHA256 over several message parts fed in order.
///
/// Equivalent to signing the concatenation of `parts` without building it.
pub fn hmac_sha256_parts(key: &[u8], parts: &[&[u8]]) -> Result<String> {
    let mut mac = HmacSha256::new_from_slice(key)
        .map_err(|e| CryptoError::InvalidKey(e.to_string()))?;
    for part in parts {
        mac.update(part);
    }
    let result = mac.finalize();
    Ok(hex::encode(result.into_bytes()))
}

/// SHA-256 digest of `data` as lowercase hex.
pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}
