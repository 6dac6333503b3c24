//! API key generation and storage digests.
//!
//! Keys render as `{prefix}_{base64url(24 random bytes)}`, for example
//! `sk_live_3q2-7wAAAAAAAAAAAAAAAAAAAAAAAAAA`. The platform stores only
//! [`ApiKeyManager::digest`] of the rendered key. The digest is unsalted
//! SHA-256 so a presented key can be looked up directly by its digest; the
//! 192 bits of key material make offline guessing infeasible without a salt.

use std::fmt;
use std::str::FromStr;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use paycore_telemetry::metrics;
use zeroize::Zeroizing;

use crate::hmac_impl::sha256_hex;
use crate::random::Entropy;
use crate::timing::constant_time_eq_str;
use crate::{CryptoError, Result};

/// Bytes of random material per key (192 bits).
pub const API_KEY_MATERIAL_LEN: usize = 24;

/// The closed set of key prefixes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ApiKeyPrefix {
    /// `sk_live`
    LiveSecret,
    /// `sk_test`
    TestSecret,
    /// `pk_live`
    LivePublic,
    /// `pk_test`
    TestPublic,
}

impl ApiKeyPrefix {
    /// All prefixes.
    pub const ALL: [ApiKeyPrefix; 4] = [
        ApiKeyPrefix::LiveSecret,
        ApiKeyPrefix::TestSecret,
        ApiKeyPrefix::LivePublic,
        ApiKeyPrefix::TestPublic,
    ];

    /// Rendered form, e.g. `sk_live`.
    pub fn as_str(&self) -> &'static str {
        match self {
            ApiKeyPrefix::LiveSecret => "sk_live",
            ApiKeyPrefix::TestSecret => "sk_test",
            ApiKeyPrefix::LivePublic => "pk_live",
            ApiKeyPrefix::TestPublic => "pk_test",
        }
    }

    /// Symbolic name, e.g. `live_secret`.
    pub fn symbol(&self) -> &'static str {
        match self {
            ApiKeyPrefix::LiveSecret => "live_secret",
            ApiKeyPrefix::TestSecret => "test_secret",
            ApiKeyPrefix::LivePublic => "live_public",
            ApiKeyPrefix::TestPublic => "test_public",
        }
    }

    /// Whether keys with this prefix act on live money.
    pub fn is_live(&self) -> bool {
        matches!(self, ApiKeyPrefix::LiveSecret | ApiKeyPrefix::LivePublic)
    }

    /// Whether keys with this prefix are secret (server-side) keys.
    pub fn is_secret(&self) -> bool {
        matches!(self, ApiKeyPrefix::LiveSecret | ApiKeyPrefix::TestSecret)
    }

    /// Recover the prefix of a rendered key.
    pub fn of_rendered(rendered: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|p| {
                rendered
                    .strip_prefix(p.as_str())
                    .is_some_and(|rest| rest.starts_with('_'))
            })
            .ok_or_else(|| CryptoError::InvalidPrefix(redact(rendered)))
    }
}

impl fmt::Display for ApiKeyPrefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ApiKeyPrefix {
    type Err = CryptoError;

    /// Accepts both the rendered (`sk_test`) and symbolic (`test_secret`)
    /// spellings.
    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|p| p.as_str() == s || p.symbol() == s)
            .ok_or_else(|| CryptoError::InvalidPrefix(s.to_string()))
    }
}

/// Only the first few characters of a key are safe to log.
fn redact(key: &str) -> String {
    let visible: String = key.chars().take(8).collect();
    format!("{visible}...")
}

/// A freshly generated API key.
///
/// The random material is wiped from memory when the key is dropped.
pub struct ApiKey {
    prefix: ApiKeyPrefix,
    material: Zeroizing<[u8; API_KEY_MATERIAL_LEN]>,
    rendered: Zeroizing<String>,
}

impl ApiKey {
    /// Key prefix.
    pub fn prefix(&self) -> ApiKeyPrefix {
        self.prefix
    }

    /// Raw random material.
    pub fn material(&self) -> &[u8] {
        self.material.as_slice()
    }

    /// The key as shown to the user, once.
    pub fn rendered(&self) -> &str {
        &self.rendered
    }

    /// Storage digest of the rendered key.
    pub fn digest(&self) -> String {
        ApiKeyManager::digest(&self.rendered)
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiKey")
            .field("prefix", &self.prefix)
            .field("rendered", &redact(&self.rendered))
            .finish_non_exhaustive()
    }
}

/// Generates API keys and their storage digests.
#[derive(Debug, Clone, Default)]
pub struct ApiKeyManager {
    entropy: Entropy,
}

impl ApiKeyManager {
    /// Manager backed by the OS random source.
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a custom random source.
    pub fn with_entropy(mut self, entropy: Entropy) -> Self {
        self.entropy = entropy;
        self
    }

    /// Generate a new key with 192 bits of random material.
    pub fn generate_api_key(&self, prefix: ApiKeyPrefix) -> Result<ApiKey> {
        let material = self.entropy.array::<API_KEY_MATERIAL_LEN>()?;
        let rendered = Zeroizing::new(format!(
            "{}_{}",
            prefix.as_str(),
            URL_SAFE_NO_PAD.encode(material.as_slice())
        ));

        metrics().increment("api_key.generated");
        tracing::debug!(prefix = prefix.as_str(), "API key generated");

        Ok(ApiKey {
            prefix,
            material,
            rendered,
        })
    }

    /// Generate a key from a prefix given as a string.
    ///
    /// Unknown prefixes are a caller contract violation and fail with
    /// [`CryptoError::InvalidPrefix`].
    pub fn generate_from_symbol(&self, prefix: &str) -> Result<ApiKey> {
        self.generate_api_key(prefix.parse()?)
    }

    /// Deterministic SHA-256 fingerprint of a rendered key, lowercase hex.
    pub fn digest(rendered: &str) -> String {
        sha256_hex(rendered.as_bytes())
    }

    /// Check a presented key against a stored digest in constant time.
    pub fn verify_digest(presented: &str, stored_digest: &str) -> bool {
        constant_time_eq_str(&Self::digest(presented), stored_digest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::random::FailingEntropy;

    #[test]
    fn test_rendered_format() {
        let key = ApiKeyManager::new()
            .generate_api_key(ApiKeyPrefix::LiveSecret)
            .unwrap();

        let body = key.rendered().strip_prefix("sk_live_").unwrap();
        assert_eq!(body.len(), 32);
        assert!(body
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
        assert_eq!(key.material().len(), API_KEY_MATERIAL_LEN);
        assert_eq!(URL_SAFE_NO_PAD.decode(body).unwrap(), key.material());
    }

    #[test]
    fn test_keys_are_unique() {
        let manager = ApiKeyManager::new();
        let a = manager.generate_api_key(ApiKeyPrefix::TestSecret).unwrap();
        let b = manager.generate_api_key(ApiKeyPrefix::TestSecret).unwrap();
        assert_ne!(a.rendered(), b.rendered());
        assert_ne!(a.digest(), b.digest());
    }

    #[test]
    fn test_prefix_parsing() {
        assert_eq!("sk_test".parse::<ApiKeyPrefix>().unwrap(), ApiKeyPrefix::TestSecret);
        assert_eq!("live_public".parse::<ApiKeyPrefix>().unwrap(), ApiKeyPrefix::LivePublic);
        assert!(matches!(
            "sk_prod".parse::<ApiKeyPrefix>(),
            Err(CryptoError::InvalidPrefix(_))
        ));
    }

    #[test]
    fn test_generate_from_symbol_rejects_unknown() {
        let result = ApiKeyManager::new().generate_from_symbol("rk_live");
        assert!(matches!(result, Err(CryptoError::InvalidPrefix(_))));
    }

    #[test]
    fn test_of_rendered() {
        let manager = ApiKeyManager::new();
        for prefix in ApiKeyPrefix::ALL {
            let key = manager.generate_api_key(prefix).unwrap();
            assert_eq!(ApiKeyPrefix::of_rendered(key.rendered()).unwrap(), prefix);
        }
        assert!(ApiKeyPrefix::of_rendered("sk_liveX_abc").is_err());
        assert!(ApiKeyPrefix::of_rendered("whsec_abc").is_err());
    }

    #[test]
    fn test_prefix_flags() {
        assert!(ApiKeyPrefix::LiveSecret.is_live());
        assert!(ApiKeyPrefix::LiveSecret.is_secret());
        assert!(!ApiKeyPrefix::TestPublic.is_live());
        assert!(!ApiKeyPrefix::TestPublic.is_secret());
    }

    #[test]
    fn test_digest_is_deterministic_hex() {
        let rendered = "sk_test_AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA";
        let d1 = ApiKeyManager::digest(rendered);
        let d2 = ApiKeyManager::digest(rendered);
        assert_eq!(d1, d2);
        assert_eq!(d1.len(), 64);
        assert_eq!(
            d1,
            "709fb39c7a69d183e6a4e45135135eacf48226d0464ac30b1d666e5fa2407e80"
        );
    }

    #[test]
    fn test_verify_digest() {
        let key = ApiKeyManager::new()
            .generate_api_key(ApiKeyPrefix::LivePublic)
            .unwrap();
        let stored = key.digest();

        assert!(ApiKeyManager::verify_digest(key.rendered(), &stored));
        assert!(!ApiKeyManager::verify_digest("pk_live_forged", &stored));
    }

    #[test]
    fn test_debug_redacts_key() {
        let key = ApiKeyManager::new()
            .generate_api_key(ApiKeyPrefix::LiveSecret)
            .unwrap();
        let debug = format!("{key:?}");
        assert!(!debug.contains(key.rendered()));
        assert!(debug.contains("sk_live_"));
    }

    #[test]
    fn test_entropy_failure() {
        let manager = ApiKeyManager::new().with_entropy(Entropy::new(FailingEntropy));
        let result = manager.generate_api_key(ApiKeyPrefix::LiveSecret);
        assert!(matches!(result, Err(CryptoError::EntropySourceFailure(_))));
    }
}
