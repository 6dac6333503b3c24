//! Cryptographic core for the payments platform.
//!
//! This crate provides:
//! - [`SecretHasher`]: Argon2 hashing and verification of passwords
//! - [`ApiKeyManager`]: prefixed API keys and their storage digests
//! - [`IdentifierGenerator`]: prefixed, URL-safe external identifiers
//! - [`WebhookSigner`]: timestamped HMAC-SHA256 webhook signatures
//! - Constant-time comparison for security
//!
//! Every component is stateless apart from its configuration and can be
//! shared across threads.
//!
//! # Example
//!
//! ```
//! use paycore_crypto::{ApiKeyManager, ApiKeyPrefix, WebhookSigner};
//!
//! let key = ApiKeyManager::new().generate_api_key(ApiKeyPrefix::TestSecret).unwrap();
//! assert!(key.rendered().starts_with("sk_test_"));
//! let stored = key.digest(); // persist this, never the key
//! assert!(ApiKeyManager::verify_digest(key.rendered(), &stored));
//!
//! let signer = WebhookSigner::default();
//! let signed = signer.sign_now(br#"{"amount":100}"#, b"whsec_abc").unwrap();
//! assert!(signer.verify_signed(&signed, b"whsec_abc"));
//! ```

#![warn(missing_docs)]

pub mod api_key;
pub mod clock;
pub mod config;
mod error;
mod hmac_impl;
pub mod ids;
pub mod password;
#[cfg(feature = "parallel")]
mod pool;
pub mod random;
mod timing;
pub mod webhook;

pub use api_key::{ApiKey, ApiKeyManager, ApiKeyPrefix};
pub use clock::{Clock, FixedClock, SystemClock};
pub use config::{CryptoConfig, HashingConfig, TimestampUnit, WebhookConfig};
pub use error::{CryptoError, CryptoErrorCode, Result};
pub use hmac_impl::{hmac_sha256, sha256_hex};
pub use ids::{IdCategory, Identifier, IdentifierGenerator};
pub use password::{HashAlgorithm, HashParams, SecretHash, SecretHasher};
#[cfg(feature = "parallel")]
pub use pool::HashingPool;
pub use random::{Entropy, EntropySource, OsEntropy};
pub use timing::{constant_time_compare, constant_time_eq_str};
pub use webhook::{SignedPayload, Verdict, WebhookSigner};
