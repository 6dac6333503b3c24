//! Timestamped webhook signatures with replay protection.
//!
//! The signed material is always `"{timestamp}.{raw payload bytes}"`, keyed
//! with the endpoint's shared secret under HMAC-SHA256 and rendered as
//! lowercase hex. Verification recomputes the signature over the exact bytes
//! received and rejects timestamps outside the configured tolerance window,
//! so a captured request cannot be replayed later.
//!
//! Timestamps are integers in the unit fixed by
//! [`WebhookConfig::timestamp_unit`] (seconds by default). The tolerance is
//! always configured in seconds.

use std::fmt;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use paycore_telemetry::metrics;

use crate::clock::{system_clock, SharedClock};
use crate::config::WebhookConfig;
use crate::hmac_impl::hmac_sha256_parts;
use crate::random::Entropy;
use crate::timing::constant_time_eq_str;
use crate::{CryptoError, Result};

/// Prefix of generated endpoint secrets.
pub const SECRET_PREFIX: &str = "whsec_";

/// Outcome of a signature check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Timestamp inside the window and signature matches
    Valid,
    /// Timestamp outside the tolerance window; `skew_secs` is `now - timestamp`
    Expired {
        /// Signed clock skew in seconds, partial seconds rounded away from zero
        skew_secs: i64,
    },
    /// Signature does not match payload, timestamp and secret
    Mismatch,
}

impl Verdict {
    /// Whether the request should be accepted.
    pub fn is_valid(&self) -> bool {
        matches!(self, Verdict::Valid)
    }

    /// Short reason code for logs and metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            Verdict::Valid => "valid",
            Verdict::Expired { .. } => "expired",
            Verdict::Mismatch => "mismatch",
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A payload together with its timestamp and signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedPayload {
    /// Exact bytes that were signed
    pub payload: Vec<u8>,
    /// Timestamp in the signer's configured unit
    pub timestamp: i64,
    /// Lowercase hex HMAC-SHA256
    pub signature: String,
}

/// Signs and verifies webhook payloads.
#[derive(Clone)]
pub struct WebhookSigner {
    config: WebhookConfig,
    clock: SharedClock,
    entropy: Entropy,
}

impl Default for WebhookSigner {
    fn default() -> Self {
        Self::new(WebhookConfig::default())
    }
}

impl fmt::Debug for WebhookSigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WebhookSigner")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl WebhookSigner {
    /// Signer using the system clock.
    pub fn new(config: WebhookConfig) -> Self {
        Self {
            config,
            clock: system_clock(),
            entropy: Entropy::os(),
        }
    }

    /// Use a custom clock as `now`.
    pub fn with_clock(mut self, clock: SharedClock) -> Self {
        self.clock = clock;
        self
    }

    /// Use a custom random source for [`WebhookSigner::generate_secret`].
    pub fn with_entropy(mut self, entropy: Entropy) -> Self {
        self.entropy = entropy;
        self
    }

    /// Active configuration.
    pub fn config(&self) -> &WebhookConfig {
        &self.config
    }

    /// Current time in the configured timestamp unit.
    pub fn now(&self) -> i64 {
        self.config.timestamp_unit.timestamp_of(&self.clock.now())
    }

    /// HMAC-SHA256 over `"{timestamp}.{payload}"`, lowercase hex.
    ///
    /// Fails with [`CryptoError::InvalidKey`] for an empty secret.
    pub fn sign(payload: &[u8], secret: &[u8], timestamp: i64) -> Result<String> {
        if secret.is_empty() {
            return Err(CryptoError::InvalidKey("webhook secret is empty".to_string()));
        }
        let ts = timestamp.to_string();
        hmac_sha256_parts(secret, &[ts.as_bytes(), b".".as_slice(), payload])
    }

    /// Sign `payload` stamped with the current time.
    pub fn sign_now(&self, payload: &[u8], secret: &[u8]) -> Result<SignedPayload> {
        let timestamp = self.now();
        let signature = Self::sign(payload, secret, timestamp)?;
        Ok(SignedPayload {
            payload: payload.to_vec(),
            timestamp,
            signature,
        })
    }

    /// Check a signature with the configured tolerance.
    pub fn check(&self, payload: &[u8], signature: &str, secret: &[u8], timestamp: i64) -> Verdict {
        self.check_with_tolerance(payload, signature, secret, timestamp, self.config.tolerance_secs)
    }

    /// Check a signature with an explicit tolerance in seconds.
    ///
    /// The window check runs first; the signature comparison is constant
    /// time and never short-circuits.
    pub fn check_with_tolerance(
        &self,
        payload: &[u8],
        signature: &str,
        secret: &[u8],
        timestamp: i64,
        tolerance_secs: u64,
    ) -> Verdict {
        let unit = self.config.timestamp_unit;
        let skew = self.now().saturating_sub(timestamp);
        let tolerance = unit.from_secs(tolerance_secs).unsigned_abs();

        let verdict = if skew.unsigned_abs() > tolerance {
            Verdict::Expired {
                skew_secs: unit.to_secs(skew),
            }
        } else {
            match Self::sign(payload, secret, timestamp) {
                Ok(expected) if constant_time_eq_str(&expected, signature) => Verdict::Valid,
                Ok(_) => Verdict::Mismatch,
                Err(e) => {
                    tracing::warn!(error = %e, "Webhook secret unusable");
                    Verdict::Mismatch
                }
            }
        };

        metrics().increment(&format!("webhook.verify.{}", verdict.as_str()));
        match verdict {
            Verdict::Valid => tracing::debug!(timestamp, "Webhook signature verified"),
            Verdict::Expired { skew_secs } => {
                tracing::warn!(timestamp, skew_secs, tolerance_secs, "Webhook timestamp outside tolerance")
            }
            Verdict::Mismatch => tracing::warn!(timestamp, "Webhook signature mismatch"),
        }

        verdict
    }

    /// Verify a signature with the configured tolerance.
    pub fn verify(&self, payload: &[u8], signature: &str, secret: &[u8], timestamp: i64) -> bool {
        self.check(payload, signature, secret, timestamp).is_valid()
    }

    /// Verify a signature with an explicit tolerance in seconds.
    pub fn verify_with_tolerance(
        &self,
        payload: &[u8],
        signature: &str,
        secret: &[u8],
        timestamp: i64,
        tolerance_secs: u64,
    ) -> bool {
        self.check_with_tolerance(payload, signature, secret, timestamp, tolerance_secs)
            .is_valid()
    }

    /// Verify a [`SignedPayload`] with the configured tolerance.
    pub fn verify_signed(&self, signed: &SignedPayload, secret: &[u8]) -> bool {
        self.verify(&signed.payload, &signed.signature, secret, signed.timestamp)
    }

    /// New endpoint secret: `whsec_` followed by 256 random bits, base64url.
    pub fn generate_secret(&self) -> Result<String> {
        let material = self.entropy.array::<32>()?;
        Ok(format!("{SECRET_PREFIX}{}", URL_SAFE_NO_PAD.encode(material.as_slice())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::config::TimestampUnit;
    use std::sync::Arc;

    const NOW: i64 = 1_700_000_000;

    fn signer_at(now: i64) -> WebhookSigner {
        WebhookSigner::default().with_clock(Arc::new(FixedClock::at_unix(now)))
    }

    #[test]
    fn test_conformance_vector() {
        let sig = WebhookSigner::sign(br#"{"amount":100}"#, b"whsec_abc", 1_700_000_000).unwrap();
        assert_eq!(
            sig,
            "1ee76345cd9a4ef12c96756d89366bb000860fbdd4f583b48f6a68b6f254d561"
        );
    }

    #[test]
    fn test_sign_and_verify() {
        let signer = signer_at(NOW);
        let sig = WebhookSigner::sign(b"payload", b"secret", NOW - 10).unwrap();
        assert_eq!(signer.check(b"payload", &sig, b"secret", NOW - 10), Verdict::Valid);
    }

    #[test]
    fn test_expired_and_future() {
        let signer = signer_at(NOW);

        let old = WebhookSigner::sign(b"p", b"k", NOW - 400).unwrap();
        assert_eq!(
            signer.check(b"p", &old, b"k", NOW - 400),
            Verdict::Expired { skew_secs: 400 }
        );

        let future = WebhookSigner::sign(b"p", b"k", NOW + 301).unwrap();
        assert_eq!(
            signer.check(b"p", &future, b"k", NOW + 301),
            Verdict::Expired { skew_secs: -301 }
        );
    }

    #[test]
    fn test_tolerance_boundary_is_inclusive() {
        let signer = signer_at(NOW);
        let sig = WebhookSigner::sign(b"p", b"k", NOW - 300).unwrap();
        assert!(signer.verify(b"p", &sig, b"k", NOW - 300));
    }

    #[test]
    fn test_custom_tolerance() {
        let signer = signer_at(NOW);
        let sig = WebhookSigner::sign(b"p", b"k", NOW - 400).unwrap();
        assert!(!signer.verify(b"p", &sig, b"k", NOW - 400));
        assert!(signer.verify_with_tolerance(b"p", &sig, b"k", NOW - 400, 600));
    }

    #[test]
    fn test_mismatch_cases() {
        let signer = signer_at(NOW);
        let sig = WebhookSigner::sign(b"payload", b"secret", NOW).unwrap();

        assert_eq!(signer.check(b"payloaD", &sig, b"secret", NOW), Verdict::Mismatch);
        assert_eq!(signer.check(b"payload", &sig, b"other", NOW), Verdict::Mismatch);
        assert_eq!(signer.check(b"payload", &sig, b"secret", NOW - 1), Verdict::Mismatch);
        assert_eq!(signer.check(b"payload", &sig[..63], b"secret", NOW), Verdict::Mismatch);
        assert_eq!(signer.check(b"payload", "", b"secret", NOW), Verdict::Mismatch);
        assert_eq!(signer.check(b"payload", &sig, b"", NOW), Verdict::Mismatch);
    }

    #[test]
    fn test_empty_secret_rejected() {
        assert!(matches!(
            WebhookSigner::sign(b"p", b"", NOW),
            Err(CryptoError::InvalidKey(_))
        ));
    }

    #[test]
    fn test_milliseconds_unit() {
        let config = WebhookConfig {
            timestamp_unit: TimestampUnit::Milliseconds,
            ..Default::default()
        };
        let signer = WebhookSigner::new(config).with_clock(Arc::new(FixedClock::at_unix(NOW)));

        let signed = signer.sign_now(b"p", b"k").unwrap();
        assert_eq!(signed.timestamp, NOW * 1000);
        assert!(signer.verify_signed(&signed, b"k"));

        let ts = NOW * 1000 - 299_000;
        let sig = WebhookSigner::sign(b"p", b"k", ts).unwrap();
        assert!(signer.verify(b"p", &sig, b"k", ts));

        let ts = NOW * 1000 - 301_000;
        let sig = WebhookSigner::sign(b"p", b"k", ts).unwrap();
        assert_eq!(
            signer.check(b"p", &sig, b"k", ts),
            Verdict::Expired { skew_secs: 301 }
        );
    }

    #[test]
    fn test_millisecond_skew_just_past_tolerance_reports_above_it() {
        let config = WebhookConfig {
            timestamp_unit: TimestampUnit::Milliseconds,
            ..Default::default()
        };
        let signer = WebhookSigner::new(config).with_clock(Arc::new(FixedClock::at_unix(NOW)));

        let ts = NOW * 1000 - 300_500;
        let sig = WebhookSigner::sign(b"p", b"k", ts).unwrap();
        assert_eq!(
            signer.check(b"p", &sig, b"k", ts),
            Verdict::Expired { skew_secs: 301 }
        );

        let ts = NOW * 1000 + 300_001;
        let sig = WebhookSigner::sign(b"p", b"k", ts).unwrap();
        assert_eq!(
            signer.check(b"p", &sig, b"k", ts),
            Verdict::Expired { skew_secs: -301 }
        );
    }

    #[test]
    fn test_seconds_signer_rejects_millisecond_timestamps() {
        let signer = signer_at(NOW);
        let ts = NOW * 1000;
        let sig = WebhookSigner::sign(b"p", b"k", ts).unwrap();
        assert!(!signer.verify(b"p", &sig, b"k", ts));
    }

    #[test]
    fn test_sign_now_uses_clock() {
        let signer = signer_at(NOW);
        let signed = signer.sign_now(b"{}", b"k").unwrap();
        assert_eq!(signed.timestamp, NOW);
        assert_eq!(signed.signature, WebhookSigner::sign(b"{}", b"k", NOW).unwrap());
    }

    #[test]
    fn test_extreme_timestamps_do_not_overflow() {
        let signer = signer_at(NOW);
        let sig = WebhookSigner::sign(b"p", b"k", i64::MIN).unwrap();
        assert!(matches!(
            signer.check(b"p", &sig, b"k", i64::MIN),
            Verdict::Expired { .. }
        ));
    }

    #[test]
    fn test_generate_secret() {
        let signer = WebhookSigner::default();
        let a = signer.generate_secret().unwrap();
        let b = signer.generate_secret().unwrap();
        assert!(a.starts_with(SECRET_PREFIX));
        assert_eq!(a.len(), SECRET_PREFIX.len() + 43);
        assert_ne!(a, b);
    }

    #[test]
    fn test_verdict_strings() {
        assert_eq!(Verdict::Valid.to_string(), "valid");
        assert_eq!(Verdict::Expired { skew_secs: 1 }.as_str(), "expired");
        assert!(!Verdict::Mismatch.is_valid());
    }
}
