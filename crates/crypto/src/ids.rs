//! Prefixed, URL-safe external identifiers.
//!
//! Two body shapes are produced:
//!
//! - opaque: base64url of 12–24 random bytes, e.g. `ses_J8o0...`
//! - time-ordered: 9 base-36 characters of Unix milliseconds followed by 16
//!   hex characters of randomness, e.g. `txn_lp2x3k9qa1b2c3d4e5f60718`.
//!   Identifiers issued in later milliseconds sort after earlier ones.
//!
//! Every body carries at least 96 random bits, or a timestamp plus 64 random
//! bits for time-ordered identifiers.

use std::fmt;
use std::str::FromStr;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use paycore_telemetry::metrics;

use crate::clock::{system_clock, SharedClock};
use crate::random::Entropy;
use crate::{CryptoError, Result};

/// Random bytes appended to a time-ordered body (64 bits).
pub const TIME_ORDERED_RANDOM_LEN: usize = 8;
/// Width of the base-36 timestamp in a time-ordered body.
pub const TIMESTAMP_WIDTH: usize = 9;
/// Random bytes in an authorization code (48 bits).
pub const AUTH_CODE_LEN: usize = 6;
/// Random bytes in a settlement batch suffix (16 bits).
pub const SETTLEMENT_RANDOM_LEN: usize = 2;
/// Longest caller-supplied category prefix.
pub const MAX_PREFIX_LEN: usize = 16;

const BASE36: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Entity class of an identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum IdCategory {
    /// `txn`
    Transaction,
    /// `tok`
    CardToken,
    /// `ses`
    Session,
    /// `cs`
    CheckoutSession,
    /// `we`
    WebhookEndpoint,
    /// `idem`
    IdempotencyKey,
    /// Caller-supplied prefix: 1–16 lowercase ASCII letters or digits
    Generic(String),
}

impl IdCategory {
    /// Validated caller-supplied category.
    pub fn generic(prefix: impl Into<String>) -> Result<Self> {
        let prefix = prefix.into();
        validate_generic_prefix(&prefix)?;
        Ok(IdCategory::Generic(prefix))
    }

    /// Prefix rendered before the underscore.
    pub fn prefix(&self) -> &str {
        match self {
            IdCategory::Transaction => "txn",
            IdCategory::CardToken => "tok",
            IdCategory::Session => "ses",
            IdCategory::CheckoutSession => "cs",
            IdCategory::WebhookEndpoint => "we",
            IdCategory::IdempotencyKey => "idem",
            IdCategory::Generic(prefix) => prefix,
        }
    }

    /// Random bytes drawn for an opaque identifier of this category.
    pub fn random_len(&self) -> usize {
        match self {
            IdCategory::CardToken => 24,
            IdCategory::Session => 20,
            IdCategory::Transaction
            | IdCategory::CheckoutSession
            | IdCategory::IdempotencyKey => 16,
            IdCategory::WebhookEndpoint | IdCategory::Generic(_) => 12,
        }
    }
}

fn validate_generic_prefix(prefix: &str) -> Result<()> {
    let valid = !prefix.is_empty()
        && prefix.len() <= MAX_PREFIX_LEN
        && prefix
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit());
    if valid {
        Ok(())
    } else {
        Err(CryptoError::InvalidPrefix(prefix.to_string()))
    }
}

/// A rendered `{category}_{body}` identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Identifier {
    category: String,
    body: String,
}

impl Identifier {
    /// Category prefix.
    pub fn category(&self) -> &str {
        &self.category
    }

    /// Encoded body after the first underscore.
    pub fn body(&self) -> &str {
        &self.body
    }

    /// Milliseconds since the epoch encoded in a time-ordered body.
    ///
    /// `None` when the body is not time-ordered.
    pub fn timestamp_millis(&self) -> Option<u64> {
        let expected = TIMESTAMP_WIDTH + TIME_ORDERED_RANDOM_LEN * 2;
        if self.body.len() != expected {
            return None;
        }
        let (ts, random) = self.body.split_at(TIMESTAMP_WIDTH);
        if !random.bytes().all(|b| b.is_ascii_hexdigit()) {
            return None;
        }
        decode_base36(ts)
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.category, self.body)
    }
}

impl FromStr for Identifier {
    type Err = CryptoError;

    fn from_str(s: &str) -> Result<Self> {
        let (category, body) = s
            .split_once('_')
            .ok_or_else(|| CryptoError::InvalidPrefix(s.to_string()))?;

        let category_ok = !category.is_empty()
            && category.len() <= MAX_PREFIX_LEN
            && category.bytes().all(|b| b.is_ascii_alphanumeric());
        if !category_ok || body.is_empty() {
            return Err(CryptoError::InvalidPrefix(s.to_string()));
        }

        Ok(Self {
            category: category.to_string(),
            body: body.to_string(),
        })
    }
}

/// Fixed-width lowercase base-36 rendering of `value`.
fn encode_base36(mut value: u64, width: usize) -> String {
    let mut out = vec![b'0'; width];
    for slot in out.iter_mut().rev() {
        *slot = BASE36[(value % 36) as usize];
        value /= 36;
    }
    String::from_utf8_lossy(&out).into_owned()
}

fn decode_base36(s: &str) -> Option<u64> {
    s.bytes().try_fold(0u64, |acc, b| {
        let digit = BASE36.iter().position(|&c| c == b)? as u64;
        acc.checked_mul(36)?.checked_add(digit)
    })
}

/// Generates identifiers, authorization codes and settlement batch numbers.
#[derive(Clone)]
pub struct IdentifierGenerator {
    entropy: Entropy,
    clock: SharedClock,
}

impl Default for IdentifierGenerator {
    fn default() -> Self {
        Self {
            entropy: Entropy::os(),
            clock: system_clock(),
        }
    }
}

impl fmt::Debug for IdentifierGenerator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdentifierGenerator").finish_non_exhaustive()
    }
}

impl IdentifierGenerator {
    /// Generator backed by the OS random source and the system clock.
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a custom random source.
    pub fn with_entropy(mut self, entropy: Entropy) -> Self {
        self.entropy = entropy;
        self
    }

    /// Use a custom clock for time-ordered and date-based identifiers.
    pub fn with_clock(mut self, clock: SharedClock) -> Self {
        self.clock = clock;
        self
    }

    /// Opaque identifier with the category's random budget.
    pub fn generate(&self, category: &IdCategory) -> Result<Identifier> {
        if let IdCategory::Generic(prefix) = category {
            validate_generic_prefix(prefix)?;
        }

        let random = self.entropy.bytes(category.random_len())?;
        metrics().increment("identifier.generated");

        Ok(Identifier {
            category: category.prefix().to_string(),
            body: URL_SAFE_NO_PAD.encode(random.as_slice()),
        })
    }

    /// Roughly chronological identifier: base-36 milliseconds plus 64
    /// random bits.
    pub fn generate_time_ordered(&self, category: &IdCategory) -> Result<Identifier> {
        if let IdCategory::Generic(prefix) = category {
            validate_generic_prefix(prefix)?;
        }

        let millis = u64::try_from(self.clock.now().timestamp_millis()).unwrap_or(0);
        let random = self.entropy.array::<TIME_ORDERED_RANDOM_LEN>()?;
        metrics().increment("identifier.generated");

        Ok(Identifier {
            category: category.prefix().to_string(),
            body: format!(
                "{}{}",
                encode_base36(millis, TIMESTAMP_WIDTH),
                hex::encode(random.as_slice())
            ),
        })
    }

    /// Transaction identifier, time-ordered.
    pub fn transaction_id(&self) -> Result<Identifier> {
        self.generate_time_ordered(&IdCategory::Transaction)
    }

    /// Short uppercase hex code for manual entry (48 bits).
    ///
    /// For display and confirmation only; never use it as a credential.
    pub fn generate_auth_code(&self) -> Result<String> {
        let random = self.entropy.array::<AUTH_CODE_LEN>()?;
        Ok(hex::encode_upper(random.as_slice()))
    }

    /// Settlement batch number `SETTLE_{YYYYMMDD}_{XXXX}`.
    ///
    /// The 16 random bits only separate batches within a day; the number is
    /// not meant to be unguessable.
    pub fn generate_settlement_batch(&self) -> Result<String> {
        let date = self.clock.now().format("%Y%m%d");
        let random = self.entropy.array::<SETTLEMENT_RANDOM_LEN>()?;
        Ok(format!("SETTLE_{date}_{}", hex::encode_upper(random.as_slice())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::random::FailingEntropy;
    use std::sync::Arc;

    #[test]
    fn test_opaque_lengths() {
        let generator = IdentifierGenerator::new();
        for (category, chars) in [
            (IdCategory::Session, 27),
            (IdCategory::CheckoutSession, 22),
            (IdCategory::WebhookEndpoint, 16),
            (IdCategory::IdempotencyKey, 22),
            (IdCategory::CardToken, 32),
        ] {
            let id = generator.generate(&category).unwrap();
            assert_eq!(id.category(), category.prefix());
            assert_eq!(id.body().len(), chars, "{category:?}");
        }
    }

    #[test]
    fn test_minimum_entropy() {
        for category in [
            IdCategory::Transaction,
            IdCategory::CardToken,
            IdCategory::Session,
            IdCategory::CheckoutSession,
            IdCategory::WebhookEndpoint,
            IdCategory::IdempotencyKey,
            IdCategory::Generic("cus".into()),
        ] {
            assert!(category.random_len() * 8 >= 96, "{category:?}");
        }
    }

    #[test]
    fn test_rendered_form() {
        let id = IdentifierGenerator::new()
            .generate(&IdCategory::IdempotencyKey)
            .unwrap();
        let rendered = id.to_string();
        assert!(rendered.starts_with("idem_"));
        assert_eq!(rendered.parse::<Identifier>().unwrap(), id);
    }

    #[test]
    fn test_generic_prefix_validation() {
        assert!(IdCategory::generic("cus").is_ok());
        assert!(IdCategory::generic("ref2").is_ok());
        for bad in ["", "Cus", "c_s", "has space", "waytoolongprefix1"] {
            assert!(
                matches!(IdCategory::generic(bad), Err(CryptoError::InvalidPrefix(_))),
                "{bad:?}"
            );
        }

        let unchecked = IdCategory::Generic("BAD".into());
        let result = IdentifierGenerator::new().generate(&unchecked);
        assert!(matches!(result, Err(CryptoError::InvalidPrefix(_))));
    }

    #[test]
    fn test_time_ordered_layout() {
        let clock = Arc::new(FixedClock::at_unix(1_700_000_000));
        let generator = IdentifierGenerator::new().with_clock(clock);
        let id = generator.transaction_id().unwrap();

        assert_eq!(id.category(), "txn");
        assert_eq!(id.body().len(), 25);
        assert_eq!(id.timestamp_millis(), Some(1_700_000_000_000));
        assert!(id.body()[TIMESTAMP_WIDTH..]
            .bytes()
            .all(|b| b.is_ascii_hexdigit() && !b.is_ascii_uppercase()));
    }

    #[test]
    fn test_time_ordered_sorts_by_time() {
        let earlier = IdentifierGenerator::new()
            .with_clock(Arc::new(FixedClock::at_unix(1_700_000_000)))
            .generate_time_ordered(&IdCategory::CardToken)
            .unwrap();
        let later = IdentifierGenerator::new()
            .with_clock(Arc::new(FixedClock::at_unix(1_700_000_001)))
            .generate_time_ordered(&IdCategory::CardToken)
            .unwrap();

        assert!(later.to_string() > earlier.to_string());
    }

    #[test]
    fn test_base36() {
        assert_eq!(encode_base36(0, 9), "000000000");
        assert_eq!(encode_base36(35, 3), "00z");
        assert_eq!(encode_base36(36, 3), "010");
        assert_eq!(decode_base36("010"), Some(36));
        assert_eq!(decode_base36("0!0"), None);
        let ms = 1_700_000_000_123;
        assert_eq!(decode_base36(&encode_base36(ms, 9)), Some(ms));
    }

    #[test]
    fn test_opaque_body_has_no_timestamp() {
        let id = IdentifierGenerator::new()
            .generate(&IdCategory::Session)
            .unwrap();
        assert_eq!(id.timestamp_millis(), None);
    }

    #[test]
    fn test_auth_code() {
        let code = IdentifierGenerator::new().generate_auth_code().unwrap();
        assert_eq!(code.len(), 12);
        assert!(code
            .chars()
            .all(|c| c.is_ascii_digit() || ('A'..='F').contains(&c)));
    }

    #[test]
    fn test_settlement_batch() {
        let generator = IdentifierGenerator::new()
            .with_clock(Arc::new(FixedClock::at_unix(1_705_312_800))); // 2024-01-15
        let batch = generator.generate_settlement_batch().unwrap();

        assert!(batch.starts_with("SETTLE_20240115_"));
        assert_eq!(batch.len(), "SETTLE_20240115_".len() + 4);
        let parsed: Identifier = batch.parse().unwrap();
        assert_eq!(parsed.category(), "SETTLE");
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!("nounderscore".parse::<Identifier>().is_err());
        assert!("_body".parse::<Identifier>().is_err());
        assert!("txn_".parse::<Identifier>().is_err());
    }

    #[test]
    fn test_body_may_contain_underscore() {
        let id: Identifier = "ses_ab_cd".parse().unwrap();
        assert_eq!(id.category(), "ses");
        assert_eq!(id.body(), "ab_cd");
    }

    #[test]
    fn test_entropy_failure() {
        let generator = IdentifierGenerator::new().with_entropy(Entropy::new(FailingEntropy));
        assert!(matches!(
            generator.generate(&IdCategory::Session),
            Err(CryptoError::EntropySourceFailure(_))
        ));
        assert!(matches!(
            generator.transaction_id(),
            Err(CryptoError::EntropySourceFailure(_))
        ));
        assert!(generator.generate_auth_code().is_err());
    }
}
