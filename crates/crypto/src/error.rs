//! Error types for the crypto crate.

use thiserror::Error;

/// Result type alias for crypto operations.
pub type Result<T> = std::result::Result<T, CryptoError>;

/// Errors that can occur during crypto operations.
///
/// Failed verifications are not errors. A wrong password, an expired webhook
/// or a mismatched signature come back as `false` or a [`crate::Verdict`].
#[derive(Debug, Error)]
pub enum CryptoError {
    /// The memory-hard hash function could not complete (resource exhaustion)
    #[error("Hashing failed: {0}")]
    HashingFailure(String),

    /// A stored hash string could not be parsed
    #[error("Malformed hash: {0}")]
    MalformedHash(String),

    /// Unknown key prefix or identifier category
    #[error("Invalid prefix: {0}")]
    InvalidPrefix(String),

    /// The operating system random source is unavailable
    #[error("Entropy source failure: {0}")]
    EntropySourceFailure(String),

    /// Invalid key
    #[error("Invalid key: {0}")]
    InvalidKey(String),

    /// Invalid or unreadable configuration
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Error code for integration with platform error reporting.
/// Range: 11xxx for crypto errors.
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CryptoErrorCode {
    /// Hash function resource failure
    HashingFailure = 11001,
    /// Stored hash could not be parsed
    MalformedHash = 11002,
    /// Unknown prefix or category
    InvalidPrefix = 11003,
    /// Randomness unavailable
    EntropySourceFailure = 11004,
    /// Invalid key
    InvalidKey = 11005,
    /// Invalid configuration
    Config = 11006,
}

impl CryptoError {
    /// Returns the error code for this error.
    pub fn code(&self) -> CryptoErrorCode {
        match self {
            CryptoError::HashingFailure(_) => CryptoErrorCode::HashingFailure,
            CryptoError::MalformedHash(_) => CryptoErrorCode::MalformedHash,
            CryptoError::InvalidPrefix(_) => CryptoErrorCode::InvalidPrefix,
            CryptoError::EntropySourceFailure(_) => CryptoErrorCode::EntropySourceFailure,
            CryptoError::InvalidKey(_) => CryptoErrorCode::InvalidKey,
            CryptoError::Config(_) => CryptoErrorCode::Config,
        }
    }

    /// Whether the caller may retry the operation after a backoff.
    ///
    /// Only resource failures qualify. Format and contract errors will fail
    /// the same way every time.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            CryptoError::HashingFailure(_) | CryptoError::EntropySourceFailure(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(
            CryptoError::MalformedHash("x".into()).code() as u32,
            11002
        );
        assert_eq!(
            CryptoError::EntropySourceFailure("x".into()).code(),
            CryptoErrorCode::EntropySourceFailure
        );
    }

    #[test]
    fn test_retryable() {
        assert!(CryptoError::HashingFailure("oom".into()).is_retryable());
        assert!(CryptoError::EntropySourceFailure("gone".into()).is_retryable());
        assert!(!CryptoError::MalformedHash("bad".into()).is_retryable());
        assert!(!CryptoError::InvalidPrefix("xx".into()).is_retryable());
    }

    #[test]
    fn test_display() {
        let err = CryptoError::InvalidPrefix("sk_prod".into());
        assert_eq!(err.to_string(), "Invalid prefix: sk_prod");
    }
}
