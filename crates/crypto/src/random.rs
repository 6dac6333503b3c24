//! Secure random byte source shared by every component.

use std::fmt;
use std::sync::Arc;

use zeroize::Zeroizing;

use crate::{CryptoError, Result};

/// A source of cryptographically secure random bytes.
///
/// Implementations must be safe to call from many threads at once.
pub trait EntropySource: Send + Sync {
    /// Fill `buf` entirely with random bytes.
    fn fill(&self, buf: &mut [u8]) -> Result<()>;
}

/// The operating system CSPRNG (`getrandom`).
#[derive(Debug, Clone, Copy, Default)]
pub struct OsEntropy;

impl EntropySource for OsEntropy {
    fn fill(&self, buf: &mut [u8]) -> Result<()> {
        getrandom::getrandom(buf).map_err(|e| {
            tracing::error!(error = %e, "OS random source unavailable");
            CryptoError::EntropySourceFailure(e.to_string())
        })
    }
}

/// Shared handle to an entropy source.
#[derive(Clone)]
pub struct Entropy(Arc<dyn EntropySource>);

impl Entropy {
    /// Wrap a custom source.
    pub fn new(source: impl EntropySource + 'static) -> Self {
        Self(Arc::new(source))
    }

    /// The operating system source.
    pub fn os() -> Self {
        Self::new(OsEntropy)
    }

    /// Fill `buf` with random bytes.
    pub fn fill(&self, buf: &mut [u8]) -> Result<()> {
        self.0.fill(buf)
    }

    /// Draw `N` random bytes, wiped from memory when dropped.
    pub fn array<const N: usize>(&self) -> Result<Zeroizing<[u8; N]>> {
        let mut out = Zeroizing::new([0u8; N]);
        self.fill(out.as_mut_slice())?;
        Ok(out)
    }

    /// Draw `len` random bytes, wiped from memory when dropped.
    pub fn bytes(&self, len: usize) -> Result<Zeroizing<Vec<u8>>> {
        let mut out = Zeroizing::new(vec![0u8; len]);
        self.fill(&mut out)?;
        Ok(out)
    }
}

impl Default for Entropy {
    fn default() -> Self {
        Self::os()
    }
}

impl fmt::Debug for Entropy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Entropy")
    }
}

/// A source that always fails.
#[cfg(test)]
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct FailingEntropy;

#[cfg(test)]
impl EntropySource for FailingEntropy {
    fn fill(&self, _buf: &mut [u8]) -> Result<()> {
        Err(CryptoError::EntropySourceFailure(
            "entropy source unavailable".to_string(),
        ))
    }
}
