//! Bounded worker pool for secret hashing.
//!
//! Argon2 holds a thread and tens of MiB of memory per call. Running it on a
//! dedicated, fixed-size pool caps both, so a burst of logins cannot starve
//! unrelated work on the caller's threads.

use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};

use crate::config::PoolConfig;
use crate::password::{SecretHash, SecretHasher};
use crate::{CryptoError, Result};

/// A [`SecretHasher`] that runs on its own bounded thread pool.
pub struct HashingPool {
    hasher: SecretHasher,
    pool: ThreadPool,
}

impl std::fmt::Debug for HashingPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HashingPool")
            .field("threads", &self.pool.current_num_threads())
            .field("hasher", &self.hasher)
            .finish()
    }
}

impl HashingPool {
    /// Create a pool with `config.threads` workers.
    pub fn new(hasher: SecretHasher, config: &PoolConfig) -> Result<Self> {
        if config.threads == 0 {
            return Err(CryptoError::Config("pool.threads must be at least 1".to_string()));
        }

        let pool = ThreadPoolBuilder::new()
            .num_threads(config.threads)
            .thread_name(|i| format!("paycore-hash-{i}"))
            .build()
            .map_err(|e| CryptoError::Config(format!("Failed to build hashing pool: {e}")))?;

        tracing::debug!(threads = config.threads, "Hashing pool started");
        Ok(Self { hasher, pool })
    }

    /// Number of worker threads.
    pub fn threads(&self) -> usize {
        self.pool.current_num_threads()
    }

    /// Hash on a pool worker. Blocks the caller until done.
    pub fn hash(&self, secret: &str) -> Result<SecretHash> {
        self.pool.install(|| self.hasher.hash(secret))
    }

    /// Verify on a pool worker. Blocks the caller until done.
    pub fn verify(&self, secret: &str, encoded: &str) -> Result<bool> {
        self.pool.install(|| self.hasher.verify(secret, encoded))
    }

    /// Hash many secrets in parallel, at most `threads` at a time.
    ///
    /// Results are returned in input order.
    pub fn hash_batch(&self, secrets: &[&str]) -> Vec<Result<SecretHash>> {
        self.pool
            .install(|| secrets.par_iter().map(|s| self.hasher.hash(s)).collect())
    }
}
