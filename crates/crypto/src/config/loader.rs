//! Configuration file loading

use std::path::Path;

use serde::{Deserialize, Serialize};

use super::schema::{HashingConfig, PoolConfig, WebhookConfig, MIN_SALT_LEN};
use crate::{CryptoError, Result};

/// Prefix for environment variable overrides.
pub const ENV_PREFIX: &str = "PAYCORE_";

/// Root configuration for the crypto core
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CryptoConfig {
    /// Argon2 cost parameters
    #[serde(default)]
    pub hashing: HashingConfig,

    /// Webhook signing settings
    #[serde(default)]
    pub webhook: WebhookConfig,

    /// Hashing worker pool settings
    #[serde(default)]
    pub pool: PoolConfig,
}

impl CryptoConfig {
    /// Load configuration from a file path or standard locations, apply
    /// `PAYCORE_*` environment overrides and validate the result.
    ///
    /// Falls back to defaults when no file is found.
    pub fn load(path: Option<&str>) -> Result<Self> {
        let config_path = path.map(String::from).or_else(find_config_file);

        let mut config = match config_path {
            Some(ref p) => load_config_file(p)?,
            None => Self::default(),
        };
        config.apply_env_overrides()?;
        config.validate()?;

        tracing::debug!(
            path = config_path.as_deref().unwrap_or("<defaults>"),
            memory_kib = config.hashing.memory_kib,
            tolerance_secs = config.webhook.tolerance_secs,
            "Crypto configuration loaded"
        );

        Ok(config)
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content)
            .map_err(|e| CryptoError::Config(format!("Failed to parse config: {e}")))
    }

    /// Apply overrides from the process environment.
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        self.apply_overrides_from(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary key lookup.
    ///
    /// Recognized keys (all prefixed with `PAYCORE_`): `ARGON2_MEMORY_KIB`,
    /// `ARGON2_TIME_COST`, `ARGON2_PARALLELISM`, `ARGON2_MAX_MEMORY_KIB`,
    /// `WEBHOOK_TOLERANCE_SECS`,
    /// `WEBHOOK_TIMESTAMP_UNIT`, `HASH_POOL_THREADS`.
    pub fn apply_overrides_from<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(&format!("{ENV_PREFIX}{name}"));

        if let Some(v) = get("ARGON2_MEMORY_KIB") {
            self.hashing.memory_kib = parse_override("ARGON2_MEMORY_KIB", &v)?;
        }
        if let Some(v) = get("ARGON2_TIME_COST") {
            self.hashing.time_cost = parse_override("ARGON2_TIME_COST", &v)?;
        }
        if let Some(v) = get("ARGON2_PARALLELISM") {
            self.hashing.parallelism = parse_override("ARGON2_PARALLELISM", &v)?;
        }
        if let Some(v) = get("ARGON2_MAX_MEMORY_KIB") {
            self.hashing.max_memory_kib = parse_override("ARGON2_MAX_MEMORY_KIB", &v)?;
        }
        if let Some(v) = get("WEBHOOK_TOLERANCE_SECS") {
            self.webhook.tolerance_secs = parse_override("WEBHOOK_TOLERANCE_SECS", &v)?;
        }
        if let Some(v) = get("WEBHOOK_TIMESTAMP_UNIT") {
            self.webhook.timestamp_unit = v
                .parse()
                .map_err(|e| CryptoError::Config(format!("{ENV_PREFIX}WEBHOOK_TIMESTAMP_UNIT: {e}")))?;
        }
        if let Some(v) = get("HASH_POOL_THREADS") {
            self.pool.threads = parse_override("HASH_POOL_THREADS", &v)?;
        }

        Ok(())
    }

    /// Check that the configuration is usable.
    pub fn validate(&self) -> Result<()> {
        let h = &self.hashing;

        argon2::Params::new(h.memory_kib, h.time_cost, h.parallelism, Some(h.output_len))
            .map_err(|e| CryptoError::Config(format!("Invalid Argon2 parameters: {e}")))?;

        if !h.within_limits(h.memory_kib, h.time_cost, h.parallelism) {
            return Err(CryptoError::Config(format!(
                "Argon2 costs m={},t={},p={} exceed the configured maximums m={},t={},p={}",
                h.memory_kib, h.time_cost, h.parallelism, h.max_memory_kib, h.max_time_cost, h.max_parallelism
            )));
        }
        if h.salt_len < MIN_SALT_LEN {
            return Err(CryptoError::Config(format!(
                "salt_len must be at least {MIN_SALT_LEN} bytes, got {}",
                h.salt_len
            )));
        }
        if h.output_len < 16 {
            return Err(CryptoError::Config(format!(
                "output_len must be at least 16 bytes, got {}",
                h.output_len
            )));
        }
        if self.pool.threads == 0 {
            return Err(CryptoError::Config("pool.threads must be at least 1".to_string()));
        }

        if !h.meets_recommended() {
            tracing::warn!(
                memory_kib = h.memory_kib,
                time_cost = h.time_cost,
                parallelism = h.parallelism,
                "Argon2 parameters are below the recommended minimum"
            );
        }

        Ok(())
    }
}

fn parse_override<T: std::str::FromStr>(name: &str, value: &str) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| CryptoError::Config(format!("{ENV_PREFIX}{name}: {e}")))
}

/// Find configuration file in standard locations
fn find_config_file() -> Option<String> {
    let candidates = ["paycore.toml", ".paycore.toml", ".config/paycore.toml"];

    candidates
        .into_iter()
        .find(|candidate| Path::new(candidate).exists())
        .map(String::from)
}

/// Load and parse a TOML configuration file
fn load_config_file(path: &str) -> Result<CryptoConfig> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| CryptoError::Config(format!("Failed to read config file {path}: {e}")))?;

    toml::from_str(&content)
        .map_err(|e| CryptoError::Config(format!("Failed to parse config file {path}: {e}")))
}
