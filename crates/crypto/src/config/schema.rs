//! Configuration schema definitions

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Recommended minimum Argon2 memory cost in KiB (64 MiB).
pub const RECOMMENDED_MEMORY_KIB: u32 = 64 * 1024;
/// Recommended minimum Argon2 iterations.
pub const RECOMMENDED_TIME_COST: u32 = 3;
/// Recommended minimum Argon2 lanes.
pub const RECOMMENDED_PARALLELISM: u32 = 4;
/// Minimum salt length in bytes (128 bits).
pub const MIN_SALT_LEN: usize = 16;
/// Largest memory cost accepted from a stored hash by default (1 GiB).
pub const DEFAULT_MAX_MEMORY_KIB: u32 = 1024 * 1024;
/// Largest iteration count accepted from a stored hash by default.
pub const DEFAULT_MAX_TIME_COST: u32 = 32;
/// Largest lane count accepted from a stored hash by default.
pub const DEFAULT_MAX_PARALLELISM: u32 = 64;
/// Default webhook clock-skew tolerance.
pub const DEFAULT_TOLERANCE_SECS: u64 = 300;

/// Argon2 cost parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HashingConfig {
    /// Memory cost in KiB
    #[serde(default = "default_memory_kib")]
    pub memory_kib: u32,

    /// Number of iterations
    #[serde(default = "default_time_cost")]
    pub time_cost: u32,

    /// Degree of parallelism (lanes)
    #[serde(default = "default_parallelism")]
    pub parallelism: u32,

    /// Salt length in bytes
    #[serde(default = "default_salt_len")]
    pub salt_len: usize,

    /// Derived digest length in bytes
    #[serde(default = "default_output_len")]
    pub output_len: usize,

    /// Upper bound on the memory cost a stored hash may ask for
    #[serde(default = "default_max_memory_kib")]
    pub max_memory_kib: u32,

    /// Upper bound on the iterations a stored hash may ask for
    #[serde(default = "default_max_time_cost")]
    pub max_time_cost: u32,

    /// Upper bound on the lanes a stored hash may ask for
    #[serde(default = "default_max_parallelism")]
    pub max_parallelism: u32,
}

impl Default for HashingConfig {
    fn default() -> Self {
        Self {
            memory_kib: default_memory_kib(),
            time_cost: default_time_cost(),
            parallelism: default_parallelism(),
            salt_len: default_salt_len(),
            output_len: default_output_len(),
            max_memory_kib: default_max_memory_kib(),
            max_time_cost: default_max_time_cost(),
            max_parallelism: default_max_parallelism(),
        }
    }
}

impl HashingConfig {
    /// Whether every cost parameter meets the recommended floor.
    pub fn meets_recommended(&self) -> bool {
        self.memory_kib >= RECOMMENDED_MEMORY_KIB
            && self.time_cost >= RECOMMENDED_TIME_COST
            && self.parallelism >= RECOMMENDED_PARALLELISM
    }

    /// Whether the given costs fit under the configured upper bounds.
    pub fn within_limits(&self, memory_kib: u32, time_cost: u32, parallelism: u32) -> bool {
        memory_kib <= self.max_memory_kib
            && time_cost <= self.max_time_cost
            && parallelism <= self.max_parallelism
    }
}

fn default_memory_kib() -> u32 {
    RECOMMENDED_MEMORY_KIB
}

fn default_time_cost() -> u32 {
    RECOMMENDED_TIME_COST
}

fn default_parallelism() -> u32 {
    RECOMMENDED_PARALLELISM
}

fn default_salt_len() -> usize {
    MIN_SALT_LEN
}

fn default_output_len() -> usize {
    32
}

fn default_max_memory_kib() -> u32 {
    DEFAULT_MAX_MEMORY_KIB
}

fn default_max_time_cost() -> u32 {
    DEFAULT_MAX_TIME_COST
}

fn default_max_parallelism() -> u32 {
    DEFAULT_MAX_PARALLELISM
}

/// Unit used for webhook timestamps on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimestampUnit {
    /// Unix epoch seconds
    #[default]
    Seconds,
    /// Unix epoch milliseconds
    Milliseconds,
}

impl TimestampUnit {
    /// Express `at` as a Unix timestamp in this unit.
    pub fn timestamp_of(&self, at: &DateTime<Utc>) -> i64 {
        match self {
            TimestampUnit::Seconds => at.timestamp(),
            TimestampUnit::Milliseconds => at.timestamp_millis(),
        }
    }

    /// Number of units in `secs` seconds.
    pub fn from_secs(&self, secs: u64) -> i64 {
        let secs = i64::try_from(secs).unwrap_or(i64::MAX);
        match self {
            TimestampUnit::Seconds => secs,
            TimestampUnit::Milliseconds => secs.saturating_mul(1000),
        }
    }

    /// Seconds in `units` of this unit, rounded away from zero.
    ///
    /// A skew just past a whole-second tolerance still reports a value
    /// greater than the tolerance.
    pub fn to_secs(&self, units: i64) -> i64 {
        match self {
            TimestampUnit::Seconds => units,
            TimestampUnit::Milliseconds => {
                let whole = units / 1000;
                if units % 1000 == 0 {
                    whole
                } else {
                    whole + units.signum()
                }
            }
        }
    }
}

impl std::str::FromStr for TimestampUnit {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "s" | "sec" | "secs" | "seconds" => Ok(Self::Seconds),
            "ms" | "millis" | "milliseconds" => Ok(Self::Milliseconds),
            other => Err(format!("unknown timestamp unit '{other}'")),
        }
    }
}

/// Webhook signing configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebhookConfig {
    /// Maximum allowed |now - timestamp| in seconds
    #[serde(default = "default_tolerance_secs")]
    pub tolerance_secs: u64,

    /// Unit of the timestamps passed to sign/verify
    #[serde(default)]
    pub timestamp_unit: TimestampUnit,
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            tolerance_secs: default_tolerance_secs(),
            timestamp_unit: TimestampUnit::default(),
        }
    }
}

fn default_tolerance_secs() -> u64 {
    DEFAULT_TOLERANCE_SECS
}

/// Hashing worker pool configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolConfig {
    /// Number of worker threads
    #[serde(default = "default_threads")]
    pub threads: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            threads: default_threads(),
        }
    }
}

fn default_threads() -> usize {
    4
}
