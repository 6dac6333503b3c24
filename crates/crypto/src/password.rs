//! Memory-hard hashing and verification of user secrets.
//!
//! Hashes are Argon2 digests serialized into a self-describing string that
//! carries the algorithm, version, cost parameters, salt and digest:
//!
//! ```text
//! argon2id.v19.m65536-t3-p4.<base64url salt>.<base64url digest>
//! ```
//!
//! Only URL-safe characters appear. Verification reads the parameters back
//! out of the string, so retuning the hasher never invalidates stored hashes.
//! PHC strings (`$argon2id$v=19$m=...,t=...,p=...$salt$digest`) produced by
//! other Argon2 libraries are accepted as well.

use std::fmt;
use std::str::FromStr;

use argon2::{Argon2, Block, Params, Version};
use base64::engine::general_purpose::{STANDARD_NO_PAD, URL_SAFE_NO_PAD};
use base64::Engine;
use paycore_telemetry::{metrics, Timer};
use zeroize::Zeroizing;

use crate::config::HashingConfig;
use crate::random::Entropy;
use crate::timing::constant_time_compare;
use crate::{CryptoError, Result};

/// Shortest salt Argon2 accepts.
const MIN_ENCODED_SALT_LEN: usize = 8;
/// Shortest digest Argon2 can produce.
const MIN_ENCODED_DIGEST_LEN: usize = 4;

/// Argon2 variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HashAlgorithm {
    /// Hybrid variant, the default
    Argon2id,
    /// Data-independent variant
    Argon2i,
    /// Data-dependent variant
    Argon2d,
}

impl HashAlgorithm {
    /// Tag used in encoded hashes.
    pub fn tag(&self) -> &'static str {
        match self {
            HashAlgorithm::Argon2id => "argon2id",
            HashAlgorithm::Argon2i => "argon2i",
            HashAlgorithm::Argon2d => "argon2d",
        }
    }

    /// Look up a variant by its tag.
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "argon2id" => Some(HashAlgorithm::Argon2id),
            "argon2i" => Some(HashAlgorithm::Argon2i),
            "argon2d" => Some(HashAlgorithm::Argon2d),
            _ => None,
        }
    }

    fn to_argon2(self) -> argon2::Algorithm {
        match self {
            HashAlgorithm::Argon2id => argon2::Algorithm::Argon2id,
            HashAlgorithm::Argon2i => argon2::Algorithm::Argon2i,
            HashAlgorithm::Argon2d => argon2::Algorithm::Argon2d,
        }
    }
}

/// Cost parameters embedded in a hash.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HashParams {
    /// Memory cost in KiB
    pub memory_kib: u32,
    /// Iterations
    pub time_cost: u32,
    /// Lanes
    pub parallelism: u32,
}

impl From<&HashingConfig> for HashParams {
    fn from(config: &HashingConfig) -> Self {
        Self {
            memory_kib: config.memory_kib,
            time_cost: config.time_cost,
            parallelism: config.parallelism,
        }
    }
}

/// A parsed, self-describing secret hash.
///
/// `Display` renders the canonical URL-safe form; `FromStr` accepts the
/// canonical form and PHC strings.
#[derive(Clone, PartialEq, Eq)]
pub struct SecretHash {
    algorithm: HashAlgorithm,
    version: u32,
    params: HashParams,
    salt: Vec<u8>,
    digest: Vec<u8>,
}

impl SecretHash {
    /// Algorithm that produced this hash.
    pub fn algorithm(&self) -> HashAlgorithm {
        self.algorithm
    }

    /// Argon2 version number (16 or 19).
    pub fn version(&self) -> u32 {
        self.version
    }

    /// Cost parameters.
    pub fn params(&self) -> HashParams {
        self.params
    }

    /// Salt bytes.
    pub fn salt(&self) -> &[u8] {
        &self.salt
    }

    /// Length of the derived digest in bytes.
    pub fn digest_len(&self) -> usize {
        self.digest.len()
    }

    fn parse_canonical(s: &str) -> Result<Self> {
        let parts: Vec<&str> = s.split('.').collect();
        let [tag, version, params, salt, digest] = parts[..] else {
            return Err(malformed(format!(
                "expected 5 dot-separated fields, got {}",
                parts.len()
            )));
        };

        let algorithm = parse_algorithm(tag)?;
        let version = version
            .strip_prefix('v')
            .and_then(|v| v.parse::<u32>().ok())
            .ok_or_else(|| malformed(format!("invalid version field '{version}'")))?;
        let params = parse_params(params.split('-').map(|kv| kv.split_at_checked(1)))?;

        Self::assemble(
            algorithm,
            version,
            params,
            decode_b64(&URL_SAFE_NO_PAD, salt, "salt")?,
            decode_b64(&URL_SAFE_NO_PAD, digest, "digest")?,
        )
    }

    fn parse_phc(s: &str) -> Result<Self> {
        let mut fields = s.split('$');
        if fields.next() != Some("") {
            return Err(malformed("PHC string must start with '$'"));
        }
        let rest: Vec<&str> = fields.collect();

        // The version field is optional in PHC; absence means 0x10
        let (tag, version, params, salt, digest) = match rest[..] {
            [tag, v, params, salt, digest] => {
                let version = v
                    .strip_prefix("v=")
                    .and_then(|v| v.parse::<u32>().ok())
                    .ok_or_else(|| malformed(format!("invalid version field '{v}'")))?;
                (tag, version, params, salt, digest)
            }
            [tag, params, salt, digest] => (tag, 0x10, params, salt, digest),
            _ => return Err(malformed("unrecognized PHC layout")),
        };

        let algorithm = parse_algorithm(tag)?;
        let params = parse_params(params.split(',').map(|kv| {
            kv.split_once('=')
        }))?;

        Self::assemble(
            algorithm,
            version,
            params,
            decode_b64(&STANDARD_NO_PAD, salt, "salt")?,
            decode_b64(&STANDARD_NO_PAD, digest, "digest")?,
        )
    }

    fn assemble(
        algorithm: HashAlgorithm,
        version: u32,
        params: HashParams,
        salt: Vec<u8>,
        digest: Vec<u8>,
    ) -> Result<Self> {
        argon2_version(version)?;
        if salt.len() < MIN_ENCODED_SALT_LEN {
            return Err(malformed(format!("salt too short ({} bytes)", salt.len())));
        }
        if digest.len() < MIN_ENCODED_DIGEST_LEN {
            return Err(malformed(format!("digest too short ({} bytes)", digest.len())));
        }
        Ok(Self {
            algorithm,
            version,
            params,
            salt,
            digest,
        })
    }
}

impl fmt::Display for SecretHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.v{}.m{}-t{}-p{}.{}.{}",
            self.algorithm.tag(),
            self.version,
            self.params.memory_kib,
            self.params.time_cost,
            self.params.parallelism,
            URL_SAFE_NO_PAD.encode(&self.salt),
            URL_SAFE_NO_PAD.encode(&self.digest),
        )
    }
}

impl fmt::Debug for SecretHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecretHash")
            .field("algorithm", &self.algorithm)
            .field("version", &self.version)
            .field("params", &self.params)
            .finish_non_exhaustive()
    }
}

impl FromStr for SecretHash {
    type Err = CryptoError;

    fn from_str(s: &str) -> Result<Self> {
        if s.starts_with('$') {
            Self::parse_phc(s)
        } else {
            Self::parse_canonical(s)
        }
    }
}

fn malformed(msg: impl Into<String>) -> CryptoError {
    CryptoError::MalformedHash(msg.into())
}

fn parse_algorithm(tag: &str) -> Result<HashAlgorithm> {
    HashAlgorithm::from_tag(tag)
        .ok_or_else(|| malformed(format!("unrecognized algorithm tag '{tag}'")))
}

fn parse_params<'a, I>(pairs: I) -> Result<HashParams>
where
    I: Iterator<Item = Option<(&'a str, &'a str)>>,
{
    let (mut m, mut t, mut p) = (None, None, None);

    for pair in pairs {
        let (key, value) = pair.ok_or_else(|| malformed("invalid parameter block"))?;
        let value: u32 = value
            .parse()
            .map_err(|_| malformed(format!("invalid value for parameter '{key}'")))?;
        let slot = match key {
            "m" => &mut m,
            "t" => &mut t,
            "p" => &mut p,
            other => return Err(malformed(format!("unknown parameter '{other}'"))),
        };
        if slot.replace(value).is_some() {
            return Err(malformed(format!("duplicate parameter '{key}'")));
        }
    }

    match (m, t, p) {
        (Some(memory_kib), Some(time_cost), Some(parallelism)) => Ok(HashParams {
            memory_kib,
            time_cost,
            parallelism,
        }),
        _ => Err(malformed("missing cost parameter")),
    }
}

fn decode_b64<E: Engine>(engine: &E, field: &str, name: &str) -> Result<Vec<u8>> {
    engine
        .decode(field)
        .map_err(|e| malformed(format!("invalid {name} encoding: {e}")))
}

fn argon2_version(version: u32) -> Result<Version> {
    match version {
        0x10 => Ok(Version::V0x10),
        0x13 => Ok(Version::V0x13),
        other => Err(malformed(format!("unsupported version {other}"))),
    }
}

/// Hashes and verifies user secrets with Argon2.
///
/// Stateless apart from its configuration; share it freely across threads.
/// Both operations block for tens to hundreds of milliseconds, see
/// [`crate::HashingPool`] for running them off the caller's thread.
#[derive(Debug, Clone)]
pub struct SecretHasher {
    config: HashingConfig,
    entropy: Entropy,
}

impl Default for SecretHasher {
    fn default() -> Self {
        Self {
            config: HashingConfig::default(),
            entropy: Entropy::os(),
        }
    }
}

impl SecretHasher {
    /// Create a hasher with the given cost parameters.
    ///
    /// Fails with [`CryptoError::Config`] when Argon2 rejects the parameters
    /// or the salt is shorter than 128 bits.
    pub fn new(config: HashingConfig) -> Result<Self> {
        crate::CryptoConfig {
            hashing: config,
            ..Default::default()
        }
        .validate()?;

        Ok(Self {
            config,
            entropy: Entropy::os(),
        })
    }

    /// Use a custom random source for salts.
    pub fn with_entropy(mut self, entropy: Entropy) -> Self {
        self.entropy = entropy;
        self
    }

    /// Current cost parameters.
    pub fn config(&self) -> &HashingConfig {
        &self.config
    }

    /// Hash a secret with a fresh random salt.
    #[tracing::instrument(level = "debug", skip_all)]
    pub fn hash(&self, secret: &str) -> Result<SecretHash> {
        let timer = Timer::start("secret_hasher.hash_ms");

        let salt = self.entropy.bytes(self.config.salt_len)?;
        let params = HashParams::from(&self.config);
        let digest = derive(
            HashAlgorithm::Argon2id,
            Version::V0x13,
            params,
            secret.as_bytes(),
            &salt,
            self.config.output_len,
        )?;

        let elapsed = timer.stop();
        tracing::debug!(elapsed_ms = elapsed.as_millis() as u64, "Secret hashed");

        Ok(SecretHash {
            algorithm: HashAlgorithm::Argon2id,
            version: 0x13,
            params,
            salt: salt.to_vec(),
            digest: digest.to_vec(),
        })
    }

    /// Verify a secret against an encoded hash.
    ///
    /// Returns `Ok(false)` for a well-formed hash that does not match and
    /// `Err(MalformedHash)` when the string cannot be parsed.
    pub fn verify(&self, secret: &str, encoded: &str) -> Result<bool> {
        let hash = encoded.parse::<SecretHash>().inspect_err(|e| {
            tracing::warn!(error = %e, "Stored secret hash could not be parsed");
        })?;
        self.verify_hash(secret, &hash)
    }

    /// Verify a secret against a parsed hash.
    ///
    /// Cost parameters above the configured `max_*` bounds are rejected as
    /// [`CryptoError::MalformedHash`] before any memory is allocated.
    #[tracing::instrument(level = "debug", skip_all, fields(algorithm = hash.algorithm.tag()))]
    pub fn verify_hash(&self, secret: &str, hash: &SecretHash) -> Result<bool> {
        let _timer = Timer::start("secret_hasher.verify_ms");

        let HashParams {
            memory_kib,
            time_cost,
            parallelism,
        } = hash.params;
        if !self.config.within_limits(memory_kib, time_cost, parallelism) {
            tracing::warn!(memory_kib, time_cost, parallelism, "Stored hash exceeds cost limits");
            return Err(malformed(format!(
                "cost parameters m={memory_kib},t={time_cost},p={parallelism} exceed configured limits"
            )));
        }

        let version = argon2_version(hash.version)?;
        let computed = derive(
            hash.algorithm,
            version,
            hash.params,
            secret.as_bytes(),
            &hash.salt,
            hash.digest.len(),
        )?;

        let matched = constant_time_compare(&computed, &hash.digest);
        metrics().increment(if matched {
            "secret_hasher.verify.match"
        } else {
            "secret_hasher.verify.mismatch"
        });
        Ok(matched)
    }

    /// Whether `encoded` was produced with settings other than this hasher's.
    ///
    /// Callers typically check this after a successful verification and store
    /// a fresh hash when it returns true.
    pub fn needs_rehash(&self, encoded: &str) -> Result<bool> {
        let hash: SecretHash = encoded.parse()?;
        Ok(hash.algorithm != HashAlgorithm::Argon2id
            || hash.version != 0x13
            || hash.params != HashParams::from(&self.config)
            || hash.salt.len() < self.config.salt_len
            || hash.digest.len() != self.config.output_len)
    }
}

fn derive(
    algorithm: HashAlgorithm,
    version: Version,
    params: HashParams,
    secret: &[u8],
    salt: &[u8],
    output_len: usize,
) -> Result<Zeroizing<Vec<u8>>> {
    let argon_params = Params::new(
        params.memory_kib,
        params.time_cost,
        params.parallelism,
        Some(output_len),
    )
    .map_err(|e| malformed(format!("invalid Argon2 parameters: {e}")))?;

    let blocks = allocate_blocks(argon_params.block_count())?;
    let argon2 = Argon2::new(algorithm.to_argon2(), version, argon_params);

    let mut out = Zeroizing::new(vec![0u8; output_len]);
    argon2
        .hash_password_into_with_memory(secret, salt, &mut out, blocks)
        .map_err(|e| CryptoError::HashingFailure(format!("Argon2 derivation failed: {e}")))?;

    Ok(out)
}

/// Working memory for one derivation; allocation failure is an error, not an abort.
fn allocate_blocks(count: usize) -> Result<Vec<Block>> {
    let mut blocks = Vec::new();
    blocks.try_reserve_exact(count).map_err(|e| {
        CryptoError::HashingFailure(format!("cannot allocate {count} Argon2 blocks: {e}"))
    })?;
    blocks.resize(count, Block::default());
    Ok(blocks)
}
