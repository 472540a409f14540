//! Pluggable digest algorithm selection
//!
//! Every tree is parameterized by exactly one [`HashAlgorithm`]; digests from
//! different algorithms are never mixed within a tree. The enum maps to the
//! RustCrypto `sha2`/`sha3` implementations and exposes both a one-shot hash
//! and a streaming hasher for the leaf writer.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sha2::digest::DynDigest;
use sha2::{Digest, Sha224, Sha256, Sha384, Sha512};
use sha3::{Sha3_224, Sha3_256, Sha3_384, Sha3_512};

use crate::error::MerkleError;

/// Digest algorithm used for every hash in a tree
///
/// The string identifiers (`"sha-256"`, `"sha3-512"`, ...) are the ones used
/// in the persisted JSON snapshot and accepted by [`FromStr`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HashAlgorithm {
    #[serde(rename = "sha-224")]
    Sha224,
    #[serde(rename = "sha-256")]
    Sha256,
    #[serde(rename = "sha-384")]
    Sha384,
    #[serde(rename = "sha-512")]
    Sha512,
    #[serde(rename = "sha3-224")]
    Sha3_224,
    #[serde(rename = "sha3-256")]
    Sha3_256,
    #[serde(rename = "sha3-384")]
    Sha3_384,
    #[serde(rename = "sha3-512")]
    Sha3_512,
}

impl HashAlgorithm {
    /// All supported algorithms, in identifier order
    pub const ALL: [HashAlgorithm; 8] = [
        HashAlgorithm::Sha224,
        HashAlgorithm::Sha256,
        HashAlgorithm::Sha384,
        HashAlgorithm::Sha512,
        HashAlgorithm::Sha3_224,
        HashAlgorithm::Sha3_256,
        HashAlgorithm::Sha3_384,
        HashAlgorithm::Sha3_512,
    ];

    /// String identifier as used in snapshots (`"sha-256"`, ...)
    pub fn as_str(&self) -> &'static str {
        match self {
            HashAlgorithm::Sha224 => "sha-224",
            HashAlgorithm::Sha256 => "sha-256",
            HashAlgorithm::Sha384 => "sha-384",
            HashAlgorithm::Sha512 => "sha-512",
            HashAlgorithm::Sha3_224 => "sha3-224",
            HashAlgorithm::Sha3_256 => "sha3-256",
            HashAlgorithm::Sha3_384 => "sha3-384",
            HashAlgorithm::Sha3_512 => "sha3-512",
        }
    }

    /// Digest size in bytes
    pub fn digest_size(&self) -> usize {
        match self {
            HashAlgorithm::Sha224 | HashAlgorithm::Sha3_224 => 28,
            HashAlgorithm::Sha256 | HashAlgorithm::Sha3_256 => 32,
            HashAlgorithm::Sha384 | HashAlgorithm::Sha3_384 => 48,
            HashAlgorithm::Sha512 | HashAlgorithm::Sha3_512 => 64,
        }
    }

    /// One-shot hash of `data`
    pub fn hash(&self, data: &[u8]) -> Vec<u8> {
        match self {
            HashAlgorithm::Sha224 => Sha224::digest(data).to_vec(),
            HashAlgorithm::Sha256 => Sha256::digest(data).to_vec(),
            HashAlgorithm::Sha384 => Sha384::digest(data).to_vec(),
            HashAlgorithm::Sha512 => Sha512::digest(data).to_vec(),
            HashAlgorithm::Sha3_224 => Sha3_224::digest(data).to_vec(),
            HashAlgorithm::Sha3_256 => Sha3_256::digest(data).to_vec(),
            HashAlgorithm::Sha3_384 => Sha3_384::digest(data).to_vec(),
            HashAlgorithm::Sha3_512 => Sha3_512::digest(data).to_vec(),
        }
    }

    /// Streaming hasher for incremental digest computation
    ///
    /// Used by the leaf writer so large payloads are never buffered whole.
    pub fn hasher(&self) -> Box<dyn DynDigest> {
        match self {
            HashAlgorithm::Sha224 => Box::new(Sha224::new()),
            HashAlgorithm::Sha256 => Box::new(Sha256::new()),
            HashAlgorithm::Sha384 => Box::new(Sha384::new()),
            HashAlgorithm::Sha512 => Box::new(Sha512::new()),
            HashAlgorithm::Sha3_224 => Box::new(Sha3_224::new()),
            HashAlgorithm::Sha3_256 => Box::new(Sha3_256::new()),
            HashAlgorithm::Sha3_384 => Box::new(Sha3_384::new()),
            HashAlgorithm::Sha3_512 => Box::new(Sha3_512::new()),
        }
    }

    /// Hash the concatenation of two raw digests, left then right
    ///
    /// This is the pairing operation used at every interior tree node.
    pub fn hash_pair(&self, left: &[u8], right: &[u8]) -> Vec<u8> {
        let mut hasher = self.hasher();
        hasher.update(left);
        hasher.update(right);
        hasher.finalize().to_vec()
    }
}

impl fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HashAlgorithm {
    type Err = MerkleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sha-224" => Ok(HashAlgorithm::Sha224),
            "sha-256" => Ok(HashAlgorithm::Sha256),
            "sha-384" => Ok(HashAlgorithm::Sha384),
            "sha-512" => Ok(HashAlgorithm::Sha512),
            "sha3-224" => Ok(HashAlgorithm::Sha3_224),
            "sha3-256" => Ok(HashAlgorithm::Sha3_256),
            "sha3-384" => Ok(HashAlgorithm::Sha3_384),
            "sha3-512" => Ok(HashAlgorithm::Sha3_512),
            other => Err(MerkleError::UnsupportedAlgorithm(other.to_string())),
        }
    }
}
