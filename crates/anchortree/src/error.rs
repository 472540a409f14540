//! Error types for tree construction and path verification

use thiserror::Error;

/// Error type for all fallible Merkle operations
///
/// Construction-time problems (bad hex, wrong digest length) are reported at
/// the call that introduced them, never deferred to `build()`. A failed
/// verification is not an error: `verify` and `verify_path` answer `false`
/// for a mismatched root and reserve `Err` for malformed input.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MerkleError {
    #[error("invalid hex encoding: {0}")]
    InvalidEncoding(String),

    #[error("invalid digest size: expected {expected} bytes, got {actual}")]
    InvalidDigestSize { expected: usize, actual: usize },

    #[error("unsupported hash algorithm: {0}")]
    UnsupportedAlgorithm(String),

    #[error("malformed path step: exactly one of left or right sibling must be set")]
    MalformedPathStep,

    #[error("malformed tree level {level}: node index {index} is out of bounds")]
    MalformedLevel { level: usize, index: usize },

    #[error("leaf not found: {leaf}")]
    LeafNotFound { leaf: String },
}

impl From<hex::FromHexError> for MerkleError {
    fn from(err: hex::FromHexError) -> Self {
        MerkleError::InvalidEncoding(err.to_string())
    }
}
