//! Inclusion paths and isolated path verification
//!
//! A path is the minimal sibling sequence needed to recompute a root from
//! one leaf digest. [`verify_path`] is the trust-minimizing counterpart of
//! [`Tree::path`](crate::Tree::path): it needs only the leaf digest, the
//! path, the algorithm, and the claimed root, so it can run in a process
//! that has never seen the tree.

use serde::{Deserialize, Serialize};

use crate::algorithm::HashAlgorithm;
use crate::error::MerkleError;

/// One step of an inclusion path
///
/// Exactly one of `l` (sibling on the left) or `r` (sibling on the right)
/// must be populated; the wire shape is `{"l": hex}` or `{"r": hex}` with
/// the absent side omitted. A step with neither or both sides set is
/// malformed and fails verification with an error, never a silent pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathStep {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub l: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub r: Option<String>,
}

/// A validated path-step side
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sibling<'a> {
    Left(&'a str),
    Right(&'a str),
}

impl PathStep {
    /// Step whose sibling digest sits on the left
    pub fn left(sibling_hex: impl Into<String>) -> Self {
        Self {
            l: Some(sibling_hex.into()),
            r: None,
        }
    }

    /// Step whose sibling digest sits on the right
    pub fn right(sibling_hex: impl Into<String>) -> Self {
        Self {
            l: None,
            r: Some(sibling_hex.into()),
        }
    }

    /// The populated side, or [`MerkleError::MalformedPathStep`]
    ///
    /// An empty string counts as absent, so `{"l":""}` behaves exactly
    /// like `{}`: a sibling digest can never be zero-length.
    pub fn sibling(&self) -> Result<Sibling<'_>, MerkleError> {
        let l = self.l.as_deref().filter(|side| !side.is_empty());
        let r = self.r.as_deref().filter(|side| !side.is_empty());
        match (l, r) {
            (Some(l), None) => Ok(Sibling::Left(l)),
            (None, Some(r)) => Ok(Sibling::Right(r)),
            _ => Err(MerkleError::MalformedPathStep),
        }
    }
}

/// Replay `path` from `leaf_hex` and compare the result with `expected_root_hex`
///
/// For each step, a left sibling hashes as `H(sibling || current)` and a
/// right sibling as `H(current || sibling)`. Answers `Ok(false)` for a
/// root mismatch; `Err` is reserved for malformed hex and malformed steps.
pub fn verify_path(
    leaf_hex: &str,
    path: &[PathStep],
    algorithm: HashAlgorithm,
    expected_root_hex: &str,
) -> Result<bool, MerkleError> {
    let mut current = hex::decode(leaf_hex)?;
    for step in path {
        current = match step.sibling()? {
            Sibling::Left(sibling) => algorithm.hash_pair(&hex::decode(sibling)?, &current),
            Sibling::Right(sibling) => algorithm.hash_pair(&current, &hex::decode(sibling)?),
        };
    }
    Ok(hex::encode(current) == expected_root_hex)
}

#[cfg(test)]
mod tests {
    use super::*;

    const A: &str = "ca978112ca1bbdcafac231b39a23dc4da786eff8147c4e72b9807785afee48bb";
    const B: &str = "3e23e8160039594a33894f6564e1b1348bbd7a0088d42c4acb73eeaed59c009d";
    const AB: &str = "e5a01fee14e0ed5c48714f22180f25ad8365b53f9779f79dc4a3d7e93963f94a";

    #[test]
    fn test_single_step_right_sibling() {
        let path = vec![PathStep::right(B)];
        assert!(verify_path(A, &path, HashAlgorithm::Sha256, AB).unwrap());
    }

    #[test]
    fn test_single_step_left_sibling() {
        let path = vec![PathStep::left(A)];
        assert!(verify_path(B, &path, HashAlgorithm::Sha256, AB).unwrap());
    }

    #[test]
    fn test_empty_path_compares_leaf_to_root() {
        assert!(verify_path(A, &[], HashAlgorithm::Sha256, A).unwrap());
        assert!(!verify_path(A, &[], HashAlgorithm::Sha256, B).unwrap());
    }

    #[test]
    fn test_mismatch_is_false_not_error() {
        let path = vec![PathStep::left(B)];
        assert!(!verify_path(A, &path, HashAlgorithm::Sha256, AB).unwrap());
    }

    #[test]
    fn test_step_with_no_side_is_malformed() {
        let path = vec![PathStep { l: None, r: None }];
        assert_eq!(
            verify_path(A, &path, HashAlgorithm::Sha256, AB).unwrap_err(),
            MerkleError::MalformedPathStep
        );
    }

    #[test]
    fn test_step_with_both_sides_is_malformed() {
        let path = vec![PathStep {
            l: Some(A.to_string()),
            r: Some(B.to_string()),
        }];
        assert_eq!(
            verify_path(A, &path, HashAlgorithm::Sha256, AB).unwrap_err(),
            MerkleError::MalformedPathStep
        );
    }

    #[test]
    fn test_empty_string_side_counts_as_absent() {
        let step: PathStep = serde_json::from_str("{\"l\":\"\"}").unwrap();
        assert_eq!(step.sibling().unwrap_err(), MerkleError::MalformedPathStep);

        let path = vec![PathStep {
            l: Some(String::new()),
            r: None,
        }];
        assert_eq!(
            verify_path(A, &path, HashAlgorithm::Sha256, AB).unwrap_err(),
            MerkleError::MalformedPathStep
        );

        // An empty side next to a populated one resolves to the populated one.
        let step = PathStep {
            l: Some(String::new()),
            r: Some(B.to_string()),
        };
        assert_eq!(step.sibling().unwrap(), Sibling::Right(B));
    }

    #[test]
    fn test_malformed_leaf_hex_is_error() {
        let err = verify_path("xyz", &[], HashAlgorithm::Sha256, AB).unwrap_err();
        assert!(matches!(err, MerkleError::InvalidEncoding(_)));
    }

    #[test]
    fn test_malformed_sibling_hex_is_error() {
        let path = vec![PathStep::right("nothex")];
        let err = verify_path(A, &path, HashAlgorithm::Sha256, AB).unwrap_err();
        assert!(matches!(err, MerkleError::InvalidEncoding(_)));
    }

    #[test]
    fn test_step_wire_shape_omits_absent_side() {
        let json = serde_json::to_string(&PathStep::right(B)).unwrap();
        assert_eq!(json, format!("{{\"r\":\"{B}\"}}"));
        let step: PathStep = serde_json::from_str(&format!("{{\"l\":\"{A}\"}}")).unwrap();
        assert_eq!(step, PathStep::left(A));
    }
}
