//! Tree model, level construction, and the query surface
//!
//! A [`Tree`] stores its levels leaves-first as hex digest strings, exactly
//! the shape of the persisted JSON snapshot: layer 0 is the leaf layer,
//! the last layer holds the single root. Keyed leaves are stored as
//! `"key:hex"` in layer 0 only; keys are stripped before any hashing and
//! never appear above layer 0.

use std::fs::File;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::algorithm::HashAlgorithm;
use crate::error::MerkleError;
use crate::path::PathStep;

/// Opaque attestation record attached to a tree
///
/// Produced by an external anchoring service; the tree stores and serializes
/// it verbatim without inspecting its structure. Attestations never
/// participate in hash computation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Attestation(pub serde_json::Value);

impl From<serde_json::Value> for Attestation {
    fn from(value: serde_json::Value) -> Self {
        Attestation(value)
    }
}

/// A single leaf: an optional application-chosen key and a hex digest
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Leaf {
    pub key: Option<String>,
    pub hash: String,
}

/// An immutable Merkle tree over one digest algorithm
///
/// Built by [`TreeBuilder`](crate::TreeBuilder) and read-only afterwards,
/// except for appending attestation records through `&mut self` (or a
/// [`SharedTree`](crate::SharedTree) when the tree is shared across
/// threads). Serializes to the stable snapshot format: `description`,
/// `algorithm`, `proofs`, `levels` with levels ordered leaves-first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tree {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    algorithm: HashAlgorithm,
    #[serde(default)]
    proofs: Vec<Attestation>,
    #[serde(default)]
    levels: Vec<Vec<String>>,
}

/// Split a layer-0 entry into its digest portion, dropping a `key:` prefix
pub(crate) fn digest_part(entry: &str) -> &str {
    match entry.split_once(':') {
        Some((_, hash)) => hash,
        None => entry,
    }
}

fn parse_leaf(entry: &str) -> Leaf {
    match entry.split_once(':') {
        Some((key, hash)) => Leaf {
            key: Some(key.to_string()),
            hash: hash.to_string(),
        },
        None => Leaf {
            key: None,
            hash: entry.to_string(),
        },
    }
}

/// Pairwise-reduce one level of raw digests into the next
///
/// Nodes are paired left-to-right; each pair hashes to
/// `H(left || right)`. An unpaired trailing node is promoted verbatim,
/// never hashed with itself. That promotion rule decides the root for
/// every non-power-of-two leaf count.
pub(crate) fn next_level(current: &[Vec<u8>], algorithm: HashAlgorithm) -> Vec<Vec<u8>> {
    let mut next = Vec::with_capacity(current.len().div_ceil(2));
    let mut i = 0;
    while i < current.len() {
        if i + 1 == current.len() {
            // Odd node out: promote unchanged.
            next.push(current[i].clone());
        } else {
            next.push(algorithm.hash_pair(&current[i], &current[i + 1]));
        }
        i += 2;
    }
    next
}

/// Build every level from the leaf layer up to the single-element root
///
/// Layer 0 keeps the `"key:hex"` form for keyed leaves; all upper layers
/// are bare hex. A single leaf yields a single layer: the leaf is the
/// root and no hashing happens.
pub(crate) fn build_levels(
    leaves: &[(Option<String>, Vec<u8>)],
    algorithm: HashAlgorithm,
) -> Vec<Vec<String>> {
    let layer0 = leaves
        .iter()
        .map(|(key, digest)| match key {
            Some(key) => format!("{key}:{}", hex::encode(digest)),
            None => hex::encode(digest),
        })
        .collect();

    let mut levels = vec![layer0];
    let mut current: Vec<Vec<u8>> = leaves.iter().map(|(_, digest)| digest.clone()).collect();
    while current.len() > 1 {
        current = next_level(&current, algorithm);
        levels.push(current.iter().map(hex::encode).collect());
    }
    levels
}

impl Tree {
    pub(crate) fn from_parts(
        description: Option<String>,
        algorithm: HashAlgorithm,
        levels: Vec<Vec<String>>,
    ) -> Self {
        Self {
            description,
            algorithm,
            proofs: Vec::new(),
            levels,
        }
    }

    /// Digest algorithm this tree was built with
    pub fn algorithm(&self) -> HashAlgorithm {
        self.algorithm
    }

    /// Optional tree description
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Root digest of the tree, hex encoded
    ///
    /// For a single-leaf tree the leaf digest is the root. A degenerate
    /// zero-leaf snapshot has no root and yields an empty string.
    pub fn root(&self) -> &str {
        self.levels
            .last()
            .and_then(|level| level.first())
            .map(|entry| digest_part(entry))
            .unwrap_or("")
    }

    /// Tree depth: number of levels excluding the root level
    pub fn depth(&self) -> usize {
        self.levels.len().saturating_sub(1)
    }

    /// Number of leaves in layer 0
    pub fn leaf_count(&self) -> usize {
        self.levels.first().map_or(0, Vec::len)
    }

    /// Number of non-leaf nodes across all upper levels
    pub fn node_count(&self) -> usize {
        self.levels.iter().skip(1).map(Vec::len).sum()
    }

    /// Total number of levels, leaf layer and root layer included
    pub fn level_count(&self) -> usize {
        self.levels.len()
    }

    /// Level accessor with root-first indexing
    ///
    /// `level(0)` is the root layer; increasing `n` moves toward the
    /// leaves. This is the inverse of the internal leaves-first storage
    /// (and of the snapshot's `levels` ordering).
    pub fn level(&self, n: usize) -> Option<&[String]> {
        let inverted = self.levels.len().checked_sub(n + 1)?;
        self.levels.get(inverted).map(Vec::as_slice)
    }

    /// All leaves of the tree, parsed into key/digest records
    pub fn leaves(&self) -> Vec<Leaf> {
        self.levels
            .first()
            .map(|layer| layer.iter().map(|entry| parse_leaf(entry)).collect())
            .unwrap_or_default()
    }

    /// Look up a single leaf
    ///
    /// Keyed leaves match on key, unkeyed leaves on digest equality. The
    /// first occurrence wins when duplicates exist.
    pub fn leaf(&self, needle: &str) -> Option<Leaf> {
        let layer = self.levels.first()?;
        layer
            .iter()
            .map(|entry| parse_leaf(entry))
            .find(|leaf| leaf_matches(leaf, needle))
    }

    /// Attestation records attached to this tree
    pub fn proofs(&self) -> &[Attestation] {
        &self.proofs
    }

    /// Append an opaque attestation record
    ///
    /// No validation against tree content happens; records are
    /// bookkeeping only. Requires `&mut self`, which makes this the one
    /// mutable surface readers cannot race with.
    pub fn add_attestation(&mut self, record: impl Into<Attestation>) {
        self.proofs.push(record.into());
    }

    /// Extract the inclusion path for one leaf
    ///
    /// `needle` is a key in keyed mode, a hex digest otherwise. One
    /// [`PathStep`] is produced per non-root level, except at levels where
    /// the node is the unpaired trailing element: a promoted node has no
    /// sibling, so that level contributes no step and the node's value
    /// carries to the next level unchanged. A missing leaf is an explicit
    /// [`MerkleError::LeafNotFound`]; the only genuinely empty path is the
    /// single-leaf tree's.
    ///
    /// A loaded snapshot whose levels violate the shape invariant
    /// (`levels[i+1].len() == ceil(levels[i].len() / 2)`) can leave the
    /// walked index with no node at some level; that is reported as
    /// [`MerkleError::MalformedLevel`], never a panic.
    pub fn path(&self, needle: &str) -> Result<Vec<PathStep>, MerkleError> {
        let not_found = || MerkleError::LeafNotFound {
            leaf: needle.to_string(),
        };
        let leaves = self.levels.first().ok_or_else(not_found)?;
        let mut index = leaves
            .iter()
            .position(|entry| leaf_matches(&parse_leaf(entry), needle))
            .ok_or_else(not_found)?;

        let mut steps = Vec::with_capacity(self.depth());
        for (depth, level) in self.levels[..self.levels.len().saturating_sub(1)]
            .iter()
            .enumerate()
        {
            // Holds for every builder-produced tree; only a snapshot with
            // truncated levels can put the index past the level's end.
            if index >= level.len() {
                return Err(MerkleError::MalformedLevel {
                    level: depth,
                    index,
                });
            }
            if index % 2 == 1 {
                steps.push(PathStep::left(digest_part(&level[index - 1])));
            } else if index + 1 < level.len() {
                steps.push(PathStep::right(digest_part(&level[index + 1])));
            }
            // index + 1 == level.len(): promoted node, no sibling at this level.
            index /= 2;
        }
        Ok(steps)
    }

    /// Recompute the root from the leaf layer and compare with `expected`
    ///
    /// The stored upper levels are not trusted: everything above layer 0
    /// is rebuilt, so a snapshot with tampered intermediate levels fails
    /// here even when its stored root looks right. A snapshot whose leaf
    /// layer is not valid hex can never match and answers `false`.
    pub fn verify(&self, expected: &str) -> bool {
        let Some(leaves) = self.levels.first() else {
            return false;
        };
        let mut current = Vec::with_capacity(leaves.len());
        for entry in leaves {
            match hex::decode(digest_part(entry)) {
                Ok(digest) => current.push(digest),
                Err(_) => return false,
            }
        }
        if current.is_empty() {
            return false;
        }
        while current.len() > 1 {
            current = next_level(&current, self.algorithm);
        }
        let matches = hex::encode(&current[0]) == expected;
        trace!(algorithm = %self.algorithm, matches, "verified tree root");
        matches
    }

    /// Serialize to the snapshot JSON string
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    /// Deserialize from a snapshot JSON string
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    /// Write the snapshot JSON to a file
    pub fn export<P: AsRef<Path>>(&self, path: P) -> std::io::Result<()> {
        let file = File::create(path)?;
        serde_json::to_writer(file, self)?;
        Ok(())
    }

    /// Load a tree from a snapshot file
    pub fn from_file<P: AsRef<Path>>(path: P) -> std::io::Result<Self> {
        let file = File::open(path.as_ref())?;
        let tree: Tree = serde_json::from_reader(file)?;
        debug!(
            path = %path.as_ref().display(),
            leaves = tree.leaf_count(),
            "loaded tree snapshot"
        );
        Ok(tree)
    }
}

fn leaf_matches(leaf: &Leaf, needle: &str) -> bool {
    match &leaf.key {
        Some(key) => key == needle,
        None => leaf.hash == needle,
    }
}
