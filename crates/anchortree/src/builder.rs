//! Leaf accumulation and tree construction
//!
//! [`TreeBuilder`] collects an ordered leaf buffer and snapshots it into a
//! [`Tree`] on [`build`](TreeBuilder::build). Appends validate their input
//! immediately (bad hex or a wrong-size digest fails at the offending call,
//! never at build time), so the buffer only ever holds decoded digests and
//! construction itself cannot fail.
//!
//! The builder is an owned, single-writer value: mutating calls take
//! `&mut self` and return it for fluent chaining, and the streaming
//! [`LeafWriter`] holds an exclusive borrow for its lifetime. Share a
//! builder across threads only behind external synchronization.

use std::io;

use sha2::digest::DynDigest;
use tracing::debug;

use crate::algorithm::HashAlgorithm;
use crate::error::MerkleError;
use crate::tree::{build_levels, Tree};

/// Accumulates leaves for one tree
///
/// Created with a fixed [`HashAlgorithm`]; every leaf in the resulting tree
/// uses that algorithm. Leaves are append-only and order is significant:
/// insertion order is the leaf-layer order, which fixes every path index.
#[derive(Debug, Clone)]
pub struct TreeBuilder {
    algorithm: HashAlgorithm,
    leaves: Vec<(Option<String>, Vec<u8>)>,
    description: Option<String>,
}

impl TreeBuilder {
    /// Create a builder for the given algorithm
    pub fn new(algorithm: HashAlgorithm) -> Self {
        Self {
            algorithm,
            leaves: Vec::new(),
            description: None,
        }
    }

    /// Set the description carried into built trees
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Algorithm this builder hashes with
    pub fn algorithm(&self) -> HashAlgorithm {
        self.algorithm
    }

    /// Number of leaves accumulated so far
    pub fn leaf_count(&self) -> usize {
        self.leaves.len()
    }

    pub fn is_empty(&self) -> bool {
        self.leaves.is_empty()
    }

    fn push_leaf(&mut self, key: Option<String>, digest: Vec<u8>) -> &mut Self {
        self.leaves.push((key, digest));
        self
    }

    /// Hash `data` and append it as an unkeyed leaf
    pub fn add(&mut self, data: &[u8]) -> &mut Self {
        let digest = self.algorithm.hash(data);
        self.push_leaf(None, digest)
    }

    /// Hash `data` and append it as a leaf tagged with `key`
    ///
    /// The key is an opaque identifier used for lookup and path
    /// extraction; it is not hashed into the leaf digest.
    pub fn add_keyed(&mut self, key: impl Into<String>, data: &[u8]) -> &mut Self {
        let digest = self.algorithm.hash(data);
        self.push_leaf(Some(key.into()), digest)
    }

    /// Append an already-hashed leaf without re-hashing
    ///
    /// Fails fast with [`MerkleError::InvalidEncoding`] for malformed hex
    /// and [`MerkleError::InvalidDigestSize`] when the decoded length does
    /// not match the algorithm's digest size.
    pub fn add_prehashed(&mut self, digest_hex: &str) -> Result<&mut Self, MerkleError> {
        let digest = self.decode_digest(digest_hex)?;
        Ok(self.push_leaf(None, digest))
    }

    /// Keyed variant of [`add_prehashed`](TreeBuilder::add_prehashed)
    pub fn add_prehashed_keyed(
        &mut self,
        key: impl Into<String>,
        digest_hex: &str,
    ) -> Result<&mut Self, MerkleError> {
        let digest = self.decode_digest(digest_hex)?;
        Ok(self.push_leaf(Some(key.into()), digest))
    }

    /// Append a batch of unkeyed leaves, hashing each in order
    pub fn add_batch<I>(&mut self, items: I) -> &mut Self
    where
        I: IntoIterator,
        I::Item: AsRef<[u8]>,
    {
        for item in items {
            self.add(item.as_ref());
        }
        self
    }

    /// Append a batch of keyed leaves, hashing each in order
    pub fn add_batch_keyed<I, K, V>(&mut self, items: I) -> &mut Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: AsRef<[u8]>,
    {
        for (key, value) in items {
            self.add_keyed(key, value.as_ref());
        }
        self
    }

    /// Acquire a streaming write handle for one unkeyed leaf
    ///
    /// Bytes written feed a running digest; nothing is buffered. The
    /// handle borrows the builder exclusively and appends its leaf only
    /// on [`LeafWriter::close`].
    pub fn writer(&mut self) -> LeafWriter<'_> {
        let hasher = self.algorithm.hasher();
        LeafWriter {
            builder: self,
            key: None,
            hasher,
        }
    }

    /// Keyed variant of [`writer`](TreeBuilder::writer)
    pub fn writer_keyed(&mut self, key: impl Into<String>) -> LeafWriter<'_> {
        let hasher = self.algorithm.hasher();
        LeafWriter {
            builder: self,
            key: Some(key.into()),
            hasher,
        }
    }

    /// Snapshot the current leaf buffer into a [`Tree`]
    ///
    /// The buffer is not drained: a later `build()` after further appends
    /// yields the larger tree. Identical leaf sequence and algorithm
    /// always produce an identical tree.
    pub fn build(&self) -> Tree {
        let levels = build_levels(&self.leaves, self.algorithm);
        debug!(
            algorithm = %self.algorithm,
            leaves = self.leaves.len(),
            levels = levels.len(),
            "built merkle tree"
        );
        Tree::from_parts(self.description.clone(), self.algorithm, levels)
    }

    fn decode_digest(&self, digest_hex: &str) -> Result<Vec<u8>, MerkleError> {
        let digest = hex::decode(digest_hex)?;
        let expected = self.algorithm.digest_size();
        if digest.len() != expected {
            return Err(MerkleError::InvalidDigestSize {
                expected,
                actual: digest.len(),
            });
        }
        Ok(digest)
    }
}

/// Streaming write handle bound to one pending leaf
///
/// Obtained from [`TreeBuilder::writer`]. Implements [`std::io::Write`];
/// each write feeds the running digest. [`close`](LeafWriter::close)
/// consumes the handle, seals the digest, and appends it as one leaf,
/// exactly as `add` would for the complete byte sequence. Because `close`
/// takes the handle by value, writing after close is unrepresentable.
pub struct LeafWriter<'a> {
    builder: &'a mut TreeBuilder,
    key: Option<String>,
    hasher: Box<dyn DynDigest>,
}

impl<'a> LeafWriter<'a> {
    /// Seal the digest and append it to the builder as one leaf
    pub fn close(self) -> &'a mut TreeBuilder {
        let LeafWriter {
            builder,
            key,
            hasher,
        } = self;
        let digest = hasher.finalize().to_vec();
        builder.push_leaf(key, digest)
    }
}

impl io::Write for LeafWriter<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.hasher.update(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const A_SHA256: &str = "ca978112ca1bbdcafac231b39a23dc4da786eff8147c4e72b9807785afee48bb";

    #[test]
    fn test_add_hashes_on_append() {
        let mut builder = TreeBuilder::new(HashAlgorithm::Sha256);
        builder.add(b"a");
        let tree = builder.build();
        assert_eq!(tree.leaves()[0].hash, A_SHA256);
    }

    #[test]
    fn test_chained_adds_preserve_order() {
        let mut builder = TreeBuilder::new(HashAlgorithm::Sha256);
        builder.add(b"a").add(b"b").add(b"c");
        let tree = builder.build();
        let leaves = tree.leaves();
        assert_eq!(leaves.len(), 3);
        assert_eq!(leaves[0].hash, A_SHA256);
    }

    #[test]
    fn test_add_prehashed_is_not_rehashed() {
        let mut builder = TreeBuilder::new(HashAlgorithm::Sha256);
        builder.add_prehashed(A_SHA256).unwrap();
        let tree = builder.build();
        assert_eq!(tree.root(), A_SHA256);
    }

    #[test]
    fn test_add_prehashed_rejects_bad_hex() {
        let mut builder = TreeBuilder::new(HashAlgorithm::Sha256);
        let err = builder.add_prehashed("zz").unwrap_err();
        assert!(matches!(err, MerkleError::InvalidEncoding(_)));
        assert_eq!(builder.leaf_count(), 0);
    }

    #[test]
    fn test_add_prehashed_rejects_wrong_size() {
        let mut builder = TreeBuilder::new(HashAlgorithm::Sha256);
        let err = builder.add_prehashed("abcd").unwrap_err();
        assert_eq!(
            err,
            MerkleError::InvalidDigestSize {
                expected: 32,
                actual: 2
            }
        );
    }

    #[test]
    fn test_add_batch_matches_sequential_adds() {
        let mut batched = TreeBuilder::new(HashAlgorithm::Sha256);
        batched.add_batch([b"a".as_slice(), b"b", b"c"]);

        let mut sequential = TreeBuilder::new(HashAlgorithm::Sha256);
        sequential.add(b"a").add(b"b").add(b"c");

        assert_eq!(batched.build(), sequential.build());
    }

    #[test]
    fn test_writer_matches_add_for_chunked_payload() {
        let mut streamed = TreeBuilder::new(HashAlgorithm::Sha256);
        let mut writer = streamed.writer();
        writer.write_all(b"hello ").unwrap();
        writer.write_all(b"world").unwrap();
        writer.close();

        let mut direct = TreeBuilder::new(HashAlgorithm::Sha256);
        direct.add(b"hello world");

        assert_eq!(streamed.build().root(), direct.build().root());
    }

    #[test]
    fn test_keyed_writer_tags_leaf() {
        let mut builder = TreeBuilder::new(HashAlgorithm::Sha256);
        let mut writer = builder.writer_keyed("doc-1");
        writer.write_all(b"payload").unwrap();
        writer.close();

        let tree = builder.build();
        let leaf = tree.leaf("doc-1").unwrap();
        assert_eq!(leaf.key.as_deref(), Some("doc-1"));
        assert_eq!(leaf.hash, hex::encode(HashAlgorithm::Sha256.hash(b"payload")));
    }

    #[test]
    fn test_build_is_a_snapshot_not_a_drain() {
        let mut builder = TreeBuilder::new(HashAlgorithm::Sha256);
        builder.add(b"a");
        let first = builder.build();
        builder.add(b"b");
        let second = builder.build();

        assert_eq!(first.leaf_count(), 1);
        assert_eq!(second.leaf_count(), 2);
        // Rebuilding from the same state is deterministic.
        assert_eq!(second, builder.build());
    }

    #[test]
    fn test_description_carried_into_tree() {
        let mut builder =
            TreeBuilder::new(HashAlgorithm::Sha256).with_description("audit batch 42");
        builder.add(b"a");
        assert_eq!(builder.build().description(), Some("audit batch 42"));
    }

    #[test]
    fn test_algorithms_yield_distinct_roots() {
        let mut sha2 = TreeBuilder::new(HashAlgorithm::Sha256);
        let mut sha3 = TreeBuilder::new(HashAlgorithm::Sha3_256);
        sha2.add(b"a").add(b"b");
        sha3.add(b"a").add(b"b");
        assert_ne!(sha2.build().root(), sha3.build().root());
    }
}
