//! Merkle tree construction and inclusion-proof verification
//!
//! This crate builds deterministic binary Merkle trees over keyed or unkeyed
//! data, extracts minimal inclusion paths for individual leaves, and verifies
//! those paths against a claimed root without access to the rest of the tree.
//! Tree roots are the unit of integrity handed to external anchoring
//! services; whatever receipt such a service returns can be attached to a
//! tree as an opaque attestation record.
//!
//! ## Usage
//!
//! ```rust
//! use anchortree::{HashAlgorithm, TreeBuilder, verify_path};
//!
//! let mut builder = TreeBuilder::new(HashAlgorithm::Sha256);
//! builder.add(b"alpha").add(b"bravo").add(b"charlie");
//! let tree = builder.build();
//!
//! let leaf = tree.leaves()[0].hash.clone();
//! let path = tree.path(&leaf).unwrap();
//! assert!(verify_path(&leaf, &path, HashAlgorithm::Sha256, tree.root()).unwrap());
//! ```
//!
//! ## Architecture
//!
//! - [`TreeBuilder`] accumulates leaves (raw, pre-hashed, batched, or
//!   streamed through a [`LeafWriter`]) and snapshots them into a [`Tree`].
//! - [`Tree`] holds the full level stack, leaves-first, and answers root,
//!   depth, lookup, and path queries; it serializes to a stable JSON
//!   snapshot.
//! - [`verify_path`] replays a path in an isolated process, needing only the
//!   leaf digest, the path, the algorithm, and the claimed root.

pub mod algorithm;
pub mod builder;
pub mod error;
pub mod path;
pub mod sync;
pub mod tree;

pub use algorithm::HashAlgorithm;
pub use builder::{LeafWriter, TreeBuilder};
pub use error::MerkleError;
pub use path::{verify_path, PathStep, Sibling};
pub use sync::SharedTree;
pub use tree::{Attestation, Leaf, Tree};
