//! Versioned sparse Merkle trie
//!
//! This implements a path-compressed binary trie over 256-bit key paths:
//! - A lone key is stored as a leaf carrying its unconsumed path suffix
//! - Every write produces a new version that shares unchanged subtrees
//! - The root hash of a version commits to the entire map at that version

mod hasher;
mod node;
mod tree;

pub use hasher::{combine, empty_subtree_hash, leaf_hash, node_hash, null_leaf_hash};
pub use node::{ChildRef, MapNode};
pub use tree::MerkleMap;
