//! Trie node types

use crate::model::{BitPath, Hash};
use serde::{Deserialize, Serialize};

/// Pointer from a branch to one exact stored version of a child subtree
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChildRef {
    /// Version under which the child node was written
    pub version: u64,
    /// Cached node hash of the child at its depth
    pub hash: Hash,
}

/// A node in the sparse Merkle trie
///
/// Nodes are addressed by (version, path prefix) and never change once
/// written; a mutation writes new nodes under the next version and points
/// back at unchanged children by their old version.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum MapNode {
    /// A path-compressed leaf
    Leaf {
        /// Hash of the stored value, or the null leaf hash when absent
        leaf_hash: Hash,
        /// Suffix of the key path below this node's position
        remaining_path: BitPath,
    },
    /// An internal node; a missing child is an empty subtree
    Branch {
        left: Option<ChildRef>,
        right: Option<ChildRef>,
    },
}

impl MapNode {
    /// A branch with no children (the root of an empty map)
    pub fn empty() -> Self {
        MapNode::Branch {
            left: None,
            right: None,
        }
    }

    pub fn leaf(leaf_hash: Hash, remaining_path: BitPath) -> Self {
        MapNode::Leaf {
            leaf_hash,
            remaining_path,
        }
    }

    pub fn is_leaf(&self) -> bool {
        matches!(self, MapNode::Leaf { .. })
    }

    /// The child on the given side (`true` = right); `None` for leaves
    pub fn child(&self, right: bool) -> Option<ChildRef> {
        match self {
            MapNode::Branch { left, right: r } => {
                if right {
                    *r
                } else {
                    *left
                }
            }
            MapNode::Leaf { .. } => None,
        }
    }

    /// Copy of this branch with one side replaced; `None` for leaves
    pub fn with_child(&self, right: bool, child: ChildRef) -> Option<MapNode> {
        match self {
            MapNode::Branch { left, right: r } => Some(if right {
                MapNode::Branch {
                    left: *left,
                    right: Some(child),
                }
            } else {
                MapNode::Branch {
                    left: Some(child),
                    right: *r,
                }
            }),
            MapNode::Leaf { .. } => None,
        }
    }
}
