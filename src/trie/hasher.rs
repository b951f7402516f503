//! Domain-separated hashing for leaves and nodes
//!
//! ```text
//! leaf_hash(v)  = BLAKE3(0x00 || v)
//! combine(l, r) = BLAKE3(0x01 || l || r)
//! ```
//!
//! An empty subtree at depth `d` hashes to `empty_subtree_hash(d)`, where
//! depth [`KEY_BITS`] is the null leaf and each level above combines two
//! empty children. Path-compressed leaves hash exactly like the chain of
//! single-child branches they stand in for.

use super::MapNode;
use crate::model::{BitPath, Hash, KEY_BITS};
use crate::{Error, Result};
use std::sync::LazyLock;

const LEAF_PREFIX: u8 = 0x00;
const NODE_PREFIX: u8 = 0x01;

static NULL_LEAF_HASH: LazyLock<Hash> = LazyLock::new(|| leaf_hash(&[]));

static EMPTY_SUBTREE_HASHES: LazyLock<Vec<Hash>> = LazyLock::new(|| {
    let mut hashes = vec![*NULL_LEAF_HASH; KEY_BITS + 1];
    for depth in (0..KEY_BITS).rev() {
        hashes[depth] = combine(&hashes[depth + 1], &hashes[depth + 1]);
    }
    hashes
});

/// Hash of a value stored in the map
pub fn leaf_hash(value: &[u8]) -> Hash {
    Hash::tagged(LEAF_PREFIX, &[value])
}

/// Leaf hash meaning "key not present"
pub fn null_leaf_hash() -> Hash {
    *NULL_LEAF_HASH
}

/// Hash of an entirely empty subtree rooted at `depth`
///
/// # Panics
///
/// If `depth > KEY_BITS`.
pub fn empty_subtree_hash(depth: usize) -> Hash {
    EMPTY_SUBTREE_HASHES[depth]
}

/// Hash of a branch from its two child hashes
pub fn combine(left: &Hash, right: &Hash) -> Hash {
    Hash::tagged(NODE_PREFIX, &[left.as_bytes(), right.as_bytes()])
}

/// Hash of `node` positioned at `depth`
pub fn node_hash(node: &MapNode, depth: usize) -> Result<Hash> {
    if depth > KEY_BITS {
        return Err(Error::Corruption(format!("node below key depth: {}", depth)));
    }
    match node {
        MapNode::Leaf {
            leaf_hash,
            remaining_path,
        } => compressed_leaf_hash(leaf_hash, remaining_path, depth),
        MapNode::Branch { left, right } => {
            if depth == KEY_BITS {
                return Err(Error::Corruption("branch at full key depth".into()));
            }
            let empty = empty_subtree_hash(depth + 1);
            let l = left.map_or(empty, |c| c.hash);
            let r = right.map_or(empty, |c| c.hash);
            Ok(combine(&l, &r))
        }
    }
}

fn compressed_leaf_hash(leaf_hash: &Hash, remaining: &BitPath, depth: usize) -> Result<Hash> {
    if remaining.len() != KEY_BITS - depth {
        return Err(Error::Corruption(format!(
            "leaf at depth {} has {} remaining bits",
            depth,
            remaining.len()
        )));
    }
    let mut hash = *leaf_hash;
    for i in (0..remaining.len()).rev() {
        let sibling = empty_subtree_hash(depth + i + 1);
        hash = if remaining.at(i)? {
            combine(&sibling, &hash)
        } else {
            combine(&hash, &sibling)
        };
    }
    Ok(hash)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trie::ChildRef;

    #[test]
    fn test_domains_are_separated() {
        let value = [0u8; 64];
        let (l, r) = value.split_at(32);
        let as_node = combine(
            &Hash::from_bytes(l.try_into().unwrap()),
            &Hash::from_bytes(r.try_into().unwrap()),
        );
        assert_ne!(leaf_hash(&value), as_node);
        assert_ne!(leaf_hash(b""), Hash::digest(b""));
        assert_ne!(leaf_hash(b"x"), null_leaf_hash());
    }

    #[test]
    fn test_null_leaf_is_hash_of_empty_value() {
        assert_eq!(null_leaf_hash(), leaf_hash(&[]));
        assert_eq!(empty_subtree_hash(KEY_BITS), null_leaf_hash());
    }

    #[test]
    fn test_empty_branch_hashes_to_empty_subtree() {
        for depth in [0, 1, 100, KEY_BITS - 1] {
            assert_eq!(
                node_hash(&MapNode::empty(), depth).unwrap(),
                empty_subtree_hash(depth)
            );
        }
    }

    #[test]
    fn test_null_leaf_hashes_to_empty_subtree() {
        let path = BitPath::from_key(b"gone");
        for depth in [1, 7, 255] {
            let leaf = MapNode::leaf(null_leaf_hash(), path.suffix(depth).unwrap());
            assert_eq!(node_hash(&leaf, depth).unwrap(), empty_subtree_hash(depth));
        }
    }

    #[test]
    fn test_compressed_leaf_matches_expanded_chain() {
        let path = BitPath::from_key(b"k");
        let value = leaf_hash(b"v");
        let depth = 250;

        let compressed = node_hash(&MapNode::leaf(value, path.suffix(depth).unwrap()), depth)
            .unwrap();

        // One level expanded: a branch whose only child is the leaf one deeper
        let child = MapNode::leaf(value, path.suffix(depth + 1).unwrap());
        let child_ref = ChildRef {
            version: 1,
            hash: node_hash(&child, depth + 1).unwrap(),
        };
        let branch = MapNode::empty()
            .with_child(path.at(depth).unwrap(), child_ref)
            .unwrap();
        assert_eq!(node_hash(&branch, depth).unwrap(), compressed);
    }

    #[test]
    fn test_leaf_hash_binds_position() {
        let path = BitPath::from_key(b"k");
        let value = leaf_hash(b"v");
        let a = node_hash(&MapNode::leaf(value, path.suffix(10).unwrap()), 10).unwrap();
        let other = BitPath::from_key(b"other");
        let b = node_hash(&MapNode::leaf(value, other.suffix(10).unwrap()), 10).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_leaf_with_wrong_remaining_length_is_corruption() {
        let leaf = MapNode::leaf(leaf_hash(b"v"), BitPath::from_key(b"k"));
        assert!(matches!(node_hash(&leaf, 3), Err(Error::Corruption(_))));
        assert!(node_hash(&leaf, 0).is_ok());
    }
}
