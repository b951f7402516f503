//! Applying mutations to the versioned sparse Merkle map
//!
//! Version `n` of a map is the trie rooted at `(n, empty path)`. Applying
//! a mutation to version `n` writes only the nodes on the mutated key's
//! path under version `n + 1`; every other subtree is shared by pointing at
//! the version it was last written under.

use super::hasher::{leaf_hash, node_hash, null_leaf_hash};
use super::{ChildRef, MapNode};
use crate::model::{BitPath, Hash, MapAction, MapMutation, KEY_BITS};
use crate::store::NodeStore;
use crate::{Error, Result};
use tracing::{debug, trace};

/// Where a descent for a key stopped
struct Fork {
    /// Branches passed through, root first. Includes the branch whose slot
    /// was empty, so the stopping position is at depth `ancestors.len()`.
    ancestors: Vec<MapNode>,
    /// The leaf found at the stopping position, if any
    head: Option<MapNode>,
}

impl Fork {
    fn depth(&self) -> usize {
        self.ancestors.len()
    }
}

/// A versioned sparse Merkle map over a node store
pub struct MerkleMap<'a, S: NodeStore + ?Sized> {
    store: &'a S,
}

impl<'a, S: NodeStore + ?Sized> MerkleMap<'a, S> {
    pub fn new(store: &'a S) -> Self {
        MerkleMap { store }
    }

    /// The root node of `version`
    ///
    /// Version 0 is the empty map and need not be stored.
    pub fn root(&self, version: u64) -> Result<MapNode> {
        match self.store.read_node(version, &BitPath::empty()) {
            Err(e) if version == 0 && e.is_not_found() => Ok(MapNode::empty()),
            Ok(node) if node.is_leaf() => Err(Error::Corruption(format!(
                "root of version {} is a leaf",
                version
            ))),
            other => other,
        }
    }

    /// The root hash committed by `version`
    pub fn root_hash(&self, version: u64) -> Result<Hash> {
        node_hash(&self.root(version)?, 0)
    }

    /// The leaf hash stored for `key` at `version`, `None` if absent
    pub fn get(&self, version: u64, key: &[u8]) -> Result<Option<Hash>> {
        let key_path = BitPath::from_key(key);
        let fork = self.descend(&key_path, self.root(version)?)?;
        Ok(matched_leaf_hash(&fork, &key_path)?.filter(|h| *h != null_leaf_hash()))
    }

    /// Apply `mutation` to `previous_version`, writing `previous_version + 1`
    ///
    /// Returns the new root hash. On error the new version may be partially
    /// written and must not be published.
    pub fn apply(&self, previous_version: u64, mutation: &MapMutation) -> Result<Hash> {
        let version = previous_version + 1;
        let root = self.root(previous_version)?;
        let key_path = BitPath::from_key(&mutation.key);

        let fork = self.descend(&key_path, root.clone())?;
        let depth = fork.depth();

        let matched = matched_leaf_hash(&fork, &key_path)?;
        let prev_leaf_hash = matched.unwrap_or_else(null_leaf_hash);
        let next_leaf_hash = next_leaf_hash(&mutation.action, prev_leaf_hash);

        trace!(
            version,
            depth,
            action = mutation.action.name(),
            matched = matched.is_some(),
            "descended to fork"
        );

        if next_leaf_hash == prev_leaf_hash {
            // Nothing changes, but the new version still needs a root
            self.store.write_node(version, &BitPath::empty(), &root)?;
            let hash = node_hash(&root, 0)?;
            debug!(version, root = %hash.short(), "no-op mutation");
            return Ok(hash);
        }

        let head_hash = match &fork.head {
            Some(MapNode::Leaf { remaining_path, .. }) if matched.is_some() => {
                let leaf = MapNode::leaf(next_leaf_hash, remaining_path.clone());
                self.store
                    .write_node(version, &key_path.slice(0, depth)?, &leaf)?;
                node_hash(&leaf, depth)?
            }
            Some(MapNode::Leaf {
                leaf_hash,
                remaining_path,
            }) => self.split_leaf(
                version,
                &key_path,
                depth,
                *leaf_hash,
                remaining_path,
                next_leaf_hash,
            )?,
            Some(MapNode::Branch { .. }) => {
                return Err(Error::Corruption("descent stopped on a branch".into()));
            }
            None => {
                let leaf = MapNode::leaf(next_leaf_hash, key_path.suffix(depth)?);
                self.store
                    .write_node(version, &key_path.slice(0, depth)?, &leaf)?;
                node_hash(&leaf, depth)?
            }
        };

        let hash = self.write_ancestors(version, &key_path, &fork.ancestors, head_hash)?;
        debug!(version, depth, root = %hash.short(), "applied mutation");
        Ok(hash)
    }

    /// Follow `key_path` from `root` until an empty slot or a leaf
    fn descend(&self, key_path: &BitPath, root: MapNode) -> Result<Fork> {
        let mut ancestors = Vec::new();
        let mut node = root;

        loop {
            if node.is_leaf() {
                return Ok(Fork {
                    ancestors,
                    head: Some(node),
                });
            }

            let depth = ancestors.len();
            let child = node.child(key_path.at(depth)?);
            ancestors.push(node);

            match child {
                Some(child) => {
                    node = self
                        .store
                        .read_node(child.version, &key_path.slice(0, depth + 1)?)?;
                }
                None => {
                    return Ok(Fork {
                        ancestors,
                        head: None,
                    });
                }
            }
        }
    }

    /// Replace the leaf of another key at `depth` with a subtree holding
    /// both it and a new leaf for `key_path`; returns the subtree's hash
    fn split_leaf(
        &self,
        version: u64,
        key_path: &BitPath,
        depth: usize,
        other_leaf_hash: Hash,
        other_remaining: &BitPath,
        next_leaf_hash: Hash,
    ) -> Result<Hash> {
        let target_remaining = key_path.suffix(depth)?;
        let shared = target_remaining.common_prefix_len(other_remaining);
        if shared >= other_remaining.len() {
            return Err(Error::Corruption(
                "leaf for a different key shares its whole path".into(),
            ));
        }

        let fork_depth = depth + shared;
        let other_path = key_path.slice(0, depth)?.join(other_remaining)?;

        let new_leaf = MapNode::leaf(next_leaf_hash, key_path.suffix(fork_depth + 1)?);
        let old_leaf = MapNode::leaf(other_leaf_hash, other_path.suffix(fork_depth + 1)?);

        self.store
            .write_node(version, &key_path.slice(0, fork_depth + 1)?, &new_leaf)?;
        self.store
            .write_node(version, &other_path.slice(0, fork_depth + 1)?, &old_leaf)?;

        let new_ref = ChildRef {
            version,
            hash: node_hash(&new_leaf, fork_depth + 1)?,
        };
        let old_ref = ChildRef {
            version,
            hash: node_hash(&old_leaf, fork_depth + 1)?,
        };
        let fork_node = if key_path.at(fork_depth)? {
            MapNode::Branch {
                left: Some(old_ref),
                right: Some(new_ref),
            }
        } else {
            MapNode::Branch {
                left: Some(new_ref),
                right: Some(old_ref),
            }
        };
        self.store
            .write_node(version, &key_path.slice(0, fork_depth)?, &fork_node)?;
        let mut hash = node_hash(&fork_node, fork_depth)?;

        // Single-child branches over the bits both keys share
        for d in (depth..fork_depth).rev() {
            let child = ChildRef { version, hash };
            let node = MapNode::empty()
                .with_child(key_path.at(d)?, child)
                .ok_or_else(|| Error::Corruption("empty node is not a branch".into()))?;
            self.store.write_node(version, &key_path.slice(0, d)?, &node)?;
            hash = node_hash(&node, d)?;
        }

        trace!(version, depth, fork_depth, "split leaf");
        Ok(hash)
    }

    /// Rewrite `ancestors` bottom-up so they point at the changed child
    fn write_ancestors(
        &self,
        version: u64,
        key_path: &BitPath,
        ancestors: &[MapNode],
        mut hash: Hash,
    ) -> Result<Hash> {
        for (depth, ancestor) in ancestors.iter().enumerate().rev() {
            let node = ancestor
                .with_child(key_path.at(depth)?, ChildRef { version, hash })
                .ok_or_else(|| Error::Corruption(format!("leaf ancestor at depth {}", depth)))?;
            self.store
                .write_node(version, &key_path.slice(0, depth)?, &node)?;
            hash = node_hash(&node, depth)?;
        }
        Ok(hash)
    }
}

/// The leaf hash at the fork if its leaf belongs to exactly `key_path`
fn matched_leaf_hash(fork: &Fork, key_path: &BitPath) -> Result<Option<Hash>> {
    match &fork.head {
        Some(MapNode::Leaf {
            leaf_hash,
            remaining_path,
        }) => {
            let depth = fork.depth();
            if remaining_path.len() + depth != KEY_BITS {
                return Err(Error::Corruption(format!(
                    "leaf at depth {} has {} remaining bits",
                    depth,
                    remaining_path.len()
                )));
            }
            let matches = *remaining_path == key_path.suffix(depth)?;
            Ok(matches.then_some(*leaf_hash))
        }
        _ => Ok(None),
    }
}

/// The leaf hash `action` produces given the current one
fn next_leaf_hash(action: &MapAction, prev_leaf_hash: Hash) -> Hash {
    match action {
        MapAction::Set { value } => leaf_hash(value),
        MapAction::Delete => null_leaf_hash(),
        MapAction::Update {
            value,
            previous_leaf_hash,
        } => {
            if *previous_leaf_hash == prev_leaf_hash {
                leaf_hash(value)
            } else {
                prev_leaf_hash
            }
        }
    }
}
