//! In-memory node store
//!
//! Nodes live in an append-only arena; a (version, path) index maps each
//! address to its arena slot.

use super::{NodeKey, NodeStore, ValueStore};
use crate::model::{BitPath, Hash};
use crate::trie::{leaf_hash, MapNode};
use crate::{Error, Result};
use parking_lot::RwLock;
use std::collections::HashMap;

#[derive(Default)]
struct Arena {
    nodes: Vec<MapNode>,
    index: HashMap<NodeKey, usize>,
    values: HashMap<Hash, Vec<u8>>,
}

/// A node store held entirely in memory
#[derive(Default)]
pub struct MemoryStore {
    arena: RwLock<Arena>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of nodes ever written
    pub fn node_count(&self) -> usize {
        self.arena.read().nodes.len()
    }

    /// Addresses of all nodes written under `version`
    pub fn keys_at(&self, version: u64) -> Vec<NodeKey> {
        let arena = self.arena.read();
        let mut keys: Vec<_> = arena
            .index
            .keys()
            .filter(|k| k.version == version)
            .cloned()
            .collect();
        keys.sort();
        keys
    }
}

impl NodeStore for MemoryStore {
    fn read_node(&self, version: u64, path: &BitPath) -> Result<MapNode> {
        let arena = self.arena.read();
        let key = NodeKey::new(version, path);
        arena
            .index
            .get(&key)
            .map(|&slot| arena.nodes[slot].clone())
            .ok_or_else(|| Error::NotFound(key.to_string()))
    }

    fn write_node(&self, version: u64, path: &BitPath, node: &MapNode) -> Result<()> {
        let mut arena = self.arena.write();
        let key = NodeKey::new(version, path);

        if let Some(&slot) = arena.index.get(&key) {
            if arena.nodes[slot] == *node {
                return Ok(());
            }
            return Err(Error::Conflict(key.to_string()));
        }

        let slot = arena.nodes.len();
        arena.nodes.push(node.clone());
        arena.index.insert(key, slot);
        Ok(())
    }
}

impl ValueStore for MemoryStore {
    fn put_value(&self, value: &[u8]) -> Result<Hash> {
        let hash = leaf_hash(value);
        self.arena
            .write()
            .values
            .entry(hash)
            .or_insert_with(|| value.to_vec());
        Ok(hash)
    }

    fn get_value(&self, leaf_hash: &Hash) -> Result<Option<Vec<u8>>> {
        Ok(self.arena.read().values.get(leaf_hash).cloned())
    }
}
