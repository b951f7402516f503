//! Versioned node storage
//!
//! The trie reads and writes nodes by (version, path prefix). Every such
//! address is written at most once; later versions reference older nodes
//! instead of copying them. Values are stored separately, addressed by
//! their leaf hash.

mod blob;
mod file_store;
mod memory;

pub use blob::{Blob, BlobType, DEFAULT_COMPRESSION_LEVEL};
pub use file_store::FileStore;
pub use memory::MemoryStore;

use crate::model::{BitPath, Hash};
use crate::trie::MapNode;
use crate::Result;
use std::fmt;

/// Storage address of a node
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeKey {
    pub version: u64,
    pub path: BitPath,
}

impl NodeKey {
    pub fn new(version: u64, path: &BitPath) -> Self {
        NodeKey {
            version,
            path: path.clone(),
        }
    }
}

impl fmt::Display for NodeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}:{}/{}", self.version, self.path, self.path.len())
    }
}

/// Read/write access to trie nodes
///
/// Methods take `&self`; implementations synchronize internally so that
/// readers of committed versions never wait on the writer.
pub trait NodeStore {
    /// The node written at exactly this (version, path)
    ///
    /// Fails with [`crate::Error::NotFound`] if nothing was written there.
    fn read_node(&self, version: u64, path: &BitPath) -> Result<MapNode>;

    /// Write a node; rewriting identical content is a no-op, different
    /// content fails with [`crate::Error::Conflict`]
    fn write_node(&self, version: u64, path: &BitPath, node: &MapNode) -> Result<()>;
}

/// Content-addressed storage of leaf inputs
pub trait ValueStore {
    /// Store a value and return its leaf hash
    fn put_value(&self, value: &[u8]) -> Result<Hash>;

    /// The value whose leaf hash is `leaf_hash`, if stored
    fn get_value(&self, leaf_hash: &Hash) -> Result<Option<Vec<u8>>>;
}
