//! # verimap
//!
//! A versioned, authenticated key/value map.
//!
//! verimap stores a map as a path-compressed sparse Merkle trie over
//! 256-bit hashed keys. Every mutation produces a new version with its own
//! root hash while sharing every unchanged subtree with earlier versions,
//! so any historical version stays readable and its root hash remains a
//! commitment to its exact contents.
//!
//! ## Core Concepts
//!
//! - **Versions**: version `n` is the map after its first `n` mutations
//! - **Nodes**: immutable, addressed by (version, path prefix)
//! - **Mutations**: `set`, `delete`, and compare-and-swap `update`
//! - **Leaf hashes**: domain-separated hashes of values; a reserved null
//!   leaf hash marks an absent key
//!
//! ## Example
//!
//! ```ignore
//! use verimap::MapDatabase;
//!
//! let mut db = MapDatabase::open_or_create("users.vmap")?;
//! let (version, root) = db.set("alice", "admin")?;
//! assert_eq!(db.get(b"alice", Some(version))?, Some(b"admin".to_vec()));
//! ```

pub mod config;
pub mod model;
pub mod ops;
pub mod store;
pub mod trie;

mod database;
mod error;

pub use config::MapConfig;
pub use database::MapDatabase;
pub use error::{Error, Result};
pub use model::{BitPath, Hash, LogRef, LogType, MapAction, MapMutation, MapRef, MutationEntry};
pub use ops::{apply_mutation, Mutation};
pub use store::{FileStore, MemoryStore, NodeStore, ValueStore};
pub use trie::{leaf_hash, null_leaf_hash, ChildRef, MapNode, MerkleMap};

/// Map file format version
pub const VERSION: u32 = 1;

/// Magic bytes for file identification
pub const MAGIC: &[u8; 8] = b"VERIMAP\0";
