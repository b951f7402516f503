//! High-level map API
//!
//! This module provides the main entry point for working with a map file:
//! it sequences mutations, keeps values alongside the trie, and publishes
//! a new version only after all of its nodes were written.

use crate::config::MapConfig;
use crate::model::{Hash, MapMutation, MapRef};
use crate::ops::{apply_mutation, Mutation};
use crate::store::{FileStore, ValueStore};
use crate::trie::{leaf_hash, MerkleMap};
use crate::{Error, Result};
use std::path::Path;
use tracing::{debug, warn};

/// A single verifiable map stored in one file
///
/// Mutations are applied one at a time through `&mut self`; reads of any
/// committed version only need `&self`.
pub struct MapDatabase {
    store: FileStore,
    config: MapConfig,
}

impl MapDatabase {
    /// Create a new map file, using the saved config if there is one
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let config = MapConfig::load(path)?;
        Self::with_store(FileStore::create(path)?, config)
    }

    /// Create a new map file and save `config` next to it
    pub fn create_with_config(path: impl AsRef<Path>, config: MapConfig) -> Result<Self> {
        let path = path.as_ref();
        config.save(path)?;
        Self::with_store(FileStore::create(path)?, config)
    }

    /// Open an existing map file
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let config = MapConfig::load(path)?;
        Self::with_store(FileStore::open(path)?, config)
    }

    /// Open or create a map file
    pub fn open_or_create(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let config = MapConfig::load(path)?;
        Self::with_store(FileStore::open_or_create(path)?, config)
    }

    fn with_store(store: FileStore, config: MapConfig) -> Result<Self> {
        let store = store.with_compression_level(config.compression_level);
        let discarded = store.rollback();
        if discarded > 0 {
            warn!(discarded, "dropped nodes of an unpublished version");
        }
        Ok(MapDatabase { store, config })
    }

    /// Identity of this map
    pub fn map_ref(&self) -> MapRef {
        self.config.map_ref()
    }

    pub fn config(&self) -> &MapConfig {
        &self.config
    }

    /// Latest committed version (the number of mutations applied)
    pub fn size(&self) -> u64 {
        self.store.tree_size()
    }

    /// Root hash at `version`, or at the latest version
    pub fn root_hash(&self, version: Option<u64>) -> Result<Hash> {
        let version = self.resolve(version)?;
        MerkleMap::new(&self.store).root_hash(version)
    }

    /// Apply one mutation on top of the latest version
    ///
    /// Returns the new version and its root hash. On failure nothing is
    /// published and the nodes written for the failed version are dropped.
    /// A value is stored only when the new version actually holds it, so a
    /// mismatched compare-and-swap leaves no trace beyond its root.
    pub fn apply(&mut self, mutation: MapMutation) -> Result<(u64, Hash)> {
        let size = self.size();
        match self.try_apply(size, mutation) {
            Ok(applied) => Ok(applied),
            Err(e) => {
                self.store.set_tree_size(size);
                let discarded = self.store.rollback();
                warn!(size, discarded, error = %e, "mutation failed");
                Err(e)
            }
        }
    }

    fn try_apply(&self, size: u64, mutation: MapMutation) -> Result<(u64, Hash)> {
        let map = self.map_ref();
        let mutation = Mutation::map(map.clone(), mutation);
        let (new_size, root) = apply_mutation(&self.store, size, &mutation)?;

        if let Mutation::SetMapValue { entry, .. } = &mutation {
            if let Some(value) = entry.action.value() {
                let stored = MerkleMap::new(&self.store).get(new_size, &entry.key)?;
                if stored == Some(leaf_hash(value)) {
                    self.store.put_value(value)?;
                }
            }
        }

        self.store.set_tree_size(new_size);
        if self.config.sync_on_apply {
            self.store.sync()?;
        }

        debug!(%map, size = new_size, root = %root.short(), "committed");
        Ok((new_size, root))
    }

    /// Set `key` to `value`
    pub fn set(
        &mut self,
        key: impl Into<Vec<u8>>,
        value: impl Into<Vec<u8>>,
    ) -> Result<(u64, Hash)> {
        self.apply(MapMutation::set(key, value))
    }

    /// Set `key` to `value` if its current leaf hash is `previous_leaf_hash`
    pub fn update(
        &mut self,
        key: impl Into<Vec<u8>>,
        value: impl Into<Vec<u8>>,
        previous_leaf_hash: Hash,
    ) -> Result<(u64, Hash)> {
        self.apply(MapMutation::update(key, value, previous_leaf_hash))
    }

    /// Remove `key`
    pub fn delete(&mut self, key: impl Into<Vec<u8>>) -> Result<(u64, Hash)> {
        self.apply(MapMutation::delete(key))
    }

    /// Leaf hash of `key` at `version` (latest if `None`)
    pub fn leaf_hash(&self, key: &[u8], version: Option<u64>) -> Result<Option<Hash>> {
        let version = self.resolve(version)?;
        MerkleMap::new(&self.store).get(version, key)
    }

    /// Value of `key` at `version` (latest if `None`)
    pub fn get(&self, key: &[u8], version: Option<u64>) -> Result<Option<Vec<u8>>> {
        match self.leaf_hash(key, version)? {
            Some(hash) => self
                .store
                .get_value(&hash)?
                .map(Some)
                .ok_or_else(|| Error::Corruption(format!("missing value for leaf {}", hash))),
            None => Ok(None),
        }
    }

    /// Flush to disk
    pub fn sync(&self) -> Result<()> {
        self.store.sync()
    }

    /// The underlying store
    pub fn store(&self) -> &FileStore {
        &self.store
    }

    fn resolve(&self, version: Option<u64>) -> Result<u64> {
        let size = self.size();
        match version {
            None => Ok(size),
            Some(v) if v <= size => Ok(v),
            Some(v) => Err(Error::NotFound(format!(
                "version {} (map size is {})",
                v, size
            ))),
        }
    }
}
