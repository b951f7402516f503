//! Single-file node store
//!
//! File format:
//! ```text
//! [HEADER: 64 bytes]
//!   - magic: 8 bytes ("VERIMAP\0")
//!   - version: 4 bytes (u32 LE)
//!   - flags: 4 bytes
//!   - committed_end: 8 bytes (u64 LE)
//!   - tree_size: 8 bytes (u64 LE)
//!   - reserved: 32 bytes
//!
//! [RECORDS: variable, append-only]
//!   node:  tag 0, version u64, path_len u16, path bytes, size u32, blob
//!   value: tag 1, leaf hash (32 bytes), size u32, blob
//! ```
//!
//! Each record carries its own key, so the indexes are rebuilt by replaying
//! the records on open. [`FileStore::sync`] makes the appended records
//! durable before the header moves `committed_end` past them. Bytes beyond
//! `committed_end` are ignored on open and overwritten by later appends, so
//! a crash mid-mutation loses only what was never synced.

use super::blob::{Blob, BlobType, DEFAULT_COMPRESSION_LEVEL};
use super::{NodeKey, NodeStore, ValueStore};
use crate::model::{BitPath, Hash, HASH_LEN};
use crate::trie::{leaf_hash, MapNode};
use crate::{Error, Result, MAGIC, VERSION};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{BufReader, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, trace, warn};

const HEADER_SIZE: u64 = 64;

/// Offset of `committed_end` and `tree_size` in the header
const COMMIT_FIELDS: u64 = 16;

/// Location of a record in the file
#[derive(Clone, Copy, Debug)]
struct IndexEntry {
    /// Start of the record's frame (its tag byte)
    frame: u64,
    /// Start of the blob
    offset: u64,
    size: u32,
}

/// In-memory indexes for fast lookups
#[derive(Default)]
struct Index {
    nodes: HashMap<NodeKey, IndexEntry>,
    values: HashMap<Hash, IndexEntry>,
}

/// A versioned node store backed by a single file
pub struct FileStore {
    path: PathBuf,
    file: RwLock<File>,
    index: RwLock<Index>,
    /// Latest committed version
    tree_size: RwLock<u64>,
    /// Current append position
    write_offset: RwLock<u64>,
    /// Record bytes covered by the on-disk header
    committed_end: RwLock<u64>,
    compression_level: i32,
    #[cfg(test)]
    fail_next_sync: std::sync::atomic::AtomicBool,
}

impl FileStore {
    /// Create a new map file, truncating any existing one
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(&path)?;

        let mut header = [0u8; HEADER_SIZE as usize];
        header[0..8].copy_from_slice(MAGIC);
        header[8..12].copy_from_slice(&VERSION.to_le_bytes());
        header[16..24].copy_from_slice(&HEADER_SIZE.to_le_bytes());
        file.write_all(&header)?;
        file.sync_all()?;

        debug!(path = %path.display(), "created map file");

        Ok(Self::from_parts(path, file, Index::default(), 0, HEADER_SIZE))
    }

    /// Open an existing map file
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        let mut file = OpenOptions::new().read(true).write(true).open(&path)?;

        let mut header = [0u8; HEADER_SIZE as usize];
        file.read_exact(&mut header)
            .map_err(|_| Error::InvalidFile("Truncated header".into()))?;

        if &header[0..8] != MAGIC {
            return Err(Error::InvalidFile("Invalid magic bytes".into()));
        }

        let version = le_u32(&header[8..12]);
        if version != VERSION {
            return Err(Error::VersionMismatch {
                expected: VERSION,
                found: version,
            });
        }

        let committed_end = le_u64(&header[16..24]);
        let tree_size = le_u64(&header[24..32]);

        let file_len = file.metadata()?.len();
        if committed_end < HEADER_SIZE || committed_end > file_len {
            return Err(Error::InvalidFile(format!(
                "committed length {} outside file of {} bytes",
                committed_end, file_len
            )));
        }
        if file_len > committed_end {
            warn!(
                path = %path.display(),
                ignored = file_len - committed_end,
                "ignoring uncommitted bytes"
            );
        }

        let index = replay(&mut file, committed_end)?;

        debug!(
            path = %path.display(),
            nodes = index.nodes.len(),
            values = index.values.len(),
            tree_size,
            "opened map file"
        );

        Ok(Self::from_parts(path, file, index, tree_size, committed_end))
    }

    fn from_parts(path: PathBuf, file: File, index: Index, tree_size: u64, end: u64) -> Self {
        FileStore {
            path,
            file: RwLock::new(file),
            index: RwLock::new(index),
            tree_size: RwLock::new(tree_size),
            write_offset: RwLock::new(end),
            committed_end: RwLock::new(end),
            compression_level: DEFAULT_COMPRESSION_LEVEL,
            #[cfg(test)]
            fail_next_sync: std::sync::atomic::AtomicBool::new(false),
        }
    }

    /// Open or create a map file
    pub fn open_or_create(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if path.exists() {
            Self::open(path)
        } else {
            Self::create(path)
        }
    }

    /// Set the zstd level used for records written from now on
    pub fn with_compression_level(mut self, level: i32) -> Self {
        self.compression_level = level;
        self
    }

    /// Latest committed version
    pub fn tree_size(&self) -> u64 {
        *self.tree_size.read()
    }

    /// Record a newly committed version (persisted on the next sync)
    pub fn set_tree_size(&self, size: u64) {
        *self.tree_size.write() = size;
    }

    /// Forget nodes written above the committed tree size
    ///
    /// Values appended after the first dropped node are forgotten too, and
    /// later appends reuse the space unless the header already covers it.
    /// Returns how many nodes were dropped.
    pub fn rollback(&self) -> usize {
        let tree_size = self.tree_size();
        let mut index = self.index.write();

        let before = index.nodes.len();
        let mut first_dropped: Option<u64> = None;
        index.nodes.retain(|key, entry| {
            let keep = key.version <= tree_size;
            if !keep {
                first_dropped = Some(first_dropped.map_or(entry.frame, |f| f.min(entry.frame)));
            }
            keep
        });
        let dropped = before - index.nodes.len();

        if let Some(first) = first_dropped {
            let cut = first.max(*self.committed_end.read());
            index.values.retain(|_, entry| entry.frame < cut);
            let mut write_offset = self.write_offset.write();
            *write_offset = (*write_offset).min(cut);
        }
        dropped
    }

    /// Number of nodes in the store
    pub fn node_count(&self) -> usize {
        self.index.read().nodes.len()
    }

    /// Number of distinct values in the store
    pub fn value_count(&self) -> usize {
        self.index.read().values.len()
    }

    /// Get the file path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Make appended records durable, then commit them and the tree size
    pub fn sync(&self) -> Result<()> {
        #[cfg(test)]
        let injected = self
            .fail_next_sync
            .swap(false, std::sync::atomic::Ordering::SeqCst);
        #[cfg(not(test))]
        let injected = false;
        if injected {
            return Err(Error::Io(std::io::Error::other("injected sync failure")));
        }

        let end = *self.write_offset.read();
        let tree_size = self.tree_size();
        let mut file = self.file.write();

        file.set_len(end)?;
        file.sync_data()?;

        let mut fields = [0u8; 16];
        fields[0..8].copy_from_slice(&end.to_le_bytes());
        fields[8..16].copy_from_slice(&tree_size.to_le_bytes());
        file.seek(SeekFrom::Start(COMMIT_FIELDS))?;
        file.write_all(&fields)?;
        file.sync_all()?;

        *self.committed_end.write() = end;
        debug!(committed_end = end, tree_size, "synced map file");
        Ok(())
    }

    /// Make the next [`FileStore::sync`] fail without touching the file
    #[cfg(test)]
    pub(crate) fn fail_next_sync(&self) {
        self.fail_next_sync
            .store(true, std::sync::atomic::Ordering::SeqCst);
    }

    /// Append a framed record and return where its blob landed
    fn append(&self, key: &[u8], blob: &Blob) -> Result<IndexEntry> {
        let compressed = blob.compress(self.compression_level)?;
        let size = u32::try_from(compressed.len())
            .map_err(|_| Error::InvalidRequest(format!("record of {} bytes", compressed.len())))?;

        let mut frame = Vec::with_capacity(1 + key.len() + 4 + compressed.len());
        frame.push(blob.blob_type.as_byte());
        frame.extend_from_slice(key);
        frame.extend_from_slice(&size.to_le_bytes());
        let body = frame.len() as u64;
        frame.extend_from_slice(&compressed);

        let mut write_offset = self.write_offset.write();
        let start = *write_offset;

        let mut file = self.file.write();
        file.seek(SeekFrom::Start(start))?;
        file.write_all(&frame)?;

        *write_offset = start + frame.len() as u64;
        Ok(IndexEntry {
            frame: start,
            offset: start + body,
            size,
        })
    }

    fn read_record(&self, entry: IndexEntry, expected: BlobType) -> Result<Blob> {
        let mut file = self.file.write();
        file.seek(SeekFrom::Start(entry.offset))?;

        let mut data = vec![0u8; entry.size as usize];
        file.read_exact(&mut data)?;

        Blob::decompress_as(&data, expected)
    }
}

impl NodeStore for FileStore {
    fn read_node(&self, version: u64, path: &BitPath) -> Result<MapNode> {
        let key = NodeKey::new(version, path);
        let entry = self.index.read().nodes.get(&key).copied();
        let entry = entry.ok_or_else(|| Error::NotFound(key.to_string()))?;

        let blob = self.read_record(entry, BlobType::Node)?;
        Ok(bincode::deserialize(&blob.data)?)
    }

    fn write_node(&self, version: u64, path: &BitPath, node: &MapNode) -> Result<()> {
        let key = NodeKey::new(version, path);

        let existing = self.index.read().nodes.get(&key).copied();
        if let Some(entry) = existing {
            let blob = self.read_record(entry, BlobType::Node)?;
            let stored: MapNode = bincode::deserialize(&blob.data)?;
            if stored == *node {
                return Ok(());
            }
            return Err(Error::Conflict(key.to_string()));
        }

        let path_bytes = path.to_bytes();
        let mut frame_key = Vec::with_capacity(10 + path_bytes.len());
        frame_key.extend_from_slice(&version.to_le_bytes());
        frame_key.extend_from_slice(&(path_bytes.len() as u16).to_le_bytes());
        frame_key.extend_from_slice(&path_bytes);

        let blob = Blob::new(BlobType::Node, bincode::serialize(node)?);
        let entry = self.append(&frame_key, &blob)?;
        trace!(%key, size = entry.size, "wrote node");

        self.index.write().nodes.insert(key, entry);
        Ok(())
    }
}

impl ValueStore for FileStore {
    fn put_value(&self, value: &[u8]) -> Result<Hash> {
        let hash = leaf_hash(value);
        if self.index.read().values.contains_key(&hash) {
            return Ok(hash);
        }

        let entry = self.append(hash.as_bytes(), &Blob::new(BlobType::Value, value.to_vec()))?;
        self.index.write().values.insert(hash, entry);
        Ok(hash)
    }

    fn get_value(&self, leaf_hash: &Hash) -> Result<Option<Vec<u8>>> {
        let entry = self.index.read().values.get(leaf_hash).copied();
        match entry {
            Some(entry) => Ok(Some(self.read_record(entry, BlobType::Value)?.data)),
            None => Ok(None),
        }
    }
}

impl Drop for FileStore {
    fn drop(&mut self) {
        // Best-effort sync on drop
        let _ = self.sync();
    }
}

enum RecordKey {
    Node(NodeKey),
    Value(Hash),
}

/// Rebuild the indexes from the records in `[HEADER_SIZE, end)`
fn replay(file: &mut File, end: u64) -> Result<Index> {
    let mut reader = BufReader::new(file);
    reader.seek(SeekFrom::Start(HEADER_SIZE))?;

    let mut index = Index::default();
    let mut offset = HEADER_SIZE;
    while offset < end {
        let frame = offset;
        let mut tag = [0u8; 1];
        reader.read_exact(&mut tag)?;
        offset += 1;

        let blob_type = BlobType::from_byte(tag[0]).ok_or_else(|| {
            Error::Corruption(format!("unknown record tag {} at {}", tag[0], frame))
        })?;

        let key = match blob_type {
            BlobType::Node => {
                let mut fixed = [0u8; 10];
                reader.read_exact(&mut fixed)?;
                let path_len = u16::from_le_bytes([fixed[8], fixed[9]]) as usize;
                let mut path_buf = vec![0u8; path_len];
                reader.read_exact(&mut path_buf)?;
                offset += 10 + path_len as u64;
                RecordKey::Node(NodeKey {
                    version: le_u64(&fixed[0..8]),
                    path: BitPath::from_bytes(&path_buf)?,
                })
            }
            BlobType::Value => {
                let mut hash_bytes = [0u8; HASH_LEN];
                reader.read_exact(&mut hash_bytes)?;
                offset += HASH_LEN as u64;
                RecordKey::Value(Hash::from_bytes(hash_bytes))
            }
        };

        let mut size = [0u8; 4];
        reader.read_exact(&mut size)?;
        let size = u32::from_le_bytes(size);
        offset += 4;

        let entry = IndexEntry {
            frame,
            offset,
            size,
        };
        reader.seek_relative(i64::from(size))?;
        offset += u64::from(size);

        // Later records win, matching the order they were indexed in
        match key {
            RecordKey::Node(key) => {
                index.nodes.insert(key, entry);
            }
            RecordKey::Value(hash) => {
                index.values.insert(hash, entry);
            }
        }
    }

    if offset != end {
        return Err(Error::Corruption(format!(
            "record at end of log overruns committed length {}",
            end
        )));
    }
    Ok(index)
}

fn le_u64(bytes: &[u8]) -> u64 {
    let mut arr = [0u8; 8];
    arr.copy_from_slice(bytes);
    u64::from_le_bytes(arr)
}

fn le_u32(bytes: &[u8]) -> u32 {
    let mut arr = [0u8; 4];
    arr.copy_from_slice(bytes);
    u32::from_le_bytes(arr)
}
