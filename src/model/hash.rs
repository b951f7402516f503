//! 256-bit digests
//!
//! Every digest in a map is BLAKE3: key paths, leaf hashes and node hashes.
//! [`Hash::tagged`] prefixes a one-byte domain tag so that leaf and node
//! preimages can never collide.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Length of a [`Hash`] in bytes
pub const HASH_LEN: usize = 32;

#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Hash([u8; HASH_LEN]);

impl Hash {
    pub fn from_bytes(bytes: [u8; HASH_LEN]) -> Self {
        Hash(bytes)
    }

    /// Untagged digest, used to turn keys into paths
    pub fn digest(data: &[u8]) -> Self {
        Hash(blake3::hash(data).into())
    }

    /// Digest of `tag` followed by `parts`, fed incrementally
    pub fn tagged(tag: u8, parts: &[&[u8]]) -> Self {
        let mut hasher = blake3::Hasher::new();
        hasher.update(&[tag]);
        for part in parts {
            hasher.update(part);
        }
        Hash(hasher.finalize().into())
    }

    pub fn as_bytes(&self) -> &[u8; HASH_LEN] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// First four bytes in hex, for logs
    pub fn short(&self) -> String {
        hex::encode(&self.0[..4])
    }
}

/// Parses exactly 64 hex digits
impl FromStr for Hash {
    type Err = hex::FromHexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut bytes = [0u8; HASH_LEN];
        hex::decode_to_slice(s, &mut bytes)?;
        Ok(Hash(bytes))
    }
}

impl fmt::Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hash({}..)", self.short())
    }
}
