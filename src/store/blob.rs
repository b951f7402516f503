//! Blob type - the unit of on-disk storage

use crate::{Error, Result};

/// Default zstd level for stored records
pub const DEFAULT_COMPRESSION_LEVEL: i32 = 3;

/// Type tag for blobs
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BlobType {
    /// A bincode-encoded trie node
    Node,
    /// A raw leaf input
    Value,
}

impl BlobType {
    pub fn as_byte(&self) -> u8 {
        match self {
            BlobType::Node => 0,
            BlobType::Value => 1,
        }
    }

    pub fn from_byte(b: u8) -> Option<Self> {
        match b {
            0 => Some(BlobType::Node),
            1 => Some(BlobType::Value),
            _ => None,
        }
    }
}

/// A typed chunk of data, compressed on disk
#[derive(Clone, Debug)]
pub struct Blob {
    pub blob_type: BlobType,
    /// Raw data (uncompressed)
    pub data: Vec<u8>,
}

impl Blob {
    pub fn new(blob_type: BlobType, data: Vec<u8>) -> Self {
        Blob { blob_type, data }
    }

    /// Encode for storage: type byte followed by zstd-compressed data
    pub fn compress(&self, level: i32) -> Result<Vec<u8>> {
        let mut output = vec![self.blob_type.as_byte()];
        output.extend(zstd::encode_all(self.data.as_slice(), level)?);
        Ok(output)
    }

    /// Decode a blob from storage
    pub fn decompress(data: &[u8]) -> Result<Self> {
        let (&tag, body) = data
            .split_first()
            .ok_or_else(|| Error::Corruption("Empty blob data".into()))?;

        let blob_type = BlobType::from_byte(tag)
            .ok_or_else(|| Error::Corruption(format!("Invalid blob type: {}", tag)))?;

        Ok(Blob {
            blob_type,
            data: zstd::decode_all(body)?,
        })
    }

    /// Decode and check the type tag
    pub fn decompress_as(data: &[u8], expected: BlobType) -> Result<Self> {
        let blob = Self::decompress(data)?;
        if blob.blob_type != expected {
            return Err(Error::Corruption(format!(
                "Expected {:?}, got {:?}",
                expected, blob.blob_type
            )));
        }
        Ok(blob)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blob_roundtrip() {
        let original = Blob::new(BlobType::Value, b"hello world".to_vec());
        let compressed = original.compress(DEFAULT_COMPRESSION_LEVEL).unwrap();
        let restored = Blob::decompress(&compressed).unwrap();

        assert_eq!(original.blob_type, restored.blob_type);
        assert_eq!(original.data, restored.data);
    }

    #[test]
    fn test_type_mismatch_is_corruption() {
        let blob = Blob::new(BlobType::Node, vec![1, 2, 3]);
        let compressed = blob.compress(1).unwrap();
        assert!(matches!(
            Blob::decompress_as(&compressed, BlobType::Value),
            Err(Error::Corruption(_))
        ));
    }

    #[test]
    fn test_bad_tag_and_empty_input() {
        assert!(Blob::decompress(&[]).is_err());
        assert!(Blob::decompress(&[9, 0, 0]).is_err());
    }
}
