//! Bit paths through the binary trie
//!
//! A [`BitPath`] is an exact-length sequence of bits, packed MSB-first.
//! Full key paths are always [`KEY_BITS`] long; leaves store shorter
//! "remaining" suffixes of their key path.

use super::Hash;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Length in bits of every full key path
pub const KEY_BITS: usize = 256;

/// Largest path length the byte encoding can carry
const MAX_BITS: usize = u16::MAX as usize;

/// An immutable, exact-length sequence of bits
///
/// Bit `0` is the one consumed at the root. A `true` bit means "go right".
/// Unused bits of the last byte are always zero, so two paths are equal
/// exactly when they have the same length and the same bits.
#[derive(Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "Vec<u8>", try_from = "Vec<u8>")]
pub struct BitPath {
    len: usize,
    bits: Vec<u8>,
}

impl BitPath {
    /// The zero-length path (the root's position)
    pub fn empty() -> Self {
        BitPath::default()
    }

    /// Derive the fixed-width path for a map key
    pub fn from_key(key: &[u8]) -> Self {
        Self::from_hash(&Hash::digest(key))
    }

    /// Use all bits of a hash as a path
    pub fn from_hash(hash: &Hash) -> Self {
        BitPath {
            len: KEY_BITS,
            bits: hash.as_bytes().to_vec(),
        }
    }

    /// Build a path from individual bits
    ///
    /// Fails with [`Error::OutOfRange`] past the longest encodable path.
    pub fn from_bits(bits: impl IntoIterator<Item = bool>) -> Result<Self> {
        let mut path = BitPath::empty();
        for bit in bits {
            path.push(bit)?;
        }
        Ok(path)
    }

    /// Number of bits
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The bit at `depth`; `true` is right, `false` is left
    pub fn at(&self, depth: usize) -> Result<bool> {
        if depth >= self.len {
            return Err(Error::OutOfRange {
                index: depth,
                len: self.len,
            });
        }
        Ok(self.bit(depth))
    }

    /// The sub-path covering bits `[start, end)`
    pub fn slice(&self, start: usize, end: usize) -> Result<BitPath> {
        if end > self.len {
            return Err(Error::OutOfRange {
                index: end,
                len: self.len,
            });
        }
        if start > end {
            return Err(Error::OutOfRange {
                index: start,
                len: end,
            });
        }
        Self::from_bits((start..end).map(|i| self.bit(i)))
    }

    /// The suffix starting at `start`
    pub fn suffix(&self, start: usize) -> Result<BitPath> {
        self.slice(start, self.len)
    }

    /// This path followed by `other`
    pub fn join(&self, other: &BitPath) -> Result<BitPath> {
        let mut joined = self.clone();
        for i in 0..other.len {
            joined.push(other.bit(i))?;
        }
        Ok(joined)
    }

    /// Length of the longest shared prefix
    pub fn common_prefix_len(&self, other: &BitPath) -> usize {
        let max = self.len.min(other.len);
        let whole_bytes = max / 8;
        let mut n = self.bits[..whole_bytes]
            .iter()
            .zip(&other.bits[..whole_bytes])
            .take_while(|(a, b)| a == b)
            .count()
            * 8;
        while n < max && self.bit(n) == other.bit(n) {
            n += 1;
        }
        n
    }

    /// Canonical encoding: bit length (u16 big-endian) followed by packed bits
    ///
    /// The empty path encodes to `[0, 0]`, distinct from every other path.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(2 + self.bits.len());
        out.extend_from_slice(&(self.len as u16).to_be_bytes());
        out.extend_from_slice(&self.bits);
        out
    }

    /// Decode the output of [`BitPath::to_bytes`]
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        if data.len() < 2 {
            return Err(Error::Corruption("bit path shorter than header".into()));
        }
        let len = u16::from_be_bytes([data[0], data[1]]) as usize;
        let bits = &data[2..];
        if bits.len() != len.div_ceil(8) {
            return Err(Error::Corruption(format!(
                "bit path of {} bits has {} bytes",
                len,
                bits.len()
            )));
        }
        let path = BitPath {
            len,
            bits: bits.to_vec(),
        };
        if len % 8 != 0 && path.bits[len / 8] & (0xff >> (len % 8)) != 0 {
            return Err(Error::Corruption("bit path has trailing bits set".into()));
        }
        Ok(path)
    }

    fn bit(&self, i: usize) -> bool {
        (self.bits[i / 8] >> (7 - i % 8)) & 1 == 1
    }

    fn push(&mut self, bit: bool) -> Result<()> {
        if self.len >= MAX_BITS {
            return Err(Error::OutOfRange {
                index: self.len,
                len: MAX_BITS,
            });
        }
        if self.len % 8 == 0 {
            self.bits.push(0);
        }
        if bit {
            self.bits[self.len / 8] |= 0x80 >> (self.len % 8);
        }
        self.len += 1;
        Ok(())
    }
}

impl From<BitPath> for Vec<u8> {
    fn from(path: BitPath) -> Self {
        path.to_bytes()
    }
}

impl TryFrom<Vec<u8>> for BitPath {
    type Error = Error;

    fn try_from(data: Vec<u8>) -> Result<Self> {
        BitPath::from_bytes(&data)
    }
}

impl fmt::Display for BitPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for i in 0..self.len {
            f.write_str(if self.bit(i) { "1" } else { "0" })?;
        }
        Ok(())
    }
}

impl fmt::Debug for BitPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.len <= 16 {
            write!(f, "BitPath({})", self)
        } else {
            let head: String = (0..16)
                .map(|i| if self.bit(i) { '1' } else { '0' })
                .collect();
            write!(f, "BitPath({}../{})", head, self.len)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bits(s: &str) -> BitPath {
        BitPath::from_bits(s.chars().map(|c| c == '1')).unwrap()
    }

    #[test]
    fn test_key_path_is_fixed_width() {
        let p = BitPath::from_key(b"a");
        assert_eq!(p.len(), KEY_BITS);
        assert_eq!(p, BitPath::from_key(b"a"));
        assert_ne!(p, BitPath::from_key(b"b"));
    }

    #[test]
    fn test_at_and_out_of_range() {
        let p = bits("1011");
        assert!(p.at(0).unwrap());
        assert!(!p.at(1).unwrap());
        assert!(p.at(3).unwrap());
        assert!(matches!(
            p.at(4),
            Err(Error::OutOfRange { index: 4, len: 4 })
        ));
    }

    #[test]
    fn test_slice() {
        let p = bits("110010111");
        assert_eq!(p.slice(2, 6).unwrap(), bits("0010"));
        assert_eq!(p.slice(0, 0).unwrap(), BitPath::empty());
        assert_eq!(p.suffix(8).unwrap(), bits("1"));
        assert!(p.slice(3, 2).is_err());
        assert!(p.slice(0, 10).is_err());
    }

    #[test]
    fn test_slice_normalizes_trailing_bits() {
        let a = bits("11111111").slice(0, 3).unwrap();
        let b = bits("111");
        assert_eq!(a, b);
        assert_eq!(a.to_bytes(), b.to_bytes());
    }

    #[test]
    fn test_join() {
        let p = BitPath::from_key(b"k");
        let (head, tail) = (p.slice(0, 13).unwrap(), p.suffix(13).unwrap());
        assert_eq!(head.join(&tail).unwrap(), p);
    }

    #[test]
    fn test_length_limit_is_enforced() {
        let longest = BitPath::from_bits(std::iter::repeat(true).take(MAX_BITS)).unwrap();
        assert_eq!(longest.len(), MAX_BITS);
        assert_eq!(BitPath::from_bytes(&longest.to_bytes()).unwrap(), longest);

        assert!(matches!(
            BitPath::from_bits(std::iter::repeat(false).take(MAX_BITS + 1)),
            Err(Error::OutOfRange { .. })
        ));
        assert!(matches!(
            longest.join(&bits("0")),
            Err(Error::OutOfRange { .. })
        ));
    }

    #[test]
    fn test_common_prefix_len() {
        assert_eq!(bits("1010").common_prefix_len(&bits("1011")), 3);
        assert_eq!(bits("0").common_prefix_len(&bits("1")), 0);
        assert_eq!(bits("101").common_prefix_len(&bits("10100")), 3);

        let p = BitPath::from_key(b"x");
        assert_eq!(p.common_prefix_len(&p), KEY_BITS);
        let tail = bits("1").join(&p.suffix(201).unwrap()).unwrap();
        let q = p.slice(0, 200).unwrap().join(&tail).unwrap();
        let expected = if p.at(200).unwrap() { 256 } else { 200 };
        assert_eq!(p.common_prefix_len(&q), expected);
    }

    #[test]
    fn test_empty_path_encoding_is_distinct() {
        let empty = BitPath::empty().to_bytes();
        assert_eq!(empty, vec![0, 0]);
        assert_ne!(empty, bits("0").to_bytes());
        assert_ne!(bits("0").to_bytes(), bits("00").to_bytes());
    }

    #[test]
    fn test_from_bytes_rejects_malformed() {
        assert!(BitPath::from_bytes(&[0]).is_err());
        assert!(BitPath::from_bytes(&[0, 3]).is_err());
        assert!(BitPath::from_bytes(&[0, 3, 0b1111_0000]).is_err());
        assert_eq!(
            BitPath::from_bytes(&[0, 3, 0b1010_0000]).unwrap(),
            bits("101")
        );
    }

    #[test]
    fn test_serde_uses_canonical_encoding() {
        let p = bits("0110");
        let encoded = bincode::serialize(&p).unwrap();
        let decoded: BitPath = bincode::deserialize(&encoded).unwrap();
        assert_eq!(p, decoded);
    }
}
