//! Immutable sealed cells.
//!
//! A [`Cell`] is produced by [`CellBuilder::seal`](crate::CellBuilder::seal)
//! and never changes afterwards. Cloning is cheap (reference counted), so a
//! subtree can be shared by several parents, but nothing can mutate it.
//!
//! ## Representation hash
//!
//! ```text
//! d1   = refs_count                      (ordinary cell, level 0)
//! d2   = floor(bits / 8) + ceil(bits / 8)
//! repr = d1 || d2 || padded_data || depth(ref_i) as u16 BE ... || hash(ref_i) ...
//! hash = SHA-256(repr)
//! ```
//!
//! Data is padded by appending a single `1` bit and then zeros up to the next
//! byte boundary when the bit length is not a multiple of eight.

use std::fmt;
use std::sync::Arc;

use sha2::{Digest, Sha256};

use crate::slice::CellSlice;

/// An immutable cell: up to 1023 data bits plus up to 4 child references.
#[derive(Clone)]
pub struct Cell(Arc<CellInner>);

struct CellInner {
    data: Vec<u8>,
    bit_len: usize,
    refs: Vec<Cell>,
    hash: [u8; 32],
    depth: u16,
}

impl Cell {
    /// Build a cell from already validated parts. Bits past `bit_len` in the
    /// last byte must be zero.
    pub(crate) fn from_parts(data: Vec<u8>, bit_len: usize, refs: Vec<Cell>) -> Self {
        let depth = refs
            .iter()
            .map(|r| r.depth().saturating_add(1))
            .max()
            .unwrap_or(0);

        let mut hasher = Sha256::new();
        hasher.update(descriptors(bit_len, refs.len()));
        hasher.update(padded_data(&data, bit_len));
        for r in &refs {
            hasher.update(r.depth().to_be_bytes());
        }
        for r in &refs {
            hasher.update(r.hash());
        }
        let hash: [u8; 32] = hasher.finalize().into();

        Self(Arc::new(CellInner {
            data,
            bit_len,
            refs,
            hash,
            depth,
        }))
    }

    /// A cell with no data and no refs.
    pub fn empty() -> Self {
        Self::from_parts(Vec::new(), 0, Vec::new())
    }

    /// Start parsing this cell from the beginning.
    pub fn parse(&self) -> CellSlice<'_> {
        CellSlice::new(self)
    }

    /// Raw data bytes; bits past [`bit_len`](Self::bit_len) are zero.
    pub fn data(&self) -> &[u8] {
        &self.0.data
    }

    /// Number of data bits.
    pub fn bit_len(&self) -> usize {
        self.0.bit_len
    }

    /// Child references in order.
    pub fn refs(&self) -> &[Cell] {
        &self.0.refs
    }

    /// SHA-256 representation hash.
    pub fn hash(&self) -> [u8; 32] {
        self.0.hash
    }

    /// Maximum distance to a leaf (0 for a cell without refs).
    pub fn depth(&self) -> u16 {
        self.0.depth
    }

    /// Whether the cell carries neither data nor refs.
    pub fn is_empty(&self) -> bool {
        self.0.bit_len == 0 && self.0.refs.is_empty()
    }

    /// The `d1 d2` descriptor bytes used by the hash and by bag-of-cells.
    pub(crate) fn descriptor_bytes(&self) -> [u8; 2] {
        descriptors(self.0.bit_len, self.0.refs.len())
    }

    /// Data bytes with the completion tag applied.
    pub(crate) fn padded_data(&self) -> Vec<u8> {
        padded_data(&self.0.data, self.0.bit_len)
    }
}

fn descriptors(bit_len: usize, refs: usize) -> [u8; 2] {
    // Both fit in a byte: refs <= 4 and bit_len <= 1023.
    let d1 = refs as u8;
    let d2 = ((bit_len / 8) + bit_len.div_ceil(8)) as u8;
    [d1, d2]
}

fn padded_data(data: &[u8], bit_len: usize) -> Vec<u8> {
    let mut out = data[..bit_len.div_ceil(8)].to_vec();
    let rem = bit_len % 8;
    if rem != 0 {
        if let Some(last) = out.last_mut() {
            *last |= 0x80 >> rem;
        }
    }
    out
}

impl PartialEq for Cell {
    fn eq(&self, other: &Self) -> bool {
        self.0.hash == other.0.hash
    }
}

impl Eq for Cell {}

impl std::hash::Hash for Cell {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.0.hash.hash(state);
    }
}

impl fmt::Debug for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Cell{{bits: {}, data: x{{{}}}", self.bit_len(), hex::encode(self.data()))?;
        if !self.refs().is_empty() {
            write!(f, ", refs: {:?}", self.refs())?;
        }
        write!(f, "}}")
    }
}

impl Default for Cell {
    fn default() -> Self {
        Self::empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::CellBuilder;

    #[test]
    fn test_empty_cell_hash() {
        // Well-known hash of the empty ordinary cell.
        let cell = Cell::empty();
        assert_eq!(
            hex::encode(cell.hash()),
            "96a296d224f285c67bee93c30f8a309157f0daa35dc5b87e410b78630a09cfc7"
        );
        assert_eq!(cell.depth(), 0);
        assert!(cell.is_empty());
    }

    #[test]
    fn test_padding_tag() {
        let mut b = CellBuilder::new();
        b.store_uint(0b101, 3).expect("store");
        let cell = b.seal();
        assert_eq!(cell.data(), &[0b1010_0000]);
        assert_eq!(cell.padded_data(), vec![0b1011_0000]);
        assert_eq!(cell.descriptor_bytes(), [0, 1]);
    }

    #[test]
    fn test_full_byte_descriptor() {
        let mut b = CellBuilder::new();
        b.store_uint(0xABCD, 16).expect("store");
        let cell = b.seal();
        assert_eq!(cell.descriptor_bytes(), [0, 4]);
        assert_eq!(cell.padded_data(), vec![0xAB, 0xCD]);
    }

    #[test]
    fn test_depth_and_equality() {
        let leaf = CellBuilder::new().seal();
        let mut mid = CellBuilder::new();
        mid.store_ref(leaf.clone()).expect("ref");
        let mid = mid.seal();
        let mut root = CellBuilder::new();
        root.store_ref(mid.clone()).expect("ref");
        root.store_ref(leaf).expect("ref");
        let root = root.seal();

        assert_eq!(mid.depth(), 1);
        assert_eq!(root.depth(), 2);
        assert_ne!(root, mid);

        let mut again = CellBuilder::new();
        again.store_ref(Cell::empty()).expect("ref");
        assert_eq!(again.seal(), mid);
    }
}
