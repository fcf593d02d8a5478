//! Bag-of-cells serialization.
//!
//! The ledger gateway exchanges cells as a single-root bag of cells (BOC),
//! usually base64 encoded.
//!
//! ## Wire format
//!
//! ```text
//! magic        u32        0xb5ee9c72
//! flags        u8         has_idx:1 has_crc32c:1 has_cache_bits:1 flags:2 size_bytes:3
//! off_bytes    u8
//! cells        size_bytes
//! roots        size_bytes  (always 1 here)
//! absent       size_bytes  (always 0)
//! tot_size     off_bytes
//! root_idx     size_bytes
//! [index]      cells * off_bytes   (only when has_idx)
//! cell data    tot_size bytes: d1 d2 padded_data ref_idx*
//! [crc32c]     u32 LE over everything before it
//! ```
//!
//! Cells are written parents first, so every ref index is greater than the
//! index of the cell that holds it. Identical subtrees are written once.

use std::collections::{HashMap, HashSet};

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use crate::cell::Cell;
use crate::{CellError, Result, MAX_CELL_BITS, MAX_CELL_REFS};

/// Generic BOC magic prefix.
pub const BOC_MAGIC: [u8; 4] = [0xb5, 0xee, 0x9c, 0x72];

const FLAG_HAS_IDX: u8 = 0x80;
const FLAG_HAS_CRC32C: u8 = 0x40;
const SIZE_MASK: u8 = 0x07;

/// Serialize a cell tree into a BOC with a CRC32-C trailer.
pub fn serialize(root: &Cell) -> Vec<u8> {
    let order = topological_order(root);
    let index: HashMap<[u8; 32], usize> = order
        .iter()
        .enumerate()
        .map(|(i, cell)| (cell.hash(), i))
        .collect();
    let size_bytes = byte_width(order.len() as u64);

    let mut cells_data = Vec::new();
    for cell in &order {
        cells_data.extend_from_slice(&cell.descriptor_bytes());
        cells_data.extend(cell.padded_data());
        for child in cell.refs() {
            let idx = index.get(&child.hash()).copied().unwrap_or_default();
            write_uint(&mut cells_data, idx as u64, size_bytes);
        }
    }
    let off_bytes = byte_width(cells_data.len() as u64);

    let mut out = Vec::with_capacity(cells_data.len() + 32);
    out.extend_from_slice(&BOC_MAGIC);
    out.push(FLAG_HAS_CRC32C | size_bytes as u8);
    out.push(off_bytes as u8);
    write_uint(&mut out, order.len() as u64, size_bytes);
    write_uint(&mut out, 1, size_bytes);
    write_uint(&mut out, 0, size_bytes);
    write_uint(&mut out, cells_data.len() as u64, off_bytes);
    write_uint(&mut out, 0, size_bytes);
    out.extend_from_slice(&cells_data);
    let crc = crc32c(&out);
    out.extend_from_slice(&crc.to_le_bytes());
    out
}

/// Parse a single-root BOC of ordinary cells.
///
/// # Errors
///
/// [`CellError::InvalidBoc`] on a bad magic, checksum, header, exotic cell,
/// forward-pointing ref, or truncated input.
pub fn deserialize(bytes: &[u8]) -> Result<Cell> {
    if bytes.len() < 6 || bytes[..4] != BOC_MAGIC {
        return Err(CellError::InvalidBoc("missing magic prefix".to_string()));
    }
    let flags = bytes[4];
    let body = if flags & FLAG_HAS_CRC32C != 0 {
        let split = bytes
            .len()
            .checked_sub(4)
            .ok_or_else(|| CellError::InvalidBoc("truncated checksum".to_string()))?;
        let (body, trailer) = bytes.split_at(split);
        let expected = u32::from_le_bytes([trailer[0], trailer[1], trailer[2], trailer[3]]);
        if crc32c(body) != expected {
            return Err(CellError::InvalidBoc("crc32c mismatch".to_string()));
        }
        body
    } else {
        bytes
    };
    if body.len() < 6 {
        return Err(CellError::InvalidBoc("truncated header".to_string()));
    }

    let mut r = Reader::new(&body[5..]);
    let size_bytes = usize::from(flags & SIZE_MASK);
    if size_bytes == 0 || size_bytes > 4 {
        return Err(CellError::InvalidBoc(format!("bad size_bytes {size_bytes}")));
    }
    let off_bytes = usize::from(r.u8()?);
    if off_bytes == 0 || off_bytes > 8 {
        return Err(CellError::InvalidBoc(format!("bad off_bytes {off_bytes}")));
    }
    let cells = r.uint(size_bytes)? as usize;
    let roots = r.uint(size_bytes)?;
    let absent = r.uint(size_bytes)?;
    let tot_size = r.uint(off_bytes)? as usize;
    if roots != 1 {
        return Err(CellError::InvalidBoc(format!("expected 1 root, got {roots}")));
    }
    if absent != 0 {
        return Err(CellError::InvalidBoc("absent cells are not supported".to_string()));
    }
    let root_idx = r.uint(size_bytes)? as usize;
    if flags & FLAG_HAS_IDX != 0 {
        r.take(cells.saturating_mul(off_bytes))?;
    }
    let data = r.take(tot_size)?;
    if cells == 0 || cells > data.len() / 2 || root_idx >= cells {
        return Err(CellError::InvalidBoc(format!(
            "inconsistent cell count {cells} for {} data bytes",
            data.len()
        )));
    }

    let raws = parse_raw_cells(data, cells, size_bytes)?;
    let mut built: Vec<Option<Cell>> = vec![None; cells];
    for (i, raw) in raws.into_iter().enumerate().rev() {
        let refs = raw
            .refs
            .iter()
            .map(|&j| {
                built[j]
                    .clone()
                    .ok_or_else(|| CellError::InvalidBoc(format!("unresolved ref {j}")))
            })
            .collect::<Result<Vec<_>>>()?;
        built[i] = Some(Cell::from_parts(raw.data, raw.bit_len, refs));
    }
    built[root_idx]
        .take()
        .ok_or_else(|| CellError::InvalidBoc("missing root".to_string()))
}

/// Serialize to standard base64.
pub fn to_base64(root: &Cell) -> String {
    STANDARD.encode(serialize(root))
}

/// Parse standard base64.
pub fn from_base64(s: &str) -> Result<Cell> {
    let bytes = STANDARD
        .decode(s.trim())
        .map_err(|e| CellError::InvalidBoc(format!("bad base64: {e}")))?;
    deserialize(&bytes)
}

struct RawCell {
    data: Vec<u8>,
    bit_len: usize,
    refs: Vec<usize>,
}

fn parse_raw_cells(data: &[u8], cells: usize, size_bytes: usize) -> Result<Vec<RawCell>> {
    let mut r = Reader::new(data);
    let mut raws = Vec::with_capacity(cells);
    for i in 0..cells {
        let d1 = r.u8()?;
        let d2 = r.u8()?;
        if d1 & !0x07 != 0 {
            return Err(CellError::InvalidBoc(format!(
                "cell {i}: exotic or leveled cells are not supported (d1={d1:#04x})"
            )));
        }
        let ref_count = usize::from(d1 & 0x07);
        if ref_count > MAX_CELL_REFS {
            return Err(CellError::InvalidBoc(format!("cell {i}: {ref_count} refs")));
        }
        let data_len = usize::from(d2).div_ceil(2);
        let mut bytes = r.take(data_len)?.to_vec();
        let bit_len = if d2 % 2 == 0 {
            data_len * 8
        } else {
            let last = bytes
                .last_mut()
                .ok_or_else(|| CellError::InvalidBoc(format!("cell {i}: empty padded data")))?;
            if *last == 0 {
                return Err(CellError::InvalidBoc(format!("cell {i}: missing completion tag")));
            }
            let tz = last.trailing_zeros() as usize;
            *last &= !(1u8 << tz);
            data_len * 8 - tz - 1
        };
        if bit_len > MAX_CELL_BITS {
            return Err(CellError::InvalidBoc(format!("cell {i}: {bit_len} bits")));
        }
        let mut refs = Vec::with_capacity(ref_count);
        for _ in 0..ref_count {
            let idx = r.uint(size_bytes)? as usize;
            if idx <= i || idx >= cells {
                return Err(CellError::InvalidBoc(format!(
                    "cell {i}: ref index {idx} out of order"
                )));
            }
            refs.push(idx);
        }
        raws.push(RawCell {
            data: bytes,
            bit_len,
            refs,
        });
    }
    Ok(raws)
}

/// Reverse post-order DFS: parents before children, each hash once.
fn topological_order(root: &Cell) -> Vec<Cell> {
    fn visit(cell: &Cell, seen: &mut HashSet<[u8; 32]>, out: &mut Vec<Cell>) {
        if !seen.insert(cell.hash()) {
            return;
        }
        for child in cell.refs() {
            visit(child, seen, out);
        }
        out.push(cell.clone());
    }
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    visit(root, &mut seen, &mut out);
    out.reverse();
    out
}

fn byte_width(n: u64) -> usize {
    let bits = 64 - n.leading_zeros() as usize;
    bits.div_ceil(8).max(1)
}

fn write_uint(out: &mut Vec<u8>, value: u64, width: usize) {
    out.extend_from_slice(&value.to_be_bytes()[8 - width..]);
}

/// CRC32-C (Castagnoli), reflected, as used by the BOC trailer.
fn crc32c(data: &[u8]) -> u32 {
    let mut crc = !0u32;
    for &byte in data {
        crc ^= u32::from(byte);
        for _ in 0..8 {
            let mask = (crc & 1).wrapping_neg();
            crc = (crc >> 1) ^ (0x82F6_3B78 & mask);
        }
    }
    !crc
}

struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|&end| end <= self.bytes.len())
            .ok_or_else(|| CellError::InvalidBoc("unexpected end of input".to_string()))?;
        let out = &self.bytes[self.pos..end];
        self.pos = end;
        Ok(out)
    }

    fn u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    fn uint(&mut self, width: usize) -> Result<u64> {
        Ok(self
            .take(width)?
            .iter()
            .fold(0u64, |acc, &b| (acc << 8) | u64::from(b)))
    }
}
