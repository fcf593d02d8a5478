//! Mutable cell builder.
//!
//! Fields are appended most-significant bit first. Every `store_*` method
//! checks the remaining budget before writing, so a rejected store leaves the
//! builder exactly as it was. Methods return `&mut Self` so calls chain with
//! `?`:
//!
//! ```
//! use vaultkit_cell::CellBuilder;
//!
//! # fn main() -> vaultkit_cell::Result<()> {
//! let mut b = CellBuilder::new();
//! b.store_uint(0x95db9d39, 32)?.store_uint(0, 64)?.store_coins(1_000)?;
//! let cell = b.seal();
//! assert_eq!(cell.bit_len(), 32 + 64 + 4 + 16);
//! # Ok(())
//! # }
//! ```

use crate::address::Address;
use crate::cell::Cell;
use crate::{CellError, Coins, Result, MAX_CELL_BITS, MAX_CELL_REFS, MAX_COINS_EXCLUSIVE};

/// Bits taken by a standard address (`10` tag, anycast bit, workchain, hash).
pub const ADDRESS_BITS: usize = 2 + 1 + 8 + 256;

/// Staging value that accumulates bits and refs and seals into one [`Cell`].
#[derive(Debug, Clone, Default)]
pub struct CellBuilder {
    data: Vec<u8>,
    bit_len: usize,
    refs: Vec<Cell>,
}

impl CellBuilder {
    /// Create an empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Bits stored so far.
    pub fn bit_len(&self) -> usize {
        self.bit_len
    }

    /// Bits that can still be stored.
    pub fn remaining_bits(&self) -> usize {
        MAX_CELL_BITS - self.bit_len
    }

    /// Refs that can still be attached.
    pub fn remaining_refs(&self) -> usize {
        MAX_CELL_REFS - self.refs.len()
    }

    /// Append a single bit.
    pub fn store_bit(&mut self, bit: bool) -> Result<&mut Self> {
        self.ensure_bits(1)?;
        self.push_bit(bit);
        Ok(self)
    }

    /// Append an unsigned integer in exactly `bits` bits.
    ///
    /// Widths above 128 are zero-extended on the left.
    ///
    /// # Errors
    ///
    /// - [`CellError::ValueOutOfRange`] if `value` needs more than `bits` bits
    /// - [`CellError::BitOverflow`] if the cell has fewer than `bits` bits left
    pub fn store_uint(&mut self, value: u128, bits: usize) -> Result<&mut Self> {
        if bits < 128 && value >> bits != 0 {
            return Err(CellError::ValueOutOfRange {
                value: value.to_string(),
                bits,
            });
        }
        self.ensure_bits(bits)?;
        let width = bits.min(128);
        for _ in width..bits {
            self.push_bit(false);
        }
        for i in (0..width).rev() {
            self.push_bit((value >> i) & 1 == 1);
        }
        Ok(self)
    }

    /// Append a signed integer in two's complement using exactly `bits` bits
    /// (at most 128).
    pub fn store_int(&mut self, value: i128, bits: usize) -> Result<&mut Self> {
        let fits = match bits {
            0 => value == 0,
            1..=127 => {
                let half = 1i128 << (bits - 1);
                (-half..half).contains(&value)
            }
            128 => true,
            _ => false,
        };
        if !fits {
            return Err(CellError::ValueOutOfRange {
                value: value.to_string(),
                bits,
            });
        }
        let raw = if bits == 128 {
            value as u128
        } else {
            (value as u128) & ((1u128 << bits) - 1)
        };
        self.store_uint(raw, bits)
    }

    /// Append an amount using the `VarUInteger 16` coins encoding: a 4-bit
    /// byte length followed by that many bytes.
    pub fn store_coins(&mut self, value: Coins) -> Result<&mut Self> {
        if value >= MAX_COINS_EXCLUSIVE {
            return Err(CellError::ValueOutOfRange {
                value: value.to_string(),
                bits: 120,
            });
        }
        let len = (128 - value.leading_zeros() as usize).div_ceil(8);
        self.ensure_bits(4 + len * 8)?;
        self.store_uint(len as u128, 4)?;
        self.store_uint(value, len * 8)
    }

    /// Append a standard address (267 bits).
    pub fn store_address(&mut self, address: &Address) -> Result<&mut Self> {
        self.ensure_bits(ADDRESS_BITS)?;
        self.store_uint(0b10, 2)?;
        self.push_bit(false);
        self.store_int(i128::from(address.workchain), 8)?;
        self.store_bytes(&address.hash)
    }

    /// Append an address or the 2-bit none address.
    pub fn store_maybe_address(&mut self, address: Option<&Address>) -> Result<&mut Self> {
        match address {
            Some(addr) => self.store_address(addr),
            None => self.store_uint(0, 2),
        }
    }

    /// Append raw bytes.
    pub fn store_bytes(&mut self, bytes: &[u8]) -> Result<&mut Self> {
        self.ensure_bits(bytes.len() * 8)?;
        for &byte in bytes {
            for i in (0..8).rev() {
                self.push_bit((byte >> i) & 1 == 1);
            }
        }
        Ok(self)
    }

    /// Attach a child cell. The builder takes ownership of it.
    ///
    /// # Errors
    ///
    /// [`CellError::RefOverflow`] if four refs are already attached.
    pub fn store_ref(&mut self, cell: Cell) -> Result<&mut Self> {
        if self.refs.len() >= MAX_CELL_REFS {
            return Err(CellError::RefOverflow);
        }
        self.refs.push(cell);
        Ok(self)
    }

    /// Append a presence bit and, when present, attach the child.
    pub fn store_maybe_ref(&mut self, cell: Option<Cell>) -> Result<&mut Self> {
        match cell {
            Some(cell) => {
                self.ensure_bits(1)?;
                if self.refs.len() >= MAX_CELL_REFS {
                    return Err(CellError::RefOverflow);
                }
                self.push_bit(true);
                self.refs.push(cell);
                Ok(self)
            }
            None => self.store_bit(false),
        }
    }

    /// Seal the builder into an immutable cell.
    pub fn seal(self) -> Cell {
        Cell::from_parts(self.data, self.bit_len, self.refs)
    }

    fn ensure_bits(&self, requested: usize) -> Result<()> {
        if requested > self.remaining_bits() {
            return Err(CellError::BitOverflow {
                used: self.bit_len,
                requested,
            });
        }
        Ok(())
    }

    fn push_bit(&mut self, bit: bool) {
        let byte = self.bit_len / 8;
        if byte == self.data.len() {
            self.data.push(0);
        }
        if bit {
            self.data[byte] |= 0x80 >> (self.bit_len % 8);
        }
        self.bit_len += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_uint_bits() {
        let mut b = CellBuilder::new();
        b.store_uint(0xF, 4).expect("store").store_uint(1, 4).expect("store");
        let cell = b.seal();
        assert_eq!(cell.data(), &[0xF1]);
        assert_eq!(cell.bit_len(), 8);
    }

    #[test]
    fn test_store_uint_out_of_range() {
        let mut b = CellBuilder::new();
        let err = b.store_uint(256, 8).expect_err("must not fit");
        assert!(matches!(err, CellError::ValueOutOfRange { bits: 8, .. }));
        assert_eq!(b.bit_len(), 0, "failed store must not write");
    }

    #[test]
    fn test_store_uint_wide() {
        let mut b = CellBuilder::new();
        b.store_uint(1, 256).expect("store");
        let cell = b.seal();
        assert_eq!(cell.bit_len(), 256);
        assert_eq!(cell.data()[31], 1);
        assert!(cell.data()[..31].iter().all(|&x| x == 0));
    }

    #[test]
    fn test_store_int_ranges() {
        let mut b = CellBuilder::new();
        b.store_int(-1, 8).expect("-1 fits");
        b.store_int(-128, 8).expect("-128 fits");
        b.store_int(127, 8).expect("127 fits");
        assert!(b.store_int(128, 8).is_err());
        assert!(b.store_int(-129, 8).is_err());
        assert_eq!(b.seal().data(), &[0xFF, 0x80, 0x7F]);
    }

    #[test]
    fn test_store_coins_zero_and_limits() {
        let mut b = CellBuilder::new();
        b.store_coins(0).expect("zero");
        assert_eq!(b.bit_len(), 4);
        b.store_coins(MAX_COINS_EXCLUSIVE - 1).expect("max");
        assert_eq!(b.bit_len(), 4 + 4 + 120);
        assert!(b.store_coins(MAX_COINS_EXCLUSIVE).is_err());
    }

    #[test]
    fn test_store_coins_length_prefix() {
        let mut b = CellBuilder::new();
        b.store_coins(1_000_000_000).expect("store");
        // 1e9 = 0x3B9ACA00 -> 4 bytes
        let cell = b.seal();
        assert_eq!(cell.bit_len(), 4 + 32);
        assert_eq!(cell.data(), &[0x43, 0xB9, 0xAC, 0xA0, 0x00]);
    }

    #[test]
    fn test_bit_budget() {
        let mut b = CellBuilder::new();
        b.store_uint(0, 1000).expect("1000 bits");
        b.store_uint(0, 23).expect("fills to 1023");
        let err = b.store_bit(true).expect_err("1024th bit");
        assert_eq!(
            err,
            CellError::BitOverflow {
                used: 1023,
                requested: 1
            }
        );
    }

    #[test]
    fn test_ref_budget() {
        let mut b = CellBuilder::new();
        for _ in 0..4 {
            b.store_ref(Cell::empty()).expect("ref");
        }
        assert_eq!(b.store_ref(Cell::empty()).expect_err("5th"), CellError::RefOverflow);
        assert_eq!(
            b.store_maybe_ref(Some(Cell::empty())).expect_err("5th"),
            CellError::RefOverflow
        );
        assert_eq!(b.bit_len(), 0);
    }

    #[test]
    fn test_store_address_width() {
        let addr = Address::new(0, [0xAA; 32]);
        let mut b = CellBuilder::new();
        b.store_address(&addr).expect("store");
        assert_eq!(b.bit_len(), ADDRESS_BITS);
        b.store_maybe_address(None).expect("none");
        assert_eq!(b.bit_len(), ADDRESS_BITS + 2);
    }

    #[test]
    fn test_address_overflow_leaves_builder_untouched() {
        let mut b = CellBuilder::new();
        b.store_uint(0, 900).expect("store");
        assert!(b.store_address(&Address::new(0, [1; 32])).is_err());
        assert_eq!(b.bit_len(), 900);
    }
}
