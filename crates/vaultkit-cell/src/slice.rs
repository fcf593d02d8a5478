//! Read cursor over a sealed cell.
//!
//! Mirrors [`CellBuilder`](crate::CellBuilder): every `load_*` advances the
//! bit cursor (or the ref index) and fails with an underflow error if the
//! cell does not have enough left. A failed load does not move the cursor.

use crate::address::Address;
use crate::cell::Cell;
use crate::{CellError, Coins, Result};

/// Cursor over a [`Cell`]'s data bits and refs.
#[derive(Debug, Clone)]
pub struct CellSlice<'a> {
    cell: &'a Cell,
    bit_pos: usize,
    ref_pos: usize,
}

impl<'a> CellSlice<'a> {
    pub(crate) fn new(cell: &'a Cell) -> Self {
        Self {
            cell,
            bit_pos: 0,
            ref_pos: 0,
        }
    }

    /// Data bits not yet read.
    pub fn remaining_bits(&self) -> usize {
        self.cell.bit_len() - self.bit_pos
    }

    /// Refs not yet read.
    pub fn remaining_refs(&self) -> usize {
        self.cell.refs().len() - self.ref_pos
    }

    /// Read one bit.
    pub fn load_bit(&mut self) -> Result<bool> {
        self.ensure_bits(1)?;
        Ok(self.next_bit())
    }

    /// Read an unsigned integer of `bits` bits (at most 128).
    pub fn load_uint(&mut self, bits: usize) -> Result<u128> {
        if bits > 128 {
            return Err(CellError::ValueOutOfRange {
                value: "u128".to_string(),
                bits,
            });
        }
        self.ensure_bits(bits)?;
        let mut value = 0u128;
        for _ in 0..bits {
            value = (value << 1) | u128::from(self.next_bit());
        }
        Ok(value)
    }

    /// Read a two's-complement signed integer of `bits` bits (1 to 128).
    pub fn load_int(&mut self, bits: usize) -> Result<i128> {
        if bits == 0 || bits > 128 {
            return Err(CellError::ValueOutOfRange {
                value: "i128".to_string(),
                bits,
            });
        }
        let raw = self.load_uint(bits)?;
        if bits == 128 {
            return Ok(raw as i128);
        }
        let sign = 1u128 << (bits - 1);
        Ok(if raw & sign != 0 {
            (raw | !((1u128 << bits) - 1)) as i128
        } else {
            raw as i128
        })
    }

    /// Read a coins amount (4-bit length prefix, then that many bytes).
    pub fn load_coins(&mut self) -> Result<Coins> {
        self.ensure_bits(4)?;
        let start = self.bit_pos;
        let len = self.load_uint(4)? as usize;
        if let Err(e) = self.ensure_bits(len * 8) {
            self.bit_pos = start;
            return Err(e);
        }
        self.load_uint(len * 8)
    }

    /// Read raw bytes.
    pub fn load_bytes(&mut self, len: usize) -> Result<Vec<u8>> {
        self.ensure_bits(len * 8)?;
        let mut out = Vec::with_capacity(len);
        for _ in 0..len {
            let mut byte = 0u8;
            for _ in 0..8 {
                byte = (byte << 1) | u8::from(self.next_bit());
            }
            out.push(byte);
        }
        Ok(out)
    }

    /// Read a standard address.
    ///
    /// # Errors
    ///
    /// [`CellError::InvalidAddress`] on the none address, an external or
    /// variable-length address, or an anycast prefix.
    pub fn load_address(&mut self) -> Result<Address> {
        let start = self.bit_pos;
        let result = self.load_maybe_address().and_then(|addr| {
            addr.ok_or_else(|| CellError::InvalidAddress("expected address, got none".to_string()))
        });
        if result.is_err() {
            self.bit_pos = start;
        }
        result
    }

    /// Read a standard address or the none address.
    pub fn load_maybe_address(&mut self) -> Result<Option<Address>> {
        let start = self.bit_pos;
        let tag = self.load_uint(2)?;
        match tag {
            0b00 => Ok(None),
            0b10 => {
                let parsed = self.load_std_address_body();
                if parsed.is_err() {
                    self.bit_pos = start;
                }
                parsed.map(Some)
            }
            other => {
                self.bit_pos = start;
                Err(CellError::InvalidAddress(format!(
                    "unsupported address tag {other:#04b}"
                )))
            }
        }
    }

    fn load_std_address_body(&mut self) -> Result<Address> {
        self.ensure_bits(1 + 8 + 256)?;
        if self.next_bit() {
            return Err(CellError::InvalidAddress(
                "anycast addresses are not supported".to_string(),
            ));
        }
        let workchain = self.load_int(8)? as i8;
        let bytes = self.load_bytes(32)?;
        let mut hash = [0u8; 32];
        hash.copy_from_slice(&bytes);
        Ok(Address::new(workchain, hash))
    }

    /// Read the next child reference.
    pub fn load_ref(&mut self) -> Result<Cell> {
        let cell = self
            .cell
            .refs()
            .get(self.ref_pos)
            .cloned()
            .ok_or(CellError::RefUnderflow)?;
        self.ref_pos += 1;
        Ok(cell)
    }

    /// Read a presence bit and, when set, the next child reference.
    pub fn load_maybe_ref(&mut self) -> Result<Option<Cell>> {
        self.ensure_bits(1)?;
        if self.peek_bit() {
            if self.remaining_refs() == 0 {
                return Err(CellError::RefUnderflow);
            }
            self.next_bit();
            return self.load_ref().map(Some);
        }
        self.next_bit();
        Ok(None)
    }

    /// Assert that the whole cell has been consumed.
    pub fn end_parse(&self) -> Result<()> {
        let bits = self.remaining_bits();
        let refs = self.remaining_refs();
        if bits != 0 || refs != 0 {
            return Err(CellError::Unconsumed { bits, refs });
        }
        Ok(())
    }

    fn ensure_bits(&self, requested: usize) -> Result<()> {
        let available = self.remaining_bits();
        if requested > available {
            return Err(CellError::BitUnderflow {
                requested,
                available,
            });
        }
        Ok(())
    }

    fn peek_bit(&self) -> bool {
        let byte = self.cell.data()[self.bit_pos / 8];
        byte & (0x80 >> (self.bit_pos % 8)) != 0
    }

    fn next_bit(&mut self) -> bool {
        let bit = self.peek_bit();
        self.bit_pos += 1;
        bit
    }
}
