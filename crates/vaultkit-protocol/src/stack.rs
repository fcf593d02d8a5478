//! Typed get-method stacks.
//!
//! A get method returns an ordered list of [`StackValue`]s. Each reader in
//! [`readers`](crate::readers) declares how many values it expects and reads
//! them in order through a [`StackReader`], which fails on the first value of
//! the wrong kind or range. There is no best-effort decoding: a stack with a
//! different arity is rejected before any field is read.

use vaultkit_cell::{Address, Cell, CellBuilder, Coins, MAX_COINS_EXCLUSIVE};

use crate::{ProtocolError, Result};

/// One value of a get-method argument list or result stack.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StackValue {
    /// TVM null.
    Null,
    /// Integer (TVM integers are 257-bit; wider values are rejected at the edge).
    Int(i128),
    /// A cell.
    Cell(Cell),
    /// A slice, carried as the cell it covers.
    Slice(Cell),
}

impl StackValue {
    /// Kind name used in errors and on the wire.
    pub const fn kind(&self) -> &'static str {
        match self {
            StackValue::Null => "null",
            StackValue::Int(_) => "num",
            StackValue::Cell(_) => "cell",
            StackValue::Slice(_) => "slice",
        }
    }

    /// Slice holding a single address, as get methods expect for address arguments.
    pub fn address(address: &Address) -> Result<Self> {
        let mut b = CellBuilder::new();
        b.store_address(address)?;
        Ok(StackValue::Slice(b.seal()))
    }

    /// Integer argument from an amount.
    pub fn coins(amount: Coins) -> Result<Self> {
        if amount >= MAX_COINS_EXCLUSIVE {
            return Err(ProtocolError::InvalidField {
                field: "amount",
                reason: format!("{amount} exceeds the coins range"),
            });
        }
        Ok(StackValue::Int(amount as i128))
    }
}

/// Strict positional reader over a get-method result.
#[derive(Debug)]
pub struct StackReader {
    method: String,
    values: std::vec::IntoIter<StackValue>,
    position: usize,
}

impl StackReader {
    /// Start reading `values` returned by `method`, which must hold exactly
    /// `expected` entries.
    ///
    /// # Errors
    ///
    /// [`ProtocolError::StackArity`] if the count differs.
    pub fn new(method: &str, values: Vec<StackValue>, expected: usize) -> Result<Self> {
        if values.len() != expected {
            return Err(ProtocolError::StackArity {
                method: method.to_string(),
                expected,
                actual: values.len(),
            });
        }
        Ok(Self {
            method: method.to_string(),
            values: values.into_iter(),
            position: 0,
        })
    }

    /// Read an integer.
    pub fn read_int(&mut self) -> Result<i128> {
        match self.next("num")? {
            StackValue::Int(v) => Ok(v),
            other => Err(self.type_error("num", &other)),
        }
    }

    /// Read a non-negative amount.
    pub fn read_coins(&mut self) -> Result<Coins> {
        let v = self.read_int()?;
        if v < 0 || v as u128 >= MAX_COINS_EXCLUSIVE {
            return Err(self.range_error(format!("{v} is not a valid amount")));
        }
        Ok(v as u128)
    }

    /// Read an integer that must fit in 32 unsigned bits.
    pub fn read_u32(&mut self) -> Result<u32> {
        let v = self.read_int()?;
        u32::try_from(v).map_err(|_| self.range_error(format!("{v} does not fit in uint32")))
    }

    /// Read a TVM boolean (any non-zero integer is true).
    pub fn read_bool(&mut self) -> Result<bool> {
        Ok(self.read_int()? != 0)
    }

    /// Read a slice (or cell) holding a standard address.
    pub fn read_address(&mut self) -> Result<Address> {
        let cell = self.read_cell_like("slice")?;
        let mut s = cell.parse();
        s.load_address().map_err(|e| self.range_error(e.to_string()))
    }

    /// Read a slice holding an address or the none address; `null` also reads as none.
    pub fn read_maybe_address(&mut self) -> Result<Option<Address>> {
        let value = self.next("slice")?;
        let cell = match value {
            StackValue::Null => return Ok(None),
            StackValue::Slice(c) | StackValue::Cell(c) => c,
            other => return Err(self.type_error("slice", &other)),
        };
        let mut s = cell.parse();
        s.load_maybe_address().map_err(|e| self.range_error(e.to_string()))
    }

    /// Read a cell (a slice is accepted as the cell it covers).
    pub fn read_cell(&mut self) -> Result<Cell> {
        self.read_cell_like("cell")
    }

    /// Assert that every value has been read.
    pub fn finish(self) -> Result<()> {
        let left = self.values.len();
        if left != 0 {
            return Err(ProtocolError::StackArity {
                method: self.method,
                expected: self.position,
                actual: self.position + left,
            });
        }
        Ok(())
    }

    fn read_cell_like(&mut self, expected: &'static str) -> Result<Cell> {
        match self.next(expected)? {
            StackValue::Cell(c) | StackValue::Slice(c) => Ok(c),
            other => Err(self.type_error(expected, &other)),
        }
    }

    fn next(&mut self, expected: &'static str) -> Result<StackValue> {
        let value = self.values.next().ok_or_else(|| ProtocolError::StackArity {
            method: self.method.clone(),
            expected: self.position + 1,
            actual: self.position,
        })?;
        self.position += 1;
        tracing::trace!(
            method = %self.method,
            position = self.position - 1,
            expected,
            "reading stack value"
        );
        Ok(value)
    }

    fn type_error(&self, expected: &'static str, found: &StackValue) -> ProtocolError {
        ProtocolError::StackType {
            method: self.method.clone(),
            position: self.position - 1,
            expected,
            found: found.kind(),
        }
    }

    fn range_error(&self, reason: String) -> ProtocolError {
        ProtocolError::StackRange {
            method: self.method.clone(),
            position: self.position - 1,
            reason,
        }
    }
}
