//! # vaultkit-cell
//!
//! Cell codec for the vault and strategy contracts.
//!
//! Every piece of contract state and every message body is a tree of cells.
//! A cell holds up to [`MAX_CELL_BITS`] bits of data and up to
//! [`MAX_CELL_REFS`] references to child cells.
//!
//! - [`builder`]: [`CellBuilder`], the mutable staging value sealed into a cell
//! - [`cell`]: [`Cell`], immutable, hashed, cheaply cloneable
//! - [`slice`]: [`CellSlice`], a read cursor over a cell's bits and refs
//! - [`address`]: [`Address`], the fixed-width account identifier
//! - [`boc`]: bag-of-cells serialization used on the wire
//!
//! ## Architecture
//!
//! ```text
//! CellBuilder --seal()--> Cell --parse()--> CellSlice
//!                          |
//!                          v
//!                    boc::serialize  (bytes / base64 for the ledger)
//! ```

pub mod address;
pub mod boc;
pub mod builder;
pub mod cell;
pub mod slice;

pub use address::Address;
pub use builder::CellBuilder;
pub use cell::Cell;
pub use slice::CellSlice;

/// Maximum number of data bits in one cell.
pub const MAX_CELL_BITS: usize = 1023;

/// Maximum number of child references in one cell.
pub const MAX_CELL_REFS: usize = 4;

/// Exclusive upper bound of a coins amount (`VarUInteger 16` holds 15 bytes).
pub const MAX_COINS_EXCLUSIVE: u128 = 1 << 120;

/// Native or jetton amount in the smallest unit.
pub type Coins = u128;

/// Error types for cell construction and parsing.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CellError {
    /// Integer does not fit in the requested bit width.
    #[error("value {value} does not fit in {bits} bits")]
    ValueOutOfRange {
        /// The rejected value, rendered as decimal.
        value: String,
        /// The requested width.
        bits: usize,
    },

    /// Storing would exceed the 1023-bit data budget.
    #[error("cell bit overflow: {used} bits used, {requested} more requested")]
    BitOverflow {
        /// Bits already stored.
        used: usize,
        /// Bits the failed store needed.
        requested: usize,
    },

    /// Storing would attach a fifth reference.
    #[error("cell ref overflow: already holds {MAX_CELL_REFS} refs")]
    RefOverflow,

    /// Not enough data bits left to read.
    #[error("cell bit underflow: {requested} bits requested, {available} available")]
    BitUnderflow {
        /// Bits the read needed.
        requested: usize,
        /// Bits left in the slice.
        available: usize,
    },

    /// No references left to read.
    #[error("cell ref underflow: no refs left")]
    RefUnderflow,

    /// Data or refs remain after a parse that expected the end.
    #[error("unconsumed cell data: {bits} bits and {refs} refs left")]
    Unconsumed {
        /// Bits left.
        bits: usize,
        /// Refs left.
        refs: usize,
    },

    /// Malformed address (binary or textual).
    #[error("invalid address: {0}")]
    InvalidAddress(String),

    /// Malformed bag-of-cells.
    #[error("invalid bag of cells: {0}")]
    InvalidBoc(String),
}

/// Convenience result type for cell operations.
pub type Result<T> = std::result::Result<T, CellError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = CellError::ValueOutOfRange {
            value: "256".to_string(),
            bits: 8,
        };
        assert_eq!(err.to_string(), "value 256 does not fit in 8 bits");
        assert_eq!(
            CellError::RefOverflow.to_string(),
            "cell ref overflow: already holds 4 refs"
        );
    }

    #[test]
    fn test_limits() {
        assert_eq!(MAX_CELL_BITS, 1023);
        assert_eq!(MAX_CELL_REFS, 4);
        assert_eq!(MAX_COINS_EXCLUSIVE, 2u128.pow(120));
    }
}
