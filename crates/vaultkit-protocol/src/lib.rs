//! # vaultkit-protocol
//!
//! Wire protocol of the liquidity vault, its strategy, and the extra-reward
//! distribution pool.
//!
//! ## Modules
//!
//! - [`opcodes`]: 32-bit operation tags and inbound header parsing
//! - [`exit_codes`]: contract rejection codes 80..=94
//! - [`message`]: [`ContractMessage`](message::ContractMessage), state-init, upgrade slot
//! - [`stack`]: typed get-method stack values and the strict [`StackReader`](stack::StackReader)
//! - [`vault`]: vault state layout and message builders
//! - [`strategy`]: strategy state layout and message builders
//! - [`reinvest`]: the nested reinvest parameter cell shared by both
//! - [`jetton`]: deposit (LP jetton transfer) and withdraw (share wallet) messages
//! - [`distribution`]: distribution pool payload and funding transfer
//! - [`readers`]: one reader per get method

pub mod distribution;
pub mod exit_codes;
pub mod jetton;
pub mod message;
pub mod opcodes;
pub mod readers;
pub mod reinvest;
pub mod stack;
pub mod strategy;
pub mod vault;

use vaultkit_cell::CellError;

use crate::exit_codes::ExitCode;

/// Error types for protocol encoding and decoding.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolError {
    /// Underlying cell construction or parse failure.
    #[error(transparent)]
    Cell(#[from] CellError),

    /// Message body starts with an opcode outside the table.
    #[error("unknown opcode {0:#010x}")]
    UnknownOpcode(u32),

    /// Get method returned the wrong number of values.
    #[error("{method}: expected {expected} stack values, got {actual}")]
    StackArity {
        /// Get method name.
        method: String,
        /// Values the schema expects.
        expected: usize,
        /// Values received.
        actual: usize,
    },

    /// Get method returned a value of the wrong type.
    #[error("{method}: stack value {position} should be {expected}, got {found}")]
    StackType {
        /// Get method name.
        method: String,
        /// Zero-based stack position.
        position: usize,
        /// Expected kind.
        expected: &'static str,
        /// Received kind.
        found: &'static str,
    },

    /// Get method returned a value outside the field's domain.
    #[error("{method}: stack value {position} out of range: {reason}")]
    StackRange {
        /// Get method name.
        method: String,
        /// Zero-based stack position.
        position: usize,
        /// What was wrong.
        reason: String,
    },

    /// Caller-supplied field is invalid.
    #[error("invalid {field}: {reason}")]
    InvalidField {
        /// Field name.
        field: &'static str,
        /// What was wrong.
        reason: String,
    },

    /// The contract would reject this request with the given exit code.
    #[error("contract would reject with exit code {code}: {0}", code = .0.code())]
    WouldReject(ExitCode),

    /// Arithmetic overflow.
    #[error("arithmetic overflow in {0}")]
    Overflow(&'static str),
}

/// Convenience result type for protocol operations.
pub type Result<T> = std::result::Result<T, ProtocolError>;
